//! Atomic propositions
//!
//! Every distinct label name in the program is one proposition. A state
//! satisfies the proposition exactly when its pc is one of the positions the
//! label was attached to; memory and input budget play no part.

use std::sync::Arc;

use braincheck_core::{Pc, Program};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{CheckError, CheckResult};
use crate::state::MachineState;

/// Index of a proposition in [`Labeling::propositions`]
pub type PropId = u32;

/// Proposition table for one program
#[derive(Debug, Clone)]
pub struct Labeling {
    /// Names in first-occurrence order
    names: Vec<Arc<str>>,
    by_name: FxHashMap<Arc<str>, PropId>,
    /// `by_pc[pc]` for every pc in `0..=program.len()`
    by_pc: Vec<SmallVec<[PropId; 2]>>,
}

impl Labeling {
    pub fn new(program: &Program) -> Self {
        let mut names: Vec<Arc<str>> = Vec::new();
        let mut by_name: FxHashMap<Arc<str>, PropId> = FxHashMap::default();
        let mut by_pc = vec![SmallVec::new(); program.len() + 1];

        for (&pc, labels) in program.label_map() {
            for label in labels {
                let id = match by_name.get(label.as_str()) {
                    Some(&id) => id,
                    None => {
                        let id = names.len() as PropId;
                        let name: Arc<str> = Arc::from(label.as_str());
                        names.push(name.clone());
                        by_name.insert(name, id);
                        id
                    }
                };
                if let Some(slot) = by_pc.get_mut(pc) {
                    if !slot.contains(&id) {
                        slot.push(id);
                    }
                }
            }
        }

        Labeling {
            names,
            by_name,
            by_pc,
        }
    }

    /// All proposition names
    pub fn propositions(&self) -> &[Arc<str>] {
        &self.names
    }

    pub fn lookup(&self, name: &str) -> Option<PropId> {
        self.by_name.get(name).copied()
    }

    /// Name of proposition `id`, `None` if no label has that id
    pub fn name(&self, id: PropId) -> Option<&str> {
        self.names.get(id as usize).map(|n| n.as_ref())
    }

    /// Propositions holding at `pc`
    pub fn at(&self, pc: Pc) -> &[PropId] {
        self.by_pc.get(pc).map(|ids| ids.as_slice()).unwrap_or(&[])
    }

    pub fn holds(&self, id: PropId, pc: Pc) -> bool {
        self.at(pc).contains(&id)
    }

    /// Truth value of every proposition at `pc`, in proposition order
    pub fn valuation(&self, pc: Pc) -> Vec<(&str, bool)> {
        let here = self.at(pc);
        self.names
            .iter()
            .enumerate()
            .map(|(id, name)| (name.as_ref(), here.contains(&(id as PropId))))
            .collect()
    }

    /// Predicate for the named label, or [`CheckError::UnknownLabel`]
    pub fn target(&self, label: &str) -> CheckResult<LabelPredicate> {
        let id = self.lookup(label).ok_or_else(|| CheckError::UnknownLabel {
            label: label.to_string(),
        })?;
        let positions = self
            .by_pc
            .iter()
            .map(|ids| ids.contains(&id))
            .collect();
        Ok(LabelPredicate {
            name: self.names[id as usize].clone(),
            positions,
        })
    }
}

/// "pc is at one of the label's positions"
#[derive(Debug, Clone)]
pub struct LabelPredicate {
    name: Arc<str>,
    positions: Vec<bool>,
}

impl LabelPredicate {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn holds_at(&self, pc: Pc) -> bool {
        self.positions.get(pc).copied().unwrap_or(false)
    }

    pub fn holds(&self, state: &MachineState) -> bool {
        self.holds_at(state.pc())
    }

    /// Positions where the label sits, ascending
    pub fn positions(&self) -> impl Iterator<Item = Pc> + '_ {
        self.positions
            .iter()
            .enumerate()
            .filter_map(|(pc, &here)| here.then_some(pc))
    }
}

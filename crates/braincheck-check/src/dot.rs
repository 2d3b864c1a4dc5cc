//! Graphviz rendering of an explored state graph

use std::fmt::Write as _;

use crate::explore::StateGraph;
use crate::kripke::Kripke;
use crate::state::MachineState;

/// Render `graph` as a DOT digraph.
///
/// Nodes show `pc = …; mp = …`, the state fingerprint and the propositions
/// that hold there; nodes left unexpanded by truncation are dashed. Each
/// edge carries the proposition valuation of its source state.
pub fn render_dot(graph: &StateGraph<MachineState>, kripke: &Kripke<'_>) -> String {
    let mut out = String::new();
    let labeling = kripke.labeling();

    // Writing to a String cannot fail
    let _ = writeln!(out, "digraph \"state graph\" {{");
    let _ = writeln!(out, "  rankdir=LR");
    let _ = writeln!(out, "  node [shape=box, fontname=\"monospace\"]");
    let _ = writeln!(out, "  I [label=\"\", style=invis, width=0]");
    let _ = writeln!(out, "  I -> {}", graph.initial());

    if graph.is_truncated() {
        let _ = writeln!(out, "  label=\"truncated after {} states\"", graph.len());
    }

    for (id, node) in graph.nodes() {
        let style = if node.expanded { "" } else { ", style=dashed" };
        let mut text = kripke.format_state(&node.state);
        let props = labeling.at(node.state.pc());
        if !props.is_empty() {
            let names: Vec<&str> = props.iter().filter_map(|&p| labeling.name(p)).collect();
            let _ = write!(text, "\n{{{}}}", names.join(", "));
        }
        let _ = writeln!(out, "  {} [label=\"{}\"{}]", id, escape(&text), style);
    }

    for (from, to) in graph.edges() {
        let pc = graph.node(from).state.pc();
        let valuation = labeling
            .valuation(pc)
            .into_iter()
            .map(|(name, holds)| {
                if holds {
                    name.to_string()
                } else {
                    format!("!{}", name)
                }
            })
            .collect::<Vec<_>>();
        let label = if valuation.is_empty() {
            "1".to_string()
        } else {
            valuation.join(" & ")
        };
        let _ = writeln!(out, "  {} -> {} [label=\"{}\"]", from, to, escape(&label));
    }

    out.push_str("}\n");
    out
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explore::{explore, ExploreConfig};
    use braincheck_core::{IoModel, Program};

    #[test]
    fn test_render_small_graph() {
        let program = Program::parse("+_end_").unwrap();
        let k = Kripke::new(&program, IoModel::default());
        let graph = explore(&k, &ExploreConfig::default()).unwrap();
        let dot = render_dot(&graph, &k);

        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("I -> 0"));
        assert!(dot.contains("0 [label=\"pc = 0; mp = 0\\nhash = "));
        assert!(dot.contains("1 [label=\"pc = 1; mp = 0\\nhash = "));
        assert!(dot.contains("0 -> 1 [label=\"!end\"]"));
        assert!(dot.contains("\\n{end}\"]"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_unlabelled_edges() {
        let program = Program::parse("++").unwrap();
        let k = Kripke::new(&program, IoModel::default());
        let graph = explore(&k, &ExploreConfig::default()).unwrap();
        let dot = render_dot(&graph, &k);
        assert!(dot.contains("0 -> 1 [label=\"1\"]"));
    }

    #[test]
    fn test_truncated_nodes_dashed() {
        let program = Program::parse(",").unwrap();
        let k = Kripke::new(&program, IoModel::unbounded());
        let graph = explore(
            &k,
            &ExploreConfig {
                max_states: Some(3),
                workers: None,
            },
        )
        .unwrap();
        let dot = render_dot(&graph, &k);
        assert!(dot.contains("style=dashed"));
        assert!(dot.contains("label=\"truncated after 3 states\""));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }
}

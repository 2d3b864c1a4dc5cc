//! braincheck CLI
//!
//! Command-line interface for running and verifying Brainfuck programs.
//!
//! # Commands
//!
//! - `braincheck execute <file>` - Run a program on stdin/stdout
//! - `braincheck print <file>` - Print the canonical program text
//! - `braincheck dot <file>` - Dump the reachable state graph as Graphviz
//! - `braincheck check-reach <file> <label>` - Decide whether every run reaches a label
//!
//! `check-reach` exits with 0 when the label is unavoidable, 1 when a
//! counterexample exists, 2 when a limit stopped the search and 3 on errors.

use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context};
use braincheck_check::{
    check_reach, explore, render_dot, CheckConfig, CheckError, CounterexampleReport,
    Kripke, LassoKind, Piece, SearchOutcome, SearchStats, StopReason,
};
use braincheck_core::{CellSize, Interpreter, IoModel, MemoryModel, Program, DEFAULT_TAPE_LEN};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Exit code for any failure other than a verdict
const EXIT_ERROR: u8 = 3;

/// State cap for `dot` when neither a flag nor the config file sets one
const DEFAULT_DOT_MAX_STATES: usize = 10_000;

#[derive(Parser, Debug)]
#[command(name = "braincheck")]
#[command(about = "Run Brainfuck programs and check that labels are always reached")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a program, reading stdin and writing stdout
    Execute(ExecuteArgs),
    /// Print the program without comments
    Print {
        /// Program file
        file: PathBuf,
        /// Leave out labels
        #[arg(long)]
        no_labels: bool,
    },
    /// Print the reachable state graph in DOT format
    Dot(DotArgs),
    /// Check that every execution reaches a label
    CheckReach(CheckReachArgs),
}

/// Input model flags shared by several commands
#[derive(Args, Debug, Clone, Default)]
struct IoArgs {
    /// Reads that may return any byte before input counts as exhausted
    #[arg(long)]
    max_reads: Option<usize>,
    /// Byte stored by a read once input is exhausted
    #[arg(long)]
    eof_byte: Option<u8>,
    /// Exhausted reads leave the cell unchanged (checking: reads block)
    #[arg(long)]
    no_change_on_eof: bool,
    /// Exhausted reads store the EOF byte, overriding NO_CHANGE_ON_EOF in --config
    #[arg(long, conflicts_with = "no_change_on_eof")]
    change_on_eof: bool,
}

impl IoArgs {
    /// Apply the flags that were given on top of `io`
    fn apply(&self, mut io: IoModel) -> IoModel {
        if let Some(n) = self.max_reads {
            io.max_reads = Some(n);
        }
        if let Some(b) = self.eof_byte {
            io.eof_byte = b;
        }
        if self.no_change_on_eof {
            io.no_change_on_eof = true;
        }
        if self.change_on_eof {
            io.no_change_on_eof = false;
        }
        io
    }
}

#[derive(Args, Debug)]
struct ExecuteArgs {
    /// Program file
    file: PathBuf,
    #[command(flatten)]
    io: IoArgs,
    /// Cell width in bits
    #[arg(long, default_value = "8", value_parser = parse_cell_size)]
    cell_size: CellSize,
    /// Number of tape cells
    #[arg(long, default_value_t = DEFAULT_TAPE_LEN)]
    tape_len: usize,
    /// Stick at the tape ends instead of wrapping around
    #[arg(long)]
    no_wrap: bool,
    /// Abort after this many instructions
    #[arg(long)]
    step_limit: Option<u64>,
}

#[derive(Args, Debug)]
struct DotArgs {
    /// Program file
    file: PathBuf,
    #[command(flatten)]
    io: IoArgs,
    /// Stop adding states after this many (default 10000)
    #[arg(long)]
    max_states: Option<usize>,
    /// Worker threads for exploration
    #[arg(long)]
    workers: Option<usize>,
    /// Directive file with input model and exploration settings; flags override it
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CheckReachArgs {
    /// Program file
    file: PathBuf,
    /// Label to check (may also come from LABEL in --config)
    label: Option<String>,
    #[command(flatten)]
    io: IoArgs,
    /// Give up after this many distinct states
    #[arg(long)]
    max_states: Option<usize>,
    /// Give up after this many seconds
    #[arg(long)]
    time_limit: Option<u64>,
    /// Directive file with check settings; flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn parse_cell_size(s: &str) -> Result<CellSize, String> {
    match s {
        "8" => Ok(CellSize::EightBit),
        "16" => Ok(CellSize::SixteenBit),
        "32" => Ok(CellSize::ThirtyTwoBit),
        other => Err(format!("cell size must be 8, 16 or 32, not '{}'", other)),
    }
}

// ============================================================================
// Output styling
// ============================================================================

/// ANSI styling, or nothing when disabled
#[derive(Debug, Clone, Copy)]
struct Palette {
    enabled: bool,
}

impl Palette {
    const RESET: &'static str = "\x1b[0m";
    const RED_BOLD: &'static str = "\x1b[31;1m";
    const GREEN_BOLD: &'static str = "\x1b[32;1m";
    const YELLOW_BOLD: &'static str = "\x1b[33;1m";
    const BLUE_BOLD: &'static str = "\x1b[34;1m";

    fn plain() -> Self {
        Palette { enabled: false }
    }

    fn paint(&self, style: &str, text: &str) -> String {
        if self.enabled && !text.is_empty() {
            format!("{}{}{}", style, text, Self::RESET)
        } else {
            text.to_string()
        }
    }

    fn red(&self, text: &str) -> String {
        self.paint(Self::RED_BOLD, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(Self::GREEN_BOLD, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(Self::YELLOW_BOLD, text)
    }

    fn blue(&self, text: &str) -> String {
        self.paint(Self::BLUE_BOLD, text)
    }
}

// ============================================================================
// Commands
// ============================================================================

fn load_program(path: &Path) -> anyhow::Result<Program> {
    let program = Program::parse_file(path)
        .with_context(|| format!("parsing of {} failed", path.display()))?;
    debug!(
        file = %path.display(),
        instructions = program.len(),
        labels = program.label_map().len(),
        "program loaded"
    );
    Ok(program)
}

fn execute_file<R: Read, W: Write>(args: &ExecuteArgs, input: R, out: W) -> anyhow::Result<()> {
    let program = load_program(&args.file)?;
    let memory = MemoryModel::new(args.cell_size, args.tape_len, !args.no_wrap);
    let io = args.io.apply(IoModel::default());

    let mut interpreter = Interpreter::new(&program, memory, io);
    if let Some(limit) = args.step_limit {
        interpreter = interpreter.with_step_limit(limit);
    }
    let stats = interpreter.run(input, out)?;
    info!(
        steps = stats.steps,
        reads = stats.reads,
        writes = stats.writes,
        "execution finished"
    );
    Ok(())
}

fn print_file<W: Write>(file: &Path, no_labels: bool, mut out: W) -> anyhow::Result<()> {
    let program = load_program(file)?;
    writeln!(out, "{}", program.render(!no_labels))?;
    Ok(())
}

/// Parse the directive file at `path`, or the defaults without one
fn load_config(path: Option<&Path>) -> anyhow::Result<CheckConfig> {
    let Some(path) = path else {
        return Ok(CheckConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    let config = CheckConfig::parse(&text).map_err(CheckError::from)?;
    debug!(file = %path.display(), "config loaded");
    Ok(config)
}

/// Exploration settings for `dot`: `--config` (if any) with flags on top
fn resolve_dot_config(args: &DotArgs) -> anyhow::Result<CheckConfig> {
    let mut config = load_config(args.config.as_deref())?;
    config.io = args.io.apply(config.io);
    if let Some(n) = args.max_states {
        config.max_states = Some(n);
    }
    if let Some(n) = args.workers {
        config.graph_workers = Some(n);
    }
    if config.max_states.is_none() {
        config.max_states = Some(DEFAULT_DOT_MAX_STATES);
    }
    Ok(config)
}

fn dot_file<W: Write>(args: &DotArgs, mut out: W) -> anyhow::Result<()> {
    let program = load_program(&args.file)?;
    let config = resolve_dot_config(args)?;
    let kripke = Kripke::new(&program, config.io);
    kripke.validate()?;
    let graph = explore(&kripke, &config.explore_config())?;
    out.write_all(render_dot(&graph, &kripke).as_bytes())?;
    Ok(())
}

/// Result of `check-reach`, mapped to the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Unavoidable,
    Counterexample,
    Incomplete,
}

impl Verdict {
    fn exit_code(self) -> u8 {
        match self {
            Verdict::Unavoidable => 0,
            Verdict::Counterexample => 1,
            Verdict::Incomplete => 2,
        }
    }
}

#[derive(Serialize)]
struct JsonOutcome<'a> {
    label: &'a str,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_reason: Option<StopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counterexample: Option<CounterexampleReport>,
    stats: SearchStats,
}

/// Settings from `--config` (if any) with command-line flags on top
fn resolve_config(args: &CheckReachArgs) -> anyhow::Result<CheckConfig> {
    let mut config = load_config(args.config.as_deref())?;

    config.io = args.io.apply(config.io);
    if let Some(n) = args.max_states {
        config.max_states = Some(n);
    }
    if let Some(secs) = args.time_limit {
        config.time_limit = Some(Duration::from_secs(secs));
    }
    if let Some(label) = &args.label {
        config.label = Some(label.clone());
    }
    Ok(config)
}

fn check_reach_file<W: Write>(
    args: &CheckReachArgs,
    palette: Palette,
    mut out: W,
) -> anyhow::Result<Verdict> {
    let program = load_program(&args.file)?;
    let config = resolve_config(args)?;
    let label = config
        .label
        .clone()
        .ok_or_else(|| anyhow!("no label given; pass one or set LABEL in the config file"))?;

    let result = check_reach(&program, &label, &config)?;
    let verdict = match &result.outcome {
        SearchOutcome::LabelUnavoidable => Verdict::Unavoidable,
        SearchOutcome::Counterexample(_) => Verdict::Counterexample,
        SearchOutcome::Incomplete(_) => Verdict::Incomplete,
    };

    if args.json {
        let json = JsonOutcome {
            label: &label,
            outcome: match verdict {
                Verdict::Unavoidable => "unavoidable",
                Verdict::Counterexample => "counterexample",
                Verdict::Incomplete => "incomplete",
            },
            stop_reason: match &result.outcome {
                SearchOutcome::Incomplete(reason) => Some(*reason),
                _ => None,
            },
            counterexample: result
                .outcome
                .counterexample()
                .map(|lasso| CounterexampleReport::new(&program, lasso, &label)),
            stats: result.stats,
        };
        serde_json::to_writer_pretty(&mut out, &json)?;
        writeln!(out)?;
        return Ok(verdict);
    }

    match &result.outcome {
        SearchOutcome::LabelUnavoidable => {
            let msg = format!("Label \"{}\" will always be reached.", label);
            writeln!(out, "{}", palette.green(&msg))?;
        }
        SearchOutcome::Counterexample(lasso) => {
            let report = CounterexampleReport::new(&program, lasso, &label);
            let msg = format!(
                "There exists a run for which the label \"{}\" will not be reached:",
                label
            );
            writeln!(out, "{}", palette.red(&msg))?;
            let mut line = palette.blue(&report.prefix);
            line.push_str(&palette.red(&report.cycle));
            for piece in &report.continuation {
                match piece {
                    Piece::Code(code) => line.push_str(&palette.blue(code)),
                    Piece::Label(_) => line.push_str(&palette.yellow(&piece.text())),
                }
            }
            writeln!(out, "{}", line)?;
            if lasso.kind == LassoKind::DeadEnd {
                if let Some(last) = lasso.cycle.last() {
                    writeln!(out, "The run gets stuck at pc {}.", last.pc())?;
                }
            }
        }
        SearchOutcome::Incomplete(reason) => {
            let msg = format!(
                "Search stopped before a verdict: {} ({} states visited).",
                reason, result.stats.states_visited
            );
            writeln!(out, "{}", palette.yellow(&msg))?;
        }
    }
    Ok(verdict)
}

// ============================================================================
// Entry point
// ============================================================================

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, palette: Palette) -> anyhow::Result<u8> {
    let stdout = std::io::stdout();
    match &cli.command {
        Commands::Execute(args) => {
            execute_file(args, std::io::stdin().lock(), stdout.lock())?;
            Ok(0)
        }
        Commands::Print { file, no_labels } => {
            print_file(file, *no_labels, stdout.lock())?;
            Ok(0)
        }
        Commands::Dot(args) => {
            dot_file(args, stdout.lock())?;
            Ok(0)
        }
        Commands::CheckReach(args) => {
            let verdict = check_reach_file(args, palette, stdout.lock())?;
            Ok(verdict.exit_code())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let palette = if !cli.no_color && std::io::stdout().is_terminal() {
        Palette { enabled: true }
    } else {
        Palette::plain()
    };

    match run(&cli, palette) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let color = Palette {
                enabled: !cli.no_color && std::io::stderr().is_terminal(),
            };
            eprintln!("{}", color.red(&format!("error: {:#}", e)));
            ExitCode::from(EXIT_ERROR)
        }
    }
}

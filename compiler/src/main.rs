use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::exit;

use pbc::codegen::CodegenOptions;
use pbc::pass::PassId;
use pbc::pipeline::{compute_provenance, run_pipeline, CompilationState};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum EmitStage {
    /// Generated Python module
    Code,
    /// Validation report as JSON
    Validation,
    /// Node emission order, one id per line
    Order,
    /// Normalized, type-synchronized snapshot as JSON
    Snapshot,
    /// Source hash, snapshot fingerprint and compiler version as JSON
    BuildInfo,
}

impl EmitStage {
    fn terminal(self) -> PassId {
        match self {
            EmitStage::Code => PassId::Codegen,
            EmitStage::Validation => PassId::Validate,
            EmitStage::Order => PassId::Sequence,
            EmitStage::Snapshot | EmitStage::BuildInfo => PassId::Sync,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "pbc",
    version,
    about = "Pipeline Builder Compiler: compiles node-graph snapshots to Kubeflow pipeline modules"
)]
struct Cli {
    /// Input snapshot (.json)
    snapshot: PathBuf,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Code)]
    emit: EmitStage,

    /// Omit the snapshot fingerprint comment from generated code
    #[arg(long)]
    no_fingerprint: bool,

    /// Print compiler passes and timing
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "pbc=debug" } else { "pbc=warn" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

fn write_output(path: Option<&Path>, text: &str) {
    let result = match path {
        Some(p) => std::fs::write(p, text),
        None => {
            use std::io::Write;
            std::io::stdout().write_all(text.as_bytes())
        }
    };
    if let Err(e) = result {
        let target = path.map_or_else(|| "stdout".to_string(), |p| p.display().to_string());
        eprintln!("pbc: error: {}: {}", target, e);
        exit(2);
    }
}

fn to_json_or_exit(result: Result<String, serde_json::Error>) -> String {
    match result {
        Ok(mut s) => {
            s.push('\n');
            s
        }
        Err(e) => {
            eprintln!("pbc: error: {}", e);
            exit(2);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::debug!(snapshot = %cli.snapshot.display(), emit = ?cli.emit, "starting");

    // ── Read snapshot ──
    let source = match std::fs::read_to_string(&cli.snapshot) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("pbc: error: {}: {}", cli.snapshot.display(), e);
            exit(2);
        }
    };
    let raw = match pbc::snapshot::parse_raw(&source) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("pbc: error: {}: {}", cli.snapshot.display(), e);
            exit(2);
        }
    };

    // ── Run passes ──
    let options = CodegenOptions {
        fingerprint: !cli.no_fingerprint,
    };
    let mut state = CompilationState::new(raw);
    let outcome = run_pipeline(&mut state, cli.emit.terminal(), &options, |_, diags| {
        for d in diags {
            eprintln!("pbc: {}", d);
        }
    });

    // The validation report is the product even when it lists errors.
    if cli.emit == EmitStage::Validation {
        if let Some(validation) = &state.validation {
            let text = to_json_or_exit(serde_json::to_string_pretty(validation));
            write_output(cli.output.as_deref(), &text);
        }
        exit(if state.has_error { 1 } else { 0 });
    }

    if let Err(e) = outcome {
        tracing::debug!(error = %e, "compilation stopped");
        exit(1);
    }

    // ── Emit ──
    let text = match cli.emit {
        EmitStage::Code => state.generated.map(|g| g.source).unwrap_or_default(),
        EmitStage::Order => state
            .order
            .unwrap_or_default()
            .iter()
            .map(|id| format!("{}\n", id))
            .collect(),
        EmitStage::Snapshot => match &state.snapshot {
            Some(s) => to_json_or_exit(s.to_json()),
            None => String::new(),
        },
        EmitStage::BuildInfo => match &state.snapshot {
            Some(s) => to_json_or_exit(compute_provenance(&source, s).to_json()),
            None => String::new(),
        },
        EmitStage::Validation => String::new(),
    };
    write_output(cli.output.as_deref(), &text);
}

#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use trace_bench::engine::ToolOverrides;
use trace_bench::run_cmd::RunOptions;
use trace_bench::{analyze_cmd, convert_cmd, run_cmd};

#[derive(Parser, Debug)]
#[command(name = "trace-bench")]
#[command(about = "Benchmark suite for PP trace generation and REPLAY verification", long_about = None)]
#[command(after_help = "Output structure:
  trace/           .trace files from PP
  replay/          .replay files from REPLAY
  replay-failures/ cases where PP succeeds but REPLAY fails
  misc/            files with no extension")]
struct Cli {
    /// Enable verbose output and debug logging (or set TRACE_BENCH_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every .but file through PP, then REPLAY
    Run {
        /// Directory containing .but files
        #[arg(default_value = ".")]
        directory: PathBuf,
        /// Path to krt binary
        #[arg(long)]
        krt: Option<PathBuf>,
        /// Path to PP.kin
        #[arg(long)]
        pp_kin: Option<PathBuf>,
        /// Path to REPLAY.kin
        #[arg(long)]
        replay_kin: Option<PathBuf>,
        /// Timeout in seconds for both stages
        #[arg(short = 't', long)]
        timeout: Option<f64>,
        /// Timeout for the PP stage (default: 60s)
        #[arg(long)]
        pp_timeout: Option<f64>,
        /// Timeout for the REPLAY stage (default: 120s)
        #[arg(long)]
        replay_timeout: Option<f64>,
        /// Base directory for output (default: same as input)
        #[arg(short = 'o', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Clean output directories before processing
        #[arg(long)]
        clean: bool,
        /// Write detailed results to this JSON file
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,
        /// Write one row per file to this CSV file
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
        /// Number of files processed concurrently
        #[arg(long)]
        jobs: Option<usize>,
        /// Minimal output (summary only)
        #[arg(short = 'q', long)]
        quiet: bool,
        /// TOML configuration file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Only convert .but files to .goal files with the TraceOn flag (no execution)
    Convert {
        #[arg(default_value = ".")]
        directory: PathBuf,
        #[arg(short = 'o', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        #[arg(short = 'q', long)]
        quiet: bool,
    },

    /// Re-run and classify the cases archived in replay-failures/
    Analyze {
        #[arg(default_value = ".")]
        directory: PathBuf,
        #[arg(long)]
        krt: Option<PathBuf>,
        #[arg(long)]
        replay_kin: Option<PathBuf>,
        #[arg(short = 'o', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("TRACE_BENCH_LOG").unwrap_or_else(|_| {
        if verbose { "trace_bench=debug".to_string() } else { "trace_bench=info".to_string() }
    });
    let _ = tracing_subscriber::fmt()
        .with_span_events(FmtSpan::ACTIVE)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            directory,
            krt,
            pp_kin,
            replay_kin,
            timeout,
            pp_timeout,
            replay_timeout,
            output_dir,
            clean,
            json,
            csv,
            jobs,
            quiet,
            config,
        } => run_cmd::run(RunOptions {
            directory,
            tools: ToolOverrides { krt, prove_module: pp_kin, replay_module: replay_kin },
            timeout,
            pp_timeout,
            replay_timeout,
            output_dir,
            clean,
            json,
            csv,
            jobs,
            quiet,
            verbose: cli.verbose,
            config,
        }),
        Commands::Convert { directory, output_dir, quiet } => convert_cmd::run(directory, output_dir, quiet),
        Commands::Analyze { directory, krt, replay_kin, output_dir, config } => analyze_cmd::run(
            directory,
            ToolOverrides { krt, prove_module: None, replay_module: replay_kin },
            output_dir,
            config,
        ),
    };

    if let Err(e) = result {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

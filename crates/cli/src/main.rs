mod queue;

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clipsync_core::{read_config, ClientConfig, MutationKind};
use tracing_subscriber::EnvFilter;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "clipsync.toml";

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Offline mutation queue tooling.
#[derive(Parser)]
#[command(name = "clipsync", version, about = "Offline mutation queue tooling")]
struct Cli {
    /// Configuration file (default: ./clipsync.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Queue directory, overriding `[queue] dir`
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log more (-v info, -vv debug). CLIPSYNC_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or modify the persisted mutation queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// List pending records in replay order
    List,

    /// Summarize the queue: count, oldest record, per-kind counts
    Status,

    /// Validate and append a mutation record
    Push {
        /// Mutation kind (like, bookmark, follow, reclip, comment, reply,
        /// commentLike, replyLike, view, share)
        kind: MutationKind,
        /// Post id, or the comment/reply id for commentLike and replyLike
        #[arg(long)]
        target: String,
        /// Acting user id
        #[arg(long)]
        user: String,
        /// Parent comment id (reply, replyLike)
        #[arg(long)]
        parent: Option<String>,
        /// Comment or reply text
        #[arg(long)]
        text: Option<String>,
        /// Acting user's handle (reclip, comment attribution)
        #[arg(long)]
        handle: Option<String>,
        /// Handle of the author being followed (follow)
        #[arg(long)]
        author: Option<String>,
    },

    /// Replay the queue against the configured remote
    Drain,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    };
    if let Some(dir) = cli.dir {
        config.queue.dir = dir;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("error: could not start runtime: {e}"), cli.output, cli.quiet);
            process::exit(1);
        }
    };

    let Commands::Queue { command } = cli.command;
    let code = rt.block_on(async {
        match command {
            QueueCommands::List => queue::cmd_list(&config, cli.output, cli.quiet).await,
            QueueCommands::Status => queue::cmd_status(&config, cli.output, cli.quiet).await,
            QueueCommands::Push {
                kind,
                target,
                user,
                parent,
                text,
                handle,
                author,
            } => {
                let args = queue::PushArgs {
                    kind,
                    target,
                    user,
                    parent,
                    text,
                    handle,
                    author,
                };
                queue::cmd_push(&config, args, cli.output, cli.quiet).await
            }
            QueueCommands::Drain => queue::cmd_drain(&config, cli.output, cli.quiet).await,
        }
    });
    process::exit(code);
}

/// Install the stderr log subscriber. `CLIPSYNC_LOG` takes precedence over
/// the `-v` count.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("CLIPSYNC_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<ClientConfig, String> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG);
            if !fallback.is_file() {
                return Ok(ClientConfig::default());
            }
            fallback
        }
    };
    read_config(&path).map_err(|e| format!("error: {e}"))
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

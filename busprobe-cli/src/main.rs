use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use busprobe_adapters::nats::NatsAdapter;
use busprobe_adapters::settings::NatsConfig;
use busprobe_adapters::{HealthSnapshot, ProbeContext, StreamSpec};

mod duration;

#[derive(Parser, Debug)]
#[command(name = "busprobe")]
#[command(about = "Health checks and stream management for NATS")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// NATS server URL (overrides the config file and NATS_SERVER)
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Config file with NATS settings (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to a .creds file for authentication
    #[arg(long, global = true)]
    credentials: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report connection and JetStream health as JSON
    Health(HealthArgs),

    /// Manage JetStream streams
    #[command(subcommand)]
    Stream(StreamCommand),
}

#[derive(Args, Debug)]
struct HealthArgs {
    /// Skip the JetStream probe
    #[arg(long)]
    no_jetstream: bool,

    /// Deadline for the JetStream probe (e.g., "2s", "500ms")
    #[arg(short, long, value_parser = duration::parse_duration)]
    timeout: Option<Duration>,

    /// Report repeatedly at this interval until interrupted
    #[arg(short, long, value_parser = duration::parse_interval)]
    watch: Option<Duration>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Exit with a failure code when the status is DOWN
    #[arg(long)]
    fail_on_down: bool,
}

#[derive(Subcommand, Debug)]
enum StreamCommand {
    /// Create a stream capturing the given subjects
    Create {
        /// Stream name
        name: String,

        /// Subject captured by the stream (repeatable)
        #[arg(short = 'S', long = "subject", required = true)]
        subjects: Vec<String>,
    },

    /// Delete a stream (succeeds if it does not exist)
    Delete {
        /// Stream name
        name: String,
    },

    /// Show a stream's subjects and message count
    Get {
        /// Stream name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = nats_config(&cli.connection)?;

    match cli.command {
        Command::Health(args) => run_health(config, args).await,
        Command::Stream(command) => run_stream(config, command).await,
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file and environment, then command-line overrides
fn nats_config(args: &ConnectionArgs) -> Result<NatsConfig> {
    let mut config =
        NatsConfig::load(args.config.as_deref()).context("Failed to load NATS settings")?;

    if let Some(server) = &args.server {
        config.server = server.clone();
    }
    if let Some(creds) = &args.credentials {
        config.credentials_file = Some(creds.clone());
    }

    Ok(config)
}

async fn run_health(mut config: NatsConfig, args: HealthArgs) -> Result<ExitCode> {
    if args.no_jetstream {
        config.jetstream = false;
    }

    let adapter = NatsAdapter::builder().config(config).build().await?;

    // Ctrl-C cancels an in-flight probe as well as the watch loop
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        }
    });

    let Some(interval) = args.watch else {
        let snapshot = adapter
            .health_with(&probe_context(args.timeout, &shutdown))
            .await;
        print_snapshot(&snapshot, args.pretty)?;
        return Ok(exit_code(&snapshot, args.fail_on_down));
    };

    debug!(interval = ?interval, "watching health");

    let mut ticker = tokio::time::interval(interval);
    let mut last = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = adapter
                    .health_with(&probe_context(args.timeout, &shutdown))
                    .await;
                if shutdown.is_cancelled() {
                    break;
                }
                print_snapshot(&snapshot, args.pretty)?;
                last = Some(snapshot);
            }
        }
    }

    Ok(last
        .map(|snapshot| exit_code(&snapshot, args.fail_on_down))
        .unwrap_or(ExitCode::SUCCESS))
}

fn probe_context(timeout: Option<Duration>, shutdown: &CancellationToken) -> ProbeContext {
    let ctx = match timeout {
        Some(timeout) => ProbeContext::with_timeout(timeout),
        None => ProbeContext::background(),
    };
    ctx.cancel_on(shutdown.clone())
}

fn print_snapshot(snapshot: &HealthSnapshot, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(snapshot)?
    } else {
        serde_json::to_string(snapshot)?
    };
    println!("{}", json);
    Ok(())
}

fn exit_code(snapshot: &HealthSnapshot, fail_on_down: bool) -> ExitCode {
    if should_fail(snapshot, fail_on_down) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn should_fail(snapshot: &HealthSnapshot, fail_on_down: bool) -> bool {
    fail_on_down && !snapshot.is_up()
}

async fn run_stream(config: NatsConfig, command: StreamCommand) -> Result<ExitCode> {
    let adapter = NatsAdapter::builder()
        .config(NatsConfig {
            jetstream: true,
            ..config
        })
        .build()
        .await?;

    let streams = adapter
        .stream_manager()
        .context("JetStream is not available")?;

    match command {
        StreamCommand::Create { name, subjects } => {
            streams
                .create_stream(&StreamSpec::new(name.as_str(), subjects))
                .await?;
            println!("{}", json!({ "stream": name, "created": true }));
        }
        StreamCommand::Delete { name } => {
            streams.delete_stream(&name).await?;
            println!("{}", json!({ "stream": name, "deleted": true }));
        }
        StreamCommand::Get { name } => {
            let mut stream = streams.get_stream(&name).await?;
            let info = stream
                .info()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to fetch stream info: {}", e))?;
            println!(
                "{}",
                json!({
                    "stream": info.config.name,
                    "subjects": info.config.subjects,
                    "messages": info.state.messages,
                })
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

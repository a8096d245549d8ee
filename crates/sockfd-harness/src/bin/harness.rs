//! CLI entrypoint for the sockfd harness.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use sockfd_harness::echo::{self, EchoOptions};
use sockfd_harness::structured_log::{LogEmitter, LogLevel, validate_log_file};
use sockfd_harness::{HarnessConfig, HarnessError, run_conformance};

/// Conformance and loopback tooling for sockfd.
#[derive(Debug, Parser)]
#[command(name = "sockfd-harness")]
#[command(about = "Conformance harness for the sockfd socket primitives")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// IPv4 host to bind and connect to (overrides SOCKFD_HARNESS_HOST).
    #[arg(long, global = true)]
    host: Option<String>,
    /// Short timeout in seconds for expected waits (overrides SOCKFD_HARNESS_TIMEOUT).
    #[arg(long, global = true)]
    short_timeout: Option<f64>,
    /// Minimum log level (overrides SOCKFD_HARNESS_LEVEL).
    #[arg(long, global = true)]
    level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the conformance scenarios against live loopback sockets.
    Conformance {
        /// Directory for the JSONL log and artifact index.
        #[arg(long, default_value = "target/sockfd-conformance")]
        out_dir: PathBuf,
        /// Run identifier embedded in every trace_id.
        #[arg(long)]
        run_id: Option<String>,
        /// Run only these scenarios (repeatable).
        #[arg(long = "scenario")]
        scenarios: Vec<String>,
        /// List scenario names and exit.
        #[arg(long)]
        list: bool,
    },
    /// Validate a structured JSONL log file.
    ValidateLog {
        #[arg(long)]
        log: PathBuf,
    },
    /// Serve a blocking echo server, one connection at a time.
    Echo {
        #[arg(long, default_value_t = 0)]
        port: u16,
        #[arg(long, default_value_t = 16)]
        backlog: i32,
        /// Seconds to wait for a connection before logging an idle tick.
        #[arg(long, default_value_t = 1.0)]
        accept_timeout: f64,
        /// Seconds a connection may stay silent before it is dropped.
        #[arg(long, default_value_t = 5.0)]
        io_timeout: f64,
        /// Exit after serving this many connections.
        #[arg(long)]
        max_connections: Option<usize>,
    },
    /// Connect, send a payload, and wait for the reply.
    Ping {
        #[arg(long)]
        port: u16,
        #[arg(long, default_value = "ping")]
        payload: String,
        #[arg(long, default_value_t = 2.0)]
        timeout: f64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = HarnessConfig::from_env().with_flags(
        cli.global.host,
        cli.global.short_timeout,
        cli.global.level.as_deref(),
    );

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("sockfd-harness: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &HarnessConfig) -> Result<(), HarnessError> {
    match command {
        Command::Conformance {
            out_dir,
            run_id,
            scenarios,
            list,
        } => {
            if list {
                for scenario in sockfd_harness::scenarios::all() {
                    println!("{:<36} {}", scenario.name, scenario.summary);
                }
                return Ok(());
            }
            let run_id = run_id.unwrap_or_else(default_run_id);
            let summary = run_conformance(config, &out_dir, &run_id, &scenarios)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.all_passed() {
                return Err(HarnessError::ScenariosFailed {
                    failed: summary.failed.len(),
                    total: summary.total,
                });
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            println!("{}: {lines} line(s), {} error(s)", log.display(), errors.len());
            if !errors.is_empty() {
                return Err(HarnessError::InvalidLog(errors.len()));
            }
        }
        Command::Echo {
            port,
            backlog,
            accept_timeout,
            io_timeout,
            max_connections,
        } => {
            let mut emitter =
                LogEmitter::to_stdout("echo", &default_run_id()).with_min_level(config.min_level);
            let (listener, port) = echo::bind_listener(&config.host, port, backlog)?;
            let listening = emitter
                .entry(LogLevel::Info, "listening")
                .with_handle(listener.get())
                .with_details(serde_json::json!({ "host": config.host, "port": port }));
            emitter.emit_entry(listening)?;
            emitter.flush()?;

            let options = EchoOptions {
                accept_timeout: Some(accept_timeout),
                io_timeout: Some(io_timeout),
                max_connections,
                ..EchoOptions::default()
            };
            let stats = echo::serve(listener.get(), &options, &mut emitter)?;
            let done = emitter.entry(LogLevel::Info, "echo_done").with_details(serde_json::json!({
                "connections": stats.connections,
                "bytes_echoed": stats.bytes_echoed,
                "idle_accepts": stats.idle_accepts,
            }));
            emitter.emit_entry(done)?;
            emitter.flush()?;
        }
        Command::Ping {
            port,
            payload,
            timeout,
        } => {
            let mut emitter =
                LogEmitter::to_stdout("ping", &default_run_id()).with_min_level(config.min_level);
            let result = echo::ping(&config.host, port, payload.as_bytes(), Some(timeout));
            echo::log_ping(&mut emitter, &config.host, port, Some(timeout), &result)?;
            result?;
        }
    }
    Ok(())
}

fn default_run_id() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("run-{secs}-{}", std::process::id())
}

//! Binary entrypoint for the smsgate CLI.
//!
//! Commands:
//! - `start [--port <path>]` - run the gateway, polling the queue server and relaying via the modem
//! - `init` - create a starter `config.toml`
//! - `status` - print the configuration summary
//! - `smoketest --port <path> [-b <baud>] [--timeout <s>]` - probe the modem link
//!
//! See the library crate docs for module-level details: `smsgate::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};

use smsgate::config::Config;
use smsgate::gateway::GatewayServer;
use smsgate::modem::{DisconnectedModem, SmsTransport};

#[derive(Parser)]
#[command(name = "smsgate")]
#[command(about = "An SMS gateway relaying queued messages through a GSM modem")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Start {
        /// Modem serial port (e.g., /dev/ttyUSB0); overrides the config value
        #[arg(short, long)]
        port: Option<String>,

        /// Run as a background daemon (Unix only)
        #[arg(short, long)]
        daemon: bool,

        /// PID file location (for daemon mode)
        #[arg(long, default_value = "/tmp/smsgate.pid")]
        pid_file: String,
    },
    /// Initialize a new gateway configuration
    Init,
    /// Show the gateway configuration summary
    Status,
    /// Run a modem smoke test: AT probe and text-mode setup
    SmokeTest {
        /// Modem serial port
        #[arg(short, long)]
        port: String,
        /// Baud rate
        #[arg(short = 'b', long, default_value_t = 115200)]
        baud: u32,
        /// Seconds to wait before giving up
        #[arg(short, long, default_value_t = 10)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (except for Init which writes it later).
    // Daemon mode Start skips early logging too - it initializes after forking.
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };

    match &cli.command {
        Commands::Start { daemon, .. } if *daemon => {
            // Skip logging init - will happen after fork in child process
        }
        Commands::Init => {
            // Init doesn't have config yet
        }
        _ => {
            init_logging(&pre_config, cli.verbose);
        }
    }

    match cli.command {
        Commands::Start {
            port,
            daemon,
            pid_file,
        } => {
            #[cfg(all(unix, feature = "daemon"))]
            if daemon {
                let config = match pre_config.clone() {
                    Some(c) => c,
                    None => Config::load(&cli.config).await?,
                };
                // Daemonize immediately - parent exits, child continues
                daemonize_process(&config, &pid_file)?;
                init_logging(&Some(config.clone()), cli.verbose);
                return run_gateway(config, port).await;
            }

            #[cfg(not(all(unix, feature = "daemon")))]
            if daemon {
                let _ = pid_file; // Suppress unused warning
                eprintln!("Error: Daemon mode requires Unix platform and 'daemon' feature.");
                eprintln!("Compile with: cargo build --features daemon");
                std::process::exit(1);
            }

            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            run_gateway(config, port).await?;
        }
        Commands::Init => {
            init_logging(&None, cli.verbose);
            info!("Initializing new gateway configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            let server = GatewayServer::new(
                config,
                Box::new(DisconnectedModem::new("status inspection only")),
            );
            server.show_status();
        }
        Commands::SmokeTest {
            port,
            baud,
            timeout,
        } => {
            #[cfg(not(feature = "serial"))]
            {
                let _ = (port, baud, timeout);
                eprintln!("Error: SmokeTest requires the 'serial' feature");
                std::process::exit(2);
            }
            #[cfg(feature = "serial")]
            {
                use smsgate::modem::GsmModem;
                info!("Starting smoke test on {} @ {} baud", port, baud);
                let probe = tokio::time::timeout(
                    std::time::Duration::from_secs(timeout),
                    tokio::task::spawn_blocking(move || -> Result<String> {
                        let mut modem = GsmModem::new(&port, baud)?;
                        modem.probe()?;
                        Ok(modem.port_name().to_string())
                    }),
                )
                .await;

                let (status_ok, detail) = match probe {
                    Ok(Ok(Ok(port_name))) => (true, format!("modem answered on {}", port_name)),
                    Ok(Ok(Err(e))) => (false, format!("{:#}", e)),
                    Ok(Err(join_err)) => (false, format!("probe task failed: {}", join_err)),
                    Err(_) => (false, format!("no answer within {}s", timeout)),
                };
                let payload = serde_json::json!({
                    "status": if status_ok { "ok" } else { "failed" },
                    "detail": detail,
                    "timeout_seconds": timeout,
                });
                println!("{}", payload);
                std::process::exit(if status_ok { 0 } else { 1 });
            }
        }
    }

    Ok(())
}

/// Shared startup path for foreground and daemonized `start`.
async fn run_gateway(config: Config, cli_port: Option<String>) -> Result<()> {
    info!("Starting smsgate v{}", env!("CARGO_PKG_VERSION"));

    // CLI overrides config; fallback to config when CLI absent
    let chosen_port = match cli_port {
        Some(port) => port,
        None => config.modem.port.clone(),
    };

    let transport = open_transport(&chosen_port, config.modem.baud_rate);
    let require_modem = config.gateway.require_modem_at_startup;

    let mut server = GatewayServer::new(config, transport);
    if let Err(e) = server.start_polling().await {
        if require_modem {
            return Err(e.context("modem required at startup"));
        }
        warn!("Gateway continuing with poller inactive (no usable modem)");
    }

    info!("Gateway running; Ctrl-C to stop");
    server.run().await
}

#[cfg(feature = "serial")]
fn open_transport(port: &str, baud_rate: u32) -> Box<dyn SmsTransport> {
    use smsgate::modem::GsmModem;
    match GsmModem::new(port, baud_rate) {
        Ok(modem) => Box::new(modem),
        Err(e) => {
            warn!("Failed to open modem on {}: {:#}", port, e);
            Box::new(DisconnectedModem::new(format!(
                "failed to open {}: {}",
                port, e
            )))
        }
    }
}

#[cfg(not(feature = "serial"))]
fn open_transport(_port: &str, _baud_rate: u32) -> Box<dyn SmsTransport> {
    Box::new(DisconnectedModem::new(
        "built without the 'serial' feature",
    ))
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from config; CLI verbosity overrides upward
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    if let Some(ref file) = log_file {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
        {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));

            // If stdout is a terminal we tee to both file and console.
            // In daemon mode stdout is redirected, so this is false.
            let is_tty = atty::is(atty::Stream::Stdout);

            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());

                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }

                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    // Daemon mode: don't write to fmt to avoid duplicates
                    Ok(())
                }
            });
        } else {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}

/// Daemonize the process (Unix only)
///
/// Respawns the binary detached from the terminal with stdio redirected
/// to the log file, then writes the child's PID and exits the parent.
#[cfg(all(unix, feature = "daemon"))]
fn daemonize_process(config: &Config, pid_file: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::process::Command;

    let log_path = config
        .logging
        .file
        .as_ref()
        .map(|s| s.as_str())
        .unwrap_or("smsgate.log");

    let current_exe = std::env::current_exe()?;
    let mut args: Vec<String> = std::env::args().collect();

    // Remove the --daemon flag to prevent infinite loop
    if let Some(pos) = args.iter().position(|arg| arg == "--daemon" || arg == "-d") {
        args.remove(pos);
    }

    // Skip the program name (args[0])
    let child_args = &args[1..];

    let log_file = OpenOptions::new().create(true).append(true).open(log_path)?;

    let child = Command::new(&current_exe)
        .args(child_args)
        .stdin(std::process::Stdio::null())
        .stdout(log_file.try_clone()?)
        .stderr(log_file)
        .spawn()?;

    std::fs::write(pid_file, format!("{}", child.id()))?;

    // Parent process exits here - child continues as daemon
    std::process::exit(0);
}

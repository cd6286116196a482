//! focus-timer - single-session focus timer
//!
//! One countdown lives in the daemon; the CLI and any number of display
//! surfaces drive and observe it over a Unix socket:
//! - `focus-timer daemon` owns the timer
//! - `focus-timer start --task-id ID --title TITLE` begins a session
//! - `focus-timer watch` follows the countdown live

use anyhow::Result;
use clap::{CommandFactory, Parser};

use focus_timer::cli::{Cli, Commands, Display, IpcClient};
use focus_timer::config::DaemonConfig;
use focus_timer::daemon::run_daemon;
use focus_timer::types::TimerEvent;

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(&cli);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` always wins. Otherwise the daemon logs at info with
/// timestamps, client commands only warn, and `--verbose` raises either
/// to debug.
fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let is_daemon = matches!(cli.command, Some(Commands::Daemon(_)));
    let default_level = match (cli.verbose, is_daemon) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt().with_env_filter(filter).with_target(false);
    if is_daemon {
        builder.init();
    } else {
        builder.without_time().init();
    }
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    let client = || match &cli.socket {
        Some(path) => IpcClient::with_socket_path(path.clone()),
        None => IpcClient::new(),
    };

    match cli.command.clone() {
        Some(Commands::Start(args)) => {
            let response = client().start(&args).await?;
            Display::show_start_success(&response);
        }
        Some(Commands::Pause) => {
            let response = client().pause().await?;
            Display::show_pause_success(&response);
        }
        Some(Commands::Resume) => {
            let response = client().resume().await?;
            Display::show_resume_success(&response);
        }
        Some(Commands::Restart) => {
            let response = client().restart().await?;
            Display::show_restart_success(&response);
        }
        Some(Commands::Close) => {
            let response = client().close().await?;
            Display::show_close_success(&response);
        }
        Some(Commands::Status) => {
            let response = client().status().await?;
            Display::show_status(&response);
        }
        Some(Commands::Drag) => {
            let response = client().drag().await?;
            Display::show_drag_success(&response);
        }
        Some(Commands::Watch) => {
            watch(client()).await?;
        }
        Some(Commands::Daemon(args)) => {
            let mut config = DaemonConfig::load(args.config.as_deref())?;
            if let Some(socket) = &cli.socket {
                config = config.with_socket_path(socket.clone());
            }
            run_daemon(config).await?;
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Prints the countdown until the session ends or the daemon goes away.
async fn watch(client: IpcClient) -> Result<()> {
    let mut stream = client.watch().await?;

    if let Some(snapshot) = stream.initial_snapshot() {
        println!("{}", Display::snapshot_line(snapshot));
    }

    while let Some(event) = stream.next_event().await? {
        if let Some(line) = Display::watch_line(&event) {
            println!("{}", line);
        }
        if matches!(event, TimerEvent::SessionEnded { .. }) {
            break;
        }
    }

    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================

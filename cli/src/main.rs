//! fsls - provision, launch and supervise the F# language server.
//!
//! ```text
//! fsls install   -> Activation::install -> Provisioner::ensure_installed
//! fsls serve     -> Activation::activate -> Supervisor + ProgressListener
//! fsls repl      -> ConsoleManager (dotnet fsi) <- stdin lines
//! fsls run/test  -> one-shot dotnet terminal
//! ```

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fsls::repl::{drive, run_to_completion};
use fsls::{Activation, StderrStatusBar};
use fsls_config::FslsConfig;
use fsls_console::{ConsoleExitReason, ConsoleManager, ConsoleSpec, ProcessTerminalHost};
use fsls_provision::InstallProgress;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(version, about = "F# language server launcher")]
struct Args {
    /// Path to configuration file (default ~/.fsls/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Download and install the language server if it is missing
    Install {
        /// Remove any existing installation first
        #[arg(long)]
        force: bool,
    },
    /// Start the language server and show its progress until it exits
    Serve {
        /// Workspace root (defaults to the current directory)
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
    /// Evaluate stdin line by line in the F# interactive console
    Repl,
    /// `dotnet run` the project in the current directory
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run a single test via `dotnet test --filter`
    Test {
        /// Test project file
        project: PathBuf,
        /// Fully qualified test name
        name: String,
    },
    /// Print the resolved platform and download URL
    Platform,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.fsls/logs/fsls.log
    if let Some(config_path) = FslsConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("fsls.log"));
    }

    candidates.push(PathBuf::from(".fsls").join("logs").join("fsls.log"));
    candidates
}

fn load_config(path: Option<&Path>) -> Result<FslsConfig> {
    let loaded = match path {
        Some(path) => FslsConfig::load_from(path)?,
        None => FslsConfig::load()?,
    };
    Ok(loaded.unwrap_or_default())
}

/// Print install phases on stderr while `ensure_installed` runs.
fn spawn_install_reporter() -> mpsc::Sender<InstallProgress> {
    let (tx, mut rx) = mpsc::channel(16);
    tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            match progress {
                InstallProgress::Downloading {
                    received,
                    total: Some(total),
                } if total > 0 => {
                    eprint!("\rDownloading F# language server ({}%)", received * 100 / total);
                }
                InstallProgress::Downloading { received, .. } => {
                    eprint!("\rDownloading F# language server ({} KiB)", received / 1024);
                }
                InstallProgress::Extracting => eprintln!("\nExtracting..."),
                InstallProgress::Complete { executable } => {
                    eprintln!("Installed {}", executable.display());
                }
            }
        }
    });
    tx
}

async fn install(config: &FslsConfig, force: bool) -> Result<()> {
    let activation = Activation::from_config(config)?.with_progress(spawn_install_reporter());
    let executable = if force {
        activation.reinstall().await
    } else {
        activation.install().await
    }
    .context("failed to install the F# language server")?;
    println!("{}", executable.display());
    Ok(())
}

async fn serve(config: &FslsConfig, workspace: Option<PathBuf>) -> Result<()> {
    let workspace = match workspace {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to read the current directory")?,
    };
    let activation = Activation::from_config(config)?.with_progress(spawn_install_reporter());
    let mut session = activation.activate(&workspace, StderrStatusBar).await?;

    tokio::select! {
        reason = session.supervisor.wait_stopped() => {
            tracing::warn!(?reason, "Language server stopped");
            if let Some(reason) = reason {
                eprintln!("F# language server stopped: {reason:?}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping language server");
        }
    }

    session.shutdown().await;
    Ok(())
}

async fn repl(config: &FslsConfig) -> Result<ExitCode> {
    let mut consoles = ConsoleManager::new(ProcessTerminalHost, config.console_spec());
    let exit = drive(&mut consoles, BufReader::new(tokio::io::stdin())).await?;
    Ok(match exit.reason {
        ConsoleExitReason::Exited(Some(code)) if code != 0 => exit_code(Some(code)),
        _ => ExitCode::SUCCESS,
    })
}

fn exit_code(code: Option<i32>) -> ExitCode {
    match code {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    }
}

fn platform(config: &FslsConfig) -> Result<()> {
    let activation = Activation::from_config(config)?;
    let signature = activation.platform()?;
    let release = activation
        .provisioner()
        .repository()
        .describe(signature, activation.channel())?;
    println!("platform:    {signature}");
    println!("channel:     {}", activation.channel());
    println!("url:         {}", release.url);
    println!(
        "executable:  {}",
        activation.install_dir().join(&release.executable).display()
    );
    Ok(())
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;

    match args.cmd {
        Cmd::Install { force } => install(&config, force).await.map(|()| ExitCode::SUCCESS),
        Cmd::Serve { workspace } => serve(&config, workspace).await.map(|()| ExitCode::SUCCESS),
        Cmd::Repl => repl(&config).await,
        Cmd::Run { args } => {
            let root = std::env::current_dir().context("failed to read the current directory")?;
            let spec = ConsoleSpec::run_project(&root, &args);
            run_to_completion(&mut ProcessTerminalHost, &spec)
                .await
                .map(exit_code)
        }
        Cmd::Test { project, name } => {
            let spec = ConsoleSpec::run_test(&project, &name);
            run_to_completion(&mut ProcessTerminalHost, &spec)
                .await
                .map(exit_code)
        }
        Cmd::Platform => platform(&config).map(|()| ExitCode::SUCCESS),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

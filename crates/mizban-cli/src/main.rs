//! Mizban - self-hosted LAN file sharing server.
//!
//! Start it, scan the QR code printed in the terminal, and share files with
//! any device on the same network.
//!
//! ```bash
//! mizban                      # serve with defaults
//! mizban --web-dir ./web      # serve a specific front-end build
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tempfile::TempDir;

use mizban_core::config::Settings;
use mizban_core::server::{ExitReason, Runtime};
use mizban_core::{qr, web};

#[derive(Debug, Parser)]
#[command(name = "mizban", version, about = "LAN file sharing server")]
struct Cli {
    /// Path to the front-end assets directory.
    #[arg(long = "web-dir")]
    web_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    let settings = Arc::new(Settings::new().context("failed to load configuration")?);
    let (web_dir, _web_dir_guard) = resolve_or_materialize_web_dir(cli.web_dir.as_deref())?;

    let runtime = Runtime::new(Arc::clone(&settings), &web_dir)
        .await
        .context("failed to start Mizban server")?;

    print_banner(&runtime.share_dir(), &runtime.url(), &runtime.admin_url());
    match qr::generate_ascii(&runtime.url()) {
        Ok(code) => println!("{code}"),
        Err(err) => println!("QR code unavailable: {err}"),
    }

    let reason = runtime
        .run(shutdown_signal())
        .await
        .context("Mizban stopped with error")?;

    if reason == ExitReason::Restart {
        restart_self().context("Mizban restart failed")?;
    }
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,mizban=info,mizban_core=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

/// Locate an on-disk web directory, or unpack the embedded assets into a
/// temp directory that lives as long as the returned guard.
fn resolve_or_materialize_web_dir(explicit: Option<&Path>) -> Result<(PathBuf, Option<TempDir>)> {
    if let Some(dir) = web::assets::resolve_web_dir(explicit) {
        return Ok((dir, None));
    }
    if let Some(explicit) = explicit {
        anyhow::bail!(
            "web assets not found at {} (no index.html)",
            explicit.display()
        );
    }

    let temp = tempfile::Builder::new()
        .prefix("mizban-web-")
        .tempdir()
        .context("failed to create temp directory for web assets")?;
    web::assets::materialize_to(temp.path()).context("failed to unpack embedded web assets")?;
    Ok((temp.path().to_path_buf(), Some(temp)))
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Re-exec the current binary with the same arguments.
#[cfg(unix)]
fn restart_self() -> Result<()> {
    use std::os::unix::process::CommandExt;

    let exe = std::env::current_exe().context("cannot locate current executable")?;
    let args: Vec<_> = std::env::args_os().skip(1).collect();

    // exec only returns on failure.
    let err = std::process::Command::new(&exe).args(&args).exec();
    Err(err).context("failed to re-exec")
}

/// Spawn a fresh copy of the current binary and exit.
#[cfg(not(unix))]
fn restart_self() -> Result<()> {
    let exe = std::env::current_exe().context("cannot locate current executable")?;
    let args: Vec<_> = std::env::args_os().skip(1).collect();

    std::process::Command::new(&exe)
        .args(&args)
        .stdin(std::process::Stdio::inherit())
        .stdout(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .spawn()
        .context("failed to respawn")?;
    std::process::exit(0);
}

fn print_banner(shared_dir: &Path, access_url: &str, admin_url: &str) {
    println!();
    println!("[MZ]  Mizban - LAN File Sharing Server");
    println!();
    println!("[DIR] Shared folder : {}", shared_dir.display());
    println!("[URL] Client URL    : {access_url}");
    println!("[ADM] Local settings: {admin_url}");
    println!("[QR]  QR code       : Scan below for client URL");
    println!();
}

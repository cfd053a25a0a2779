//! # Mizban Core Library
//!
//! `mizban-core` provides the server-side functionality for Mizban, a
//! self-hosted LAN file sharing server. Devices on the same network open a
//! URL (discoverable via a printed QR code), browse the shared directory,
//! download files with range/resume support, and upload new files - including
//! very large ones - through a parallel, resumable chunked transfer protocol.
//!
//! ## Modules
//!
//! - [`config`] - JSON key/value settings store under `~/.config/Mizban`
//! - [`share`] - shared-root directory manager and path safety primitives
//! - [`uploads`] - chunked upload session manager (the concurrency core)
//! - [`web`] - HTTP surface: transfer endpoints, admin API, static assets
//! - [`net`] - port binding with retry, socket tuning, LAN discovery
//! - [`server`] - runtime wiring: serve loop, restart signal, shutdown
//! - [`qr`] - QR code rendering for the terminal banner and admin page
//! - [`thumb`] - best-effort image thumbnails
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mizban_core::config::Settings;
//! use mizban_core::server::Runtime;
//!
//! let settings = Arc::new(Settings::new()?);
//! let runtime = Runtime::new(settings, "./web").await?;
//! println!("Serving on {}", runtime.url());
//! runtime.run(shutdown_signal()).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod config;
pub mod error;
pub mod net;
pub mod qr;
pub mod server;
pub mod share;
pub mod thumb;
pub mod uploads;
pub mod web;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;

/// Default number of parallel chunk streams advertised to clients
pub const DEFAULT_PARALLEL_CHUNKS: u64 = 8;

/// Default chunk size for uploads (4 MiB)
pub const DEFAULT_CHUNK_SIZE_BYTES: u64 = 4 * 1024 * 1024;

/// Smallest negotiable chunk size (256 KiB)
pub const MIN_CHUNK_SIZE_BYTES: u64 = 256 * 1024;

/// Largest negotiable chunk size (64 MiB)
pub const MAX_CHUNK_SIZE_BYTES: u64 = 64 * 1024 * 1024;

/// Hard upper bound on a single uploaded file (100 GiB)
pub const MAX_FILE_SIZE_LIMIT: u64 = 100 * 1024 * 1024 * 1024;

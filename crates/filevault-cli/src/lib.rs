//! # Filevault CLI
//!
//! Command-line front end for the filevault client SDK.
//!
//! This crate provides:
//! - **upload**: chunked upload with a live progress line, optionally encrypted
//! - **encrypt / decrypt**: local AES-GCM file encryption with exported keys
//! - **keygen**: a fresh key for the configured cipher suite
//! - **download**: fetch a file, optionally decrypting it
//!
//! Settings come from flags or `FILEVAULT_*` environment variables; a `.env`
//! file in the working directory is loaded first.

pub mod commands;
pub mod config;

pub use commands::{UploadOptions, UploadOutcome};
pub use config::ClientSettings;

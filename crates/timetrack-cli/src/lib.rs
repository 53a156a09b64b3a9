//! Time tracker CLI library.
//!
//! This crate provides the command-line client that talks to the tracker
//! server.

mod cli;
pub mod client;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use client::{ApiClient, ClientError};
pub use config::Config;

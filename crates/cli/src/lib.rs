//! `dualbook` command orchestration.
//!
//! The binary is a thin clap layer over these modules so the commands can be
//! driven from tests against temporary journal directories.

pub mod commands;
pub mod context;
pub mod layout;

pub use context::BookContext;

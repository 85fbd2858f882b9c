//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `pipeline-config` command-line tool. Each subcommand lives in its own
//! file to keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and
//!   options, derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic by calling into the `pipeline_config` library.

pub mod check;
pub mod generate;
pub mod save;

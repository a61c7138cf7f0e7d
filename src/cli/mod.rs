//! CLI module for arcane - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for chatting with the
//! local agent, delegating tasks and managing stored plans.

pub mod commands;

pub use commands::Cli;

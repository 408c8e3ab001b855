//! Crate entry point for **vup**.
//!
//! This library provides the implementation behind the `vup` CLI: it updates a set
//! of working copies that may belong to different version-control providers,
//! collects what changed and reports it once per round.
//! Each submodule encapsulates one responsibility (configuration, providers, the
//! update orchestration itself). The `pub use` re-exports make the commands and
//! the main types reachable from the crate root.

mod command;
mod config;
mod git;
mod paths;
mod providers;
mod roots;
pub mod update;

/// Re-export commonly used types and commands so they can be accessed from `vup::*`.
pub use command::{CommandProvider, parse_update_output};
pub use config::{CommandProviderConfig, Config, RootEntry, cmd_config, load_config, parse_config};
pub use git::GitProvider;
pub use paths::{Paths, paths, vup_home};
pub use providers::builtin_registry;
pub use roots::cmd_roots;
pub use update::{UpdateOptions, cmd_options, cmd_update};

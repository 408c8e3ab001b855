//! Multi-provider update orchestration.
//!
//! An update groups the configured roots by provider, validates every provider
//! up front, then runs a single background task ([`Updater`]) that calls each
//! provider in turn, refreshes the touched paths and reports the outcome.
//! Providers that need several passes leave a [`SequentialContext`] behind and
//! the task is resubmitted for another round.

mod context;
mod events;
mod files;
mod notify;
mod orchestrator;
mod progress;
mod provider;
mod refresh;
mod registry;
mod scheduler;
mod session;

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::providers::builtin_registry;

pub use context::SequentialContext;
pub use events::EventBus;
pub use files::{FileGroup, FileGroupId, UpdatedFiles};
pub use notify::{
    ConsoleErrorReporter, ConsoleNotifier, ConsoleTreeView, ErrorReporter, Notification,
    NotificationType, Notifier, UpdateTreeView, display_ids,
};
pub use orchestrator::{Collaborators, DEFAULT_MAX_ROUNDS, RoundReport, Updater};
pub use progress::{CancelToken, Canceled, ProgressIndicator};
pub use provider::{Configurable, NotificationStyle, ProviderKey, UpdateEnvironment};
pub use refresh::{FsRefresher, RefreshedPath, Refresher};
pub use registry::{ProviderRegistry, Root, VcsRootMap};
pub use scheduler::{BackgroundScheduler, Followup, Task};
pub use session::{GroupedErrors, HotfixToken, UpdateSession, VcsError};

/// Title used for progress, the update tree and error reports.
pub const ACTION_NAME: &str = "Update Project";

/// Options of a single `vup update` invocation.
#[derive(Debug, Default, Clone)]
pub struct UpdateOptions {
    /// Update only these paths instead of every configured root.
    pub roots: Vec<PathBuf>,
    /// Print provider options before running.
    pub show_options: bool,
    /// Overrides `max_rounds` from the configuration.
    pub max_rounds: Option<u32>,
    /// Canceled by the caller (e.g. on Ctrl-C) to stop at the next safe point.
    pub cancel: CancelToken,
}

/// Group `roots` by provider and validate every provider's options.
///
/// Nothing is touched when validation fails.
pub fn prepare_update(registry: &ProviderRegistry, roots: &[Root]) -> Result<VcsRootMap> {
    let map = registry.create_vcs_to_roots_map(roots);
    registry.validate(&map)?;
    Ok(map)
}

/// CLI command: update every configured root (or the requested subset).
///
/// Flow:
/// 1. Build the provider registry from the configuration (`git` + command providers).
/// 2. Map roots to providers and validate options; any failure aborts here.
/// 3. Optionally print each provider's options.
/// 4. Run the [`Updater`] on the background scheduler until the chain ends.
///
/// Returns whether the last round succeeded; a canceled update did not.
///
/// # Errors
/// - Returns an error if the registry cannot be built or validation fails.
/// - Returns an error if the background update panics.
pub fn cmd_update(cfg: &Config, opts: &UpdateOptions) -> Result<bool> {
    let registry = builtin_registry(cfg)?;
    let roots = cfg.select_roots(&opts.roots);
    if roots.is_empty() {
        eprintln!("no roots to update");
        return Ok(true);
    }

    let map = prepare_update(&registry, &roots)?;
    if map.is_empty() {
        eprintln!("no version-controlled roots to update");
        return Ok(true);
    }

    if opts.show_options {
        print_configurables(&registry, &map);
    }

    let paths: Vec<PathBuf> = map.values().flatten().cloned().collect();
    let updater = Updater::new(
        ACTION_NAME,
        paths,
        map,
        Arc::new(registry),
        Collaborators::console(EventBus::new()),
    )
    .with_max_rounds(opts.max_rounds.unwrap_or(cfg.max_rounds));

    let scheduler = BackgroundScheduler::new(opts.cancel.clone());
    let done = scheduler.run(updater)?;
    info!(rounds = done.rounds().len(), "update finished");
    Ok(done.last_round().is_some_and(|r| r.success))
}

/// CLI command: print the options each provider would update the configured roots with.
pub fn cmd_options(cfg: &Config) -> Result<()> {
    let registry = builtin_registry(cfg)?;
    let map = registry.create_vcs_to_roots_map(&cfg.select_roots(&[]));
    print_configurables(&registry, &map);
    Ok(())
}

fn print_configurables(registry: &ProviderRegistry, map: &VcsRootMap) {
    for (key, c) in registry.configurables(map) {
        println!("{} [{}]", c.title, key);
        for (name, value) in &c.options {
            println!("  {}: {}", name, value);
        }
    }
}

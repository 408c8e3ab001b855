use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::debug;

use crate::command::CommandProvider;
use crate::config::Config;
use crate::git::GitProvider;
use crate::update::{ProviderKey, ProviderRegistry};

pub const GIT: &str = "git";

/// Registry with the built-in git provider plus every `[providers.<name>]` table.
///
/// A configured `git` table replaces the built-in provider.
///
/// # Errors
/// - Returns an error if a configured provider has an empty `command`.
pub fn builtin_registry(cfg: &Config) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    registry.register(ProviderKey::new(GIT), Arc::new(GitProvider::new()));

    for (name, pc) in &cfg.providers {
        if pc.command.is_empty() {
            bail!("provider '{}' has an empty command", name);
        }
        debug!(provider = %name, command = ?pc.command, "registering command provider");
        registry.register(
            ProviderKey::new(name.as_str()),
            Arc::new(CommandProvider::new(name.clone(), pc)),
        );
    }
    Ok(registry)
}

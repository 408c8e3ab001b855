use anyhow::Result;

use crate::config::Config;
use crate::providers::builtin_registry;
use crate::update::{ProviderRegistry, Root};

/// CLI command: print every configured root with the provider that would update it.
///
/// Example output:
/// ```text
/// - /home/me/src/app (git)
/// - /home/me/src/legacy (svn)
/// - /home/me/notes (no provider)
/// ```
///
/// # Errors
/// - Returns an error if a configured provider is invalid.
pub fn cmd_roots(cfg: &Config) -> Result<()> {
    let registry = builtin_registry(cfg)?;
    for line in describe_roots(&registry, &cfg.select_roots(&[])) {
        println!("{}", line);
    }
    Ok(())
}

fn describe_roots(registry: &ProviderRegistry, roots: &[Root]) -> Vec<String> {
    roots
        .iter()
        .map(|root| {
            let provider = registry
                .vcs_for(root)
                .map(|k| k.to_string())
                .unwrap_or_else(|| "no provider".to_string());
            format!("- {} ({})", root.path.display(), provider)
        })
        .collect()
}

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tracing::{debug, warn};

use super::provider::{Configurable, ProviderKey, UpdateEnvironment};

/// A path taking part in an update, optionally pinned to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    pub path: PathBuf,
    pub provider: Option<ProviderKey>,
}

impl Root {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            provider: None,
        }
    }

    pub fn with_provider(path: impl Into<PathBuf>, provider: ProviderKey) -> Self {
        Self {
            path: path.into(),
            provider: Some(provider),
        }
    }
}

/// Roots grouped by the provider that owns them, in provider key order.
pub type VcsRootMap = BTreeMap<ProviderKey, Vec<PathBuf>>;

/// Explicit lookup table of the providers available to an update.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderKey, Arc<dyn UpdateEnvironment>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.providers.keys()).finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `key`, replacing any previous registration.
    ///
    /// Keys are case-insensitive, so `Git` and `git` name the same provider.
    pub fn register(&mut self, key: ProviderKey, provider: Arc<dyn UpdateEnvironment>) {
        self.providers.insert(key, provider);
    }

    /// Provider registered under `key`, if any.
    pub fn get(&self, key: &ProviderKey) -> Option<&Arc<dyn UpdateEnvironment>> {
        self.providers.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ProviderKey> {
        self.providers.keys()
    }

    /// Resolve the provider owning `root`: an explicit, registered provider wins,
    /// otherwise the first provider (by key) that detects the path.
    pub fn vcs_for(&self, root: &Root) -> Option<ProviderKey> {
        if let Some(key) = &root.provider {
            if self.providers.contains_key(key) {
                return Some(key.clone());
            }
            warn!(root = %root.path.display(), provider = %key, "unknown provider");
            return None;
        }
        self.providers
            .iter()
            .find(|(_, p)| p.detects(&root.path))
            .map(|(k, _)| k.clone())
    }

    /// Group roots by provider; roots without a provider are skipped and nested or
    /// duplicate roots of the same provider are collapsed into the outermost one.
    ///
    /// A path listed more than once is owned by a single provider: an explicit
    /// provider wins over detection, otherwise the first listing wins.
    pub fn create_vcs_to_roots_map(&self, roots: &[Root]) -> VcsRootMap {
        let mut owners: BTreeMap<&Path, (ProviderKey, bool)> = BTreeMap::new();
        for root in roots {
            let Some(key) = self.vcs_for(root) else {
                warn!(root = %root.path.display(), "no provider for root, skipping");
                continue;
            };
            let pinned = root.provider.is_some();
            match owners.get_mut(root.path.as_path()) {
                None => {
                    owners.insert(root.path.as_path(), (key, pinned));
                }
                Some((owner, owner_pinned)) if *owner == key => *owner_pinned |= pinned,
                Some((owner, owner_pinned)) if pinned && !*owner_pinned => {
                    *owner = key;
                    *owner_pinned = true;
                }
                Some((owner, _)) => warn!(
                    root = %root.path.display(),
                    kept = %owner,
                    ignored = %key,
                    "root listed for two providers"
                ),
            }
        }

        let mut map = VcsRootMap::new();
        for (path, (key, _)) in owners {
            map.entry(key).or_default().push(path.to_path_buf());
        }
        for (key, paths) in map.iter_mut() {
            *paths = filter_unique_roots(std::mem::take(paths));
            debug!(provider = %key, roots = paths.len(), "provider roots");
        }
        map
    }

    /// Ask every provider of `map` to validate its roots before anything runs.
    pub fn validate(&self, map: &VcsRootMap) -> Result<()> {
        for (key, roots) in map {
            let env = self
                .get(key)
                .ok_or_else(|| anyhow!("provider not registered: {}", key))?;
            env.validate_options(roots)
                .map_err(|e| anyhow!("{} options are not valid: {}", key, e))?;
        }
        Ok(())
    }

    /// Option descriptions of every provider in `map` that offers one.
    pub fn configurables(&self, map: &VcsRootMap) -> Vec<(ProviderKey, Configurable)> {
        map.iter()
            .filter_map(|(key, roots)| {
                let c = self.get(key)?.create_configurable(roots)?;
                Some((key.clone(), c))
            })
            .collect()
    }
}

/// Drop duplicates and roots lying inside another root of the list.
fn filter_unique_roots(mut roots: Vec<PathBuf>) -> Vec<PathBuf> {
    roots.sort();
    roots.dedup();
    let mut kept: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for r in roots {
        if !kept.iter().any(|k| r.starts_with(k)) {
            kept.push(r);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::testing::FakeProvider;

    fn registry() -> ProviderRegistry {
        let mut r = ProviderRegistry::new();
        r.register(
            ProviderKey::new("git"),
            Arc::new(FakeProvider::new().detecting("/git")),
        );
        r.register(
            ProviderKey::new("svn"),
            Arc::new(FakeProvider::new().detecting("/svn")),
        );
        r
    }

    #[test]
    fn unique_roots_drop_nested_and_duplicates() {
        let got = filter_unique_roots(vec![
            PathBuf::from("/a/b"),
            PathBuf::from("/a"),
            PathBuf::from("/a"),
            PathBuf::from("/ab"),
        ]);
        assert_eq!(got, vec![PathBuf::from("/a"), PathBuf::from("/ab")]);
    }

    #[test]
    fn explicit_provider_beats_detection() {
        let r = registry();
        let root = Root::with_provider("/git/app", ProviderKey::new("SVN"));
        assert_eq!(r.vcs_for(&root), Some(ProviderKey::new("svn")));
    }

    #[test]
    fn unknown_explicit_provider_resolves_to_none() {
        let r = registry();
        let root = Root::with_provider("/git/app", ProviderKey::new("hg"));
        assert_eq!(r.vcs_for(&root), None);
    }

    #[test]
    fn map_groups_by_detected_provider_and_skips_unknown() {
        let r = registry();
        let map = r.create_vcs_to_roots_map(&[
            Root::new("/git/one"),
            Root::new("/svn/two"),
            Root::new("/git/one/nested"),
            Root::new("/elsewhere"),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&ProviderKey::new("git")], vec![PathBuf::from("/git/one")]);
        assert_eq!(map[&ProviderKey::new("svn")], vec![PathBuf::from("/svn/two")]);
        assert!(!map.values().flatten().any(|p| p == Path::new("/elsewhere")));
    }

    #[test]
    fn pinned_listing_takes_a_detected_path_away_from_detection() {
        let r = registry();
        let map = r.create_vcs_to_roots_map(&[
            Root::new("/git/app"),
            Root::with_provider("/git/app", ProviderKey::new("svn")),
        ]);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&ProviderKey::new("svn")], vec![PathBuf::from("/git/app")]);
    }

    #[test]
    fn first_pin_wins_over_a_later_one() {
        let r = registry();
        let map = r.create_vcs_to_roots_map(&[
            Root::with_provider("/w/app", ProviderKey::new("git")),
            Root::with_provider("/w/app", ProviderKey::new("svn")),
            Root::new("/w/app"),
        ]);
        let owners: Vec<_> = map
            .iter()
            .filter(|(_, paths)| paths.iter().any(|p| p == Path::new("/w/app")))
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(owners, vec!["git"]);
    }

    #[test]
    fn debug_lists_registered_keys() {
        assert_eq!(format!("{:?}", registry()), r#"{ProviderKey("git"), ProviderKey("svn")}"#);
    }

    #[test]
    fn validation_failure_names_the_provider() {
        let mut r = ProviderRegistry::new();
        r.register(
            ProviderKey::new("git"),
            Arc::new(FakeProvider::new().invalid("no origin remote")),
        );
        let mut map = VcsRootMap::new();
        map.insert(ProviderKey::new("git"), vec![PathBuf::from("/git/x")]);

        let err = r.validate(&map).unwrap_err().to_string();
        assert!(err.contains("git options are not valid"), "{err}");
        assert!(err.contains("no origin remote"), "{err}");
    }
}

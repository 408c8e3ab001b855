use std::fmt;
use std::path::{Path, PathBuf};

use super::context::SequentialContext;
use super::files::UpdatedFiles;
use super::progress::ProgressIndicator;
use super::session::{HotfixToken, UpdateSession, VcsError};

/// Short lowercase name a provider is registered under (`git`, `svn`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderKey(String);

impl ProviderKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().to_lowercase())
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a provider wants a lone successful session to be announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStyle {
    /// Compound tree + summary built by the orchestrator.
    Standard,
    /// The session's own [`UpdateSession::custom_notification`].
    Custom,
}

/// Human-readable description of the options a provider will update with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configurable {
    pub title: String,
    pub options: Vec<(String, String)>,
}

/// The update protocol a version-control provider implements.
///
/// Only `update_directories` is mandatory; everything else has a neutral default.
pub trait UpdateEnvironment: Send + Sync {
    /// Whether `path` is under this provider's control when no provider is configured.
    fn detects(&self, _path: &Path) -> bool {
        false
    }

    /// Register provider-specific groups before the update runs.
    fn fill_groups(&self, _files: &mut UpdatedFiles) {}

    /// Checked for every provider before any update starts.
    fn validate_options(&self, _roots: &[PathBuf]) -> Result<(), VcsError> {
        Ok(())
    }

    fn create_configurable(&self, _roots: &[PathBuf]) -> Option<Configurable> {
        None
    }

    /// Update `roots`, filing changed paths into `files`.
    ///
    /// `context` is whatever this provider left behind in the previous round of a
    /// chain (`None` on the first round); the provider may replace or update it.
    fn update_directories(
        &self,
        roots: &[PathBuf],
        files: &mut UpdatedFiles,
        progress: &ProgressIndicator,
        context: &mut Option<SequentialContext>,
    ) -> UpdateSession;

    fn notification_style(&self) -> NotificationStyle {
        NotificationStyle::Standard
    }

    /// Split errors into hotfix buckets; the default puts everything in the default bucket.
    fn group_errors(&self, errors: Vec<VcsError>) -> Vec<(Option<HotfixToken>, Vec<VcsError>)> {
        vec![(None, errors)]
    }
}

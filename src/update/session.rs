use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::notify::Notification;

/// Error reported by a provider while validating or updating its roots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VcsError {
    #[error("{}: {message}", .root.display())]
    Validation { root: PathBuf, message: String },
    #[error("{}: {message}", .root.display())]
    Update { root: PathBuf, message: String },
    #[error("{}: network error: {message}", .root.display())]
    Network { root: PathBuf, message: String },
    #[error("{}: authentication failed: {message}", .root.display())]
    Authentication { root: PathBuf, message: String },
    /// A chained update could not continue.
    #[error("{0}")]
    Interrupted(String),
}

/// Key of an error bucket that a guided fix action can act on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HotfixToken(String);

impl HotfixToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HotfixToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors of one round bucketed by hotfix token; `None` is the default bucket.
///
/// Buckets never hold an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedErrors {
    buckets: BTreeMap<Option<HotfixToken>, Vec<VcsError>>,
}

impl GroupedErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `errors` to the bucket of `token`; an empty list is dropped.
    pub fn put(&mut self, token: Option<HotfixToken>, errors: Vec<VcsError>) {
        if errors.is_empty() {
            return;
        }
        self.buckets.entry(token).or_default().extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of errors over all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Errors filed under `token`; `None` is the default bucket.
    pub fn bucket(&self, token: Option<&HotfixToken>) -> Option<&[VcsError]> {
        self.buckets.get(&token.cloned()).map(Vec::as_slice)
    }

    pub fn buckets(&self) -> impl Iterator<Item = (Option<&HotfixToken>, &[VcsError])> {
        self.buckets.iter().map(|(k, v)| (k.as_ref(), v.as_slice()))
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

/// Result of a single provider's update call.
#[derive(Debug, Clone, Default)]
pub struct UpdateSession {
    errors: Vec<VcsError>,
    canceled: bool,
    additional_content: Option<String>,
    custom_notification: Option<Notification>,
}

impl UpdateSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> &[VcsError] {
        &self.errors
    }

    /// Record a per-root failure; the update of other roots goes on.
    pub fn push_error(&mut self, error: VcsError) {
        self.errors.push(error);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    pub fn mark_canceled(&mut self) {
        self.canceled = true;
    }

    /// Extra text appended to the standard "files updated" notification.
    pub fn additional_content(&self) -> Option<&str> {
        self.additional_content.as_deref()
    }

    pub fn set_additional_content(&mut self, content: impl Into<String>) {
        self.additional_content = Some(content.into());
    }

    /// Notification shown instead of the standard one when this is the only session
    /// and its provider uses [`NotificationStyle::Custom`](super::NotificationStyle).
    pub fn custom_notification(&self) -> Option<&Notification> {
        self.custom_notification.as_ref()
    }

    pub fn set_custom_notification(&mut self, notification: Notification) {
        self.custom_notification = Some(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(msg: &str) -> VcsError {
        VcsError::Update {
            root: PathBuf::from("/r"),
            message: msg.to_string(),
        }
    }

    #[test]
    fn empty_lists_are_never_inserted() {
        let mut g = GroupedErrors::new();
        g.put(Some(HotfixToken::new("network")), Vec::new());
        g.put(None, Vec::new());
        assert!(g.is_empty());
        assert_eq!(g.len(), 0);
    }

    #[test]
    fn same_token_merges_into_one_bucket() {
        let mut g = GroupedErrors::new();
        let net = HotfixToken::new("network");
        g.put(Some(net.clone()), vec![err("a")]);
        g.put(Some(net.clone()), vec![err("b"), err("c")]);
        g.put(None, vec![err("d")]);

        assert_eq!(g.buckets().count(), 2);
        assert_eq!(g.bucket(Some(&net)).unwrap().len(), 3);
        assert_eq!(g.bucket(None).unwrap(), &[err("d")]);
        assert_eq!(g.len(), 4);
    }

    #[test]
    fn error_messages_name_the_root() {
        let e = VcsError::Network {
            root: PathBuf::from("/src/app"),
            message: "timed out".into(),
        };
        assert_eq!(e.to_string(), "/src/app: network error: timed out");
    }
}

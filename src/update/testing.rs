//! In-memory provider and recording collaborators shared by the update tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::context::SequentialContext;
use super::events::EventBus;
use super::files::{FileGroupId, UpdatedFiles};
use super::notify::{ErrorReporter, Notification, NotificationType, Notifier, UpdateTreeView};
use super::orchestrator::Collaborators;
use super::progress::ProgressIndicator;
use super::provider::{NotificationStyle, UpdateEnvironment};
use super::refresh::{RefreshedPath, Refresher};
use super::session::{GroupedErrors, HotfixToken, UpdateSession, VcsError};

#[derive(Default)]
pub struct FakeProvider {
    detect_prefix: Option<PathBuf>,
    invalid: Option<String>,
    files: Option<(FileGroupId, usize)>,
    errors: Vec<VcsError>,
    additional: Option<String>,
    style: Option<NotificationStyle>,
    cancel_session: bool,
    cancel_during_update: bool,
    chain: usize,
    forever: bool,
    token: Option<HotfixToken>,
    calls: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detecting(mut self, prefix: &str) -> Self {
        self.detect_prefix = Some(PathBuf::from(prefix));
        self
    }

    pub fn invalid(mut self, message: &str) -> Self {
        self.invalid = Some(message.to_string());
        self
    }

    pub fn with_files(mut self, group: FileGroupId, n: usize) -> Self {
        self.files = Some((group, n));
        self
    }

    pub fn with_error(mut self, error: VcsError) -> Self {
        self.errors.push(error);
        self
    }

    pub fn with_additional(mut self, content: &str) -> Self {
        self.additional = Some(content.to_string());
        self
    }

    pub fn custom(mut self) -> Self {
        self.style = Some(NotificationStyle::Custom);
        self
    }

    pub fn canceling_session(mut self) -> Self {
        self.cancel_session = true;
        self
    }

    pub fn cancel_during_update(mut self) -> Self {
        self.cancel_during_update = true;
        self
    }

    /// Ask for `extra` more rounds after the first one.
    pub fn chaining(mut self, extra: usize) -> Self {
        self.chain = extra;
        self
    }

    /// Ask for another round every time.
    pub fn forever(mut self) -> Self {
        self.forever = true;
        self
    }

    pub fn grouping_under(mut self, token: HotfixToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl UpdateEnvironment for FakeProvider {
    fn detects(&self, path: &Path) -> bool {
        self.detect_prefix.as_ref().is_some_and(|p| path.starts_with(p))
    }

    fn validate_options(&self, roots: &[PathBuf]) -> Result<(), VcsError> {
        match &self.invalid {
            Some(message) => Err(VcsError::Validation {
                root: roots.first().cloned().unwrap_or_default(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn update_directories(
        &self,
        roots: &[PathBuf],
        files: &mut UpdatedFiles,
        progress: &ProgressIndicator,
        context: &mut Option<SequentialContext>,
    ) -> UpdateSession {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let root = roots.first().cloned().unwrap_or_default();

        let mut n = 0;
        if let Some((group, count)) = self.files {
            for i in 0..count {
                files.add(group, root.join(format!("file{}.txt", i)));
            }
            n = count;
        }

        let mut session = UpdateSession::new();
        for e in &self.errors {
            session.push_error(e.clone());
        }
        if let Some(a) = &self.additional {
            session.set_additional_content(a.clone());
        }
        if self.style == Some(NotificationStyle::Custom) {
            session.set_custom_notification(Notification::new(
                format!("{} files via fake", n),
                "",
                NotificationType::Information,
                "fake.custom",
            ));
        }
        if self.cancel_session {
            session.mark_canceled();
        }
        if self.cancel_during_update {
            progress.cancel();
        }

        if self.forever {
            *context = Some(SequentialContext::new(
                ["again".to_string()],
                "fake chain interrupted",
            ));
        } else if self.chain > 0 {
            if let Some(ctx) = context.as_mut() {
                ctx.next_step();
            } else {
                let steps = (2..=self.chain + 1).map(|i| format!("step{}", i));
                *context = Some(SequentialContext::new(steps, "fake chain interrupted"));
            }
        }
        session
    }

    fn notification_style(&self) -> NotificationStyle {
        self.style.unwrap_or(NotificationStyle::Standard)
    }

    fn group_errors(&self, errors: Vec<VcsError>) -> Vec<(Option<HotfixToken>, Vec<VcsError>)> {
        vec![(self.token.clone(), errors)]
    }
}

/// Collaborators that remember every call.
#[derive(Default, Clone)]
pub struct Recorder {
    notifications: Arc<Mutex<Vec<Notification>>>,
    errors: Arc<Mutex<Vec<(String, GroupedErrors)>>>,
    trees: Arc<Mutex<Vec<(String, usize, bool)>>>,
    published: Arc<Mutex<Vec<Vec<PathBuf>>>>,
}

impl Recorder {
    pub fn collaborators(&self) -> Collaborators {
        let mut events = EventBus::new();
        let published = Arc::clone(&self.published);
        events.subscribe(move |paths| published.lock().unwrap().push(paths.to_vec()));
        Collaborators {
            notifier: Arc::new(self.clone()),
            errors: Arc::new(self.clone()),
            tree_view: Arc::new(self.clone()),
            refresher: Arc::new(self.clone()),
            events: Arc::new(events),
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn error_reports(&self) -> Vec<(String, GroupedErrors)> {
        self.errors.lock().unwrap().clone()
    }

    pub fn trees(&self) -> Vec<(String, usize, bool)> {
        self.trees.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<Vec<PathBuf>> {
        self.published.lock().unwrap().clone()
    }
}

impl Notifier for Recorder {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

impl ErrorReporter for Recorder {
    fn show_errors(&self, errors: &GroupedErrors, title: &str) {
        self.errors
            .lock()
            .unwrap()
            .push((title.to_string(), errors.clone()));
    }
}

impl UpdateTreeView for Recorder {
    fn show_update_tree(&self, files: &UpdatedFiles, title: &str, canceled: bool) {
        self.trees
            .lock()
            .unwrap()
            .push((title.to_string(), files.file_count(), canceled));
    }
}

impl Refresher for Recorder {
    fn refresh(&self, files: &UpdatedFiles) -> Vec<RefreshedPath> {
        files
            .paths_deleted_first()
            .into_iter()
            .map(|path| RefreshedPath { path, exists: true })
            .collect()
    }
}

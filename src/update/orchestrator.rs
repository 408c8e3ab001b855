use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::context::SequentialContext;
use super::events::EventBus;
use super::files::{FileGroup, FileGroupId, UpdatedFiles};
use super::notify::{
    ConsoleErrorReporter, ConsoleNotifier, ConsoleTreeView, ErrorReporter, Notification,
    NotificationType, Notifier, UpdateTreeView, display_ids,
};
use super::progress::{Canceled, ProgressIndicator};
use super::provider::{NotificationStyle, ProviderKey, UpdateEnvironment};
use super::refresh::{FsRefresher, Refresher};
use super::registry::{ProviderRegistry, VcsRootMap};
use super::scheduler::{Followup, Task};
use super::session::{GroupedErrors, UpdateSession, VcsError};

/// Chain length used when nothing else is configured.
pub const DEFAULT_MAX_ROUNDS: u32 = 32;

/// Everything the orchestrator reports to or refreshes through.
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub errors: Arc<dyn ErrorReporter>,
    pub tree_view: Arc<dyn UpdateTreeView>,
    pub refresher: Arc<dyn Refresher>,
    pub events: Arc<EventBus>,
}

impl Collaborators {
    /// Terminal output and local file-system refresh.
    pub fn console(events: EventBus) -> Self {
        Self {
            notifier: Arc::new(ConsoleNotifier),
            errors: Arc::new(ConsoleErrorReporter),
            tree_view: Arc::new(ConsoleTreeView),
            refresher: Arc::new(FsRefresher),
            events: Arc::new(events),
        }
    }
}

/// What one round ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub round: u32,
    pub success: bool,
    pub canceled: bool,
    pub file_count: usize,
    pub error_count: usize,
    /// Another round was scheduled after this one.
    pub continued: bool,
    pub notification: Option<Notification>,
}

/// Runs every provider's update over its roots, one provider at a time, and
/// reports the combined result.
///
/// Scheduled through [`BackgroundScheduler`](super::BackgroundScheduler); a chain
/// of rounds is the same `Updater` resubmitted after [`Updater::reset`].
pub struct Updater {
    action_name: String,
    roots: Vec<PathBuf>,
    vcs_to_roots: VcsRootMap,
    registry: Arc<ProviderRegistry>,
    collaborators: Collaborators,
    max_rounds: u32,

    updated_files: UpdatedFiles,
    grouped_errors: GroupedErrors,
    sessions: Vec<UpdateSession>,
    update_number: u32,
    context_info: BTreeMap<ProviderKey, Option<SequentialContext>>,
    reports: Vec<RoundReport>,
}

impl Updater {
    /// Updater for one chain of rounds.
    ///
    /// `roots` are all paths taking part, used for logging and refresh;
    /// `vcs_to_roots` is the validated provider mapping from
    /// [`ProviderRegistry::create_vcs_to_roots_map`]. Every key must be
    /// registered in `registry`; unknown keys are skipped with a warning.
    pub fn new(
        action_name: impl Into<String>,
        roots: Vec<PathBuf>,
        vcs_to_roots: VcsRootMap,
        registry: Arc<ProviderRegistry>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            action_name: action_name.into(),
            roots,
            vcs_to_roots,
            registry,
            collaborators,
            max_rounds: DEFAULT_MAX_ROUNDS,
            updated_files: UpdatedFiles::new(),
            grouped_errors: GroupedErrors::new(),
            sessions: Vec::new(),
            update_number: 1,
            context_info: BTreeMap::new(),
            reports: Vec::new(),
        }
    }

    /// Stop a chain after `max_rounds` rounds; `0` leaves termination to providers.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn rounds(&self) -> &[RoundReport] {
        &self.reports
    }

    pub fn last_round(&self) -> Option<&RoundReport> {
        self.reports.last()
    }

    pub fn grouped_errors(&self) -> &GroupedErrors {
        &self.grouped_errors
    }

    fn reset(&mut self) {
        self.updated_files = UpdatedFiles::new();
        self.grouped_errors.clear();
        self.sessions.clear();
        self.update_number += 1;
    }

    fn update_providers(&mut self, indicator: &ProgressIndicator) -> Result<(), Canceled> {
        let to_process = self.vcs_to_roots.len();
        let mut processed = 0usize;

        for (key, roots) in &self.vcs_to_roots {
            indicator.check_canceled()?;
            let Some(env) = self.registry.get(key) else {
                warn!(provider = %key, "provider disappeared from registry");
                continue;
            };

            env.fill_groups(&mut self.updated_files);
            let mut context = self.context_info.remove(key).flatten();

            indicator.set_text(format!("updating {} ({} roots)", key, roots.len()));
            debug!(provider = %key, roots = roots.len(), "provider update started");
            let session = env.update_directories(roots, &mut self.updated_files, indicator, &mut context);
            debug!(
                provider = %key,
                errors = session.errors().len(),
                canceled = session.is_canceled(),
                "provider update finished"
            );

            self.context_info.insert(key.clone(), context);
            processed += 1;
            indicator.set_fraction(processed as f64 / to_process as f64);
            indicator.set_text2("");

            gather_errors(&mut self.grouped_errors, env.as_ref(), session.errors().to_vec());
            self.sessions.push(session);
        }
        Ok(())
    }

    fn refresh_and_publish(&self) {
        info!(roots = ?self.roots, "refreshing files after update");
        let refreshed = self.collaborators.refresher.refresh(&self.updated_files);
        let gone = refreshed.iter().filter(|r| !r.exists).count();
        debug!(refreshed = refreshed.len(), gone, "refresh finished");
        let paths: Vec<PathBuf> = refreshed.into_iter().map(|r| r.path).collect();
        self.collaborators.events.publish_updated_files(&paths);
    }

    fn finish_round(&mut self, was_canceled: bool) -> Followup {
        let continue_chain = self
            .context_info
            .values()
            .flatten()
            .any(SequentialContext::should_fail);
        let some_canceled = was_canceled || self.sessions.iter().any(UpdateSession::is_canceled);
        let update_success = !some_canceled && self.grouped_errors.is_empty();
        let no_merged = self
            .updated_files
            .group(FileGroupId::MergedWithConflicts)
            .is_none_or(FileGroup::is_empty);
        let at_limit = self.max_rounds != 0 && self.update_number >= self.max_rounds;
        let will_be_continued = continue_chain && update_success && no_merged && !at_limit;

        if !self.grouped_errors.is_empty() {
            if continue_chain {
                self.gather_context_interrupted_messages();
            }
            self.collaborators
                .errors
                .show_errors(&self.grouped_errors, &self.errors_title());
        } else if some_canceled {
            info!(round = self.update_number, "updating canceled");
        } else {
            info!(round = self.update_number, "updating done");
        }

        let mut notification = None;
        if self.updated_files.is_empty() && self.grouped_errors.is_empty() {
            let (content, kind) = if some_canceled {
                ("Updating canceled", NotificationType::Warning)
            } else {
                (self.up_to_date_message(), NotificationType::Information)
            };
            notification = Some(Notification::new(
                "",
                content,
                kind,
                display_ids::PROJECT_UPDATE_FINISHED,
            ));
        } else if !self.updated_files.is_empty() {
            let custom = if self.sessions.len() == 1 && !some_canceled && self.shows_custom_notification() {
                self.sessions[0].custom_notification().cloned()
            } else {
                None
            };
            notification = match custom {
                Some(n) => Some(n),
                None => {
                    self.collaborators.tree_view.show_update_tree(
                        &self.updated_files,
                        &self.tree_title(will_be_continued),
                        some_canceled,
                    );
                    Some(self.prepare_notification(some_canceled))
                }
            };
        }
        if let Some(n) = &notification {
            self.collaborators.notifier.notify(n.clone());
        }

        let mut followup = Followup::Done;
        if continue_chain && update_success {
            if !no_merged {
                warn!(round = self.update_number, "merge conflicts, chained update interrupted");
                self.show_context_interrupted_error();
            } else if at_limit {
                warn!(
                    round = self.update_number,
                    max_rounds = self.max_rounds,
                    "round limit reached, chained update interrupted"
                );
                self.show_context_interrupted_error();
            } else {
                followup = Followup::Resubmit;
            }
        }

        self.reports.push(RoundReport {
            round: self.update_number,
            success: !some_canceled && self.grouped_errors.is_empty(),
            canceled: some_canceled,
            file_count: self.updated_files.file_count(),
            error_count: self.grouped_errors.len(),
            continued: followup == Followup::Resubmit,
            notification,
        });

        if followup == Followup::Resubmit {
            info!(round = self.update_number, "provider asked for another round");
            self.reset();
        }
        followup
    }

    fn show_context_interrupted_error(&mut self) {
        self.gather_context_interrupted_messages();
        self.collaborators
            .errors
            .show_errors(&self.grouped_errors, &self.errors_title());
    }

    /// Turn every pending continuation into an error in its provider's bucket.
    fn gather_context_interrupted_messages(&mut self) {
        let interrupted: Vec<(ProviderKey, String)> = self
            .context_info
            .iter()
            .filter_map(|(key, ctx)| {
                let ctx = ctx.as_ref().filter(|c| c.should_fail())?;
                Some((key.clone(), ctx.message_when_interrupted_before_start()))
            })
            .collect();

        for (key, message) in interrupted {
            if let Some(env) = self.registry.get(&key) {
                gather_errors(
                    &mut self.grouped_errors,
                    env.as_ref(),
                    vec![VcsError::Interrupted(message)],
                );
            }
        }
    }

    fn shows_custom_notification(&self) -> bool {
        self.vcs_to_roots.keys().all(|key| {
            self.registry
                .get(key)
                .is_some_and(|env| env.notification_style() == NotificationStyle::Custom)
        })
    }

    fn prepare_notification(&self, canceled: bool) -> Notification {
        let count = self.updated_files.file_count();
        let (title, mut content, kind) = if canceled {
            (
                "Project partially updated".to_string(),
                format!("{} updated", files_noun(count)),
                NotificationType::Warning,
            )
        } else {
            (
                format!("{} updated", files_noun(count)),
                self.updated_files.summary(),
                NotificationType::Information,
            )
        };

        let additional: Vec<&str> = self
            .sessions
            .iter()
            .filter_map(UpdateSession::additional_content)
            .collect();
        if !additional.is_empty() {
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str(&additional.join(", "));
        }

        Notification::new(title, content, kind, display_ids::PROJECT_PARTIALLY_UPDATED)
    }

    fn up_to_date_message(&self) -> &'static str {
        if self.roots.len() == 1 && !self.roots[0].is_dir() {
            "File is up-to-date"
        } else {
            "All files are up-to-date"
        }
    }

    fn tree_title(&self, will_be_continued: bool) -> String {
        if will_be_continued || self.update_number > 1 {
            format!("{}#{}", self.action_name, self.update_number)
        } else {
            self.action_name.clone()
        }
    }

    fn errors_title(&self) -> String {
        format!("{} errors", self.action_name)
    }
}

impl Task for Updater {
    fn title(&self) -> &str {
        &self.action_name
    }

    fn run(&mut self, indicator: &ProgressIndicator) -> Result<(), Canceled> {
        info!(
            round = self.update_number,
            providers = self.vcs_to_roots.len(),
            "update round started"
        );
        let result = self.update_providers(indicator);
        indicator.set_text("synchronizing files");
        self.refresh_and_publish();
        result
    }

    fn on_success(&mut self) -> Followup {
        self.finish_round(false)
    }

    fn on_cancel(&mut self) -> Followup {
        self.finish_round(true)
    }
}

fn gather_errors(into: &mut GroupedErrors, env: &dyn UpdateEnvironment, errors: Vec<VcsError>) {
    if errors.is_empty() {
        return;
    }
    for (token, list) in env.group_errors(errors) {
        into.put(token, list);
    }
}

fn files_noun(n: usize) -> String {
    if n == 1 {
        "1 file".to_string()
    } else {
        format!("{} files", n)
    }
}

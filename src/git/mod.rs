//! Git update provider.
//!
//! The provider wraps the libgit2 backend (`git2_backend`) and exposes it through
//! the [`UpdateEnvironment`] protocol; nothing outside this module talks to
//! `git2` directly.

mod git2_backend;

use std::path::{Path, PathBuf};

use git2::{ErrorClass, ErrorCode};
use tracing::{debug, warn};

use crate::update::{
    Configurable, HotfixToken, Notification, NotificationStyle, NotificationType,
    ProgressIndicator, SequentialContext, UpdateEnvironment, UpdateSession, UpdatedFiles,
    VcsError, display_ids,
};
use git2_backend::{current_branch, open_with_origin, update_repo, upstream_ref};

pub const NETWORK_HOTFIX: &str = "network";
pub const AUTH_HOTFIX: &str = "authentication";

/// Fetches `origin` and fast-forwards or merges each root's current branch.
#[derive(Debug, Default)]
pub struct GitProvider;

impl GitProvider {
    pub fn new() -> Self {
        Self
    }
}

impl UpdateEnvironment for GitProvider {
    fn detects(&self, path: &Path) -> bool {
        path.ancestors().any(|p| p.join(".git").exists())
    }

    fn validate_options(&self, roots: &[PathBuf]) -> Result<(), VcsError> {
        for root in roots {
            open_with_origin(root).map_err(|e| VcsError::Validation {
                root: root.clone(),
                message: e.message().to_string(),
            })?;
        }
        Ok(())
    }

    fn create_configurable(&self, roots: &[PathBuf]) -> Option<Configurable> {
        let mut options = vec![
            ("remote".to_string(), "origin".to_string()),
            (
                "strategy".to_string(),
                "fast-forward, merge when diverged".to_string(),
            ),
        ];
        for root in roots {
            let tracking = open_with_origin(root)
                .and_then(|repo| {
                    let branch = current_branch(&repo)?;
                    let upstream = upstream_ref(&repo, &branch)?;
                    Ok(format!("{} <- {}", branch, upstream))
                })
                .unwrap_or_else(|e| format!("unavailable ({})", e.message()));
            options.push((root.display().to_string(), tracking));
        }
        Some(Configurable {
            title: "Git".to_string(),
            options,
        })
    }

    fn update_directories(
        &self,
        roots: &[PathBuf],
        files: &mut UpdatedFiles,
        progress: &ProgressIndicator,
        _context: &mut Option<SequentialContext>,
    ) -> UpdateSession {
        let mut session = UpdateSession::new();
        let mut updated_repos = 0usize;
        let mut file_count = 0usize;
        let mut commit_lines = Vec::new();

        for root in roots {
            if progress.is_canceled() {
                session.mark_canceled();
                break;
            }
            progress.set_text2(root.display().to_string());

            let result = open_with_origin(root).and_then(|repo| update_repo(&repo));
            match result {
                Ok(up) => {
                    debug!(root = %root.display(), commits = up.commits, files = up.changes.len(), "git root updated");
                    if up.conflicted {
                        warn!(root = %root.display(), "merge stopped on conflicts");
                        session.push_error(VcsError::Update {
                            root: root.clone(),
                            message: format!(
                                "merge with upstream has conflicts in {}, nothing was applied",
                                count_noun(up.changes.len(), "file", "files")
                            ),
                        });
                    } else if !up.changes.is_empty() {
                        updated_repos += 1;
                        file_count += up.changes.len();
                        commit_lines.push(format!(
                            "{}: {} {}",
                            root.display(),
                            up.commits,
                            if up.commits == 1 { "commit" } else { "commits" }
                        ));
                    }
                    for (path, group) in up.changes {
                        files.add(group, path);
                    }
                }
                Err(e) => session.push_error(to_vcs_error(root, &e)),
            }
        }

        if file_count > 0 {
            session.set_custom_notification(Notification::new(
                format!(
                    "{} updated in {}",
                    count_noun(file_count, "file", "files"),
                    count_noun(updated_repos, "repository", "repositories")
                ),
                commit_lines.join("\n"),
                NotificationType::Information,
                display_ids::GIT_UPDATE_FINISHED,
            ));
        }
        session
    }

    fn notification_style(&self) -> NotificationStyle {
        NotificationStyle::Custom
    }

    fn group_errors(&self, errors: Vec<VcsError>) -> Vec<(Option<HotfixToken>, Vec<VcsError>)> {
        let mut network = Vec::new();
        let mut auth = Vec::new();
        let mut other = Vec::new();
        for e in errors {
            match e {
                VcsError::Network { .. } => network.push(e),
                VcsError::Authentication { .. } => auth.push(e),
                _ => other.push(e),
            }
        }
        vec![
            (Some(HotfixToken::new(NETWORK_HOTFIX)), network),
            (Some(HotfixToken::new(AUTH_HOTFIX)), auth),
            (None, other),
        ]
    }
}

fn to_vcs_error(root: &Path, e: &git2::Error) -> VcsError {
    let root = root.to_path_buf();
    let message = e.message().to_string();
    if e.code() == ErrorCode::Auth {
        return VcsError::Authentication { root, message };
    }
    match e.class() {
        ErrorClass::Net | ErrorClass::Ssh | ErrorClass::Http | ErrorClass::Ssl => {
            VcsError::Network { root, message }
        }
        _ if e.code() == ErrorCode::Conflict => VcsError::Update {
            root,
            message: format!("local changes would be overwritten: {}", message),
        },
        _ => VcsError::Update { root, message },
    }
}

fn count_noun(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

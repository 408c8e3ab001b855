use colored::Colorize;

use super::files::UpdatedFiles;
use super::session::GroupedErrors;

/// Stable ids used to deduplicate notifications.
pub mod display_ids {
    pub const PROJECT_UPDATE_FINISHED: &str = "project.update.finished";
    pub const PROJECT_PARTIALLY_UPDATED: &str = "project.partially.updated";
    pub const GIT_UPDATE_FINISHED: &str = "git.update.finished";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Information,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub content: String,
    pub kind: NotificationType,
    pub display_id: String,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        kind: NotificationType,
        display_id: &str,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            kind,
            display_id: display_id.to_string(),
        }
    }
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Facade showing the grouped errors of a round.
pub trait ErrorReporter: Send + Sync {
    fn show_errors(&self, errors: &GroupedErrors, title: &str);
}

/// Presents the files changed by a round.
pub trait UpdateTreeView: Send + Sync {
    fn show_update_tree(&self, files: &UpdatedFiles, title: &str, canceled: bool);
}

/// Prints notifications to stdout.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, n: Notification) {
        let mark = match n.kind {
            NotificationType::Information => "✔".green(),
            NotificationType::Warning => "!".yellow(),
        };
        if n.title.is_empty() {
            println!("{} {}", mark, n.content);
            return;
        }
        println!("{} {}", mark, n.title.bold());
        for line in n.content.lines().filter(|l| !l.trim().is_empty()) {
            println!("  {}", line);
        }
    }
}

/// Prints grouped errors to stderr, one block per hotfix bucket.
pub struct ConsoleErrorReporter;

impl ErrorReporter for ConsoleErrorReporter {
    fn show_errors(&self, errors: &GroupedErrors, title: &str) {
        eprintln!("{} {}", "✘".red(), title.bold());
        for (token, list) in errors.buckets() {
            match token {
                Some(t) => eprintln!("  [{}]", t.as_str().yellow()),
                None => eprintln!("  [general]"),
            }
            for e in list {
                eprintln!("    - {}", e);
            }
        }
    }
}

/// Prints the changed files as an indented tree.
pub struct ConsoleTreeView;

impl UpdateTreeView for ConsoleTreeView {
    fn show_update_tree(&self, files: &UpdatedFiles, title: &str, canceled: bool) {
        let suffix = if canceled { " (canceled)" } else { "" };
        println!("{}{}", title.bold(), suffix);
        for g in files.top_level_groups() {
            print_group(g, 1);
        }
    }
}

fn print_group(group: &super::files::FileGroup, depth: usize) {
    if group.is_empty() {
        return;
    }
    let indent = "  ".repeat(depth);
    println!("{}{} ({})", indent, group.title().cyan(), group.count());
    for f in group.files() {
        println!("{}  {}", indent, f.display());
    }
    for c in group.children() {
        print_group(c, depth + 1);
    }
}

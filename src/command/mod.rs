//! Update provider driven by an external command (`svn update`, `hg pull -u`, ...).
//!
//! The command runs once per root; its stdout is read as svn-style status lines.
//! Configured `steps` turn one update into a chain: each round runs the command
//! with the next step substituted for `{step}`.

mod output;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::CommandProviderConfig;
use crate::update::{
    Configurable, FileGroup, FileGroupId, ProgressIndicator, SequentialContext,
    UpdateEnvironment, UpdateSession, UpdatedFiles, VcsError,
};

pub use output::{PROPERTIES_CHANGED, parse_update_output};

const STEP_PLACEHOLDER: &str = "{step}";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Provider running a configured command in every root.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    name: String,
    argv: Vec<String>,
    steps: Vec<String>,
    detect: Option<String>,
}

enum RunOutcome {
    Finished { status: ExitStatus, stdout: String, stderr: String },
    Canceled,
}

impl CommandProvider {
    /// Provider named `name` built from its `[providers.<name>]` table.
    pub fn new(name: impl Into<String>, cfg: &CommandProviderConfig) -> Self {
        Self {
            name: name.into(),
            argv: cfg.command.clone(),
            steps: cfg.steps.clone(),
            detect: cfg.detect.clone(),
        }
    }

    /// Step for this round; the first round of a chain creates the context.
    fn next_step(&self, context: &mut Option<SequentialContext>) -> Option<String> {
        if self.steps.is_empty() {
            return None;
        }
        if let Some(ctx) = context.as_mut() {
            return ctx.next_step();
        }
        let mut steps = self.steps.iter().cloned();
        let first = steps.next();
        *context = Some(SequentialContext::new(
            steps,
            format!("{} update interrupted before steps", self.name),
        ));
        first
    }

    fn argv_for(&self, step: Option<&str>) -> Vec<String> {
        self.argv
            .iter()
            .map(|a| a.replace(STEP_PLACEHOLDER, step.unwrap_or("")))
            .collect()
    }

    fn run_in(&self, root: &Path, argv: &[String], progress: &ProgressIndicator) -> Result<RunOutcome> {
        let (program, args) = argv
            .split_first()
            .context("update command is empty")?;
        let mut child = Command::new(program)
            .args(args)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start {}", program))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if progress.is_canceled() {
                kill(&mut child);
                return Ok(RunOutcome::Canceled);
            }
            thread::sleep(POLL_INTERVAL);
        };
        // Ctrl-C reaches the child too; a failure after cancel is the interrupt.
        if !status.success() && progress.is_canceled() {
            return Ok(RunOutcome::Canceled);
        }

        Ok(RunOutcome::Finished {
            status,
            stdout: join(stdout),
            stderr: join(stderr),
        })
    }
}

impl UpdateEnvironment for CommandProvider {
    fn detects(&self, path: &Path) -> bool {
        self.detect
            .as_deref()
            .is_some_and(|marker| path.join(marker).exists())
    }

    fn fill_groups(&self, files: &mut UpdatedFiles) {
        files.register_group(
            Some(FileGroupId::Updated),
            FileGroup::with_title(PROPERTIES_CHANGED, "Properties changed"),
        );
    }

    fn validate_options(&self, roots: &[PathBuf]) -> Result<(), VcsError> {
        for root in roots {
            if self.argv.is_empty() {
                return Err(VcsError::Validation {
                    root: root.clone(),
                    message: format!("provider '{}' has an empty command", self.name),
                });
            }
            if !root.is_dir() {
                return Err(VcsError::Validation {
                    root: root.clone(),
                    message: "not a directory".to_string(),
                });
            }
        }
        Ok(())
    }

    fn create_configurable(&self, _roots: &[PathBuf]) -> Option<Configurable> {
        let mut options = vec![("command".to_string(), self.argv.join(" "))];
        if !self.steps.is_empty() {
            options.push(("steps".to_string(), self.steps.join(", ")));
        }
        Some(Configurable {
            title: self.name.clone(),
            options,
        })
    }

    fn update_directories(
        &self,
        roots: &[PathBuf],
        files: &mut UpdatedFiles,
        progress: &ProgressIndicator,
        context: &mut Option<SequentialContext>,
    ) -> UpdateSession {
        let mut session = UpdateSession::new();
        let step = self.next_step(context);
        let argv = self.argv_for(step.as_deref());
        debug!(provider = %self.name, ?step, argv = ?argv, "running update command");

        for root in roots {
            if progress.is_canceled() {
                session.mark_canceled();
                break;
            }
            progress.set_text2(root.display().to_string());

            match self.run_in(root, &argv, progress) {
                Ok(RunOutcome::Finished { status, stdout, stderr }) => {
                    for (path, group) in parse_update_output(root, &stdout) {
                        files.add(group, path);
                    }
                    if !status.success() {
                        let detail = stderr.trim();
                        session.push_error(VcsError::Update {
                            root: root.clone(),
                            message: if detail.is_empty() {
                                format!("{} exited with {}", argv[0], status)
                            } else {
                                detail.to_string()
                            },
                        });
                    }
                }
                Ok(RunOutcome::Canceled) => {
                    warn!(root = %root.display(), "update command killed on cancel");
                    session.mark_canceled();
                    break;
                }
                Err(e) => session.push_error(VcsError::Update {
                    root: root.clone(),
                    message: format!("{:#}", e),
                }),
            }
        }

        if let Some(s) = step {
            session.set_additional_content(format!("{}: {}", self.name, s));
        }
        session
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut r| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = r.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::CancelToken;
    use std::fs;
    use tempfile::tempdir;

    fn provider(cmd: &[&str], steps: &[&str]) -> CommandProvider {
        let cfg = CommandProviderConfig {
            command: cmd.iter().map(|s| s.to_string()).collect(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
            detect: Some(".svn".into()),
        };
        CommandProvider::new("svn", &cfg)
    }

    fn hidden() -> ProgressIndicator {
        ProgressIndicator::hidden(CancelToken::new())
    }

    #[test]
    fn detects_marker_directory() {
        let td = tempdir().unwrap();
        let p = provider(&["true"], &[]);
        assert!(!p.detects(td.path()));
        fs::create_dir(td.path().join(".svn")).unwrap();
        assert!(p.detects(td.path()));
    }

    #[test]
    fn parses_command_output_into_groups() {
        let td = tempdir().unwrap();
        let p = provider(&["sh", "-c", "printf 'A    a.txt\\nU    b.txt\\nAt revision 3.\\n'"], &[]);
        let mut files = UpdatedFiles::new();
        let session = p.update_directories(&[td.path().to_path_buf()], &mut files, &hidden(), &mut None);

        assert!(session.errors().is_empty());
        let created: Vec<_> = files.group(FileGroupId::Created).unwrap().files().collect();
        assert_eq!(created, vec![td.path().join("a.txt").as_path()]);
        assert_eq!(files.group(FileGroupId::Updated).unwrap().count(), 1);
    }

    #[test]
    fn property_changes_nest_under_updated() {
        let td = tempdir().unwrap();
        let p = provider(&["sh", "-c", "printf ' U   a.txt\\nU    b.txt\\n'"], &[]);
        let mut files = UpdatedFiles::new();
        p.fill_groups(&mut files);
        p.update_directories(&[td.path().to_path_buf()], &mut files, &hidden(), &mut None);

        let updated = files.group(FileGroupId::Updated).unwrap();
        assert_eq!(updated.count(), 2);
        assert_eq!(updated.children()[0].title(), "Properties changed");
        let props: Vec<_> = files.group(PROPERTIES_CHANGED).unwrap().files().collect();
        assert_eq!(props, vec![td.path().join("a.txt").as_path()]);
    }

    #[test]
    fn non_zero_exit_reports_stderr() {
        let td = tempdir().unwrap();
        let p = provider(&["sh", "-c", "echo 'E170013: unable to connect' >&2; exit 1"], &[]);
        let mut files = UpdatedFiles::new();
        let session = p.update_directories(&[td.path().to_path_buf()], &mut files, &hidden(), &mut None);

        assert_eq!(
            session.errors(),
            &[VcsError::Update {
                root: td.path().to_path_buf(),
                message: "E170013: unable to connect".into(),
            }]
        );
    }

    #[test]
    fn missing_program_is_an_error_not_a_panic() {
        let td = tempdir().unwrap();
        let p = provider(&["vup-test-no-such-binary"], &[]);
        let mut files = UpdatedFiles::new();
        let session = p.update_directories(&[td.path().to_path_buf()], &mut files, &hidden(), &mut None);
        assert_eq!(session.errors().len(), 1);
        assert!(session.errors()[0].to_string().contains("failed to start"));
    }

    #[test]
    fn steps_chain_through_the_context() {
        let td = tempdir().unwrap();
        let p = provider(&["sh", "-c", "echo \"U    {step}.txt\""], &["trunk", "b1", "b2"]);
        let root = td.path().to_path_buf();
        let mut ctx = None;

        let mut files = UpdatedFiles::new();
        let s1 = p.update_directories(&[root.clone()], &mut files, &hidden(), &mut ctx);
        assert_eq!(s1.additional_content(), Some("svn: trunk"));
        assert!(files.group(FileGroupId::Updated).unwrap().files().any(|f| f.ends_with("trunk.txt")));
        assert!(ctx.as_ref().unwrap().should_fail());
        assert_eq!(
            ctx.as_ref().unwrap().message_when_interrupted_before_start(),
            "svn update interrupted before steps: b1, b2"
        );

        let mut files = UpdatedFiles::new();
        p.update_directories(&[root.clone()], &mut files, &hidden(), &mut ctx);
        let mut files = UpdatedFiles::new();
        let s3 = p.update_directories(&[root], &mut files, &hidden(), &mut ctx);
        assert_eq!(s3.additional_content(), Some("svn: b2"));
        assert!(!ctx.unwrap().should_fail());
    }

    #[test]
    fn cancel_kills_a_running_command() {
        let td = tempdir().unwrap();
        let p = provider(&["sleep", "30"], &[]);
        let token = CancelToken::new();
        let progress = ProgressIndicator::hidden(token.clone());
        let canceler = {
            let token = token.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(200));
                token.cancel();
            })
        };

        let mut files = UpdatedFiles::new();
        let started = std::time::Instant::now();
        let session = p.update_directories(&[td.path().to_path_buf()], &mut files, &progress, &mut None);
        canceler.join().unwrap();

        assert!(session.is_canceled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn validation_rejects_missing_directory() {
        let p = provider(&["svn", "update"], &[]);
        let err = p
            .validate_options(&[PathBuf::from("/no/such/root")])
            .unwrap_err();
        assert!(matches!(err, VcsError::Validation { .. }));
    }
}

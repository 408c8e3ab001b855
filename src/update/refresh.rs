use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::files::UpdatedFiles;

/// State of a path after the post-update refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedPath {
    pub path: PathBuf,
    pub exists: bool,
}

/// Re-reads storage for every path touched by a round.
pub trait Refresher: Send + Sync {
    fn refresh(&self, files: &UpdatedFiles) -> Vec<RefreshedPath>;
}

/// Re-stats changed paths on the local file system, deleted ones first.
pub struct FsRefresher;

impl Refresher for FsRefresher {
    fn refresh(&self, files: &UpdatedFiles) -> Vec<RefreshedPath> {
        files
            .paths_deleted_first()
            .into_iter()
            .map(|path| {
                let exists = match fs::symlink_metadata(&path) {
                    Ok(_) => true,
                    Err(e) if e.kind() == ErrorKind::NotFound => false,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "cannot refresh path");
                        false
                    }
                };
                debug!(path = %path.display(), exists, "refreshed");
                RefreshedPath { path, exists }
            })
            .collect()
    }
}

use git2::{
    AnnotatedCommit, BranchType, Cred, Delta, DiffOptions, Error, FetchOptions, MergeAnalysis,
    Oid, RemoteCallbacks, Repository, Tree, build::CheckoutBuilder,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::update::FileGroupId;

/// What pulling the upstream into one repository changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepoUpdate {
    /// Absolute paths with the group they belong in.
    pub changes: Vec<(PathBuf, FileGroupId)>,
    /// Upstream commits brought in.
    pub commits: usize,
    /// The merge stopped on conflicts and the working tree was left alone.
    pub conflicted: bool,
}

/// Build a `FetchOptions` with SSH-agent credentials enabled.
///
/// Falls back to default credentials when the agent has no usable key.
fn fetch_opts_with_creds() -> FetchOptions<'static> {
    let mut cb = RemoteCallbacks::new();
    cb.credentials(|_url, username_from_url, _allowed| {
        Cred::ssh_key_from_agent(username_from_url.unwrap_or("git")).or_else(|_| Cred::default())
    });

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(cb);
    fo
}

/// Open the repository containing `root` and make sure it has an `origin` remote.
pub fn open_with_origin(root: &Path) -> Result<Repository, Error> {
    let repo = Repository::discover(root)?;
    repo.find_remote("origin")?;
    Ok(repo)
}

/// Perform `git fetch origin` for branches and tags.
pub fn fetch_origin(repo: &Repository) -> Result<(), Error> {
    let mut fo = fetch_opts_with_creds();
    let mut remote = repo.find_remote("origin")?;
    remote.fetch(
        &[
            "refs/heads/*:refs/remotes/origin/*",
            "refs/tags/*:refs/tags/*",
        ],
        Some(&mut fo),
        None,
    )
}

/// Name of the current local branch; a detached HEAD is an error.
pub fn current_branch(repo: &Repository) -> Result<String, Error> {
    let head = repo.head()?;
    if !head.is_branch() {
        return Err(Error::from_str("HEAD is detached; check out a branch to update"));
    }
    head.shorthand()
        .map(str::to_string)
        .ok_or_else(|| Error::from_str("invalid branch name"))
}

/// Remote-tracking ref the branch pulls from.
///
/// The configured upstream wins. Fallbacks are tried in order:
/// `refs/remotes/origin/<branch>` → origin/HEAD → origin/main → origin/master.
pub fn upstream_ref(repo: &Repository, branch: &str) -> Result<String, Error> {
    if let Ok(local) = repo.find_branch(branch, BranchType::Local)
        && let Ok(up) = local.upstream()
        && let Some(name) = up.get().name()
    {
        return Ok(name.to_string());
    }
    let same_name = format!("refs/remotes/origin/{}", branch);
    if repo.find_reference(&same_name).is_ok() {
        return Ok(same_name);
    }
    if let Ok(origin_head) = repo.find_reference("refs/remotes/origin/HEAD")
        && let Some(target) = origin_head.symbolic_target()
    {
        return Ok(target.to_string());
    }
    for candidate in ["refs/remotes/origin/main", "refs/remotes/origin/master"] {
        if repo.find_reference(candidate).is_ok() {
            return Ok(candidate.to_string());
        }
    }
    Err(Error::from_str(&format!(
        "no upstream for branch '{}' (missing {}, origin/HEAD, origin/main, origin/master)",
        branch, same_name
    )))
}

/// Fetch `origin` and bring the current branch up to date with its upstream.
///
/// - up to date: nothing changes
/// - fast-forward: the branch moves and the working tree is checked out safely
/// - diverged: merged in memory; on conflicts nothing is written and the
///   conflicting paths are reported, otherwise a merge commit is created
///
/// Checkouts use the safe strategy, so local modifications that would be
/// overwritten make the update fail instead of being lost.
pub fn update_repo(repo: &Repository) -> Result<RepoUpdate, Error> {
    fetch_origin(repo)?;

    let branch = current_branch(repo)?;
    let upstream_name = upstream_ref(repo, &branch)?;
    let upstream = repo.find_reference(&upstream_name)?;
    let theirs = upstream.peel_to_commit()?;
    let ours = repo.head()?.peel_to_commit()?;
    let annotated: AnnotatedCommit = repo.reference_to_annotated_commit(&upstream)?;

    let (analysis, _) = repo.merge_analysis(&[&annotated])?;
    if analysis.contains(MergeAnalysis::ANALYSIS_UP_TO_DATE) {
        return Ok(RepoUpdate::default());
    }

    let workdir = repo
        .workdir()
        .ok_or_else(|| Error::from_str("bare repositories cannot be updated"))?
        .to_path_buf();
    let commits = count_new_commits(repo, ours.id(), theirs.id())?;
    let old_tree = ours.tree()?;

    if analysis.contains(MergeAnalysis::ANALYSIS_FASTFORWARD) {
        let new_tree = theirs.tree()?;
        repo.checkout_tree(theirs.as_object(), Some(CheckoutBuilder::new().safe()))?;
        let branch_ref = format!("refs/heads/{}", branch);
        repo.find_reference(&branch_ref)?
            .set_target(theirs.id(), &format!("vup: fast-forward to {}", upstream_name))?;
        let changes = tree_changes(repo, &workdir, &old_tree, &new_tree, None)?;
        return Ok(RepoUpdate {
            changes,
            commits,
            conflicted: false,
        });
    }

    let base = repo.find_commit(repo.merge_base(ours.id(), theirs.id())?)?;
    let base_tree = base.tree()?;
    let mut index = repo.merge_commits(&ours, &theirs, None)?;

    if index.has_conflicts() {
        let mut changes = Vec::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
            if let Some(e) = entry {
                let rel = String::from_utf8_lossy(&e.path).into_owned();
                changes.push((workdir.join(rel), FileGroupId::MergedWithConflicts));
            }
        }
        return Ok(RepoUpdate {
            changes,
            commits,
            conflicted: true,
        });
    }

    let tree_id = index.write_tree_to(repo)?;
    let merged_tree = repo.find_tree(tree_id)?;
    repo.checkout_tree(merged_tree.as_object(), Some(CheckoutBuilder::new().safe()))?;

    let sig = repo.signature()?;
    let short = upstream_name
        .strip_prefix("refs/remotes/")
        .unwrap_or(&upstream_name);
    repo.commit(
        Some("HEAD"),
        &sig,
        &sig,
        &format!("Merge remote-tracking branch '{}'", short),
        &merged_tree,
        &[&ours, &theirs],
    )?;

    let ours_changed = changed_paths(repo, &base_tree, &old_tree)?;
    let theirs_changed = changed_paths(repo, &base_tree, &theirs.tree()?)?;
    let both: HashSet<PathBuf> = ours_changed.intersection(&theirs_changed).cloned().collect();
    let changes = tree_changes(repo, &workdir, &old_tree, &merged_tree, Some(&both))?;
    Ok(RepoUpdate {
        changes,
        commits,
        conflicted: false,
    })
}

/// Commits reachable from `theirs` but not from `ours`.
fn count_new_commits(repo: &Repository, ours: Oid, theirs: Oid) -> Result<usize, Error> {
    let mut walk = repo.revwalk()?;
    walk.push(theirs)?;
    walk.hide(ours)?;
    Ok(walk.filter_map(Result::ok).count())
}

/// Classify the difference between two trees.
///
/// Paths in `merged` (changed on both sides of a merge) are filed as merged.
fn tree_changes(
    repo: &Repository,
    workdir: &Path,
    old: &Tree,
    new: &Tree,
    merged: Option<&HashSet<PathBuf>>,
) -> Result<Vec<(PathBuf, FileGroupId)>, Error> {
    let mut opts = DiffOptions::new();
    let diff = repo.diff_tree_to_tree(Some(old), Some(new), Some(&mut opts))?;
    let mut out = Vec::new();
    for delta in diff.deltas() {
        let (rel, group) = match delta.status() {
            Delta::Added | Delta::Copied => (delta.new_file().path(), FileGroupId::Created),
            Delta::Deleted => (delta.old_file().path(), FileGroupId::Removed),
            Delta::Modified | Delta::Renamed | Delta::Typechange => {
                (delta.new_file().path(), FileGroupId::Updated)
            }
            _ => continue,
        };
        let Some(rel) = rel else { continue };
        let group = match merged {
            Some(m) if group == FileGroupId::Updated && m.contains(rel) => FileGroupId::Merged,
            _ => group,
        };
        out.push((workdir.join(rel), group));
    }
    Ok(out)
}

fn changed_paths(repo: &Repository, old: &Tree, new: &Tree) -> Result<HashSet<PathBuf>, Error> {
    let diff = repo.diff_tree_to_tree(Some(old), Some(new), None)?;
    Ok(diff
        .deltas()
        .filter_map(|d| d.new_file().path().or_else(|| d.old_file().path()))
        .map(Path::to_path_buf)
        .collect())
}

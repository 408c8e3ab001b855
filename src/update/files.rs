use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Category a changed path is filed under after an update.
///
/// The standard categories exist in every [`UpdatedFiles`]; providers add their
/// own with [`FileGroupId::Custom`] and [`UpdatedFiles::register_group`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileGroupId {
    Updated,
    Created,
    Removed,
    Restored,
    Merged,
    MergedWithConflicts,
    Skipped,
    LocallyAdded,
    LocallyRemoved,
    Unknown,
    /// Provider-defined group, identified by a stable key.
    Custom(&'static str),
}

impl FileGroupId {
    /// Top-level groups every fresh [`UpdatedFiles`] starts with, in display order.
    pub const STANDARD: [FileGroupId; 10] = [
        FileGroupId::MergedWithConflicts,
        FileGroupId::Merged,
        FileGroupId::Updated,
        FileGroupId::Created,
        FileGroupId::Removed,
        FileGroupId::Restored,
        FileGroupId::Skipped,
        FileGroupId::LocallyAdded,
        FileGroupId::LocallyRemoved,
        FileGroupId::Unknown,
    ];

    /// Default title; custom groups fall back to their key.
    pub fn title(self) -> &'static str {
        match self {
            FileGroupId::Updated => "Updated",
            FileGroupId::Created => "Created",
            FileGroupId::Removed => "Removed from repository",
            FileGroupId::Restored => "Restored",
            FileGroupId::Merged => "Merged",
            FileGroupId::MergedWithConflicts => "Merged with conflicts",
            FileGroupId::Skipped => "Skipped",
            FileGroupId::LocallyAdded => "Locally added",
            FileGroupId::LocallyRemoved => "Locally removed",
            FileGroupId::Unknown => "Unknown",
            FileGroupId::Custom(key) => key,
        }
    }
}

/// A named bucket of changed paths; may hold nested child groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    id: FileGroupId,
    title: String,
    files: BTreeSet<PathBuf>,
    children: Vec<FileGroup>,
}

impl FileGroup {
    /// Empty group titled with [`FileGroupId::title`].
    pub fn new(id: FileGroupId) -> Self {
        Self::with_title(id, id.title())
    }

    pub fn with_title(id: FileGroupId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            files: BTreeSet::new(),
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> FileGroupId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    pub fn children(&self) -> &[FileGroup] {
        &self.children
    }

    pub fn add(&mut self, path: impl Into<PathBuf>) {
        self.files.insert(path.into());
    }

    /// Attach `child` unless a group with the same id already exists below this one.
    pub fn add_child(&mut self, child: FileGroup) {
        if self.find(child.id).is_none() {
            self.children.push(child);
        }
    }

    /// Number of paths in this group and all of its descendants.
    pub fn count(&self) -> usize {
        self.files.len() + self.children.iter().map(FileGroup::count).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    fn find(&self, id: FileGroupId) -> Option<&FileGroup> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    fn find_mut(&mut self, id: FileGroupId) -> Option<&mut FileGroup> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    fn collect<'a>(&'a self, out: &mut Vec<(&'a Path, FileGroupId)>) {
        out.extend(self.files.iter().map(|p| (p.as_path(), self.id)));
        for c in &self.children {
            c.collect(out);
        }
    }
}

/// Aggregated result of one update round across every provider.
///
/// Providers write into the same structure; the orchestrator creates a fresh one
/// per round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedFiles {
    groups: Vec<FileGroup>,
}

impl Default for UpdatedFiles {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdatedFiles {
    /// Empty result holding the [`FileGroupId::STANDARD`] groups.
    pub fn new() -> Self {
        Self {
            groups: FileGroupId::STANDARD.into_iter().map(FileGroup::new).collect(),
        }
    }

    pub fn top_level_groups(&self) -> &[FileGroup] {
        &self.groups
    }

    /// Look up a group by id anywhere in the hierarchy.
    pub fn group(&self, id: FileGroupId) -> Option<&FileGroup> {
        self.groups.iter().find_map(|g| g.find(id))
    }

    /// Register a provider-specific group, nested under `parent` when given.
    ///
    /// Groups are unique by id: registering an id that already exists is a no-op.
    pub fn register_group(&mut self, parent: Option<FileGroupId>, group: FileGroup) {
        if self.group(group.id).is_some() {
            return;
        }
        match parent.and_then(|p| self.groups.iter_mut().find_map(|g| g.find_mut(p))) {
            Some(p) => p.add_child(group),
            None => self.groups.push(group),
        }
    }

    /// File `path` under group `id`, creating a top-level group if none exists.
    ///
    /// The id is looked up across the whole hierarchy, so a path added to a
    /// registered child group also counts towards its parent.
    pub fn add(&mut self, id: FileGroupId, path: impl Into<PathBuf>) {
        match self.groups.iter_mut().find_map(|g| g.find_mut(id)) {
            Some(g) => g.add(path),
            None => {
                let mut g = FileGroup::new(id);
                g.add(path);
                self.groups.push(g);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(FileGroup::is_empty)
    }

    pub fn file_count(&self) -> usize {
        self.groups.iter().map(FileGroup::count).sum()
    }

    /// Every filed path with the id of the group holding it.
    pub fn files(&self) -> Vec<(&Path, FileGroupId)> {
        let mut out = Vec::new();
        for g in &self.groups {
            g.collect(&mut out);
        }
        out
    }

    /// Distinct changed paths, with paths removed from the repository first.
    pub fn paths_deleted_first(&self) -> Vec<PathBuf> {
        let all = self.files();
        let (removed, rest): (Vec<_>, Vec<_>) = all
            .into_iter()
            .partition(|(_, id)| *id == FileGroupId::Removed);

        let mut seen = BTreeSet::new();
        removed
            .into_iter()
            .chain(rest)
            .filter(|(p, _)| seen.insert(*p))
            .map(|(p, _)| p.to_path_buf())
            .collect()
    }

    /// One-line per-group count summary, e.g. `2 updated, 1 created`.
    pub fn summary(&self) -> String {
        self.groups
            .iter()
            .filter(|g| !g.is_empty())
            .map(|g| format!("{} {}", g.count(), g.title().to_lowercase()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_structure_is_empty_with_standard_groups() {
        let f = UpdatedFiles::new();
        assert!(f.is_empty());
        assert_eq!(f.file_count(), 0);
        assert_eq!(f.top_level_groups().len(), FileGroupId::STANDARD.len());
        assert!(f.group(FileGroupId::MergedWithConflicts).is_some());
    }

    const FROM_SERVER: FileGroupId = FileGroupId::Custom("restored_from_server");

    #[test]
    fn counts_include_nested_children() {
        let mut f = UpdatedFiles::new();
        f.register_group(
            Some(FileGroupId::Updated),
            FileGroup::with_title(FROM_SERVER, "Restored from server"),
        );
        f.add(FileGroupId::Updated, "/r/a.txt");
        f.add(FROM_SERVER, "/r/b.txt");

        let updated = f.group(FileGroupId::Updated).unwrap();
        assert_eq!(updated.count(), 2);
        assert_eq!(updated.children().len(), 1);
        assert_eq!(updated.children()[0].title(), "Restored from server");
        assert_eq!(f.top_level_groups().len(), FileGroupId::STANDARD.len());
        assert_eq!(f.file_count(), 2);
        assert!(!f.is_empty());
    }

    #[test]
    fn unregistered_custom_group_lands_at_top_level() {
        let mut f = UpdatedFiles::new();
        f.add(FileGroupId::Custom("switched"), "/r/x");
        assert_eq!(f.top_level_groups().len(), FileGroupId::STANDARD.len() + 1);
        assert_eq!(f.group(FileGroupId::Custom("switched")).unwrap().title(), "switched");
    }

    #[test]
    fn register_group_ignores_existing_ids() {
        let mut f = UpdatedFiles::new();
        let before = f.top_level_groups().len();
        f.register_group(None, FileGroup::with_title(FileGroupId::Created, "Other"));
        assert_eq!(f.top_level_groups().len(), before);
        assert_eq!(f.group(FileGroupId::Created).unwrap().title(), "Created");
    }

    #[test]
    fn same_path_in_one_group_counts_once() {
        let mut f = UpdatedFiles::new();
        f.add(FileGroupId::Updated, "/r/a.txt");
        f.add(FileGroupId::Updated, "/r/a.txt");
        assert_eq!(f.file_count(), 1);
    }

    #[test]
    fn removed_paths_come_first_and_duplicates_collapse() {
        let mut f = UpdatedFiles::new();
        f.add(FileGroupId::Updated, "/r/a.txt");
        f.add(FileGroupId::Merged, "/r/a.txt");
        f.add(FileGroupId::Removed, "/r/z.txt");

        let paths = f.paths_deleted_first();
        assert_eq!(
            paths,
            vec![PathBuf::from("/r/z.txt"), PathBuf::from("/r/a.txt")]
        );
    }

    #[test]
    fn summary_lists_non_empty_groups() {
        let mut f = UpdatedFiles::new();
        f.add(FileGroupId::Updated, "/r/a");
        f.add(FileGroupId::Updated, "/r/b");
        f.add(FileGroupId::Created, "/r/c");
        assert_eq!(f.summary(), "2 updated, 1 created");
    }
}

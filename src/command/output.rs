use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::update::FileGroupId;

/// Paths whose properties changed but whose content did not.
pub const PROPERTIES_CHANGED: FileGroupId = FileGroupId::Custom("properties_changed");

/// svn-style status line: content column, property column, lock column,
/// tree-conflict column, then the path.
static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<text>[ADUCGER ])(?P<prop>[UCG ])[B ](?P<tree>[C ])\s+(?P<path>\S.*)$")
        .expect("status line pattern")
});

static SKIPPED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Skipped(?: missing target)?:? '(?P<path>[^']+)'").expect("skipped pattern")
});

static RESTORED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Restored '(?P<path>[^']+)'").expect("restored pattern"));

/// Classify the lines an update command printed; paths are resolved against `root`.
///
/// Lines that don't describe a file (revision banners, summaries) are ignored.
pub fn parse_update_output(root: &Path, stdout: &str) -> Vec<(PathBuf, FileGroupId)> {
    stdout
        .lines()
        .filter_map(|line| parse_line(line.trim_end()))
        .map(|(rel, group)| (root.join(rel), group))
        .collect()
}

fn parse_line(line: &str) -> Option<(&str, FileGroupId)> {
    if let Some(c) = SKIPPED_LINE.captures(line) {
        return Some((c.name("path")?.as_str(), FileGroupId::Skipped));
    }
    if let Some(c) = RESTORED_LINE.captures(line) {
        return Some((c.name("path")?.as_str(), FileGroupId::Restored));
    }

    let c = STATUS_LINE.captures(line)?;
    let text = c.name("text")?.as_str();
    let prop = c.name("prop")?.as_str();
    let tree = c.name("tree")?.as_str();
    let path = c.name("path")?.as_str();

    if tree == "C" || text == "C" || prop == "C" {
        return Some((path, FileGroupId::MergedWithConflicts));
    }
    let group = match (text, prop) {
        ("A", _) => FileGroupId::Created,
        ("D", _) => FileGroupId::Removed,
        ("G", _) => FileGroupId::Merged,
        ("R", _) => FileGroupId::Restored,
        ("U", _) | ("E", _) => FileGroupId::Updated,
        (" ", "U") | (" ", "G") => PROPERTIES_CHANGED,
        _ => return None,
    };
    Some((path, group))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_svn_update_output() {
        let out = "\
Updating '.':
A    src/new.rs
D    old.txt
U    README.md
G    merged.rs
C    clash.rs
 U   props-only.txt
E    existed.txt
R    replaced.bin
   C tree-conflict/
Skipped 'locked.bin' -- Node remains in conflict
Updated to revision 42.
Summary of conflicts:
  Text conflicts: 1
";
        let got = parse_update_output(Path::new("/w"), out);
        let expect = vec![
            ("/w/src/new.rs", FileGroupId::Created),
            ("/w/old.txt", FileGroupId::Removed),
            ("/w/README.md", FileGroupId::Updated),
            ("/w/merged.rs", FileGroupId::Merged),
            ("/w/clash.rs", FileGroupId::MergedWithConflicts),
            ("/w/props-only.txt", PROPERTIES_CHANGED),
            ("/w/existed.txt", FileGroupId::Updated),
            ("/w/replaced.bin", FileGroupId::Restored),
            ("/w/tree-conflict/", FileGroupId::MergedWithConflicts),
            ("/w/locked.bin", FileGroupId::Skipped),
        ];
        let expect: Vec<(PathBuf, FileGroupId)> = expect
            .into_iter()
            .map(|(p, g)| (PathBuf::from(p), g))
            .collect();
        assert_eq!(got, expect);
    }

    #[test]
    fn banners_are_not_files() {
        for line in ["At revision 7.", "Updated to revision 8.", "Updating 'x':", ""] {
            assert!(parse_line(line).is_none(), "{line:?}");
        }
    }

    #[test]
    fn restored_line_is_recognised() {
        assert_eq!(
            parse_line("Restored 'lost.c'"),
            Some(("lost.c", FileGroupId::Restored))
        );
    }
}

use std::path::Path;

use breakfastd::core::snapshot::{RECENT_LIMIT, is_artifact, recompute};
use chrono::Local;
use filetime::{FileTime, set_file_mtime};

fn note(dir: &Path, name: &str, mtime: i64) {
    let path = dir.join(name);
    std::fs::write(&path, name).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
}

#[test]
fn newest_first_by_modification_time() {
    let dir = tempfile::tempdir().unwrap();
    note(dir.path(), "a.md", 1_700_000_001);
    note(dir.path(), "b.md", 1_700_000_003);
    note(dir.path(), "c.md", 1_700_000_002);

    let snapshot = recompute(dir.path(), "md", None);

    assert_eq!(snapshot.count, 3);
    assert_eq!(snapshot.most_recent, Some(dir.path().join("b.md")));
    assert_eq!(
        snapshot.recent,
        vec![
            dir.path().join("b.md"),
            dir.path().join("c.md"),
            dir.path().join("a.md"),
        ]
    );
}

#[test]
fn only_matching_files_are_counted() {
    let dir = tempfile::tempdir().unwrap();
    note(dir.path(), "meeting.md", 1_700_000_000);
    note(dir.path(), "meeting.json", 1_700_000_500);
    note(dir.path(), "sync.log", 1_700_000_900);
    std::fs::create_dir(dir.path().join("archive.md")).unwrap();

    let snapshot = recompute(dir.path(), "md", None);
    assert_eq!(snapshot.count, 1);
    assert_eq!(snapshot.most_recent, Some(dir.path().join("meeting.md")));
}

#[test]
fn recent_is_capped_but_count_is_not() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..8 {
        note(dir.path(), &format!("note-{}.md", i), 1_700_000_000 + i);
    }

    let snapshot = recompute(dir.path(), "md", None);
    assert_eq!(snapshot.count, 8);
    assert_eq!(snapshot.recent.len(), RECENT_LIMIT);
    assert_eq!(snapshot.recent[0], dir.path().join("note-7.md"));
}

#[test]
fn empty_and_missing_directories_yield_empty_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let last_run = Some(Local::now());

    let empty = recompute(dir.path(), "md", last_run);
    assert_eq!(empty.count, 0);
    assert!(empty.recent.is_empty());
    assert!(empty.most_recent.is_none());
    assert_eq!(empty.last_run, last_run);

    let missing = recompute(&dir.path().join("gone"), "md", None);
    assert_eq!(missing.count, 0);
    assert!(missing.most_recent.is_none());
}

#[test]
fn artifacts_must_live_in_the_output_directory() {
    let dir = tempfile::tempdir().unwrap();
    let other = tempfile::tempdir().unwrap();
    note(dir.path(), "retro.md", 1_700_000_000);
    note(dir.path(), "retro.command", 1_700_000_000);
    note(other.path(), "elsewhere.md", 1_700_000_000);
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    note(&dir.path().join("nested"), "deep.md", 1_700_000_000);

    assert!(is_artifact(dir.path(), "md", &dir.path().join("retro.md")));
    assert!(is_artifact(dir.path(), "MD", &dir.path().join("retro.md")));

    assert!(!is_artifact(dir.path(), "md", &dir.path().join("retro.command")));
    assert!(!is_artifact(dir.path(), "md", &dir.path().join("missing.md")));
    assert!(!is_artifact(dir.path(), "md", &dir.path().join("nested/deep.md")));
    assert!(!is_artifact(dir.path(), "md", &other.path().join("elsewhere.md")));

    let escaped = dir
        .path()
        .join("..")
        .join(other.path().file_name().unwrap())
        .join("elsewhere.md");
    assert!(!is_artifact(dir.path(), "md", &escaped));
}

//! 笔记存储集成测试

use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use tempfile::TempDir;
use zettel_engine::core::config::DEFAULT_ALPHABET;
use zettel_engine::core::{IdGenerator, LinkRelation, SrsData};
use zettel_engine::storage::{Note, NoteStore};
use zettel_engine::Error;

fn created() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
}

#[test]
fn test_round_trip_preserves_fields() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let store = NoteStore::open(temp.path())?;

    let mut note = Note::new("k3x9", "Zettel: a note on notes", created());
    note.add_tag("method");
    note.add_tag("type:flashcard");
    note.note_type = Some("permanent".to_string());
    note.set_body("# Heading\n\nSee #[[ab12]] and [[cd34]]#.\n\n```\n[[not a link]]\n```\n");
    note.srs = Some(SrsData {
        easiness: 2.36,
        consecutive_correct: 2,
        due: 1_700_518_400,
        total_reviews: 3,
        review_history: Vec::new(),
    });
    store.create(&mut note)?;

    let read = store.read("k3x9")?;
    assert_eq!(read.id, note.id);
    assert_eq!(read.title, note.title);
    assert_eq!(read.tags, note.tags);
    assert_eq!(read.created, note.created);
    assert_eq!(read.note_type.as_deref(), Some("permanent"));
    assert_eq!(read.body.trim_end(), note.body.trim_end());
    assert_eq!(read.srs, note.srs);

    assert_eq!(read.links.len(), 2);
    assert!(read.links[0].has_relation(LinkRelation::Up));
    assert!(read.links[1].has_relation(LinkRelation::Down));
    Ok(())
}

#[test]
fn test_file_layout() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let store = NoteStore::open(temp.path())?;

    let mut note = Note::new("ab12", "Title", created());
    note.set_body("Body\n\n\n");
    store.create(&mut note)?;

    let text = fs::read_to_string(temp.path().join("ab12.md"))?;
    assert!(text.starts_with("---\nid: ab12\n"));
    assert!(text.contains("title: Title\n"));
    assert!(text.contains("created-at: "));
    assert!(text.contains("2024-05-06T07:08:09Z"));
    assert!(!text.contains("tags"));
    assert!(!text.contains("srs"));
    assert!(text.ends_with("---\nBody\n"));
    Ok(())
}

#[test]
fn test_hand_written_note_is_readable() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    fs::write(
        temp.path().join("qz01.md"),
        "---\nid: qz01\ntitle: Hand written\ncreated-at: 2023-12-01 10:00:00\ntags: [a, b]\nsrs:\n  easiness: 2.5\n  consecutive_correct: 0\n  due: 0\n  total_reviews: 0\nauthor: someone\n---\nText [[ab12|label]]\n",
    )?;
    let store = NoteStore::open(temp.path())?;

    let note = store.read("qz01")?;
    assert_eq!(note.tags, vec!["a", "b"]);
    assert_eq!(note.created, Utc.with_ymd_and_hms(2023, 12, 1, 10, 0, 0).unwrap());
    assert!(note.is_due(0));
    assert_eq!(note.links[0].href, "ab12");
    assert_eq!(note.links[0].title, "label");

    let mut note = note;
    store.update(&mut note)?;
    let text = fs::read_to_string(temp.path().join("qz01.md"))?;
    assert!(text.contains("author: someone"));
    Ok(())
}

#[test]
fn test_validation_errors_surface() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    fs::write(
        temp.path().join("ab12.md"),
        "---\nid: ab12\ntitle: t\ncreated-at: 2024-01-01T00:00:00Z\nsrs:\n  easiness: 0.5\n---\n",
    )?;
    let store = NoteStore::open(temp.path())?;
    assert!(matches!(store.read("ab12"), Err(Error::Validation(_))));
    Ok(())
}

#[test]
fn test_create_new_allocates_unused_ids() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let store = NoteStore::open(temp.path())?;
    let mut generator = IdGenerator::with_rng(StdRng::seed_from_u64(42), DEFAULT_ALPHABET, 4)?;

    let mut ids = Vec::new();
    for i in 0..20 {
        let note = store.create_new(&mut generator, &format!("Note {}", i), "", created())?;
        assert_eq!(note.id.len(), 4);
        assert!(store.exists(&note.id));
        ids.push(note.id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 20);
    assert_eq!(store.scan()?.len(), 20);
    Ok(())
}

#[test]
fn test_no_temp_files_left_behind() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let store = NoteStore::open(temp.path())?;
    let mut note = Note::new("ab12", "t", created());
    store.create(&mut note)?;
    for i in 0..5 {
        note.set_body(format!("revision {}", i));
        store.update(&mut note)?;
    }

    let names: Vec<String> = fs::read_dir(temp.path())?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    assert_eq!(names, vec!["ab12.md"]);
    assert!(store.read("ab12")?.body.contains("revision 4"));
    Ok(())
}

#[test]
fn test_scan_recurses_into_subdirectories() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let sub = temp.path().join("archive");
    fs::create_dir(&sub)?;
    fs::write(
        sub.join("zz99.md"),
        "---\ntitle: archived\ncreated-at: 2024-01-01\n---\n",
    )?;
    let store = NoteStore::open(temp.path())?;
    store.create(&mut Note::new("ab12", "top", created()))?;

    let ids: Vec<String> = store.scan()?.into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec!["ab12", "zz99"]);
    Ok(())
}

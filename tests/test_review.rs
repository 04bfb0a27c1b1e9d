//! 间隔重复复习流程集成测试

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use zettel_engine::core::srs::{MIN_EASINESS, SECONDS_PER_DAY};
use zettel_engine::core::Collection;
use zettel_engine::storage::{Note, NoteStore};
use zettel_engine::Error;

const T0: i64 = 1_700_000_000;

fn store_with_card(dir: &std::path::Path, id: &str) -> NoteStore {
    let store = NoteStore::open(dir).unwrap();
    let created = Utc.with_ymd_and_hms(2023, 11, 1, 0, 0, 0).unwrap();
    let mut note = Note::new(id, "Card", created);
    note.add_tag("type:flashcard");
    note.set_body("What is a zettel?");
    store.create(&mut note).unwrap();
    store
}

#[test]
fn test_review_progression_persists() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let store = store_with_card(temp.path(), "ab12");

    let first = store.review("ab12", 5, T0)?;
    let srs = first.srs.as_ref().unwrap();
    assert_eq!(srs.consecutive_correct, 1);
    assert_eq!(srs.total_reviews, 1);
    assert_eq!(srs.due, T0 + SECONDS_PER_DAY);
    assert!((srs.easiness - 3.14).abs() < 1e-9);

    let t1 = srs.due;
    let second = store.review("ab12", 5, t1)?;
    let srs = second.srs.as_ref().unwrap();
    assert_eq!(srs.consecutive_correct, 2);
    assert_eq!(srs.due, t1 + 6 * SECONDS_PER_DAY);

    let t2 = srs.due;
    let third = store.review("ab12", 5, t2)?;
    let srs = third.srs.as_ref().unwrap();
    assert_eq!(srs.consecutive_correct, 3);
    assert_eq!(srs.total_reviews, 3);
    assert_eq!(srs.due, t2 + 27 * SECONDS_PER_DAY);

    let read = store.read("ab12")?;
    let history: Vec<(i64, u8)> = read
        .srs
        .as_ref()
        .unwrap()
        .review_history
        .iter()
        .map(|r| (r.timestamp, r.quality))
        .collect();
    assert_eq!(history, vec![(T0, 5), (t1, 5), (t2, 5)]);
    Ok(())
}

#[test]
fn test_failed_review_resets_streak() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let store = store_with_card(temp.path(), "ab12");

    store.review("ab12", 6, T0)?;
    store.review("ab12", 6, T0 + SECONDS_PER_DAY)?;
    let failed = store.review("ab12", 2, T0 + 7 * SECONDS_PER_DAY)?;
    let srs = failed.srs.unwrap();
    assert_eq!(srs.consecutive_correct, 0);
    assert_eq!(srs.total_reviews, 3);
    assert_eq!(srs.due, T0 + 8 * SECONDS_PER_DAY);
    Ok(())
}

#[test]
fn test_easiness_floor_survives_disk() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let store = store_with_card(temp.path(), "ab12");

    for i in 0..12 {
        store.review("ab12", 1, T0 + i * SECONDS_PER_DAY)?;
    }
    let srs = store.read("ab12")?.srs.unwrap();
    assert!(srs.easiness >= MIN_EASINESS);
    assert_eq!(srs.review_history.len(), 12);
    Ok(())
}

#[test]
fn test_invalid_quality_leaves_file_untouched() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let store = store_with_card(temp.path(), "ab12");
    let before = std::fs::read_to_string(temp.path().join("ab12.md"))?;

    assert!(matches!(store.review("ab12", -1, T0), Err(Error::Validation(_))));
    assert!(matches!(store.review("ab12", 7, T0), Err(Error::Validation(_))));
    assert!(matches!(store.review("zz99", 4, T0), Err(Error::NotFound(_))));

    let after = std::fs::read_to_string(temp.path().join("ab12.md"))?;
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn test_due_queue_from_collection() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let store = store_with_card(temp.path(), "ab12");
    let created = Utc.with_ymd_and_hms(2023, 11, 1, 0, 0, 0).unwrap();
    store.create(&mut Note::new("cd34", "Card two", created))?;
    store.create(&mut Note::new("ef56", "Plain note", created))?;

    store.review("ab12", 5, T0)?;
    store.review("cd34", 0, T0 - SECONDS_PER_DAY)?;

    let collection = Collection::load(&store)?;
    let due: Vec<&str> = collection
        .due(T0 + SECONDS_PER_DAY)
        .iter()
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(due, vec!["cd34", "ab12"]);
    assert!(collection.due(T0 - 1).is_empty());

    let unscheduled = collection.get("ef56").unwrap();
    assert!(unscheduled.is_due(0));
    Ok(())
}

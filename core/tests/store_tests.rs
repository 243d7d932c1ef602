use tempfile::tempdir;
use time::macros::datetime;
use time::OffsetDateTime;
use topic_core::store::{MetaFile, COLLECTION, TEST_COLLECTION};
use topic_core::{Corpus, Hashtag, Record, RecordFilter, RecordStore, TokenSource};

fn record(id: &str, at: OffsetDateTime, who: &str, tokens: &[&str], tags: &[&str]) -> Record {
    Record {
        id: id.into(),
        created_at: at,
        screen_name: who.into(),
        text: tokens.join(" "),
        tokenized_text: tokens.iter().map(|t| t.to_string()).collect(),
        hashtags: tags.iter().map(|t| Hashtag { text: t.to_string() }).collect(),
    }
}

fn seeded_store(dir: &std::path::Path) -> RecordStore {
    let store = RecordStore::open(dir, COLLECTION).unwrap();
    store.insert(&record("1", datetime!(2020-03-01 12:00 UTC), "who", &["mask", "hand"], &["Covid19"])).unwrap();
    store.insert(&record("2", datetime!(2020-03-03 0:00 UTC), "cdcgov", &["vaccin", "trial"], &[])).unwrap();
    store.insert(&record("3", datetime!(2020-03-05 8:30 UTC), "who", &["hospit", "mask"], &["StayHome"])).unwrap();
    store.insert(&record("4", datetime!(2020-03-09 23:59 UTC), "nasa", &["launch", "rocket"], &[])).unwrap();
    store
}

#[test]
fn finds_records_in_date_order() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path());
    assert_eq!(store.len(), 4);

    let filter = RecordFilter::new(datetime!(2020-03-03 0:00 UTC), datetime!(2020-03-09 23:59 UTC));
    let ids: Vec<String> = store.find(&filter).map(|r| r.unwrap().id).collect();
    assert_eq!(ids, vec!["2", "3", "4"]);
}

#[test]
fn applies_account_and_hashtag_filters() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path());
    let filter = RecordFilter::new(datetime!(2020-01-01 0:00 UTC), datetime!(2020-12-31 0:00 UTC))
        .accounts(vec!["who", "cdcgov"])
        .token_source(TokenSource::Hashtags);
    let ids: Vec<String> = store.find(&filter).map(|r| r.unwrap().id).collect();
    assert_eq!(ids, vec!["1", "3"]);
}

#[test]
fn reimport_replaces_record() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path());
    let moved = record("1", datetime!(2020-04-01 0:00 UTC), "who", &["mask"], &[]);
    assert!(!store.insert(&moved).unwrap());
    assert_eq!(store.len(), 4);

    let (first, last) = store.span().unwrap().unwrap();
    assert_eq!(first, datetime!(2020-03-03 0:00 UTC));
    assert_eq!(last, datetime!(2020-04-01 0:00 UTC));
}

#[test]
fn collections_are_separate() {
    let dir = tempdir().unwrap();
    {
        let store = seeded_store(dir.path());
        store.flush().unwrap();
    }
    let test_store = RecordStore::open(dir.path(), TEST_COLLECTION).unwrap();
    assert!(test_store.is_empty());
    assert_eq!(test_store.span().unwrap(), None);
}

#[test]
fn meta_round_trips() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path());
    store.save_meta(&MetaFile { num_records: 4, updated_at: "2020-03-10T00:00:00Z".into(), version: 1 }).unwrap();
    assert_eq!(store.load_meta().unwrap().num_records, 4);
}

#[test]
fn empty_range_is_too_small() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path());
    let filter = RecordFilter::new(datetime!(2019-01-01 0:00 UTC), datetime!(2019-12-31 0:00 UTC));
    let records: Vec<Record> = store.find(&filter).collect::<Result<_, _>>().unwrap();
    assert!(records.is_empty());
    let err = Corpus::build(&records, TokenSource::Text, None).unwrap_err();
    assert_eq!(err.to_string(), "dataset too small: 0 unique token(s) after filtering, at least 2 required");
}

#[test]
fn hashtag_mode_tolerates_missing_hashtags() {
    let at = datetime!(2020-03-03 0:00 UTC);
    let records = vec![
        record("1", at, "a", &["x"], &["One", "Two"]),
        record("2", at, "a", &["y"], &[]),
    ];
    let corpus = Corpus::build(&records, TokenSource::Hashtags, None).unwrap();
    assert!(corpus.tokens[1].is_empty());
    assert!(corpus.docs[1].is_empty());
    assert_eq!(corpus.tokens[0], vec!["one".to_string(), "two".to_string()]);
}

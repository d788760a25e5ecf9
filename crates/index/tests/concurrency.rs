mod common;

use common::{Fixture, SLOW_IMAGE_INFO_INDEX, rgb_png};
use imgdex_cache::StoredEntry;
use imgdex_extract::ImageInfo;
use imgdex_index::codec::KeyCodec;
use imgdex_index::error::ErrorKind;
use imgdex_index::{EntryState, IMAGE_INFO_INDEX};
use imgdex_vfs::FileSystem;
use std::path::Path;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_extraction() {
    let fixture = Fixture::new([("cat.png", rgb_png(10, 20))]);
    let store = fixture.store(SLOW_IMAGE_INFO_INDEX).await;

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let (store, fs) = (store.clone(), fixture.fs.clone());
            tokio::spawn(async move { store.get(&fs, Path::new("cat.png")).await.unwrap() })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), Some(ImageInfo::new(10, 20, 24)));
    }
    assert_eq!(store.stats().extractions, 1);
    assert_eq!(fixture.mock.reads(), 1);
    assert_eq!(store.entries().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_keys_run_in_parallel() {
    let fixture = Fixture::new([("a.png", rgb_png(1, 1)), ("b.png", rgb_png(2, 2)), ("c.png", rgb_png(3, 3))]);
    let store = fixture.store(SLOW_IMAGE_INFO_INDEX).await;
    let (a, b, c) = tokio::join!(
        store.get(&fixture.fs, Path::new("a.png")),
        store.get(&fixture.fs, Path::new("b.png")),
        store.get(&fixture.fs, Path::new("c.png")),
    );
    assert_eq!(a.unwrap(), Some(ImageInfo::new(1, 1, 24)));
    assert_eq!(b.unwrap(), Some(ImageInfo::new(2, 2, 24)));
    assert_eq!(c.unwrap(), Some(ImageInfo::new(3, 3, 24)));
    assert_eq!(store.stats().extractions, 3);
}

#[tokio::test]
async fn test_failed_write_rolls_back() {
    let fixture = Fixture::new([("cat.png", rgb_png(10, 20))]);
    let store = fixture.store(IMAGE_INFO_INDEX).await;
    let path = Path::new("cat.png");

    fixture.persistence.fail_writes(true);
    let err = store.get(&fixture.fs, path).await.unwrap_err();
    assert_eq!(*err, ErrorKind::Persistence);
    assert!(err.is_retryable());
    assert_eq!(store.stats().failures, 1);
    assert_eq!(store.state(&fixture.fs, path).await.unwrap(), EntryState::Absent);

    fixture.persistence.fail_writes(false);
    assert_eq!(store.get(&fixture.fs, path).await.unwrap(), Some(ImageInfo::new(10, 20, 24)));
    assert_eq!(store.state(&fixture.fs, path).await.unwrap(), EntryState::Fresh);
    assert_eq!(store.stats().extractions, 2);
}

#[tokio::test]
async fn test_failed_write_keeps_previous_value_out_of_memory() {
    let fixture = Fixture::new([("cat.png", rgb_png(10, 20))]);
    let store = fixture.store(IMAGE_INFO_INDEX).await;
    let path = Path::new("cat.png");
    store.get(&fixture.fs, path).await.unwrap();

    fixture.mock.write("cat.png", rgb_png(30, 40)).await.unwrap();
    fixture.persistence.fail_writes(true);
    assert!(store.get(&fixture.fs, path).await.is_err());
    // The stale entry is still what persistence holds.
    assert_eq!(store.state(&fixture.fs, path).await.unwrap(), EntryState::Stale);
    fixture.persistence.fail_writes(false);
    assert_eq!(store.get(&fixture.fs, path).await.unwrap(), Some(ImageInfo::new(30, 40, 24)));
}

#[tokio::test]
async fn test_malformed_persisted_record_is_recomputed() {
    let fixture = Fixture::new([("cat.png", rgb_png(10, 20))]);
    let store = fixture.store(IMAGE_INFO_INDEX).await;
    let path = Path::new("cat.png");
    let id = fixture.fs.file_id(path).await.unwrap();
    let fingerprint = fixture.fs.fingerprint(path).await.unwrap();
    let key = (KeyCodec::FILE_ID.encode)(id);
    fixture
        .persistence
        .plant("ImageFileInfoIndex", &key, StoredEntry::new(fingerprint, Some(vec![0, 0, 0, 10, 0])))
        .await;
    assert_eq!(store.state(&fixture.fs, path).await.unwrap(), EntryState::Absent);

    assert_eq!(store.get(&fixture.fs, path).await.unwrap(), Some(ImageInfo::new(10, 20, 24)));
    assert_eq!(store.stats().loads, 0);
    assert_eq!(store.stats().extractions, 1);
    assert_eq!(store.state(&fixture.fs, path).await.unwrap(), EntryState::Fresh);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_invalidation_discards_running_extraction() {
    let fixture = Fixture::new([("cat.png", rgb_png(10, 20))]);
    let store = fixture.store(SLOW_IMAGE_INFO_INDEX).await;
    let path = Path::new("cat.png");

    let running = {
        let (store, fs) = (store.clone(), fixture.fs.clone());
        tokio::spawn(async move { store.get(&fs, Path::new("cat.png")).await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.state(&fixture.fs, path).await.unwrap(), EntryState::Pending);
    store.invalidate(&fixture.fs, path).await.unwrap();

    assert_eq!(running.await.unwrap(), None);
    assert_eq!(store.stats().discarded, 1);
    assert_eq!(store.entries().await.unwrap(), 0);

    assert_eq!(store.get(&fixture.fs, path).await.unwrap(), Some(ImageInfo::new(10, 20, 24)));
    assert_eq!(store.stats().extractions, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_invalidation_discards_running_load() {
    let fixture = Fixture::new([("cat.png", rgb_png(10, 20))]);
    let path = Path::new("cat.png");
    fixture.store(IMAGE_INFO_INDEX).await.get(&fixture.fs, path).await.unwrap();

    // A second handle starts with nothing in memory and has to go to persistence.
    let store = fixture.store(IMAGE_INFO_INDEX).await;
    fixture.persistence.delay_reads(Duration::from_millis(300));
    let running = {
        let (store, fs) = (store.clone(), fixture.fs.clone());
        tokio::spawn(async move { store.get(&fs, Path::new("cat.png")).await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.invalidate(&fixture.fs, path).await.unwrap());

    assert_eq!(running.await.unwrap(), None);
    assert_eq!(store.stats().discarded, 1);
    assert_eq!(store.stats().loads, 0);
    assert_eq!(store.entries().await.unwrap(), 0);

    fixture.persistence.delay_reads(Duration::ZERO);
    assert_eq!(store.get(&fixture.fs, path).await.unwrap(), Some(ImageInfo::new(10, 20, 24)));
    let stats = store.stats();
    assert_eq!((stats.hits, stats.extractions), (0, 1));
    assert_eq!(store.entries().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_change_during_extraction_is_not_committed() {
    let fixture = Fixture::new([("cat.png", rgb_png(10, 20))]);
    let store = fixture.store(SLOW_IMAGE_INFO_INDEX).await;
    let path = Path::new("cat.png");

    let running = {
        let (store, fs) = (store.clone(), fixture.fs.clone());
        tokio::spawn(async move { store.get(&fs, Path::new("cat.png")).await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    fixture.mock.write("cat.png", rgb_png(30, 40)).await.unwrap();

    // A request for the new content waits for the old flight, then starts its own.
    assert_eq!(store.get(&fixture.fs, path).await.unwrap(), Some(ImageInfo::new(30, 40, 24)));
    assert_eq!(running.await.unwrap(), None);
    assert_eq!(store.stats().discarded, 1);
    assert_eq!(store.stats().extractions, 2);
    assert_eq!(store.state(&fixture.fs, path).await.unwrap(), EntryState::Fresh);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reset_waits_for_running_extraction() {
    let fixture = Fixture::new([("cat.png", rgb_png(10, 20))]);
    let store = fixture.store(SLOW_IMAGE_INFO_INDEX).await;

    let running = {
        let (store, fs) = (store.clone(), fixture.fs.clone());
        tokio::spawn(async move { store.get(&fs, Path::new("cat.png")).await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    store.reset().await.unwrap();
    // The extraction committed before the wipe, never after it.
    assert_eq!(running.await.unwrap(), Some(ImageInfo::new(10, 20, 24)));
    assert_eq!(store.entries().await.unwrap(), 0);
    assert_eq!(store.state(&fixture.fs, Path::new("cat.png")).await.unwrap(), EntryState::Absent);
}

//! Contract Test: Store Mutation Semantics
//!
//! Constraints verified:
//! - Duplicate IPs collapse to their first occurrence, in order
//! - Append keeps existing records ahead of new ones; replace discards them
//! - A missing hostname is a distinct not-found error, an empty store is not
//! - Deleting a missing hostname succeeds
//! - Mutations never touch the config file or reload dnsmasq
//! - Invalid input leaves the store untouched

mod common;

use common::*;
use dnsmasq_api_core::{Error, ErrorKind, RecordStore, SyncEvent};
use std::sync::Arc;

#[tokio::test]
async fn duplicate_ips_keep_first_occurrence() {
    let h = harness("").await;

    let records = h
        .engine
        .set("h", ["1.1.1.1", "2.2.2.2", "1.1.1.1"], false)
        .await
        .unwrap();

    assert_eq!(records, vec![rec("h", "1.1.1.1"), rec("h", "2.2.2.2")]);
    assert_eq!(h.engine.lookup("h").await.unwrap(), records);
}

#[tokio::test]
async fn append_keeps_existing_records_first() {
    let h = harness("").await;
    h.engine.set("h", ["1.1.1.1"], false).await.unwrap();

    let records = h.engine.set("h", ["2.2.2.2"], true).await.unwrap();

    assert_eq!(records, vec![rec("h", "1.1.1.1"), rec("h", "2.2.2.2")]);
}

#[tokio::test]
async fn append_deduplicates_against_existing() {
    let h = harness("").await;
    h.engine
        .set("h", ["1.1.1.1", "2.2.2.2"], false)
        .await
        .unwrap();

    let records = h
        .engine
        .set("h", ["3.3.3.3", "1.1.1.1"], true)
        .await
        .unwrap();

    assert_eq!(
        records,
        vec![rec("h", "1.1.1.1"), rec("h", "2.2.2.2"), rec("h", "3.3.3.3")]
    );
}

#[tokio::test]
async fn replace_discards_existing_records() {
    let h = harness("").await;
    h.engine.set("h", ["1.1.1.1"], false).await.unwrap();

    let records = h.engine.set("h", ["2.2.2.2"], false).await.unwrap();

    assert_eq!(records, vec![rec("h", "2.2.2.2")]);
}

#[tokio::test]
async fn append_to_missing_host_creates_it() {
    let h = harness("").await;

    let records = h.engine.set("new.lan", ["10.0.0.9"], true).await.unwrap();

    assert_eq!(records, vec![rec("new.lan", "10.0.0.9")]);
}

#[tokio::test]
async fn missing_host_is_not_found_but_empty_store_lists_empty() {
    let h = harness("").await;

    let err = h.engine.lookup("missing").await.unwrap_err();
    assert!(matches!(err, Error::HostNotFound(ref host) if host == "missing"));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert!(h.engine.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let h = harness("").await;

    h.engine.delete_host("missing").await.unwrap();
    assert!(h.engine.lookup("missing").await.unwrap_err().is_not_found());

    h.engine.set("h", ["1.1.1.1"], false).await.unwrap();
    h.engine.delete_host("h").await.unwrap();
    h.engine.delete_host("h").await.unwrap();
    assert!(h.engine.lookup("h").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn mutations_do_not_publish() {
    let h = harness("address=/old.lan/10.0.0.1\n").await;
    let before = h.config_text();

    h.engine.set("h", ["1.1.1.1"], false).await.unwrap();
    h.engine.delete_host("old.lan").await.unwrap();

    assert_eq!(h.config_text(), before, "set/delete must not write the file");
    assert_eq!(h.reloader.call_count(), 0, "set/delete must not reload");
}

#[tokio::test]
async fn invalid_input_leaves_store_untouched() {
    let h = harness("").await;
    h.engine.set("h", ["1.1.1.1"], false).await.unwrap();

    let empty: [&str; 0] = [];
    for result in [
        h.engine.set("h", empty, false).await,
        h.engine.set("", ["2.2.2.2"], false).await,
        h.engine.set("h", ["2.2.2.2/24"], false).await,
        h.engine.set("h", ["2.2.2.2", "bad ip"], true).await,
    ] {
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{}", err);
    }

    assert_eq!(h.engine.lookup("h").await.unwrap(), vec![rec("h", "1.1.1.1")]);
}

#[tokio::test]
async fn store_errors_propagate() {
    let h = harness_with("", true);
    let flaky = FlakyStore::new(h.store.clone());
    let switch = flaky.switch();

    let (engine, _events) = dnsmasq_api_core::SyncEngine::new(
        Box::new(flaky),
        Box::new(CountingReloader::new()),
        h.metrics.clone(),
        &dnsmasq_api_core::SyncSettings::new(&h.config_path).with_skip_reload(true),
    )
    .unwrap();

    engine.set("h", ["1.1.1.1"], false).await.unwrap();
    switch.store(true, std::sync::atomic::Ordering::SeqCst);

    for err in [
        engine.list_all().await.unwrap_err(),
        engine.lookup("h").await.unwrap_err(),
        engine.set("h", ["2.2.2.2"], true).await.unwrap_err(),
        engine.delete_host("h").await.unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::Unavailable, "{}", err);
    }

    switch.store(false, std::sync::atomic::Ordering::SeqCst);
    assert_eq!(engine.lookup("h").await.unwrap(), vec![rec("h", "1.1.1.1")]);
}

#[tokio::test]
async fn concurrent_appends_do_not_lose_ips() {
    let h = harness("").await;
    let engine = Arc::new(h.engine);

    let mut handles = Vec::new();
    for i in 0..20 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .set("h", [format!("10.0.0.{}", i)], true)
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let records = engine.lookup("h").await.unwrap();
    assert_eq!(records.len(), 20);
    assert_eq!(h.store.get_by_host("h").await.unwrap(), records);
}

#[tokio::test]
async fn set_emits_event() {
    let mut h = harness("").await;
    h.drain_events();

    h.engine.set("h", ["1.1.1.1", "1.1.1.1"], true).await.unwrap();

    assert_eq!(
        h.drain_events(),
        vec![SyncEvent::RecordsSet {
            hostname: "h".to_string(),
            records: 1,
            appended: true,
        }]
    );
}

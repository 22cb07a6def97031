use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::time::sleep;

use async_connect::{
    connect, CommitOutcome, LoadDescriptor, LoadStateStore, Loading, NavProps, RouteEntry,
    TransitionGuard,
};

/// Props for a navigation to `name`, whose single loader resolves to
/// `name` after the given delay.
fn nav(name: &str, delay: Duration) -> NavProps {
    let value = json!(name);
    let descriptor = LoadDescriptor::keyed("page", move |_| {
        let value = value.clone();
        Loading::pending(async move {
            sleep(delay).await;
            Ok(value)
        })
    });
    let entries = vec![RouteEntry::single(Arc::new(connect(vec![descriptor], ())))];
    let mut params = Map::new();
    params.insert("name".to_owned(), json!(name));
    NavProps::new(entries, params)
}

fn page_guard(store: &LoadStateStore) -> TransitionGuard<Value> {
    TransitionGuard::new(store.clone(), |props: &NavProps| {
        props.params["name"].clone()
    })
}

#[tokio::test]
async fn newer_trigger_wins() {
    let store = LoadStateStore::new();
    let guard = page_guard(&store);

    // The first navigation is slow; a second one starts before it
    // settles.
    let first = guard
        .activate(nav("first", Duration::from_millis(50)))
        .unwrap();
    let second = guard
        .update(nav("second", Duration::from_millis(5)))
        .unwrap();
    assert_ne!(first.generation(), second.generation());

    let (first, second) = tokio::join!(first, second);
    assert_eq!(second, CommitOutcome::Committed);
    assert_eq!(first, CommitOutcome::Stale);
    assert_eq!(guard.rendered(), Some(json!("second")));
    // Every settled trigger ends the global load, stale ones included,
    // and stale store writes are accepted rather than rolled back: the
    // slow loader settled last, so its value is what the store holds.
    assert!(store.loaded());
    assert_eq!(store.value("page"), Some(json!("first")));
}

#[tokio::test]
async fn preloaded_store_commits_without_loading() {
    let store = LoadStateStore::new();
    store.end_global_load();
    let guard = page_guard(&store);

    assert!(guard
        .activate(nav("home", Duration::from_millis(1)))
        .is_none());
    assert!(guard.is_active());
    assert_eq!(guard.rendered(), Some(json!("home")));
    // Nothing was triggered, so the page loader never ran.
    assert!(store.key_state("page").is_none());
}

#[tokio::test]
async fn deactivated_guard_never_commits() {
    let store = LoadStateStore::new();
    let guard = page_guard(&store);

    let trigger = guard
        .activate(nav("gone", Duration::from_millis(5)))
        .unwrap();
    guard.deactivate();
    assert_eq!(trigger.await, CommitOutcome::Detached);
    assert_eq!(guard.rendered(), None);
    // Store bookkeeping still ran to completion.
    assert!(store.loaded());
    assert_eq!(store.value("page"), Some(json!("gone")));
}

#[tokio::test]
async fn global_flag_follows_the_trigger_lifecycle() {
    let store = LoadStateStore::new();
    let guard = page_guard(&store);

    let trigger = guard
        .activate(nav("home", Duration::from_millis(5)))
        .unwrap();
    // The trigger began synchronously, dropping the flag right away.
    assert!(!store.loaded());
    assert_eq!(trigger.await, CommitOutcome::Committed);
    assert!(store.loaded());
    assert_eq!(guard.rendered(), Some(json!("home")));
}

#[tokio::test]
async fn guard_activates_only_once() {
    let store = LoadStateStore::new();
    let guard = page_guard(&store);

    let trigger = guard
        .activate(nav("home", Duration::from_millis(1)))
        .unwrap();
    assert!(guard
        .activate(nav("again", Duration::from_millis(1)))
        .is_none());
    let _ = trigger.await;
}

#[tokio::test]
async fn updates_require_an_active_guard() {
    let store = LoadStateStore::new();
    let guard = page_guard(&store);

    assert!(guard.update(nav("early", Duration::from_millis(1))).is_none());

    let trigger = guard
        .activate(nav("home", Duration::from_millis(1)))
        .unwrap();
    let _ = trigger.await;
    guard.deactivate();

    assert!(guard.update(nav("late", Duration::from_millis(1))).is_none());
}

#[tokio::test]
async fn generations_are_comparable_in_isolation() {
    let store = LoadStateStore::new();
    let guard = page_guard(&store);

    let trigger = guard.activate(nav("a", Duration::from_millis(1))).unwrap();
    let superseded = trigger.generation();
    let newer = guard.update(nav("b", Duration::from_millis(1))).unwrap();
    assert_eq!(guard.current_generation(), newer.generation());

    // The older token can no longer commit, even by hand.
    assert_eq!(
        guard.try_commit(superseded, nav("a", Duration::from_millis(1))),
        CommitOutcome::Stale
    );

    let (_, second) = tokio::join!(trigger, newer);
    assert_eq!(second, CommitOutcome::Committed);
    assert_eq!(guard.rendered(), Some(json!("b")));
}

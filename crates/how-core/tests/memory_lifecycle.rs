//! End-to-end use of the command memory through its public API.
//!
//! Mirrors how the CLI drives the store: open once per invocation, save after a
//! confirmed command, recall for a later question, close.

use how_core::{InteractionStore, OpContext, StoreOptions, DB_FILE_NAME};
use std::time::Duration;
use tempfile::TempDir;

fn bg() -> OpContext {
    OpContext::background()
}

#[test]
fn test_recall_across_invocations() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("how");

    // First invocation: two answers get confirmed.
    let store = InteractionStore::open(&dir).unwrap();
    store
        .save(&bg(), "how do I find large files", "du -ah . | sort -rh | head", "Largest files first")
        .unwrap();
    store
        .save(&bg(), "show disk usage", "df -h", "Free space per filesystem")
        .unwrap();
    store.close().unwrap();
    assert!(dir.join(DB_FILE_NAME).exists());

    // Second invocation: a related question recalls the first answer.
    let store = InteractionStore::open(&dir).unwrap();
    let recalled = store.search(&bg(), "find files bigger than 1GB", 10).unwrap();
    assert_eq!(recalled.len(), 1);
    assert_eq!(recalled[0].command, "du -ah . | sort -rh | head");
    assert_eq!(recalled[0].tags, "files find large");

    // The same command confirmed again for a new question.
    store
        .save(&bg(), "which files use the most space", "du -ah . | sort -rh | head", "Largest files first")
        .unwrap();
    let recalled = store.search(&bg(), "space", 10).unwrap();
    assert_eq!(recalled.len(), 1);
    assert_eq!(recalled[0].use_count, 2);
    assert!(recalled[0].is_repeat());
    assert_eq!(recalled[0].question, "which files use the most space");

    assert!(store.search(&bg(), "large", 10).unwrap().is_empty());
    assert_eq!(store.count(&bg()).unwrap(), 2);
}

#[test]
fn test_list_then_clear() {
    let temp_dir = TempDir::new().unwrap();
    let options = StoreOptions {
        busy_timeout: Duration::from_millis(250),
    };
    let store = InteractionStore::open_with(temp_dir.path(), &options).unwrap();

    for (question, command) in [
        ("list files", "ls"),
        ("git status", "git status"),
        ("running containers", "docker ps"),
    ] {
        store.save(&bg(), question, command, "").unwrap();
    }

    let listed = store.list(&bg(), 20).unwrap();
    let commands: Vec<_> = listed.iter().map(|i| i.command.as_str()).collect();
    assert_eq!(commands, vec!["docker ps", "git status", "ls"]);

    assert_eq!(store.clear(&bg()).unwrap(), 3);
    assert!(store.list(&bg(), 20).unwrap().is_empty());
    assert!(store.search(&bg(), "git", 20).unwrap().is_empty());
}

#[test]
fn test_timeout_context_allows_quick_operations() {
    let temp_dir = TempDir::new().unwrap();
    let store = InteractionStore::open(temp_dir.path()).unwrap();
    let ctx = OpContext::with_timeout(Duration::from_secs(30));

    store.save(&ctx, "compress folder", "tar czf out.tgz dir", "").unwrap();
    assert_eq!(store.search(&ctx, "compress", 5).unwrap().len(), 1);
}

#[test]
fn test_cancelled_save_leaves_store_usable() {
    let temp_dir = TempDir::new().unwrap();
    let store = InteractionStore::open(temp_dir.path()).unwrap();

    let ctx = bg();
    ctx.cancel();
    let err = store.save(&ctx, "list files", "ls", "").unwrap_err();
    assert!(err.is_interrupted());
    assert!(!err.is_open_error());

    store.save(&bg(), "list files", "ls", "").unwrap();
    assert_eq!(store.list(&bg(), 10).unwrap()[0].use_count, 1);
}

#[test]
fn test_store_is_shareable_across_threads() {
    let temp_dir = TempDir::new().unwrap();
    let store = std::sync::Arc::new(InteractionStore::open(temp_dir.path()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || {
                store.save(&bg(), "tail the log", "tail -f app.log", "").unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let rows = store.list(&bg(), 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].use_count, 4);
}

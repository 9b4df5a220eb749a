//! Upload session: confirmation gates, store hand-off and the target control.

mod common;

use std::cell::RefCell;
use std::sync::Mutex;

use image_reducer::batch::{BatchOrchestrator, ProgressEvent};
use image_reducer::config::TargetSize;
use image_reducer::session::{
    LEAVE_WARNING, START_OVER_WARNING, Session, SessionState, StartOutcome, UPSCALE_WARNING,
};
use image_reducer::store::{HandoffStore, MemoryStorage, StoreView};

use common::mock_compressor::ScriptedCompressor;
use common::test_images::{gradient_png, padded_png};

fn session_with(mock: ScriptedCompressor) -> Session {
    Session::new(BatchOrchestrator::new(mock))
}

fn loaded_store(backend: MemoryStorage) -> Mutex<HandoffStore> {
    let mut store = HandoffStore::new(backend);
    store.load();
    Mutex::new(store)
}

fn ignore(_: &ProgressEvent) {}

#[tokio::test]
async fn test_declined_upscale_warning_keeps_selection() {
    let mock = ScriptedCompressor::new();
    let mut session = session_with(mock.clone());
    session.selection_mut().add("small.png", padded_png(20 * 1024)).unwrap();
    let handoff = loaded_store(MemoryStorage::new());

    let prompts = RefCell::new(Vec::new());
    let mut decline = |prompt: &str| {
        prompts.borrow_mut().push(prompt.to_string());
        false
    };
    let outcome = session.start(&mut decline, &ignore, &handoff).await.unwrap();

    assert!(matches!(outcome, StartOutcome::Declined));
    assert_eq!(prompts.into_inner(), vec![UPSCALE_WARNING.to_string()]);
    assert_eq!(session.selection().len(), 1);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(mock.call_names().is_empty());
    assert_eq!(handoff.lock().unwrap().read(), StoreView::Loaded(&[]));
}

#[tokio::test]
async fn test_completed_batch_is_handed_to_store() {
    let mut session = session_with(ScriptedCompressor::new());
    session.set_target(TargetSize::from_kb(10).unwrap());
    session.selection_mut().add("a.png", padded_png(40 * 1024)).unwrap();
    session.selection_mut().add("b.png", padded_png(30 * 1024)).unwrap();
    let backend = MemoryStorage::new();
    let handoff = loaded_store(backend.clone());

    let mut never_asked = |prompt: &str| -> bool { panic!("unexpected prompt: {}", prompt) };
    let outcome = session.start(&mut never_asked, &ignore, &handoff).await.unwrap();

    let StartOutcome::Completed { outcome, persist } = outcome else {
        panic!("batch should have run");
    };
    assert!(persist.is_persisted());
    assert_eq!(outcome.results.len(), 2);
    assert!(!session.has_pending_selection());
    assert_eq!(session.state(), SessionState::Idle);

    // a separate consumer sees the same results
    let mut reader = HandoffStore::new(backend);
    assert_eq!(reader.load(), outcome.results.as_slice());
}

#[tokio::test]
async fn test_empty_selection_cannot_start() {
    let mut session = session_with(ScriptedCompressor::new());
    let handoff = loaded_store(MemoryStorage::new());
    let result = session.start(&mut |_: &str| true, &ignore, &handoff).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_failed_persist_is_reported_not_fatal() {
    let mut session = session_with(ScriptedCompressor::new());
    session.set_target(TargetSize::from_kb(10).unwrap());
    session.selection_mut().add("a.png", padded_png(40 * 1024)).unwrap();
    let handoff = loaded_store(MemoryStorage::read_only());

    let outcome = session.start(&mut |_: &str| true, &ignore, &handoff).await.unwrap();
    let StartOutcome::Completed { outcome, persist } = outcome else {
        panic!("batch should have run");
    };
    assert!(!persist.is_persisted());
    assert_eq!(handoff.lock().unwrap().read(), StoreView::Loaded(&outcome.results));
}

#[test]
fn test_start_over_requires_confirmation() {
    let mut session = session_with(ScriptedCompressor::new());
    session.selection_mut().add("a.png", gradient_png(4, 4)).unwrap();
    let handoff = loaded_store(MemoryStorage::new());
    handoff.lock().unwrap().write(vec![image_reducer::CompressedResult::new(
        "a.png",
        "image/png",
        10,
        b"x",
    )]);

    let mut asked = Vec::new();
    let declined = session.start_over(
        &mut |prompt: &str| {
            asked.push(prompt.to_string());
            false
        },
        &handoff,
    );
    assert!(declined.is_none());
    assert_eq!(asked, [START_OVER_WARNING]);
    assert!(session.has_pending_selection());
    assert!(matches!(handoff.lock().unwrap().read(), StoreView::Loaded(r) if r.len() == 1));

    let cleared = session.start_over(&mut |_: &str| true, &handoff).unwrap();
    assert!(cleared.is_persisted());
    assert!(!session.has_pending_selection());
    assert_eq!(handoff.lock().unwrap().read(), StoreView::Loaded(&[]));
}

#[test]
fn test_navigation_guard() {
    let mut session = session_with(ScriptedCompressor::new());
    assert!(session.confirm_leave(&mut |_: &str| -> bool { panic!("nothing to lose") }));

    session.selection_mut().add("a.png", gradient_png(4, 4)).unwrap();
    let mut seen = None;
    assert!(!session.confirm_leave(&mut |prompt: &str| {
        seen = Some(prompt.to_string());
        false
    }));
    assert_eq!(seen.as_deref(), Some(LEAVE_WARNING));
    assert!(session.confirm_leave(&mut |_: &str| true));
}

#[test]
fn test_target_control_clamps() {
    let mut session = session_with(ScriptedCompressor::new());
    assert_eq!(session.target().kb(), 100);
    assert_eq!(session.set_target_kb(5).kb(), 10);
    assert_eq!(session.set_target_kb(-40).kb(), 10);
    assert_eq!(session.set_target_kb(2500).kb(), 2000);
    assert_eq!(session.set_target_kb(254).kb(), 250);
    assert_eq!(session.set_target_kb(255).kb(), 260);
    assert!(TargetSize::from_kb(5).is_err());
    assert!(TargetSize::from_kb(2010).is_err());
}

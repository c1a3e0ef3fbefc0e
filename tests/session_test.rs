//! Integration tests for generation sessions
//!
//! Runs sessions on worker tasks and checks what reaches the event hub.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use decision_tree_builder::config::GenerationConfig;
use decision_tree_builder::error::SessionError;
use decision_tree_builder::session::{GenerationMode, SessionEvent, SessionId, SessionManager};
use decision_tree_builder::{TreeEvent, TreeGenerator};

use common::{ScriptedModel, SplittingModel, FLICKER};

async fn next(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("event timed out")
        .expect("hub closed")
}

fn splitting_manager(outcomes: &[&str]) -> Arc<SessionManager> {
    let generator = TreeGenerator::new(
        Arc::new(SplittingModel::new(outcomes)),
        &GenerationConfig::default(),
    );
    Arc::new(SessionManager::new(generator))
}

#[tokio::test]
async fn test_started_session_streams_until_complete() {
    let manager = splitting_manager(&["A", "B", "C", "D"]);
    let mut rx = manager.subscribe();

    let id = manager
        .start("Financial Advisor", "Where should I save?", GenerationMode::Recursive)
        .await;

    let mut kinds = Vec::new();
    loop {
        let event = next(&mut rx).await;
        assert_eq!(event.session_id, id);
        let kind = event.event.kind();
        kinds.push(kind);
        if kind == "complete" {
            break;
        }
    }

    // Root, one expansion per two-outcome answer, then complete.
    assert_eq!(kinds, vec!["root", "expand", "expand", "complete"]);

    let tree = manager.snapshot(Some(&id)).await.unwrap();
    assert_eq!(tree.logs().len(), 3);
}

#[tokio::test]
async fn test_concurrent_sessions_keep_their_own_order() {
    let manager = splitting_manager(&["A", "B", "C", "D", "E", "F"]);
    let mut rx = manager.subscribe();

    let first = manager.start("r", "one", GenerationMode::Recursive).await;
    let second = manager.start("r", "two", GenerationMode::Recursive).await;

    let mut per_session: HashMap<SessionId, Vec<&'static str>> = HashMap::new();
    let mut completed = 0;
    while completed < 2 {
        let event = next(&mut rx).await;
        let kind = event.event.kind();
        per_session.entry(event.session_id).or_default().push(kind);
        if kind == "complete" {
            completed += 1;
        }
    }

    for id in [&first, &second] {
        let kinds = &per_session[id];
        assert_eq!(kinds.first(), Some(&"root"));
        assert_eq!(kinds.last(), Some(&"complete"));
        assert!(kinds[1..kinds.len() - 1].iter().all(|k| *k == "expand"));
    }

    // Both trees exist independently.
    assert_eq!(manager.snapshot(Some(&first)).await.unwrap().query(), "one");
    assert_eq!(manager.snapshot(Some(&second)).await.unwrap().query(), "two");
}

#[tokio::test]
async fn test_interactive_walkthrough_to_conclusion() {
    let manager = Arc::new(SessionManager::new(TreeGenerator::new(
        Arc::new(ScriptedModel::ok(&[FLICKER, common::CABLE])),
        &GenerationConfig::default(),
    )));
    let mut rx = manager.subscribe();

    let id = manager
        .run("Technical Troubleshooter", "Flicker", GenerationMode::Interactive)
        .await
        .unwrap();
    assert_eq!(next(&mut rx).await.event.kind(), "root");

    let tree = manager.snapshot(None).await.unwrap();
    let intermittent = tree.root().answers[1].clone();

    let child = manager
        .expand(Some(&id), "Technical Troubleshooter", "Flicker", &intermittent)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next(&mut rx).await.event.kind(), "expand");

    let tree = manager.snapshot(Some(&id)).await.unwrap();
    let yes = tree.question(&child).unwrap().answers[0].clone();
    assert!(manager
        .expand(None, "Technical Troubleshooter", "Flicker", &yes)
        .await
        .unwrap()
        .is_none());

    match next(&mut rx).await.event {
        TreeEvent::Leaf {
            parent_answer_id,
            outcome,
        } => {
            assert_eq!(parent_answer_id, yes);
            assert_eq!(outcome, "Loose cable");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_expansion_keeps_tree() {
    let manager = Arc::new(SessionManager::new(TreeGenerator::new(
        Arc::new(ScriptedModel::ok(&[FLICKER, "{\"question\": 42}"])),
        &GenerationConfig::default(),
    )));
    let mut rx = manager.subscribe();

    manager
        .run("r", "q", GenerationMode::Interactive)
        .await
        .unwrap();
    assert_eq!(next(&mut rx).await.event.kind(), "root");

    let target = manager.snapshot(None).await.unwrap().root().answers[1].clone();
    let err = manager.expand(None, "r", "q", &target).await.unwrap_err();
    assert!(matches!(err, SessionError::Generation(_)));

    assert_eq!(next(&mut rx).await.event.kind(), "error");
    let tree = manager.snapshot(None).await.unwrap();
    assert_eq!(tree.len(), 3);
    assert!(tree.answer(&target).unwrap().child.is_none());
}

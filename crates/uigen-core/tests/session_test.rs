//! End-to-end tests of the session controller against a scripted model.

use std::sync::Arc;

use uigen_core::plan::{PlanParseError, ValidationFailure};
use uigen_core::session::DEFAULT_ERROR_PLACEHOLDER;
use uigen_core::{
    GenerationFailure, GenerationOutcome, SessionConfig, SessionError, Snapshot, Stage,
};
use uigen_test_utils::{BOX_WITH_TEXT, MISSING_KIND, ScriptedModel, session_with, text_plan};

fn committed(outcome: GenerationOutcome) -> Arc<Snapshot> {
    match outcome {
        GenerationOutcome::Committed(s) => s,
        other => panic!("expected Committed, got: {other:?}"),
    }
}

fn ids(history: &[Arc<Snapshot>]) -> Vec<u64> {
    history.iter().map(|s| s.id).collect()
}

// ===========================================================================
// History shape
// ===========================================================================

#[tokio::test]
async fn successive_generations_number_one_to_n() {
    let mut model = ScriptedModel::new();
    for i in 0..5 {
        model = model.generation(&text_plan(&["x"]), &format!("code {i}"), "ok");
    }
    let session = session_with(&model, SessionConfig::default());

    for i in 0..5 {
        session
            .generate_from_prompt(&format!("step {i}"))
            .await
            .unwrap();
    }

    let history = session.history();
    assert_eq!(ids(&history), vec![1, 2, 3, 4, 5]);
    for pair in history.windows(2) {
        // Linear chain: each generation builds on the previous one.
        assert_eq!(pair[1].parent_id, Some(pair[0].id));
    }
    assert_eq!(session.active_snapshot_id(), Some(5));
}

#[tokio::test]
async fn parents_always_precede_children() {
    let model = ScriptedModel::new()
        .generation(BOX_WITH_TEXT, "a", "")
        .generation(BOX_WITH_TEXT, "b", "")
        .generation(BOX_WITH_TEXT, "c", "")
        .generation(BOX_WITH_TEXT, "d", "");
    let session = session_with(&model, SessionConfig::default());

    session.generate_from_prompt("a").await.unwrap();
    session.generate_from_prompt("b").await.unwrap();
    session.rollback_to(1).unwrap();
    session.generate_from_prompt("c").await.unwrap();
    session.rollback_to(2).unwrap();
    session.generate_from_prompt("d").await.unwrap();

    let history = session.history();
    for snap in &history {
        if let Some(parent) = snap.parent_id {
            assert!(parent < snap.id, "parent {parent} of {} is not older", snap.id);
            assert!(history.iter().any(|s| s.id == parent));
        }
    }
}

#[tokio::test]
async fn rollback_and_regenerate_forks_the_tree() {
    let model = ScriptedModel::new()
        .generation(BOX_WITH_TEXT, "one", "")
        .generation(BOX_WITH_TEXT, "two", "")
        .generation(BOX_WITH_TEXT, "three", "");
    let session = session_with(&model, SessionConfig::default());

    let first = committed(session.generate_from_prompt("start").await.unwrap());
    assert_eq!(first.id, 1);
    assert_eq!(first.parent_id, None);

    session.rollback_to(1).unwrap();
    let second = committed(session.generate_from_prompt("left").await.unwrap());
    assert_eq!((second.id, second.parent_id), (2, Some(1)));

    session.rollback_to(1).unwrap();
    let third = committed(session.generate_from_prompt("right").await.unwrap());
    assert_eq!((third.id, third.parent_id), (3, Some(1)));

    let children: Vec<u64> =
        session.with_store(|store| store.children(1).iter().map(|s| s.id).collect());
    assert_eq!(children, vec![2, 3]);
}

#[tokio::test]
async fn generation_uses_active_snapshot_code_as_base() {
    let model = ScriptedModel::new()
        .generation(BOX_WITH_TEXT, "FIRST_CODE", "")
        .generation(BOX_WITH_TEXT, "SECOND_CODE", "")
        .generation(BOX_WITH_TEXT, "THIRD_CODE", "");
    let session = session_with(&model, SessionConfig::default());

    session.generate_from_prompt("one").await.unwrap();
    session.generate_from_prompt("two").await.unwrap();
    session.rollback_to(1).unwrap();
    session.generate_from_prompt("three").await.unwrap();

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 9);
    // First planning call had no base.
    assert!(!prompts[0].contains("Current implementation"));
    // Second built on snapshot 1.
    assert!(prompts[3].contains("FIRST_CODE"));
    // Third built on snapshot 1 again, not snapshot 2.
    assert!(prompts[6].contains("FIRST_CODE"));
    assert!(!prompts[6].contains("SECOND_CODE"));
}

// ===========================================================================
// Rollback
// ===========================================================================

#[tokio::test]
async fn rollback_never_touches_history() {
    let model = ScriptedModel::new()
        .generation(BOX_WITH_TEXT, "a", "why a")
        .generation(&text_plan(&["b"]), "b", "why b");
    let session = session_with(&model, SessionConfig::default());
    session.generate_from_prompt("a").await.unwrap();
    session.generate_from_prompt("b").await.unwrap();

    let before = session.history();
    let snapshot = session.rollback_to(1).unwrap();
    let after = session.history();

    assert_eq!(snapshot.id, 1);
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert!(Arc::ptr_eq(b, a));
    }

    let view = session.view();
    assert_eq!(view.active_snapshot_id, Some(1));
    assert_eq!(view.generated_code, "a");
    assert_eq!(view.explanation.as_deref(), Some("why a"));
    assert_eq!(view.plan, snapshot.plan);
}

#[tokio::test]
async fn rollback_to_missing_snapshot_is_rejected() {
    let model = ScriptedModel::new().generation(BOX_WITH_TEXT, "a", "");
    let session = session_with(&model, SessionConfig::default());
    session.generate_from_prompt("a").await.unwrap();

    let err = session.rollback_to(2).unwrap_err();
    assert_eq!(err, SessionError::NotFound(2));
    assert_eq!(session.active_snapshot_id(), Some(1));
    assert_eq!(session.view().generated_code, "a");
}

// ===========================================================================
// Failures
// ===========================================================================

#[tokio::test]
async fn failed_generation_leaves_state_identical() {
    let model = ScriptedModel::new()
        .generation(BOX_WITH_TEXT, "good", "")
        .reply(BOX_WITH_TEXT)
        .fail("connection reset");
    let session = session_with(&model, SessionConfig::default());
    session.generate_from_prompt("good").await.unwrap();

    let history_before = session.history();
    let active_before = session.active_snapshot_id();

    let outcome = session.generate_from_prompt("bad").await.unwrap();
    match outcome {
        GenerationOutcome::Failed(GenerationFailure::Pipeline(e)) => {
            assert_eq!(e.stage, Stage::Generation);
            assert_eq!(e.prompt, "bad");
            assert_eq!(e.previous_code.as_deref(), Some("good"));
        }
        other => panic!("expected pipeline failure, got: {other:?}"),
    }

    let history_after = session.history();
    assert_eq!(history_before.len(), history_after.len());
    for (b, a) in history_before.iter().zip(&history_after) {
        assert!(Arc::ptr_eq(b, a));
    }
    assert_eq!(session.active_snapshot_id(), active_before);
    assert_eq!(session.with_store(|s| s.next_id()), 2);

    // Stage 3 never ran.
    assert_eq!(model.call_count(), 5);
}

#[tokio::test]
async fn plan_missing_kind_commits_nothing() {
    let model = ScriptedModel::new().generation(MISSING_KIND, "code", "why");
    let session = session_with(&model, SessionConfig::default());

    let outcome = session.generate_from_prompt("bad plan").await.unwrap();
    match outcome {
        GenerationOutcome::Failed(GenerationFailure::Plan(PlanParseError::Validation(e))) => {
            assert_eq!(e.reason, ValidationFailure::MissingKind);
            assert_eq!(e.path, "$[0]");
        }
        other => panic!("expected validation failure, got: {other:?}"),
    }

    assert!(session.history().is_empty());
    assert_eq!(session.active_snapshot_id(), None);
    let view = session.view();
    assert_eq!(view.generated_code, DEFAULT_ERROR_PLACEHOLDER);
    assert!(view.plan.is_none());
}

#[tokio::test]
async fn next_success_after_failure_continues_numbering() {
    let model = ScriptedModel::new()
        .generation(BOX_WITH_TEXT, "a", "")
        .generation("not json", "x", "")
        .generation(BOX_WITH_TEXT, "b", "");
    let session = session_with(&model, SessionConfig::default());

    session.generate_from_prompt("a").await.unwrap();
    let failed = session.generate_from_prompt("x").await.unwrap();
    assert!(matches!(failed, GenerationOutcome::Failed(_)));
    let b = committed(session.generate_from_prompt("b").await.unwrap());

    assert_eq!((b.id, b.parent_id), (2, Some(1)));
}

// ===========================================================================
// Empty prompts and plan contents
// ===========================================================================

#[tokio::test]
async fn blank_prompts_are_ignored() {
    let model = ScriptedModel::new();
    let session = session_with(&model, SessionConfig::default());

    for prompt in ["", "   ", "\n\t"] {
        let outcome = session.generate_from_prompt(prompt).await.unwrap();
        assert!(matches!(outcome, GenerationOutcome::Skipped));
    }

    assert_eq!(model.call_count(), 0);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn committed_plan_matches_validated_tree() {
    let model = ScriptedModel::new().generation(BOX_WITH_TEXT, "code", "why");
    let session = session_with(&model, SessionConfig::default());

    let snap = committed(session.generate_from_prompt("box").await.unwrap());
    let plan = snap.plan.as_ref().expect("plan present");

    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].kind, "Box");
    assert_eq!(plan[0].children.len(), 1);
    assert_eq!(plan[0].children[0].kind, "Text");
    assert_eq!(snap.prompt, "box");
    assert_eq!(snap.explanation, "why");
}

#[tokio::test]
async fn empty_plan_is_committed() {
    let model = ScriptedModel::new().generation(r#"{"components": []}"#, "code", "");
    let session = session_with(&model, SessionConfig::default());

    let snap = committed(session.generate_from_prompt("nothing").await.unwrap());
    assert_eq!(snap.plan.as_ref().map(Vec::len), Some(0));
}

#[tokio::test]
async fn lineage_follows_parent_links() {
    let model = ScriptedModel::new()
        .generation(BOX_WITH_TEXT, "a", "")
        .generation(BOX_WITH_TEXT, "b", "")
        .generation(BOX_WITH_TEXT, "c", "");
    let session = session_with(&model, SessionConfig::default());

    session.generate_from_prompt("a").await.unwrap();
    session.generate_from_prompt("b").await.unwrap();
    session.rollback_to(1).unwrap();
    session.generate_from_prompt("c").await.unwrap();

    let chain = session.with_store(|store| {
        store
            .lineage(3)
            .map(|c| c.iter().map(|s| s.id).collect::<Vec<_>>())
    });
    assert_eq!(chain, Ok(vec![1, 3]));
}

//! End-to-end pipeline tests against a scripted analyst.

use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use lectern::domain::models::{BookOutcome, BudgetConfig, Category, Config, RetryConfig};
use lectern::infrastructure::analyst::{MockAnalyst, ScriptedResponse};
use lectern::infrastructure::checkpoint::CheckpointStore;
use lectern::services::orchestrator::{RunOrchestrator, RunOutcome};

fn test_config(dir: &Path, books: &[&str]) -> Config {
    let src = dir.join("src");
    fs::create_dir_all(&src).unwrap();
    let mut config = Config {
        books: books.iter().map(|b| (*b).to_string()).collect(),
        codebase_roots: vec![src],
        state_dir: dir.join(".lectern"),
        ..Config::default()
    };
    config.analyst.retry = RetryConfig {
        max_retries: 1,
        initial_backoff_ms: 1,
        max_backoff_ms: 10,
    };
    config
}

fn orchestrator(config: Config, analyst: Arc<MockAnalyst>) -> RunOrchestrator {
    RunOrchestrator::new(config, analyst, Arc::new(AtomicBool::new(false)))
}

#[tokio::test]
async fn test_cross_book_agreement_escalates_in_full_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &["Book A", "Book B", "Book C", "Book D"]);

    let analyst = Arc::new(MockAnalyst::new());
    for (book, phrasing) in [
        ("Book A", "Implement model versioning"),
        ("Book B", "Model version control and tracking"),
        ("Book C", "Implement Model Versioning"),
        ("Book D", "model versioning"),
    ] {
        analyst
            .script_book(
                book,
                vec![ScriptedResponse::items(0.10, &[(phrasing, "nice-to-have")])],
            )
            .await;
    }

    let report = orchestrator(config.clone(), analyst).run(false).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.books.len(), 4);
    assert_eq!(report.ledger_entries, 1, "all phrasings must merge");

    let store = CheckpointStore::new(&config.state_dir);
    let ledger = lectern::services::ledger::RecommendationLedger::load(
        &store.ledger_path(),
        config.similarity,
        config.escalation,
    )
    .unwrap();
    let rec = ledger.iter().next().unwrap();
    assert_eq!(rec.source_books.len(), 4);
    // Four independent sources push the floor to Critical.
    assert_eq!(rec.category, Category::Critical);
}

#[tokio::test]
async fn test_budget_exhaustion_then_resume_finishes_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), &["Book A", "Book B"]);
    config.budget = BudgetConfig {
        hard_cost_ceiling: 1.10,
        estimated_cost_per_request: 0.25,
        ..BudgetConfig::default()
    };

    // Book A consumes 1.00 over four iterations, leaving no headroom for
    // Book B's first request.
    let analyst = Arc::new(MockAnalyst::new());
    analyst
        .script_book(
            "Book A",
            vec![
                ScriptedResponse::items(0.25, &[("Add circuit breakers", "critical")]),
                ScriptedResponse::empty(0.25),
                ScriptedResponse::empty(0.25),
                ScriptedResponse::empty(0.25),
            ],
        )
        .await;

    let report = orchestrator(config.clone(), Arc::clone(&analyst))
        .run(false)
        .await
        .unwrap();
    assert!(matches!(
        report.outcome,
        RunOutcome::BudgetExhausted { ref book, .. } if book == "Book B"
    ));
    assert_eq!(report.books.len(), 1);

    // The checkpoint names Book A as the last completed book.
    let store = CheckpointStore::new(&config.state_dir);
    let doc = store.load().unwrap().unwrap();
    assert_eq!(doc.book_index, Some(0));
    assert_eq!(doc.book.as_deref(), Some("Book A"));
    assert!((doc.spent - 1.0).abs() < 1e-9);

    // Resume under a raised ceiling: only Book B runs.
    config.budget.hard_cost_ceiling = 5.0;
    let analyst = Arc::new(MockAnalyst::new());
    analyst
        .script_book(
            "Book B",
            vec![ScriptedResponse::items(
                0.25,
                &[("Add circuit breaker pattern", "nice-to-have")],
            )],
        )
        .await;

    let report = orchestrator(config.clone(), analyst).run(true).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.books.len(), 1);
    assert_eq!(report.books[0].book, "Book B");
    // Restored spend plus Book B's single billed iteration.
    assert!((report.total_spent - 1.25).abs() < 1e-9);
    // Book B's phrasing merged into Book A's entry.
    assert_eq!(report.ledger_entries, 1);
}

#[tokio::test]
async fn test_exhaustion_during_first_book_is_resumable() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), &["Book A", "Book B"]);
    config.budget = BudgetConfig {
        hard_cost_ceiling: 0.30,
        estimated_cost_per_request: 0.25,
        ..BudgetConfig::default()
    };

    // Book A's first iteration leaves too little headroom for a second.
    let analyst = Arc::new(MockAnalyst::new());
    analyst
        .script_book(
            "Book A",
            vec![ScriptedResponse::items(
                0.20,
                &[("Add circuit breakers", "critical")],
            )],
        )
        .await;

    let report = orchestrator(config.clone(), analyst).run(false).await.unwrap();
    assert!(matches!(
        report.outcome,
        RunOutcome::BudgetExhausted { ref book, .. } if book == "Book A"
    ));

    // Even with no completed book, the run left a checkpoint and the ledger.
    let store = CheckpointStore::new(&config.state_dir);
    let doc = store.load().unwrap().unwrap();
    assert_eq!(doc.book_index, None);
    assert!((doc.spent - 0.20).abs() < 1e-9);
    assert_eq!(report.ledger_entries, 1);

    // Resume under a raised ceiling restarts Book A from iteration 0; its
    // re-reported item merges idempotently into the restored ledger.
    config.budget.hard_cost_ceiling = 5.0;
    let analyst = Arc::new(MockAnalyst::new());
    analyst
        .script_book(
            "Book A",
            vec![ScriptedResponse::items(
                0.10,
                &[("Add circuit breakers", "critical")],
            )],
        )
        .await;
    analyst
        .script_book(
            "Book B",
            vec![ScriptedResponse::items(
                0.10,
                &[("Use idempotency keys", "nice-to-have")],
            )],
        )
        .await;

    let report = orchestrator(config, analyst).run(true).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.books.len(), 2);
    assert_eq!(report.books[0].book, "Book A");
    assert!((report.total_spent - 0.40).abs() < 1e-9);
    assert_eq!(report.ledger_entries, 2);
}

#[tokio::test]
async fn test_errored_book_does_not_abort_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &["Book A", "Book B"]);

    let analyst = Arc::new(MockAnalyst::new());
    let failure = || {
        ScriptedResponse::Fail(lectern::domain::ports::AnalystError::Server(
            "500".to_string(),
        ))
    };
    // Enough failures to outlast the single configured retry.
    analyst.script_book("Book A", vec![failure(), failure()]).await;
    analyst
        .script_book(
            "Book B",
            vec![ScriptedResponse::items(
                0.10,
                &[("Use idempotency keys", "nice-to-have")],
            )],
        )
        .await;

    let report = orchestrator(config, analyst).run(false).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.books[0].outcome, BookOutcome::Errored);
    assert_eq!(report.books[1].outcome, BookOutcome::Converged);
    assert_eq!(report.ledger_entries, 1);
}

#[tokio::test]
async fn test_suppression_uses_scanned_codebase() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &["Book A"]);
    fs::write(
        config.codebase_roots[0].join("versioning.rs"),
        "pub struct ModelVersioning;\n",
    )
    .unwrap();

    let analyst = Arc::new(MockAnalyst::new());
    analyst
        .script_book(
            "Book A",
            vec![ScriptedResponse::items(
                0.10,
                &[
                    ("Implement model versioning", "critical"),
                    ("Add circuit breakers", "important"),
                ],
            )],
        )
        .await;

    let report = orchestrator(config, analyst).run(false).await.unwrap();

    assert_eq!(report.books[0].suppressed, 1);
    assert_eq!(report.ledger_entries, 1, "only the uncovered item lands");
}

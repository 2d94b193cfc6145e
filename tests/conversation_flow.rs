//! End-to-end conversation scenarios against an in-memory database.

use std::sync::Arc;

use secrecy::SecretString;
use sha2::{Digest, Sha256};

use weekpass::destinations::DestinationStore;
use weekpass::directory::StudentDirectory;
use weekpass::engine::{ConversationEngine, Step};
use weekpass::export::WeeklyExporter;
use weekpass::gate::AccessGate;
use weekpass::store::{LibSqlBackend, Student, StudentStore};

const PASSPHRASE: &str = "open-sesame";

struct Harness {
    engine: ConversationEngine,
    store: Arc<dyn StudentStore>,
    _export_dir: tempfile::TempDir,
}

async fn harness(students: &[(&str, &str, Option<i64>)]) -> Harness {
    let backend = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    for (family_name, given_name, matricule) in students {
        backend
            .insert_student(&Student {
                family_name: family_name.to_string(),
                given_name: given_name.to_string(),
                region: None,
                group_tag: None,
                matricule: *matricule,
            })
            .await
            .unwrap();
    }

    let store: Arc<dyn StudentStore> = backend;
    let secret_hash = hex::encode(Sha256::digest(PASSPHRASE.as_bytes()));
    let export_dir = tempfile::tempdir().unwrap();

    let engine = ConversationEngine::new(
        StudentDirectory::new(Arc::clone(&store)),
        DestinationStore::new(Arc::clone(&store)),
        AccessGate::new(SecretString::from(secret_hash)),
        WeeklyExporter::new(Arc::clone(&store), export_dir.path()),
    );

    Harness {
        engine,
        store,
        _export_dir: export_dir,
    }
}

async fn current_destination(store: &Arc<dyn StudentStore>, matricule: i64) -> Option<String> {
    DestinationStore::new(Arc::clone(store))
        .current_for(matricule)
        .await
        .unwrap()
}

#[tokio::test]
async fn happy_path_exact_match() {
    let h = harness(&[("Benali", "Amine", Some(1001))]).await;

    let replies = h.engine.handle("u1", "/48h").await;
    assert!(replies[0].content.contains("family name"));
    assert_eq!(h.engine.current_step("u1").await, Some(Step::WaitingName));

    let replies = h.engine.handle("u1", "Benali").await;
    assert!(replies[0].content.starts_with("Found: Benali Amine"));
    assert_eq!(
        h.engine.current_step("u1").await,
        Some(Step::WaitingDestination)
    );

    let replies = h.engine.handle("u1", "Paris").await;
    assert!(replies[0].content.contains("saved"));
    assert!(replies[0].content.contains("Paris"));
    assert_eq!(h.engine.current_step("u1").await, Some(Step::Idle));

    assert_eq!(
        current_destination(&h.store, 1001).await.as_deref(),
        Some("Paris")
    );
}

#[tokio::test]
async fn existing_choice_can_be_deleted() {
    let h = harness(&[("Benali", "Amine", Some(1001))]).await;

    h.engine.handle("u1", "/48h").await;
    h.engine.handle("u1", "Benali").await;
    h.engine.handle("u1", "Oran").await;

    // Second pass finds the existing record
    h.engine.handle("u1", "/48h").await;
    let replies = h.engine.handle("u1", "Benali").await;
    assert!(replies[0].content.contains("already have"));
    assert!(replies[0].content.contains("Oran"));
    assert_eq!(
        h.engine.current_step("u1").await,
        Some(Step::HasExistingChoice)
    );

    let replies = h.engine.handle("u1", "delete").await;
    assert!(replies[0].content.contains("deleted"));
    assert_eq!(h.engine.current_step("u1").await, Some(Step::Idle));
    assert_eq!(current_destination(&h.store, 1001).await, None);
}

#[tokio::test]
async fn existing_choice_update_leaves_one_record() {
    let h = harness(&[("Benali", "Amine", Some(1001))]).await;

    h.engine.handle("u1", "/48h").await;
    h.engine.handle("u1", "Benali").await;
    h.engine.handle("u1", "Oran").await;

    h.engine.handle("u1", "/48h").await;
    h.engine.handle("u1", "Benali").await;
    let replies = h.engine.handle("u1", "Alger").await;
    assert!(replies[0].content.contains("updated"));
    assert!(replies[0].content.contains("Alger"));

    assert_eq!(
        current_destination(&h.store, 1001).await.as_deref(),
        Some("Alger")
    );

    // Exactly one record remains for this week
    let (start, end) = weekpass::destinations::week_bounds(chrono::Utc::now());
    let records = h
        .store
        .destinations_in_range(1001, start, end)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn too_long_destination_is_rejected_without_state_change() {
    let h = harness(&[("Benali", "Amine", Some(1001))]).await;

    h.engine.handle("u1", "/48h").await;
    h.engine.handle("u1", "Benali").await;

    let replies = h.engine.handle("u1", &"x".repeat(21)).await;
    assert!(replies[0].content.contains("20 characters"));
    assert_eq!(
        h.engine.current_step("u1").await,
        Some(Step::WaitingDestination)
    );

    // Retry succeeds
    let replies = h.engine.handle("u1", "Tizi Ouzou").await;
    assert!(replies[0].content.contains("saved"));
}

#[tokio::test]
async fn too_long_update_keeps_existing_record() {
    let h = harness(&[("Benali", "Amine", Some(1001))]).await;

    h.engine.handle("u1", "/48h").await;
    h.engine.handle("u1", "Benali").await;
    h.engine.handle("u1", "Oran").await;

    h.engine.handle("u1", "/48h").await;
    h.engine.handle("u1", "Benali").await;
    let replies = h.engine.handle("u1", &"x".repeat(21)).await;
    assert!(replies[0].content.contains("20 characters"));
    assert_eq!(
        h.engine.current_step("u1").await,
        Some(Step::HasExistingChoice)
    );

    // The original record was not lost
    assert_eq!(
        current_destination(&h.store, 1001).await.as_deref(),
        Some("Oran")
    );
}

#[tokio::test]
async fn approximate_match_offers_numbered_selection() {
    let h = harness(&[
        ("Benali", "Amine", Some(1001)),
        ("Benaly", "Sara", Some(1002)),
        ("Bennali", "Karim", Some(1003)),
    ])
    .await;

    h.engine.handle("u1", "/48h").await;
    let replies = h.engine.handle("u1", "Benalli").await;
    assert!(replies[0].content.contains("multiple matches"));
    assert!(replies[0].content.contains("1."));
    assert_eq!(
        h.engine.current_step("u1").await,
        Some(Step::SelectingStudent)
    );

    // Out-of-range and non-numeric inputs do not advance
    let replies = h.engine.handle("u1", "7").await;
    assert!(replies[0].content.contains("Invalid selection"));
    let replies = h.engine.handle("u1", "first one").await;
    assert!(replies[0].content.contains("Invalid selection"));
    assert_eq!(
        h.engine.current_step("u1").await,
        Some(Step::SelectingStudent)
    );

    // A valid number proceeds
    let replies = h.engine.handle("u1", "1").await;
    assert!(replies[0].content.starts_with("Selected: "));
    assert_eq!(
        h.engine.current_step("u1").await,
        Some(Step::WaitingDestination)
    );
}

#[tokio::test]
async fn unknown_name_allows_retry() {
    let h = harness(&[]).await;

    h.engine.handle("u1", "/48h").await;
    let replies = h.engine.handle("u1", "Nobody").await;
    assert!(replies[0].content.contains("No student found"));
    assert_eq!(h.engine.current_step("u1").await, Some(Step::WaitingName));
}

#[tokio::test]
async fn list_requires_correct_code_and_exports() {
    let h = harness(&[("Benali", "Amine", Some(1001))]).await;

    h.engine.handle("u1", "/48h").await;
    h.engine.handle("u1", "Benali").await;
    h.engine.handle("u1", "Oran").await;

    h.engine.handle("admin", "/list").await;
    assert_eq!(h.engine.current_step("admin").await, Some(Step::WaitingCode));

    // Wrong code keeps waiting
    let replies = h.engine.handle("admin", "guess").await;
    assert!(replies[0].content.contains("Invalid code"));
    assert_eq!(h.engine.current_step("admin").await, Some(Step::WaitingCode));

    // Correct passphrase exports and resets
    let replies = h.engine.handle("admin", PASSPHRASE).await;
    assert_eq!(h.engine.current_step("admin").await, Some(Step::Idle));
    let attachment = replies[0].attachment.as_ref().expect("export attachment");
    let content = std::fs::read_to_string(attachment).unwrap();
    assert!(content.contains("Benali,Amine,Oran"));
}

#[tokio::test]
async fn missing_matricule_resets_with_error() {
    let h = harness(&[("Cherif", "Sara", None)]).await;

    h.engine.handle("u1", "/48h").await;
    let replies = h.engine.handle("u1", "Cherif").await;
    assert!(replies[0].content.contains("error occurred"));
    assert!(replies[1].content.contains("Cherif"));
    assert_eq!(h.engine.current_step("u1").await, Some(Step::Idle));
}

#[tokio::test]
async fn commands_interrupt_any_step() {
    let h = harness(&[("Benali", "Amine", Some(1001))]).await;

    h.engine.handle("u1", "/48h").await;
    h.engine.handle("u1", "Benali").await;
    assert_eq!(
        h.engine.current_step("u1").await,
        Some(Step::WaitingDestination)
    );

    // /start mid-flow resets the session
    let replies = h.engine.handle("u1", "/start").await;
    assert!(replies[0].content.contains("Welcome"));
    assert_eq!(h.engine.current_step("u1").await, Some(Step::Idle));

    // /list mid-flow also interrupts
    h.engine.handle("u1", "/48h").await;
    h.engine.handle("u1", "/list").await;
    assert_eq!(h.engine.current_step("u1").await, Some(Step::WaitingCode));
}

#[tokio::test]
async fn free_text_while_idle_gets_usage_hint() {
    let h = harness(&[]).await;

    let replies = h.engine.handle("u1", "hello").await;
    assert!(replies[0].content.contains("/48h"));
    assert_eq!(h.engine.current_step("u1").await, Some(Step::Idle));
}

#[tokio::test]
async fn sessions_are_independent_per_user() {
    let h = harness(&[("Benali", "Amine", Some(1001))]).await;

    h.engine.handle("u1", "/48h").await;
    assert_eq!(h.engine.current_step("u1").await, Some(Step::WaitingName));
    assert_eq!(h.engine.current_step("u2").await, None);

    h.engine.handle("u2", "/list").await;
    assert_eq!(h.engine.current_step("u2").await, Some(Step::WaitingCode));
    assert_eq!(h.engine.current_step("u1").await, Some(Step::WaitingName));
}

//! The revision log is append-only for every caller, admins included.

mod fixtures;

use design_approval::checklist::ValidationRole;
use design_approval::design::{StoreError, WorkflowError};
use design_approval::revision_log::{NewRevisionEntry, RevisionKind, RevisionLog};
use design_approval::store::MemoryStore;

use fixtures::*;

#[tokio::test]
async fn test_admin_cannot_amend_or_remove_entries() {
    let studio = studio().await;
    let design = studio.workflow.create_design(DESIGNER, label_design(), vec![]).await.unwrap();
    let entry = studio.workflow.history(design.id).await.unwrap().remove(0);

    let err = studio
        .workflow
        .amend_revision(ADMIN, entry.id, "rewritten".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::ImmutableRevisionLog { entry_id } if entry_id == entry.id));

    let err = studio.workflow.remove_revision(ADMIN, entry.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::ImmutableRevisionLog { .. }));

    let history = studio.workflow.history(design.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0], entry);
}

#[tokio::test]
async fn test_entries_are_newest_first_with_actor_and_kind() {
    let studio = studio().await;
    let design = studio.workflow.create_design(DESIGNER, label_design(), vec![]).await.unwrap();
    let item = design.checklist[0].id;
    studio
        .workflow
        .set_validation(DESIGNER, design.id, item, ValidationRole::Designer, true)
        .await
        .unwrap();
    studio
        .workflow
        .set_validation(DESIGNER, design.id, item, ValidationRole::Designer, false)
        .await
        .unwrap();

    let history = studio.workflow.history(design.id).await.unwrap();
    let kinds: Vec<_> = history.iter().map(|entry| entry.kind).collect();
    assert_eq!(
        kinds,
        vec![
            RevisionKind::DesignerValidation,
            RevisionKind::DesignerValidation,
            RevisionKind::Created,
        ]
    );
    assert!(history[0].notes.contains("unvalidated"));
    assert!(history.iter().all(|entry| entry.actor_id == DESIGNER));
    assert!(history.windows(2).all(|pair| pair[0].id > pair[1].id));
}

#[tokio::test]
async fn test_store_level_refusal() {
    let store = MemoryStore::new();
    let entry = store
        .append(NewRevisionEntry::new(7, ADMIN, RevisionKind::Comment, "hello"))
        .await
        .unwrap();

    assert!(matches!(
        store.amend(ADMIN, entry.id, "bye".to_string()).await,
        Err(StoreError::ImmutableRevisionLog { .. })
    ));
    assert!(matches!(
        store.remove(ADMIN, entry.id).await,
        Err(StoreError::ImmutableRevisionLog { .. })
    ));
    assert_eq!(store.entries_for(7).await.unwrap(), vec![entry]);
}

#[cfg(feature = "database")]
mod sqlite {
    use super::*;
    use design_approval::database::SqliteStore;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_database_triggers_block_updates() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore::from_pool(pool);
        store.migrate().await.unwrap();

        let entry = store
            .append(NewRevisionEntry::new(1, ADMIN, RevisionKind::Created, "created"))
            .await
            .unwrap();

        let update = sqlx::query("UPDATE revision_entries SET notes = 'edited' WHERE id = ?")
            .bind(entry.id as i64)
            .execute(store.pool())
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM revision_entries WHERE id = ?")
            .bind(entry.id as i64)
            .execute(store.pool())
            .await;
        assert!(delete.is_err());

        let entries = store.entries_for(1).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, entry.id);
        assert_eq!(entries[0].notes, "created");
    }
}

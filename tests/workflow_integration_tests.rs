//! End-to-end workflow scenarios against the in-memory store.

mod fixtures;

use design_approval::checklist::ValidationRole;
use design_approval::design::{
    DesignStatus, NewTemplate, ReasonCode, Stage, TemplateItem, WorkflowError,
};
use design_approval::notifications::TransitionKind;
use design_approval::revision_log::RevisionKind;
use design_approval::store::{DesignQuery, Directory};

use fixtures::*;

#[tokio::test]
async fn test_design_travels_from_draft_to_client_approval() {
    let studio = studio().await;
    let design = studio
        .workflow
        .create_design(DESIGNER, label_design(), vec![pdf("proof.pdf")])
        .await
        .unwrap();
    assert_eq!(design.status, DesignStatus::Draft);
    let descriptions: Vec<_> = design.checklist.iter().map(|item| item.description.as_str()).collect();
    assert_eq!(descriptions, vec!["Colors match the proof", "Legal text present"]);
    assert!(!design.visible_to_client);

    let design = tick_all(&studio, &design, ValidationRole::Designer).await;
    assert_eq!(design.status, DesignStatus::AwaitingValidation);
    assert!(!design.visible_to_client);

    let design = tick_all(&studio, &design, ValidationRole::Validator).await;
    assert_eq!(design.status, DesignStatus::AwaitingClient);
    assert!(design.visible_to_client);

    let design = studio.workflow.client_approve(BUYER, design.id).await.unwrap();
    assert_eq!(design.status, DesignStatus::Approved);
    assert_eq!(design.stage, Stage::Stage2);
    assert!(design.client_approved);
    assert!(design.client_approved_at.is_some());

    // without a stage 2 template the stage 1 items carry over unvalidated
    let active: Vec<_> = design.active_items().collect();
    assert_eq!(active.len(), 2);
    assert!(active.iter().all(|item| !item.designer_validated && !item.validator_validated));

    assert_eq!(
        studio.outbox.kinds(),
        vec![
            TransitionKind::Created,
            TransitionKind::PendingValidation,
            TransitionKind::Validated,
            TransitionKind::ClientApproved,
        ]
    );

    let history = studio.workflow.history(design.id).await.unwrap();
    assert_eq!(history.first().map(|entry| entry.kind), Some(RevisionKind::ClientApproval));
    assert_eq!(history.last().map(|entry| entry.kind), Some(RevisionKind::Created));
    assert_eq!(
        history.iter().filter(|entry| entry.kind == RevisionKind::StatusChange).count(),
        3
    );
}

#[tokio::test]
async fn test_stage2_template_items_gate_completion() {
    let studio = studio().await;
    studio
        .workflow
        .create_template(
            ADMIN,
            NewTemplate {
                name: "Labels stage 2".to_string(),
                category_id: 1,
                stage: Stage::Stage2,
                items: vec![TemplateItem {
                    description: "Printer proof signed".to_string(),
                    order: 10,
                    default_comment: Some("Attach the scan".to_string()),
                }],
            },
        )
        .await
        .unwrap();

    let design = design_awaiting_client(&studio).await;
    let design = studio.workflow.client_approve(BUYER, design.id).await.unwrap();
    assert_eq!(design.checklist.len(), 3);
    let active: Vec<_> = design.active_items().collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].description, "Printer proof signed");
    assert_eq!(active[0].comment, "Attach the scan");

    let design = tick_all(&studio, &design, ValidationRole::Designer).await;
    assert_eq!(design.stage, Stage::Stage2);
    let design = tick_all(&studio, &design, ValidationRole::Validator).await;
    assert_eq!(design.stage, Stage::Complete);
    assert_eq!(design.status, DesignStatus::Approved);
}

#[tokio::test]
async fn test_change_requests_are_capped() {
    let studio = studio().await;
    let mut design = design_awaiting_client(&studio).await;

    for round in 1..=3u8 {
        design = studio
            .workflow
            .client_request_changes(BUYER, design.id, &format!("Round {round}: bigger logo"))
            .await
            .unwrap();
        assert_eq!(design.status, DesignStatus::ChangesRequested);
        assert_eq!(design.modification_count, round);

        design = studio
            .workflow
            .resubmit(DESIGNER, design.id, vec![pdf(&format!("proof-v{}.pdf", round + 1))])
            .await
            .unwrap();
        assert_eq!(design.status, DesignStatus::AwaitingValidation);
        assert!(design.active_items().all(|item| !item.designer_validated));

        design = tick_all(&studio, &design, ValidationRole::Designer).await;
        design = tick_all(&studio, &design, ValidationRole::Validator).await;
        assert_eq!(design.status, DesignStatus::AwaitingClient);
    }

    let err = studio
        .workflow
        .client_request_changes(BUYER, design.id, "One more tweak")
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), Some(ReasonCode::ModificationLimit));

    let stored = studio.workflow.get_design(design.id).await.unwrap();
    assert_eq!(stored.status, DesignStatus::AwaitingClient);
    assert_eq!(stored.modification_count, 3);
    assert_eq!(stored.attachments.len(), 4);
    assert_eq!(stored.last_change_request.as_deref(), Some("Round 3: bigger logo"));
}

#[tokio::test]
async fn test_change_request_requires_comment() {
    let studio = studio().await;
    let design = design_awaiting_client(&studio).await;

    let err = studio
        .workflow
        .client_request_changes(BUYER, design.id, "   ")
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), Some(ReasonCode::MissingComment));
    assert_eq!(studio.workflow.get_design(design.id).await.unwrap().modification_count, 0);
}

#[tokio::test]
async fn test_client_rejection_resets_to_stage1() {
    let studio = studio().await;
    let design = design_awaiting_client(&studio).await;

    let err = studio.workflow.client_reject(BUYER, design.id, "").await.unwrap_err();
    assert_eq!(err.reason_code(), Some(ReasonCode::MissingReason));

    let design = studio
        .workflow
        .client_reject(BUYER, design.id, "Wrong brand colors")
        .await
        .unwrap();
    assert_eq!(design.status, DesignStatus::Rejected);
    assert_eq!(design.stage, Stage::Stage1);
    assert!(design.attachments.is_empty());
    assert!(!design.visible_to_client);
    assert_eq!(design.rejection_reason.as_deref(), Some("Wrong brand colors"));
    assert!(design
        .checklist
        .iter()
        .all(|item| !item.designer_validated && !item.validator_validated));
    assert_eq!(studio.outbox.kinds().last(), Some(&TransitionKind::ClientRejected));

    // flags stay frozen until a new upload arrives
    let item = design.checklist[0].id;
    let err = studio
        .workflow
        .set_validation(DESIGNER, design.id, item, ValidationRole::Designer, true)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidTransition { status: DesignStatus::Rejected, .. }));

    let err = studio.workflow.resubmit(DESIGNER, design.id, vec![]).await.unwrap_err();
    assert_eq!(err.reason_code(), Some(ReasonCode::MissingAttachment));

    let design = studio
        .workflow
        .resubmit(DESIGNER, design.id, vec![pdf("proof-v2.pdf")])
        .await
        .unwrap();
    assert_eq!(design.status, DesignStatus::AwaitingValidation);
    assert!(design.rejection_reason.is_none());
}

#[tokio::test]
async fn test_design_without_attachment_never_reaches_client() {
    let studio = studio().await;
    let design = studio.workflow.create_design(DESIGNER, label_design(), vec![]).await.unwrap();
    let design = tick_all(&studio, &design, ValidationRole::Designer).await;
    let design = tick_all(&studio, &design, ValidationRole::Validator).await;

    assert_eq!(design.status, DesignStatus::Draft);
    assert!(!design.visible_to_client);
    let buyer = studio.workflow.store().get_user(BUYER).await.unwrap().unwrap();
    assert!(studio.workflow.portal_design(&buyer, design.id).await.unwrap().is_none());
    assert_eq!(studio.outbox.kinds(), vec![TransitionKind::Created]);

    studio.workflow.add_attachment(DESIGNER, design.id, pdf("proof.pdf")).await.unwrap();
    let design = studio.workflow.get_design(design.id).await.unwrap();
    assert_eq!(design.status, DesignStatus::AwaitingClient);
    assert!(design.visible_to_client);
    assert_eq!(design.attachments.len(), 1);
}

#[tokio::test]
async fn test_validator_rejection_while_awaiting_validation() {
    let studio = studio().await;
    let design = studio
        .workflow
        .create_design(DESIGNER, label_design(), vec![pdf("proof.pdf")])
        .await
        .unwrap();
    let design = tick_all(&studio, &design, ValidationRole::Designer).await;

    let err = studio.workflow.validator_reject(DESIGNER, design.id, "Blurry").await.unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied { .. }));

    let design = studio.workflow.validator_reject(VALIDATOR, design.id, "Blurry").await.unwrap();
    assert_eq!(design.status, DesignStatus::Rejected);

    let history = studio.workflow.history(design.id).await.unwrap();
    let rejection = history.iter().find(|entry| entry.kind == RevisionKind::Rejection).unwrap();
    assert_eq!(rejection.actor_id, VALIDATOR);
    assert!(rejection.notes.contains("Blurry"));
}

#[tokio::test]
async fn test_clients_only_act_on_their_visible_designs() {
    let studio = studio().await;
    let hidden = studio
        .workflow
        .create_design(DESIGNER, label_design(), vec![pdf("draft.pdf")])
        .await
        .unwrap();
    let err = studio.workflow.client_approve(BUYER, hidden.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotOwner { .. }));

    let design = design_awaiting_client(&studio).await;
    let err = studio.workflow.client_approve(STRANGER, design.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotOwner { .. }));

    let err = studio.workflow.client_approve(DESIGNER, design.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied { .. }));

    let buyer = studio.workflow.store().get_user(BUYER).await.unwrap().unwrap();
    let (designs, total) = studio
        .workflow
        .portal_designs(&buyer, DesignQuery::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(designs[0].id, design.id);

    let stranger = studio.workflow.store().get_user(STRANGER).await.unwrap().unwrap();
    let (designs, total) = studio
        .workflow
        .portal_designs(&stranger, DesignQuery::default())
        .await
        .unwrap();
    assert!(designs.is_empty());
    assert_eq!(total, 0);
    assert!(studio.workflow.portal_design(&stranger, design.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_thread_comments_from_staff_and_owning_client() {
    let studio = studio().await;
    let design = design_awaiting_client(&studio).await;

    studio.workflow.post_comment(VALIDATOR, design.id, "Ready for you").await.unwrap();
    let design = studio.workflow.post_comment(BUYER, design.id, "Thanks!").await.unwrap();
    assert_eq!(design.messages.len(), 2);
    assert_eq!(design.messages[1].author_id, BUYER);

    let err = studio.workflow.post_comment(STRANGER, design.id, "Hi").await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotOwner { .. }));

    let err = studio.workflow.post_comment(BUYER, design.id, " ").await.unwrap_err();
    assert_eq!(err.reason_code(), Some(ReasonCode::MissingComment));
}

#[tokio::test]
async fn test_bulk_delete_is_admin_only() {
    let studio = studio().await;
    let first = studio.workflow.create_design(DESIGNER, label_design(), vec![]).await.unwrap();
    let second = studio.workflow.create_design(DESIGNER, label_design(), vec![]).await.unwrap();

    let err = studio.workflow.delete_designs(DESIGNER, &[first.id]).await.unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied { .. }));

    let err = studio.workflow.delete_designs(ADMIN, &[]).await.unwrap_err();
    assert_eq!(err.reason_code(), Some(ReasonCode::NothingToDelete));

    let removed = studio
        .workflow
        .delete_designs(ADMIN, &[first.id, second.id, 9_999])
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert!(matches!(
        studio.workflow.get_design(first.id).await,
        Err(WorkflowError::DesignNotFound(_))
    ));

    let history = studio.workflow.history(first.id).await.unwrap();
    assert_eq!(history.first().map(|entry| entry.kind), Some(RevisionKind::Deletion));
}

#[tokio::test]
async fn test_repeated_flag_write_is_not_logged_twice() {
    let studio = studio().await;
    let design = studio.workflow.create_design(DESIGNER, label_design(), vec![]).await.unwrap();
    let item = design.checklist[0].id;

    for _ in 0..2 {
        studio
            .workflow
            .set_validation(DESIGNER, design.id, item, ValidationRole::Designer, true)
            .await
            .unwrap();
    }

    let history = studio.workflow.history(design.id).await.unwrap();
    let ticks = history
        .iter()
        .filter(|entry| entry.kind == RevisionKind::DesignerValidation)
        .count();
    assert_eq!(ticks, 1);
}

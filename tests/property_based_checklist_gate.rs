//! Property-based tests for the checklist completion gate and template instantiation

use chrono::Utc;
use proptest::prelude::*;

use design_approval::checklist::{instantiate, GateReport};
use design_approval::design::{
    Attachment, ChecklistItem, ChecklistTemplate, Design, DesignStatus, NewDesign, Stage,
    TemplateItem,
};
use design_approval::workflows::{drive, LifecycleContext, LifecycleEvent};

fn stage_strategy() -> impl Strategy<Value = Stage> {
    prop_oneof![Just(Stage::Stage1), Just(Stage::Stage2)]
}

fn design_with(items: &[(Stage, bool, bool)], current: Stage) -> Design {
    let input = NewDesign {
        name: "Prop".to_string(),
        client_id: 1,
        category_id: 1,
        task_ref: None,
    };
    let mut design = Design::draft(1, input, 1, Utc::now());
    design.stage = current;
    design.checklist = items
        .iter()
        .enumerate()
        .map(|(index, (stage, designer, validator))| {
            let mut item = ChecklistItem::new(index as u64 + 1, format!("item {index}"), *stage, 0, String::new());
            item.designer_validated = *designer;
            item.validator_validated = *validator;
            item
        })
        .collect();
    design
}

fn proof() -> Attachment {
    Attachment {
        id: 1,
        name: "proof.pdf".to_string(),
        content: b"%PDF-1.7".to_vec(),
        mimetype: "application/pdf".to_string(),
        size: 8,
        sequence: 1,
        access_token: "token".to_string(),
    }
}

proptest! {
    #[test]
    fn draft_status_follows_checklist_flags(
        flags in prop::collection::vec((any::<bool>(), any::<bool>()), 0..8),
        uploaded in any::<bool>(),
    ) {
        let items: Vec<_> = flags.iter().map(|(d, v)| (Stage::Stage1, *d, *v)).collect();
        let mut design = design_with(&items, Stage::Stage1);
        if uploaded {
            design.attachments.push(proof());
        }
        let mut ctx = LifecycleContext::new(design, 1, Utc::now());

        prop_assert!(drive(&mut ctx, &LifecycleEvent::ChecklistChanged).is_ok());

        let designer_complete = !flags.is_empty() && flags.iter().all(|(d, _)| *d);
        let fully_validated = designer_complete && flags.iter().all(|(_, v)| *v);
        let expected = if !uploaded {
            DesignStatus::Draft
        } else if fully_validated {
            DesignStatus::AwaitingClient
        } else if designer_complete {
            DesignStatus::AwaitingValidation
        } else {
            DesignStatus::Draft
        };
        prop_assert_eq!(ctx.design.status, expected);
        prop_assert_eq!(ctx.design.visible_to_client, expected == DesignStatus::AwaitingClient);
    }

    #[test]
    fn gate_only_counts_active_stage(
        items in prop::collection::vec((stage_strategy(), any::<bool>(), any::<bool>()), 0..12),
        current in stage_strategy(),
    ) {
        let design = design_with(&items, current);
        let report = GateReport::evaluate(&design);
        let active: Vec<_> = items.iter().filter(|(stage, _, _)| *stage == current).collect();

        prop_assert_eq!(report.item_count, active.len());
        let expected_full = !active.is_empty() && active.iter().all(|(_, d, v)| *d && *v);
        let expected_designer = !active.is_empty() && active.iter().all(|(_, d, _)| *d);
        prop_assert_eq!(report.fully_validated(), expected_full);
        prop_assert_eq!(report.designer_complete(), expected_designer);
    }

    #[test]
    fn full_validation_implies_designer_completion(
        items in prop::collection::vec((stage_strategy(), any::<bool>(), any::<bool>()), 0..12),
    ) {
        let report = GateReport::evaluate(&design_with(&items, Stage::Stage1));
        if report.fully_validated() {
            prop_assert!(report.designer_complete());
        }
    }

    #[test]
    fn instantiated_items_are_ordered_with_consecutive_ids(
        orders in prop::collection::vec(0u32..50, 0..15),
        first_id in 1u64..1_000,
    ) {
        let template = ChecklistTemplate {
            id: 1,
            name: "Generated".to_string(),
            category_id: 1,
            stage: Stage::Stage2,
            items: orders
                .iter()
                .map(|order| TemplateItem { description: format!("order {order}"), order: *order, default_comment: None })
                .collect(),
        };

        let items = instantiate(&template, first_id);
        prop_assert_eq!(items.len(), orders.len());
        for (offset, pair) in items.windows(2).enumerate() {
            prop_assert!(pair[0].order <= pair[1].order);
            prop_assert_eq!(pair[1].id, first_id + offset as u64 + 1);
        }
        prop_assert!(items.iter().all(|item| item.stage == Stage::Stage2 && !item.designer_validated));
    }
}

#[test]
fn empty_checklist_never_passes() {
    let report = GateReport::evaluate(&design_with(&[], Stage::Stage1));
    assert!(!report.designer_complete());
    assert!(!report.fully_validated());
}

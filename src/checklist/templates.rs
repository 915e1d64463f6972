// Instantiating checklist items from per-category templates

use crate::design::{ChecklistItem, ChecklistTemplate, ItemId, Stage};

/// Build checklist items from a template in ascending `order`.
///
/// Ties keep their position in the template. Ids are allocated
/// consecutively starting at `first_id`.
pub fn instantiate(template: &ChecklistTemplate, first_id: ItemId) -> Vec<ChecklistItem> {
    let mut ordered: Vec<_> = template.items.iter().collect();
    ordered.sort_by_key(|item| item.order);

    ordered
        .into_iter()
        .enumerate()
        .map(|(offset, item)| {
            ChecklistItem::new(
                first_id + offset as ItemId,
                item.description.clone(),
                template.stage,
                item.order,
                item.default_comment.clone().unwrap_or_default(),
            )
        })
        .collect()
}

/// Move items into `stage` with fresh validations
pub fn carry_into_stage(items: &mut [ChecklistItem], stage: Stage) {
    for item in items.iter_mut() {
        item.stage = stage;
        item.reset_validations();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::TemplateItem;

    fn template() -> ChecklistTemplate {
        ChecklistTemplate {
            id: 4,
            name: "Labels stage 1".to_string(),
            category_id: 2,
            stage: Stage::Stage1,
            items: vec![
                TemplateItem { description: "Bleed".to_string(), order: 20, default_comment: None },
                TemplateItem {
                    description: "Logo".to_string(),
                    order: 10,
                    default_comment: Some("Use vector logo".to_string()),
                },
                TemplateItem { description: "Barcode".to_string(), order: 20, default_comment: None },
            ],
        }
    }

    #[test]
    fn test_instantiate_follows_template_order() {
        let items = instantiate(&template(), 7);
        let names: Vec<_> = items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(names, vec!["Logo", "Bleed", "Barcode"]);
        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![7, 8, 9]);
        assert_eq!(items[0].comment, "Use vector logo");
        assert!(items.iter().all(|i| i.stage == Stage::Stage1 && !i.designer_validated));
    }

    #[test]
    fn test_carry_into_stage_resets_validations() {
        let mut items = instantiate(&template(), 1);
        items[0].designer_validated = true;
        items[0].validator_validated = true;
        items[0].validator_user = Some(3);

        carry_into_stage(&mut items, Stage::Stage2);
        assert!(items.iter().all(|i| i.stage == Stage::Stage2));
        assert!(!items[0].designer_validated);
        assert_eq!(items[0].validator_user, None);
    }
}

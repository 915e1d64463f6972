// Completion gate over the active checklist items of a design

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::design::{Capability, ChecklistItem, Design, UserId};

/// Which of the two independent approvals a write targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRole {
    Designer,
    Validator,
}

impl ValidationRole {
    pub fn required_capability(&self) -> Capability {
        match self {
            ValidationRole::Designer => Capability::Designer,
            ValidationRole::Validator => Capability::Validator,
        }
    }
}

/// Outcome of writing one approval flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagWrite {
    Unchanged,
    Set,
    Cleared,
}

/// Snapshot of the active items of a design
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateReport {
    pub item_count: usize,
    pub designer_done: usize,
    pub validator_done: usize,
}

impl GateReport {
    pub fn evaluate(design: &Design) -> Self {
        design.active_items().fold(GateReport::default(), |mut report, item| {
            report.item_count += 1;
            if item.designer_validated {
                report.designer_done += 1;
            }
            if item.designer_validated && item.validator_validated {
                report.validator_done += 1;
            }
            report
        })
    }

    /// Every active item carries designer approval; empty checklists never pass
    pub fn designer_complete(&self) -> bool {
        self.item_count > 0 && self.designer_done == self.item_count
    }

    /// Every active item carries both approvals
    pub fn fully_validated(&self) -> bool {
        self.item_count > 0 && self.validator_done == self.item_count
    }
}

/// Write one approval flag; writing the value already present is a no-op
pub fn write_flag(
    item: &mut ChecklistItem,
    role: ValidationRole,
    value: bool,
    user_id: UserId,
    now: DateTime<Utc>,
) -> FlagWrite {
    let (flag, user, at) = match role {
        ValidationRole::Designer => (
            &mut item.designer_validated,
            &mut item.designer_user,
            &mut item.designer_validated_at,
        ),
        ValidationRole::Validator => (
            &mut item.validator_validated,
            &mut item.validator_user,
            &mut item.validator_validated_at,
        ),
    };

    if *flag == value {
        return FlagWrite::Unchanged;
    }

    *flag = value;
    if value {
        *user = Some(user_id);
        *at = Some(now);
        FlagWrite::Set
    } else {
        *user = None;
        *at = None;
        FlagWrite::Cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::Stage;

    fn item(id: u64, stage: Stage) -> ChecklistItem {
        ChecklistItem::new(id, format!("item {id}"), stage, id as u32, String::new())
    }

    #[test]
    fn test_write_flag_is_idempotent() {
        let mut it = item(1, Stage::Stage1);
        let now = Utc::now();

        assert_eq!(write_flag(&mut it, ValidationRole::Designer, true, 7, now), FlagWrite::Set);
        assert_eq!(it.designer_user, Some(7));
        assert_eq!(write_flag(&mut it, ValidationRole::Designer, true, 8, now), FlagWrite::Unchanged);
        assert_eq!(it.designer_user, Some(7));

        assert_eq!(write_flag(&mut it, ValidationRole::Designer, false, 8, now), FlagWrite::Cleared);
        assert_eq!(it.designer_user, None);
        assert!(it.designer_validated_at.is_none());
        assert_eq!(write_flag(&mut it, ValidationRole::Validator, false, 8, now), FlagWrite::Unchanged);
    }

    fn design_with(items: Vec<ChecklistItem>) -> Design {
        let input = crate::design::NewDesign {
            name: "Label".to_string(),
            client_id: 1,
            category_id: 1,
            task_ref: None,
        };
        let mut design = Design::draft(1, input, 1, Utc::now());
        design.checklist = items;
        design
    }

    #[test]
    fn test_validator_approval_without_designer_does_not_count() {
        let mut it = item(1, Stage::Stage1);
        write_flag(&mut it, ValidationRole::Validator, true, 3, Utc::now());
        let design = design_with(vec![it]);

        let report = GateReport::evaluate(&design);
        assert!(!report.designer_complete());
        assert!(!report.fully_validated());
    }

    #[test]
    fn test_only_active_stage_items_are_counted() {
        let now = Utc::now();
        let mut done = item(1, Stage::Stage1);
        write_flag(&mut done, ValidationRole::Designer, true, 3, now);
        write_flag(&mut done, ValidationRole::Validator, true, 4, now);
        let pending_stage2 = item(2, Stage::Stage2);
        let design = design_with(vec![done, pending_stage2]);

        let report = GateReport::evaluate(&design);
        assert_eq!(report.item_count, 1);
        assert!(report.designer_complete());
        assert!(report.fully_validated());
    }

    #[test]
    fn test_empty_report_never_passes() {
        let report = GateReport::default();
        assert!(!report.designer_complete());
        assert!(!report.fully_validated());
    }
}

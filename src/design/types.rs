// Core records of the design approval workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub type DesignId = u64;
pub type ItemId = u64;
pub type AttachmentId = u64;
pub type UserId = u64;
pub type PartnerId = u64;
pub type CategoryId = u64;
pub type TemplateId = u64;
pub type EntryId = u64;

/// Workflow status of a design
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignStatus {
    Draft,
    AwaitingValidation,
    AwaitingClient,
    Approved,
    Rejected,
    ChangesRequested,
}

impl DesignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesignStatus::Draft => "draft",
            DesignStatus::AwaitingValidation => "awaiting_validation",
            DesignStatus::AwaitingClient => "awaiting_client",
            DesignStatus::Approved => "approved",
            DesignStatus::Rejected => "rejected",
            DesignStatus::ChangesRequested => "changes_requested",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(DesignStatus::Draft),
            "awaiting_validation" => Some(DesignStatus::AwaitingValidation),
            "awaiting_client" => Some(DesignStatus::AwaitingClient),
            "approved" => Some(DesignStatus::Approved),
            "rejected" => Some(DesignStatus::Rejected),
            "changes_requested" => Some(DesignStatus::ChangesRequested),
            _ => None,
        }
    }

    /// Statuses a validator may reject from
    pub fn is_rejectable(&self) -> bool {
        matches!(
            self,
            DesignStatus::Draft
                | DesignStatus::AwaitingValidation
                | DesignStatus::AwaitingClient
                | DesignStatus::ChangesRequested
        )
    }
}

impl fmt::Display for DesignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase governing which checklist template applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Stage1,
    Stage2,
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Stage1 => "stage1",
            Stage::Stage2 => "stage2",
            Stage::Complete => "complete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "stage1" => Some(Stage::Stage1),
            "stage2" => Some(Stage::Stage2),
            "complete" => Some(Stage::Complete),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities a user may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Designer,
    Validator,
    Admin,
    Portal,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Designer => "designer",
            Capability::Validator => "validator",
            Capability::Admin => "admin",
            Capability::Portal => "portal",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub name: String,
    pub email: Option<String>,
    pub partner_id: PartnerId,
    pub capabilities: BTreeSet<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portal_token: Option<String>,
}

impl User {
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn is_admin(&self) -> bool {
        self.has(Capability::Admin)
    }
}

/// A customer or company; `parent_id` links a contact to its company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    pub name: String,
    pub email: Option<String>,
    pub parent_id: Option<PartnerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: ItemId,
    pub description: String,
    pub stage: Stage,
    pub order: u32,
    pub designer_validated: bool,
    pub designer_user: Option<UserId>,
    pub designer_validated_at: Option<DateTime<Utc>>,
    pub validator_validated: bool,
    pub validator_user: Option<UserId>,
    pub validator_validated_at: Option<DateTime<Utc>>,
    pub comment: String,
}

impl ChecklistItem {
    pub fn new(id: ItemId, description: String, stage: Stage, order: u32, comment: String) -> Self {
        Self {
            id,
            description,
            stage,
            order,
            designer_validated: false,
            designer_user: None,
            designer_validated_at: None,
            validator_validated: false,
            validator_user: None,
            validator_validated_at: None,
            comment,
        }
    }

    pub fn reset_validations(&mut self) {
        self.designer_validated = false;
        self.designer_user = None;
        self.designer_validated_at = None;
        self.validator_validated = false;
        self.validator_user = None;
        self.validator_validated_at = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub name: String,
    #[serde(with = "crate::design::content_base64")]
    pub content: Vec<u8>,
    pub mimetype: String,
    pub size: usize,
    pub sequence: u32,
    pub access_token: String,
}

/// File submitted by a designer, before it is owned by a design
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub author_id: UserId,
    pub body: String,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Design {
    pub id: DesignId,
    pub name: String,
    pub client_id: PartnerId,
    pub task_ref: Option<String>,
    pub category_id: CategoryId,
    pub designer_id: UserId,
    pub status: DesignStatus,
    pub stage: Stage,
    pub attachments: Vec<Attachment>,
    pub checklist: Vec<ChecklistItem>,
    pub modification_count: u8,
    pub visible_to_client: bool,
    pub client_approved: bool,
    pub client_approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub last_change_request: Option<String>,
    pub messages: Vec<ThreadMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Design {
    /// Fresh draft in stage 1 with no checklist or attachments
    pub fn draft(id: DesignId, input: NewDesign, designer_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name,
            client_id: input.client_id,
            task_ref: input.task_ref,
            category_id: input.category_id,
            designer_id,
            status: DesignStatus::Draft,
            stage: Stage::Stage1,
            attachments: Vec::new(),
            checklist: Vec::new(),
            modification_count: 0,
            visible_to_client: false,
            client_approved: false,
            client_approved_at: None,
            rejection_reason: None,
            rejected_at: None,
            last_change_request: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Items the completion gate looks at for the current stage
    pub fn active_items(&self) -> impl Iterator<Item = &ChecklistItem> {
        let stage = self.stage;
        self.checklist.iter().filter(move |item| item.stage == stage)
    }

    pub fn item_mut(&mut self, item_id: ItemId) -> Option<&mut ChecklistItem> {
        self.checklist.iter_mut().find(|item| item.id == item_id)
    }

    pub fn has_stage_items(&self, stage: Stage) -> bool {
        self.checklist.iter().any(|item| item.stage == stage)
    }

    pub fn next_item_id(&self) -> ItemId {
        self.checklist.iter().map(|item| item.id).max().unwrap_or(0) + 1
    }

    pub fn next_attachment_id(&self) -> AttachmentId {
        self.attachments.iter().map(|a| a.id).max().unwrap_or(0) + 1
    }
}

/// Input for creating a design
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDesign {
    pub name: String,
    pub client_id: PartnerId,
    pub category_id: CategoryId,
    #[serde(default)]
    pub task_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateItem {
    pub description: String,
    pub order: u32,
    #[serde(default)]
    pub default_comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistTemplate {
    pub id: TemplateId,
    pub name: String,
    pub category_id: CategoryId,
    pub stage: Stage,
    pub items: Vec<TemplateItem>,
}

/// Input for registering a template; the catalog assigns the id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub category_id: CategoryId,
    pub stage: Stage,
    pub items: Vec<TemplateItem>,
}

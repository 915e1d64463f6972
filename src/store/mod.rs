//! Persistence seams for the workflow.
//!
//! The engine only talks to these traits. [`MemoryStore`] backs tests and
//! single-process deployments; `crate::database::SqliteStore` implements the
//! same traits when the `database` feature is enabled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::design::{
    Capability, CategoryId, ChecklistTemplate, Design, DesignId, NewTemplate, Partner, PartnerId,
    Stage, StoreError, User, UserId,
};

pub mod memory;

pub use crate::revision_log::RevisionLog;
pub use memory::MemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest first
    #[default]
    CreatedDesc,
    /// Alphabetical by name
    NameAsc,
}

/// Filter, ordering and window for listing designs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesignQuery {
    /// Restrict to these clients; `None` means any client
    pub client_ids: Option<Vec<PartnerId>>,
    pub visible_only: bool,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub sort: SortOrder,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl DesignQuery {
    pub fn matches(&self, design: &Design) -> bool {
        if let Some(ids) = &self.client_ids {
            if !ids.contains(&design.client_id) {
                return false;
            }
        }
        if self.visible_only && !design.visible_to_client {
            return false;
        }
        if let Some(from) = self.created_from {
            if design.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.created_to {
            if design.created_at > to {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait DesignStore: Send + Sync {
    /// Persist a new design under a freshly assigned id
    async fn insert_design(&self, design: Design) -> Result<Design, StoreError>;

    async fn get_design(&self, id: DesignId) -> Result<Option<Design>, StoreError>;

    /// Overwrite an existing design
    async fn save_design(&self, design: &Design) -> Result<(), StoreError>;

    /// Returns false when no such design existed
    async fn delete_design(&self, id: DesignId) -> Result<bool, StoreError>;

    async fn list_designs(&self, query: &DesignQuery) -> Result<Vec<Design>, StoreError>;

    /// Number of designs matching the query, ignoring offset and limit
    async fn count_designs(&self, query: &DesignQuery) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait TemplateCatalog: Send + Sync {
    async fn insert_template(&self, template: NewTemplate) -> Result<ChecklistTemplate, StoreError>;

    /// Lowest-id template for the category and stage
    async fn find_template(
        &self,
        category_id: CategoryId,
        stage: Stage,
    ) -> Result<Option<ChecklistTemplate>, StoreError>;

    async fn list_templates(&self) -> Result<Vec<ChecklistTemplate>, StoreError>;
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn upsert_partner(&self, partner: Partner) -> Result<(), StoreError>;

    async fn upsert_user(&self, user: User) -> Result<(), StoreError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn user_by_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    async fn get_partner(&self, id: PartnerId) -> Result<Option<Partner>, StoreError>;

    async fn list_partners(&self) -> Result<Vec<Partner>, StoreError>;

    async fn users_with(&self, capability: Capability) -> Result<Vec<User>, StoreError>;
}

/// Everything the workflow engine persists through
pub trait WorkflowStore: DesignStore + TemplateCatalog + Directory + RevisionLog {}

impl<T> WorkflowStore for T where T: DesignStore + TemplateCatalog + Directory + RevisionLog {}

// In-process store backed by tokio RwLocks

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{DesignQuery, DesignStore, Directory, SortOrder, TemplateCatalog};
use crate::design::{
    Capability, CategoryId, ChecklistTemplate, Design, DesignId, EntryId, NewTemplate, Partner,
    PartnerId, Stage, StoreError, TemplateId, User, UserId,
};
use crate::revision_log::{NewRevisionEntry, RevisionEntry, RevisionLog};

#[derive(Debug, Default)]
struct DesignTable {
    rows: BTreeMap<DesignId, Design>,
    last_id: DesignId,
}

#[derive(Debug, Default)]
struct TemplateTable {
    rows: BTreeMap<TemplateId, ChecklistTemplate>,
    last_id: TemplateId,
}

#[derive(Debug, Default)]
struct DirectoryTable {
    users: BTreeMap<UserId, User>,
    partners: BTreeMap<PartnerId, Partner>,
}

#[derive(Debug, Default)]
struct LogTable {
    entries: Vec<RevisionEntry>,
    last_id: EntryId,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    designs: RwLock<DesignTable>,
    templates: RwLock<TemplateTable>,
    directory: RwLock<DirectoryTable>,
    log: RwLock<LogTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_designs(designs: &mut [Design], sort: SortOrder) {
    match sort {
        SortOrder::CreatedDesc => {
            designs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
        }
        SortOrder::NameAsc => designs.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id))),
    }
}

#[async_trait]
impl DesignStore for MemoryStore {
    async fn insert_design(&self, mut design: Design) -> Result<Design, StoreError> {
        let mut table = self.designs.write().await;
        table.last_id += 1;
        design.id = table.last_id;
        table.rows.insert(design.id, design.clone());
        Ok(design)
    }

    async fn get_design(&self, id: DesignId) -> Result<Option<Design>, StoreError> {
        Ok(self.designs.read().await.rows.get(&id).cloned())
    }

    async fn save_design(&self, design: &Design) -> Result<(), StoreError> {
        let mut table = self.designs.write().await;
        match table.rows.get_mut(&design.id) {
            Some(row) => {
                *row = design.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound { entity: "design", id: design.id }),
        }
    }

    async fn delete_design(&self, id: DesignId) -> Result<bool, StoreError> {
        Ok(self.designs.write().await.rows.remove(&id).is_some())
    }

    async fn list_designs(&self, query: &DesignQuery) -> Result<Vec<Design>, StoreError> {
        let table = self.designs.read().await;
        let mut matching: Vec<Design> = table
            .rows
            .values()
            .filter(|design| query.matches(design))
            .cloned()
            .collect();
        sort_designs(&mut matching, query.sort);

        let window = matching.into_iter().skip(query.offset);
        Ok(match query.limit {
            Some(limit) => window.take(limit).collect(),
            None => window.collect(),
        })
    }

    async fn count_designs(&self, query: &DesignQuery) -> Result<usize, StoreError> {
        let table = self.designs.read().await;
        Ok(table.rows.values().filter(|design| query.matches(design)).count())
    }
}

#[async_trait]
impl TemplateCatalog for MemoryStore {
    async fn insert_template(&self, template: NewTemplate) -> Result<ChecklistTemplate, StoreError> {
        let mut table = self.templates.write().await;
        table.last_id += 1;
        let stored = ChecklistTemplate {
            id: table.last_id,
            name: template.name,
            category_id: template.category_id,
            stage: template.stage,
            items: template.items,
        };
        table.rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_template(
        &self,
        category_id: CategoryId,
        stage: Stage,
    ) -> Result<Option<ChecklistTemplate>, StoreError> {
        let table = self.templates.read().await;
        Ok(table
            .rows
            .values()
            .find(|t| t.category_id == category_id && t.stage == stage)
            .cloned())
    }

    async fn list_templates(&self) -> Result<Vec<ChecklistTemplate>, StoreError> {
        Ok(self.templates.read().await.rows.values().cloned().collect())
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn upsert_partner(&self, partner: Partner) -> Result<(), StoreError> {
        self.directory.write().await.partners.insert(partner.id, partner);
        Ok(())
    }

    async fn upsert_user(&self, user: User) -> Result<(), StoreError> {
        self.directory.write().await.users.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.directory.read().await.users.get(&id).cloned())
    }

    async fn user_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let directory = self.directory.read().await;
        Ok(directory
            .users
            .values()
            .find(|user| user.portal_token.as_deref() == Some(token))
            .cloned())
    }

    async fn get_partner(&self, id: PartnerId) -> Result<Option<Partner>, StoreError> {
        Ok(self.directory.read().await.partners.get(&id).cloned())
    }

    async fn list_partners(&self) -> Result<Vec<Partner>, StoreError> {
        Ok(self.directory.read().await.partners.values().cloned().collect())
    }

    async fn users_with(&self, capability: Capability) -> Result<Vec<User>, StoreError> {
        let directory = self.directory.read().await;
        Ok(directory
            .users
            .values()
            .filter(|user| user.has(capability))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RevisionLog for MemoryStore {
    async fn append(&self, entry: NewRevisionEntry) -> Result<RevisionEntry, StoreError> {
        let mut log = self.log.write().await;
        log.last_id += 1;
        let stored = RevisionEntry {
            id: log.last_id,
            design_id: entry.design_id,
            actor_id: entry.actor_id,
            timestamp: Utc::now(),
            kind: entry.kind,
            notes: entry.notes,
        };
        log.entries.push(stored.clone());
        Ok(stored)
    }

    async fn entries_for(&self, design_id: DesignId) -> Result<Vec<RevisionEntry>, StoreError> {
        let log = self.log.read().await;
        Ok(log
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.design_id == design_id)
            .cloned()
            .collect())
    }
}

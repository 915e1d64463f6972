//! SQLite persistence for the workflow, enabled with the `database` feature.
//!
//! Designs, templates and directory records are stored as JSON documents
//! with the columns needed for filtering pulled out alongside. The revision
//! log is a plain table guarded by triggers that abort any UPDATE or DELETE.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{migrate::MigrateDatabase, QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::design::{
    Capability, CategoryId, ChecklistTemplate, Design, DesignId, NewTemplate, Partner, PartnerId,
    Stage, StoreError, User, UserId,
};
use crate::revision_log::{NewRevisionEntry, RevisionEntry, RevisionKind, RevisionLog};
use crate::store::{DesignQuery, DesignStore, Directory, SortOrder, TemplateCatalog};

/// Workflow store backed by a SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the configured database
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if !Sqlite::database_exists(&config.url).await? {
            info!("Creating database at {}", config.url);
            Sqlite::create_database(&config.url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect(&config.url)
            .await?;
        let store = Self { pool };

        if config.auto_migrate {
            store.migrate().await?;
        }
        Ok(store)
    }

    /// Wrap an existing pool; migrations are up to the caller
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(backend)
}

fn from_json<T: DeserializeOwned>(text: &str) -> Result<T, StoreError> {
    serde_json::from_str(text).map_err(backend)
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn push_design_filter(builder: &mut QueryBuilder<'_, Sqlite>, query: &DesignQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(ids) = &query.client_ids {
        if ids.is_empty() {
            builder.push(" AND 0 = 1");
        } else {
            builder.push(" AND client_id IN (");
            let mut separated = builder.separated(", ");
            for id in ids {
                separated.push_bind(*id as i64);
            }
            separated.push_unseparated(")");
        }
    }
    if query.visible_only {
        builder.push(" AND visible_to_client = 1");
    }
    if let Some(from) = query.created_from {
        builder.push(" AND created_at >= ").push_bind(timestamp(from));
    }
    if let Some(to) = query.created_to {
        builder.push(" AND created_at <= ").push_bind(timestamp(to));
    }
}

#[async_trait]
impl DesignStore for SqliteStore {
    async fn insert_design(&self, mut design: Design) -> Result<Design, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO designs (name, client_id, status, visible_to_client, created_at, data)
            VALUES (?1, ?2, ?3, ?4, ?5, '{}')
            "#,
        )
        .bind(&design.name)
        .bind(design.client_id as i64)
        .bind(design.status.as_str())
        .bind(design.visible_to_client)
        .bind(timestamp(design.created_at))
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        design.id = inserted.last_insert_rowid() as DesignId;
        sqlx::query("UPDATE designs SET data = ?1 WHERE id = ?2")
            .bind(to_json(&design)?)
            .bind(design.id as i64)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(design)
    }

    async fn get_design(&self, id: DesignId) -> Result<Option<Design>, StoreError> {
        let row = sqlx::query("SELECT data FROM designs WHERE id = ?1")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|row| from_json(row.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn save_design(&self, design: &Design) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE designs
            SET name = ?1, client_id = ?2, status = ?3, visible_to_client = ?4, data = ?5
            WHERE id = ?6
            "#,
        )
        .bind(&design.name)
        .bind(design.client_id as i64)
        .bind(design.status.as_str())
        .bind(design.visible_to_client)
        .bind(to_json(design)?)
        .bind(design.id as i64)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "design", id: design.id });
        }
        Ok(())
    }

    async fn delete_design(&self, id: DesignId) -> Result<bool, StoreError> {
        let deleted = sqlx::query("DELETE FROM designs WHERE id = ?1")
            .bind(id as i64)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn list_designs(&self, query: &DesignQuery) -> Result<Vec<Design>, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT data FROM designs");
        push_design_filter(&mut builder, query);
        builder.push(match query.sort {
            SortOrder::CreatedDesc => " ORDER BY created_at DESC, id DESC",
            SortOrder::NameAsc => " ORDER BY name ASC, id ASC",
        });
        // SQLite needs a LIMIT before OFFSET; -1 means unbounded
        let limit = query.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)).unwrap_or(-1);
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(i64::try_from(query.offset).unwrap_or(i64::MAX));

        let rows = builder.build().fetch_all(&self.pool).await.map_err(backend)?;
        rows.iter()
            .map(|row| from_json(row.get::<String, _>("data").as_str()))
            .collect()
    }

    async fn count_designs(&self, query: &DesignQuery) -> Result<usize, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS total FROM designs");
        push_design_filter(&mut builder, query);
        let row = builder.build().fetch_one(&self.pool).await.map_err(backend)?;
        Ok(row.get::<i64, _>("total") as usize)
    }
}

#[async_trait]
impl TemplateCatalog for SqliteStore {
    async fn insert_template(&self, template: NewTemplate) -> Result<ChecklistTemplate, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let inserted = sqlx::query(
            "INSERT INTO checklist_templates (category_id, stage, data) VALUES (?1, ?2, '{}')",
        )
        .bind(template.category_id as i64)
        .bind(template.stage.as_str())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        let stored = ChecklistTemplate {
            id: inserted.last_insert_rowid() as u64,
            name: template.name,
            category_id: template.category_id,
            stage: template.stage,
            items: template.items,
        };
        sqlx::query("UPDATE checklist_templates SET data = ?1 WHERE id = ?2")
            .bind(to_json(&stored)?)
            .bind(stored.id as i64)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(stored)
    }

    async fn find_template(
        &self,
        category_id: CategoryId,
        stage: Stage,
    ) -> Result<Option<ChecklistTemplate>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT data FROM checklist_templates
            WHERE category_id = ?1 AND stage = ?2
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(category_id as i64)
        .bind(stage.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(|row| from_json(row.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn list_templates(&self) -> Result<Vec<ChecklistTemplate>, StoreError> {
        let rows = sqlx::query("SELECT data FROM checklist_templates ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter()
            .map(|row| from_json(row.get::<String, _>("data").as_str()))
            .collect()
    }
}

#[async_trait]
impl Directory for SqliteStore {
    async fn upsert_partner(&self, partner: Partner) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO partners (id, data) VALUES (?1, ?2)")
            .bind(partner.id as i64)
            .bind(to_json(&partner)?)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn upsert_user(&self, user: User) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO users (id, portal_token, data) VALUES (?1, ?2, ?3)")
            .bind(user.id as i64)
            .bind(user.portal_token.as_deref())
            .bind(to_json(&user)?)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT data FROM users WHERE id = ?1")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|row| from_json(row.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn user_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT data FROM users WHERE portal_token = ?1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|row| from_json(row.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn get_partner(&self, id: PartnerId) -> Result<Option<Partner>, StoreError> {
        let row = sqlx::query("SELECT data FROM partners WHERE id = ?1")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|row| from_json(row.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn list_partners(&self) -> Result<Vec<Partner>, StoreError> {
        let rows = sqlx::query("SELECT data FROM partners ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter()
            .map(|row| from_json(row.get::<String, _>("data").as_str()))
            .collect()
    }

    async fn users_with(&self, capability: Capability) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query("SELECT data FROM users ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        let users: Vec<User> = rows
            .iter()
            .map(|row| from_json(row.get::<String, _>("data").as_str()))
            .collect::<Result<_, _>>()?;
        Ok(users.into_iter().filter(|user| user.has(capability)).collect())
    }
}

#[async_trait]
impl RevisionLog for SqliteStore {
    async fn append(&self, entry: NewRevisionEntry) -> Result<RevisionEntry, StoreError> {
        let now = Utc::now();
        let inserted = sqlx::query(
            r#"
            INSERT INTO revision_entries (design_id, actor_id, timestamp, kind, notes)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(entry.design_id as i64)
        .bind(entry.actor_id as i64)
        .bind(timestamp(now))
        .bind(entry.kind.as_str())
        .bind(&entry.notes)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(RevisionEntry {
            id: inserted.last_insert_rowid() as u64,
            design_id: entry.design_id,
            actor_id: entry.actor_id,
            timestamp: now,
            kind: entry.kind,
            notes: entry.notes,
        })
    }

    async fn entries_for(&self, design_id: DesignId) -> Result<Vec<RevisionEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, design_id, actor_id, timestamp, kind, notes
            FROM revision_entries
            WHERE design_id = ?1
            ORDER BY id DESC
            "#,
        )
        .bind(design_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                let kind: String = row.get("kind");
                let stamp: String = row.get("timestamp");
                Ok(RevisionEntry {
                    id: row.get::<i64, _>("id") as u64,
                    design_id: row.get::<i64, _>("design_id") as u64,
                    actor_id: row.get::<i64, _>("actor_id") as u64,
                    timestamp: DateTime::parse_from_rfc3339(&stamp)
                        .map_err(backend)?
                        .with_timezone(&Utc),
                    kind: RevisionKind::parse(&kind)
                        .ok_or_else(|| backend(format!("unknown revision kind {kind}")))?,
                    notes: row.get("notes"),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::NewDesign;

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore::from_pool(pool);
        store.migrate().await.unwrap();
        store
    }

    fn draft(name: &str, client_id: PartnerId) -> Design {
        let input = NewDesign {
            name: name.to_string(),
            client_id,
            category_id: 1,
            task_ref: None,
        };
        Design::draft(0, input, 1, Utc::now())
    }

    #[tokio::test]
    async fn test_design_round_trip_and_filters() {
        let store = store().await;
        let mut first = store.insert_design(draft("Beta", 5)).await.unwrap();
        let second = store.insert_design(draft("Alpha", 6)).await.unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        first.visible_to_client = true;
        store.save_design(&first).await.unwrap();

        let query = DesignQuery {
            client_ids: Some(vec![5, 6]),
            visible_only: true,
            ..DesignQuery::default()
        };
        let visible = store.list_designs(&query).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "Beta");
        assert_eq!(store.count_designs(&DesignQuery::default()).await.unwrap(), 2);

        let by_name = store
            .list_designs(&DesignQuery { sort: SortOrder::NameAsc, ..DesignQuery::default() })
            .await
            .unwrap();
        assert_eq!(by_name[0].name, "Alpha");
    }

    #[tokio::test]
    async fn test_revision_triggers_block_changes() {
        let store = store().await;
        let entry = store
            .append(NewRevisionEntry::new(1, 1, RevisionKind::Created, "created"))
            .await
            .unwrap();

        let update = sqlx::query("UPDATE revision_entries SET notes = 'x' WHERE id = ?1")
            .bind(entry.id as i64)
            .execute(store.pool())
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM revision_entries WHERE id = ?1")
            .bind(entry.id as i64)
            .execute(store.pool())
            .await;
        assert!(delete.is_err());

        assert!(matches!(
            store.remove(1, entry.id).await,
            Err(StoreError::ImmutableRevisionLog { .. })
        ));
        assert_eq!(store.entries_for(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lowest_template_id_wins() {
        let store = store().await;
        for name in ["First", "Second"] {
            store
                .insert_template(NewTemplate {
                    name: name.to_string(),
                    category_id: 3,
                    stage: Stage::Stage1,
                    items: vec![],
                })
                .await
                .unwrap();
        }
        let found = store.find_template(3, Stage::Stage1).await.unwrap().unwrap();
        assert_eq!(found.name, "First");
    }
}

//! Reference data loaded from TOML seed files: partners, users and
//! checklist templates.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::info;

use crate::design::{NewTemplate, Partner, Stage, User};
use crate::store::WorkflowStore;

static EMAIL_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$"));

static LOGIN_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_.-]{1,31}$"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub partners: Vec<Partner>,
    pub users: Vec<User>,
    pub templates: Vec<NewTemplate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedSummary {
    pub partners: usize,
    pub users: usize,
    pub templates: usize,
}

impl SeedFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid seed file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let seed: SeedFile = toml::from_str(text)?;
        let problems = seed.problems()?;
        if !problems.is_empty() {
            anyhow::bail!("{}", problems.join("; "));
        }
        Ok(seed)
    }

    /// Every consistency problem in the file; empty when it is usable
    pub fn problems(&self) -> Result<Vec<String>> {
        let email = EMAIL_PATTERN.as_ref().map_err(|e| anyhow::anyhow!("{e}"))?;
        let login = LOGIN_PATTERN.as_ref().map_err(|e| anyhow::anyhow!("{e}"))?;
        let mut problems = Vec::new();

        let mut partner_ids = BTreeSet::new();
        for partner in &self.partners {
            if !partner_ids.insert(partner.id) {
                problems.push(format!("duplicate partner id {}", partner.id));
            }
            if partner.name.trim().is_empty() {
                problems.push(format!("partner {} has an empty name", partner.id));
            }
            if let Some(address) = &partner.email {
                if !email.is_match(address) {
                    problems.push(format!("partner {} has invalid email {address:?}", partner.id));
                }
            }
        }
        for partner in &self.partners {
            if let Some(parent) = partner.parent_id {
                if !partner_ids.contains(&parent) {
                    problems.push(format!("partner {} has unknown parent {parent}", partner.id));
                }
            }
        }

        let mut user_ids = BTreeSet::new();
        let mut tokens = BTreeSet::new();
        for user in &self.users {
            if !user_ids.insert(user.id) {
                problems.push(format!("duplicate user id {}", user.id));
            }
            if !login.is_match(&user.login) {
                problems.push(format!("user {} has invalid login {:?}", user.id, user.login));
            }
            if let Some(address) = &user.email {
                if !email.is_match(address) {
                    problems.push(format!("user {} has invalid email {address:?}", user.id));
                }
            }
            if !partner_ids.contains(&user.partner_id) {
                problems.push(format!("user {} belongs to unknown partner {}", user.id, user.partner_id));
            }
            if let Some(token) = &user.portal_token {
                if !tokens.insert(token.as_str()) {
                    problems.push(format!("user {} reuses a portal token", user.id));
                }
            }
        }

        for template in &self.templates {
            if template.name.trim().is_empty() {
                problems.push("template with an empty name".to_string());
            }
            if template.stage == Stage::Complete {
                problems.push(format!("template {:?} targets the complete stage", template.name));
            }
        }

        Ok(problems)
    }

    /// Write the seed into a store; templates are appended, directory records upserted
    pub async fn apply<S>(&self, store: &S) -> Result<SeedSummary>
    where
        S: WorkflowStore + ?Sized,
    {
        for partner in &self.partners {
            store.upsert_partner(partner.clone()).await?;
        }
        for user in &self.users {
            store.upsert_user(user.clone()).await?;
        }
        for template in &self.templates {
            store.insert_template(template.clone()).await?;
        }

        let summary = SeedSummary {
            partners: self.partners.len(),
            users: self.users.len(),
            templates: self.templates.len(),
        };
        info!(
            partners = summary.partners,
            users = summary.users,
            templates = summary.templates,
            "Seed data applied"
        );
        Ok(summary)
    }
}

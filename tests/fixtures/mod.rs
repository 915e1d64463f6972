//! Shared studio setup: a client company with a buyer contact, staff users
//! and a stage 1 checklist template for category 1.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use design_approval::config::WorkflowConfig;
use design_approval::design::{
    Capability, Design, NewAttachment, NewDesign, NewTemplate, Partner, Stage, TemplateItem, User,
};
use design_approval::notifications::{Dispatcher, OutboxNotifier};
use design_approval::store::{Directory, MemoryStore, TemplateCatalog};
use design_approval::workflows::DesignWorkflow;
use design_approval::checklist::ValidationRole;

pub const DESIGNER: u64 = 1;
pub const VALIDATOR: u64 = 2;
pub const ADMIN: u64 = 3;
pub const BUYER: u64 = 10;
pub const STRANGER: u64 = 11;

pub const CLIENT_COMPANY: u64 = 100;
pub const BUYER_CONTACT: u64 = 101;
pub const OTHER_COMPANY: u64 = 200;

pub const BUYER_TOKEN: &str = "buyer-token";
pub const STRANGER_TOKEN: &str = "stranger-token";

pub struct Studio {
    pub workflow: Arc<DesignWorkflow<MemoryStore>>,
    pub outbox: OutboxNotifier,
}

fn user(id: u64, login: &str, partner_id: u64, capability: Capability, token: Option<&str>) -> User {
    User {
        id,
        login: login.to_string(),
        name: login.to_string(),
        email: Some(format!("{login}@example.test")),
        partner_id,
        capabilities: BTreeSet::from([capability]),
        portal_token: token.map(str::to_string),
    }
}

pub async fn studio() -> Studio {
    let store = Arc::new(MemoryStore::new());
    let partners = [
        Partner { id: 1, name: "Studio".to_string(), email: None, parent_id: None },
        Partner {
            id: CLIENT_COMPANY,
            name: "Acme".to_string(),
            email: Some("office@acme.test".to_string()),
            parent_id: None,
        },
        Partner {
            id: BUYER_CONTACT,
            name: "Acme buyer".to_string(),
            email: None,
            parent_id: Some(CLIENT_COMPANY),
        },
        Partner { id: OTHER_COMPANY, name: "Globex".to_string(), email: None, parent_id: None },
    ];
    for partner in partners {
        store.upsert_partner(partner).await.unwrap();
    }

    let users = [
        user(DESIGNER, "dana", 1, Capability::Designer, None),
        user(VALIDATOR, "vic", 1, Capability::Validator, None),
        user(ADMIN, "ada", 1, Capability::Admin, None),
        user(BUYER, "buyer", BUYER_CONTACT, Capability::Portal, Some(BUYER_TOKEN)),
        user(STRANGER, "stranger", OTHER_COMPANY, Capability::Portal, Some(STRANGER_TOKEN)),
    ];
    for user in users {
        store.upsert_user(user).await.unwrap();
    }

    store
        .insert_template(NewTemplate {
            name: "Labels stage 1".to_string(),
            category_id: 1,
            stage: Stage::Stage1,
            items: vec![
                TemplateItem { description: "Colors match the proof".to_string(), order: 10, default_comment: None },
                TemplateItem { description: "Legal text present".to_string(), order: 20, default_comment: None },
            ],
        })
        .await
        .unwrap();

    let outbox = OutboxNotifier::new();
    let dispatcher = Dispatcher::new(Arc::new(outbox.clone()), "studio@example.test");
    let workflow = Arc::new(DesignWorkflow::new(store, dispatcher, WorkflowConfig::default()));
    Studio { workflow, outbox }
}

pub fn label_design() -> NewDesign {
    NewDesign {
        name: "Lemonade label".to_string(),
        client_id: CLIENT_COMPANY,
        category_id: 1,
        task_ref: Some("TASK-42".to_string()),
    }
}

pub fn pdf(name: &str) -> NewAttachment {
    NewAttachment {
        name: name.to_string(),
        content: b"%PDF-1.7 proof".to_vec(),
    }
}

/// Tick every active item for `role`
pub async fn tick_all(studio: &Studio, design: &Design, role: ValidationRole) -> Design {
    let actor = match role {
        ValidationRole::Designer => DESIGNER,
        ValidationRole::Validator => VALIDATOR,
    };
    let items: Vec<u64> = design.active_items().map(|item| item.id).collect();
    let mut current = design.clone();
    for item in items {
        current = studio
            .workflow
            .set_validation(actor, design.id, item, role, true)
            .await
            .unwrap();
    }
    current
}

/// A design created with one attachment and pushed to the client
pub async fn design_awaiting_client(studio: &Studio) -> Design {
    let design = studio
        .workflow
        .create_design(DESIGNER, label_design(), vec![pdf("proof.pdf")])
        .await
        .unwrap();
    let design = tick_all(studio, &design, ValidationRole::Designer).await;
    tick_all(studio, &design, ValidationRole::Validator).await
}

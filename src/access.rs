// Capability checks and partner-hierarchy ownership rules

use std::collections::{BTreeSet, HashMap};

use crate::design::{Capability, Design, Partner, PartnerId, StoreError, User, WorkflowError};
use crate::observability::workflow_metrics;
use crate::store::Directory;

/// Fail with `PermissionDenied` unless the user holds `capability`
pub fn require(user: &User, capability: Capability) -> Result<(), WorkflowError> {
    if user.has(capability) {
        return Ok(());
    }
    workflow_metrics().record_permission_denied();
    tracing::warn!(
        user_id = %user.id,
        login = %user.login,
        required = %capability,
        "Permission denied"
    );
    Err(WorkflowError::PermissionDenied {
        user_id: user.id,
        required: capability,
    })
}

/// Staff that may author designs: designers and admins
pub fn require_author(user: &User) -> Result<(), WorkflowError> {
    if user.is_admin() {
        return Ok(());
    }
    require(user, Capability::Designer)
}

/// Root of the partner's parent chain
pub fn commercial_partner(partners: &[Partner], partner_id: PartnerId) -> PartnerId {
    let by_id: HashMap<PartnerId, &Partner> = partners.iter().map(|p| (p.id, p)).collect();
    let mut current = partner_id;
    let mut seen = BTreeSet::new();
    while seen.insert(current) {
        match by_id.get(&current).and_then(|p| p.parent_id) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current
}

/// The partner and every partner below it
pub fn descendants(partners: &[Partner], root: PartnerId) -> BTreeSet<PartnerId> {
    let mut tree = BTreeSet::from([root]);
    loop {
        let before = tree.len();
        for partner in partners {
            if let Some(parent) = partner.parent_id {
                if tree.contains(&parent) {
                    tree.insert(partner.id);
                }
            }
        }
        if tree.len() == before {
            return tree;
        }
    }
}

/// Clients whose designs a portal user may see
pub async fn visible_clients<D>(directory: &D, user: &User) -> Result<BTreeSet<PartnerId>, StoreError>
where
    D: Directory + ?Sized,
{
    let partners = directory.list_partners().await?;
    let root = commercial_partner(&partners, user.partner_id);
    let mut clients = descendants(&partners, root);
    clients.insert(user.partner_id);
    Ok(clients)
}

/// Ownership rule for portal access to one design
pub async fn client_owns<D>(directory: &D, user: &User, design: &Design) -> Result<bool, StoreError>
where
    D: Directory + ?Sized,
{
    if design.client_id == user.partner_id {
        return Ok(true);
    }
    Ok(visible_clients(directory, user).await?.contains(&design.client_id))
}

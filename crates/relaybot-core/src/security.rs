use std::collections::HashSet;

use crate::{
    domain::{normalize_identity, Sender},
    registry::AllowList,
    Result,
};

// ============== Authorization ==============

/// Admins (fixed at startup) plus the persisted allow-list.
///
/// Nothing is cached: every check re-reads the allow-list, so `/add_user` and
/// `/remove_user` take effect on the very next request.
#[derive(Clone, Debug)]
pub struct Authorizer {
    admins: HashSet<String>,
    users: AllowList,
}

impl Authorizer {
    pub fn new<I, S>(admins: I, users: AllowList) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let admins = admins
            .into_iter()
            .filter_map(|a| normalize_identity(a.as_ref()))
            .collect();
        Self { admins, users }
    }

    pub async fn is_authorized(&self, identity: &str) -> Result<bool> {
        let Some(id) = normalize_identity(identity) else {
            return Ok(false);
        };
        if self.admins.contains(&id) {
            return Ok(true);
        }
        self.users.contains(&id).await
    }

    /// A sender is authorized if its username or numeric id is listed.
    pub async fn is_sender_authorized(&self, sender: &Sender) -> Result<bool> {
        let candidates = sender.identities();
        if candidates.iter().any(|id| self.admins.contains(id)) {
            return Ok(true);
        }
        self.users.contains_any(&candidates).await
    }
}

//! Admin authorization.

use crate::config::AdminConfig;

/// Decides whether a user may run admin commands.
pub trait Authorizer: Send + Sync {
    fn is_admin(&self, user_id: &str) -> bool;
}

/// Exact-match list of admin user ids. An empty list denies everyone.
#[derive(Debug, Clone, Default)]
pub struct AdminAllowlist {
    admin_ids: Vec<String>,
}

impl AdminAllowlist {
    pub fn new(admin_ids: Vec<String>) -> Self {
        Self { admin_ids }
    }

    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(config.admin_ids.clone())
    }
}

impl Authorizer for AdminAllowlist {
    fn is_admin(&self, user_id: &str) -> bool {
        !user_id.is_empty() && self.admin_ids.iter().any(|id| id == user_id)
    }
}

//! User model and related types.

use serde::Serialize;

/// User roles relevant to playlist quotas.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserRoles {
    pub admin_role: bool,
    /// Company-level administrator without system rights.
    pub simple_admin_role: bool,
    /// May contribute items to playlists of other users.
    pub sub_admin_role: bool,
}

/// A user in the system (domain model).
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub company_id: i32,
    pub roles: UserRoles,
}

impl User {
    /// Admins and simple admins may exceed playlist time limits.
    pub fn is_exempt_from_quota(&self) -> bool {
        self.roles.admin_role || self.roles.simple_admin_role
    }
}

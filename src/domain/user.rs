//! User identity envelope
//!
//! Identity issuance lives outside the core; this entity carries only what
//! the authorization envelope needs: role, site assignments and the refresh
//! token binding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Global role tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Supervisor,
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Supervisor => "supervisor",
            Self::Operator => "operator",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "supervisor" => Some(Self::Supervisor),
            "operator" => Some(Self::Operator),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Site-level role, overrides the global role for site-scoped operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteRole {
    SiteAdmin,
    Supervisor,
    Operator,
}

impl SiteRole {
    /// Whether this site role may mutate site-level configuration.
    pub fn can_manage(&self) -> bool {
        matches!(self, Self::SiteAdmin | Self::Supervisor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

/// One user-to-site assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteAssignment {
    pub site_id: String,
    pub role: SiteRole,
    pub permissions: Vec<String>,
}

/// Operator/supervisor/admin account
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    /// Human operator code, e.g. `OP123`
    pub operator_id: String,
    pub name: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub status: UserStatus,
    pub assigned_sites: Vec<SiteAssignment>,
    pub primary_site: Option<String>,
    pub permissions: Vec<String>,
    /// Opaque value the active refresh token is bound to; rotating it
    /// revokes all outstanding refresh tokens.
    pub refresh_token_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        operator_id: impl Into<String>,
        name: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            operator_id: operator_id.into(),
            name: name.into(),
            email: None,
            password_hash: password_hash.into(),
            role,
            status: UserStatus::Active,
            assigned_sites: Vec::new(),
            primary_site: None,
            permissions: Vec::new(),
            refresh_token_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins see every site; everyone else is limited to assignments plus
    /// the primary site.
    pub fn can_access_site(&self, site_id: &str) -> bool {
        self.is_admin()
            || self.primary_site.as_deref() == Some(site_id)
            || self.assigned_sites.iter().any(|a| a.site_id == site_id)
    }

    pub fn site_role(&self, site_id: &str) -> Option<SiteRole> {
        self.assigned_sites
            .iter()
            .find(|a| a.site_id == site_id)
            .map(|a| a.role)
    }

    /// Site configuration mutations require admin or a managing site role.
    pub fn can_manage_site(&self, site_id: &str) -> bool {
        self.is_admin() || self.site_role(site_id).is_some_and(|r| r.can_manage())
    }

    /// Upsert a site assignment. The first assignment becomes the primary
    /// site if none is set. Returns true when an existing assignment was
    /// updated rather than added.
    pub fn assign_site(&mut self, assignment: SiteAssignment) -> bool {
        let site_id = assignment.site_id.clone();
        let updated = if let Some(existing) = self
            .assigned_sites
            .iter_mut()
            .find(|a| a.site_id == assignment.site_id)
        {
            existing.role = assignment.role;
            existing.permissions = assignment.permissions;
            true
        } else {
            self.assigned_sites.push(assignment);
            false
        };
        if self.primary_site.is_none() {
            self.primary_site = Some(site_id);
        }
        self.updated_at = Utc::now();
        updated
    }

    /// Remove any assignment for the site; clears a matching primary site.
    /// Returns true if anything changed.
    pub fn strip_site(&mut self, site_id: &str) -> bool {
        let before = self.assigned_sites.len();
        self.assigned_sites.retain(|a| a.site_id != site_id);
        let mut changed = self.assigned_sites.len() != before;
        if self.primary_site.as_deref() == Some(site_id) {
            self.primary_site = None;
            changed = true;
        }
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator() -> User {
        User::new("u1", "OP100", "Asha Rao", "hash", Role::Operator)
    }

    #[test]
    fn first_assignment_becomes_primary() {
        let mut user = operator();
        user.assign_site(SiteAssignment {
            site_id: "s1".into(),
            role: SiteRole::Operator,
            permissions: vec![],
        });
        assert_eq!(user.primary_site.as_deref(), Some("s1"));
        assert!(user.can_access_site("s1"));
        assert!(!user.can_access_site("s2"));
    }

    #[test]
    fn reassignment_updates_in_place() {
        let mut user = operator();
        user.assign_site(SiteAssignment {
            site_id: "s1".into(),
            role: SiteRole::Operator,
            permissions: vec![],
        });
        let updated = user.assign_site(SiteAssignment {
            site_id: "s1".into(),
            role: SiteRole::SiteAdmin,
            permissions: vec!["machines:write".into()],
        });
        assert!(updated);
        assert_eq!(user.assigned_sites.len(), 1);
        assert!(user.can_manage_site("s1"));
    }

    #[test]
    fn admin_bypasses_site_scoping() {
        let admin = User::new("u2", "OP999", "Root", "hash", Role::Admin);
        assert!(admin.can_access_site("anything"));
        assert!(admin.can_manage_site("anything"));
    }

    #[test]
    fn strip_site_clears_primary() {
        let mut user = operator();
        user.assign_site(SiteAssignment {
            site_id: "s1".into(),
            role: SiteRole::Supervisor,
            permissions: vec![],
        });
        assert!(user.strip_site("s1"));
        assert!(user.primary_site.is_none());
        assert!(user.assigned_sites.is_empty());
        assert!(!user.strip_site("s1"));
    }
}

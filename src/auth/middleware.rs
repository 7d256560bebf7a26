//! Authentication middleware for Axum
//!
//! Verifies the Bearer access token, loads the user record for its site
//! assignments, and inserts an `AuthenticatedUser` into request extensions.
//! Role and site-scope checks live here so every handler applies the same
//! envelope.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use super::jwt::{verify_access_token, JwtConfig};
use crate::domain::{Role, SiteAssignment, SiteRole, UserStatus};
use crate::shared::types::{DomainError, DomainResult};
use crate::storage::Storage;

/// Authentication state shared by the middleware
#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtConfig,
    pub storage: Arc<dyn Storage>,
}

/// Authenticated caller, resolved from the token plus the user record
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub operator_id: String,
    pub role: Role,
    pub assigned_sites: Vec<SiteAssignment>,
    pub primary_site: Option<String>,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

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

    /// The site a booking lands on when the request does not name one.
    pub fn default_site(&self) -> Option<String> {
        self.primary_site
            .clone()
            .or_else(|| self.assigned_sites.first().map(|a| a.site_id.clone()))
    }

    /// Read scoping. Unauthorized reads surface as not-found so a caller
    /// cannot distinguish hidden resources from missing ones.
    pub fn ensure_site_read(&self, site_id: &str, entity: &'static str) -> DomainResult<()> {
        if self.can_access_site(site_id) {
            Ok(())
        } else {
            Err(DomainError::not_found(entity, "siteId", site_id))
        }
    }

    /// Operational mutations (bookings, machines) are open to every global
    /// role, but only within an accessible site.
    pub fn ensure_site_operate(&self, site_id: &str) -> DomainResult<()> {
        if self.can_access_site(site_id) {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "operator {} is not assigned to this site",
                self.operator_id
            )))
        }
    }

    /// Site configuration mutations need admin or a managing site role.
    pub fn ensure_site_manage(&self, site_id: &str) -> DomainResult<()> {
        if self.is_admin() || self.site_role(site_id).is_some_and(|r| r.can_manage()) {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "operator {} cannot manage this site",
                self.operator_id
            )))
        }
    }
}

fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Access-token middleware; rejects the request unless a valid token maps to
/// an active user.
pub async fn auth_middleware(
    State(auth_state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(String::from);
    let Some(auth_header) = auth_header else {
        return unauthorized("Missing authentication token");
    };
    let Some(token) = extract_bearer(&auth_header) else {
        return unauthorized("Invalid authentication token");
    };

    let claims = match verify_access_token(token, &auth_state.jwt) {
        Ok(claims) => claims,
        Err(_) => return unauthorized("Invalid or expired token"),
    };

    // The record is authoritative for role and assignments; the token only
    // proves identity.
    let user = match auth_state.storage.get_user(&claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => return unauthorized("Unknown user"),
        Err(e) => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                &e.to_string(),
            )
        }
    };
    if user.status != UserStatus::Active {
        return forbidden("Account is not active");
    }

    request.extensions_mut().insert(AuthenticatedUser {
        user_id: user.id,
        operator_id: user.operator_id,
        role: user.role,
        assigned_sites: user.assigned_sites,
        primary_site: user.primary_site,
    });

    next.run(request).await
}

fn unauthorized(message: &str) -> Response {
    error_response(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
}

fn forbidden(message: &str) -> Response {
    error_response(StatusCode::FORBIDDEN, "FORBIDDEN", message)
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = Json(json!({
        "success": false,
        "message": message,
        "errorCode": code,
        "timestamp": Utc::now(),
    }));
    (status, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator_with(site: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: "u1".into(),
            operator_id: "OP100".into(),
            role: Role::Operator,
            assigned_sites: vec![SiteAssignment {
                site_id: site.into(),
                role: SiteRole::Operator,
                permissions: vec![],
            }],
            primary_site: Some(site.into()),
        }
    }

    #[test]
    fn read_scoping_hides_foreign_sites_as_not_found() {
        let user = operator_with("s1");
        assert!(user.ensure_site_read("s1", "booking").is_ok());
        assert!(matches!(
            user.ensure_site_read("s2", "booking"),
            Err(DomainError::NotFound { .. })
        ));
    }

    #[test]
    fn operate_and_manage_tiers() {
        let user = operator_with("s1");
        assert!(user.ensure_site_operate("s1").is_ok());
        assert!(user.ensure_site_manage("s1").is_err()); // plain operator

        let mut supervisor = operator_with("s1");
        supervisor.assigned_sites[0].role = SiteRole::Supervisor;
        assert!(supervisor.ensure_site_manage("s1").is_ok());
    }

    #[test]
    fn admin_bypasses_everything() {
        let admin = AuthenticatedUser {
            user_id: "u2".into(),
            operator_id: "OP999".into(),
            role: Role::Admin,
            assigned_sites: vec![],
            primary_site: None,
        };
        assert!(admin.ensure_site_read("anything", "site").is_ok());
        assert!(admin.ensure_site_manage("anything").is_ok());
    }

    #[test]
    fn default_site_prefers_primary() {
        let user = operator_with("s1");
        assert_eq!(user.default_site().as_deref(), Some("s1"));

        let mut no_primary = operator_with("s1");
        no_primary.primary_site = None;
        assert_eq!(no_primary.default_site().as_deref(), Some("s1"));

        let unassigned = AuthenticatedUser {
            user_id: "u3".into(),
            operator_id: "OP300".into(),
            role: Role::Operator,
            assigned_sites: vec![],
            primary_site: None,
        };
        assert!(unassigned.default_site().is_none());
    }
}

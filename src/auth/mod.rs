//! Request-scoped caller identity.
//!
//! Authentication itself (login, PIN, sessions) happens upstream. The gateway
//! in front of this service forwards the authenticated caller as headers, and
//! [`RequestContext`] turns those into an explicit value that handlers pass
//! down to the services.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};
use utoipa::ToSchema;

use crate::errors::ServiceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    Admin,
    Cashier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub user_id: i32,
    pub role: Role,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(user_id: i32, role: Role) -> Self {
        Self {
            user_id,
            role,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fails with `Forbidden` unless the caller is an admin.
    pub fn require_admin(&self, action: &str) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "Admin role required to {}",
                action
            )))
        }
    }

    fn from_parts(parts: &Parts) -> Result<Self, ServiceError> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let user_id = header(USER_ID_HEADER)
            .ok_or_else(|| ServiceError::Unauthorized("Missing x-user-id header".to_string()))?
            .parse::<i32>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| ServiceError::Unauthorized("Invalid x-user-id header".to_string()))?;

        let role = match header(USER_ROLE_HEADER) {
            Some(raw) => Role::from_str(raw).map_err(|_| {
                ServiceError::Unauthorized(format!("Unknown role '{}'", raw))
            })?,
            None => Role::Cashier,
        };

        // First hop of x-forwarded-for wins over x-real-ip
        let ip_address = header("x-forwarded-for")
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| header("x-real-ip").map(String::from));

        let user_agent = header("user-agent").map(String::from);

        Ok(Self {
            user_id,
            role,
            ip_address,
            user_agent,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_parts(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn extracts_full_context() {
        let ctx = RequestContext::from_parts(&parts(&[
            ("x-user-id", "42"),
            ("x-user-role", "Admin"),
            ("x-forwarded-for", "10.0.0.1, 172.16.0.9"),
            ("user-agent", "till/1.0"),
        ]))
        .unwrap();

        assert_eq!(ctx.user_id, 42);
        assert!(ctx.is_admin());
        assert_eq!(ctx.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(ctx.user_agent.as_deref(), Some("till/1.0"));
    }

    #[test]
    fn role_defaults_to_cashier_and_real_ip_is_fallback() {
        let ctx =
            RequestContext::from_parts(&parts(&[("x-user-id", "3"), ("x-real-ip", "192.168.1.4")]))
                .unwrap();
        assert_eq!(ctx.role, Role::Cashier);
        assert_eq!(ctx.ip_address.as_deref(), Some("192.168.1.4"));
        assert_matches!(
            ctx.require_admin("adjust inventory"),
            Err(ServiceError::Forbidden(_))
        );
    }

    #[test]
    fn missing_or_bad_user_id_is_unauthorized() {
        assert_matches!(
            RequestContext::from_parts(&parts(&[])),
            Err(ServiceError::Unauthorized(_))
        );
        assert_matches!(
            RequestContext::from_parts(&parts(&[("x-user-id", "abc")])),
            Err(ServiceError::Unauthorized(_))
        );
        assert_matches!(
            RequestContext::from_parts(&parts(&[("x-user-id", "0")])),
            Err(ServiceError::Unauthorized(_))
        );
        assert_matches!(
            RequestContext::from_parts(&parts(&[("x-user-id", "1"), ("x-user-role", "owner")])),
            Err(ServiceError::Unauthorized(_))
        );
    }
}

use crate::errors::ServiceError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::IntoParams;
use validator::Validate;

pub const MAX_PAGE_SIZE: u64 = 100;

/// JSON body that has been deserialized and passed `Validate`.
///
/// Malformed JSON is reported as a validation error instead of axum's
/// plain-text rejection.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Pagination parameters for list operations
#[derive(Debug, Clone, Copy, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    /// 1-based page number
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PaginationParams {
    /// Page and limit clamped to sane bounds.
    pub fn normalized(self) -> (u64, u64) {
        (self.page.max(1), self.limit.clamp(1, MAX_PAGE_SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::body::Body;

    #[derive(Debug, Deserialize, Validate)]
    struct Named {
        #[validate(length(min = 1))]
        name: String,
    }

    async fn extract(body: &'static str) -> Result<ValidatedJson<Named>, ServiceError> {
        let req = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        ValidatedJson::<Named>::from_request(req, &()).await
    }

    #[tokio::test]
    async fn accepts_valid_body() {
        let ValidatedJson(named) = extract(r#"{"name":"latte"}"#).await.unwrap();
        assert_eq!(named.name, "latte");
    }

    #[tokio::test]
    async fn malformed_and_invalid_bodies_are_validation_errors() {
        assert_matches!(extract("{").await, Err(ServiceError::ValidationError(_)));
        assert_matches!(
            extract(r#"{"name":""}"#).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn pagination_is_clamped() {
        let params = PaginationParams { page: 0, limit: 500 };
        assert_eq!(params.normalized(), (1, MAX_PAGE_SIZE));
    }
}

// src/middleware/api_key.rs - API key authentication extractor
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use log::{debug, error};
use uuid::Uuid;

use crate::errors::{AppError, ServiceError};
use crate::repositories::ApiKeyRepositoryTrait;
use crate::utils::hash::hash_api_key;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// The caller behind a valid `X-API-Key` header. Handlers that take this
/// argument reject unauthenticated requests with 401 before running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiKeyIdentity {
    pub id: Uuid,
}

impl FromRequest for ApiKeyIdentity {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let raw_key = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);
        let repository = req
            .app_data::<web::Data<dyn ApiKeyRepositoryTrait>>()
            .cloned();

        Box::pin(async move {
            let Some(raw_key) = raw_key else {
                return Err(AppError::Unauthorized("Missing API key".to_string()));
            };
            let Some(repository) = repository else {
                error!("API key repository is not registered");
                return Err(AppError::Internal("Authentication unavailable".to_string()));
            };

            match repository.find_by_hash(&hash_api_key(&raw_key)).await {
                Ok(Some(key)) => {
                    debug!("Authenticated API key {}", key.id);
                    Ok(ApiKeyIdentity { id: key.id })
                }
                Ok(None) => Err(AppError::Unauthorized("Invalid API key".to_string())),
                Err(e) => Err(ServiceError::from(e).into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApiKey;
    use crate::repositories::MockApiKeyRepositoryTrait;
    use actix_web::test::TestRequest;
    use chrono::Utc;
    use std::sync::Arc;

    fn repository(known_key: &str, id: Uuid) -> web::Data<dyn ApiKeyRepositoryTrait> {
        let known_hash = hash_api_key(known_key);
        let mut repo = MockApiKeyRepositoryTrait::new();
        repo.expect_find_by_hash().returning(move |hash| {
            Ok((hash == known_hash).then(|| ApiKey {
                id,
                key_hash: hash.to_string(),
                name: "test".to_string(),
                created_at: Utc::now(),
            }))
        });
        let repo: Arc<dyn ApiKeyRepositoryTrait> = Arc::new(repo);
        web::Data::from(repo)
    }

    #[actix_web::test]
    async fn valid_key_resolves_identity() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((API_KEY_HEADER, "sk_valid"))
            .app_data(repository("sk_valid", id))
            .to_http_request();

        let identity = ApiKeyIdentity::extract(&req).await.unwrap();
        assert_eq!(identity.id, id);
    }

    #[actix_web::test]
    async fn missing_or_unknown_key_is_unauthorized() {
        let data = repository("sk_valid", Uuid::new_v4());

        let req = TestRequest::default().app_data(data.clone()).to_http_request();
        assert!(matches!(
            ApiKeyIdentity::extract(&req).await,
            Err(AppError::Unauthorized(_))
        ));

        let req = TestRequest::default()
            .insert_header((API_KEY_HEADER, "sk_wrong"))
            .app_data(data)
            .to_http_request();
        assert!(matches!(
            ApiKeyIdentity::extract(&req).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}

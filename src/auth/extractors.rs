use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::error::Error;

/// The verified identity behind a request: extracts the bearer token from
/// the Authorization header, checks its signature and claims, and exposes
/// the decoded id + privilege to the handler. This is the only gate in
/// front of protected routes.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub is_admin: bool,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(Error::Unauthenticated("missing authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(Error::Unauthenticated("invalid authorization scheme"))?;

        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "token verification failed");
            Error::Unauthenticated("invalid or expired token")
        })?;

        Ok(AuthUser {
            id: claims.sub,
            is_admin: claims.admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use axum::http::Request;

    fn make_keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "extractor-test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
        })
    }

    fn parts_with_header(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = value {
            builder = builder.header(axum::http::header::AUTHORIZATION, v);
        }
        builder.body(()).expect("request").into_parts().0
    }

    #[tokio::test]
    async fn accepts_a_valid_bearer_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id, true).expect("sign");
        let mut parts = parts_with_header(Some(&format!("Bearer {token}")));

        let user = AuthUser::from_request_parts(&mut parts, &keys)
            .await
            .expect("extract");
        assert_eq!(user.id, user_id);
        assert!(user.is_admin);
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let mut parts = parts_with_header(None);
        let err = AuthUser::from_request_parts(&mut parts, &make_keys())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn rejects_non_bearer_scheme() {
        let mut parts = parts_with_header(Some("Basic dXNlcjpwYXNz"));
        let err = AuthUser::from_request_parts(&mut parts, &make_keys())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let mut parts = parts_with_header(Some("Bearer not-a-real-token"));
        let err = AuthUser::from_request_parts(&mut parts, &make_keys())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn rejects_token_from_another_secret() {
        let other = JwtKeys::from_config(&JwtConfig {
            secret: "rotated-away".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
        });
        let token = other.sign(Uuid::new_v4(), false).expect("sign");
        let mut parts = parts_with_header(Some(&format!("Bearer {token}")));
        let err = AuthUser::from_request_parts(&mut parts, &make_keys())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
    }
}

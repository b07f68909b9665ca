use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::auth::{validate_jwt, Claims};
use crate::error::ApiError;

/// Authenticated principal context extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthPrincipal {
    pub id: Uuid,
    pub email: String,
    pub is_root: bool,
    /// Session-held default tenant; lowest-precedence resolution signal.
    pub tenant_id: Option<Uuid>,
}

impl From<Claims> for AuthPrincipal {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            is_root: claims.is_root,
            tenant_id: claims.tenant_id,
        }
    }
}

/// JWT authentication middleware that validates tokens and injects the
/// principal into the request
pub async fn jwt_auth_middleware(headers: HeaderMap, mut request: Request, next: Next) -> Response {
    let token = match extract_jwt_from_headers(&headers) {
        Ok(token) => token,
        Err(msg) => return ApiError::unauthorized(msg).into_response(),
    };

    let claims = match validate_jwt(&token) {
        Ok(claims) => claims,
        Err(e) => return ApiError::unauthorized(e.to_string()).into_response(),
    };

    request.extensions_mut().insert(AuthPrincipal::from(claims));
    next.run(request).await
}

/// Root-only gate for the operator surface. Runs after jwt_auth_middleware.
pub async fn require_root_middleware(request: Request, next: Next) -> Response {
    match request.extensions().get::<AuthPrincipal>() {
        Some(principal) if principal.is_root => next.run(request).await,
        Some(_) => ApiError::forbidden("Root access required").into_response(),
        None => ApiError::unauthorized("Authentication required").into_response(),
    }
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_jwt_from_headers(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn rejects_missing_or_malformed_header() {
        let headers = HeaderMap::new();
        assert!(extract_jwt_from_headers(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcg=="));
        assert!(extract_jwt_from_headers(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert!(extract_jwt_from_headers(&headers).is_err());
    }
}

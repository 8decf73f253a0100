//! JWT authentication module.
//!
//! Validates caller tokens and answers doctype permission checks.
//!
//! ```text
//! Authorization: Bearer <jwt>
//!        │
//!        ▼
//! JwtManager::validate_access_token ──► Claims { sub, company, permissions }
//!        │
//!        ▼
//! Caller::require(POS Invoice, create)   "POS Invoice:create" | "POS Invoice:*" | "*"
//! ```

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::AppState;
use tillpoint_core::InvoiceKind;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id, e.g. `cashier@demo.co`)
    pub sub: String,

    /// Company the user sells for
    #[serde(default)]
    pub company: Option<String>,

    /// Granted doctype permissions, `"<doctype>:<action>"`
    #[serde(default)]
    pub permissions: Vec<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,

    /// Token type ("access")
    pub token_type: String,
}

/// JWT token manager.
pub struct JwtManager {
    secret: String,
    access_lifetime_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager.
    pub fn new(secret: String, access_lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            access_lifetime_secs,
        }
    }

    /// Generate an access token.
    pub fn generate_access_token(
        &self,
        user: &str,
        company: Option<&str>,
        permissions: &[&str],
    ) -> GatewayResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_lifetime_secs);

        let claims = Claims {
            sub: user.to_string(),
            company: company.map(str::to_string),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: "access".to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| GatewayError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> GatewayResult<Claims> {
        let validation = Validation::default();

        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| GatewayError::AuthFailed(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }

    /// Validate that a token is an access token.
    pub fn validate_access_token(&self, token: &str) -> GatewayResult<Claims> {
        let claims = self.validate_token(token)?;

        if claims.token_type != "access" {
            return Err(GatewayError::AuthFailed("Expected access token".to_string()));
        }

        Ok(claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// =============================================================================
// Caller
// =============================================================================

/// Document actions guarded by permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocAction {
    Create,
    Submit,
}

impl DocAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocAction::Create => "create",
            DocAction::Submit => "submit",
        }
    }
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub user: String,
    pub company: Option<String>,
    permissions: Vec<String>,
}

impl Caller {
    pub fn new(user: impl Into<String>, company: Option<String>, permissions: Vec<String>) -> Self {
        Caller {
            user: user.into(),
            company,
            permissions,
        }
    }

    pub fn has_permission(&self, doctype: InvoiceKind, action: DocAction) -> bool {
        let exact = format!("{}:{}", doctype.as_str(), action.as_str());
        let any_action = format!("{}:*", doctype.as_str());
        self.permissions
            .iter()
            .any(|p| p == "*" || *p == exact || *p == any_action)
    }

    /// Fails with a permission error unless the action is granted.
    pub fn require(&self, doctype: InvoiceKind, action: DocAction) -> GatewayResult<()> {
        if self.has_permission(doctype, action) {
            Ok(())
        } else {
            Err(GatewayError::PermissionDenied(format!(
                "Not permitted to {} {}",
                action.as_str(),
                doctype
            )))
        }
    }
}

impl From<Claims> for Caller {
    fn from(claims: Claims) -> Self {
        Caller {
            user: claims.sub,
            company: claims.company,
            permissions: claims.permissions,
        }
    }
}

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| GatewayError::AuthFailed("Authentication required".to_string()))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| GatewayError::AuthFailed("Expected a bearer token".to_string()))?;

        let claims = state.jwt.validate_access_token(token)?;
        Ok(Caller::from(claims))
    }
}

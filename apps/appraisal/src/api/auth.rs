//! Authentication: argon2 password hashes, HS256 access tokens, and the
//! [`Principal`] extractor that turns a bearer token into an [`Actor`].

use super::AppState;
use super::error::ApiError;
use appraisal_core::cycle::Actor;
use appraisal_core::directory::{User, UserView};
use appraisal_core::{AppraisalError, Role, UserId};
use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// =============================================================================
// PASSWORDS
// =============================================================================

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    if password.is_empty() {
        return Err(ApiError::Core(AppraisalError::validation(
            "password is required",
        )));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Internal(format!("password hashing failed: {err}")))
}

/// Stand-in hash checked when no usable account matches, so a failed login
/// costs the same whether or not the account exists.
fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(b"appraisal-dummy-password", &salt)
            .map(|hash| hash.to_string())
            .unwrap_or_default()
    })
}

/// Check a password against a stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

// =============================================================================
// TOKENS
// =============================================================================

/// Access token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Signing and verification keys.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").field("ttl", &self.ttl).finish()
    }
}

impl TokenKeys {
    pub fn new(secret: &str, ttl_hours: u32) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(i64::from(ttl_hours)),
        }
    }

    /// Issue a token for `user`.
    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<String, ApiError> {
        let claims = Claims {
            user_id: user.id.0,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| ApiError::Internal(format!("token signing failed: {err}")))
    }

    /// Verify signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "token rejected");
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        ApiError::Unauthorized("token expired".to_string())
                    }
                    _ => ApiError::Unauthorized("invalid token".to_string()),
                }
            })
    }
}

// =============================================================================
// PRINCIPAL EXTRACTOR
// =============================================================================

/// The signed-in user of a request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub actor: Actor,
    pub username: String,
}

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
        let claims = state.keys.verify(token)?;

        // The account may have been deactivated or re-roled since issue.
        let user = state
            .run(move |cycle| cycle.user(UserId(claims.user_id)))
            .await
            .map_err(|err| match err {
                ApiError::Core(AppraisalError::NotFound { .. }) => {
                    ApiError::Unauthorized("unknown account".to_string())
                }
                other => other,
            })?;
        if !user.active {
            return Err(ApiError::Unauthorized("account is inactive".to_string()));
        }
        Ok(Self {
            actor: Actor::from_user(&user),
            username: user.username,
        })
    }
}

// =============================================================================
// LOGIN
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: i64,
    pub user: UserView,
    pub dashboard: Option<&'static str>,
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = request.email.trim().to_lowercase();
    let user = state
        .run(move |cycle| cycle.user_by_email(&email))
        .await?;

    // Hash verification is CPU bound.
    let password = request.password;
    let user = tokio::task::spawn_blocking(move || match user {
        Some(user) if user.active => verify_password(&password, &user.password_hash).then_some(user),
        _ => {
            verify_password(&password, dummy_hash());
            None
        }
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))?;

    let Some(user) = user else {
        tracing::warn!("failed login attempt");
        return Err(ApiError::Unauthorized("invalid email or password".to_string()));
    };

    let now = Utc::now();
    let token = state.keys.issue(&user, now)?;
    tracing::info!(user = %user.id, role = %user.role, "login");
    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_at: (now + state.keys.ttl).timestamp(),
        dashboard: user.role.dashboard_route(),
        user: user.view(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use appraisal_core::directory::NewUser;

    fn user() -> User {
        User::create(
            UserId(7),
            NewUser {
                username: "manager".to_string(),
                email: "manager@pms.com".to_string(),
                password_hash: "x".to_string(),
                role: Role::Manager,
                employee_id: None,
            },
        )
        .expect("user")
    }

    #[test]
    fn passwords_verify_against_their_hash() {
        let hash = hash_password("manager123").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("manager123", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("manager123", "not a phc string"));
    }

    #[test]
    fn dummy_hash_is_a_real_argon2_hash() {
        let hash = dummy_hash();
        assert!(hash.starts_with("$argon2"));
        assert!(PasswordHash::new(hash).is_ok());
        assert!(!verify_password("manager123", hash));
        assert_eq!(dummy_hash(), hash);
    }

    #[test]
    fn tokens_carry_role_and_expire() {
        let keys = TokenKeys::new("0123456789abcdef0123", 8);
        let token = keys.issue(&user(), Utc::now()).expect("token");
        let claims = keys.verify(&token).expect("claims");
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.exp - claims.iat, 8 * 3600);

        let stale = keys
            .issue(&user(), Utc::now() - Duration::hours(10))
            .expect("token");
        assert!(matches!(keys.verify(&stale), Err(ApiError::Unauthorized(_))));

        let other = TokenKeys::new("another-secret-entirely", 8);
        assert!(other.verify(&token).is_err());
    }
}

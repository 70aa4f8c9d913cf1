use axum::{extract::FromRequestParts, http::header};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::{domain::Role, dto::auth::Claims, error::AppError, state::AppState};

/// Verified caller identity. Handlers receive it already decoded and trust it.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    if user.role != Role::Admin {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_elevated(user: &AuthUser) -> Result<(), AppError> {
    if !user.role.is_elevated() {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_owner(user: &AuthUser, owner_id: Uuid) -> Result<(), AppError> {
    if user.user_id != owner_id {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_owner_or_elevated(user: &AuthUser, owner_id: Uuid) -> Result<(), AppError> {
    if user.user_id == owner_id || user.role.is_elevated() {
        return Ok(());
    }
    Err(AppError::Forbidden)
}

/// Sign a token the extractor will accept. Used by the seed binary and tests.
pub fn sign_token(
    secret: &str,
    user_id: Uuid,
    role: Role,
    ttl: Duration,
) -> Result<String, AppError> {
    let expiration = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

        let user_id = Uuid::parse_str(&decoded.claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;
        let role = decoded
            .claims
            .role
            .parse::<Role>()
            .map_err(|_| AppError::Unauthorized("Invalid role in token".into()))?;

        Ok(AuthUser { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elevated_roles_act_on_foreign_orders() {
        let owner = Uuid::new_v4();
        let stranger = AuthUser::new(Uuid::new_v4(), Role::User);
        let seller = AuthUser::new(Uuid::new_v4(), Role::Seller);
        let admin = AuthUser::new(Uuid::new_v4(), Role::Admin);

        assert!(ensure_owner_or_elevated(&stranger, owner).is_err());
        assert!(ensure_owner_or_elevated(&seller, owner).is_ok());
        assert!(ensure_owner_or_elevated(&admin, owner).is_ok());
        assert!(ensure_owner_or_elevated(&AuthUser::new(owner, Role::User), owner).is_ok());
    }

    #[test]
    fn strict_ownership_ignores_role() {
        let owner = Uuid::new_v4();
        let admin = AuthUser::new(Uuid::new_v4(), Role::Admin);
        assert!(matches!(ensure_owner(&admin, owner), Err(AppError::Forbidden)));
    }

    #[test]
    fn admin_only() {
        assert!(ensure_admin(&AuthUser::new(Uuid::new_v4(), Role::Seller)).is_err());
        assert!(ensure_admin(&AuthUser::new(Uuid::new_v4(), Role::Admin)).is_ok());
        assert!(ensure_elevated(&AuthUser::new(Uuid::new_v4(), Role::User)).is_err());
    }

    #[test]
    fn signed_tokens_decode_with_same_secret() {
        let user_id = Uuid::new_v4();
        let token = sign_token("secret", user_id, Role::Seller, Duration::minutes(5))
            .expect("token");
        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .expect("decode");
        assert_eq!(decoded.claims.sub, user_id.to_string());
        assert_eq!(decoded.claims.role, "SELLER");
    }
}

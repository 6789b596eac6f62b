use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password, MIN_PASSWORD_LEN},
        repo_types::{NewUser, User},
    },
    error::AppError,
    state::AppState,
};

const MAX_NAME_LEN: usize = 150;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Normalizes the request in place and rejects anything we would not store.
fn validate_registration(payload: &mut RegisterRequest) -> Result<(), AppError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();
    payload.first_name = payload.first_name.trim().to_string();
    payload.last_name = payload.last_name.trim().to_string();

    if !is_valid_email(&payload.email) {
        return Err(AppError::bad_request("Invalid email"));
    }
    if payload.username.chars().count() > MAX_NAME_LEN || !USERNAME_RE.is_match(&payload.username)
    {
        return Err(AppError::bad_request("Invalid username"));
    }
    for (field, value) in [
        ("first_name", &payload.first_name),
        ("last_name", &payload.last_name),
    ] {
        if value.is_empty() || value.chars().count() > MAX_NAME_LEN {
            return Err(AppError::bad_request(format!("Invalid {field}")));
        }
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request("Password too short"));
    }
    Ok(())
}

fn auth_response(keys: &JwtKeys, user: User) -> Result<Json<AuthResponse>, AppError> {
    let pair = keys.issue_pair(user.id)?;
    Ok(Json(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if let Err(e) = validate_registration(&mut payload) {
        warn!(email = %payload.email, error = %e, "registration rejected");
        return Err(e);
    }

    if User::exists(&state.db, &payload.email, &payload.username).await? {
        warn!(email = %payload.email, "email or username already registered");
        return Err(AppError::Conflict(
            "Email or username already registered".into(),
        ));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        &NewUser {
            email: &payload.email,
            username: &payload.username,
            first_name: &payload.first_name,
            last_name: &payload.last_name,
            password_hash: &password_hash,
        },
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    auth_response(&JwtKeys::from_ref(&state), user)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::bad_request("Invalid email"));
    }

    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    info!(user_id = %user.id, "user logged in");
    auth_response(&JwtKeys::from_ref(&state), user)
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    auth_response(&keys, user)
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            email: "  Cook@Example.COM ".into(),
            username: "chef.anna".into(),
            first_name: "Anna".into(),
            last_name: "Petrova".into(),
            password: "long-enough".into(),
        }
    }

    #[test]
    fn registration_normalizes_email() {
        let mut req = request();
        validate_registration(&mut req).unwrap();
        assert_eq!(req.email, "cook@example.com");
    }

    #[test]
    fn registration_rejects_bad_fields() {
        let mut req = request();
        req.username = "has space".into();
        assert!(matches!(validate_registration(&mut req), Err(AppError::BadRequest(_))));

        let mut req = request();
        req.password = "short".into();
        assert!(validate_registration(&mut req).is_err());

        let mut req = request();
        req.first_name = "   ".into();
        assert!(validate_registration(&mut req).is_err());

        let mut req = request();
        req.email = "no-at-sign".into();
        assert!(validate_registration(&mut req).is_err());
    }

    #[test]
    fn public_user_hides_password_hash() {
        let user = User {
            id: uuid::Uuid::new_v4(),
            email: "test@example.com".into(),
            username: "test".into(),
            first_name: "T".into(),
            last_name: "E".into(),
            password_hash: "$argon2id$secret".into(),
            created_at: time::OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&PublicUser::from(user.clone())).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("argon2"));
        let raw = serde_json::to_string(&user).unwrap();
        assert!(!raw.contains("argon2"));
    }
}

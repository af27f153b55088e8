use std::sync::LazyLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, extract::State, http::StatusCode};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use linkvote_db::models::UserRow;
use linkvote_types::api::{
    ChangePasswordRequest, FieldError, ForgotPasswordRequest, LoginRequest, MutationResponse,
    RegisterRequest, UserResponse,
};

use crate::error::{ApiError, INVALID_RESET_TOKEN};
use crate::extract::Json;
use crate::middleware::RequestContext;
use crate::session::{clear_cookie, hash_token, session_token, start_session};
use crate::validation::{validate_password, validate_register};
use crate::{AppState, blocking, with_db};

const RESET_TOKEN_TTL_MINUTES: i64 = 15;

/// Verified against on the unknown-user login path.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("linkvote-unknown-user").ok());

type UserEnvelope = Json<MutationResponse<UserResponse>>;

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, UserEnvelope), ApiError> {
    validate_register(&req)?;
    let RegisterRequest {
        username,
        email,
        password,
    } = req;

    let (u, e) = (username.clone(), email.clone());
    if let Some(existing) = with_db(&state, move |db| db.find_user_by_username_or_email(&u, &e)).await? {
        return Err(duplicate_user(&existing, &username));
    }

    let password_hash = blocking(move || hash_password(&password)).await?;

    let db_state = state.clone();
    let user = blocking(move || {
        db_state
            .db
            .create_user(&username, &email, &password_hash, Utc::now())
            .or_else(|err| {
                if !err.is_unique_violation() {
                    return Err(ApiError::from(err));
                }
                // Lost a race with a concurrent registration
                let existing = db_state.db.find_user_by_username_or_email(&username, &email)?;
                Err(existing
                    .map(|e| duplicate_user(&e, &username))
                    .unwrap_or(ApiError::Internal))
            })
    })
    .await?;

    info!(user_id = user.id, username = %user.username, "User registered");
    let jar = start_session(&state, jar, user.id).await?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(MutationResponse::created(
            "User registration successfully",
            user_response(&user, Some(user.id)),
        )),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, UserEnvelope), ApiError> {
    let identifier = req.username_or_email.clone();
    let found = with_db(&state, move |db| {
        if identifier.contains('@') {
            db.get_user_by_email(&identifier)
        } else {
            db.get_user_by_username(&identifier)
        }
    })
    .await?;

    let password = req.password;
    let Some(user) = found else {
        // Same argon2 cost as a real check, so timing does not reveal accounts
        blocking(move || match DUMMY_HASH.as_deref() {
            Some(hash) => verify_password(hash, &password),
            None => Ok(false),
        })
        .await?;
        warn!("Login attempt for unknown user");
        return Err(bad_credentials("usernameOrEmail", "Username or email incorrect"));
    };

    let stored = user.password.clone();
    let valid = blocking(move || verify_password(&stored, &password)).await?;
    if !valid {
        warn!(user_id = user.id, "Login attempt with wrong password");
        return Err(bad_credentials("password", "Incorrect password"));
    }

    let jar = start_session(&state, jar, user.id).await?;

    Ok((
        jar,
        Json(MutationResponse::ok(
            "Logged in successfully",
            user_response(&user, Some(user.id)),
        )),
    ))
}

/// Always clears the cookie. Answers false only when the session row could
/// not be removed.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<bool>) {
    let removed = match session_token(&jar).map(hash_token) {
        Some(token_hash) => with_db(&state, move |db| db.delete_session(&token_hash))
            .await
            .map(|_| true)
            .unwrap_or(false),
        None => true,
    };

    (clear_cookie(jar), Json(removed))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Option<UserResponse>>, ApiError> {
    let Some(user_id) = ctx.user_id else {
        return Ok(Json(None));
    };

    let user = with_db(&state, move |db| db.get_user_by_id(user_id)).await?;
    Ok(Json(user.map(|u| user_response(&u, ctx.user_id))))
}

/// Answers the same way whether or not the email is registered.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MutationResponse<()>>, ApiError> {
    const SENT: &str = "If an account exists for that email, a reset link has been sent";

    let email = req.email.clone();
    let Some(user) = with_db(&state, move |db| db.get_user_by_email(&email)).await? else {
        info!("Password reset requested for unknown email");
        return Ok(Json(MutationResponse::done(SENT)));
    };

    let token = Uuid::new_v4().to_string();
    let token_clone = token.clone();
    let token_hash = blocking(move || hash_password(&token_clone)).await?;
    let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);

    let user_id = user.id;
    with_db(&state, move |db| db.replace_reset_token(user_id, &token_hash, expires_at)).await?;

    let link = format!(
        "{}/change-password?token={}&userId={}",
        state.frontend_url.trim_end_matches('/'),
        token,
        user.id
    );
    let html = format!("<a href=\"{link}\">Click here to reset your password</a>");
    let mailer = state.mailer.clone();
    let to = user.email.clone();
    blocking(move || {
        mailer
            .send(&to, "Reset your password", &html)
            .map_err(|e| ApiError::internal("failed to send reset email", e))
    })
    .await?;

    info!(user_id = user.id, "Password reset link issued");
    Ok(Json(MutationResponse::done(SENT)))
}

pub async fn change_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<(CookieJar, UserEnvelope), ApiError> {
    validate_password("newPassword", &req.new_password)?;

    let user_id = req.user_id;
    let stored = with_db(&state, move |db| db.get_reset_token(user_id))
        .await?
        .filter(|t| t.expires_at > Utc::now())
        .ok_or_else(|| ApiError::field("token", INVALID_RESET_TOKEN))?;

    let token_hash = stored.token_hash;
    let candidate_hash = token_hash.clone();
    let token = req.token;
    let valid = blocking(move || verify_password(&candidate_hash, &token)).await?;
    if !valid {
        warn!(user_id, "Password reset attempted with a wrong token");
        return Err(ApiError::field("token", INVALID_RESET_TOKEN));
    }

    let user = with_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or_else(|| ApiError::field("token", "User no longer exists"))?;

    let new_password = req.new_password;
    let password_hash = blocking(move || hash_password(&new_password)).await?;
    // A concurrent reset that consumed the token first makes this fail
    with_db(&state, move |db| {
        db.reset_password(user_id, &token_hash, &password_hash, Utc::now())
    })
    .await?;

    info!(user_id, "Password changed via reset token");
    let jar = start_session(&state, jar, user_id).await?;

    Ok((
        jar,
        Json(MutationResponse::ok(
            "User password reset successfully",
            user_response(&user, Some(user_id)),
        )),
    ))
}

/// Email is visible only to the user themself.
pub fn user_response(user: &UserRow, viewer: Option<i64>) -> UserResponse {
    UserResponse {
        id: user.id,
        username: user.username.clone(),
        email: if viewer == Some(user.id) {
            user.email.clone()
        } else {
            String::new()
        },
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

fn duplicate_user(existing: &UserRow, username: &str) -> ApiError {
    let error = if existing.username == username {
        FieldError::new("username", "Username already taken")
    } else {
        FieldError::new("email", "Email already taken")
    };
    ApiError::validation("Duplicated username or email", vec![error])
}

fn bad_credentials(field: &str, message: &str) -> ApiError {
    ApiError::BadCredentials {
        message: message.to_string(),
        errors: vec![FieldError::new(field, message)],
    }
}

// Hash with Argon2id
fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal("password hashing failed", e))
}

fn verify_password(stored_hash: &str, candidate: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::internal("stored password hash is unreadable", e))?;
    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok())
}

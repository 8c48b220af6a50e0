use anyhow::Context;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::FromRef;
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest},
        jwt::JwtKeys,
    },
    error::AppError,
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

/// First path segments the router already owns.
const RESERVED_USERNAMES: &[&str] = &["auth", "login", "register", "uploads", "health"];

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Usernames end up as a URL path segment, so keep them boring.
pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{2,31}$").unwrap();
    }
    USERNAME_RE.is_match(username)
        && !RESERVED_USERNAMES
            .iter()
            .any(|r| r.eq_ignore_ascii_case(username))
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[instrument(skip_all)]
pub async fn register(st: &AppState, req: RegisterRequest) -> Result<PublicUser, AppError> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();

    if username.is_empty()
        || email.is_empty()
        || req.password.is_empty()
        || req.retype_password.is_empty()
    {
        return Err(AppError::validation(
            "username, email, password and retype_password are required",
        ));
    }
    if req.password != req.retype_password {
        return Err(AppError::validation("password and retype_password do not match"));
    }
    if !is_valid_username(&username) {
        warn!(%username, "invalid username");
        return Err(AppError::validation(
            "username must be 3-32 letters, digits, '_', '.' or '-' and not a reserved word",
        ));
    }
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::validation("invalid email"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("password too short"));
    }

    if st.users.exists(&username, &email).await? {
        warn!(%username, %email, "username or email already registered");
        return Err(AppError::Conflict("username or email already registered".into()));
    }

    let password = req.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("join password hashing task")??;

    let user = st
        .users
        .create(&username, &email, &hash)
        .await?
        .ok_or_else(|| {
            warn!(%username, %email, "registration lost a uniqueness race");
            AppError::Conflict("username or email already registered".into())
        })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user.into())
}

#[instrument(skip_all)]
pub async fn login(st: &AppState, req: LoginRequest) -> Result<LoginResponse, AppError> {
    let login = req.login.trim();
    if login.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("login and password are required"));
    }

    let user = st.users.find_by_login(login).await?.ok_or_else(|| {
        warn!(%login, "login unknown user");
        AppError::NotFound("user not found".into())
    })?;

    let password = req.password;
    let hash = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .context("join password verification task")??;

    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized("invalid password"));
    }

    let keys = JwtKeys::from_ref(st);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(LoginResponse {
        message: "login successful".into(),
        greeting: format!("Hello, {}!", user.username),
        token,
        token_type: "Bearer",
        expires_in: keys.ttl.as_secs(),
    })
}

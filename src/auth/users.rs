//! Register and login use cases over a `UserStore`.

use super::{PasswordHasher, TokenIssuer};
use crate::config::ValidationRule;
use crate::error::{AppError, FieldErrors};
use crate::service::RequestValidator;
use crate::store::UserStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

pub const MIN_PASSWORD_LENGTH: u32 = 6;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub token: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    pub id: Uuid,
    pub email: String,
    /// Accounts log in with their email, so this is the email too.
    pub user_name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: LoginUser,
}

fn rule(label: &str) -> ValidationRule {
    ValidationRule {
        required: Some(true),
        label: Some(label.to_string()),
        ..Default::default()
    }
}

fn registration_rules() -> HashMap<String, ValidationRule> {
    HashMap::from([
        ("first_name".to_string(), ValidationRule { max_length: Some(100), ..rule("first name") }),
        ("last_name".to_string(), ValidationRule { max_length: Some(100), ..rule("last name") }),
        (
            "email".to_string(),
            ValidationRule {
                format: Some("email".into()),
                max_length: Some(256),
                ..rule("email")
            },
        ),
        (
            "password".to_string(),
            ValidationRule {
                min_length: Some(MIN_PASSWORD_LENGTH),
                ..rule("password")
            },
        ),
    ])
}

fn text(body: &Map<String, Value>, key: &str) -> String {
    body.get(key).and_then(Value::as_str).unwrap_or_default().trim().to_string()
}

/// Create an account and sign the caller in. `body` uses snake_case keys.
pub async fn register(
    users: &dyn UserStore,
    hasher: &PasswordHasher,
    tokens: &TokenIssuer,
    body: &Map<String, Value>,
) -> Result<RegisterResponse, AppError> {
    RequestValidator::validate(body, &registration_rules()).into_result()?;
    let email = text(body, "email");
    if users.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Validation(FieldErrors::single(
            "email",
            "a user with this email already exists",
        )));
    }
    let password = body.get("password").and_then(Value::as_str).unwrap_or_default();
    let user = UserRecord {
        id: Uuid::new_v4(),
        email,
        password_hash: hasher.hash(password)?,
        first_name: text(body, "first_name"),
        last_name: text(body, "last_name"),
        created_at: Utc::now(),
        updated_at: None,
    };
    users.insert_user(&user).await?;
    tracing::info!(user_id = %user.id, email = %user.email, "user registered");
    let token = tokens.issue(&user.id.to_string(), &user.email)?;
    Ok(RegisterResponse {
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        token,
    })
}

/// Exchange credentials for a token. Unknown email and wrong password look the same to the caller.
pub async fn login(
    users: &dyn UserStore,
    hasher: &PasswordHasher,
    tokens: &TokenIssuer,
    req: &LoginRequest,
) -> Result<LoginResponse, AppError> {
    let mut errors = FieldErrors::new();
    if req.email.trim().is_empty() {
        errors.add("email", "email is required");
    }
    if req.password.is_empty() {
        errors.add("password", "password is required");
    }
    errors.into_result()?;

    let rejected = || AppError::Unauthorized("invalid email or password".into());
    let Some(user) = users.find_user_by_email(req.email.trim()).await? else {
        tracing::warn!(email = %req.email, "login rejected: unknown email");
        return Err(rejected());
    };
    if !hasher.verify(&req.password, &user.password_hash)? {
        tracing::warn!(email = %req.email, "login rejected: wrong password");
        return Err(rejected());
    }
    let token = tokens.issue(&user.id.to_string(), &user.email)?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(LoginResponse {
        token,
        user: LoginUser {
            id: user.id,
            user_name: user.email.clone(),
            email: user.email,
        },
    })
}

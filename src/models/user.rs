// src/models/user.rs - Account data structures
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::validations::{validate_name, validate_password};

/// A stored account
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string, never serialized
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a new account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// A login session. Only the digest of the cookie token is stored.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// DTO for registering a new account
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDto {
    #[serde(default)]
    #[validate(custom(function = "validate_name"))]
    pub name: String,

    #[serde(default)]
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,

    #[serde(default)]
    #[validate(custom(function = "validate_password"))]
    pub password: String,
}

// DTO for logging in; presence is checked by the service so that the
// message matches what the login form expects
#[derive(Debug, Deserialize)]
pub struct LoginDto {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileDto {
    #[validate(custom(function = "validate_name"))]
    pub name: Option<String>,

    #[validate(email(message = "Please enter a valid email address"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePasswordDto {
    #[serde(default)]
    pub old_password: String,

    #[serde(default)]
    #[validate(custom(function = "validate_password"))]
    pub new_password: String,

    #[serde(default)]
    pub confirm_password: String,
}

// DTO for responses; leaves the password hash behind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponseDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponseDto {
    fn from(user: User) -> Self {
        UserResponseDto {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    #[test]
    fn response_dto_omits_password_hash() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            created_at: now,
            updated_at: now,
        };

        let value = serde_json::to_value(UserResponseDto::from(user)).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["email"], json!("ada@example.com"));
        assert_eq!(value["updated_at"], value["created_at"]);
    }

    #[test]
    fn register_dto_reports_each_invalid_field() {
        let dto: RegisterDto =
            serde_json::from_value(json!({ "name": " ", "email": "nope", "password": "short" }))
                .unwrap();
        let errors = dto.validate().unwrap_err();
        let fields = errors.field_errors();

        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn session_expiry_is_inclusive() {
        let now = Utc::now();
        let session = Session {
            token_hash: "h".into(),
            user_id: Uuid::new_v4(),
            created_at: now - Duration::hours(1),
            expires_at: now,
        };
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - Duration::seconds(1)));
    }
}

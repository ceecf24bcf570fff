// src/services/user.rs - Account business logic
use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{debug, info};
use tokio::task;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::{
    LoginDto, NewUser, RegisterDto, Session, UpdatePasswordDto, UpdateProfileDto, User,
    UserResponseDto,
};
use crate::repositories::UserRepositoryTrait;
use crate::utils::{hash::token_digest, id_generator, password};

type Result<T> = std::result::Result<T, ServiceError>;

pub const MISSING_FIELDS: &str = "Please provide all the fields!";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const LOGIN_REQUIRED: &str = "Please login to continue";

/// A freshly issued session: the raw token goes into the cookie, only its
/// digest is persisted.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub ttl: Duration,
}

#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepositoryTrait>,
    session_ttl: Duration,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// Argon2 runs on the blocking pool.
async fn hash_password(plain: String) -> Result<String> {
    task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| ServiceError::Internal(format!("Password hashing task failed: {}", e)))?
}

async fn verify_password(plain: String, stored_hash: String) -> Result<bool> {
    task::spawn_blocking(move || password::verify_password(&plain, &stored_hash))
        .await
        .map_err(|e| ServiceError::Internal(format!("Password check task failed: {}", e)))?
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepositoryTrait>, session_ttl: Duration) -> Self {
        Self {
            repository,
            session_ttl,
        }
    }

    pub async fn register(&self, dto: RegisterDto) -> Result<(UserResponseDto, IssuedSession)> {
        dto.validate()?;

        let email = normalize_email(&dto.email);
        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }

        let new_user = NewUser {
            name: dto.name.trim().to_string(),
            email,
            password_hash: hash_password(dto.password).await?,
        };
        let user = self.repository.create(&new_user).await?;
        info!("Registered user {}", user.id);

        let session = self.issue_session(&user).await?;
        Ok((UserResponseDto::from(user), session))
    }

    pub async fn login(&self, dto: LoginDto) -> Result<(UserResponseDto, IssuedSession)> {
        if dto.email.trim().is_empty() || dto.password.is_empty() {
            return Err(ServiceError::Validation(MISSING_FIELDS.to_string()));
        }

        let email = normalize_email(&dto.email);
        let Some(user) = self.repository.find_by_email(&email).await? else {
            debug!("Login attempt for unknown email");
            return Err(ServiceError::Validation(INVALID_CREDENTIALS.to_string()));
        };

        if !verify_password(dto.password, user.password_hash.clone()).await? {
            debug!("Login attempt with wrong password for user {}", user.id);
            return Err(ServiceError::Validation(INVALID_CREDENTIALS.to_string()));
        }

        let session = self.issue_session(&user).await?;
        Ok((UserResponseDto::from(user), session))
    }

    /// Revokes the session behind `token`, if any. Logging out twice is fine.
    pub async fn logout(&self, token: Option<&str>) -> Result<()> {
        if let Some(token) = token {
            self.repository.delete_session(&token_digest(token)).await?;
        }
        Ok(())
    }

    /// Resolves the account behind a session cookie value.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<User> {
        let unauthorized = || ServiceError::Unauthorized(LOGIN_REQUIRED.to_string());

        let token = token.filter(|t| !t.is_empty()).ok_or_else(unauthorized)?;
        let digest = token_digest(token);
        let session = self
            .repository
            .find_session(&digest)
            .await?
            .ok_or_else(unauthorized)?;

        if session.is_expired(Utc::now()) {
            self.repository.delete_session(&digest).await?;
            return Err(unauthorized());
        }

        self.repository
            .find_by_id(&session.user_id)
            .await?
            .ok_or_else(unauthorized)
    }

    pub async fn update_profile(&self, user: &User, dto: UpdateProfileDto) -> Result<UserResponseDto> {
        dto.validate()?;

        let name = dto.name.map(|n| n.trim().to_string());
        let email = dto
            .email
            .map(|e| normalize_email(&e))
            .filter(|e| *e != user.email);

        if let Some(email) = &email {
            if self.repository.find_by_email(email).await?.is_some() {
                return Err(ServiceError::Conflict(
                    "A user with this email already exists".to_string(),
                ));
            }
        }

        let updated = self.repository.update_profile(&user.id, name, email).await?;
        Ok(UserResponseDto::from(updated))
    }

    /// Changes the password, revokes every existing session, and issues a new
    /// one for the caller.
    pub async fn change_password(&self, user: &User, dto: UpdatePasswordDto) -> Result<IssuedSession> {
        if dto.old_password.is_empty() || dto.new_password.is_empty() || dto.confirm_password.is_empty() {
            return Err(ServiceError::Validation(MISSING_FIELDS.to_string()));
        }

        if !verify_password(dto.old_password.clone(), user.password_hash.clone()).await? {
            return Err(ServiceError::Validation("Old password is incorrect".to_string()));
        }
        if dto.new_password != dto.confirm_password {
            return Err(ServiceError::Validation("Passwords do not match".to_string()));
        }
        dto.validate()?;

        let password_hash = hash_password(dto.new_password).await?;
        let revoked = self.repository.update_password(&user.id, &password_hash).await?;
        info!("Password changed for user {}, {} session(s) revoked", user.id, revoked);

        self.issue_session(user).await
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        Ok(self.repository.purge_expired_sessions(Utc::now()).await?)
    }

    async fn issue_session(&self, user: &User) -> Result<IssuedSession> {
        let token = id_generator::generate_session_token();
        let now = Utc::now();
        let session = Session {
            token_hash: token_digest(&token),
            user_id: user.id,
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        self.repository.create_session(&session).await?;

        Ok(IssuedSession {
            token,
            ttl: self.session_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use fake::{faker::internet::en::SafeEmail, faker::name::en::Name, Fake};
    use mockall::predicate::eq;
    use uuid::Uuid;

    use super::*;
    use crate::errors::RepositoryError;
    use crate::repositories::MockUserRepositoryTrait;

    fn stored_user(email: &str, password: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: Name().fake(),
            email: email.to_string(),
            password_hash: password::hash_password(password).unwrap(),
            created_at: now,
            updated_at: now,
        }
    }

    fn service(repo: MockUserRepositoryTrait) -> UserService {
        UserService::new(Arc::new(repo), Duration::hours(72))
    }

    fn login(email: &str, password: &str) -> LoginDto {
        LoginDto {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn login_without_password_never_touches_the_repository() {
        let repo = MockUserRepositoryTrait::new();
        let err = service(repo).login(login("a@example.com", "")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(msg) if msg == MISSING_FIELDS));
    }

    #[tokio::test]
    async fn login_with_unknown_email_is_invalid_credentials() {
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_find_by_email().returning(|_| Ok(None));

        let err = service(repo).login(login("ghost@example.com", "pw123456")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(msg) if msg == INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_invalid_credentials() {
        let email: String = SafeEmail().fake();
        let user = stored_user(&email, "right pass 1");
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));
        repo.expect_create_session().never();

        let err = service(repo).login(login(&email, "wrong pass 1")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(msg) if msg == INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn login_normalizes_email_and_stores_only_the_digest() {
        let user = stored_user("ada@example.com", "right pass 1");
        let user_id = user.id;
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_find_by_email()
            .with(eq("ada@example.com"))
            .returning(move |_| Ok(Some(user.clone())));
        repo.expect_create_session()
            .withf(move |s| s.user_id == user_id && s.token_hash.len() == 43)
            .times(1)
            .returning(|_| Ok(()));

        let (user, session) = service(repo)
            .login(login("  Ada@Example.com ", "right pass 1"))
            .await
            .unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(session.token.len(), id_generator::SESSION_TOKEN_LENGTH);
        assert_eq!(session.ttl, Duration::hours(72));
    }

    #[tokio::test]
    async fn register_rejects_taken_email() {
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_find_by_email()
            .returning(|email| Ok(Some(stored_user(email, "whatever 1"))));
        repo.expect_create().never();

        let dto = RegisterDto {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "correct horse 1".into(),
        };
        let err = service(repo).register(dto).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_validates_before_lookup() {
        let repo = MockUserRepositoryTrait::new();
        let dto = RegisterDto {
            name: "Ada".into(),
            email: "not-an-email".into(),
            password: "correct horse 1".into(),
        };
        let err = service(repo).register(dto).await.unwrap_err();
        match err {
            ServiceError::InvalidFields { message, fields } => {
                assert!(message.starts_with("email:"));
                assert!(fields.get("email").is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_maps_insert_race_to_conflict() {
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_find_by_email().returning(|_| Ok(None));
        repo.expect_create().returning(|_| {
            Err(RepositoryError::Conflict(
                "A user with this email already exists".into(),
            ))
        });

        let dto = RegisterDto {
            name: "Ada".into(),
            email: SafeEmail().fake(),
            password: "correct horse 1".into(),
        };
        let err = service(repo).register(dto).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn authenticate_requires_a_live_session() {
        let repo = MockUserRepositoryTrait::new();
        let svc = service(repo);
        assert!(matches!(svc.authenticate(None).await, Err(ServiceError::Unauthorized(_))));
        assert!(matches!(svc.authenticate(Some("")).await, Err(ServiceError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn expired_sessions_are_deleted_on_sight() {
        let digest = token_digest("abc123");
        let expected = digest.clone();
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_find_session().returning(|hash| {
            let now = Utc::now();
            Ok(Some(Session {
                token_hash: hash.to_string(),
                user_id: Uuid::new_v4(),
                created_at: now - Duration::hours(80),
                expires_at: now - Duration::hours(8),
            }))
        });
        repo.expect_delete_session()
            .withf(move |hash| hash == expected)
            .times(1)
            .returning(|_| Ok(true));
        repo.expect_find_by_id().never();

        let err = service(repo).authenticate(Some("abc123")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(msg) if msg == LOGIN_REQUIRED));
        assert_eq!(digest.len(), 43);
    }

    #[tokio::test]
    async fn logout_without_cookie_is_a_no_op() {
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_delete_session().never();
        service(repo).logout(None).await.unwrap();
    }

    #[tokio::test]
    async fn change_password_checks_old_password_first() {
        let user = stored_user("ada@example.com", "right pass 1");
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_update_password().never();

        let dto = UpdatePasswordDto {
            old_password: "wrong pass 1".into(),
            new_password: "new pass 12".into(),
            confirm_password: "new pass 12".into(),
        };
        let err = service(repo).change_password(&user, dto).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(msg) if msg == "Old password is incorrect"));
    }

    #[tokio::test]
    async fn change_password_revokes_sessions_and_issues_a_new_one() {
        let user = stored_user("ada@example.com", "right pass 1");
        let user_id = user.id;
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_update_password()
            .withf(move |id, hash| *id == user_id && hash.starts_with("$argon2id$"))
            .times(1)
            .returning(|_, _| Ok(3));
        repo.expect_create_session().times(1).returning(|_| Ok(()));

        let dto = UpdatePasswordDto {
            old_password: "right pass 1".into(),
            new_password: "new pass 12".into(),
            confirm_password: "new pass 12".into(),
        };
        let session = service(repo).change_password(&user, dto).await.unwrap();
        assert!(!session.token.is_empty());
    }

    #[tokio::test]
    async fn update_profile_skips_conflict_check_for_unchanged_email() {
        let user = stored_user("ada@example.com", "right pass 1");
        let updated = User {
            name: "Ada King".into(),
            ..user.clone()
        };
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_find_by_email().never();
        repo.expect_update_profile()
            .withf(|_, name, email| name.as_deref() == Some("Ada King") && email.is_none())
            .returning(move |_, _, _| Ok(updated.clone()));

        let dto = UpdateProfileDto {
            name: Some(" Ada King ".into()),
            email: Some("ADA@example.com".into()),
        };
        let response = service(repo).update_profile(&user, dto).await.unwrap();
        assert_eq!(response.name, "Ada King");
    }
}

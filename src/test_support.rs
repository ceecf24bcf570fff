//! In-memory stand-ins used by pipeline tests.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    errors::RepositoryError,
    models::{NewUser, Session, User},
    repositories::UserRepositoryTrait,
};

type Result<T> = std::result::Result<T, RepositoryError>;

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<Uuid, User>>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemoryUserRepository {
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn insert_session(&self, session: Session) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.token_hash.clone(), session);
    }
}

fn email_taken() -> RepositoryError {
    RepositoryError::Conflict("A user with this email already exists".to_string())
}

#[async_trait]
impl UserRepositoryTrait for InMemoryUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == user.email) {
            return Err(email_taken());
        }
        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            created_at: now,
            updated_at: now,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_profile(
        &self,
        id: &Uuid,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<User> {
        let mut users = self.users.lock().unwrap();
        if let Some(email) = &email {
            if users.values().any(|u| u.id != *id && &u.email == email) {
                return Err(email_taken());
            }
        }
        let user = users
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("User {} not found", id)))?;
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(email) = email {
            user.email = email;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_password(&self, id: &Uuid, password_hash: &str) -> Result<u64> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("User {} not found", id)))?;
        user.password_hash = password_hash.to_string();

        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != *id);
        Ok((before - sessions.len()) as u64)
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        self.insert_session(session.clone());
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        Ok(self.sessions.lock().unwrap().get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool> {
        Ok(self.sessions.lock().unwrap().remove(token_hash).is_some())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

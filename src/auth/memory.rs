//! In-process [`UserStore`] used by unit and router tests.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{NewUser, StoreError, User, UserStore};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    fn with_users<R>(&self, f: impl FnOnce(&mut Vec<User>) -> R) -> R {
        let mut guard = self.users.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    pub fn snapshot(&self, email: &str) -> Option<User> {
        self.with_users(|users| users.iter().find(|u| u.email == email).cloned())
    }

    /// Overwrites the stored reset expiry, for expiry tests.
    pub fn force_reset_expiry(&self, email: &str, expires_at: OffsetDateTime) {
        self.with_users(|users| {
            if let Some(u) = users.iter_mut().find(|u| u.email == email) {
                u.reset_token_expiry = Some(expires_at);
            }
        });
    }
}

fn new_row(new: &NewUser<'_>) -> User {
    User {
        id: Uuid::new_v4(),
        email: new.email.to_string(),
        password_hash: new.password_hash.to_string(),
        is_admin: new.role.is_admin(),
        is_email_verified: new.is_email_verified,
        verification_token: new.verification_token.map(str::to_string),
        reset_token: None,
        reset_token_expiry: None,
        created_at: OffsetDateTime::now_utc(),
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.with_users(|users| users.iter().find(|u| u.email == email).cloned()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.with_users(|users| users.iter().find(|u| u.id == id).cloned()))
    }

    async fn create(&self, new: NewUser<'_>) -> Result<User, StoreError> {
        self.with_users(|users| {
            if users.iter().any(|u| u.email == new.email) {
                return Err(StoreError::DuplicateEmail);
            }
            let user = new_row(&new);
            users.push(user.clone());
            Ok(user)
        })
    }

    async fn create_first_admin(&self, new: NewUser<'_>) -> Result<Option<User>, StoreError> {
        self.with_users(|users| {
            if users.iter().any(|u| u.is_admin) {
                return Ok(None);
            }
            if users.iter().any(|u| u.email == new.email) {
                return Err(StoreError::DuplicateEmail);
            }
            let user = new_row(&new);
            users.push(user.clone());
            Ok(Some(user))
        })
    }

    async fn consume_verification_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        Ok(self.with_users(|users| {
            let user = users
                .iter_mut()
                .find(|u| u.verification_token.as_deref() == Some(token))?;
            user.is_email_verified = true;
            user.verification_token = None;
            Some(user.clone())
        }))
    }

    async fn replace_verification_token(
        &self,
        id: Uuid,
        token: &str,
    ) -> Result<bool, StoreError> {
        Ok(self.with_users(|users| {
            match users.iter_mut().find(|u| u.id == id && !u.is_email_verified) {
                Some(user) => {
                    user.verification_token = Some(token.to_string());
                    true
                }
                None => false,
            }
        }))
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        self.with_users(|users| {
            if let Some(user) = users.iter_mut().find(|u| u.id == id) {
                user.reset_token = Some(token.to_string());
                user.reset_token_expiry = Some(expires_at);
            }
        });
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        Ok(self.with_users(|users| {
            let user = users.iter_mut().find(|u| {
                u.reset_token.as_deref() == Some(token)
                    && u.reset_token_expiry.is_some_and(|exp| exp > now)
            })?;
            user.password_hash = password_hash.to_string();
            user.reset_token = None;
            user.reset_token_expiry = None;
            Some(user.clone())
        }))
    }

    async fn count_admins(&self) -> Result<i64, StoreError> {
        Ok(self.with_users(|users| users.iter().filter(|u| u.is_admin).count() as i64))
    }

    async fn mark_verified(&self, id: Uuid) -> Result<(), StoreError> {
        self.with_users(|users| {
            if let Some(user) = users.iter_mut().find(|u| u.id == id) {
                user.is_email_verified = true;
                user.verification_token = None;
            }
        });
        Ok(())
    }
}

//! Credential verification and account creation.

use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{NewUserParams, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Login attempt result. Invalid credentials are a normal outcome, reported
/// to the user through a flash message, never an error.
#[derive(Debug)]
pub enum LoginOutcome {
    Verified(UserRecord),
    InvalidCredentials,
}

#[derive(Debug)]
pub enum SignupOutcome {
    Created(UserRecord),
    EmailTaken,
    Rejected(&'static str),
}

pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    bcrypt_cost: u32,
}

impl AccountService {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self {
            users,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Lower the hashing cost for test setups; production keeps the default.
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub async fn verify_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginOutcome, AccountError> {
        let Some(user) = self.users.find_by_email(email.trim()).await? else {
            return Ok(LoginOutcome::InvalidCredentials);
        };

        let matches = bcrypt::verify(password, &user.password_hash)
            .map_err(|err| AccountError::Hash(err.to_string()))?;
        if matches {
            Ok(LoginOutcome::Verified(user))
        } else {
            Ok(LoginOutcome::InvalidCredentials)
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<SignupOutcome, AccountError> {
        let email = email.trim().to_ascii_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Ok(SignupOutcome::Rejected("Please enter a valid e-mail address."));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Ok(SignupOutcome::Rejected(
                "Password must be at least 6 characters long.",
            ));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            return Ok(SignupOutcome::EmailTaken);
        }

        let password_hash = bcrypt::hash(password, self.bcrypt_cost)
            .map_err(|err| AccountError::Hash(err.to_string()))?;

        let name = if name.trim().is_empty() {
            email.clone()
        } else {
            name.trim().to_string()
        };

        match self
            .users
            .create_user(NewUserParams {
                email,
                name,
                password_hash,
            })
            .await
        {
            Ok(user) => Ok(SignupOutcome::Created(user)),
            // Concurrent signup with the same address loses the race here.
            Err(RepoError::Duplicate { .. }) => Ok(SignupOutcome::EmailTaken),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[derive(Default)]
    struct MemoryUsers {
        users: Mutex<Vec<UserRecord>>,
    }

    #[async_trait]
    impl UsersRepo for MemoryUsers {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == id)
                .cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email)
                .cloned())
        }

        async fn create_user(&self, params: NewUserParams) -> Result<UserRecord, RepoError> {
            let user = UserRecord {
                id: Uuid::new_v4(),
                email: params.email,
                name: params.name,
                password_hash: params.password_hash,
                created_at: OffsetDateTime::now_utc(),
            };
            self.users.lock().unwrap().push(user.clone());
            Ok(user)
        }
    }

    fn service() -> AccountService {
        AccountService::new(Arc::new(MemoryUsers::default())).with_bcrypt_cost(4)
    }

    #[tokio::test]
    async fn signup_then_login_round_trip() {
        let service = service();
        let created = service
            .sign_up("Ada@Example.com", "Ada", "hunter22")
            .await
            .unwrap();
        let SignupOutcome::Created(user) = created else {
            panic!("expected created account");
        };
        assert_eq!(user.email, "ada@example.com");

        match service
            .verify_login("ada@example.com", "hunter22")
            .await
            .unwrap()
        {
            LoginOutcome::Verified(found) => assert_eq!(found.id, user.id),
            LoginOutcome::InvalidCredentials => panic!("expected verified login"),
        }
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_not_error() {
        let service = service();
        service.sign_up("ada@example.com", "Ada", "hunter22").await.unwrap();
        assert!(matches!(
            service.verify_login("ada@example.com", "wrong").await.unwrap(),
            LoginOutcome::InvalidCredentials
        ));
    }

    #[tokio::test]
    async fn unknown_email_is_invalid() {
        assert!(matches!(
            service().verify_login("nobody@example.com", "x").await.unwrap(),
            LoginOutcome::InvalidCredentials
        ));
    }

    #[tokio::test]
    async fn duplicate_email_is_reported() {
        let service = service();
        service.sign_up("ada@example.com", "Ada", "hunter22").await.unwrap();
        assert!(matches!(
            service.sign_up("ada@example.com", "Ada", "hunter22").await.unwrap(),
            SignupOutcome::EmailTaken
        ));
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        assert!(matches!(
            service().sign_up("ada@example.com", "Ada", "abc").await.unwrap(),
            SignupOutcome::Rejected(_)
        ));
    }
}

//! Session-backed auth resolution.

use std::sync::Arc;

use uuid::Uuid;

use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

/// Outcome of resolving the session's stored user reference.
///
/// A stale reference (user deleted since the session was written) is not an
/// error: the request proceeds without a user. Only a failing lookup
/// propagates, so the caller can route it into the terminal error handler.
#[derive(Debug)]
pub enum ResolvedUser {
    Anonymous,
    Attached(UserRecord),
}

pub struct AuthService {
    users: Arc<dyn UsersRepo>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self { users }
    }

    /// Resolve the acting user for this request. The record is fetched fresh
    /// on every call; nothing is cached across requests.
    pub async fn resolve_session_user(
        &self,
        stored: Option<Uuid>,
    ) -> Result<ResolvedUser, RepoError> {
        let Some(id) = stored else {
            return Ok(ResolvedUser::Anonymous);
        };

        match self.users.find_by_id(id).await? {
            Some(user) => Ok(ResolvedUser::Attached(user)),
            None => Ok(ResolvedUser::Anonymous),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use time::OffsetDateTime;

    use crate::application::repos::NewUserParams;

    enum FakeBehavior {
        Found(UserRecord),
        Missing,
        Broken,
    }

    struct FakeUsers {
        behavior: FakeBehavior,
    }

    #[async_trait]
    impl UsersRepo for FakeUsers {
        async fn find_by_id(&self, _id: Uuid) -> Result<Option<UserRecord>, RepoError> {
            match &self.behavior {
                FakeBehavior::Found(user) => Ok(Some(user.clone())),
                FakeBehavior::Missing => Ok(None),
                FakeBehavior::Broken => Err(RepoError::from_persistence("store unreachable")),
            }
        }

        async fn find_by_email(&self, _email: &str) -> Result<Option<UserRecord>, RepoError> {
            Ok(None)
        }

        async fn create_user(&self, _params: NewUserParams) -> Result<UserRecord, RepoError> {
            Err(RepoError::from_persistence("unused"))
        }
    }

    fn sample_user() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            password_hash: String::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn missing_reference_passes_through() {
        let service = AuthService::new(Arc::new(FakeUsers {
            behavior: FakeBehavior::Missing,
        }));
        let resolved = service.resolve_session_user(None).await.unwrap();
        assert!(matches!(resolved, ResolvedUser::Anonymous));
    }

    #[tokio::test]
    async fn stale_reference_is_not_an_error() {
        let service = AuthService::new(Arc::new(FakeUsers {
            behavior: FakeBehavior::Missing,
        }));
        let resolved = service
            .resolve_session_user(Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(matches!(resolved, ResolvedUser::Anonymous));
    }

    #[tokio::test]
    async fn found_reference_attaches_the_record() {
        let user = sample_user();
        let service = AuthService::new(Arc::new(FakeUsers {
            behavior: FakeBehavior::Found(user.clone()),
        }));
        match service
            .resolve_session_user(Some(user.id))
            .await
            .unwrap()
        {
            ResolvedUser::Attached(found) => assert_eq!(found.id, user.id),
            other => panic!("expected attached user, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lookup_failure_propagates() {
        let service = AuthService::new(Arc::new(FakeUsers {
            behavior: FakeBehavior::Broken,
        }));
        let err = service
            .resolve_session_user(Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Persistence(_)));
    }
}

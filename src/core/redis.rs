use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError};
use tokio::sync::RwLock;

/// Attempts allowed per email and action inside one window.
pub(crate) const AUTH_ATTEMPT_LIMIT: i64 = 10;
pub(crate) const AUTH_WINDOW_SECONDS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthAction {
    Register,
    Login,
}

impl AuthAction {
    fn as_str(self) -> &'static str {
        match self {
            AuthAction::Register => "register",
            AuthAction::Login => "login",
        }
    }
}

pub(crate) fn attempt_key(action: AuthAction, email: &str) -> String {
    format!("rl:{}:{}", action.as_str(), email.trim().to_lowercase())
}

/// Optional Redis connection. Everything degrades to "allowed" when it is absent.
#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHealth {
    pub(crate) fn describe(&self) -> String {
        match self {
            RedisHealth::Healthy => "healthy".to_string(),
            RedisHealth::Disconnected => "disconnected".to_string(),
            RedisHealth::Unhealthy(error) => format!("unhealthy: {error}"),
        }
    }

    /// A missing Redis is a supported deployment, a failing one is not.
    pub(crate) fn is_degraded(&self) -> bool {
        matches!(self, RedisHealth::Unhealthy(_))
    }
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let manager = ConnectionManager::new(Client::open(self.url.as_str())?).await?;
        *self.manager.write().await = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        self.manager.write().await.take();
    }

    async fn connection(&self) -> Option<ConnectionManager> {
        self.manager.read().await.clone()
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let Some(mut conn) = self.connection().await else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    /// Counts one auth attempt for `email` and reports whether it is still
    /// inside the fixed window budget. Redis being absent or failing lets the
    /// attempt through.
    pub(crate) async fn allow_auth_attempt(&self, action: AuthAction, email: &str) -> bool {
        let Some(mut conn) = self.connection().await else {
            return true;
        };
        let key = attempt_key(action, email);

        // SET NX opens the window once; INCR then counts inside it.
        let counted: Result<(i64,), RedisError> = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(&key)
            .arg(0)
            .arg("EX")
            .arg(AUTH_WINDOW_SECONDS)
            .arg("NX")
            .ignore()
            .incr(&key, 1)
            .query_async(&mut conn)
            .await;

        match counted {
            Ok((attempts,)) => {
                if attempts > AUTH_ATTEMPT_LIMIT {
                    tracing::warn!(action = action.as_str(), attempts, "Auth attempts throttled");
                }
                attempts <= AUTH_ATTEMPT_LIMIT
            }
            Err(err) => {
                tracing::warn!(error = %err, action = action.as_str(), "Rate limit check failed; allowing attempt");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnected_handle_fails_open() {
        let redis = RedisHandle::new("redis://127.0.0.1:6379/1".to_string());

        assert_eq!(redis.health().await, RedisHealth::Disconnected);
        for _ in 0..=AUTH_ATTEMPT_LIMIT {
            assert!(redis.allow_auth_attempt(AuthAction::Login, "a@x.com").await);
        }
    }

    #[test]
    fn attempt_keys_are_per_action_and_case_insensitive() {
        assert_eq!(attempt_key(AuthAction::Login, " Ana@X.com "), "rl:login:ana@x.com");
        assert_ne!(
            attempt_key(AuthAction::Login, "a@x.com"),
            attempt_key(AuthAction::Register, "a@x.com")
        );
    }

    #[test]
    fn only_a_failing_redis_degrades_health() {
        assert!(!RedisHealth::Disconnected.is_degraded());
        assert!(RedisHealth::Unhealthy("refused".into()).is_degraded());
        assert_eq!(RedisHealth::Unhealthy("refused".into()).describe(), "unhealthy: refused");
    }
}

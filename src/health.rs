use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

impl HealthResponse {
    pub fn is_unhealthy(&self) -> bool {
        self.status == "unhealthy"
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl ToString) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.to_string(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

pub struct RedisChecker {
    url: String,
}

impl RedisChecker {
    pub fn new(url: String) -> Self {
        Self { url }
    }

    async fn ping(&self) -> Result<(), redis::RedisError> {
        let client = redis::Client::open(self.url.as_str())?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl DependencyChecker for RedisChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.ping().await {
            Ok(()) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

/// Named dependency checks run concurrently for `/health`. A failed
/// critical dependency makes the service unhealthy, any other failure only
/// degraded.
#[derive(Clone)]
pub struct HealthChecker {
    checks: Vec<(String, Arc<dyn DependencyChecker>, bool)>,
    started: Instant,
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self {
            checks: Vec::new(),
            started: Instant::now(),
        }
    }
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn critical(mut self, name: &str, checker: impl DependencyChecker + 'static) -> Self {
        self.checks.push((name.to_string(), Arc::new(checker), true));
        self
    }

    pub fn optional(mut self, name: &str, checker: impl DependencyChecker + 'static) -> Self {
        self.checks.push((name.to_string(), Arc::new(checker), false));
        self
    }

    pub async fn check(&self) -> HealthResponse {
        let results = futures::future::join_all(self.checks.iter().map(|(name, checker, critical)| async move {
            let status = timeout(CHECK_TIMEOUT, checker.check())
                .await
                .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
            (name.clone(), status, *critical)
        }))
        .await;

        let mut has_critical_failure = false;
        let mut has_non_critical_failure = false;
        let mut dependencies = HashMap::new();
        for (name, status, critical) in results {
            if matches!(status, DependencyStatus::Unhealthy { .. }) {
                if critical {
                    has_critical_failure = true;
                } else {
                    has_non_critical_failure = true;
                }
            }
            dependencies.insert(name, status);
        }

        let status = if has_critical_failure {
            "unhealthy"
        } else if has_non_critical_failure {
            "degraded"
        } else {
            "healthy"
        };

        HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.started.elapsed().as_secs(),
            dependencies,
        }
    }
}

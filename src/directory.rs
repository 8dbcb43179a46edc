// Read-only directory of jobs, companies, and engineers. The engine
// consults it once, at contract creation, to validate that the
// referenced parties exist. Lookups go to the surrounding platform, so
// the cached wrapper keeps a short-TTL read-through cache in front.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use crate::domain::{CompanyId, EngineerId, JobId};

#[async_trait]
pub trait Directory: Send + Sync {
    async fn job_exists(&self, id: JobId) -> Result<bool>;
    async fn company_exists(&self, id: CompanyId) -> Result<bool>;
    async fn engineer_exists(&self, id: EngineerId) -> Result<bool>;
}

/// Directory backed by a fixed set of known ids. Used by tests and as
/// the CLI's local registry.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    jobs: HashSet<JobId>,
    companies: HashSet<CompanyId>,
    engineers: HashSet<EngineerId>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(mut self, id: JobId) -> Self {
        self.jobs.insert(id);
        self
    }

    pub fn with_company(mut self, id: CompanyId) -> Self {
        self.companies.insert(id);
        self
    }

    pub fn with_engineer(mut self, id: EngineerId) -> Self {
        self.engineers.insert(id);
        self
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn job_exists(&self, id: JobId) -> Result<bool> {
        Ok(self.jobs.contains(&id))
    }

    async fn company_exists(&self, id: CompanyId) -> Result<bool> {
        Ok(self.companies.contains(&id))
    }

    async fn engineer_exists(&self, id: EngineerId) -> Result<bool> {
        Ok(self.engineers.contains(&id))
    }
}

/// Read-through cache over another directory. Existence answers are
/// cached for a short TTL; only positive and negative lookups that the
/// upstream answered successfully are cached.
pub struct CachedDirectory {
    inner: Arc<dyn Directory>,
    cache: Cache<String, bool>,
}

impl CachedDirectory {
    pub fn new(inner: Arc<dyn Directory>, ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    async fn lookup<F>(&self, key: String, fetch: F) -> Result<bool>
    where
        F: std::future::Future<Output = Result<bool>>,
    {
        if let Some(hit) = self.cache.get(&key).await {
            debug!(key = %key, "directory cache hit");
            return Ok(hit);
        }
        let exists = fetch.await?;
        self.cache.insert(key, exists).await;
        Ok(exists)
    }
}

#[async_trait]
impl Directory for CachedDirectory {
    async fn job_exists(&self, id: JobId) -> Result<bool> {
        self.lookup(format!("job:{id}"), self.inner.job_exists(id))
            .await
    }

    async fn company_exists(&self, id: CompanyId) -> Result<bool> {
        self.lookup(format!("company:{id}"), self.inner.company_exists(id))
            .await
    }

    async fn engineer_exists(&self, id: EngineerId) -> Result<bool> {
        self.lookup(format!("engineer:{id}"), self.inner.engineer_exists(id))
            .await
    }
}

//! Persistence contract consumed by the orchestration core.
//!
//! The real job/user/application store (a graph database in the reference
//! deployment) lives outside this crate; the core only ever reads and
//! writes through this trait. `InMemoryJobStore` backs tests and simple
//! hosts.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::{ApplicationStatus, Job};

/// Narrow interface to the job/application store
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch one job by id
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>>;

    /// Matched jobs for a user, filtered by minimum score, best first
    async fn get_user_matches(
        &self,
        user_id: &str,
        min_score: f64,
        limit: usize,
    ) -> Result<Vec<Job>>;

    /// Record the outcome of an application attempt
    async fn record_application_status(
        &self,
        user_id: &str,
        job_id: &str,
        status: ApplicationStatus,
    ) -> Result<()>;
}

/// In-process store for tests and single-host composition
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, Job>>,
    statuses: Mutex<HashMap<(String, String), ApplicationStatus>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_job(&self, job: Job) {
        self.jobs
            .lock()
            .expect("jobs lock poisoned")
            .insert(job.job_id.clone(), job);
    }

    pub fn application_status(&self, user_id: &str, job_id: &str) -> Option<ApplicationStatus> {
        self.statuses
            .lock()
            .expect("statuses lock poisoned")
            .get(&(user_id.to_string(), job_id.to_string()))
            .copied()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self
            .jobs
            .lock()
            .expect("jobs lock poisoned")
            .get(job_id)
            .cloned())
    }

    async fn get_user_matches(
        &self,
        _user_id: &str,
        min_score: f64,
        limit: usize,
    ) -> Result<Vec<Job>> {
        let jobs = self.jobs.lock().expect("jobs lock poisoned");
        let mut matches: Vec<Job> = jobs
            .values()
            .filter(|job| job.match_score >= min_score)
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.match_score
                .partial_cmp(&a.match_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn record_application_status(
        &self,
        user_id: &str,
        job_id: &str,
        status: ApplicationStatus,
    ) -> Result<()> {
        self.statuses
            .lock()
            .expect("statuses lock poisoned")
            .insert((user_id.to_string(), job_id.to_string()), status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, score: f64) -> Job {
        Job {
            job_id: id.to_string(),
            title: format!("Job {}", id),
            match_score: score,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_job() {
        let store = InMemoryJobStore::new();
        store.insert_job(job("j1", 90.0));

        assert!(store.get_job("j1").await.unwrap().is_some());
        assert!(store.get_job("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_matches_filtered_and_ordered() {
        let store = InMemoryJobStore::new();
        store.insert_job(job("low", 50.0));
        store.insert_job(job("mid", 70.0));
        store.insert_job(job("high", 95.0));

        let matches = store.get_user_matches("u1", 60.0, 10).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid"]);

        let limited = store.get_user_matches("u1", 0.0, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_record_status() {
        let store = InMemoryJobStore::new();
        store
            .record_application_status("u1", "j1", ApplicationStatus::Submitted)
            .await
            .unwrap();
        assert_eq!(
            store.application_status("u1", "j1"),
            Some(ApplicationStatus::Submitted)
        );
    }
}

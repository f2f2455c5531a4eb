//! The in-memory authoritative index of live scheduled jobs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::job::Job;

/// Job index plus a secondary container index, kept consistent under one
/// lock. The reconciler is the sole writer; readers take snapshots and
/// must not hold them across mutations.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, Arc<Job>>,
    by_container: HashMap<String, HashSet<String>>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert a job. Returns `false` without touching anything when the
    /// job id is already present — first wins.
    pub fn add(&self, job: Arc<Job>) -> bool {
        let mut inner = self.inner.write().unwrap();
        if inner.jobs.contains_key(&job.id) {
            return false;
        }
        inner
            .by_container
            .entry(job.container_id.clone())
            .or_default()
            .insert(job.id.clone());
        inner.jobs.insert(job.id.clone(), job);
        true
    }

    /// Remove one job by id, returning it when it existed.
    pub fn remove(&self, job_id: &str) -> Option<Arc<Job>> {
        let mut inner = self.inner.write().unwrap();
        let job = inner.jobs.remove(job_id)?;
        if let Some(ids) = inner.by_container.get_mut(&job.container_id) {
            ids.remove(job_id);
            if ids.is_empty() {
                inner.by_container.remove(&job.container_id);
            }
        }
        Some(job)
    }

    /// Remove every job owned by `container_id`, returning them.
    pub fn remove_by_container(&self, container_id: &str) -> Vec<Arc<Job>> {
        let mut inner = self.inner.write().unwrap();
        let Some(ids) = inner.by_container.remove(container_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| inner.jobs.remove(id))
            .collect()
    }

    pub fn get(&self, job_id: &str) -> Option<Arc<Job>> {
        self.inner.read().unwrap().jobs.get(job_id).cloned()
    }

    /// Snapshot of all jobs, consistent with a single instant between
    /// mutations. Order is unspecified.
    pub fn all(&self) -> Vec<Arc<Job>> {
        self.inner.read().unwrap().jobs.values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.inner.read().unwrap().jobs.len()
    }
}

//! Worker pool for the data-movement phase.
//!
//! Work is split in two phases with a hard barrier between them:
//!
//! 1. The caller walks the ROM (or the listing) sequentially and submits one
//!    job per leaf item to a [`Batch`], keeping the returned [`Ticket`].
//! 2. [`Scheduler::run`] executes every job and only returns once all of
//!    them finished.  Results land in [`Slots`] indexed by ticket, so jobs
//!    never share mutable state.
//!
//! The first failing job fails the whole batch.
//!
//! With the `parallel` feature (default) jobs run on a dedicated Rayon pool;
//! without it they run in submission order on the calling thread.

use crate::error::{Error, Result};

/// Handle to one submitted job's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(usize);

/// Jobs queued for one data-movement phase.
#[derive(Debug)]
pub struct Batch<J> {
    jobs: Vec<J>,
}

impl<J> Default for Batch<J> {
    fn default() -> Self {
        Self { jobs: Vec::new() }
    }
}

impl<J> Batch<J> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, job: J) -> Ticket {
        self.jobs.push(job);
        Ticket(self.jobs.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Finished results, claimed once each by ticket.
#[derive(Debug)]
pub struct Slots<T> {
    slots: Vec<Option<T>>,
}

impl<T> Slots<T> {
    pub fn take(&mut self, ticket: Ticket) -> Result<T> {
        self.slots
            .get_mut(ticket.0)
            .and_then(Option::take)
            .ok_or_else(|| Error::Scheduler(format!("result {} missing or already taken", ticket.0)))
    }
}

pub struct Scheduler {
    jobs: usize,
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").field("jobs", &self.jobs).finish()
    }
}

impl Scheduler {
    /// `jobs == 0` sizes the pool by available parallelism.
    pub fn new(jobs: usize) -> Result<Self> {
        let jobs = if jobs == 0 {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            jobs
        };

        #[cfg(feature = "parallel")]
        {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .thread_name(|i| format!("mprom-worker-{i}"))
                .build()
                .map_err(|e| Error::Scheduler(e.to_string()))?;
            Ok(Self { jobs, pool })
        }

        #[cfg(not(feature = "parallel"))]
        {
            Ok(Self { jobs })
        }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Run every job in `batch` and wait for all of them.
    pub fn run<J, T, F>(&self, batch: Batch<J>, f: F) -> Result<Slots<T>>
    where
        J: Send,
        T: Send,
        F: Fn(J) -> Result<T> + Sync + Send,
    {
        let results = self.map(batch.jobs, f)?;
        Ok(Slots { slots: results.into_iter().map(Some).collect() })
    }

    /// Apply `f` to every item, keeping input order in the output.
    pub fn map<J, T, F>(&self, items: Vec<J>, f: F) -> Result<Vec<T>>
    where
        J: Send,
        T: Send,
        F: Fn(J) -> Result<T> + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            self.pool.install(|| items.into_par_iter().map(&f).collect())
        }

        #[cfg(not(feature = "parallel"))]
        {
            items.into_iter().map(f).collect()
        }
    }
}

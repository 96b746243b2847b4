//! Ordered parallel evaluation of grid lines.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{CamError, GeneratorSettings, Result};

/// Runs per-line work on rayon, one batch at a time.
///
/// Results come back in input order, so the caller can append them and
/// consult its progress callback between batches on its own thread.
pub(crate) struct Workers {
    pool: Option<ThreadPool>,
    batch_size: usize,
}

impl Workers {
    pub(crate) fn new(settings: &GeneratorSettings) -> Result<Self> {
        let pool = match settings.threads {
            Some(n) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| CamError::InvalidSettings(e.to_string()))?,
            ),
            None => None,
        };
        let threads = pool
            .as_ref()
            .map_or_else(rayon::current_num_threads, ThreadPool::current_num_threads);
        let batch_size = settings.batch_size.unwrap_or(threads).max(1);
        Ok(Self { pool, batch_size })
    }

    pub(crate) fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Map `f` over one batch in parallel, preserving order.
    pub(crate) fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        let run = || items.par_iter().map(&f).collect::<Vec<R>>();
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}

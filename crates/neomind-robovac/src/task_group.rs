//! Fan-out/fan-in task groups.
//!
//! A [`TaskGroup`] collects independent futures and drives them together on
//! the current task. Every task runs to completion even after a sibling has
//! failed; the group then reports the first failure it observed. Writes made
//! by tasks that succeeded are never undone.

use std::future::Future;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};

/// A named batch of independent tasks.
pub struct TaskGroup<'a, E> {
    name: &'static str,
    tasks: Vec<BoxFuture<'a, (String, Result<(), E>)>>,
}

impl<'a, E> TaskGroup<'a, E>
where
    E: std::fmt::Display + Send + 'a,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            tasks: Vec::new(),
        }
    }

    /// Add a task. Nothing runs until [`join`](Self::join) is awaited.
    pub fn spawn<F>(&mut self, label: impl Into<String>, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'a,
    {
        let label = label.into();
        self.tasks.push(Box::pin(async move { (label, task.await) }));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run all tasks concurrently and wait for every one of them.
    ///
    /// Returns the first error in completion order. A failure is reported
    /// only after the remaining tasks have finished: dropping them early
    /// would cancel their in-flight writes, so the caller trades failure
    /// latency for siblings that always complete.
    pub async fn join(self) -> Result<(), E> {
        let Self { name, tasks } = self;
        let total = tasks.len();
        let mut pending: FuturesUnordered<_> = tasks.into_iter().collect();
        let mut first_error = None;
        let mut failed = 0usize;

        while let Some((label, result)) = pending.next().await {
            match result {
                Ok(()) => tracing::trace!(group = name, task = %label, "Task completed"),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(group = name, task = %label, error = %e, "Task failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => {
                tracing::debug!(group = name, failed, total, "Task group failed");
                Err(e)
            }
            None => Ok(()),
        }
    }
}

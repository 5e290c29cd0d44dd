//! Stage channels and fixed-size worker pools.
//!
//! A stage is a bounded [`mpsc`] channel drained by `N` workers which share
//! its receiver. Each worker forwards zero or more results into the next
//! stage's channel through an [`Emitter`]. The output channel closes when
//! the last worker drops its emitter, which only happens once every worker
//! has returned.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::Instrument;

/// The receiving end of a stage channel.
///
/// Drain it to completion: workers feeding it block once it is full.
pub type StageReceiver<T> = mpsc::Receiver<T>;

pub(crate) fn channel<T>(capacity: usize) -> (mpsc::Sender<T>, StageReceiver<T>) {
    mpsc::channel(capacity.clamp(1, tokio::sync::Semaphore::MAX_PERMITS))
}

/// Push a finite sequence into a fresh stage channel from a background task.
///
/// The channel closes after the last item is sent.
pub(crate) fn feed<I>(stage: &'static str, items: I, capacity: usize) -> StageReceiver<I::Item>
where
    I: IntoIterator + Send + 'static,
    I::IntoIter: Send,
    I::Item: Send + 'static,
{
    let (tx, rx) = channel(capacity);
    tokio::spawn(
        async move {
            let mut offered = 0usize;
            for item in items {
                if tx.send(item).await.is_err() {
                    tracing::warn!(stage, offered, "stage closed before its input was fed");
                    return;
                }
                offered += 1;
            }
            tracing::debug!(stage, offered, "stage input fed");
        }
        .in_current_span(),
    );
    rx
}

/// Handle a worker uses to forward results downstream.
#[derive(Debug)]
pub(crate) struct Emitter<O> {
    tx: mpsc::Sender<O>,
}

impl<O> Clone for Emitter<O> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<O> Emitter<O> {
    /// Send one result downstream, waiting for capacity.
    ///
    /// Returns `false` if the downstream receiver has been dropped.
    pub(crate) async fn emit(&self, item: O) -> bool {
        self.tx.send(item).await.is_ok()
    }

    /// Whether the downstream receiver has been dropped.
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A fixed number of workers draining one stage channel.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerPool {
    stage: &'static str,
    workers: usize,
}

impl WorkerPool {
    /// A pool of `workers` workers for `stage`; at least one worker always runs.
    pub(crate) fn new(stage: &'static str, workers: usize) -> Self {
        Self {
            stage,
            workers: workers.max(1),
        }
    }

    /// Start the pool and return its output channel immediately.
    pub(crate) fn spawn<I, O, F, Fut>(
        self,
        input: StageReceiver<I>,
        capacity: usize,
        work: F,
    ) -> StageReceiver<O>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I, Emitter<O>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = channel(capacity);
        let workers = self.launch(input, tx, work);
        let stage = self.stage;

        // The JoinSet must outlive the workers: dropping it would abort them.
        tokio::spawn(
            async move {
                let processed = join(stage, workers).await;
                tracing::debug!(stage, processed, "stage complete");
            }
            .in_current_span(),
        );
        rx
    }

    fn launch<I, O, F, Fut>(
        self,
        input: StageReceiver<I>,
        tx: mpsc::Sender<O>,
        work: F,
    ) -> JoinSet<usize>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I, Emitter<O>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let input = Arc::new(Mutex::new(input));
        let work = Arc::new(work);
        let mut workers = JoinSet::new();

        for worker in 0..self.workers {
            let input = Arc::clone(&input);
            let work = Arc::clone(&work);
            let emitter = Emitter { tx: tx.clone() };
            let span = tracing::debug_span!("worker", stage = self.stage, worker);

            workers.spawn(
                async move {
                    let mut processed = 0usize;
                    loop {
                        // The lock is held only while waiting for the next item.
                        let next = input.lock().await.recv().await;
                        let Some(item) = next else {
                            break;
                        };
                        (*work)(item, emitter.clone()).await;
                        processed += 1;
                    }
                    tracing::debug!(processed, "worker finished");
                    processed
                }
                .instrument(span),
            );
        }

        workers
    }
}

async fn join(stage: &'static str, mut workers: JoinSet<usize>) -> usize {
    let mut processed = 0;
    while let Some(result) = workers.join_next().await {
        match result {
            Ok(count) => processed += count,
            Err(error) => tracing::error!(stage, %error, "worker task failed"),
        }
    }
    processed
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Barrier;

    use super::*;

    async fn drain<T>(mut rx: StageReceiver<T>) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = rx.recv().await {
            items.push(item);
        }
        items
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_item_is_processed_once() {
        let input = feed("numbers", 0..1000usize, 16);
        let output = WorkerPool::new("double", 8).spawn(input, 16, |n, emitter| async move {
            emitter.emit(n).await;
        });

        let seen = drain(output).await;
        assert_eq!(seen.len(), 1000);
        assert_eq!(seen.into_iter().collect::<BTreeSet<_>>(), (0..1000).collect());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn workers_may_emit_many_or_none() {
        let input = feed("numbers", 0..10usize, 4);
        let output = WorkerPool::new("fan", 3).spawn(input, 4, |n, emitter| async move {
            // odd numbers yield nothing, even numbers yield three items
            if n % 2 == 0 {
                for _ in 0..3 {
                    emitter.emit(n).await;
                }
            }
        });

        let seen = drain(output).await;
        assert_eq!(seen.len(), 15);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn workers_run_concurrently() {
        let workers = 4;
        let barrier = Arc::new(Barrier::new(workers));
        let input = feed("items", 0..workers, workers);

        let output = WorkerPool::new("barrier", workers).spawn(input, workers, move |n, emitter| {
            let barrier = Arc::clone(&barrier);
            async move {
                // Deadlocks unless every worker holds an item at the same time.
                barrier.wait().await;
                emitter.emit(n).await;
            }
        });

        let seen = tokio::time::timeout(Duration::from_secs(5), drain(output))
            .await
            .expect("workers did not run concurrently");
        assert_eq!(seen.len(), workers);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn output_closes_after_last_worker() {
        let finished = Arc::new(AtomicUsize::new(0));
        let input = feed("items", 0..20usize, 4);

        let counter = Arc::clone(&finished);
        let output = WorkerPool::new("slow", 4).spawn(input, 4, move |n, emitter| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis((n % 5) as u64)).await;
                emitter.emit(n).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let seen = drain(output).await;
        assert_eq!(seen.len(), 20);
        assert_eq!(finished.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn zero_workers_still_drains() {
        let input = feed("items", vec!["a", "b"], 1);
        let output = WorkerPool::new("single", 0).spawn(input, 1, |item, emitter| async move {
            emitter.emit(item).await;
        });
        assert_eq!(drain(output).await, ["a", "b"]);
    }

    #[tokio::test]
    async fn oversized_capacity_is_capped() {
        let input = feed("items", vec![1u8, 2], usize::MAX);
        let output = WorkerPool::new("big", 2).spawn(input, usize::MAX, |n, emitter| async move {
            emitter.emit(n).await;
        });
        assert_eq!(drain(output).await.len(), 2);
    }

    #[tokio::test]
    async fn emitter_sees_dropped_receiver() {
        let (tx, rx) = channel::<u8>(1);
        let emitter = Emitter { tx };
        assert!(!emitter.is_closed());
        drop(rx);
        assert!(emitter.is_closed());
        assert!(!emitter.emit(1).await);
    }

    #[tokio::test]
    async fn empty_input_closes_output() {
        let input = feed("items", Vec::<u8>::new(), 1);
        let output = WorkerPool::new("empty", 3).spawn(input, 1, |n, emitter| async move {
            emitter.emit(n).await;
        });
        assert!(drain(output).await.is_empty());
    }
}

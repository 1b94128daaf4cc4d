//! Serialized Durable Writer
//!
//! Single-consumer FIFO queue in front of the local store. Concurrent HTTP
//! handlers enqueue jobs without blocking; one background task applies them
//! in order, so the store only ever sees a single writer.
//!
//! The writer exposes one read-only signal: the delay between the most
//! recently dequeued job's enqueue time and its execution. It is returned on
//! every client write so load can be observed without separate telemetry.

use crate::cluster::types::Entry;
use crate::error::Result;
use crate::storage::store::KvStore;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Write,
    Delete,
}

#[derive(Debug)]
struct WriteJob {
    entry: Entry,
    kind: JobKind,
    enqueued_at: Instant,
}

pub struct DurableWriter {
    store: Arc<KvStore>,
    queue: Mutex<VecDeque<WriteJob>>,
    job_ready: Notify,
    delay_secs: AtomicU64,
}

impl DurableWriter {
    pub fn new(store: Arc<KvStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            queue: Mutex::new(VecDeque::new()),
            job_ready: Notify::new(),
            delay_secs: AtomicU64::new(0),
        })
    }

    /// Spawns the single consumer task.
    pub fn start(self: Arc<Self>) {
        tokio::spawn(async move {
            self.run().await;
        });
    }

    pub fn enqueue_write(&self, entry: Entry) {
        self.enqueue(entry, JobKind::Write);
    }

    pub fn enqueue_delete(&self, key: String) {
        self.enqueue(
            Entry {
                key,
                value: String::new(),
            },
            JobKind::Delete,
        );
    }

    fn enqueue(&self, entry: Entry, kind: JobKind) {
        self.queue.lock().push_back(WriteJob {
            entry,
            kind,
            enqueued_at: Instant::now(),
        });

        // Notify holds at most one permit, so a burst of enqueues collapses
        // into a single wake-up.
        self.job_ready.notify_one();
    }

    /// Seconds between enqueue and execution of the most recently applied job.
    pub fn approx_write_delay_secs(&self) -> u64 {
        self.delay_secs.load(Ordering::Relaxed)
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.lock().len()
    }

    async fn run(self: Arc<Self>) {
        tracing::info!("Durable writer started");

        loop {
            let next = self.queue.lock().pop_front();

            match next {
                Some(job) => {
                    self.delay_secs
                        .store(job.enqueued_at.elapsed().as_secs(), Ordering::Relaxed);

                    if let Err(e) = self.apply(&job) {
                        tracing::error!(
                            "Durable writer failed to apply {:?} for key {}: {}",
                            job.kind,
                            job.entry.key,
                            e
                        );
                    }
                }
                None => self.job_ready.notified().await,
            }
        }
    }

    fn apply(&self, job: &WriteJob) -> Result<()> {
        match job.kind {
            JobKind::Write => self.store.put(&job.entry),
            JobKind::Delete => self.store.delete(&job.entry.key),
        }
    }
}

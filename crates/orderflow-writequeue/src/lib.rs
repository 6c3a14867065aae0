//! Write-behind queue that decouples request latency from the throughput
//! ceiling of a backing store.
//!
//! Writes are buffered in memory and flushed in batches to a registered
//! processor, on a periodic timer and immediately whenever the buffer
//! reaches the batch size. A failed batch is retried per item: each item
//! in it is re-appended to the tail of the live buffer until its retries
//! are exhausted, at which point it moves to a dead-letter list for
//! caller-driven inspection and replay.
//!
//! [`enqueue`](WriteQueue::enqueue) is synchronous and never raises; a
//! full buffer is signalled by a `false` return (backpressure), which
//! callers must check. All failure handling happens inside the flush path
//! and is observable only via metrics, events, and the dead-letter drain.
//!
//! The buffer lives in process memory only: items buffered but not yet
//! flushed are lost on restart. Delivery is at-most-once across restarts,
//! not at-least-once.
//!
//! Retried items compete with fresh enqueues for future batches (tail
//! re-append), so processing order is only stable for items that succeed
//! on their first attempt; see [`WriteQueue::flush`].
//!
//! ## Usage
//!
//! One queue instance per persistence channel, shared by handle:
//!
//! ```rust
//! use orderflow_writequeue::{WriteQueue, WriteQueueConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let queue: WriteQueue<String> = WriteQueue::new(
//!     WriteQueueConfig::builder()
//!         .name("order-writes")
//!         .max_size(1000)
//!         .batch_size(50)
//!         .flush_interval(Duration::from_millis(500))
//!         .max_retries(3)
//!         .build(),
//! );
//!
//! queue.on_process(|batch: Vec<String>| async move {
//!     persist(batch).await // fully succeeds or fully fails the batch
//! });
//!
//! if !queue.enqueue("order-123".to_string()) {
//!     // buffer full: shed load or fall back to a synchronous write
//! }
//! # queue.stop();
//! # }
//! # async fn persist(_b: Vec<String>) -> Result<(), orderflow_core::BoxError> { Ok(()) }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate
//! - `tracing`: enables logging via the `tracing` crate

use crate::events::WriteQueueEvent;
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use orderflow_core::BoxError;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Instant;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub use config::{WriteQueueConfig, WriteQueueConfigBuilder};
pub use events::WriteQueueEvent as QueueEvent;

mod config;
mod events;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// An item buffered for asynchronous persistence.
#[derive(Debug, Clone)]
pub struct QueueItem<T> {
    /// Item id; auto-generated as `{queue-name}-{seq}` unless supplied.
    pub id: String,
    /// The opaque write payload.
    pub data: T,
    /// How many times this item has been re-queued after a failed batch.
    pub retries: u32,
    /// When the item was first enqueued.
    pub created_at: Instant,
}

/// Point-in-time snapshot of queue counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMetrics {
    /// Items accepted by `enqueue` over the queue's lifetime.
    pub enqueued: u64,
    /// Items processed successfully.
    pub processed: u64,
    /// Items that exhausted retries and were dead-lettered.
    pub failed: u64,
    /// Current buffer depth, including any in-flight batch.
    pub depth: usize,
    /// Current dead-letter list length.
    pub dead_letter_size: usize,
}

type Processor<T> = Arc<dyn Fn(Vec<T>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

struct QueueCore<T> {
    buffer: VecDeque<QueueItem<T>>,
    /// Items removed for an in-flight batch. They still count against
    /// `max_size` until their fate is decided, so the capacity bound holds
    /// while enqueues race a flush.
    in_flight: usize,
    dead_letter: Vec<QueueItem<T>>,
}

struct Inner<T> {
    config: WriteQueueConfig,
    core: StdMutex<QueueCore<T>>,
    processor: StdMutex<Option<Processor<T>>>,
    flushing: AtomicBool,
    wake: Notify,
    shutdown: Notify,
    stopped: AtomicBool,
    flusher_started: AtomicBool,
    flusher: StdMutex<Option<JoinHandle<()>>>,
    seq: AtomicU64,
    enqueued: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Clears the flush-in-progress flag when a flush ends, on every path out.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A cloneable handle to one shared write queue.
pub struct WriteQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + Sync + 'static> WriteQueue<T> {
    /// Creates a new empty queue. Flushing starts when a processor is
    /// registered via [`on_process`](Self::on_process).
    pub fn new(config: WriteQueueConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!("writequeue_enqueued_total", "Items accepted into the buffer");
            describe_counter!(
                "writequeue_rejected_total",
                "Enqueues rejected because the buffer was full"
            );
            describe_counter!("writequeue_processed_total", "Items processed successfully");
            describe_counter!(
                "writequeue_dead_lettered_total",
                "Items moved to the dead-letter list after exhausting retries"
            );
            describe_gauge!("writequeue_depth", "Current buffer depth");
            describe_histogram!(
                "writequeue_flush_duration_seconds",
                "Duration of processor invocations"
            );
        });

        Self {
            inner: Arc::new(Inner {
                config,
                core: StdMutex::new(QueueCore {
                    buffer: VecDeque::new(),
                    in_flight: 0,
                    dead_letter: Vec::new(),
                }),
                processor: StdMutex::new(None),
                flushing: AtomicBool::new(false),
                wake: Notify::new(),
                shutdown: Notify::new(),
                stopped: AtomicBool::new(false),
                flusher_started: AtomicBool::new(false),
                flusher: StdMutex::new(None),
                seq: AtomicU64::new(0),
                enqueued: AtomicU64::new(0),
                processed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the name of this queue.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Appends a write payload with an auto-generated id.
    ///
    /// Synchronous and non-blocking: never suspends, never raises.
    /// Returns `false` when the buffer (including any in-flight batch) is
    /// at capacity; this is the sole backpressure signal, and callers
    /// must check it. Reaching the batch size wakes the flusher
    /// immediately.
    pub fn enqueue(&self, data: T) -> bool {
        let id = format!(
            "{}-{}",
            self.inner.config.name,
            self.inner.seq.fetch_add(1, Ordering::Relaxed)
        );
        self.enqueue_with_id(id, data)
    }

    /// Like [`enqueue`](Self::enqueue), with a caller-supplied id.
    pub fn enqueue_with_id(&self, id: impl Into<String>, data: T) -> bool {
        let (depth, reached_batch) = {
            let mut core = self.inner.core.lock().expect("queue lock poisoned");
            if core.buffer.len() + core.in_flight >= self.inner.config.max_size {
                drop(core);
                self.inner
                    .config
                    .event_listeners
                    .emit(&WriteQueueEvent::EnqueueRejected {
                        source: self.inner.config.name.clone(),
                        timestamp: Instant::now(),
                    });

                #[cfg(feature = "tracing")]
                tracing::debug!(queue = %self.inner.config.name, "enqueue rejected (buffer full)");

                #[cfg(feature = "metrics")]
                counter!("writequeue_rejected_total", "writequeue" => self.inner.config.name.clone())
                    .increment(1);

                return false;
            }

            core.buffer.push_back(QueueItem {
                id: id.into(),
                data,
                retries: 0,
                created_at: Instant::now(),
            });
            (
                core.buffer.len() + core.in_flight,
                core.buffer.len() >= self.inner.config.batch_size,
            )
        };

        self.inner.enqueued.fetch_add(1, Ordering::Relaxed);
        self.inner
            .config
            .event_listeners
            .emit(&WriteQueueEvent::ItemEnqueued {
                source: self.inner.config.name.clone(),
                timestamp: Instant::now(),
                depth,
            });

        #[cfg(feature = "metrics")]
        {
            counter!("writequeue_enqueued_total", "writequeue" => self.inner.config.name.clone())
                .increment(1);
            gauge!("writequeue_depth", "writequeue" => self.inner.config.name.clone())
                .set(depth as f64);
        }

        if reached_batch {
            self.inner.wake.notify_one();
        }
        true
    }

    /// Registers the batch processor and starts the periodic flush task.
    ///
    /// The processor receives a plain list of payloads (not item wrappers)
    /// and must fully succeed or fully fail the batch. Calling again
    /// replaces the processor; the flush task is started once. Must be
    /// called inside a tokio runtime.
    pub fn on_process<F, Fut>(&self, processor: F)
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let wrapped: Processor<T> = Arc::new(move |batch| Box::pin(processor(batch)));
        *self
            .inner
            .processor
            .lock()
            .expect("processor lock poisoned") = Some(wrapped);

        if !self.inner.flusher_started.swap(true, Ordering::AcqRel) {
            let handle = spawn_flusher(&self.inner);
            *self.inner.flusher.lock().expect("flusher lock poisoned") = Some(handle);
        }
    }

    /// Flushes one batch now.
    ///
    /// A no-op when a flush is already in progress, the buffer is empty,
    /// or no processor is registered. On processor failure the whole batch
    /// fails atomically: each item is either re-appended to the tail of
    /// the live buffer (where it competes with fresh enqueues, so a
    /// retried item can be starved under sustained load) or dead-lettered
    /// once its retries are exhausted.
    pub async fn flush(&self) {
        self.inner.flush_once().await;
    }

    /// Atomically returns and clears the dead-letter list.
    pub fn drain_dead_letter(&self) -> Vec<QueueItem<T>> {
        let mut core = self.inner.core.lock().expect("queue lock poisoned");
        std::mem::take(&mut core.dead_letter)
    }

    /// Ends the periodic flush task. Idempotent; an in-flight flush
    /// completes. Buffered items remain addressable via
    /// [`flush`](Self::flush) and [`depth`](Self::depth), but no further
    /// automatic flushing occurs.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        // notify_one stores a permit, so a flusher not currently waiting
        // still observes the shutdown on its next wait.
        self.inner.shutdown.notify_one();
    }

    /// Current buffer depth, including any in-flight batch.
    pub fn depth(&self) -> usize {
        let core = self.inner.core.lock().expect("queue lock poisoned");
        core.buffer.len() + core.in_flight
    }

    /// Current dead-letter list length.
    pub fn dead_letter_size(&self) -> usize {
        self.inner
            .core
            .lock()
            .expect("queue lock poisoned")
            .dead_letter
            .len()
    }

    /// Returns a snapshot of the queue's counters.
    pub fn metrics(&self) -> QueueMetrics {
        let core = self.inner.core.lock().expect("queue lock poisoned");
        QueueMetrics {
            enqueued: self.inner.enqueued.load(Ordering::Relaxed),
            processed: self.inner.processed.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            depth: core.buffer.len() + core.in_flight,
            dead_letter_size: core.dead_letter.len(),
        }
    }
}

impl<T> Clone for WriteQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for WriteQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteQueue")
            .field("name", &self.inner.config.name)
            .finish()
    }
}

fn spawn_flusher<T: Clone + Send + Sync + 'static>(inner: &Arc<Inner<T>>) -> JoinHandle<()> {
    let weak: Weak<Inner<T>> = Arc::downgrade(inner);
    let interval = inner.config.flush_interval;

    tokio::spawn(async move {
        loop {
            let Some(inner) = weak.upgrade() else { break };
            if inner.stopped.load(Ordering::Acquire) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = inner.wake.notified() => {}
                _ = inner.shutdown.notified() => break,
            }
            if inner.stopped.load(Ordering::Acquire) {
                break;
            }

            inner.flush_once().await;
        }
    })
}

impl<T: Clone + Send + Sync + 'static> Inner<T> {
    async fn flush_once(&self) {
        let processor = {
            self.processor
                .lock()
                .expect("processor lock poisoned")
                .clone()
        };
        let Some(processor) = processor else { return };

        if self.flushing.swap(true, Ordering::AcqRel) {
            return; // a flush is already in progress
        }
        let _guard = FlushGuard(&self.flushing);

        let batch: Vec<QueueItem<T>> = {
            let mut core = self.core.lock().expect("queue lock poisoned");
            if core.buffer.is_empty() {
                return;
            }
            let n = core.buffer.len().min(self.config.batch_size);
            let drained: Vec<QueueItem<T>> = core.buffer.drain(..n).collect();
            core.in_flight = drained.len();
            drained
        };

        let payloads: Vec<T> = batch.iter().map(|item| item.data.clone()).collect();
        let start = Instant::now();
        let result = (processor)(payloads).await;
        let duration = start.elapsed();

        #[cfg(feature = "metrics")]
        histogram!("writequeue_flush_duration_seconds", "writequeue" => self.config.name.clone())
            .record(duration.as_secs_f64());

        match result {
            Ok(()) => {
                let size = batch.len();
                self.processed.fetch_add(size as u64, Ordering::Relaxed);

                let (depth, retrigger) = {
                    let mut core = self.core.lock().expect("queue lock poisoned");
                    core.in_flight = 0;
                    (
                        core.buffer.len(),
                        core.buffer.len() >= self.config.batch_size,
                    )
                };

                self.config
                    .event_listeners
                    .emit(&WriteQueueEvent::BatchFlushed {
                        source: self.config.name.clone(),
                        timestamp: Instant::now(),
                        size,
                        duration,
                    });

                #[cfg(feature = "tracing")]
                tracing::debug!(queue = %self.config.name, size, ?duration, "batch flushed");

                #[cfg(feature = "metrics")]
                {
                    counter!("writequeue_processed_total", "writequeue" => self.config.name.clone())
                        .increment(size as u64);
                    gauge!("writequeue_depth", "writequeue" => self.config.name.clone())
                        .set(depth as f64);
                }

                if retrigger {
                    self.wake.notify_one();
                }
            }
            Err(_err) => {
                let size = batch.len();
                self.config
                    .event_listeners
                    .emit(&WriteQueueEvent::BatchFailed {
                        source: self.config.name.clone(),
                        timestamp: Instant::now(),
                        size,
                    });

                #[cfg(feature = "tracing")]
                tracing::warn!(queue = %self.config.name, size, "batch processing failed");

                // Batch failure is atomic: every item is retried or
                // dead-lettered according to its own count. Events are
                // collected under the lock and emitted after it drops.
                let mut dead_lettered: Vec<u32> = Vec::new();
                {
                    let mut core = self.core.lock().expect("queue lock poisoned");
                    core.in_flight = 0;
                    for mut item in batch {
                        if item.retries >= self.config.max_retries {
                            self.failed.fetch_add(1, Ordering::Relaxed);
                            dead_lettered.push(item.retries);
                            core.dead_letter.push(item);
                        } else {
                            item.retries += 1;
                            core.buffer.push_back(item);
                        }
                    }
                }

                for retries in dead_lettered {
                    self.config
                        .event_listeners
                        .emit(&WriteQueueEvent::ItemDeadLettered {
                            source: self.config.name.clone(),
                            timestamp: Instant::now(),
                            retries,
                        });

                    #[cfg(feature = "metrics")]
                    counter!("writequeue_dead_lettered_total", "writequeue" => self.config.name.clone())
                        .increment(1);

                    #[cfg(feature = "tracing")]
                    tracing::warn!(queue = %self.config.name, retries, "item dead-lettered");
                }
            }
        }
    }
}

use orderflow_core::FlowEvent;
use std::time::{Duration, Instant};

/// Events emitted by the write queue.
#[derive(Debug, Clone)]
pub enum WriteQueueEvent {
    /// An item was accepted into the buffer.
    ItemEnqueued {
        source: String,
        timestamp: Instant,
        /// Buffer depth after the append.
        depth: usize,
    },
    /// An enqueue was rejected because the buffer is full (backpressure).
    EnqueueRejected { source: String, timestamp: Instant },
    /// A batch was processed successfully.
    BatchFlushed {
        source: String,
        timestamp: Instant,
        size: usize,
        duration: Duration,
    },
    /// The processor failed a batch; every item in it is retried or
    /// dead-lettered per its own retry count.
    BatchFailed {
        source: String,
        timestamp: Instant,
        size: usize,
    },
    /// An item exhausted its retries and was moved to the dead-letter list.
    ItemDeadLettered {
        source: String,
        timestamp: Instant,
        retries: u32,
    },
}

impl FlowEvent for WriteQueueEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WriteQueueEvent::ItemEnqueued { .. } => "item_enqueued",
            WriteQueueEvent::EnqueueRejected { .. } => "enqueue_rejected",
            WriteQueueEvent::BatchFlushed { .. } => "batch_flushed",
            WriteQueueEvent::BatchFailed { .. } => "batch_failed",
            WriteQueueEvent::ItemDeadLettered { .. } => "item_dead_lettered",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            WriteQueueEvent::ItemEnqueued { timestamp, .. }
            | WriteQueueEvent::EnqueueRejected { timestamp, .. }
            | WriteQueueEvent::BatchFlushed { timestamp, .. }
            | WriteQueueEvent::BatchFailed { timestamp, .. }
            | WriteQueueEvent::ItemDeadLettered { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            WriteQueueEvent::ItemEnqueued { source, .. }
            | WriteQueueEvent::EnqueueRejected { source, .. }
            | WriteQueueEvent::BatchFlushed { source, .. }
            | WriteQueueEvent::BatchFailed { source, .. }
            | WriteQueueEvent::ItemDeadLettered { source, .. } => source,
        }
    }
}

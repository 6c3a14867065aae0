use crate::events::WriteQueueEvent;
use orderflow_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a write queue instance.
pub struct WriteQueueConfig {
    pub(crate) name: String,
    pub(crate) max_size: usize,
    pub(crate) flush_interval: Duration,
    pub(crate) batch_size: usize,
    pub(crate) max_retries: u32,
    pub(crate) event_listeners: EventListeners<WriteQueueEvent>,
}

impl WriteQueueConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> WriteQueueConfigBuilder {
        WriteQueueConfigBuilder::new()
    }
}

/// Builder for [`WriteQueueConfig`].
pub struct WriteQueueConfigBuilder {
    name: String,
    max_size: usize,
    flush_interval: Duration,
    batch_size: usize,
    max_retries: u32,
    event_listeners: EventListeners<WriteQueueEvent>,
}

impl WriteQueueConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            max_size: 1000,
            flush_interval: Duration::from_secs(1),
            batch_size: 50,
            max_retries: 3,
            event_listeners: EventListeners::new(),
        }
    }

    /// Give this queue a human-readable name for observability. The name
    /// also prefixes auto-generated item ids.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Sets the buffer capacity; enqueues beyond it return `false`.
    ///
    /// Values below 1 are clamped to 1 in [`build`](Self::build).
    ///
    /// Default: 1000
    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    /// Sets the periodic flush interval.
    ///
    /// Default: 1 second
    pub fn flush_interval(mut self, duration: Duration) -> Self {
        self.flush_interval = duration;
        self
    }

    /// Sets the maximum number of items removed from the buffer per flush.
    /// Reaching this depth also triggers an immediate flush.
    ///
    /// Values below 1 are clamped to 1 in [`build`](Self::build).
    ///
    /// Default: 50
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    /// Sets how many times a failed item is re-queued before it is moved
    /// to the dead-letter list.
    ///
    /// Default: 3
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Registers a callback when an item is dead-lettered.
    pub fn on_dead_letter<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &WriteQueueEvent| {
                if let WriteQueueEvent::ItemDeadLettered { retries, .. } = event {
                    f(*retries);
                }
            }));
        self
    }

    /// Registers a callback when an enqueue is rejected for capacity.
    pub fn on_enqueue_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &WriteQueueEvent| {
                if matches!(event, WriteQueueEvent::EnqueueRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Adds a listener receiving every queue event.
    pub fn event_listener<L>(mut self, listener: L) -> Self
    where
        L: orderflow_core::EventListener<WriteQueueEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Builds the configuration, clamping out-of-range values.
    pub fn build(self) -> WriteQueueConfig {
        WriteQueueConfig {
            name: self.name,
            max_size: self.max_size.max(1),
            flush_interval: self.flush_interval,
            batch_size: self.batch_size.max(1),
            max_retries: self.max_retries,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for WriteQueueConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

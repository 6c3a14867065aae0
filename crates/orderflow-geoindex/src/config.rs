use crate::events::GeoIndexEvent;
use orderflow_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a geospatial index instance.
pub struct GeoIndexConfig {
    pub(crate) name: String,
    pub(crate) precision: u8,
    pub(crate) stale_after: Duration,
    pub(crate) event_listeners: EventListeners<GeoIndexEvent>,
}

impl GeoIndexConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> GeoIndexConfigBuilder {
        GeoIndexConfigBuilder::new()
    }
}

/// Builder for [`GeoIndexConfig`].
pub struct GeoIndexConfigBuilder {
    name: String,
    precision: u8,
    stale_after: Duration,
    event_listeners: EventListeners<GeoIndexEvent>,
}

impl GeoIndexConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            precision: 6,
            stale_after: Duration::from_secs(10 * 60),
            event_listeners: EventListeners::new(),
        }
    }

    /// Give this index a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Sets the geohash precision entities are stored at (clamped to
    /// 1..=12 in [`build`](Self::build)). 6 chars is roughly 1.2 km cells.
    ///
    /// Default: 6
    pub fn precision(mut self, precision: u8) -> Self {
        self.precision = precision;
        self
    }

    /// Sets how long an entity may go without an upsert before the
    /// periodic sweep evicts it.
    ///
    /// Default: 10 minutes
    pub fn stale_after(mut self, duration: Duration) -> Self {
        self.stale_after = duration;
        self
    }

    /// Registers a callback when a sweep evicts stale entities.
    pub fn on_stale_sweep<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &GeoIndexEvent| {
                if let GeoIndexEvent::StaleSweep { evicted, .. } = event {
                    f(*evicted);
                }
            }));
        self
    }

    /// Adds a listener receiving every index event.
    pub fn event_listener<L>(mut self, listener: L) -> Self
    where
        L: orderflow_core::EventListener<GeoIndexEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Builds the configuration, clamping out-of-range values.
    pub fn build(self) -> GeoIndexConfig {
        GeoIndexConfig {
            name: self.name,
            precision: self.precision.clamp(1, 12),
            stale_after: self.stale_after,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for GeoIndexConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

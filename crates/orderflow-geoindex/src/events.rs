use orderflow_core::FlowEvent;
use std::time::Instant;

/// Events emitted by the geospatial index.
#[derive(Debug, Clone)]
pub enum GeoIndexEvent {
    /// An entity was inserted or updated.
    EntityUpserted {
        source: String,
        timestamp: Instant,
        /// True when the upsert placed the entity in a different cell
        /// (including first insertion).
        moved_cell: bool,
    },
    /// An entity was explicitly removed.
    EntityRemoved { source: String, timestamp: Instant },
    /// A proximity query was answered.
    ProximityQuery {
        source: String,
        timestamp: Instant,
        /// Number of covering cells visited.
        cells: usize,
        /// Number of candidates returned (before caller-side distance filtering).
        candidates: usize,
    },
    /// A periodic sweep evicted stale entities.
    StaleSweep {
        source: String,
        timestamp: Instant,
        evicted: usize,
    },
}

impl FlowEvent for GeoIndexEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GeoIndexEvent::EntityUpserted { .. } => "entity_upserted",
            GeoIndexEvent::EntityRemoved { .. } => "entity_removed",
            GeoIndexEvent::ProximityQuery { .. } => "proximity_query",
            GeoIndexEvent::StaleSweep { .. } => "stale_sweep",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            GeoIndexEvent::EntityUpserted { timestamp, .. }
            | GeoIndexEvent::EntityRemoved { timestamp, .. }
            | GeoIndexEvent::ProximityQuery { timestamp, .. }
            | GeoIndexEvent::StaleSweep { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            GeoIndexEvent::EntityUpserted { source, .. }
            | GeoIndexEvent::EntityRemoved { source, .. }
            | GeoIndexEvent::ProximityQuery { source, .. }
            | GeoIndexEvent::StaleSweep { source, .. } => source,
        }
    }
}

//! In-memory geospatial index that turns "find suppliers near me" from a
//! full scan into a bounded lookup.
//!
//! Entity positions are bucketed by geohash cell at a fixed precision;
//! proximity queries visit only the cells covering the query radius and
//! return a conservative candidate set. The candidate set over-covers but
//! never under-covers (for reasonable radii): callers compute the exact
//! great-circle distance with [`haversine_km`] and discard anything
//! outside the radius.
//!
//! Entities idle longer than the configured staleness threshold are
//! evicted by a periodic background sweep, so offline suppliers don't
//! permanently pollute cells.
//!
//! All index contents live in process memory only. After a restart an
//! empty index means "cold start", not "no entities exist", and callers
//! must repopulate from the backing store (typically through a circuit
//! breaker).
//!
//! ## Usage
//!
//! One index instance per indexed domain, shared by handle:
//!
//! ```rust
//! use orderflow_geoindex::{haversine_km, GeoIndexConfig, GeoSpatialIndex};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let index: GeoSpatialIndex<u64> = GeoSpatialIndex::new(
//!     GeoIndexConfig::builder()
//!         .name("suppliers")
//!         .precision(6)
//!         .stale_after(Duration::from_secs(600))
//!         .build(),
//! );
//!
//! index.upsert("supplier-1", 28.6139, 77.2090, 42);
//!
//! let radius_km = 5.0;
//! let nearby: Vec<_> = index
//!     .find_nearby(28.61, 77.21, radius_km)
//!     .into_iter()
//!     // The index returns candidates; the exact check is the caller's.
//!     .filter(|e| haversine_km(28.61, 77.21, e.lat, e.lng) <= radius_km)
//!     .collect();
//! # assert_eq!(nearby.len(), 1);
//! # }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate
//! - `tracing`: enables logging via the `tracing` crate

use crate::events::GeoIndexEvent;
use crate::index::IndexCore;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock, Weak};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

pub use config::{GeoIndexConfig, GeoIndexConfigBuilder};
pub use events::GeoIndexEvent as IndexEvent;
pub use geohash::{
    covering_cells, decode, encode, haversine_km, neighbors, precision_for_radius, Decoded,
};
pub use index::IndexedEntity;

mod config;
mod events;
pub mod geohash;
mod index;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Floor for the sweep cadence so tiny staleness thresholds don't spin.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(50);

/// A cloneable handle to one shared geospatial index.
///
/// Operations are synchronous, in-memory, and never suspend; the state
/// lives behind a `std::sync::RwLock` with short critical sections.
///
/// Must be constructed inside a tokio runtime: construction spawns the
/// periodic stale-eviction task. The task holds only a weak reference, so
/// dropping every handle also ends the sweep; [`stop`](Self::stop) ends it
/// explicitly.
pub struct GeoSpatialIndex<P> {
    shared: Arc<Shared<P>>,
}

struct Shared<P> {
    config: GeoIndexConfig,
    core: RwLock<IndexCore<P>>,
    sweeper: StdMutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl<P: Clone + Send + Sync + 'static> GeoSpatialIndex<P> {
    /// Creates a new empty index and starts its stale-eviction sweep.
    ///
    /// The sweep runs every `stale_after / 2` (floored at 50 ms).
    pub fn new(config: GeoIndexConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_gauge!("geoindex_entities", "Number of live entities in the index");
            describe_gauge!("geoindex_cells", "Number of non-empty geohash cells");
            describe_counter!(
                "geoindex_queries_total",
                "Total number of proximity queries answered"
            );
            describe_counter!(
                "geoindex_evicted_total",
                "Total number of entities evicted as stale"
            );
        });

        let shared = Arc::new(Shared {
            core: RwLock::new(IndexCore::new(config.precision)),
            config,
            sweeper: StdMutex::new(None),
            stopped: AtomicBool::new(false),
        });

        let handle = Self::spawn_sweeper(&shared);
        *shared.sweeper.lock().expect("sweeper lock poisoned") = Some(handle);

        Self { shared }
    }

    /// Inserts or updates an entity's position and payload.
    ///
    /// If the entity already exists in a different cell it is removed from
    /// the old cell first (deleting the cell if emptied), then inserted
    /// into the new one. Refreshes the entity's staleness clock. O(1)
    /// amortized.
    pub fn upsert(&self, id: impl Into<String>, lat: f64, lng: f64, payload: P) {
        let moved = {
            let mut core = self.shared.core.write().expect("index lock poisoned");
            core.upsert(id.into(), lat, lng, payload)
        };

        self.shared
            .config
            .event_listeners
            .emit(&GeoIndexEvent::EntityUpserted {
                source: self.shared.config.name.clone(),
                timestamp: Instant::now(),
                moved_cell: moved,
            });

        #[cfg(feature = "metrics")]
        self.record_size_gauges();
    }

    /// Removes an entity, returning whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        let existed = {
            let mut core = self.shared.core.write().expect("index lock poisoned");
            core.remove(id)
        };

        if existed {
            self.shared
                .config
                .event_listeners
                .emit(&GeoIndexEvent::EntityRemoved {
                    source: self.shared.config.name.clone(),
                    timestamp: Instant::now(),
                });

            #[cfg(feature = "metrics")]
            self.record_size_gauges();
        }
        existed
    }

    /// Returns a clone of the entity, if indexed.
    pub fn get(&self, id: &str) -> Option<IndexedEntity<P>> {
        self.shared
            .core
            .read()
            .expect("index lock poisoned")
            .get(id)
            .cloned()
    }

    /// Returns the candidate entities for a disk of `radius_km` around the
    /// point.
    ///
    /// Only the geohash cells covering the radius are visited. The result
    /// is conservative: it may include entities outside the radius (the
    /// caller applies [`haversine_km`]), but for reasonable radii it never
    /// misses one inside it.
    pub fn find_nearby(&self, lat: f64, lng: f64, radius_km: f64) -> Vec<IndexedEntity<P>> {
        self.find_nearby_filtered(lat, lng, radius_km, |_| true)
    }

    /// Like [`find_nearby`](Self::find_nearby), with an inline predicate
    /// over each candidate's payload.
    pub fn find_nearby_filtered<F>(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
        filter: F,
    ) -> Vec<IndexedEntity<P>>
    where
        F: Fn(&P) -> bool,
    {
        let cells = geohash::covering_cells(lat, lng, radius_km, self.shared.config.precision);

        let candidates: Vec<IndexedEntity<P>> = {
            let core = self.shared.core.read().expect("index lock poisoned");
            core.candidates(&cells)
                .into_iter()
                .filter(|e| filter(&e.payload))
                .cloned()
                .collect()
        };

        self.shared
            .config
            .event_listeners
            .emit(&GeoIndexEvent::ProximityQuery {
                source: self.shared.config.name.clone(),
                timestamp: Instant::now(),
                cells: cells.len(),
                candidates: candidates.len(),
            });

        #[cfg(feature = "tracing")]
        tracing::trace!(
            index = %self.shared.config.name,
            cells = cells.len(),
            candidates = candidates.len(),
            "proximity query"
        );

        #[cfg(feature = "metrics")]
        counter!("geoindex_queries_total", "geoindex" => self.shared.config.name.clone())
            .increment(1);

        candidates
    }

    /// Returns the number of live entities.
    pub fn len(&self) -> usize {
        self.shared.core.read().expect("index lock poisoned").len()
    }

    /// Returns true if no entities are indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.shared
            .core
            .read()
            .expect("index lock poisoned")
            .cell_count()
    }

    /// Halts the periodic stale-eviction sweep. Idempotent; the index
    /// itself stays fully usable.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        if let Some(handle) = self
            .shared
            .sweeper
            .lock()
            .expect("sweeper lock poisoned")
            .take()
        {
            handle.abort();
        }
    }

    fn spawn_sweeper(shared: &Arc<Shared<P>>) -> JoinHandle<()> {
        let weak: Weak<Shared<P>> = Arc::downgrade(shared);
        let interval = (shared.config.stale_after / 2).max(MIN_SWEEP_INTERVAL);
        let stale_after = shared.config.stale_after;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // the first tick fires immediately

            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else { break };
                if shared.stopped.load(Ordering::Acquire) {
                    break;
                }

                let evicted = {
                    let mut core = shared.core.write().expect("index lock poisoned");
                    core.sweep_stale(stale_after)
                };

                if evicted > 0 {
                    shared
                        .config
                        .event_listeners
                        .emit(&GeoIndexEvent::StaleSweep {
                            source: shared.config.name.clone(),
                            timestamp: Instant::now(),
                            evicted,
                        });

                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        index = %shared.config.name,
                        evicted,
                        "evicted stale entities"
                    );

                    #[cfg(feature = "metrics")]
                    {
                        counter!("geoindex_evicted_total", "geoindex" => shared.config.name.clone())
                            .increment(evicted as u64);
                        let core = shared.core.read().expect("index lock poisoned");
                        gauge!("geoindex_entities", "geoindex" => shared.config.name.clone())
                            .set(core.len() as f64);
                        gauge!("geoindex_cells", "geoindex" => shared.config.name.clone())
                            .set(core.cell_count() as f64);
                    }
                }
            }
        })
    }

    #[cfg(feature = "metrics")]
    fn record_size_gauges(&self) {
        let core = self.shared.core.read().expect("index lock poisoned");
        gauge!("geoindex_entities", "geoindex" => self.shared.config.name.clone())
            .set(core.len() as f64);
        gauge!("geoindex_cells", "geoindex" => self.shared.config.name.clone())
            .set(core.cell_count() as f64);
    }
}

impl<P> Clone for GeoSpatialIndex<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P> std::fmt::Debug for GeoSpatialIndex<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoSpatialIndex")
            .field("name", &self.shared.config.name)
            .field("precision", &self.shared.config.precision)
            .finish()
    }
}

//! In-process resilience and dispatch primitives for services that sit
//! between latency-sensitive callers and a slow or flaky backing store.
//!
//! `orderflow` bundles three independently useful components. Each is
//! available as both an individual crate and as a feature in this
//! meta-crate.
//!
//! # Components
//!
//! - **Circuit Breaker** (`circuitbreaker` feature): stops calling a
//!   failing dependency after consecutive failures, probes recovery with
//!   exponential backoff, and prefers fallbacks over raised errors
//! - **Geo Index** (`geoindex` feature): geohash-bucketed in-memory
//!   index answering "what's near this point?" without a full scan
//! - **Write Queue** (`writequeue` feature): bounded write-behind buffer
//!   with batched flushing, per-item retry, and dead-lettering
//!
//! # Usage
//!
//! Enable specific components via features:
//!
//! ```toml
//! [dependencies]
//! orderflow = { version = "0.3", features = ["circuitbreaker", "geoindex"] }
//! ```
//!
//! Or enable all of them:
//!
//! ```toml
//! [dependencies]
//! orderflow = { version = "0.3", features = ["full"] }
//! ```
//!
//! # Composing a read-through lookup
//!
//! The components are designed to stack. A typical proximity read
//! consults the index first and falls back to the store through the
//! breaker, re-warming the index from whatever comes back:
//!
//! ```rust,no_run
//! # #[cfg(all(feature = "circuitbreaker", feature = "geoindex"))]
//! # {
//! use orderflow::circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
//! use orderflow::geoindex::{haversine_km, GeoIndexConfig, GeoSpatialIndex};
//!
//! # #[derive(Clone)] struct Supplier { id: String, lat: f64, lng: f64 }
//! # async fn query_store(_lat: f64, _lng: f64) -> Result<Vec<Supplier>, std::io::Error> { Ok(vec![]) }
//! # async fn example() {
//! let index: GeoSpatialIndex<Supplier> =
//!     GeoSpatialIndex::new(GeoIndexConfig::builder().name("suppliers").build());
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::builder().name("supplier-store").build(),
//! );
//!
//! let (lat, lng, radius_km) = (28.6139, 77.2090, 5.0);
//! let hits: Vec<Supplier> = index
//!     .find_nearby(lat, lng, radius_km)
//!     .into_iter()
//!     .filter(|e| haversine_km(lat, lng, e.lat, e.lng) <= radius_km)
//!     .map(|e| e.payload)
//!     .collect();
//!
//! if hits.is_empty() {
//!     // Index miss (or cold start): go to the store, but only if the
//!     // breaker allows it. An open breaker degrades to an empty result
//!     // instead of hammering a down store.
//!     let fetched = breaker
//!         .execute_with_fallback(move || query_store(lat, lng), Vec::new)
//!         .await;
//!     for s in &fetched {
//!         index.upsert(s.id.clone(), s.lat, s.lng, s.clone());
//!     }
//! }
//! # }
//! # }
//! ```
//!
//! # Individual Crates
//!
//! Each component is also available standalone for minimal dependencies:
//!
//! - `orderflow-circuitbreaker`
//! - `orderflow-geoindex`
//! - `orderflow-writequeue`
//! - `orderflow-core` (shared event and registry infrastructure)

// Re-export core (always available)
pub use orderflow_core as core;

// Re-export components based on features
#[cfg(feature = "circuitbreaker")]
pub use orderflow_circuitbreaker as circuitbreaker;

#[cfg(feature = "geoindex")]
pub use orderflow_geoindex as geoindex;

#[cfg(feature = "writequeue")]
pub use orderflow_writequeue as writequeue;

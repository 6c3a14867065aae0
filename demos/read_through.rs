//! Read-through proximity lookups: geo index in front of a breaker-guarded
//! store.
//!
//! Queries hit the in-memory geospatial index first; on a miss (or cold
//! start) the backing store answers through the circuit breaker and the
//! results re-warm the index. A store outage degrades to whatever the
//! index still holds instead of cascading errors.
//!
//! Run with: cargo run --example read_through

use orderflow_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
use orderflow_core::BoxError;
use orderflow_geoindex::{haversine_km, GeoIndexConfig, GeoSpatialIndex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
struct Supplier {
    id: String,
    lat: f64,
    lng: f64,
}

struct Store {
    available: AtomicBool,
    reads: AtomicUsize,
}

impl Store {
    async fn query_near(&self, lat: f64, lng: f64, radius_km: f64) -> Result<Vec<Supplier>, BoxError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_millis(30)).await; // simulated round trip
        if !self.available.load(Ordering::SeqCst) {
            return Err("store unavailable".into());
        }
        // A tiny fixed fleet around Connaught Place, Delhi.
        let fleet = [
            ("cp-kitchen", 28.6315, 77.2167),
            ("khan-market", 28.6003, 77.2270),
            ("gurgaon-hub", 28.4595, 77.0266), // ~25 km out
        ];
        Ok(fleet
            .iter()
            .filter(|(_, slat, slng)| haversine_km(lat, lng, *slat, *slng) <= radius_km)
            .map(|(id, slat, slng)| Supplier {
                id: (*id).to_string(),
                lat: *slat,
                lng: *slng,
            })
            .collect())
    }
}

async fn find_suppliers(
    index: &GeoSpatialIndex<Supplier>,
    breaker: &CircuitBreaker,
    store: &Arc<Store>,
    lat: f64,
    lng: f64,
    radius_km: f64,
) -> Vec<Supplier> {
    let hits: Vec<Supplier> = index
        .find_nearby(lat, lng, radius_km)
        .into_iter()
        .filter(|e| haversine_km(lat, lng, e.lat, e.lng) <= radius_km)
        .map(|e| e.payload)
        .collect();
    if !hits.is_empty() {
        println!("  index hit: {} suppliers, store untouched", hits.len());
        return hits;
    }

    println!("  index miss: asking the store through the breaker");
    let store = Arc::clone(store);
    let fetched = breaker
        .execute_with_fallback(
            move || async move { store.query_near(lat, lng, radius_km).await },
            Vec::new,
        )
        .await;

    for s in &fetched {
        index.upsert(s.id.clone(), s.lat, s.lng, s.clone());
    }
    fetched
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .init();

    println!("Read-Through Composition Example");
    println!("================================\n");

    let store = Arc::new(Store {
        available: AtomicBool::new(true),
        reads: AtomicUsize::new(0),
    });
    let index: GeoSpatialIndex<Supplier> = GeoSpatialIndex::new(
        GeoIndexConfig::builder()
            .name("suppliers")
            .precision(6)
            .stale_after(Duration::from_secs(600))
            .build(),
    );
    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("supplier-store")
            .failure_threshold(3)
            .recovery_timeout(Duration::from_millis(500))
            .call_timeout(Duration::from_millis(200))
            .build(),
    );

    let (lat, lng) = (28.6139, 77.2090); // central Delhi

    println!("Cold start:");
    let first = find_suppliers(&index, &breaker, &store, lat, lng, 5.0).await;
    for s in &first {
        println!("    {} at ({:.4}, {:.4})", s.id, s.lat, s.lng);
    }

    println!("\nWarm index, same query:");
    let _ = find_suppliers(&index, &breaker, &store, lat, lng, 5.0).await;

    println!("\nStore goes down; the warm index keeps serving:");
    store.available.store(false, Ordering::SeqCst);
    let during_outage = find_suppliers(&index, &breaker, &store, lat, lng, 5.0).await;
    println!("    served {} suppliers during the outage", during_outage.len());

    println!(
        "\nStore reads so far: {} (one cold fetch, outage absorbed)",
        store.reads.load(Ordering::SeqCst)
    );
    index.stop();
}

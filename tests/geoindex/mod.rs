//! Geospatial index test suite.
//!
//! Test organization:
//! - geohash.rs: encoding, neighbor expansion, radius coverage
//! - nearby.rs: proximity queries against a live index
//! - eviction.rs: staleness sweep behavior

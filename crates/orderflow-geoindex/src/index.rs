//! Cell membership state for the geospatial index.

use crate::geohash;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

/// An entity tracked by the index: a position, the geohash cell it lives
/// in at the index's precision, and caller-supplied opaque payload.
#[derive(Debug, Clone)]
pub struct IndexedEntity<P> {
    /// Unique key for the entity.
    pub id: String,
    /// Latitude of the entity's last reported position.
    pub lat: f64,
    /// Longitude of the entity's last reported position.
    pub lng: f64,
    /// Geohash of the position at the index's precision.
    pub geohash: String,
    /// Opaque caller data, returned unmodified from proximity queries.
    pub payload: P,
    /// When the entity was last upserted; drives staleness eviction.
    pub updated_at: Instant,
}

/// The mutable index state: an entity table plus geohash cells.
///
/// Cells live in a `BTreeMap` so a covering cell coarser than the index
/// precision can union its members with a prefix range scan. Invariant:
/// every live entity is a member of exactly one cell, the one matching its
/// current geohash.
pub(crate) struct IndexCore<P> {
    precision: u8,
    entities: HashMap<String, IndexedEntity<P>>,
    cells: BTreeMap<String, HashSet<String>>,
}

impl<P> IndexCore<P> {
    pub(crate) fn new(precision: u8) -> Self {
        Self {
            precision,
            entities: HashMap::new(),
            cells: BTreeMap::new(),
        }
    }

    /// Inserts or updates an entity. Returns true if the entity moved to a
    /// different cell (or was newly inserted).
    pub(crate) fn upsert(&mut self, id: String, lat: f64, lng: f64, payload: P) -> bool {
        let cell = geohash::encode(lat, lng, self.precision);

        let moved = match self.entities.get(&id) {
            Some(existing) if existing.geohash == cell => false,
            Some(existing) => {
                // Old cell first, so the one-cell-per-entity invariant
                // holds even mid-move.
                let old_cell = existing.geohash.clone();
                self.remove_from_cell(&old_cell, &id);
                true
            }
            None => true,
        };

        if moved {
            self.cells.entry(cell.clone()).or_default().insert(id.clone());
        }

        self.entities.insert(
            id.clone(),
            IndexedEntity {
                id,
                lat,
                lng,
                geohash: cell,
                payload,
                updated_at: Instant::now(),
            },
        );

        moved
    }

    /// Removes an entity, deleting its cell if it becomes empty. Returns
    /// whether the entity existed.
    pub(crate) fn remove(&mut self, id: &str) -> bool {
        match self.entities.remove(id) {
            Some(entity) => {
                self.remove_from_cell(&entity.geohash, id);
                true
            }
            None => false,
        }
    }

    pub(crate) fn get(&self, id: &str) -> Option<&IndexedEntity<P>> {
        self.entities.get(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entities.len()
    }

    pub(crate) fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Unions the entities of the given covering cells.
    ///
    /// Covering cells are at most as precise as the index precision, so
    /// each one is a prefix of zero or more stored cells; members are
    /// collected by range-scanning that prefix.
    pub(crate) fn candidates(&self, covering: &[String]) -> Vec<&IndexedEntity<P>> {
        let mut out = Vec::new();
        for prefix in covering {
            for (_, members) in self
                .cells
                .range::<String, _>(prefix.clone()..)
                .take_while(|(cell, _)| cell.starts_with(prefix.as_str()))
            {
                for id in members {
                    if let Some(entity) = self.entities.get(id) {
                        out.push(entity);
                    }
                }
            }
        }
        out
    }

    /// Evicts entities idle longer than `stale_after`. Returns the number
    /// evicted.
    pub(crate) fn sweep_stale(&mut self, stale_after: Duration) -> usize {
        let now = Instant::now();
        let stale: Vec<String> = self
            .entities
            .values()
            .filter(|e| now.duration_since(e.updated_at) > stale_after)
            .map(|e| e.id.clone())
            .collect();

        for id in &stale {
            self.remove(id);
        }
        stale.len()
    }

    fn remove_from_cell(&mut self, cell: &str, id: &str) {
        if let Some(members) = self.cells.get_mut(cell) {
            members.remove(id);
            if members.is_empty() {
                self.cells.remove(cell);
            }
        }
    }
}

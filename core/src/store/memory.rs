use crate::prelude::{Point, PointFields};
use crate::store::PointStore;
use std::sync::{PoisonError, RwLock};

/// Volatile store used when no store path is configured.
#[derive(Default)]
pub struct MemoryStore {
    points: RwLock<Vec<Point>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PointStore for MemoryStore {
    fn insert_batch(&self, batch: Vec<PointFields>) -> Vec<Point> {
        let stored: Vec<Point> = batch.into_iter().map(Point::new).collect();
        self.points
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(stored.iter().cloned());
        stored
    }

    fn get_all(&self) -> Vec<Point> {
        self.points
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) -> bool {
        self.points
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        true
    }

    fn len(&self) -> usize {
        self.points
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn fields(intensity: f64) -> PointFields {
        PointFields {
            intensity,
            x: 1.0,
            y: 2.0,
            z: 3.0,
        }
    }

    #[test]
    fn insert_assigns_unique_ids() {
        let store = MemoryStore::new();
        let stored = store.insert_batch(vec![fields(1.0), fields(2.0), fields(3.0)]);
        assert_eq!(stored.len(), 3);

        let ids: HashSet<_> = store.get_all().iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn clear_empties_the_store() {
        let store = MemoryStore::new();
        store.insert_batch(vec![fields(1.0)]);
        assert!(store.clear());
        assert!(store.is_empty());
        assert!(store.get_all().is_empty());
    }
}

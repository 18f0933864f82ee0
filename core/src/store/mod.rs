//! Durable, append-mostly collections of points.

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use crate::prelude::{Point, PointFields};

/// Keyed collection of points shared by every connection.
///
/// Implementations must make `clear` a single atomic step for readers: a
/// concurrent `get_all` sees either every point or none.
pub trait PointStore: Send + Sync {
    /// Assigns identity and a timestamp to each element and persists it on its own.
    /// Elements that fail to persist are logged and left out of the returned batch.
    fn insert_batch(&self, batch: Vec<PointFields>) -> Vec<Point>;

    /// Snapshot of every stored point.
    fn get_all(&self) -> Vec<Point>;

    /// Removes every point. Returns `false` and leaves the store untouched on failure.
    fn clear(&self) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

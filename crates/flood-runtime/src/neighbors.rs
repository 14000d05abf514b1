//! Fan-out targets for this node

use std::sync::Arc;

use parking_lot::RwLock;

use flood_core::NodeId;

/// Current neighbor list. Replaced wholesale, never merged.
#[derive(Debug)]
pub struct NeighborTable {
    neighbors: RwLock<Arc<[NodeId]>>,
}

impl Default for NeighborTable {
    fn default() -> Self {
        NeighborTable {
            neighbors: RwLock::new(Arc::from(Vec::new())),
        }
    }
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the previous list and install `neighbors`
    pub fn replace(&self, neighbors: Vec<NodeId>) {
        *self.neighbors.write() = Arc::from(neighbors);
    }

    /// Immutable copy of the current list; later replacements do not affect it
    pub fn snapshot(&self) -> Arc<[NodeId]> {
        self.neighbors.read().clone()
    }

    pub fn len(&self) -> usize {
        self.neighbors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|n| NodeId::from(*n)).collect()
    }

    #[test]
    fn test_starts_empty() {
        let table = NeighborTable::new();
        assert!(table.is_empty());
        assert!(table.snapshot().is_empty());
    }

    #[test]
    fn test_replace_is_last_write_wins() {
        let table = NeighborTable::new();
        table.replace(ids(&["n2", "n3"]));
        table.replace(ids(&["n4"]));

        assert_eq!(&*table.snapshot(), ids(&["n4"]).as_slice());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let table = NeighborTable::new();
        table.replace(ids(&["n2", "n3"]));

        let before = table.snapshot();
        table.replace(Vec::new());

        assert_eq!(&*before, ids(&["n2", "n3"]).as_slice());
        assert!(table.snapshot().is_empty());
    }

    #[test]
    fn test_concurrent_readers_see_whole_lists() {
        let table = Arc::new(NeighborTable::new());
        let lists = [ids(&["n1", "n2", "n3"]), ids(&["n4", "n5", "n6"])];
        table.replace(lists[0].clone());

        let writer = {
            let table = table.clone();
            let lists = lists.clone();
            std::thread::spawn(move || {
                for i in 0..1000 {
                    table.replace(lists[i % 2].clone());
                }
            })
        };
        for _ in 0..1000 {
            let snapshot = table.snapshot();
            assert!(lists.iter().any(|l| l.as_slice() == &*snapshot));
        }
        writer.join().unwrap();
    }
}

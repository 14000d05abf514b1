//! Neighbor assignments for common cluster shapes

use std::collections::HashMap;

use flood_core::NodeId;

/// Node -> neighbors, the payload of a `topology` message
pub type Topology = HashMap<NodeId, Vec<NodeId>>;

/// Each node linked to its predecessor and successor
pub fn line(nodes: &[NodeId]) -> Topology {
    let mut topology = Topology::new();
    for (i, node) in nodes.iter().enumerate() {
        let mut neighbors = Vec::new();
        if i > 0 {
            neighbors.push(nodes[i - 1].clone());
        }
        if i + 1 < nodes.len() {
            neighbors.push(nodes[i + 1].clone());
        }
        topology.insert(node.clone(), neighbors);
    }
    topology
}

/// A line with the ends joined
pub fn ring(nodes: &[NodeId]) -> Topology {
    let mut topology = line(nodes);
    if nodes.len() > 2 {
        let (first, last) = (&nodes[0], &nodes[nodes.len() - 1]);
        topology.entry(first.clone()).or_default().push(last.clone());
        topology.entry(last.clone()).or_default().push(first.clone());
    }
    topology
}

/// Row-major grid `width` nodes wide; the last row may be short
pub fn grid(nodes: &[NodeId], width: usize) -> Topology {
    let width = width.max(1);
    let mut topology = Topology::new();
    for (i, node) in nodes.iter().enumerate() {
        let (row, col) = (i / width, i % width);
        let mut neighbors = Vec::new();
        if row > 0 {
            neighbors.push(nodes[i - width].clone());
        }
        if col > 0 {
            neighbors.push(nodes[i - 1].clone());
        }
        if col + 1 < width && i + 1 < nodes.len() {
            neighbors.push(nodes[i + 1].clone());
        }
        if i + width < nodes.len() {
            neighbors.push(nodes[i + width].clone());
        }
        topology.insert(node.clone(), neighbors);
    }
    topology
}

/// First node linked to every other node
pub fn star(nodes: &[NodeId]) -> Topology {
    let mut topology = Topology::new();
    let Some((hub, leaves)) = nodes.split_first() else {
        return topology;
    };
    topology.insert(hub.clone(), leaves.to_vec());
    for leaf in leaves {
        topology.insert(leaf.clone(), vec![hub.clone()]);
    }
    topology
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn nodes(n: usize) -> Vec<NodeId> {
        (0..n).map(|i| NodeId::new(format!("n{}", i))).collect()
    }

    fn neighbors(topology: &Topology, node: &str) -> Vec<String> {
        let mut names: Vec<String> = topology[&NodeId::from(node)]
            .iter()
            .map(|n| n.to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_line() {
        let t = line(&nodes(3));
        assert_eq!(neighbors(&t, "n0"), vec!["n1"]);
        assert_eq!(neighbors(&t, "n1"), vec!["n0", "n2"]);
        assert_eq!(neighbors(&t, "n2"), vec!["n1"]);
    }

    #[test]
    fn test_ring_closes() {
        let t = ring(&nodes(4));
        assert_eq!(neighbors(&t, "n0"), vec!["n1", "n3"]);
        assert_eq!(neighbors(&t, "n3"), vec!["n0", "n2"]);
    }

    #[test]
    fn test_grid_3x3() {
        let t = grid(&nodes(9), 3);
        assert_eq!(neighbors(&t, "n0"), vec!["n1", "n3"]);
        assert_eq!(neighbors(&t, "n4"), vec!["n1", "n3", "n5", "n7"]);
        assert_eq!(neighbors(&t, "n8"), vec!["n5", "n7"]);
    }

    #[test]
    fn test_grid_short_last_row() {
        let t = grid(&nodes(5), 3);
        assert_eq!(neighbors(&t, "n2"), vec!["n1"]);
        assert_eq!(neighbors(&t, "n4"), vec!["n1", "n3"]);
    }

    #[test]
    fn test_star() {
        let t = star(&nodes(4));
        assert_eq!(neighbors(&t, "n0"), vec!["n1", "n2", "n3"]);
        assert_eq!(neighbors(&t, "n2"), vec!["n0"]);
        assert!(star(&[]).is_empty());
    }

    #[test]
    fn test_links_are_symmetric() {
        for t in [line(&nodes(6)), ring(&nodes(6)), grid(&nodes(7), 3), star(&nodes(6))] {
            for (node, peers) in &t {
                for peer in peers {
                    assert!(t[peer].contains(node), "{:?} -> {:?} not mirrored", node, peer);
                }
            }
        }
    }

    proptest! {
        #[test]
        fn prop_grid_is_connected(n in 1usize..40, width in 1usize..8) {
            let all = nodes(n);
            let t = grid(&all, width);

            let mut reached = std::collections::HashSet::new();
            let mut frontier = vec![all[0].clone()];
            while let Some(node) = frontier.pop() {
                if reached.insert(node.clone()) {
                    frontier.extend(t[&node].iter().cloned());
                }
            }
            prop_assert_eq!(reached.len(), n);
        }
    }
}

//! Junction-to-row indexing for solver integration.
//!
//! Only junctions are unknowns of the head equations; tanks and reservoirs
//! have fixed heads during a solve. Rows are assigned to junctions in node
//! order.

use aq_core::NodeId;

use crate::network::Network;

#[derive(Debug, Clone)]
pub struct RowMap {
    /// Row index -> junction node.
    row_nodes: Vec<NodeId>,

    /// Node slot -> row index; None for tanks and reservoirs.
    node_rows: Vec<Option<usize>>,
}

impl RowMap {
    pub fn from_network(network: &Network) -> Self {
        let mut row_nodes = Vec::with_capacity(network.junction_count());
        let mut node_rows = vec![None; network.nodes().len()];
        for node in network.nodes().iter().filter(|n| n.is_junction()) {
            node_rows[node.id.slot()] = Some(row_nodes.len());
            row_nodes.push(node.id);
        }
        Self {
            row_nodes,
            node_rows,
        }
    }

    /// Number of unknown heads.
    pub fn row_count(&self) -> usize {
        self.row_nodes.len()
    }

    /// Row of a junction; None for fixed-grade or unknown nodes.
    #[inline]
    pub fn row(&self, node: NodeId) -> Option<usize> {
        self.node_rows.get(node.slot()).copied().flatten()
    }

    /// Junction owning a row (panics if out of bounds).
    pub fn node(&self, row: usize) -> NodeId {
        self.row_nodes[row]
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.row_nodes
    }
}

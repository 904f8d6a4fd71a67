use tern_shared::{DisType, NodeId};

/// Who else is out there: the gateway asks which peers must acknowledge a
/// reliably-initialised entity of a given category.
pub trait NetworkTopology: Send {
    fn expected_peers(&self, dis_type: DisType) -> Vec<NodeId>;
}

/// Fixed cluster membership; every peer is expected to ack every category.
pub struct StaticTopology {
    local_node: NodeId,
    nodes: Vec<NodeId>,
}

impl StaticTopology {
    pub fn new(local_node: NodeId, nodes: Vec<NodeId>) -> Self {
        Self { local_node, nodes }
    }
}

impl NetworkTopology for StaticTopology {
    fn expected_peers(&self, _dis_type: DisType) -> Vec<NodeId> {
        self.nodes
            .iter()
            .copied()
            .filter(|node| *node != self.local_node)
            .collect()
    }
}

//! Topology extraction: wires merge ports into electrical nodes.
//!
//! Every port starts as its own singleton node, so a port that maps to no
//! node cannot occur by construction. Wires union their two endpoints via
//! an index-based disjoint-set with path compression; the resulting sets
//! become [`ElectricalNode`]s. Ground symbols all refer to the same
//! reference, so their ports are merged into a single node up front.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{EngineError, Result};

use super::component::{Component, ComponentKind, PortRef, Wire};

/// Disjoint-set over a dense array of port indices.
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        // Iterative find with path compression
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// One electrical node: a maximal set of wire-connected ports.
#[derive(Debug, Clone)]
pub struct ElectricalNode {
    /// Stable node id (discovery order over the component list)
    pub id: usize,
    /// Member ports
    pub ports: Vec<PortRef>,
    /// True if any member port belongs to a ground component
    pub is_ground: bool,
    /// Index into the unknown vector; `None` for the ground reference
    pub index: Option<usize>,
}

/// Result of topology extraction over a netlist snapshot.
#[derive(Debug, Clone)]
pub struct Topology {
    /// All electrical nodes, ground included
    pub nodes: Vec<ElectricalNode>,
    /// Node id of the ground reference, if one exists
    pub ground: Option<usize>,
    /// Number of non-ground nodes (voltage unknowns)
    pub num_unknowns: usize,
    port_to_node: HashMap<PortRef, usize>,
}

impl Topology {
    /// Build the node partition from a component/wire snapshot.
    ///
    /// Rebuilt from scratch on every analysis request; cheap and stateless.
    pub fn build(components: &[Component], wires: &[Wire]) -> Result<Self> {
        if components.is_empty() {
            return Err(EngineError::EmptyCircuit);
        }

        for comp in components {
            let required = comp.kind.required_ports();
            if comp.ports.len() < required {
                return Err(EngineError::MissingPorts {
                    component: comp.id.clone(),
                    required,
                    actual: comp.ports.len(),
                });
            }
        }

        if components.len() >= 2 && wires.is_empty() {
            return Err(EngineError::NoWires {
                components: components.len(),
            });
        }

        // Dense port enumeration: every port is its own singleton set
        let mut port_ids: Vec<PortRef> = Vec::new();
        let mut port_index: HashMap<PortRef, usize> = HashMap::new();
        for comp in components {
            for port in &comp.ports {
                let port_ref = PortRef::new(comp.id.clone(), port.clone());
                port_index.entry(port_ref.clone()).or_insert_with(|| {
                    port_ids.push(port_ref);
                    port_ids.len() - 1
                });
            }
        }

        let mut sets = DisjointSet::new(port_ids.len());

        for wire in wires {
            let from = *port_index
                .get(&wire.from)
                .ok_or_else(|| EngineError::UnknownPort {
                    wire: wire.id.clone(),
                    component: wire.from.component.clone(),
                    port: wire.from.port.clone(),
                })?;
            let to = *port_index
                .get(&wire.to)
                .ok_or_else(|| EngineError::UnknownPort {
                    wire: wire.id.clone(),
                    component: wire.to.component.clone(),
                    port: wire.to.port.clone(),
                })?;
            sets.union(from, to);
        }

        // All ground symbols refer to the same zero-voltage reference
        let ground_ports: Vec<usize> = components
            .iter()
            .filter(|c| matches!(c.kind, ComponentKind::Ground))
            .flat_map(|c| c.ports.iter().map(|p| port_index[&PortRef::new(c.id.clone(), p.clone())]))
            .collect();
        for pair in ground_ports.windows(2) {
            sets.union(pair[0], pair[1]);
        }

        let ground_kinds: HashMap<&str, bool> = components
            .iter()
            .map(|c| (c.id.as_str(), matches!(c.kind, ComponentKind::Ground)))
            .collect();

        // Group ports by set root, in discovery order
        let mut root_to_node: HashMap<usize, usize> = HashMap::new();
        let mut nodes: Vec<ElectricalNode> = Vec::new();
        let mut port_to_node: HashMap<PortRef, usize> = HashMap::new();

        for (idx, port) in port_ids.iter().enumerate() {
            let root = sets.find(idx);
            let node_id = *root_to_node.entry(root).or_insert_with(|| {
                nodes.push(ElectricalNode {
                    id: nodes.len(),
                    ports: Vec::new(),
                    is_ground: false,
                    index: None,
                });
                nodes.len() - 1
            });
            nodes[node_id].ports.push(port.clone());
            if ground_kinds[port.component.as_str()] {
                nodes[node_id].is_ground = true;
            }
            port_to_node.insert(port.clone(), node_id);
        }

        let ground = nodes.iter().position(|n| n.is_ground);
        let Some(ground_id) = ground else {
            return Err(EngineError::MissingGround);
        };

        // Ground must touch something other than ground symbols
        let reachable = nodes[ground_id]
            .ports
            .iter()
            .any(|p| !ground_kinds[p.component.as_str()]);
        if !reachable {
            return Err(EngineError::IsolatedGround);
        }

        // Sequential unknown indices for non-ground nodes, discovery order
        let mut next_index = 0usize;
        for node in &mut nodes {
            if !node.is_ground {
                node.index = Some(next_index);
                next_index += 1;
            }
        }

        debug!(
            nodes = nodes.len(),
            unknowns = next_index,
            ground = ground_id,
            "topology built"
        );

        Ok(Self {
            nodes,
            ground,
            num_unknowns: next_index,
            port_to_node,
        })
    }

    /// Node id a port belongs to.
    pub fn node_of(&self, port: &PortRef) -> Option<usize> {
        self.port_to_node.get(port).copied()
    }

    /// Node id a port belongs to, as a `Result` for use inside assembly.
    pub fn require_node(&self, port: &PortRef) -> Result<usize> {
        self.node_of(port).ok_or_else(|| EngineError::UnknownPort {
            wire: String::new(),
            component: port.component.clone(),
            port: port.port.clone(),
        })
    }

    /// Matrix index of a node; `None` means ground.
    pub fn matrix_index(&self, node: usize) -> Option<usize> {
        self.nodes[node].index
    }
}

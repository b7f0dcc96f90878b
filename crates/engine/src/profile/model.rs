use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use screening_core::types::{EntityId, ProfileVersion};

use crate::knowledge::ConnectionKind;
use crate::risk::{Finding, RiskLevel};

/// An edge in the entity connection graph. Edges are undirected; insertion
/// is symmetric and traversal uses visited sets, so cycles (mutual
/// employment, shared addresses) are safe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEdge {
    pub a: EntityId,
    pub b: EntityId,
    pub kind: ConnectionKind,
    pub strength: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityGraph {
    edges: Vec<EntityEdge>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an undirected edge; the (a, b) ordering is normalized so the
    /// same connection never appears twice.
    pub fn connect(&mut self, a: EntityId, b: EntityId, kind: ConnectionKind, strength: f64) {
        let (a, b) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        let exists = self
            .edges
            .iter()
            .any(|e| e.a == a && e.b == b && e.kind == kind);
        if !exists {
            self.edges.push(EntityEdge { a, b, kind, strength });
        }
    }

    pub fn edges(&self) -> &[EntityEdge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn neighbors(&self, entity: EntityId) -> Vec<EntityId> {
        let mut neighbors = Vec::new();
        for edge in &self.edges {
            if edge.a == entity {
                neighbors.push(edge.b);
            } else if edge.b == entity {
                neighbors.push(edge.a);
            }
        }
        neighbors
    }

    /// Breadth-first traversal with a visited set, cycle-safe.
    pub fn reachable_from(&self, start: EntityId) -> Vec<EntityId> {
        let mut visited = vec![start];
        let mut queue = std::collections::VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for neighbor in self.neighbors(current) {
                if !visited.contains(&neighbor) {
                    visited.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
        visited
    }
}

/// A risk-scored profile for an entity. Profiles are immutable: each
/// completed investigation appends a new version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub entity_id: EntityId,
    pub version: ProfileVersion,
    pub findings: Vec<Finding>,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub entity_graph: EntityGraph,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_insertion_deduplicates() {
        let mut graph = EntityGraph::new();
        let a = EntityId::new();
        let b = EntityId::new();
        graph.connect(a, b, ConnectionKind::Employer, 0.8);
        graph.connect(b, a, ConnectionKind::Employer, 0.8);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.neighbors(a), vec![b]);
        assert_eq!(graph.neighbors(b), vec![a]);
    }

    #[test]
    fn traversal_handles_cycles() {
        let mut graph = EntityGraph::new();
        let a = EntityId::new();
        let b = EntityId::new();
        let c = EntityId::new();
        graph.connect(a, b, ConnectionKind::Employer, 0.5);
        graph.connect(b, c, ConnectionKind::Associate, 0.5);
        graph.connect(c, a, ConnectionKind::Address, 0.5);

        let reachable = graph.reachable_from(a);
        assert_eq!(reachable.len(), 3);
    }
}

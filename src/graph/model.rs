//! Relationship graph construction.
//!
//! Style and period nodes belong to one image; artist and movement nodes
//! are shared by name across the whole batch.

use crate::models::AnalysisResult;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Node category. Closed set; every category has a fixed colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Style,
    Period,
    Artist,
    Movement,
}

impl Category {
    /// All categories in legend order.
    pub const ALL: [Category; 4] = [
        Category::Style,
        Category::Period,
        Category::Artist,
        Category::Movement,
    ];

    /// Fill colour used when rendering.
    pub fn color(&self) -> &'static str {
        match self {
            Category::Style => "#1f77b4",
            Category::Period => "#ff7f0e",
            Category::Artist => "#2ca02c",
            Category::Movement => "#9467bd",
        }
    }

    /// Circle radius; per-image nodes are drawn larger than shared ones.
    pub fn radius(&self) -> f64 {
        match self {
            Category::Style | Category::Period => 20.0,
            Category::Artist | Category::Movement => 15.0,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Style => write!(f, "Style"),
            Category::Period => write!(f, "Period"),
            Category::Artist => write!(f, "Artist"),
            Category::Movement => write!(f, "Movement"),
        }
    }
}

/// Stable node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a node stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum NodeKind {
    /// Style of the image at `image`.
    Style { image: usize, name: String },
    /// Period of the image at `image`.
    Period { image: usize, name: String },
    Artist { name: String },
    Movement { name: String },
}

impl NodeKind {
    pub fn id(&self) -> NodeId {
        NodeId(match self {
            NodeKind::Style { image, name } => format!("style-{}-{}", image, name),
            NodeKind::Period { image, name } => format!("period-{}-{}", image, name),
            NodeKind::Artist { name } => format!("artist-{}", name),
            NodeKind::Movement { name } => format!("movement-{}", name),
        })
    }

    pub fn category(&self) -> Category {
        match self {
            NodeKind::Style { .. } => Category::Style,
            NodeKind::Period { .. } => Category::Period,
            NodeKind::Artist { .. } => Category::Artist,
            NodeKind::Movement { .. } => Category::Movement,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            NodeKind::Style { name, .. }
            | NodeKind::Period { name, .. }
            | NodeKind::Artist { name }
            | NodeKind::Movement { name } => name,
        }
    }

    /// Whether the node is shared across images.
    pub fn is_shared(&self) -> bool {
        matches!(self, NodeKind::Artist { .. } | NodeKind::Movement { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub radius: f64,
}

impl GraphNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            id: kind.id(),
            radius: kind.category().radius(),
            kind,
        }
    }

    pub fn label(&self) -> &str {
        self.kind.label()
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }
}

/// Undirected edge from a per-image node to a shared node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GraphEdge {
    pub source: NodeId,
    pub target: NodeId,
}

/// Deduplicated node and edge sets derived from a batch of results.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    index: HashMap<NodeId, usize>,
}

impl RelationshipGraph {
    /// Build the graph from results in batch order.
    ///
    /// Artists hang off the style node and movements off the period node.
    /// Blank names are skipped and a name listed twice by one result yields
    /// a single edge.
    pub fn build(results: &[AnalysisResult]) -> Self {
        let mut graph = Self::default();
        let mut seen_edges = HashSet::new();

        for (i, result) in results.iter().enumerate() {
            let style = graph.insert(NodeKind::Style {
                image: i,
                name: result.style.clone(),
            });
            let period = graph.insert(NodeKind::Period {
                image: i,
                name: result.period.clone(),
            });

            for artist in clean_names(&result.connections.artists) {
                let target = graph.insert(NodeKind::Artist {
                    name: artist.to_string(),
                });
                graph.connect(&style, target, &mut seen_edges);
            }

            for movement in clean_names(&result.connections.movements) {
                let target = graph.insert(NodeKind::Movement {
                    name: movement.to_string(),
                });
                graph.connect(&period, target, &mut seen_edges);
            }
        }

        graph
    }

    /// Insert a node unless one with the same id exists; returns the id.
    fn insert(&mut self, kind: NodeKind) -> NodeId {
        let node = GraphNode::new(kind);
        let id = node.id.clone();
        if !self.index.contains_key(&id) {
            self.index.insert(id.clone(), self.nodes.len());
            self.nodes.push(node);
        }
        id
    }

    fn connect(&mut self, source: &NodeId, target: NodeId, seen: &mut HashSet<GraphEdge>) {
        let edge = GraphEdge {
            source: source.clone(),
            target,
        };
        if seen.insert(edge.clone()) {
            self.edges.push(edge);
        }
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Position of a node in [`Self::nodes`].
    pub fn position(&self, id: &NodeId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Look up a node by its raw id string.
    pub fn find(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id.as_str() == id)
    }

    /// Edges as index pairs into [`Self::nodes`].
    pub fn edge_indices(&self) -> Vec<(usize, usize)> {
        self.edges
            .iter()
            .filter_map(|e| Some((self.position(&e.source)?, self.position(&e.target)?)))
            .collect()
    }

    /// Number of edges touching a node.
    pub fn degree(&self, id: &NodeId) -> usize {
        self.edges
            .iter()
            .filter(|e| &e.source == id || &e.target == id)
            .count()
    }

    pub fn count(&self, category: Category) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.category() == category)
            .count()
    }

    /// Every edge endpoint exists in the node set.
    pub fn is_consistent(&self) -> bool {
        self.edges
            .iter()
            .all(|e| self.index.contains_key(&e.source) && self.index.contains_key(&e.target))
    }
}

fn clean_names(names: &[String]) -> impl Iterator<Item = &str> {
    names.iter().map(|n| n.trim()).filter(|n| !n.is_empty())
}

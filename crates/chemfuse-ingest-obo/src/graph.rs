//! The `is_a` family graph.
//!
//! Raw OBO edges point from specific to general terms
//! (`macrolide -> macrocyclic lactone -> ... -> chemical entity`).
//! Construction reverses them, so *successors* are children and
//! *predecessors* are parents, then drops every edge that is not `is_a`.
//! Ancestors and descendants are only meaningful over that hierarchy.
//!
//! Node ids are interned to `u32` indices in declaration order; closures are
//! Roaring bitmaps over those indices.

use crate::{OboGraph, OboNode, IS_A_RELATION};
use dashmap::DashMap;
use roaring::RoaringBitmap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Follow predecessors (towards more general terms).
    Ancestors,
    /// Follow successors (towards more specific terms).
    Descendants,
}

/// Completed closures, keyed by node index.
///
/// A traversal that reaches a cached node unions its closure instead of
/// expanding it again.
#[derive(Debug, Default)]
pub struct ClosureCache {
    ancestors: DashMap<u32, Arc<RoaringBitmap>>,
    descendants: DashMap<u32, Arc<RoaringBitmap>>,
}

impl ClosureCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, direction: Direction) -> &DashMap<u32, Arc<RoaringBitmap>> {
        match direction {
            Direction::Ancestors => &self.ancestors,
            Direction::Descendants => &self.descendants,
        }
    }

    pub fn get(&self, direction: Direction, node: u32) -> Option<Arc<RoaringBitmap>> {
        self.map(direction).get(&node).map(|entry| Arc::clone(entry.value()))
    }

    fn insert(&self, direction: Direction, node: u32, closure: Arc<RoaringBitmap>) {
        self.map(direction).insert(node, closure);
    }

    pub fn len(&self) -> usize {
        self.ancestors.len() + self.descendants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Iterator over node ids in declaration order.
#[derive(Debug, Clone)]
pub struct NodeIds<'a> {
    nodes: std::slice::Iter<'a, OboNode>,
}

impl<'a> Iterator for NodeIds<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.nodes.next().map(|node| node.id.as_str())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.nodes.size_hint()
    }
}

impl ExactSizeIterator for NodeIds<'_> {}

#[derive(Debug, Clone)]
pub struct OntologyGraph {
    nodes: Vec<OboNode>,
    index: HashMap<String, u32>,
    /// Successors (children) per node, in edge order.
    children: Vec<Vec<u32>>,
    /// Predecessors (parents) per node, in edge order.
    parents: Vec<Vec<u32>>,
    edge_count: usize,
    removed_edge_count: usize,
}

impl OntologyGraph {
    /// Reverse every edge, then keep only `is_a` edges.
    ///
    /// Edge endpoints that are not declared terms become bare nodes, even
    /// when the edge itself is filtered out.
    pub fn from_obo(obo: OboGraph) -> Self {
        let mut nodes: Vec<OboNode> = Vec::with_capacity(obo.nodes.len());
        let mut index: HashMap<String, u32> = HashMap::with_capacity(obo.nodes.len());

        for node in obo.nodes {
            match index.get(&node.id) {
                Some(&existing) => {
                    tracing::warn!(term = %node.id, "duplicate term; later stanza wins");
                    nodes[existing as usize] = node;
                }
                None => {
                    index.insert(node.id.clone(), nodes.len() as u32);
                    nodes.push(node);
                }
            }
        }

        let mut intern = |id: &str, nodes: &mut Vec<OboNode>| -> u32 {
            if let Some(&idx) = index.get(id) {
                return idx;
            }
            let idx = nodes.len() as u32;
            index.insert(id.to_string(), idx);
            nodes.push(OboNode::new(id));
            idx
        };

        // (1) reverse: general -> specific
        let reversed: Vec<(u32, u32, String)> = obo
            .edges
            .into_iter()
            .map(|edge| {
                let general = intern(&edge.target, &mut nodes);
                let specific = intern(&edge.source, &mut nodes);
                (general, specific, edge.relation)
            })
            .collect();

        // (2) keep only is_a
        let total = reversed.len();
        let kept: Vec<(u32, u32)> = reversed
            .into_iter()
            .filter(|(_, _, relation)| relation == IS_A_RELATION)
            .map(|(from, to, _)| (from, to))
            .collect();
        let removed_edge_count = total - kept.len();

        // (3) adjacency, collapsing parallel edges
        let mut children = vec![Vec::new(); nodes.len()];
        let mut parents = vec![Vec::new(); nodes.len()];
        let mut seen: HashSet<(u32, u32)> = HashSet::with_capacity(kept.len());
        for (from, to) in kept {
            if !seen.insert((from, to)) {
                continue;
            }
            children[from as usize].push(to);
            parents[to as usize].push(from);
        }
        let edge_count = seen.len();

        tracing::info!(
            nodes = nodes.len(),
            edges = edge_count,
            removed_edges = removed_edge_count,
            "built is_a ontology graph"
        );

        Self {
            nodes,
            index,
            children,
            parents,
            edge_count,
            removed_edge_count,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Retained (`is_a`) edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Edges dropped by the `is_a` filter.
    pub fn removed_edge_count(&self) -> usize {
        self.removed_edge_count
    }

    pub fn index_of(&self, id: &str) -> Option<u32> {
        self.index.get(id).copied()
    }

    pub fn id_of(&self, node: u32) -> &str {
        &self.nodes[node as usize].id
    }

    pub fn node(&self, node: u32) -> &OboNode {
        &self.nodes[node as usize]
    }

    /// Node ids in declaration order (declared terms first, then bare nodes).
    pub fn node_ids(&self) -> NodeIds<'_> {
        NodeIds {
            nodes: self.nodes.iter(),
        }
    }

    /// Direct children.
    pub fn successors(&self, node: u32) -> &[u32] {
        &self.children[node as usize]
    }

    /// Direct parents.
    pub fn predecessors(&self, node: u32) -> &[u32] {
        &self.parents[node as usize]
    }

    /// Retained edges as `(general, specific)` id pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.children.iter().enumerate().flat_map(move |(from, tos)| {
            tos.iter()
                .map(move |&to| (self.id_of(from as u32), self.id_of(to)))
        })
    }

    pub fn ancestors(&self, node: u32) -> RoaringBitmap {
        self.closure(node, Direction::Ancestors, None)
    }

    pub fn descendants(&self, node: u32) -> RoaringBitmap {
        self.closure(node, Direction::Descendants, None)
    }

    fn neighbours(&self, node: u32, direction: Direction) -> &[u32] {
        match direction {
            Direction::Ancestors => self.predecessors(node),
            Direction::Descendants => self.successors(node),
        }
    }

    /// Every node reachable from `node` in `direction`, excluding `node`.
    pub fn closure(
        &self,
        node: u32,
        direction: Direction,
        cache: Option<&ClosureCache>,
    ) -> RoaringBitmap {
        if let Some(hit) = cache.and_then(|cache| cache.get(direction, node)) {
            return (*hit).clone();
        }

        let mut visited = RoaringBitmap::new();
        visited.insert(node);
        let mut queue = VecDeque::from([node]);

        while let Some(current) = queue.pop_front() {
            for &next in self.neighbours(current, direction) {
                if !visited.insert(next) {
                    continue;
                }
                match cache.and_then(|cache| cache.get(direction, next)) {
                    Some(known) => visited |= known.as_ref(),
                    None => queue.push_back(next),
                }
            }
        }

        visited.remove(node);
        if let Some(cache) = cache {
            cache.insert(direction, node, Arc::new(visited.clone()));
        }
        visited
    }
}

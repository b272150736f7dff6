//! The arena that owns every node and the structural operations on it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use grove_types::{ForestError, NodeId, NodeKind, Result};

use crate::node::Node;

/// The whole in-memory tree (a DAG in practice), rooted at one branch.
///
/// Nodes live in an id-indexed arena; edges are id references. Multiple
/// parents simply list the same child id, so every path to a shared leaf
/// lands on the same record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    root: NodeId,
    nodes: BTreeMap<NodeId, Node>,
}

impl Forest {
    /// Initialize a forest with a fresh branch root named `root_name`.
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = Node::new(NodeKind::Branch, root_name);
        let root_id = root.id.clone();
        let mut nodes = BTreeMap::new();
        nodes.insert(root_id.clone(), root);
        Self { root: root_id, nodes }
    }

    /// Id of the root node.
    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    /// The root node.
    pub fn root(&self) -> &Node {
        &self.nodes[&self.root]
    }

    /// Mutable access to the root node.
    pub fn root_mut(&mut self) -> &mut Node {
        self.nodes.get_mut(&self.root).expect("root node present")
    }

    /// Node by id, if it exists in the arena.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Mutable node by id, if it exists in the arena.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the arena holds only the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    //───────────────────── wiring ─────────────────────

    /// Attach `child` under the branch `parent_id`.
    ///
    /// Fails with `InvalidType` when the parent is a leaf and `Conflict`
    /// when a sibling already carries the child's name. A node already in
    /// the arena may be wired under an additional parent by id, which is
    /// how shared sub-trees are built.
    pub fn add_child(&mut self, parent_id: &str, child: Node) -> Result<NodeId> {
        let child_id = child.id.clone();
        let child_name = child.name.clone();
        {
            let parent = self
                .nodes
                .get(parent_id)
                .ok_or_else(|| ForestError::NotFound(format!("node not found: {parent_id}")))?;
            if parent.kind != NodeKind::Branch {
                return Err(ForestError::InvalidType(format!(
                    "cannot add child to leaf node {}",
                    parent.name
                )));
            }
            if parent.children.values().any(|name| *name == child_name) {
                return Err(ForestError::Conflict(format!(
                    "sibling named {child_name} already exists under {}",
                    parent.name
                )));
            }
        }

        let parent_name = self.nodes[parent_id].name.clone();
        let entry = self.nodes.entry(child_id.clone()).or_insert(child);
        entry.parents.insert(parent_id.to_owned(), parent_name);

        let parent = self.nodes.get_mut(parent_id).expect("parent just checked");
        parent.children.insert(child_id.clone(), child_name);
        Ok(child_id)
    }

    /// Wire an existing arena node under an additional parent.
    pub fn link_child(&mut self, parent_id: &str, child_id: &str) -> Result<()> {
        let child = self
            .nodes
            .get(child_id)
            .ok_or_else(|| ForestError::NotFound(format!("node not found: {child_id}")))?
            .clone();
        self.add_child(parent_id, child).map(|_| ())
    }

    //───────────────────── resolution ─────────────────────

    /// Resolve a `/`-separated path of child names to a node id.
    ///
    /// The empty path denotes the root. Each segment is matched against
    /// child *names*; the first match wins.
    pub fn resolve_path(&self, path: &str) -> Result<NodeId> {
        let mut current = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let node = &self.nodes[&current];
            let next = node
                .children
                .iter()
                .find(|(_, name)| name.as_str() == segment)
                .map(|(id, _)| id.clone());
            match next {
                Some(id) => current = id,
                None => {
                    return Err(ForestError::NotFound(format!("node not found: {path}")));
                }
            }
        }
        Ok(current)
    }

    /// Resolve a path to a shared reference.
    pub fn node_at_path(&self, path: &str) -> Result<&Node> {
        let id = self.resolve_path(path)?;
        Ok(&self.nodes[&id])
    }

    /// Resolve a path to a mutable reference.
    pub fn node_at_path_mut(&mut self, path: &str) -> Result<&mut Node> {
        let id = self.resolve_path(path)?;
        Ok(self.nodes.get_mut(&id).expect("resolved id present"))
    }

    /// Depth-first search from the root for a node with `id`.
    ///
    /// Only nodes reachable from the root are found; detached arena
    /// residue (none in normal operation) is invisible.
    pub fn get_node(&self, id: &str) -> Result<&Node> {
        let mut stack = vec![self.root.clone()];
        let mut seen = std::collections::BTreeSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let node = &self.nodes[&current];
            if node.id == id {
                return Ok(node);
            }
            stack.extend(node.children.keys().cloned());
        }
        Err(ForestError::NotFound(format!("node not found: {id}")))
    }

    /// Sub-tree rooted at `id`, rendered as a nested structure.
    ///
    /// Used by the tree endpoint; the arena itself serializes flat.
    pub fn subtree(&self, id: &str) -> Result<serde_json::Value> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| ForestError::NotFound(format!("node not found: {id}")))?;
        let mut value = serde_json::to_value(node)
            .map_err(|e| ForestError::Internal(format!("serialize node: {e}")))?;
        let mut children = serde_json::Map::new();
        for child_id in node.children.keys() {
            children.insert(child_id.clone(), self.subtree(child_id)?);
        }
        value["children"] = serde_json::Value::Object(children);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> Node {
        Node::new(NodeKind::Leaf, name)
    }

    fn branch(name: &str) -> Node {
        Node::new(NodeKind::Branch, name)
    }

    #[test]
    fn children_carry_back_edges() {
        let mut forest = Forest::new("root");
        let root_id = forest.root_id().clone();
        let b = forest.add_child(&root_id, branch("b")).unwrap();
        let l = forest.add_child(&b, leaf("l")).unwrap();

        // For every child c of n, n.id must appear in c.parents.
        assert!(forest.node(&b).unwrap().parents.contains_key(&root_id));
        assert!(forest.node(&l).unwrap().parents.contains_key(&b));
        assert!(forest.root().parents.is_empty());
    }

    #[test]
    fn sibling_name_collision_is_rejected() {
        let mut forest = Forest::new("root");
        let root_id = forest.root_id().clone();
        forest.add_child(&root_id, leaf("dup")).unwrap();
        let err = forest.add_child(&root_id, leaf("dup")).unwrap_err();
        assert!(matches!(err, ForestError::Conflict(_)));
    }

    #[test]
    fn leaf_cannot_take_children() {
        let mut forest = Forest::new("root");
        let root_id = forest.root_id().clone();
        let l = forest.add_child(&root_id, leaf("l")).unwrap();
        let err = forest.add_child(&l, leaf("under-leaf")).unwrap_err();
        assert!(matches!(err, ForestError::InvalidType(_)));
    }

    #[test]
    fn empty_path_resolves_to_root() {
        let forest = Forest::new("root");
        assert_eq!(&forest.resolve_path("").unwrap(), forest.root_id());
    }

    #[test]
    fn paths_resolve_by_child_name() {
        let mut forest = Forest::new("root");
        let root_id = forest.root_id().clone();
        let b = forest.add_child(&root_id, branch("projects")).unwrap();
        let l = forest.add_child(&b, leaf("grove")).unwrap();

        assert_eq!(forest.resolve_path("projects/grove").unwrap(), l);
        assert!(matches!(
            forest.resolve_path("projects/missing"),
            Err(ForestError::NotFound(_))
        ));
    }

    #[test]
    fn multi_parent_paths_reach_the_same_node() {
        let mut forest = Forest::new("root");
        let root_id = forest.root_id().clone();
        let b1 = forest.add_child(&root_id, branch("b1")).unwrap();
        let b2 = forest.add_child(&root_id, branch("b2")).unwrap();
        let b3 = forest.add_child(&root_id, branch("b3")).unwrap();
        let l = forest.add_child(&b1, leaf("shared")).unwrap();
        forest.link_child(&b2, &l).unwrap();
        forest.link_child(&b3, &l).unwrap();

        for path in ["b1/shared", "b2/shared", "b3/shared"] {
            assert_eq!(forest.resolve_path(path).unwrap(), l);
        }
        let parents = &forest.node(&l).unwrap().parents;
        assert!(parents.contains_key(&b1));
        assert!(parents.contains_key(&b2));
        assert!(parents.contains_key(&b3));
    }

    #[test]
    fn get_node_walks_from_the_root() {
        let mut forest = Forest::new("root");
        let root_id = forest.root_id().clone();
        let b = forest.add_child(&root_id, branch("b")).unwrap();
        let l = forest.add_child(&b, leaf("l")).unwrap();

        assert_eq!(forest.get_node(&l).unwrap().name, "l");
        assert!(matches!(
            forest.get_node("absent"),
            Err(ForestError::NotFound(_))
        ));
    }

    #[test]
    fn forest_round_trips_through_json() {
        let mut forest = Forest::new("root");
        let root_id = forest.root_id().clone();
        let b = forest.add_child(&root_id, branch("b")).unwrap();
        forest.add_child(&b, leaf("l")).unwrap();

        let json = serde_json::to_string(&forest).unwrap();
        let back: Forest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, forest);
        // Shared identity survives: resolution still lands on arena ids.
        assert_eq!(back.resolve_path("b/l").unwrap(), forest.resolve_path("b/l").unwrap());
    }
}

//! Arena-backed document tree.
//!
//! Nodes are addressed by index into a flat arena instead of owning their
//! children, which keeps serialization by multiple export backends free of
//! lifetime gymnastics. The tree is append-only: nodes are never mutated
//! or removed once inserted.

use crate::core::keyframe::Keyframe;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Section,
    Heading,
    Paragraph,
    Image,
    Caption,
}

#[derive(Debug, Clone)]
pub enum NodePayload {
    Empty,
    Text(String),
    Image(Keyframe),
}

#[derive(Debug, Clone)]
pub struct DocumentNode {
    pub kind: NodeKind,
    pub payload: NodePayload,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: Vec<DocumentNode>,
    root: NodeId,
}

impl DocumentTree {
    /// Create a tree holding only the root section.
    pub fn new() -> Self {
        let root = DocumentNode {
            kind: NodeKind::Section,
            payload: NodePayload::Empty,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &DocumentNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Append a node under `parent` and return its id.
    pub fn push(&mut self, parent: NodeId, kind: NodeKind, payload: NodePayload) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(DocumentNode {
            kind,
            payload,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &DocumentNode)> + '_ {
        self.nodes[id].children.iter().map(move |&c| (c, &self.nodes[c]))
    }

    /// All image nodes in document order.
    pub fn images(&self) -> Vec<(NodeId, &Keyframe)> {
        let mut out = Vec::new();
        self.walk(self.root, &mut |id, node| {
            if let NodePayload::Image(keyframe) = &node.payload {
                out.push((id, keyframe));
            }
        });
        out
    }

    /// Depth-first, document-order traversal.
    pub fn walk<'a, F: FnMut(NodeId, &'a DocumentNode)>(&'a self, from: NodeId, visit: &mut F) {
        visit(from, &self.nodes[from]);
        for &child in &self.nodes[from].children {
            self.walk(child, visit);
        }
    }
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

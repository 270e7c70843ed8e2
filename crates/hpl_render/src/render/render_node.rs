//! Render tree arena
//!
//! Nodes and their states are pooled in slot maps owned by the render list.
//! Children are kept sorted by [`RenderState::compare`], so inserting the
//! same set of objects in any order yields the same tree.

use std::cmp::Ordering;

use crate::foundation::collections::{RenderNodeId, RenderStateId, SlotMap};
use crate::render::render_state::{RenderContext, RenderState};

/// Node of the render tree
#[derive(Debug, Clone, Default)]
pub struct RenderNode {
    state: Option<RenderStateId>,
    children: Vec<RenderNodeId>,
}

impl RenderNode {
    /// State applied when the node is entered
    pub const fn state(&self) -> Option<RenderStateId> {
        self.state
    }

    /// Sorted children
    pub fn children(&self) -> &[RenderNodeId] {
        &self.children
    }
}

/// Pool of render nodes and states
#[derive(Debug, Default)]
pub struct RenderArena {
    nodes: SlotMap<RenderNodeId, RenderNode>,
    states: SlotMap<RenderStateId, RenderState>,
}

impl RenderArena {
    /// Empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every node and state, keeping the allocations
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.states.clear();
    }

    /// New root node carrying [`RenderState::Root`]
    pub fn create_root(&mut self) -> RenderNodeId {
        let state = self.states.insert(RenderState::Root);
        self.nodes.insert(RenderNode { state: Some(state), children: Vec::new() })
    }

    /// Child of `parent` carrying `state`, created if no equal sibling exists
    pub fn insert_node(&mut self, parent: RenderNodeId, state: RenderState) -> RenderNodeId {
        let Some(parent_node) = self.nodes.get(parent) else {
            return parent;
        };
        let search = parent_node.children.binary_search_by(|&child| {
            self.nodes
                .get(child)
                .and_then(|node| node.state)
                .and_then(|id| self.states.get(id))
                .map_or(Ordering::Less, |existing| existing.compare(&state))
        });
        match search {
            Ok(index) => parent_node.children[index],
            Err(index) => {
                let state_id = self.states.insert(state);
                let node = self.nodes.insert(RenderNode { state: Some(state_id), children: Vec::new() });
                if let Some(parent_node) = self.nodes.get_mut(parent) {
                    parent_node.children.insert(index, node);
                }
                node
            }
        }
    }

    /// Insert a chain of states below `parent`, returning the deepest node
    pub fn insert_chain(&mut self, parent: RenderNodeId, states: &[RenderState]) -> RenderNodeId {
        states.iter().fold(parent, |node, state| self.insert_node(node, *state))
    }

    /// Node by id
    pub fn node(&self, id: RenderNodeId) -> Option<&RenderNode> {
        self.nodes.get(id)
    }

    /// State of a node
    pub fn node_state(&self, id: RenderNodeId) -> Option<&RenderState> {
        self.nodes.get(id).and_then(|node| node.state).and_then(|state| self.states.get(state))
    }

    /// Number of live nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// States of the subtree in depth-first order
    pub fn flatten(&self, root: RenderNodeId) -> Vec<RenderState> {
        let mut out = Vec::new();
        self.flatten_into(root, &mut out);
        out
    }

    fn flatten_into(&self, node: RenderNodeId, out: &mut Vec<RenderState>) {
        let Some(entry) = self.nodes.get(node) else {
            return;
        };
        if let Some(state) = self.node_state(node) {
            out.push(*state);
        }
        for &child in &entry.children {
            self.flatten_into(child, out);
        }
    }

    /// Apply the subtree depth-first
    pub fn render(&self, node: RenderNodeId, ctx: &mut RenderContext<'_>) {
        let Some(entry) = self.nodes.get(node) else {
            return;
        };
        if let Some(state) = self.node_state(node) {
            state.set_mode(ctx);
        }
        for &child in &entry.children {
            self.render(child, ctx);
        }
    }
}

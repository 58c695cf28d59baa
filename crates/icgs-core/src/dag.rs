//! Minimal in-memory DAG (spec §1 Non-goals: "DAG node/edge storage
//! primitives" are an external collaborator; this is the smallest
//! concrete surface [`crate::path_enum::PathEnumerator`] and
//! [`crate::pipeline::ValidationPipeline`] need to be exercised
//! end-to-end, not a general graph library).
//!
//! Every account owns exactly two nodes, `source_node` and `sink_node`,
//! joined by a permanent structural edge (spec §4.7 step 2). A
//! transaction between two accounts is represented, once committed, as
//! an edge from the source account's `source_node` to the target
//! account's `sink_node` — reverse path enumeration walks backward from
//! a transaction's target sink through that edge, then through whatever
//! earlier transactions feed the source account, until it runs out of
//! incoming edges (a source leaf).

use crate::taxonomy::{AccountId, HasAccountId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub account_id: Option<AccountId>,
}

impl HasAccountId for Node {
    fn account_id(&self) -> Option<&AccountId> {
        self.account_id.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

/// Owns all nodes and edges; per spec §9, "account owns its source and
/// sink nodes, DAG owns all edges."
#[derive(Debug, Clone, Default)]
pub struct Dag {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    account_source: BTreeMap<AccountId, NodeId>,
    account_sink: BTreeMap<AccountId, NodeId>,
    /// Edge indices keyed by their `to` node, for reverse traversal.
    incoming: BTreeMap<NodeId, Vec<usize>>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_node(&mut self, account_id: AccountId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            account_id: Some(account_id),
        });
        id
    }

    /// Ensures `account` has a `(source_node, sink_node)` pair joined by
    /// a permanent structural edge, creating them if this is the first
    /// time the account is seen. Idempotent.
    pub fn ensure_account(&mut self, account: &AccountId) -> (NodeId, NodeId) {
        if let (Some(src), Some(sink)) = (
            self.account_source.get(account).copied(),
            self.account_sink.get(account).copied(),
        ) {
            return (src, sink);
        }
        let src = self.push_node(account.clone());
        let sink = self.push_node(account.clone());
        self.account_source.insert(account.clone(), src);
        self.account_sink.insert(account.clone(), sink);
        self.insert_edge(Edge { from: src, to: sink });
        (src, sink)
    }

    pub fn account_exists(&self, account: &AccountId) -> bool {
        self.account_source.contains_key(account)
    }

    pub fn source_node(&self, account: &AccountId) -> Option<NodeId> {
        self.account_source.get(account).copied()
    }

    pub fn sink_node(&self, account: &AccountId) -> Option<NodeId> {
        self.account_sink.get(account).copied()
    }

    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.incoming
            .get(&to)
            .map(|idxs| idxs.iter().any(|&i| self.edges[i].from == from))
            .unwrap_or(false)
    }

    /// Inserts `edge` permanently. No-op (returns `false`) if the edge
    /// is already present, keeping commit idempotent (spec §4.7, §7).
    pub fn insert_edge(&mut self, edge: Edge) -> bool {
        if self.has_edge(edge.from, edge.to) {
            return false;
        }
        let idx = self.edges.len();
        self.edges.push(edge);
        self.incoming.entry(edge.to).or_default().push(idx);
        true
    }

    /// Removes `edge` if present; used to roll back a commit that fails
    /// after edge insertion (spec §4.7).
    pub fn remove_edge(&mut self, edge: Edge) {
        if let Some(idxs) = self.incoming.get_mut(&edge.to) {
            idxs.retain(|&i| self.edges[i].from != edge.from);
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Nodes with incoming edges pointing at `to`.
    pub fn incoming_sources(&self, to: NodeId) -> Vec<NodeId> {
        self.incoming
            .get(&to)
            .map(|idxs| idxs.iter().map(|&i| self.edges[i].from).collect())
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn account_count(&self) -> usize {
        self.account_source.len()
    }
}

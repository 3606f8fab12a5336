//! In-memory property graph backend.
//!
//! Executes the typed [`Op`] carried by each [`Statement`] against a
//! node/edge map, with the semantics of the Cypher the statement renders to.
//!
//! Transactions work on a private copy of the graph taken at `begin`.
//! Commit publishes the copy; rollback (or drop) discards it. Write
//! transactions are serialized, so a committed write never interleaves
//! with another one and readers only ever see committed states.
//!
//! Test hooks:
//! - [`MemoryClient::fail_on`] makes the next matching statement fail
//! - [`MemoryClient::set_available`] simulates an unreachable store
//! - [`MemoryClient::without_schema_support`] simulates a store without
//!   uniqueness constraints
//! - [`MemoryClient::hide_constraints`] simulates a constraint created by
//!   someone else after it was listed
//! - [`MemoryClient::relate`] seeds edges owned by other subsystems

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value as JsonValue};
use tokio::sync::OwnedMutexGuard;

use crate::error::AppError;
use crate::graph::row::{
    Counters, QueryResult, Row, NODES_DELETED_COLUMN, RELATIONSHIPS_DELETED_COLUMN,
};
use crate::graph::statement::{columns, NodeMatch, Op, Statement, THING_LABEL, UUID_PROPERTY};
use crate::graph::traits::{
    AccessMode, CypherExecutor, GraphClient, SchemaExecutor, Transaction, UniqueConstraint,
};

type Fault = Box<dyn Fn(&Op) -> bool + Send + Sync>;

/// A node as seen from outside the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub uuid: String,
    pub labels: BTreeSet<String>,
    pub properties: BTreeMap<String, JsonValue>,
}

/// An edge as seen from outside the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeView {
    pub from: String,
    pub rel_type: String,
    pub to: String,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default)]
struct MemNode {
    labels: BTreeSet<String>,
    properties: BTreeMap<String, JsonValue>,
}

impl MemNode {
    fn thing(uuid: &str) -> Self {
        let mut node = MemNode::default();
        node.labels.insert(THING_LABEL.to_string());
        node.properties
            .insert(UUID_PROPERTY.to_string(), json!(uuid));
        node
    }

    fn is_thing(&self) -> bool {
        self.labels.contains(THING_LABEL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemEdge {
    from: String,
    rel_type: String,
    to: String,
    order: Option<i64>,
}

/// Committed or in-flight graph contents. Nodes are keyed by UUID.
#[derive(Debug, Clone, Default)]
struct GraphState {
    nodes: BTreeMap<String, MemNode>,
    edges: Vec<MemEdge>,
    constraints: BTreeSet<UniqueConstraint>,
}

impl GraphState {
    fn matches(&self, target: &NodeMatch) -> bool {
        self.nodes
            .get(&target.uuid)
            .map(|node| target.labels.iter().all(|l| node.labels.contains(l.as_str())))
            .unwrap_or(false)
    }

    fn thing(&self, uuid: &str) -> Option<&MemNode> {
        self.nodes.get(uuid).filter(|node| node.is_thing())
    }

    fn apply(&mut self, op: &Op) -> QueryResult {
        let mut counters = Counters::default();
        let mut rows = Vec::new();

        match op {
            Op::DeleteOutgoing { node, rel_types } => {
                if self.matches(node) {
                    let nodes = &self.nodes;
                    let before = self.edges.len();
                    self.edges.retain(|edge| {
                        let doomed = edge.from == node.uuid
                            && rel_types.iter().any(|t| t.as_str() == edge.rel_type)
                            && nodes.get(&edge.to).is_some_and(MemNode::is_thing);
                        !doomed
                    });
                    counters.relationships_deleted = (before - self.edges.len()) as u64;
                }
                rows.push(Row::default().with(
                    RELATIONSHIPS_DELETED_COLUMN,
                    json!(counters.relationships_deleted),
                ));
            }
            Op::MergeNode {
                uuid,
                labels,
                properties,
            } => {
                let node = self
                    .nodes
                    .entry(uuid.clone())
                    .or_insert_with(|| MemNode::thing(uuid));
                node.properties = properties
                    .iter()
                    .map(|(k, v)| (k.clone(), json!(v)))
                    .collect();
                node.properties
                    .insert(UUID_PROPERTY.to_string(), json!(uuid));
                node.labels
                    .extend(labels.iter().map(|l| l.as_str().to_string()));
            }
            Op::MergeMembership {
                collection,
                rel_type,
                item_uuid,
                order,
            } => {
                if self.matches(collection) {
                    self.nodes
                        .entry(item_uuid.clone())
                        .or_insert_with(|| MemNode::thing(item_uuid));
                    let edge = MemEdge {
                        from: collection.uuid.clone(),
                        rel_type: rel_type.as_str().to_string(),
                        to: item_uuid.clone(),
                        order: Some(*order),
                    };
                    if !self.edges.contains(&edge) {
                        self.edges.push(edge);
                    }
                }
            }
            Op::RemoveLabels { uuid, labels } => {
                if let Some(node) = self.nodes.get_mut(uuid).filter(|n| n.is_thing()) {
                    for label in labels.iter() {
                        node.labels.remove(label.as_str());
                    }
                }
            }
            Op::DeleteIfDetached { uuid } => {
                let detached = self.thing(uuid).is_some()
                    && !self.edges.iter().any(|e| &e.from == uuid || &e.to == uuid);
                if detached {
                    self.nodes.remove(uuid);
                    counters.nodes_deleted = 1;
                }
                rows.push(Row::default().with(NODES_DELETED_COLUMN, json!(counters.nodes_deleted)));
            }
            Op::ReadMembers {
                collection,
                rel_type,
            } => {
                if self.matches(collection) {
                    rows.push(self.read_members(collection, rel_type.as_str()));
                }
            }
            Op::CountNodes { labels } => {
                let count = self
                    .nodes
                    .values()
                    .filter(|node| labels.iter().all(|l| node.labels.contains(l.as_str())))
                    .count();
                rows.push(Row::default().with(columns::COUNT, json!(count)));
            }
            Op::Ping => rows.push(Row::default().with(columns::OK, json!(1))),
        }

        QueryResult { rows, counters }
    }

    fn read_members(&self, collection: &NodeMatch, rel_type: &str) -> Row {
        let mut members: Vec<&MemEdge> = self
            .edges
            .iter()
            .filter(|e| e.from == collection.uuid && e.rel_type == rel_type)
            .filter(|e| self.thing(&e.to).is_some())
            .collect();
        // Cypher sorts nulls last.
        members.sort_by_key(|e| (e.order.is_none(), e.order));

        let mut items: Vec<JsonValue> = members.iter().map(|e| json!({ "uuid": e.to })).collect();
        // OPTIONAL MATCH with no match still produces one row with a null member.
        if items.is_empty() {
            items.push(json!({ "uuid": null }));
        }

        let properties = self
            .nodes
            .get(&collection.uuid)
            .map(|n| n.properties.clone())
            .unwrap_or_default();
        let property = |key: &str| properties.get(key).cloned().unwrap_or(JsonValue::Null);

        Row::default()
            .with(columns::UUID, property(UUID_PROPERTY))
            .with(columns::PUBLISH_REFERENCE, property("publishReference"))
            .with(columns::LAST_MODIFIED, property("lastModified"))
            .with(columns::ITEMS, JsonValue::Array(items))
    }
}

struct Inner {
    state: RwLock<GraphState>,
    writer: Arc<tokio::sync::Mutex<()>>,
    faults: Mutex<Vec<Fault>>,
    available: AtomicBool,
    schema_supported: AtomicBool,
    constraints_listed: AtomicBool,
}

impl Inner {
    fn check_available(&self) -> Result<(), AppError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::Unavailable(
                "in-memory graph marked unavailable".into(),
            ))
        }
    }

    /// Removes and reports the first registered fault matching `op`.
    fn trip_fault(&self, op: &Op) -> bool {
        let mut faults = self.faults.lock();
        match faults.iter().position(|fault| fault(op)) {
            Some(index) => {
                drop(faults.remove(index));
                true
            }
            None => false,
        }
    }
}

/// In-memory graph client.
///
/// Cheap to clone; clones share the same graph.
#[derive(Clone)]
pub struct MemoryClient {
    inner: Arc<Inner>,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(GraphState::default()),
                writer: Arc::new(tokio::sync::Mutex::new(())),
                faults: Mutex::new(Vec::new()),
                available: AtomicBool::new(true),
                schema_supported: AtomicBool::new(true),
                constraints_listed: AtomicBool::new(true),
            }),
        }
    }

    /// A client whose store has no uniqueness-constraint primitive.
    pub fn without_schema_support() -> Self {
        let client = Self::new();
        client
            .inner
            .schema_supported
            .store(false, Ordering::SeqCst);
        client
    }

    /// Makes constraint listing return nothing while creation still sees
    /// existing constraints, as when another initializer creates them
    /// between listing and creation.
    pub fn hide_constraints(&self, hidden: bool) {
        self.inner
            .constraints_listed
            .store(!hidden, Ordering::SeqCst);
    }

    /// Marks the store reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Fails the next statement whose operation satisfies `predicate`.
    ///
    /// Each registered fault fires once.
    pub fn fail_on<F>(&self, predicate: F)
    where
        F: Fn(&Op) -> bool + Send + Sync + 'static,
    {
        self.inner.faults.lock().push(Box::new(predicate));
    }

    /// Commits an edge between two `Thing` nodes, creating them if absent.
    ///
    /// Stands in for relationships written by other subsystems.
    pub fn relate(&self, from: &str, rel_type: &str, to: &str) {
        let mut state = self.inner.state.write();
        for uuid in [from, to] {
            state
                .nodes
                .entry(uuid.to_string())
                .or_insert_with(|| MemNode::thing(uuid));
        }
        state.edges.push(MemEdge {
            from: from.to_string(),
            rel_type: rel_type.to_string(),
            to: to.to_string(),
            order: None,
        });
    }

    /// Returns the committed node with this UUID.
    pub fn node(&self, uuid: &str) -> Option<NodeView> {
        self.inner.state.read().nodes.get(uuid).map(|node| NodeView {
            uuid: uuid.to_string(),
            labels: node.labels.clone(),
            properties: node.properties.clone(),
        })
    }

    /// Returns committed outgoing edges of a node, sorted by type then order.
    pub fn edges_from(&self, uuid: &str) -> Vec<EdgeView> {
        let state = self.inner.state.read();
        let mut edges: Vec<EdgeView> = state
            .edges
            .iter()
            .filter(|e| e.from == uuid)
            .map(|e| EdgeView {
                from: e.from.clone(),
                rel_type: e.rel_type.clone(),
                to: e.to.clone(),
                order: e.order,
            })
            .collect();
        edges.sort_by(|a, b| (&a.rel_type, a.order).cmp(&(&b.rel_type, b.order)));
        edges
    }

    /// Returns the number of committed edges touching a node in either direction.
    pub fn degree(&self, uuid: &str) -> usize {
        self.inner
            .state
            .read()
            .edges
            .iter()
            .filter(|e| e.from == uuid || e.to == uuid)
            .count()
    }

    /// Returns the number of committed nodes.
    pub fn node_count(&self) -> usize {
        self.inner.state.read().nodes.len()
    }
}

#[async_trait]
impl GraphClient for MemoryClient {
    type Tx<'a> = MemoryTransaction;

    async fn begin(&self, mode: AccessMode) -> Result<Self::Tx<'_>, AppError> {
        self.inner.check_available()?;

        let writer = match mode {
            AccessMode::Write => Some(self.inner.writer.clone().lock_owned().await),
            AccessMode::Read => None,
        };
        // Snapshot after acquiring the writer lock so the copy includes every
        // write committed before this one.
        let working = self.inner.state.read().clone();

        Ok(MemoryTransaction {
            inner: self.inner.clone(),
            working: Mutex::new(working),
            mode,
            _writer: writer,
            finished: false,
        })
    }

    async fn verify_connectivity(&self) -> Result<(), AppError> {
        self.inner.check_available()?;

        let ping = Statement::from(Op::Ping);
        if self.inner.trip_fault(ping.op()) {
            return Err(AppError::Unavailable("injected fault".into()));
        }
        let result = self.inner.state.write().apply(ping.op());
        match result.first().map(|row| row.get::<i64>(columns::OK)) {
            Some(Ok(1)) => Ok(()),
            _ => Err(AppError::Unavailable("unexpected ping result".into())),
        }
    }
}

#[async_trait]
impl SchemaExecutor for MemoryClient {
    async fn unique_constraints(&self) -> Result<Vec<UniqueConstraint>, AppError> {
        self.inner.check_available()?;
        if !self.inner.schema_supported.load(Ordering::SeqCst) {
            return Err(AppError::SchemaUnsupported(
                "uniqueness constraints are not available".into(),
            ));
        }
        if !self.inner.constraints_listed.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(self.inner.state.read().constraints.iter().cloned().collect())
    }

    async fn create_unique_constraint(
        &self,
        constraint: &UniqueConstraint,
    ) -> Result<(), AppError> {
        self.inner.check_available()?;
        if !self.inner.schema_supported.load(Ordering::SeqCst) {
            return Err(AppError::SchemaUnsupported(
                "uniqueness constraints are not available".into(),
            ));
        }

        let mut state = self.inner.state.write();
        if !state.constraints.insert(constraint.clone()) {
            return Err(AppError::ConstraintExists {
                label: constraint.label.to_string(),
                property: constraint.property.to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory transaction over a private copy of the graph.
pub struct MemoryTransaction {
    inner: Arc<Inner>,
    working: Mutex<GraphState>,
    mode: AccessMode,
    _writer: Option<OwnedMutexGuard<()>>,
    finished: bool,
}

#[async_trait]
impl CypherExecutor for MemoryTransaction {
    async fn execute(&self, statement: &Statement) -> Result<QueryResult, AppError> {
        self.inner.check_available()?;

        let op = statement.op();
        if op.is_write() && self.mode == AccessMode::Read {
            return Err(AppError::Query {
                message: "writing in read access mode not allowed".into(),
                query: statement.cypher().to_string(),
            });
        }
        if self.inner.trip_fault(op) {
            return Err(AppError::Query {
                message: "injected fault".into(),
                query: statement.cypher().to_string(),
            });
        }

        Ok(self.working.lock().apply(op))
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(mut self) -> Result<(), AppError> {
        self.finished = true;
        self.inner.check_available()?;

        if self.mode == AccessMode::Write {
            let working = std::mem::take(self.working.get_mut());
            let mut state = self.inner.state.write();
            // Constraints are managed outside transactions.
            let constraints = std::mem::take(&mut state.constraints);
            *state = GraphState {
                constraints,
                ..working
            };
        }
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), AppError> {
        self.finished = true;
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("MemoryTransaction dropped without commit or rollback");
        }
    }
}

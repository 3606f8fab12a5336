//! Statement builder for the collection graph shape.
//!
//! Labels and relationship types cannot be bound as Cypher parameters, so
//! they are interpolated into the statement text. Every such name goes
//! through [`Identifier`], which only admits `[A-Za-z_][A-Za-z0-9_]*`.
//! Values (UUIDs, properties, order) are always bound as parameters.
//!
//! A [`Statement`] keeps the typed [`Op`] it was built from next to the
//! rendered Cypher, so backends that don't speak Cypher (the in-memory
//! backend) execute the `Op` while Neo4j executes the text.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Value as JsonValue};

use crate::error::AppError;
use crate::graph::row::{Params, NODES_DELETED_COLUMN, RELATIONSHIPS_DELETED_COLUMN};

/// Label shared by every node this crate creates or matches by UUID.
pub const THING_LABEL: &str = "Thing";

/// Property holding a node's identity.
pub const UUID_PROPERTY: &str = "uuid";

/// Property on membership edges holding the 1-based item position.
pub const ORDER_PROPERTY: &str = "order";

/// A validated label or relationship type name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Validates `name` for interpolation into a statement.
    pub fn new(name: &str) -> Result<Self, AppError> {
        let mut chars = name.chars();
        let valid_head = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        if valid_head && valid_tail {
            Ok(Self(name.to_string()))
        } else {
            Err(AppError::InvalidIdentifier(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A non-empty, duplicate-free, ordered set of labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels(Vec<Identifier>);

impl Labels {
    /// Validates and collects labels, dropping duplicates while keeping order.
    pub fn new<I, S>(names: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut labels: Vec<Identifier> = Vec::new();
        for name in names {
            let label = Identifier::new(name.as_ref())?;
            if !labels.contains(&label) {
                labels.push(label);
            }
        }

        if labels.is_empty() {
            return Err(AppError::Validation("label set must not be empty".into()));
        }
        Ok(Self(labels))
    }

    /// The single shared `Thing` label.
    pub fn thing() -> Self {
        Self(vec![Identifier(THING_LABEL.to_string())])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identifier> {
        self.0.iter()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l.as_str() == label)
    }

    /// Renders as `A:B:C`, ready to follow a variable in a node pattern.
    pub fn to_cypher(&self) -> String {
        self.0
            .iter()
            .map(Identifier::as_str)
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Matches one node by label set and UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMatch {
    pub labels: Labels,
    pub uuid: String,
}

/// The closed set of operations the collection protocol issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Delete the node's outgoing edges of the given types to `Thing` nodes.
    DeleteOutgoing {
        node: NodeMatch,
        rel_types: Vec<Identifier>,
    },
    /// Upsert a `Thing` node by UUID, replace its properties, add labels.
    MergeNode {
        uuid: String,
        labels: Labels,
        properties: BTreeMap<String, String>,
    },
    /// Upsert the item's `Thing` node and an ordered edge to it.
    MergeMembership {
        collection: NodeMatch,
        rel_type: Identifier,
        item_uuid: String,
        order: i64,
    },
    /// Remove labels from the `Thing` node with this UUID.
    RemoveLabels { uuid: String, labels: Labels },
    /// Delete the `Thing` node with this UUID if no edge of any kind touches it.
    DeleteIfDetached { uuid: String },
    /// Fetch a collection node and its members ordered by edge order.
    ReadMembers {
        collection: NodeMatch,
        rel_type: Identifier,
    },
    /// Count nodes carrying every label.
    CountNodes { labels: Labels },
    /// Round-trip to the store.
    Ping,
}

impl Op {
    /// Whether the operation mutates the graph.
    pub fn is_write(&self) -> bool {
        match self {
            Op::DeleteOutgoing { .. }
            | Op::MergeNode { .. }
            | Op::MergeMembership { .. }
            | Op::RemoveLabels { .. }
            | Op::DeleteIfDetached { .. } => true,
            Op::ReadMembers { .. } | Op::CountNodes { .. } | Op::Ping => false,
        }
    }
}

/// Columns returned by [`Op::ReadMembers`].
pub mod columns {
    pub const UUID: &str = "uuid";
    pub const PUBLISH_REFERENCE: &str = "publishReference";
    pub const LAST_MODIFIED: &str = "lastModified";
    pub const ITEMS: &str = "items";
    pub const COUNT: &str = "count";
    pub const OK: &str = "ok";
}

/// A rendered statement: Cypher text, bound parameters and result columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    op: Op,
    cypher: String,
    params: Params,
    columns: &'static [&'static str],
}

impl Statement {
    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn cypher(&self) -> &str {
        &self.cypher
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Result columns, in RETURN order.
    pub fn columns(&self) -> &'static [&'static str] {
        self.columns
    }

    pub fn is_write(&self) -> bool {
        self.op.is_write()
    }
}

impl From<Op> for Statement {
    fn from(op: Op) -> Self {
        let (cypher, params, columns) = render(&op);
        Self {
            op,
            cypher,
            params,
            columns,
        }
    }
}

fn params<const N: usize>(pairs: [(&str, JsonValue); N]) -> Params {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn render(op: &Op) -> (String, Params, &'static [&'static str]) {
    match op {
        Op::DeleteOutgoing { node, rel_types } => {
            let types = rel_types
                .iter()
                .map(Identifier::as_str)
                .collect::<Vec<_>>()
                .join("|");
            let cypher = format!(
                "MATCH (n:{labels} {{uuid: $uuid}}) \
                 OPTIONAL MATCH (n)-[rel:{types}]->(:{thing}) \
                 DELETE rel \
                 RETURN count(rel) AS {column}",
                labels = node.labels.to_cypher(),
                thing = THING_LABEL,
                column = RELATIONSHIPS_DELETED_COLUMN,
            );
            (
                cypher,
                params([("uuid", json!(node.uuid))]),
                &[RELATIONSHIPS_DELETED_COLUMN],
            )
        }
        Op::MergeNode {
            uuid,
            labels,
            properties,
        } => {
            let mut props: serde_json::Map<String, JsonValue> = properties
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();
            props.insert(UUID_PROPERTY.to_string(), json!(uuid));

            let cypher = format!(
                "MERGE (n:{thing} {{uuid: $uuid}}) \
                 SET n = $props \
                 SET n:{labels}",
                thing = THING_LABEL,
                labels = labels.to_cypher(),
            );
            (
                cypher,
                params([("uuid", json!(uuid)), ("props", JsonValue::Object(props))]),
                &[],
            )
        }
        Op::MergeMembership {
            collection,
            rel_type,
            item_uuid,
            order,
        } => {
            let cypher = format!(
                "MATCH (n:{labels} {{uuid: $collectionUuid}}) \
                 MERGE (t:{thing} {{uuid: $itemUuid}}) \
                 MERGE (n)-[rel:{rel_type} {{{order}: $order}}]->(t)",
                labels = collection.labels.to_cypher(),
                thing = THING_LABEL,
                order = ORDER_PROPERTY,
            );
            (
                cypher,
                params([
                    ("collectionUuid", json!(collection.uuid)),
                    ("itemUuid", json!(item_uuid)),
                    ("order", json!(order)),
                ]),
                &[],
            )
        }
        Op::RemoveLabels { uuid, labels } => {
            let cypher = format!(
                "MATCH (n:{thing} {{uuid: $uuid}}) REMOVE n:{labels}",
                thing = THING_LABEL,
                labels = labels.to_cypher(),
            );
            (cypher, params([("uuid", json!(uuid))]), &[])
        }
        Op::DeleteIfDetached { uuid } => {
            let cypher = format!(
                "MATCH (n:{thing} {{uuid: $uuid}}) \
                 OPTIONAL MATCH (n)-[rel]-() \
                 WITH n, count(rel) AS relCount \
                 WHERE relCount = 0 \
                 DELETE n \
                 RETURN count(n) AS {column}",
                thing = THING_LABEL,
                column = NODES_DELETED_COLUMN,
            );
            (
                cypher,
                params([("uuid", json!(uuid))]),
                &[NODES_DELETED_COLUMN],
            )
        }
        Op::ReadMembers {
            collection,
            rel_type,
        } => {
            let cypher = format!(
                "MATCH (n:{labels} {{uuid: $uuid}}) \
                 OPTIONAL MATCH (n)-[rel:{rel_type}]->(t:{thing}) \
                 WITH n, rel, t \
                 ORDER BY rel.{order} \
                 RETURN n.uuid AS uuid, \
                 n.publishReference AS publishReference, \
                 n.lastModified AS lastModified, \
                 collect({{uuid: t.uuid}}) AS items",
                labels = collection.labels.to_cypher(),
                thing = THING_LABEL,
                order = ORDER_PROPERTY,
            );
            (
                cypher,
                params([("uuid", json!(collection.uuid))]),
                &[
                    columns::UUID,
                    columns::PUBLISH_REFERENCE,
                    columns::LAST_MODIFIED,
                    columns::ITEMS,
                ],
            )
        }
        Op::CountNodes { labels } => (
            format!("MATCH (n:{}) RETURN count(n) AS count", labels.to_cypher()),
            Params::new(),
            &[columns::COUNT],
        ),
        Op::Ping => ("RETURN 1 AS ok".to_string(), Params::new(), &[columns::OK]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story_labels() -> Labels {
        Labels::new(["ContentCollection", "Curation", "StoryPackage"]).unwrap()
    }

    #[test]
    fn test_identifier_accepts_plain_names() {
        for name in ["Thing", "SELECTS", "IS_CURATED_FOR", "_private", "Label2"] {
            assert!(Identifier::new(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_identifier_rejects_structure_altering_names() {
        for name in [
            "",
            "2Label",
            "A-B",
            "A B",
            "A:B",
            "A|B",
            "A`) DETACH DELETE (m",
            "A{uuid:1}",
            "Étiquette",
        ] {
            let err = Identifier::new(name).unwrap_err();
            assert!(matches!(err, AppError::InvalidIdentifier(_)), "{}", name);
        }
    }

    #[test]
    fn test_labels_dedupe_and_render() {
        let labels = Labels::new(["ContentCollection", "Curation", "ContentCollection"]).unwrap();
        assert_eq!(labels.to_cypher(), "ContentCollection:Curation");
        assert!(labels.contains("Curation"));
        assert!(!labels.contains("Thing"));
    }

    #[test]
    fn test_labels_reject_empty_set() {
        let empty: [&str; 0] = [];
        assert!(Labels::new(empty).is_err());
    }

    #[test]
    fn test_delete_outgoing_joins_types() {
        let stmt = Statement::from(Op::DeleteOutgoing {
            node: NodeMatch {
                labels: Labels::thing(),
                uuid: "cc-1".into(),
            },
            rel_types: vec![
                Identifier::new("SELECTS").unwrap(),
                Identifier::new("IS_CURATED_FOR").unwrap(),
            ],
        });

        assert!(stmt
            .cypher()
            .contains("OPTIONAL MATCH (n)-[rel:SELECTS|IS_CURATED_FOR]->(:Thing)"));
        assert!(stmt.cypher().starts_with("MATCH (n:Thing {uuid: $uuid})"));
        assert_eq!(stmt.params()["uuid"], json!("cc-1"));
        assert_eq!(stmt.columns(), &[RELATIONSHIPS_DELETED_COLUMN]);
        assert!(stmt.is_write());
    }

    #[test]
    fn test_merge_node_binds_all_properties() {
        let mut properties = BTreeMap::new();
        properties.insert("publishReference".to_string(), "tid_1".to_string());
        properties.insert("lastModified".to_string(), "2016-08-25T06:06:23.532Z".to_string());

        let stmt = Statement::from(Op::MergeNode {
            uuid: "cc-1".into(),
            labels: story_labels(),
            properties,
        });

        assert_eq!(
            stmt.cypher(),
            "MERGE (n:Thing {uuid: $uuid}) SET n = $props SET n:ContentCollection:Curation:StoryPackage"
        );
        assert_eq!(
            stmt.params()["props"],
            json!({
                "uuid": "cc-1",
                "publishReference": "tid_1",
                "lastModified": "2016-08-25T06:06:23.532Z"
            })
        );
    }

    #[test]
    fn test_merge_membership_orders_edge() {
        let stmt = Statement::from(Op::MergeMembership {
            collection: NodeMatch {
                labels: story_labels(),
                uuid: "cc-1".into(),
            },
            rel_type: Identifier::new("SELECTS").unwrap(),
            item_uuid: "item-1".into(),
            order: 2,
        });

        assert!(stmt
            .cypher()
            .contains("MERGE (n)-[rel:SELECTS {order: $order}]->(t)"));
        assert_eq!(stmt.params()["order"], json!(2));
        assert_eq!(stmt.params()["itemUuid"], json!("item-1"));
        assert_eq!(stmt.params()["collectionUuid"], json!("cc-1"));
    }

    #[test]
    fn test_delete_if_detached_reports_counter() {
        let stmt = Statement::from(Op::DeleteIfDetached {
            uuid: "cc-1".into(),
        });

        assert!(stmt.cypher().contains("WHERE relCount = 0 DELETE n"));
        assert!(stmt.cypher().ends_with("RETURN count(n) AS nodesDeleted"));
    }

    #[test]
    fn test_read_members_is_read_only() {
        let stmt = Statement::from(Op::ReadMembers {
            collection: NodeMatch {
                labels: story_labels(),
                uuid: "cc-1".into(),
            },
            rel_type: Identifier::new("SELECTS").unwrap(),
        });

        assert!(!stmt.is_write());
        assert!(stmt.cypher().contains("ORDER BY rel.order"));
        assert!(stmt.cypher().contains("collect({uuid: t.uuid}) AS items"));
        assert_eq!(stmt.columns().len(), 4);
    }

    #[test]
    fn test_ping_reports_ok_column() {
        let stmt = Statement::from(Op::Ping);
        assert_eq!(stmt.cypher(), "RETURN 1 AS ok");
        assert_eq!(stmt.columns(), &[columns::OK]);
        assert!(!stmt.is_write());
    }

    #[test]
    fn test_count_has_no_params() {
        let stmt = Statement::from(Op::CountNodes {
            labels: Labels::new(["ContentCollection"]).unwrap(),
        });
        assert_eq!(
            stmt.cypher(),
            "MATCH (n:ContentCollection) RETURN count(n) AS count"
        );
        assert!(stmt.params().is_empty());
    }
}

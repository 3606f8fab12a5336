//! Collection repository: the transactional write/read/delete/count protocol.
//!
//! Every call opens exactly one transaction. Write and delete steps run in
//! order inside it; the first failing step aborts the call, rolls the
//! transaction back and is reported with its [`Phase`].

use serde::Deserialize;

use crate::error::{AppError, Phase};
use crate::graph::{
    columns, AccessMode, CypherExecutor, GraphClient, NodeMatch, Op, Row, Statement, Transaction,
};
use crate::models::{CollectionKind, ContentCollection, Item};

/// Member entry as returned by the read statement. `uuid` is null for the
/// placeholder produced when the collection has no members.
#[derive(Debug, Deserialize)]
struct MemberRow {
    uuid: Option<String>,
}

/// Repository for one collection kind.
#[derive(Clone)]
pub struct CollectionRepository<C> {
    client: C,
    kind: CollectionKind,
}

impl<C: GraphClient> CollectionRepository<C> {
    pub fn new(client: C, kind: CollectionKind) -> Self {
        Self { client, kind }
    }

    pub fn kind(&self) -> &CollectionKind {
        &self.kind
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Replaces the collection node's properties, labels and full membership.
    pub async fn write(&self, collection: &ContentCollection) -> Result<(), AppError> {
        let txn = self
            .client
            .begin(AccessMode::Write)
            .await
            .map_err(|e| e.during(Phase::Begin))?;

        let result = self.write_steps(&txn, collection).await;
        finish(txn, result).await
    }

    async fn write_steps<X: CypherExecutor>(
        &self,
        txn: &X,
        collection: &ContentCollection,
    ) -> Result<(), AppError> {
        let node = self.node_match(&collection.uuid);

        let cleared = txn
            .execute(&Statement::from(Op::DeleteOutgoing {
                node: node.clone(),
                rel_types: vec![self.kind.relation().clone()],
            }))
            .await
            .map_err(|e| e.during(Phase::RelationshipCleanup))?;
        tracing::debug!(
            removed = cleared.counters.relationships_deleted,
            "Cleared previous membership"
        );

        txn.execute(&Statement::from(Op::MergeNode {
            uuid: collection.uuid.clone(),
            labels: self.kind.labels().clone(),
            properties: collection.node_properties(),
        }))
        .await
        .map_err(|e| e.during(Phase::NodeMerge))?;

        for (index, item) in collection.items.iter().enumerate() {
            let position = index + 1;
            txn.execute(&Statement::from(Op::MergeMembership {
                collection: node.clone(),
                rel_type: self.kind.relation().clone(),
                item_uuid: item.uuid.clone(),
                order: position as i64,
            }))
            .await
            .map_err(|e| e.during(Phase::ItemEdge(position)))?;
        }

        Ok(())
    }

    /// Reads a collection and its members in edge order.
    ///
    /// Returns `Ok(None)` when no node of this kind has the UUID.
    pub async fn read(&self, uuid: &str) -> Result<Option<ContentCollection>, AppError> {
        let txn = self.client.begin(AccessMode::Read).await?;

        let result = txn
            .execute(&Statement::from(Op::ReadMembers {
                collection: self.node_match(uuid),
                rel_type: self.kind.relation().clone(),
            }))
            .await;
        let result = finish(txn, result).await?;

        result.first().map(to_collection).transpose()
    }

    /// Removes the collection's edges and kind labels, then the node itself
    /// if nothing else is attached to it.
    ///
    /// Returns whether the node was deleted.
    pub async fn delete(&self, uuid: &str) -> Result<bool, AppError> {
        let txn = self
            .client
            .begin(AccessMode::Write)
            .await
            .map_err(|e| e.during(Phase::Begin))?;

        let result = self.delete_steps(&txn, uuid).await;
        finish(txn, result).await
    }

    async fn delete_steps<X: CypherExecutor>(&self, txn: &X, uuid: &str) -> Result<bool, AppError> {
        let node = self.node_match(uuid);

        txn.execute(&Statement::from(Op::DeleteOutgoing {
            node: node.clone(),
            rel_types: vec![self.kind.relation().clone()],
        }))
        .await
        .map_err(|e| e.during(Phase::RelationshipCleanup))?;

        if let Some(extra) = self.kind.extra_relation() {
            txn.execute(&Statement::from(Op::DeleteOutgoing {
                node,
                rel_types: vec![extra.clone()],
            }))
            .await
            .map_err(|e| e.during(Phase::ExtraRelationshipCleanup))?;
        }

        txn.execute(&Statement::from(Op::RemoveLabels {
            uuid: uuid.to_string(),
            labels: self.kind.labels().clone(),
        }))
        .await
        .map_err(|e| e.during(Phase::LabelRemoval))?;

        let deletion = txn
            .execute(&Statement::from(Op::DeleteIfDetached {
                uuid: uuid.to_string(),
            }))
            .await
            .map_err(|e| e.during(Phase::NodeDeletion))?;

        Ok(deletion.counters.nodes_deleted > 0)
    }

    /// Counts nodes carrying every label of this kind.
    pub async fn count(&self) -> Result<u64, AppError> {
        let txn = self.client.begin(AccessMode::Read).await?;

        let result = txn
            .execute(&Statement::from(Op::CountNodes {
                labels: self.kind.labels().clone(),
            }))
            .await;
        let result = finish(txn, result).await?;

        match result.first() {
            Some(row) => row.get(columns::COUNT),
            None => Ok(0),
        }
    }

    fn node_match(&self, uuid: &str) -> NodeMatch {
        NodeMatch {
            labels: self.kind.labels().clone(),
            uuid: uuid.to_string(),
        }
    }
}

/// Commits on success, rolls back on failure.
///
/// A failed rollback is logged and the original error is returned.
async fn finish<T, X: Transaction>(txn: X, result: Result<T, AppError>) -> Result<T, AppError> {
    match result {
        Ok(value) => {
            txn.commit().await.map_err(|e| e.during(Phase::Commit))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = txn.rollback().await {
                tracing::warn!(error = %rollback, "Rollback failed");
            }
            Err(err)
        }
    }
}

fn to_collection(row: &Row) -> Result<ContentCollection, AppError> {
    let members: Vec<MemberRow> = row.get_opt(columns::ITEMS)?.unwrap_or_default();

    Ok(ContentCollection {
        uuid: row.get(columns::UUID)?,
        // Drops the null placeholder of an empty membership.
        items: members
            .into_iter()
            .filter_map(|m| m.uuid)
            .filter(|uuid| !uuid.is_empty())
            .map(Item::new)
            .collect(),
        publish_reference: row.get_opt(columns::PUBLISH_REFERENCE)?.unwrap_or_default(),
        last_modified: row.get_opt(columns::LAST_MODIFIED)?.unwrap_or_default(),
        publication: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_membership_placeholder_collapses() {
        let row = Row::default()
            .with(columns::UUID, json!("cc-1"))
            .with(columns::PUBLISH_REFERENCE, json!("p"))
            .with(columns::LAST_MODIFIED, json!("l"))
            .with(columns::ITEMS, json!([{"uuid": null}]));

        let collection = to_collection(&row).unwrap();
        assert!(collection.items.is_empty());
        assert_eq!(collection.publish_reference, "p");
    }

    #[test]
    fn test_members_keep_row_order() {
        let row = Row::default()
            .with(columns::UUID, json!("cc-1"))
            .with(columns::ITEMS, json!([{"uuid": "b"}, {"uuid": "a"}]));

        let collection = to_collection(&row).unwrap();
        assert_eq!(collection.items, vec![Item::new("b"), Item::new("a")]);
        assert_eq!(collection.last_modified, "");
    }
}

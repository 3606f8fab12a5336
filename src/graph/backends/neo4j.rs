//! Neo4j backend implementation over the Bolt protocol (neo4rs).
//!
//! # Example
//!
//! ```ignore
//! use content_collection::graph::backends::neo4j::Neo4jClient;
//!
//! let client = Neo4jClient::connect(&config.neo4j).await?;
//! client.verify_connectivity().await?;
//! ```

use async_trait::async_trait;
use neo4rs::{query, BoltList, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph, Txn};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::config::Neo4jConfig;
use crate::error::AppError;
use crate::graph::row::{Counters, QueryResult, Row};
use crate::graph::statement::{columns, Identifier, Op, Statement};
use crate::graph::traits::{
    AccessMode, CypherExecutor, GraphClient, SchemaExecutor, Transaction, UniqueConstraint,
};

/// Neo4j graph client.
///
/// This type is cheap to clone - the underlying connection pool is shared.
#[derive(Clone)]
pub struct Neo4jClient {
    graph: Graph,
}

impl Neo4jClient {
    /// Connects to Neo4j with pooled connections.
    pub async fn connect(config: &Neo4jConfig) -> Result<Self, AppError> {
        let driver_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_deref().unwrap_or(""))
            .max_connections(config.max_connections)
            .build()?;
        let graph = Graph::connect(driver_config).await?;

        Ok(Self { graph })
    }

    /// Returns the underlying driver.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

#[async_trait]
impl GraphClient for Neo4jClient {
    type Tx<'a> = Neo4jTransaction;

    /// Opens a driver transaction.
    ///
    /// neo4rs 0.8 has no access mode on `start_txn`, so every transaction is
    /// opened as a write transaction on the server. `AccessMode::Read` is
    /// enforced here instead: write statements are refused before they are sent.
    async fn begin(&self, mode: AccessMode) -> Result<Self::Tx<'_>, AppError> {
        let txn = self.graph.start_txn().await?;
        tracing::trace!(?mode, "Neo4j transaction started");

        Ok(Neo4jTransaction {
            txn: Mutex::new(Some(txn)),
            mode,
            finished: false,
        })
    }

    async fn verify_connectivity(&self) -> Result<(), AppError> {
        let ping = Statement::from(Op::Ping);
        let unavailable = |e: neo4rs::Error| AppError::Unavailable(e.to_string());

        let mut stream = self.graph.execute(to_query(&ping)).await.map_err(unavailable)?;
        let row = stream.next().await.map_err(unavailable)?;
        match row.map(|row| row.get::<i64>(columns::OK)) {
            Some(Ok(1)) => Ok(()),
            _ => Err(AppError::Unavailable("unexpected ping result".into())),
        }
    }
}

#[async_trait]
impl SchemaExecutor for Neo4jClient {
    /// Lists constraints with `SHOW CONSTRAINTS`, falling back to
    /// `db.constraints()` on servers older than 4.2.
    async fn unique_constraints(&self) -> Result<Vec<UniqueConstraint>, AppError> {
        match self.show_constraints().await {
            Err(AppError::Neo4j(e)) if is_syntax_error(&e) => {
                tracing::debug!("SHOW CONSTRAINTS rejected, retrying with db.constraints()");
                self.legacy_constraints().await
            }
            other => other,
        }
    }

    async fn create_unique_constraint(
        &self,
        constraint: &UniqueConstraint,
    ) -> Result<(), AppError> {
        let UniqueConstraint { label, property } = constraint;
        let modern = format!(
            "CREATE CONSTRAINT FOR (n:{}) REQUIRE n.{} IS UNIQUE",
            label, property
        );
        let legacy = format!(
            "CREATE CONSTRAINT ON (n:{}) ASSERT n.{} IS UNIQUE",
            label, property
        );

        let err = match self.graph.run(query(&modern)).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if !is_syntax_error(&err) {
            return Err(constraint_error(err, constraint));
        }

        tracing::debug!("REQUIRE syntax rejected, retrying with ASSERT syntax");
        match self.graph.run(query(&legacy)).await {
            Ok(()) => Ok(()),
            Err(e) if is_syntax_error(&e) => Err(AppError::SchemaUnsupported(e.to_string())),
            Err(e) => Err(constraint_error(e, constraint)),
        }
    }
}

impl Neo4jClient {
    async fn show_constraints(&self) -> Result<Vec<UniqueConstraint>, AppError> {
        let mut stream = self
            .graph
            .execute(query(
                "SHOW CONSTRAINTS YIELD type, entityType, labelsOrTypes, properties \
                 WHERE entityType = 'NODE' AND type IN ['UNIQUENESS', 'NODE_PROPERTY_UNIQUENESS'] \
                 RETURN labelsOrTypes, properties",
            ))
            .await
            .map_err(AppError::Neo4j)?;

        let mut constraints = Vec::new();
        while let Some(row) = stream.next().await.map_err(AppError::Neo4j)? {
            let labels: Vec<String> = row.get("labelsOrTypes").map_err(decode_error)?;
            let properties: Vec<String> = row.get("properties").map_err(decode_error)?;

            // Composite constraints don't guard a single property.
            if let ([label], [property]) = (labels.as_slice(), properties.as_slice()) {
                constraints.extend(to_constraint(label, property));
            }
        }

        Ok(constraints)
    }

    async fn legacy_constraints(&self) -> Result<Vec<UniqueConstraint>, AppError> {
        let mut stream = self
            .graph
            .execute(query("CALL db.constraints() YIELD description RETURN description"))
            .await
            .map_err(schema_error)?;

        let mut constraints = Vec::new();
        while let Some(row) = stream.next().await.map_err(schema_error)? {
            let description: String = row.get("description").map_err(decode_error)?;
            constraints.extend(parse_constraint_description(&description));
        }

        Ok(constraints)
    }
}

/// Neo4j transaction.
///
/// Must be explicitly committed or rolled back; dropping it unfinished logs
/// a warning and leaves rollback to the server.
pub struct Neo4jTransaction {
    txn: Mutex<Option<Txn>>,
    mode: AccessMode,
    finished: bool,
}

impl Neo4jTransaction {
    fn take(&mut self) -> Result<Txn, AppError> {
        self.finished = true;
        self.txn
            .get_mut()
            .take()
            .ok_or_else(|| AppError::Internal("transaction already finished".into()))
    }
}

#[async_trait]
impl CypherExecutor for Neo4jTransaction {
    async fn execute(&self, statement: &Statement) -> Result<QueryResult, AppError> {
        if statement.is_write() && self.mode == AccessMode::Read {
            return Err(AppError::Internal(
                "write statement issued in a read transaction".into(),
            ));
        }

        let mut guard = self.txn.lock().await;
        let txn = guard
            .as_mut()
            .ok_or_else(|| AppError::Internal("transaction already finished".into()))?;

        let mut stream = txn
            .execute(to_query(statement))
            .await
            .map_err(|e| query_error(e, statement))?;

        let mut rows = Vec::new();
        while let Some(row) = stream
            .next(txn.handle())
            .await
            .map_err(|e| query_error(e, statement))?
        {
            rows.push(to_row(&row, statement.columns())?);
        }

        let counters = Counters::from_rows(&rows)?;
        Ok(QueryResult { rows, counters })
    }
}

#[async_trait]
impl Transaction for Neo4jTransaction {
    async fn commit(mut self) -> Result<(), AppError> {
        let txn = self.take()?;
        txn.commit().await?;
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), AppError> {
        let txn = self.take()?;
        txn.rollback().await?;
        Ok(())
    }
}

impl Drop for Neo4jTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("Neo4jTransaction dropped without commit or rollback");
        }
    }
}

/// Builds a driver query with every parameter bound.
fn to_query(statement: &Statement) -> neo4rs::Query {
    statement
        .params()
        .iter()
        .fold(query(statement.cypher()), |q, (name, value)| {
            q.param(name, json_to_bolt(value))
        })
}

/// Converts a JSON parameter into its Bolt equivalent.
fn json_to_bolt(value: &JsonValue) -> BoltType {
    match value {
        JsonValue::Null => BoltType::Null(BoltNull),
        JsonValue::Bool(b) => BoltType::from(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => BoltType::from(s.as_str()),
        JsonValue::Array(items) => {
            let list: Vec<BoltType> = items.iter().map(json_to_bolt).collect();
            BoltType::List(BoltList::from(list))
        }
        JsonValue::Object(map) => {
            let mut bolt = BoltMap::new();
            for (key, value) in map {
                bolt.put(BoltString::from(key.as_str()), json_to_bolt(value));
            }
            BoltType::Map(bolt)
        }
    }
}

/// Reads the statement's declared columns out of a driver row.
fn to_row(row: &neo4rs::Row, columns: &[&str]) -> Result<Row, AppError> {
    columns.iter().try_fold(Row::default(), |acc, column| {
        let value: JsonValue = row.get(column).map_err(decode_error)?;
        Ok(acc.with(column, value))
    })
}

fn to_constraint(label: &str, property: &str) -> Option<UniqueConstraint> {
    match (Identifier::new(label), Identifier::new(property)) {
        (Ok(label), Ok(property)) => Some(UniqueConstraint { label, property }),
        _ => {
            tracing::debug!(%label, %property, "Skipping constraint on unquoted name");
            None
        }
    }
}

/// Parses a pre-4.2 constraint description such as
/// `CONSTRAINT ON ( thing:Thing ) ASSERT (thing.uuid) IS UNIQUE`.
///
/// Returns `None` for other constraint types and composite keys.
fn parse_constraint_description(description: &str) -> Option<UniqueConstraint> {
    let rest = description.trim().strip_prefix("CONSTRAINT ON")?;
    let (node, rest) = rest.split_once("ASSERT")?;
    let property = rest.trim().strip_suffix("IS UNIQUE")?;

    let label = node
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split_once(':')?
        .1
        .trim();

    let property = property.trim().trim_start_matches('(').trim_end_matches(')');
    if property.contains(',') {
        return None;
    }
    let property = property.split_once('.')?.1.trim();

    to_constraint(label, property)
}

fn query_error(err: neo4rs::Error, statement: &Statement) -> AppError {
    AppError::Query {
        message: err.to_string(),
        query: statement.cypher().to_string(),
    }
}

fn decode_error(err: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("failed to decode Neo4j row: {}", err))
}

fn is_syntax_error(err: &neo4rs::Error) -> bool {
    let message = err.to_string();
    message.contains("SyntaxError") || message.contains("Invalid input")
}

fn schema_error(err: neo4rs::Error) -> AppError {
    if is_syntax_error(&err) || err.to_string().contains("ProcedureNotFound") {
        AppError::SchemaUnsupported(err.to_string())
    } else {
        AppError::Neo4j(err)
    }
}

fn constraint_error(err: neo4rs::Error, constraint: &UniqueConstraint) -> AppError {
    let message = err.to_string();
    if message.contains("EquivalentSchemaRuleAlreadyExists")
        || message.contains("ConstraintAlreadyExists")
        || message.contains("already exists")
    {
        AppError::ConstraintExists {
            label: constraint.label.to_string(),
            property: constraint.property.to_string(),
        }
    } else {
        AppError::Neo4j(err)
    }
}

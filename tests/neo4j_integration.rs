//! Integration tests for the Neo4j backend.
//!
//! These tests require a running Neo4j instance.
//! Run with: `NEO4J_TEST_URL=bolt://localhost:7687 cargo test --features integration --test neo4j_integration`

#![cfg(feature = "integration")]

use content_collection::config::{CollectionConfig, Neo4jConfig};
use content_collection::graph::backends::neo4j::Neo4jClient;
use content_collection::graph::{
    AccessMode, CypherExecutor, GraphClient, Labels, Op, Statement, Transaction,
};
use content_collection::models::{CollectionKind, ContentCollection};
use content_collection::services::CollectionService;
use serial_test::serial;

const TRACE: &str = "tid_integration";

fn test_config() -> Neo4jConfig {
    Neo4jConfig {
        uri: std::env::var("NEO4J_TEST_URL").unwrap_or_else(|_| "bolt://localhost:7687".into()),
        user: std::env::var("NEO4J_TEST_USER").unwrap_or_else(|_| "neo4j".into()),
        password: std::env::var("NEO4J_TEST_PASSWORD").ok(),
        ..Neo4jConfig::default()
    }
}

async fn create_client() -> Neo4jClient {
    Neo4jClient::connect(&test_config())
        .await
        .expect("Failed to connect to test database")
}

fn service(client: &Neo4jClient, config: CollectionConfig) -> CollectionService<Neo4jClient> {
    CollectionService::new(client.clone(), CollectionKind::from_config(&config).unwrap())
}

/// Clean up test data before/after tests
async fn cleanup(client: &Neo4jClient, uuids: &[&str]) {
    let _ = client
        .graph()
        .run(
            neo4rs::query("MATCH (n:Thing) WHERE n.uuid IN $uuids DETACH DELETE n")
                .param("uuids", uuids.to_vec()),
        )
        .await;
}

fn collection(uuid: &str, items: &[&str]) -> ContentCollection {
    ContentCollection {
        publish_reference: "tid_publish".into(),
        last_modified: "2016-08-25T06:06:23.532Z".into(),
        ..ContentCollection::new(uuid, items.iter().copied())
    }
}

// All tests share one database and must not interleave
#[serial]
mod database_tests {
    use super::*;

    const CC: &str = "it-cc-1";
    const ITEMS: [&str; 4] = ["it-a", "it-b", "it-c", "it-t"];

    async fn curate(client: &Neo4jClient, collection: &str, target: &str) {
        client
            .graph()
            .run(
                neo4rs::query(
                    "MATCH (c:Thing {uuid: $c}) MERGE (t:Thing {uuid: $t}) \
                     MERGE (c)-[:IS_CURATED_FOR]->(t)",
                )
                .param("c", collection)
                .param("t", target),
            )
            .await
            .expect("Failed to add curation edge");
    }

    async fn fresh() -> Neo4jClient {
        let client = create_client().await;
        cleanup(&client, &[CC, ITEMS[0], ITEMS[1], ITEMS[2], ITEMS[3]]).await;
        client
    }

    #[tokio::test]
    async fn test_check_and_initialise() {
        let client = create_client().await;
        let svc = service(&client, CollectionConfig::story_package());

        svc.check().await.expect("Neo4j reachable");
        svc.initialise().await.expect("first initialise");
        let again = svc.initialise().await.expect("second initialise");
        assert!(again.is_noop());
    }

    #[tokio::test]
    async fn test_read_transaction_refuses_writes() {
        let client = fresh().await;
        let txn = client.begin(AccessMode::Read).await.unwrap();

        let merge = Statement::from(Op::MergeNode {
            uuid: CC.to_string(),
            labels: Labels::new(["ContentCollection"]).unwrap(),
            properties: Default::default(),
        });
        assert!(txn.execute(&merge).await.is_err());
        txn.rollback().await.unwrap();

        let svc = service(&client, CollectionConfig::content_package());
        assert_eq!(svc.read(CC, TRACE).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_round_trip_and_replace() {
        let client = fresh().await;
        let svc = service(&client, CollectionConfig::content_package());

        svc.write(&collection(CC, &["it-a", "it-b"]), TRACE).await.unwrap();
        let replacement = collection(CC, &["it-c", "it-a"]);
        svc.write(&replacement, TRACE).await.unwrap();

        let read = svc.read(CC, TRACE).await.unwrap().expect("found");
        assert_eq!(read, replacement);

        cleanup(&client, &[CC, "it-a", "it-b", "it-c"]).await;
    }

    #[tokio::test]
    async fn test_empty_collection_and_not_found() {
        let client = fresh().await;
        let svc = service(&client, CollectionConfig::story_package());

        assert_eq!(svc.read(CC, TRACE).await.unwrap(), None);

        svc.write(&collection(CC, &[]), TRACE).await.unwrap();
        let read = svc.read(CC, TRACE).await.unwrap().expect("found");
        assert!(read.items.is_empty());

        cleanup(&client, &[CC]).await;
    }

    #[tokio::test]
    async fn test_delete_respects_extra_relation() {
        let client = fresh().await;
        let without_extra = service(
            &client,
            CollectionConfig {
                extra_relation_for_delete: None,
                ..CollectionConfig::story_package()
            },
        );
        let with_extra = service(&client, CollectionConfig::story_package());

        without_extra.write(&collection(CC, &["it-a"]), TRACE).await.unwrap();
        curate(&client, CC, "it-t").await;
        assert!(!without_extra.delete(CC, TRACE).await.unwrap());

        cleanup(&client, &[CC]).await;
        with_extra.write(&collection(CC, &["it-a"]), TRACE).await.unwrap();
        curate(&client, CC, "it-t").await;
        assert!(with_extra.delete(CC, TRACE).await.unwrap());
        assert_eq!(with_extra.read(CC, TRACE).await.unwrap(), None);

        cleanup(&client, &[CC, "it-a", "it-t"]).await;
    }
}

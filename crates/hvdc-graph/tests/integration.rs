//! Integration tests for hvdc-graph against a live Fuseki instance.
//!
//! These tests need a Fuseki server with an `hvdc` dataset on
//! localhost:3030. Run with:
//! cargo test --package hvdc-graph --test integration -- --ignored
//!
//! Skipped automatically if the server is not available.

use hvdc_graph::{GraphConfig, SparqlClient};

const SCRATCH: &str = "http://samsung.com/graph/TEST_SCRATCH";
const SCRATCH_COPY: &str = "http://samsung.com/graph/TEST_SCRATCH_COPY";

const FACTS: &str = r#"
@prefix ex: <http://samsung.com/project-logistics#> .
ex:Case_T1 a ex:Case ; ex:hvdcCode "HVDC-ADOPT-SCT-0001" .
ex:Case_T2 a ex:Case ; ex:hvdcCode "bad code" .
ex:Item_T1 a ex:CargoItem ; ex:belongsToCase ex:Case_T1 .
"#;

async fn connect_or_skip() -> Option<SparqlClient> {
    let client = SparqlClient::new(GraphConfig::default()).ok()?;
    match client.ping().await {
        Ok(()) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test (Fuseki not available): {e}");
            None
        }
    }
}

async fn cleanup(client: &SparqlClient) {
    let _ = client.drop_graph(SCRATCH).await;
    let _ = client.drop_graph(SCRATCH_COPY).await;
}

#[tokio::test]
#[ignore]
async fn replace_count_and_validate() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    cleanup(&client).await;

    client.replace_graph(SCRATCH, FACTS).await.unwrap();
    assert_eq!(client.triple_count(SCRATCH).await.unwrap(), 6);

    let classes = client
        .class_counts(SCRATCH, &["Case".to_string(), "Invoice".to_string()])
        .await
        .unwrap();
    assert_eq!(classes["Case"], 2);
    assert_eq!(classes["Invoice"], 0);

    let codes = client.code_format_counts(SCRATCH).await.unwrap();
    assert_eq!((codes.total, codes.valid), (2, 1));

    let refs = client.referential_counts(SCRATCH).await.unwrap();
    assert_eq!(refs.orphan_cases, 1);

    cleanup(&client).await;
}

#[tokio::test]
#[ignore]
async fn copy_then_drop() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    cleanup(&client).await;

    client.replace_graph(SCRATCH, FACTS).await.unwrap();
    client.copy_graph(SCRATCH, SCRATCH_COPY).await.unwrap();
    assert_eq!(
        client.triple_count(SCRATCH_COPY).await.unwrap(),
        client.triple_count(SCRATCH).await.unwrap()
    );

    client.drop_graph(SCRATCH_COPY).await.unwrap();
    assert_eq!(client.triple_count(SCRATCH_COPY).await.unwrap(), 0);

    cleanup(&client).await;
}

mod support;

use std::sync::Arc;

use fgraph::models::GraphNode;
use fgraph::store::{GraphStore, MemoryGraphStore, StoreOp};
use flotiqfetcher::mapper::object_to_node;
use flotiqfetcher::models::{ContentObject, ContentTypeDefinition};
use flotiqfetcher::projector::project;
use flotiqfetcher::{FlotiqClient, ReferenceResolver};
use serde_json::{json, Value};

use support::*;

fn definitions() -> Vec<ContentTypeDefinition> {
    [ctd1(), ctd_article(), ctd_media()]
        .into_iter()
        .map(|value| serde_json::from_value(value).unwrap())
        .collect()
}

fn node_of(content_type: &str, object: Value) -> GraphNode {
    let ctd = definitions()
        .into_iter()
        .find(|ctd| ctd.name == content_type)
        .unwrap();
    let object: ContentObject = serde_json::from_value(object).unwrap();
    object_to_node(&ctd, &object, BASE_URL).unwrap()
}

fn article(source: Value) -> GraphNode {
    node_of(
        "article",
        json!({
            "id": "article-1",
            "title": "Hello",
            "source": source,
            "cover": [{"dataUrl": "/api/v1/content/_media/_media-1", "type": "internal"}]
        }),
    )
}

fn resolver(
    transport: Arc<MockTransport>,
    store: Arc<MemoryGraphStore>,
    resolve_missing: bool,
) -> ReferenceResolver {
    let client = FlotiqClient::new(&options(), transport);
    ReferenceResolver::new(client, store, &definitions(), resolve_missing)
}

#[test]
fn relation_fields_carry_the_resolver() {
    let plan = project(&definitions(), None);
    let names: Vec<&str> = plan
        .relation_fields("Article")
        .iter()
        .map(|field| field.name.as_str())
        .collect();
    assert_eq!(names, vec!["source", "cover"]);
    assert_eq!(
        plan.type_named("Article")
            .unwrap()
            .get_field("source")
            .unwrap()
            .ty
            .to_string(),
        "[Type-1]"
    );
}

#[tokio::test]
async fn resolves_materialized_targets_without_requests() {
    let transport = MockTransport::new();
    let store = Arc::new(MemoryGraphStore::with_nodes(vec![
        node_of("Type-1", ctd1_object1()),
        node_of("_media", json!({"id": "_media-1", "extension": "jpg"})),
    ]));
    let resolver = resolver(transport.clone(), store, true);
    let node = article(json!([
        {"dataUrl": "/api/v1/content/Type-1/CTD1-Object-1", "type": "internal"}
    ]));

    let sources = resolver.resolve_field(&node, "source").await.unwrap();
    let covers = resolver.resolve_field(&node, "cover").await.unwrap();

    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].id, "Type-1_CTD1-Object-1");
    assert_eq!(covers[0].id, "_media-1");
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn fetches_and_materializes_missing_targets() {
    let transport = MockTransport::new();
    transport.on_json(&["/api/v1/content/Type-1/CTD1-Object-2"], ctd1_object2());
    let store = Arc::new(MemoryGraphStore::new());
    let resolver = resolver(transport.clone(), store.clone(), true);
    let node = article(json!([
        {"dataUrl": "/api/v1/content/Type-1/CTD1-Object-2", "type": "internal"},
        {"type": "internal"}
    ]));

    let sources = resolver.resolve_field(&node, "source").await.unwrap();

    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].id, "Type-1_CTD1-Object-2");
    assert_eq!(sources[0].field("name"), Some(&json!("Object 2 name")));
    assert_eq!(
        store.operations(),
        vec![StoreOp::Create("Type-1_CTD1-Object-2".to_string())]
    );
    assert_eq!(
        transport.urls_containing("CTD1-Object-2"),
        vec!["https://api.flotiq.com/api/v1/content/Type-1/CTD1-Object-2".to_string()]
    );
}

#[tokio::test]
async fn missing_targets_are_omitted_when_disabled_or_unreachable() {
    let transport = MockTransport::new();
    transport.on(&["/api/v1/content/Type-1/gone"], 404, "not found");
    let node = article(json!([
        {"dataUrl": "/api/v1/content/Type-1/CTD1-Object-2"},
        {"dataUrl": "/api/v1/content/Type-1/gone"}
    ]));

    let disabled = resolver(transport.clone(), Arc::new(MemoryGraphStore::new()), false);
    assert!(disabled.resolve_field(&node, "source").await.unwrap().is_empty());
    assert!(transport.calls().is_empty());

    let store = Arc::new(MemoryGraphStore::new());
    let enabled = resolver(transport.clone(), store.clone(), true);
    assert!(enabled.resolve_field(&node, "source").await.unwrap().is_empty());
    assert_eq!(transport.calls().len(), 2);
    assert!(store.get_nodes().unwrap().is_empty());
}

#[tokio::test]
async fn absent_field_resolves_to_empty_list() {
    let resolver = resolver(MockTransport::new(), Arc::new(MemoryGraphStore::new()), true);
    let node = node_of("article", json!({"id": "article-2", "title": "No relations"}));

    assert!(resolver.resolve_field(&node, "source").await.unwrap().is_empty());
    assert!(resolver.resolve_field(&node, "unknown").await.unwrap().is_empty());
}

use fgraph::models::{GraphNode, NodeInternal};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::{ContentObject, ContentTypeDefinition, MEDIA_CONTENT_TYPE};
use crate::projector::INTERNAL_FIELD;

/// Owner recorded on every node this engine creates.
pub const OWNER: &str = "flotiq-source";

/// Graph node id of a remote object. Media objects keep their bare id.
pub fn node_id(content_type: &str, object_id: &str) -> String {
    if content_type == MEDIA_CONTENT_TYPE {
        object_id.to_string()
    } else {
        format!("{}_{}", content_type, object_id)
    }
}

/// Hex blake3 digest of the object as received.
pub fn content_digest(object: &ContentObject) -> Result<String> {
    let bytes = serde_json::to_vec(object)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Public URL of the original media file.
pub fn media_url(base_url: &str, object: &ContentObject) -> String {
    let extension = object
        .value("extension")
        .and_then(Value::as_str)
        .unwrap_or_default();
    format!("{}/image/0x0/{}.{}", base_url, object.id, extension)
}

/// Maps a remote object onto the node shape the host stores.
pub fn object_to_node(
    ctd: &ContentTypeDefinition,
    object: &ContentObject,
    base_url: &str,
) -> Result<GraphNode> {
    let mut fields = Map::new();
    if let Some(properties) = ctd.schema_definition.properties() {
        for property in properties.keys() {
            if let Some(value) = object.value(property) {
                fields.insert(property.clone(), value.clone());
            }
        }
    }
    if ctd.is_media() {
        fields.insert("url".to_string(), Value::String(media_url(base_url, object)));
    }
    fields.insert(INTERNAL_FIELD.to_string(), object.internal.clone());

    Ok(GraphNode {
        id: node_id(&ctd.name, &object.id),
        parent: None,
        children: Vec::new(),
        internal: NodeInternal {
            node_type: ctd.node_type(),
            content_digest: content_digest(object)?,
            owner: OWNER.to_string(),
        },
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctd(name: &str, properties: Value) -> ContentTypeDefinition {
        serde_json::from_value(json!({
            "name": name,
            "schemaDefinition": {"allOf": [{}, {"properties": properties}]},
            "metaDefinition": {}
        }))
        .unwrap()
    }

    fn object(value: Value) -> ContentObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_node_ids() {
        assert_eq!(node_id("article", "1"), "article_1");
        assert_eq!(node_id("_media", "abc"), "abc");
    }

    #[test]
    fn test_object_to_node() {
        let ctd = ctd("Type-1", json!({"name": {}, "data": {}, "missing": {}}));
        let object = object(json!({
            "id": "CTD1-Object-1",
            "name": "Object 1 name",
            "data": "Object 1 data",
            "missing": null,
            "unlisted": "not in schema",
            "internal": {"createdAt": "2020-02-20T09:25:54.000000+0000", "updatedAt": null}
        }));

        let node = object_to_node(&ctd, &object, "https://api.flotiq.com").unwrap();
        assert_eq!(node.id, "Type-1_CTD1-Object-1");
        assert_eq!(node.node_type(), "Type-1");
        assert!(node.is_owned_by(OWNER));
        assert_eq!(node.parent, None);
        assert!(node.children.is_empty());
        assert_eq!(node.field("name"), Some(&json!("Object 1 name")));
        assert_eq!(node.field("data"), Some(&json!("Object 1 data")));
        assert!(node.field("missing").is_none());
        assert!(node.field("unlisted").is_none());
        assert_eq!(
            node.field("flotiqInternal").unwrap()["createdAt"],
            json!("2020-02-20T09:25:54.000000+0000")
        );
        assert_eq!(node.internal.content_digest.len(), 64);
    }

    #[test]
    fn test_digest_tracks_content() {
        let first = object(json!({"id": 1, "name": "a"}));
        let same = object(json!({"id": "1", "name": "a"}));
        let changed = object(json!({"id": 1, "name": "b"}));
        assert_eq!(content_digest(&first).unwrap(), content_digest(&same).unwrap());
        assert_ne!(content_digest(&first).unwrap(), content_digest(&changed).unwrap());
    }

    #[test]
    fn test_media_node_has_url() {
        let media = ctd("_media", json!({"extension": {}, "fileName": {}}));
        let object = object(json!({"id": "_media-1", "extension": "png", "fileName": "logo.png"}));
        let node = object_to_node(&media, &object, "https://api.flotiq.com").unwrap();
        assert_eq!(node.id, "_media-1");
        assert_eq!(
            node.field("url"),
            Some(&json!("https://api.flotiq.com/image/0x0/_media-1.png"))
        );
    }
}

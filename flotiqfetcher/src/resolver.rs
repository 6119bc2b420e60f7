//! Read-time resolution of relation fields.
//!
//! A relation value is a list of `{dataUrl, type}` descriptors. Each one is
//! looked up in the graph by its derived node id; a missing target is fetched
//! and materialized on demand when `resolveMissingRelations` is enabled.

use std::collections::HashMap;
use std::sync::Arc;

use fgraph::models::GraphNode;
use fgraph::store::GraphStore;
use serde_json::Value;

use crate::client::FlotiqClient;
use crate::error::{FlotiqError, Result};
use crate::mapper::{node_id, object_to_node};
use crate::models::{ContentTypeDefinition, MEDIA_CONTENT_TYPE};

/// Target of one relation descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPointer {
    pub data_url: String,
    pub content_type: String,
    pub object_id: String,
}

impl RelationPointer {
    /// Reads `/api/v1/content/{type}/{id}`; only the last two path segments
    /// matter.
    pub fn parse(data_url: &str) -> Result<Self> {
        let path = data_url.split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.rsplit('/').filter(|segment| !segment.is_empty());
        match (segments.next(), segments.next()) {
            (Some(object_id), Some(content_type)) => Ok(Self {
                data_url: data_url.to_string(),
                content_type: content_type.to_string(),
                object_id: object_id.to_string(),
            }),
            _ => Err(FlotiqError::InvalidDataUrl(data_url.to_string())),
        }
    }

    pub fn is_media(&self) -> bool {
        self.content_type == MEDIA_CONTENT_TYPE
    }

    pub fn node_id(&self) -> String {
        node_id(&self.content_type, &self.object_id)
    }
}

/// Pointers of a stored relation value. Descriptors without a usable
/// `dataUrl` are dropped.
pub fn relation_pointers(value: Option<&Value>) -> Vec<RelationPointer> {
    let descriptors: Vec<&Value> = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    };
    descriptors
        .into_iter()
        .filter_map(|descriptor| {
            let data_url = descriptor.get("dataUrl")?.as_str()?;
            match RelationPointer::parse(data_url) {
                Ok(pointer) => Some(pointer),
                Err(err) => {
                    log::debug!("Dropping relation descriptor: {}", err);
                    None
                }
            }
        })
        .collect()
}

pub struct ReferenceResolver {
    client: FlotiqClient,
    store: Arc<dyn GraphStore>,
    content_types: HashMap<String, ContentTypeDefinition>,
    resolve_missing: bool,
}

impl ReferenceResolver {
    pub fn new(
        client: FlotiqClient,
        store: Arc<dyn GraphStore>,
        content_types: &[ContentTypeDefinition],
        resolve_missing: bool,
    ) -> Self {
        Self {
            client,
            store,
            content_types: content_types
                .iter()
                .map(|ctd| (ctd.name.clone(), ctd.clone()))
                .collect(),
            resolve_missing,
        }
    }

    /// Resolves `field` of `node` to the target nodes, in descriptor order.
    /// Targets that cannot be found or fetched are left out.
    pub async fn resolve_field(&self, node: &GraphNode, field: &str) -> Result<Vec<GraphNode>> {
        let mut resolved = Vec::new();
        for pointer in relation_pointers(node.field(field)) {
            if let Some(target) = self.resolve(&pointer).await? {
                resolved.push(target);
            }
        }
        Ok(resolved)
    }

    pub async fn resolve(&self, pointer: &RelationPointer) -> Result<Option<GraphNode>> {
        let target_id = pointer.node_id();
        if let Some(node) = self.store.get_node(&target_id)? {
            return Ok(Some(node));
        }
        if !self.resolve_missing {
            log::debug!("Relation target {} is not materialized", target_id);
            return Ok(None);
        }
        self.materialize(pointer).await
    }

    async fn materialize(&self, pointer: &RelationPointer) -> Result<Option<GraphNode>> {
        let Some(ctd) = self.content_types.get(&pointer.content_type) else {
            log::debug!(
                "Not fetching {}: content type {} is not synchronized",
                pointer.data_url,
                pointer.content_type
            );
            return Ok(None);
        };

        let object = match self.client.fetch_object(&pointer.data_url).await {
            Ok(object) => object,
            Err(err) if err.is_transient() => {
                log::warn!("Could not fetch relation {}: {}", pointer.data_url, err);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        log::info!("Materializing missing relation target {}", pointer.node_id());
        let node = object_to_node(ctd, &object, self.client.base_url())?;
        self.store.create_node(node)?;
        Ok(self.store.get_node(&pointer.node_id())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_data_url() {
        let pointer = RelationPointer::parse("/api/v1/content/author/author-1").unwrap();
        assert_eq!(pointer.content_type, "author");
        assert_eq!(pointer.object_id, "author-1");
        assert_eq!(pointer.node_id(), "author_author-1");

        let media = RelationPointer::parse("/api/v1/content/_media/_media-abc?hydrate=1").unwrap();
        assert!(media.is_media());
        assert_eq!(media.node_id(), "_media-abc");

        assert!(RelationPointer::parse("author-1").is_err());
        assert!(RelationPointer::parse("").is_err());
    }

    #[test]
    fn test_relation_pointers_drop_malformed_descriptors() {
        let value = json!([
            {"dataUrl": "/api/v1/content/author/a1", "type": "internal"},
            {"type": "internal"},
            {"dataUrl": 5},
            {"dataUrl": "nope"},
            {"dataUrl": "/api/v1/content/author/a2"}
        ]);
        let ids: Vec<String> = relation_pointers(Some(&value))
            .iter()
            .map(RelationPointer::node_id)
            .collect();
        assert_eq!(ids, vec!["author_a1", "author_a2"]);

        assert!(relation_pointers(None).is_empty());
        assert!(relation_pointers(Some(&Value::Null)).is_empty());
    }
}

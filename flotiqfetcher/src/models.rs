use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Content type holding uploaded media. Its objects live in a flat id space.
pub const MEDIA_CONTENT_TYPE: &str = "_media";

/// Schema keywords that may sit next to real properties and are never fields.
const CONDITIONAL_KEYWORDS: [&str; 3] = ["if", "then", "else"];

/// Upper-cases the first character, leaving the rest untouched.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Graph node type for a content type name.
pub fn node_type_name(content_type: &str) -> String {
    capitalize(content_type)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeDefinition {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub internal: bool,
    pub schema_definition: SchemaDefinition,
    pub meta_definition: MetaDefinition,
}

impl ContentTypeDefinition {
    pub fn node_type(&self) -> String {
        node_type_name(&self.name)
    }

    pub fn is_media(&self) -> bool {
        self.name == MEDIA_CONTENT_TYPE
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.schema_definition.required.iter().any(|r| r == property)
    }

    /// Property names in display order: `metaDefinition.order` first, then
    /// any remaining schema properties. Conditional keywords and properties
    /// without a UI config are dropped.
    pub fn field_names(&self) -> Vec<String> {
        ordered_properties(
            self.schema_definition.properties(),
            &self.meta_definition.order,
            &self.meta_definition.properties_config,
        )
    }

    pub fn property_config(&self, property: &str) -> Option<&PropertyConfig> {
        self.meta_definition.properties_config.get(property)
    }

    /// Whether any relation, object items included, points at media.
    pub fn relates_to_media(&self) -> bool {
        self.meta_definition
            .properties_config
            .values()
            .any(PropertyConfig::relates_to_media)
    }
}

fn ordered_properties(
    properties: Option<&Map<String, Value>>,
    order: &[String],
    configs: &BTreeMap<String, PropertyConfig>,
) -> Vec<String> {
    let Some(properties) = properties else {
        return Vec::new();
    };
    let mut names: Vec<String> = order
        .iter()
        .filter(|name| properties.contains_key(name.as_str()))
        .cloned()
        .collect();
    for name in properties.keys() {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names.retain(|name| {
        !CONDITIONAL_KEYWORDS.contains(&name.as_str()) && configs.contains_key(name)
    });
    names
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    #[serde(default)]
    pub all_of: Vec<Value>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub additional_properties: Option<bool>,
}

impl SchemaDefinition {
    /// The structural property map. Content types wrap it in the second
    /// `allOf` member; plain schemas carry it at the top level.
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.all_of
            .iter()
            .rev()
            .find_map(|member| member.get("properties").and_then(Value::as_object))
            .or(self.properties.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDefinition {
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub properties_config: BTreeMap<String, PropertyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyConfig {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub input_type: String,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub validation: Option<RelationValidation>,
    #[serde(default)]
    pub items: Option<ObjectItemsConfig>,
}

impl PropertyConfig {
    fn relates_to_media(&self) -> bool {
        match PropertyKind::from_config(self) {
            Some(PropertyKind::DataSource {
                target: RelationTarget::Media,
                ..
            }) => true,
            Some(PropertyKind::Object) => self.items.as_ref().map_or(false, |items| {
                items
                    .properties_config
                    .values()
                    .any(PropertyConfig::relates_to_media)
            }),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationValidation {
    #[serde(default)]
    pub relation_contenttype: Option<String>,
    #[serde(default)]
    pub relation_multiple: Option<bool>,
}

/// UI config of the items inside an `object` property.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectItemsConfig {
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub properties_config: BTreeMap<String, PropertyConfig>,
}

impl ObjectItemsConfig {
    /// Item field names, given the item schema found under the property's
    /// `items` keyword.
    pub fn field_names(&self, item_schema: Option<&Value>) -> Vec<String> {
        ordered_properties(
            item_schema
                .and_then(|schema| schema.get("properties"))
                .and_then(Value::as_object),
            &self.order,
            &self.properties_config,
        )
    }
}

/// Where a relation points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationTarget {
    ContentType(String),
    Media,
    /// Polymorphic or unspecified target.
    Any,
}

impl RelationTarget {
    fn from_validation(validation: Option<&RelationValidation>) -> Self {
        match validation
            .and_then(|v| v.relation_contenttype.as_deref())
            .map(str::trim)
        {
            Some(MEDIA_CONTENT_TYPE) => RelationTarget::Media,
            Some(name) if !name.is_empty() => RelationTarget::ContentType(name.to_string()),
            _ => RelationTarget::Any,
        }
    }
}

/// Closed set of property input kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    Text,
    Number,
    Checkbox,
    Geo,
    Select { multiple: bool },
    SimpleList,
    Block,
    Object,
    DataSource { target: RelationTarget, multiple: bool },
}

impl PropertyKind {
    /// `None` for input kinds this engine does not know how to project.
    pub fn from_config(config: &PropertyConfig) -> Option<Self> {
        let kind = match config.input_type.as_str() {
            "text" | "textarea" | "richtext" | "markdown" | "email" | "radio" | "dateTime"
            | "date" => PropertyKind::Text,
            "select" => PropertyKind::Select {
                multiple: config.multiple,
            },
            "number" => PropertyKind::Number,
            "checkbox" => PropertyKind::Checkbox,
            "geo" => PropertyKind::Geo,
            "simpleList" => PropertyKind::SimpleList,
            "block" => PropertyKind::Block,
            "object" => PropertyKind::Object,
            "datasource" => PropertyKind::DataSource {
                target: RelationTarget::from_validation(config.validation.as_ref()),
                multiple: config
                    .validation
                    .as_ref()
                    .and_then(|v| v.relation_multiple)
                    .unwrap_or(true),
            },
            _ => return None,
        };
        Some(kind)
    }
}

/// One remote entity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContentObject {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub internal: Value,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl ContentObject {
    pub fn value(&self, property: &str) -> Option<&Value> {
        self.values.get(property).filter(|value| !value.is_null())
    }
}

/// Ids come back as strings, older records sometimes as numbers.
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentTypeList {
    pub data: Vec<ContentTypeDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPage {
    #[serde(default)]
    pub data: Vec<ContentObject>,
    #[serde(default)]
    pub total_pages: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn type_1() -> ContentTypeDefinition {
        serde_json::from_value(json!({
            "id": "Type-1",
            "name": "Type-1",
            "label": "Type-1",
            "internal": false,
            "schemaDefinition": {
                "type": "object",
                "allOf": [
                    {"$ref": "#/components/schemas/AbstractContentTypeSchemaDefinition"},
                    {"type": "object", "properties": {
                        "data": {"type": "string", "minLength": 1},
                        "name": {"type": "string", "minLength": 1},
                        "if": {"properties": {}},
                        "hidden": {"type": "string"}
                    }}
                ],
                "required": ["name", "data"],
                "additionalProperties": false
            },
            "metaDefinition": {
                "order": ["name", "data"],
                "propertiesConfig": {
                    "data": {"label": "Data", "unique": true, "helpText": "", "inputType": "text"},
                    "name": {"label": "Name", "unique": false, "helpText": "", "inputType": "text"}
                }
            },
            "deletedAt": null,
            "createdAt": "2020-02-20T09:25:54.000000+0000",
            "updatedAt": null
        }))
        .unwrap()
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("article"), "Article");
        assert_eq!(capitalize("Type-1"), "Type-1");
        assert_eq!(capitalize("_media"), "_media");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_field_names_follow_order_and_skip_unconfigured() {
        let ctd = type_1();
        assert_eq!(ctd.field_names(), vec!["name", "data"]);
        assert!(ctd.is_required("name"));
        assert!(!ctd.is_required("hidden"));
        assert_eq!(ctd.node_type(), "Type-1");
    }

    #[test]
    fn test_property_kind_mapping() {
        let config = |value: Value| -> PropertyConfig { serde_json::from_value(value).unwrap() };

        assert_eq!(
            PropertyKind::from_config(&config(json!({"inputType": "markdown"}))),
            Some(PropertyKind::Text)
        );
        assert_eq!(
            PropertyKind::from_config(&config(json!({"inputType": "select", "multiple": true}))),
            Some(PropertyKind::Select { multiple: true })
        );
        assert_eq!(
            PropertyKind::from_config(&config(json!({
                "inputType": "datasource",
                "validation": {"relationContenttype": "_media"}
            }))),
            Some(PropertyKind::DataSource {
                target: RelationTarget::Media,
                multiple: true
            })
        );
        assert_eq!(
            PropertyKind::from_config(&config(json!({
                "inputType": "datasource",
                "validation": {"relationContenttype": ""}
            }))),
            Some(PropertyKind::DataSource {
                target: RelationTarget::Any,
                multiple: true
            })
        );
        assert_eq!(
            PropertyKind::from_config(&config(json!({"inputType": "hologram"}))),
            None
        );
    }

    #[test]
    fn test_content_object_accepts_numeric_id() {
        let object: ContentObject =
            serde_json::from_value(json!({"id": 1, "title": "x", "internal": {"updatedAt": null}}))
                .unwrap();
        assert_eq!(object.id, "1");
        assert_eq!(object.value("title"), Some(&json!("x")));
        assert!(!object.values.contains_key("internal"));
    }

    #[test]
    fn test_page_without_total_pages() {
        let page: ContentPage = serde_json::from_value(json!({"data": []})).unwrap();
        assert_eq!(page.total_pages, 0);
    }
}

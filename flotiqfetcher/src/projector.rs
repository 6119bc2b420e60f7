//! Derives graph node types from content type definitions.
//!
//! Projection and registration are two separate steps. [`project`] computes a
//! [`SchemaPlan`] eagerly from the catalog; [`register`] later passes the plan
//! through the host's [`SchemaBuilder`] in one `create_types` call, together
//! with the fixed shared types and the union of all node types.

use std::collections::HashSet;

use fgraph::schema::{
    BuiltType, FieldDefinition, ResolverSpec, SchemaBuilder, TypeDefinition, TypeRef,
};
use serde_json::{json, Value};

use crate::error::Result;
use crate::models::{
    capitalize, node_type_name, ContentTypeDefinition, PropertyConfig, PropertyKind,
    RelationTarget, MEDIA_CONTENT_TYPE,
};
use crate::shared_types::{
    shared_types, BLOCK_TYPE, DATA_SOURCE_TYPE, GEO_TYPE, INTERNAL_TYPE,
};

pub const NODE_INTERFACE: &str = "Node";
pub const ANY_TYPE_UNION: &str = "FlotiqAnyType";
pub const RELATION_RESOLVER: &str = "flotiqRelation";
pub const INTERNAL_FIELD: &str = "flotiqInternal";

/// Type definitions computed from one catalog snapshot.
#[derive(Debug, Clone, Default)]
pub struct SchemaPlan {
    /// Nested object types and node types, children before their parents.
    pub types: Vec<TypeDefinition>,
    /// Node type names in catalog order.
    pub node_types: Vec<String>,
}

impl SchemaPlan {
    pub fn type_named(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|def| def.name == name)
    }

    /// Fields of `node_type` that carry the relation resolver.
    pub fn relation_fields(&self, node_type: &str) -> Vec<&FieldDefinition> {
        self.type_named(node_type)
            .map(|def| {
                def.fields()
                    .iter()
                    .filter(|field| field.resolver.is_some())
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub fn project(
    content_types: &[ContentTypeDefinition],
    include_types: Option<&[String]>,
) -> SchemaPlan {
    let mut projector = Projector {
        catalog: content_types.iter().map(|ctd| ctd.name.as_str()).collect(),
        include_types,
        processed: HashSet::new(),
        types: Vec::new(),
    };
    let mut node_types = Vec::with_capacity(content_types.len());
    for ctd in content_types {
        node_types.push(projector.node_type(ctd));
    }
    SchemaPlan {
        types: projector.types,
        node_types,
    }
}

/// Builds every planned type and registers it with the host.
pub fn register<B>(plan: &SchemaPlan, builder: &mut B) -> Result<()>
where
    B: SchemaBuilder + ?Sized,
{
    let mut built: Vec<BuiltType> = shared_types().into_iter().map(BuiltType::prebuilt).collect();
    for def in &plan.types {
        built.push(builder.build_object_type(def.clone()));
    }
    if !plan.node_types.is_empty() {
        built.push(builder.build_union_type(TypeDefinition::union(
            ANY_TYPE_UNION,
            plan.node_types.clone(),
        )));
    }
    log::info!(
        "Registering {} node type(s), {} type(s) in total",
        plan.node_types.len(),
        built.len()
    );
    builder.create_types(built)?;
    Ok(())
}

fn internal_field() -> FieldDefinition {
    FieldDefinition::new(INTERNAL_FIELD, TypeRef::named(INTERNAL_TYPE).non_null())
}

struct Projector<'a> {
    catalog: HashSet<&'a str>,
    include_types: Option<&'a [String]>,
    /// Names of nested types already claimed. A name is inserted before its
    /// fields are projected, so repeated or self-referential nesting stops.
    processed: HashSet<String>,
    types: Vec<TypeDefinition>,
}

impl Projector<'_> {
    fn node_type(&mut self, ctd: &ContentTypeDefinition) -> String {
        let name = ctd.node_type();
        let mut def = TypeDefinition::object(&name).implements(NODE_INTERFACE);
        let properties = ctd.schema_definition.properties();

        for property in ctd.field_names() {
            let Some(config) = ctd.property_config(&property) else {
                continue;
            };
            let schema = properties.and_then(|props| props.get(&property));
            if let Some(field) =
                self.field(&ctd.name, &property, config, schema, ctd.is_required(&property))
            {
                def.push_field(field);
            }
        }
        if ctd.is_media() {
            def.push_field(FieldDefinition::new("url", TypeRef::named("String")));
        }
        def.push_field(internal_field());

        self.types.push(def);
        name
    }

    fn field(
        &mut self,
        content_type: &str,
        property: &str,
        config: &PropertyConfig,
        schema: Option<&Value>,
        required: bool,
    ) -> Option<FieldDefinition> {
        let Some(kind) = PropertyKind::from_config(config) else {
            log::debug!(
                "Skipping {}.{}: unsupported input type '{}'",
                content_type,
                property,
                config.input_type
            );
            return None;
        };

        let ty = match kind {
            PropertyKind::Text => TypeRef::named("String").required_if(required),
            PropertyKind::Select { multiple: true } => TypeRef::named("String").list(),
            PropertyKind::Select { multiple: false } => {
                TypeRef::named("String").required_if(required)
            }
            PropertyKind::Number => TypeRef::named("Float").required_if(required),
            PropertyKind::Checkbox => TypeRef::named("Boolean").required_if(required),
            PropertyKind::Geo => TypeRef::named(GEO_TYPE),
            PropertyKind::SimpleList => TypeRef::named("String").list(),
            PropertyKind::Block => TypeRef::named(BLOCK_TYPE),
            PropertyKind::Object => {
                TypeRef::named(self.object_type(content_type, property, config, schema)).list()
            }
            PropertyKind::DataSource { target, .. } => {
                return Some(self.relation_field(property, &target));
            }
        };
        Some(FieldDefinition::new(property, ty))
    }

    fn object_type(
        &mut self,
        content_type: &str,
        property: &str,
        config: &PropertyConfig,
        schema: Option<&Value>,
    ) -> String {
        let name = format!("{}{}", capitalize(property), capitalize(content_type));
        if !self.processed.insert(name.clone()) {
            return name;
        }

        let item_schema = schema.and_then(|s| s.get("items"));
        let required: Vec<&str> = item_schema
            .and_then(|s| s.get("required"))
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let item_properties = item_schema.and_then(|s| s.get("properties"));

        let mut def = TypeDefinition::object(&name);
        if let Some(items) = &config.items {
            for item in items.field_names(item_schema) {
                let Some(item_config) = items.properties_config.get(&item) else {
                    continue;
                };
                let item_field_schema = item_properties.and_then(|p| p.get(&item));
                let is_required = required.contains(&item.as_str());
                if let Some(field) =
                    self.field(content_type, &item, item_config, item_field_schema, is_required)
                {
                    def.push_field(field);
                }
            }
        }
        def.push_field(internal_field());

        self.types.push(def);
        name
    }

    fn is_registered(&self, content_type: &str) -> bool {
        self.catalog.contains(content_type)
            && self
                .include_types
                .map_or(true, |allowed| allowed.iter().any(|name| name == content_type))
    }

    fn relation_field(&self, property: &str, target: &RelationTarget) -> FieldDefinition {
        let (target_type, content_type) = match target {
            RelationTarget::ContentType(name) if self.is_registered(name) => {
                (node_type_name(name), Value::String(name.clone()))
            }
            RelationTarget::Media if self.is_registered(MEDIA_CONTENT_TYPE) => (
                node_type_name(MEDIA_CONTENT_TYPE),
                Value::String(MEDIA_CONTENT_TYPE.to_string()),
            ),
            RelationTarget::Any => (ANY_TYPE_UNION.to_string(), Value::Null),
            _ => {
                return FieldDefinition::new(property, TypeRef::named(DATA_SOURCE_TYPE).list());
            }
        };
        FieldDefinition::new(property, TypeRef::named(target_type).list()).with_resolver(
            ResolverSpec {
                name: RELATION_RESOLVER.to_string(),
                args: json!({ "contentType": content_type }),
            },
        )
    }
}

//! Host-side model of the dynamic type schema.
//!
//! Source plugins describe the types they produce with [`TypeDefinition`]s,
//! pass each one through a [`SchemaBuilder`] and finally hand the built set
//! back to [`SchemaBuilder::create_types`] in a single registration call.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::errors::{Result, StorageError};

/// A reference to a type from a field position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn list(self) -> Self {
        TypeRef::List(Box::new(self))
    }

    pub fn non_null(self) -> Self {
        match self {
            TypeRef::NonNull(_) => self,
            other => TypeRef::NonNull(Box::new(other)),
        }
    }

    /// Wraps in `NonNull` when `required` is set.
    pub fn required_if(self, required: bool) -> Self {
        if required {
            self.non_null()
        } else {
            self
        }
    }

    /// The innermost named type.
    pub fn base_name(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.base_name(),
        }
    }

    pub fn is_list(&self) -> bool {
        match self {
            TypeRef::List(_) => true,
            TypeRef::NonNull(inner) => inner.is_list(),
            TypeRef::Named(_) => false,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::List(inner) => write!(f, "[{inner}]"),
            TypeRef::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

/// Names a field resolver the host should attach, with plugin-defined arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolverSpec {
    pub name: String,
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: TypeRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolver: Option<ResolverSpec>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: ResolverSpec) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    Object {
        interfaces: Vec<String>,
        fields: Vec<FieldDefinition>,
    },
    Union {
        types: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDefinition {
    pub name: String,
    pub kind: TypeKind,
}

impl TypeDefinition {
    pub fn object(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Object {
                interfaces: Vec::new(),
                fields: Vec::new(),
            },
        }
    }

    pub fn union(name: impl Into<String>, types: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Union { types },
        }
    }

    /// Adds an interface. No-op for unions.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        if let TypeKind::Object { interfaces, .. } = &mut self.kind {
            interfaces.push(interface.into());
        }
        self
    }

    /// Appends a field. No-op for unions.
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.push_field(field);
        self
    }

    pub fn push_field(&mut self, field: FieldDefinition) {
        if let TypeKind::Object { fields, .. } = &mut self.kind {
            fields.push(field);
        }
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        match &self.kind {
            TypeKind::Object { fields, .. } => fields,
            TypeKind::Union { .. } => &[],
        }
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields().iter().find(|field| field.name == name)
    }

    pub fn to_sdl(&self) -> String {
        match &self.kind {
            TypeKind::Object { interfaces, fields } => {
                let mut out = format!("type {}", self.name);
                if !interfaces.is_empty() {
                    out.push_str(" implements ");
                    out.push_str(&interfaces.join(" & "));
                }
                out.push_str(" {\n");
                for field in fields {
                    out.push_str(&format!("  {}: {}", field.name, field.ty));
                    if let Some(resolver) = &field.resolver {
                        out.push_str(&format!(" @resolver(name: \"{}\")", resolver.name));
                    }
                    out.push('\n');
                }
                out.push('}');
                out
            }
            TypeKind::Union { types } => format!("union {} = {}", self.name, types.join(" | ")),
        }
    }
}

/// A type that went through a [`SchemaBuilder`] and is ready for registration.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltType(TypeDefinition);

impl BuiltType {
    /// Fixed definitions that skip the builder step.
    pub fn prebuilt(definition: TypeDefinition) -> Self {
        BuiltType(definition)
    }

    pub fn definition(&self) -> &TypeDefinition {
        &self.0
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn into_definition(self) -> TypeDefinition {
        self.0
    }
}

/// The host's dynamic type-schema builder.
pub trait SchemaBuilder {
    fn build_object_type(&mut self, definition: TypeDefinition) -> BuiltType;
    fn build_union_type(&mut self, definition: TypeDefinition) -> BuiltType;
    fn create_types(&mut self, types: Vec<BuiltType>) -> Result<()>;
}

/// Schema builder that keeps registered types and renders them as SDL.
#[derive(Debug, Default)]
pub struct SdlSchemaBuilder {
    registered: Vec<TypeDefinition>,
    object_builds: usize,
    union_builds: usize,
}

impl SdlSchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_builds(&self) -> usize {
        self.object_builds
    }

    pub fn union_builds(&self) -> usize {
        self.union_builds
    }

    pub fn types(&self) -> &[TypeDefinition] {
        &self.registered
    }

    pub fn type_named(&self, name: &str) -> Option<&TypeDefinition> {
        self.registered.iter().find(|def| def.name == name)
    }

    pub fn render(&self) -> String {
        self.registered
            .iter()
            .map(TypeDefinition::to_sdl)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl SchemaBuilder for SdlSchemaBuilder {
    fn build_object_type(&mut self, definition: TypeDefinition) -> BuiltType {
        self.object_builds += 1;
        BuiltType(definition)
    }

    fn build_union_type(&mut self, definition: TypeDefinition) -> BuiltType {
        self.union_builds += 1;
        BuiltType(definition)
    }

    fn create_types(&mut self, types: Vec<BuiltType>) -> Result<()> {
        let mut seen: HashSet<String> = self.registered.iter().map(|t| t.name.clone()).collect();
        for built in &types {
            if !seen.insert(built.name().to_string()) {
                return Err(StorageError::Schema(format!(
                    "type '{}' registered twice",
                    built.name()
                )));
            }
        }
        log::debug!("Registering {} type(s)", types.len());
        self.registered
            .extend(types.into_iter().map(BuiltType::into_definition));
        Ok(())
    }
}

//! Fixed types every registration carries, independent of the catalog.

use fgraph::schema::{FieldDefinition, TypeDefinition, TypeRef};
use once_cell::sync::Lazy;

pub const INTERNAL_TYPE: &str = "FlotiqInternal";
pub const GEO_TYPE: &str = "FlotiqGeo";
pub const BLOCK_TYPE: &str = "FlotiqBlock";
pub const DATA_SOURCE_TYPE: &str = "DataSource";
pub const IMAGE_FIXED_TYPE: &str = "FlotiqImageFixed";
pub const IMAGE_FLUID_TYPE: &str = "FlotiqImageFluid";

fn string() -> TypeRef {
    TypeRef::named("String")
}

fn float() -> TypeRef {
    TypeRef::named("Float")
}

fn int() -> TypeRef {
    TypeRef::named("Int")
}

fn boolean() -> TypeRef {
    TypeRef::named("Boolean")
}

fn object(name: &str, fields: Vec<(&str, TypeRef)>) -> TypeDefinition {
    fields
        .into_iter()
        .fold(TypeDefinition::object(name), |def, (field, ty)| {
            def.field(FieldDefinition::new(field, ty))
        })
}

static SHARED_TYPES: Lazy<Vec<TypeDefinition>> = Lazy::new(|| {
    vec![
        object(
            INTERNAL_TYPE,
            vec![
                ("createdAt", string().non_null()),
                ("deletedAt", string().non_null()),
                ("updatedAt", string().non_null()),
                ("contentType", string().non_null()),
            ],
        ),
        object(GEO_TYPE, vec![("lat", float()), ("lon", float())]),
        object(
            BLOCK_TYPE,
            vec![
                ("time", float()),
                ("version", string()),
                ("blocks", TypeRef::named("FlotiqBlockBlock").list()),
            ],
        ),
        object(
            "FlotiqBlockBlock",
            vec![
                ("id", string()),
                ("type", string()),
                ("data", TypeRef::named("FlotiqBlockData")),
                ("tunes", TypeRef::named("FlotiqBlockTunes")),
            ],
        ),
        object(
            "FlotiqBlockData",
            vec![
                ("text", string()),
                ("level", int()),
                ("style", string()),
                ("items", TypeRef::named("FlotiqBlockDataItem").list()),
                ("url", string()),
                ("caption", string()),
                ("fileName", string()),
                ("extension", string()),
                ("width", int()),
                ("height", int()),
                ("withBorder", boolean()),
                ("withBackground", boolean()),
                ("stretched", boolean()),
                ("code", string()),
                ("message", string()),
                ("title", string()),
                ("alignment", string()),
                ("withHeadings", boolean()),
                ("content", string().list().list()),
            ],
        ),
        // List items nest arbitrarily deep.
        object(
            "FlotiqBlockDataItem",
            vec![
                ("content", string()),
                ("items", TypeRef::named("FlotiqBlockDataItem").list()),
            ],
        ),
        object(
            "FlotiqBlockTunes",
            vec![("alignmentTuneTool", TypeRef::named("FlotiqBlockAlignmentTune"))],
        ),
        object("FlotiqBlockAlignmentTune", vec![("alignment", string())]),
        object(
            IMAGE_FIXED_TYPE,
            vec![
                ("width", int()),
                ("height", int()),
                ("src", string()),
                ("srcSet", string()),
            ],
        ),
        object(
            IMAGE_FLUID_TYPE,
            vec![
                ("aspectRatio", float()),
                ("src", string()),
                ("srcSet", string()),
                ("sizes", string()),
            ],
        ),
        object(
            DATA_SOURCE_TYPE,
            vec![("dataUrl", string()), ("type", string())],
        ),
    ]
});

/// Fresh copies of the fixed type definitions, in registration order.
pub fn shared_types() -> Vec<TypeDefinition> {
    SHARED_TYPES.clone()
}

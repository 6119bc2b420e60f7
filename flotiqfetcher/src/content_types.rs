use crate::client::FlotiqClient;
use crate::error::{FlotiqError, Result};
use crate::models::{ContentTypeDefinition, ContentTypeList};
use crate::params::SyncOptions;

/// Reserved system content types that never become graph nodes.
pub const RESERVED_CONTENT_TYPES: [&str; 3] = ["_tag", "_webhooks", "_plugin_settings"];

/// Fetches the content type catalog and applies the allow-list and the
/// reserved-type deny-list. Every failure here is fatal for the run.
pub async fn get_content_types(
    client: &FlotiqClient,
    options: &SyncOptions,
) -> Result<Vec<ContentTypeDefinition>> {
    let include_types = options.include_types()?;
    let url = client.content_types_url(options.hide_internal_types);
    log::info!("Fetching content type definitions: {}", url);

    let response = match client.get(&url).await {
        Ok(response) => response,
        Err(FlotiqError::Timeout(_)) => return Err(FlotiqError::Connectivity),
        Err(err) => return Err(err),
    };

    match response.status {
        status if (200..300).contains(&status) => {}
        404 => return Err(FlotiqError::Connectivity),
        403 => return Err(FlotiqError::Authorization),
        status => {
            return Err(FlotiqError::Api {
                status,
                body: response.body,
            })
        }
    }

    let catalog: ContentTypeList = response.json()?;
    let definitions = filter_content_types(catalog.data, include_types.as_deref());
    log::info!("Loaded {} content type definition(s)", definitions.len());
    Ok(definitions)
}

/// Drops reserved types, then applies the allow-list. Media is admitted
/// alongside an allow-list only when an admitted type relates to it.
pub fn filter_content_types(
    definitions: Vec<ContentTypeDefinition>,
    include_types: Option<&[String]>,
) -> Vec<ContentTypeDefinition> {
    let definitions = definitions
        .into_iter()
        .filter(|ctd| !RESERVED_CONTENT_TYPES.contains(&ctd.name.as_str()));
    let Some(allowed) = include_types else {
        return definitions.collect();
    };

    let admitted: Vec<ContentTypeDefinition> = definitions.collect();
    let with_media = admitted
        .iter()
        .any(|ctd| allowed.contains(&ctd.name) && ctd.relates_to_media());
    admitted
        .into_iter()
        .filter(|ctd| allowed.contains(&ctd.name) || (with_media && ctd.is_media()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctd(name: &str) -> ContentTypeDefinition {
        serde_json::from_value(json!({
            "name": name,
            "label": name,
            "schemaDefinition": {},
            "metaDefinition": {}
        }))
        .unwrap()
    }

    fn names(definitions: &[ContentTypeDefinition]) -> Vec<&str> {
        definitions.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_reserved_types_are_always_dropped() {
        let all = vec![ctd("blogpost"), ctd("_tag"), ctd("_media"), ctd("_webhooks")];
        let filtered = filter_content_types(all, None);
        assert_eq!(names(&filtered), vec!["blogpost", "_media"]);
    }

    #[test]
    fn test_allow_list_keeps_order_of_catalog() {
        let all = vec![ctd("author"), ctd("blogpost"), ctd("category")];
        let allowed = vec!["category".to_string(), "author".to_string()];
        let filtered = filter_content_types(all, Some(&allowed));
        assert_eq!(names(&filtered), vec!["author", "category"]);
    }

    #[test]
    fn test_media_follows_relations_of_allowed_types() {
        let article = serde_json::from_value::<ContentTypeDefinition>(json!({
            "name": "article",
            "schemaDefinition": {"properties": {"gallery": {"type": "array"}}},
            "metaDefinition": {"propertiesConfig": {
                "gallery": {"inputType": "object", "items": {"propertiesConfig": {
                    "image": {"inputType": "datasource",
                              "validation": {"relationContenttype": "_media"}}
                }}}
            }}
        }))
        .unwrap();
        let all = || vec![ctd("author"), article.clone(), ctd("_media")];

        let strict = filter_content_types(all(), Some(&["author".to_string()]));
        assert_eq!(names(&strict), vec!["author"]);

        let related = filter_content_types(all(), Some(&["article".to_string()]));
        assert_eq!(names(&related), vec!["article", "_media"]);
    }
}

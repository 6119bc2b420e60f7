use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{FlotiqError, Result};

pub const MAX_SINGLE_FETCH_LIMIT: u64 = 1000;
pub const MAX_CONCURRENT_DATA_DOWNLOADS: usize = 50;

/// Recognized plugin options. Keys follow the camelCase names users put in
/// their configuration files.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub force_reload: bool,
    /// Kept raw so a malformed value surfaces from [`SyncOptions::validate`].
    #[serde(default)]
    pub include_types: Option<Value>,
    #[serde(default = "default_true")]
    pub resolve_missing_relations: bool,
    #[serde(default)]
    pub download_media_file: bool,
    #[serde(default = "default_object_limit")]
    pub object_limit: u64,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
    #[serde(default = "default_single_fetch_limit")]
    pub single_fetch_limit: i64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_data_downloads: i64,
    /// Asks the catalog endpoint to leave out internal content types. Off by
    /// default, since `_media` is one of them.
    #[serde(default)]
    pub hide_internal_types: bool,
}

fn default_true() -> bool {
    true
}

fn default_object_limit() -> u64 {
    100_000
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_single_fetch_limit() -> i64 {
    1_000
}

fn default_max_concurrent() -> i64 {
    10
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_token: String::new(),
            force_reload: false,
            include_types: None,
            resolve_missing_relations: true,
            download_media_file: false,
            object_limit: default_object_limit(),
            timeout: default_timeout_ms(),
            single_fetch_limit: default_single_fetch_limit(),
            max_concurrent_data_downloads: default_max_concurrent(),
            hide_internal_types: false,
        }
    }
}

impl SyncOptions {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: auth_token.into(),
            ..Self::default()
        }
    }

    /// Pre-flight checks. Nothing touches the network before this passes.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(FlotiqError::Config(
                "You must specify API url (in most cases it is \"https://api.flotiq.com\")"
                    .to_string(),
            ));
        }
        if self.auth_token.trim().is_empty() {
            return Err(FlotiqError::Config(
                "You must specify API token (if you don't know what it is check: https://flotiq.com/docs/API/)"
                    .to_string(),
            ));
        }
        self.include_types()?;
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    /// The content-type allow-list, if configured.
    pub fn include_types(&self) -> Result<Option<Vec<String>>> {
        let raw = match &self.include_types {
            None | Some(Value::Null) => return Ok(None),
            Some(raw) => raw,
        };
        let invalid = || {
            FlotiqError::Config(
                "includeTypes should be a non-empty array of content type names".to_string(),
            )
        };
        let items = raw.as_array().ok_or_else(invalid)?;
        if items.is_empty() {
            return Err(invalid());
        }
        let names = items
            .iter()
            .map(|item| match item.as_str() {
                Some(name) if !name.is_empty() => Ok(name.to_string()),
                _ => Err(invalid()),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(names))
    }

    pub fn single_fetch_limit(&self) -> u64 {
        self.single_fetch_limit.clamp(1, MAX_SINGLE_FETCH_LIMIT as i64) as u64
    }

    pub fn max_concurrent_data_downloads(&self) -> usize {
        self.max_concurrent_data_downloads
            .clamp(1, MAX_CONCURRENT_DATA_DOWNLOADS as i64) as usize
    }

    /// Page size used for every content request.
    pub fn per_page(&self) -> u64 {
        self.single_fetch_limit().min(self.object_limit).max(1)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_from_empty_json() {
        let options: SyncOptions = serde_json::from_value(json!({})).unwrap();
        assert!(options.resolve_missing_relations);
        assert!(!options.download_media_file);
        assert_eq!(options.object_limit, 100_000);
        assert_eq!(options.request_timeout(), Duration::from_millis(5_000));
        assert_eq!(options.single_fetch_limit(), 1_000);
        assert_eq!(options.max_concurrent_data_downloads(), 10);
    }

    #[test]
    fn test_clamping() {
        let options: SyncOptions = serde_json::from_value(json!({
            "singleFetchLimit": 50_000,
            "maxConcurrentDataDownloads": 0,
            "objectLimit": 250
        }))
        .unwrap();
        assert_eq!(options.single_fetch_limit(), 1_000);
        assert_eq!(options.max_concurrent_data_downloads(), 1);
        assert_eq!(options.per_page(), 250);

        let options: SyncOptions = serde_json::from_value(json!({
            "singleFetchLimit": -3,
            "maxConcurrentDataDownloads": 500
        }))
        .unwrap();
        assert_eq!(options.single_fetch_limit(), 1);
        assert_eq!(options.max_concurrent_data_downloads(), 50);
    }

    #[test]
    fn test_validate_requires_url_and_token() {
        let missing_token = SyncOptions::new("https://api.flotiq.com", "");
        assert!(matches!(
            missing_token.validate(),
            Err(FlotiqError::Config(_))
        ));

        let missing_url = SyncOptions::new("  ", "token");
        assert!(matches!(missing_url.validate(), Err(FlotiqError::Config(_))));

        assert!(SyncOptions::new("https://api.flotiq.com/", "token")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_include_types_shapes() {
        let mut options = SyncOptions::new("https://a.b", "token");
        assert_eq!(options.include_types().unwrap(), None);

        options.include_types = Some(json!(["article", "_media"]));
        assert_eq!(
            options.include_types().unwrap(),
            Some(vec!["article".to_string(), "_media".to_string()])
        );

        options.include_types = Some(json!(["article"]));
        assert_eq!(
            options.include_types().unwrap(),
            Some(vec!["article".to_string()])
        );

        for bad in [json!([]), json!("article"), json!([1, 2]), json!([""])] {
            options.include_types = Some(bad);
            assert!(options.validate().is_err());
        }
    }

    #[test]
    fn test_api_base_trims_slash() {
        let options = SyncOptions::new("https://a.b/", "token");
        assert_eq!(options.api_base(), "https://a.b");
    }
}

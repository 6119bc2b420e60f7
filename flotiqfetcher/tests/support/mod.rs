#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flotiqfetcher::client::{ApiHeaders, HttpTransport, RawResponse};
use flotiqfetcher::error::{FlotiqError, Result};
use flotiqfetcher::SyncOptions;
use serde_json::{json, Value};

pub const BASE_URL: &str = "https://api.flotiq.com";
pub const AUTH_TOKEN: &str = "qweasdzxcrtyfghvbnqweasdzxcrtyfg";

enum Reply {
    Status(u16, String),
    Timeout,
}

struct Route {
    parts: Vec<String>,
    reply: Reply,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub headers: ApiHeaders,
}

/// Scripted transport. The first route whose substrings all occur in the URL
/// answers; anything unmatched gets a 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, parts: &[&str], status: u16, body: impl Into<String>) -> &Self {
        self.push(parts, Reply::Status(status, body.into()))
    }

    pub fn on_json(&self, parts: &[&str], body: Value) -> &Self {
        self.on(parts, 200, body.to_string())
    }

    pub fn timeout_on(&self, parts: &[&str]) -> &Self {
        self.push(parts, Reply::Timeout)
    }

    fn push(&self, parts: &[&str], reply: Reply) -> &Self {
        self.routes.lock().unwrap().push(Route {
            parts: parts.iter().map(|p| p.to_string()).collect(),
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn urls_containing(&self, part: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|call| call.url)
            .filter(|url| url.contains(part))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &str, headers: &ApiHeaders, _timeout: Duration) -> Result<RawResponse> {
        self.calls.lock().unwrap().push(Call {
            url: url.to_string(),
            headers: headers.clone(),
        });
        // Let other in-flight requests interleave.
        tokio::task::yield_now().await;

        let routes = self.routes.lock().unwrap();
        let route = routes
            .iter()
            .find(|route| route.parts.iter().all(|part| url.contains(part.as_str())));
        match route.map(|route| &route.reply) {
            Some(Reply::Status(status, body)) => Ok(RawResponse {
                status: *status,
                body: body.clone(),
            }),
            Some(Reply::Timeout) => Err(FlotiqError::Timeout(url.to_string())),
            None => Ok(RawResponse {
                status: 404,
                body: format!("no route for {url}"),
            }),
        }
    }
}

pub fn options() -> SyncOptions {
    SyncOptions::new(BASE_URL, AUTH_TOKEN)
}

pub fn ctd1() -> Value {
    json!({
        "id": "Type-1",
        "name": "Type-1",
        "label": "Type-1",
        "internal": false,
        "schemaDefinition": {
            "type": "object",
            "allOf": [
                {"$ref": "#/components/schemas/AbstractContentTypeSchemaDefinition"},
                {
                    "type": "object",
                    "properties": {
                        "data": {"type": "string", "minLength": 1},
                        "name": {"type": "string", "minLength": 1}
                    }
                }
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
    })
}

/// Content type with a relation to `Type-1` and one to media.
pub fn ctd_article() -> Value {
    json!({
        "name": "article",
        "label": "Article",
        "schemaDefinition": {
            "allOf": [
                {"$ref": "#/components/schemas/AbstractContentTypeSchemaDefinition"},
                {"type": "object", "properties": {
                    "title": {"type": "string"},
                    "source": {"type": "array"},
                    "cover": {"type": "array"}
                }}
            ],
            "required": ["title"]
        },
        "metaDefinition": {
            "order": ["title", "source", "cover"],
            "propertiesConfig": {
                "title": {"label": "Title", "inputType": "text"},
                "source": {"label": "Source", "inputType": "datasource",
                           "validation": {"relationContenttype": "Type-1"}},
                "cover": {"label": "Cover", "inputType": "datasource",
                          "validation": {"relationContenttype": "_media"}}
            }
        }
    })
}

pub fn ctd_media() -> Value {
    json!({
        "name": "_media",
        "label": "Media",
        "internal": true,
        "schemaDefinition": {
            "allOf": [
                {"$ref": "#/components/schemas/AbstractContentTypeSchemaDefinition"},
                {"type": "object", "properties": {
                    "fileName": {"type": "string"},
                    "extension": {"type": "string"},
                    "mimeType": {"type": "string"}
                }}
            ]
        },
        "metaDefinition": {
            "propertiesConfig": {
                "fileName": {"inputType": "text"},
                "extension": {"inputType": "text"},
                "mimeType": {"inputType": "text"}
            }
        }
    })
}

pub fn object(id: &str, name: &str, data: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "data": data,
        "internal": {
            "deletedAt": null,
            "createdAt": "2020-02-20T09:25:54.000000+0000",
            "updatedAt": null,
            "contentType": "Type-1"
        }
    })
}

pub fn ctd1_object1() -> Value {
    object("CTD1-Object-1", "Object 1 name", "Object 1 data")
}

pub fn ctd1_object2() -> Value {
    object("CTD1-Object-2", "Object 2 name", "Object 2 data")
}

pub fn catalog(types: Vec<Value>) -> Value {
    json!({ "data": types })
}

pub fn page(objects: Vec<Value>, total_pages: u64) -> Value {
    json!({ "data": objects, "total_pages": total_pages })
}

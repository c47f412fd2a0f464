//! Read-only checks of the bos, cfs and ims REST APIs.
//!
//! Every request goes through the `ApiClient` port; a failed request or an
//! unexpected body shape is logged and fails the endpoint, and the remaining
//! endpoints are still checked.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::domain::errors::ApiError;
use crate::domain::models::ImsRecipe;
use crate::domain::ports::ApiClient;

const BOS_VERSIONS: &str = "/apis/bos/";

const BOS_OBJECTS: &[&str] = &[
    "/apis/bos/v1",
    "/apis/bos/v1/version",
    "/apis/bos/v2",
    "/apis/bos/v2/version",
    "/apis/bos/v1/healthz",
    "/apis/bos/v2/healthz",
    "/apis/bos/v2/options",
    "/apis/bos/v1/sessiontemplatetemplate",
    "/apis/bos/v2/sessiontemplatetemplate",
];

const BOS_LISTS: &[&str] = &[
    "/apis/bos/v2/components",
    "/apis/bos/v1/sessiontemplate",
    "/apis/bos/v2/sessiontemplates",
    "/apis/bos/v1/session",
    "/apis/bos/v2/sessions",
];

const CFS_OBJECTS: &[&str] = &[
    "/apis/cfs/healthz",
    "/apis/cfs/",
    "/apis/cfs/versions",
    "/apis/cfs/v2",
    "/apis/cfs/v3",
    "/apis/cfs/v2/options",
    "/apis/cfs/v3/options",
];

const IMS_RECIPES: &str = "/apis/ims/recipes";

const IMS_HEALTH: &[&str] = &["/apis/ims/healthz/live", "/apis/ims/healthz/ready"];

const IMS_LISTS: &[&str] = &["/apis/ims/images", "/apis/ims/jobs", "/apis/ims/public-keys"];

/// A cfs collection and the field that identifies its items.
#[derive(Debug, Clone, Copy)]
struct CfsEndpoint {
    name: &'static str,
    id_field: &'static str,
    versions: &'static [u8],
}

const CFS_ENDPOINTS: [CfsEndpoint; 4] = [
    CfsEndpoint {
        name: "components",
        id_field: "id",
        versions: &[2, 3],
    },
    CfsEndpoint {
        name: "configurations",
        id_field: "name",
        versions: &[2, 3],
    },
    CfsEndpoint {
        name: "sessions",
        id_field: "name",
        versions: &[2, 3],
    },
    CfsEndpoint {
        name: "sources",
        id_field: "name",
        versions: &[3],
    },
];

/// Newest first; v2 is skipped once v3 reports more than one page.
const CFS_VERSIONS: [u8; 2] = [3, 2];

/// Items of a paged cfs list response, and whether more pages follow.
///
/// The body must be an object with the item list under `field` and a `next`
/// field that is either null or an object.
pub fn parse_paged(path: &str, body: Value, field: &str) -> Result<(Vec<Value>, bool), ApiError> {
    let decode = |reason: String| ApiError::Decode {
        path: path.to_string(),
        reason,
    };
    let Value::Object(mut map) = body else {
        return Err(decode("Response is not a JSON object".to_string()));
    };
    let next = map
        .remove("next")
        .ok_or_else(|| decode("Response is missing expected 'next' field".to_string()))?;
    let items = match map.remove(field) {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(decode(format!("Response field '{field}' is not a list"))),
        None => return Err(decode(format!("Response is missing expected '{field}' field"))),
    };
    let more_pages = match next {
        Value::Null => false,
        Value::Object(_) => true,
        _ => return Err(decode("Response field 'next' is neither null nor an object".to_string())),
    };
    Ok((items, more_pages))
}

/// The string value of `id_field` in the first item.
pub fn first_id(path: &str, items: &[Value], id_field: &str) -> Result<String, ApiError> {
    let decode = |reason: String| ApiError::Decode {
        path: path.to_string(),
        reason,
    };
    let first = items
        .first()
        .ok_or_else(|| decode("List is empty".to_string()))?
        .as_object()
        .ok_or_else(|| decode("First item in list is not an object".to_string()))?;
    match first.get(id_field) {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(_) => Err(decode(format!("First item's '{id_field}' field is not a string"))),
        None => Err(decode(format!("First item is missing '{id_field}' field"))),
    }
}

/// Whether `records` (the IMS recipe list) holds `expected` with a link.
///
/// A record with the right name but another distro, or a second matching
/// record, is only a warning.
pub fn default_recipe_present(expected: &ImsRecipe, records: &[Value]) -> bool {
    let mut found: Option<&str> = None;
    let mut passed = true;
    for record in records.iter().filter(|r| r["name"].as_str() == Some(expected.name.as_str())) {
        let id = record["id"].as_str().unwrap_or_default();
        if record["linux_distribution"].as_str() != Some(expected.distro.as_str()) {
            warn!(
                recipe = %expected,
                id,
                distro = %record["linux_distribution"],
                "Found an IMS record for the default recipe with a different distro"
            );
            continue;
        }
        if let Some(previous) = found {
            warn!(recipe = %expected, first = previous, second = id, "Multiple IMS records match the default recipe");
        }
        found = Some(id);
        if record.get("link").is_none_or(Value::is_null) {
            error!(recipe = %expected, id, "Recipe link should not be null");
            passed = false;
        }
    }

    match found {
        Some(id) => {
            info!(recipe = %expected, id, "Found default recipe in IMS");
            passed
        }
        None => {
            error!(recipe = %expected, "No IMS recipe record found with this name and distro");
            false
        }
    }
}

/// GET requests that must return a given JSON shape.
#[derive(Clone)]
pub struct ApiSurface {
    client: Arc<dyn ApiClient>,
}

impl ApiSurface {
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        Self { client }
    }

    /// GET `path`, logging a failure.
    pub async fn get(&self, path: &str) -> Option<Value> {
        match self.client.get_json(path).await {
            Ok(body) => Some(body),
            Err(e) => {
                error!(path, error = %e, "API request failed");
                None
            }
        }
    }

    /// GET `path` and require a JSON object.
    pub async fn object(&self, path: &str) -> Option<Map<String, Value>> {
        match self.get(path).await? {
            Value::Object(map) => Some(map),
            _ => {
                error!(path, "Response is not a JSON object");
                None
            }
        }
    }

    /// GET `path` and require a JSON list.
    pub async fn list(&self, path: &str) -> Option<Vec<Value>> {
        match self.get(path).await? {
            Value::Array(items) => {
                debug!(path, count = items.len(), "Listed");
                Some(items)
            }
            _ => {
                error!(path, "Response is not a JSON list");
                None
            }
        }
    }

    /// `object` for every path, without stopping at the first failure.
    pub async fn objects(&self, paths: &[&str]) -> bool {
        let mut passed = true;
        for path in paths {
            if self.object(path).await.is_none() {
                passed = false;
            }
        }
        passed
    }

    /// `list` for every path, without stopping at the first failure.
    pub async fn lists(&self, paths: &[&str]) -> bool {
        let mut passed = true;
        for path in paths {
            if self.list(path).await.is_none() {
                passed = false;
            }
        }
        passed
    }

    /// bos: the version list, the per-version objects and the collections.
    pub async fn bos(&self) -> bool {
        info!("Checking bos API endpoints");
        let mut passed = match self.list(BOS_VERSIONS).await {
            Some(versions) if versions.iter().all(Value::is_object) => true,
            Some(_) => {
                error!(path = BOS_VERSIONS, "Version list entries must be JSON objects");
                false
            }
            None => false,
        };
        if !self.objects(BOS_OBJECTS).await {
            passed = false;
        }
        if !self.lists(BOS_LISTS).await {
            passed = false;
        }
        passed
    }

    /// cfs: health, version and option objects, then every collection in
    /// every version that serves it.
    pub async fn cfs(&self) -> bool {
        info!("Checking cfs API endpoints");
        let mut passed = self.objects(CFS_OBJECTS).await;
        for endpoint in CFS_ENDPOINTS {
            if !self.cfs_endpoint(endpoint).await {
                passed = false;
            }
        }
        passed
    }

    /// List the collection and, when it has items, fetch the first one by id.
    async fn cfs_endpoint(&self, endpoint: CfsEndpoint) -> bool {
        let mut passed = true;
        let mut more_pages = false;
        for version in CFS_VERSIONS {
            if !endpoint.versions.contains(&version) {
                debug!(endpoint = endpoint.name, version, "Not served by this cfs version");
                continue;
            }
            if version == 2 && more_pages {
                info!(endpoint = endpoint.name, "Too many items to list through cfs v2; skipping");
                continue;
            }

            let path = format!("/apis/cfs/v{version}/{}", endpoint.name);
            info!(endpoint = endpoint.name, version, "Listing cfs collection");
            let items = if version >= 3 {
                let Some(body) = self.get(&path).await else {
                    passed = false;
                    continue;
                };
                match parse_paged(&path, body, endpoint.name) {
                    Ok((items, more)) => {
                        more_pages = more;
                        items
                    }
                    Err(e) => {
                        error!(error = %e, "Unexpected cfs list response");
                        passed = false;
                        continue;
                    }
                }
            } else {
                let Some(items) = self.list(&path).await else {
                    passed = false;
                    continue;
                };
                items
            };

            if items.is_empty() {
                info!(path = %path, "Empty list; skipping item lookup");
                continue;
            }
            let id = match first_id(&path, &items, endpoint.id_field) {
                Ok(id) => id,
                Err(e) => {
                    error!(error = %e, "Unable to identify first cfs item");
                    passed = false;
                    continue;
                }
            };

            let item_path = format!("{path}/{id}");
            let Some(item) = self.object(&item_path).await else {
                passed = false;
                continue;
            };
            if item.get(endpoint.id_field).and_then(Value::as_str) != Some(id.as_str()) {
                error!(
                    path = %item_path,
                    field = endpoint.id_field,
                    expected = %id,
                    actual = ?item.get(endpoint.id_field),
                    "cfs item has unexpected id"
                );
                passed = false;
            }
        }
        passed
    }

    /// ims: the recipe list, which must hold `expected` when one is set.
    ///
    /// The health, version, image, job and public key endpoints are queried
    /// and logged but do not affect the result.
    pub async fn ims(&self, expected: Option<&ImsRecipe>) -> bool {
        info!("Checking ims API endpoints");
        let passed = match self.list(IMS_RECIPES).await {
            Some(records) => {
                info!(count = records.len(), "Found recipe records in IMS");
                expected.is_none_or(|recipe| default_recipe_present(recipe, &records))
            }
            None => false,
        };

        for path in IMS_HEALTH {
            if self.object(path).await.is_some() {
                info!(path, "IMS health endpoint answered");
            }
        }
        if let Some(version) = self.object("/apis/ims/version").await {
            info!(version = %version.get("version").unwrap_or(&serde_json::Value::Null), "IMS version");
        }
        for path in IMS_LISTS {
            if let Some(items) = self.list(path).await {
                info!(path, count = items.len(), "Listed IMS records");
            }
        }
        passed
    }
}

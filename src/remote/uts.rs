//! UTS REST client: the concrete `RemoteLookup` over the terminology
//! service's HTTP API.
//!
//! Handles authentication, pagination and retry. Per-identifier oddities
//! (missing entries, malformed payloads, timeouts) degrade to empty results
//! with a warning; transport failures that survive the retry budget are
//! returned as errors and abort the run.

use super::{HierarchyDirection, RelationKind, RemoteLookup};
use crate::config::RemoteConfig;
use crate::error::{Result, TermgraphError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Paginated response envelope shared by the content endpoints.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    result: Vec<T>,
    #[serde(default = "default_page_count")]
    page_count: u32,
}

fn default_page_count() -> u32 {
    1
}

#[derive(Deserialize)]
struct PreferredAtomResponse {
    result: PreferredAtom,
}

#[derive(Deserialize)]
struct PreferredAtom {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct ConceptResponse {
    result: ConceptContent,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConceptContent {
    #[serde(default = "Vec::new")]
    semantic_types: Vec<SemanticType>,
}

#[derive(Deserialize)]
struct SemanticType {
    #[serde(default)]
    uri: String,
}

#[derive(Deserialize)]
struct Atom {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Relation {
    #[serde(default)]
    relation_label: String,
    #[serde(default)]
    related_id: String,
}

#[derive(Deserialize)]
struct SourceAtom {
    #[serde(default)]
    ui: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default = "Vec::new")]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    ui: String,
}

/// Relation label used by the service for each relation family.
fn relation_label(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::Narrower => "RN",
        RelationKind::Broader => "RB",
        RelationKind::RelatedOther => "RO",
    }
}

/// Trailing path segment of a service URI (ids come back as full URLs).
fn last_segment(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

/// First search hit that is a real concept id. The service pads empty result
/// sets with a single "NONE" placeholder hit.
fn first_real_hit(hits: &[SearchHit]) -> Option<String> {
    hits.iter()
        .map(|h| h.ui.as_str())
        .find(|ui| !ui.is_empty() && *ui != "NONE")
        .map(String::from)
}

/// Authenticated client for the UTS REST API.
pub struct UtsClient {
    client: Client,
    base_url: String,
    api_key: String,
    version: String,
    secondary_source: String,
    max_retries: usize,
}

impl UtsClient {
    /// Build a client from config; the API key is read from the environment
    /// variable the config names.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            TermgraphError::Config(format!(
                "Environment variable {} not set",
                config.api_key_env
            ))
        })?;
        let base = url::Url::parse(&config.base_url).map_err(|e| {
            TermgraphError::Config(format!(
                "Invalid remote.base_url '{}': {}",
                config.base_url, e
            ))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| TermgraphError::Remote(format!("Failed to build HTTP client: {}", e)))?;
        Ok(UtsClient {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            api_key,
            version: config.version.clone(),
            secondary_source: config.secondary_source.clone(),
            max_retries: config.max_retries,
        })
    }

    /// GET a JSON document with retry on rate limiting and server errors.
    ///
    /// Returns `Ok(None)` for the transient cases treated as "no data": a
    /// 404, a request timeout, or a payload that fails to parse.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            let request = self
                .client
                .get(&url)
                .query(&[("apiKey", self.api_key.as_str())])
                .query(query);

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == reqwest::StatusCode::NOT_FOUND {
                        log::debug!("No entry at {} (404)", path);
                        return Ok(None);
                    }
                    if status.as_u16() == 429 || status.is_server_error() {
                        if attempt < self.max_retries {
                            log::warn!(
                                "Retry {}/{} for {} after status {}",
                                attempt + 1,
                                self.max_retries,
                                path,
                                status
                            );
                            tokio::time::sleep(delay).await;
                            delay *= 2;
                            attempt += 1;
                            continue;
                        }
                        return Err(TermgraphError::Remote(format!(
                            "Service error {} for {} after {} retries",
                            status, path, attempt
                        )));
                    }
                    if !status.is_success() {
                        let body = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "unreadable response body".to_string());
                        return Err(TermgraphError::Remote(format!(
                            "Unexpected status {} for {}: {}",
                            status, path, body
                        )));
                    }
                    match response.json::<T>().await {
                        Ok(parsed) => return Ok(Some(parsed)),
                        Err(e) => {
                            log::warn!("Malformed response for {}: {}", path, e);
                            return Ok(None);
                        }
                    }
                }
                Err(e) if e.is_timeout() => {
                    log::warn!("Request timed out for {}. Treating as no data", path);
                    return Ok(None);
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        log::warn!(
                            "Retry {}/{} for {} after transport error: {}",
                            attempt + 1,
                            self.max_retries,
                            path,
                            e
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                        attempt += 1;
                        continue;
                    }
                    return Err(TermgraphError::Remote(format!(
                        "Transport failure for {} after {} retries: {}",
                        path, attempt, e
                    )));
                }
            }
        }
    }

    /// Collect every page of a paginated content endpoint.
    async fn get_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let mut q: Vec<(&str, String)> = query.to_vec();
            q.push(("pageNumber", page.to_string()));
            let Some(body) = self.get_json::<Page<T>>(path, &q).await? else {
                break;
            };
            let page_count = body.page_count.max(1);
            items.extend(body.result);
            if page >= page_count {
                break;
            }
            page += 1;
        }
        Ok(items)
    }
}

#[async_trait]
impl RemoteLookup for UtsClient {
    async fn preferred_term(&self, id: &str) -> Result<Option<String>> {
        let path = format!("/rest/content/{}/CUI/{}/atoms/preferred", self.version, id);
        let response = self.get_json::<PreferredAtomResponse>(&path, &[]).await?;
        Ok(response
            .map(|r| r.result.name)
            .filter(|name| !name.is_empty()))
    }

    async fn semantic_types(&self, id: &str) -> Result<BTreeSet<String>> {
        let path = format!("/rest/content/{}/CUI/{}", self.version, id);
        let Some(response) = self.get_json::<ConceptResponse>(&path, &[]).await? else {
            return Ok(BTreeSet::new());
        };
        Ok(response
            .result
            .semantic_types
            .iter()
            .filter(|t| !t.uri.is_empty())
            .map(|t| last_segment(&t.uri).to_string())
            .collect())
    }

    async fn english_variants(&self, id: &str) -> Result<BTreeSet<String>> {
        let path = format!("/rest/content/{}/CUI/{}/atoms", self.version, id);
        let query = [("language", "ENG".to_string())];
        let atoms: Vec<Atom> = self.get_pages(&path, &query).await?;
        Ok(atoms
            .into_iter()
            .filter(|a| !a.name.is_empty())
            .map(|a| a.name)
            .collect())
    }

    async fn relation(&self, id: &str, kind: RelationKind) -> Result<BTreeSet<String>> {
        let path = format!("/rest/content/{}/CUI/{}/relations", self.version, id);
        let relations: Vec<Relation> = self.get_pages(&path, &[]).await?;
        let label = relation_label(kind);
        Ok(relations
            .iter()
            .filter(|r| r.relation_label == label && !r.related_id.is_empty())
            .map(|r| last_segment(&r.related_id).to_string())
            .collect())
    }

    async fn secondary_hierarchy(
        &self,
        id: &str,
        direction: HierarchyDirection,
    ) -> Result<BTreeSet<String>> {
        let endpoint = match direction {
            HierarchyDirection::Parents => "parents",
            HierarchyDirection::Children => "children",
        };
        let path = format!(
            "/rest/content/{}/source/{}/{}/{}",
            self.version, self.secondary_source, id, endpoint
        );
        let atoms: Vec<SourceAtom> = self.get_pages(&path, &[]).await?;
        Ok(atoms
            .into_iter()
            .filter(|a| !a.ui.is_empty())
            .map(|a| a.ui)
            .collect())
    }

    async fn primary_id(&self, secondary_id: &str) -> Result<Option<String>> {
        let path = format!("/rest/search/{}", self.version);
        let query = [
            ("string", secondary_id.to_string()),
            ("inputType", "sourceUi".to_string()),
            ("searchType", "exact".to_string()),
            ("sabs", self.secondary_source.clone()),
        ];
        let Some(response) = self.get_json::<SearchResponse>(&path, &query).await? else {
            return Ok(None);
        };
        Ok(first_real_hit(&response.result.results))
    }
}

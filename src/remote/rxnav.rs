//! Drug-vocabulary REST client: the concrete `DrugLookup` over an
//! RxNav-style HTTP API.
//!
//! The service is unauthenticated and unpaginated, so this client is a
//! slimmer sibling of `UtsClient` with the same degradation policy:
//! missing entries, malformed payloads and timeouts become empty results
//! with a warning; transport failures that survive the retry budget abort
//! the load.

use super::{DrugLookup, DrugRelation};
use crate::config::RemoteConfig;
use crate::error::{Result, TermgraphError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RelatedResponse {
    #[serde(default)]
    related_group: RelatedGroup,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RelatedGroup {
    #[serde(default)]
    concept_group: Vec<ConceptGroup>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConceptGroup {
    #[serde(default)]
    concept_properties: Vec<ConceptProperty>,
}

#[derive(Deserialize, Default)]
struct ConceptProperty {
    #[serde(default)]
    umlscui: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PropertyResponse {
    #[serde(default)]
    prop_concept_group: PropConceptGroup,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PropConceptGroup {
    #[serde(default)]
    prop_concept: Vec<PropConcept>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PropConcept {
    #[serde(default)]
    prop_value: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ClassMembersResponse {
    #[serde(default)]
    drug_member_group: DrugMemberGroup,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DrugMemberGroup {
    #[serde(default)]
    drug_member: Vec<DrugMember>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DrugMember {
    #[serde(default)]
    min_concept: MinConcept,
}

#[derive(Deserialize, Default)]
struct MinConcept {
    #[serde(default)]
    rxcui: String,
}

/// Term types requested from the related-concepts endpoint.
fn relation_term_types(relation: DrugRelation) -> &'static str {
    match relation {
        DrugRelation::Brand => "BN",
        DrugRelation::Ingredient => "IN MIN",
    }
}

/// Relation source for a drug-class lookup. MeSH descriptor ids (a `D`
/// followed by digits) live under the MESH source; everything else is an
/// ATC class.
fn rela_source(class_id: &str) -> &'static str {
    let mut chars = class_id.chars();
    if chars.next() == Some('D') && class_id.len() > 1 && chars.all(|c| c.is_ascii_digit()) {
        "MESH"
    } else {
        "ATC"
    }
}

/// Client for the drug-vocabulary REST API.
pub struct RxNavClient {
    client: Client,
    base_url: String,
    max_retries: usize,
}

impl RxNavClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base = url::Url::parse(&config.drug_base_url).map_err(|e| {
            TermgraphError::Config(format!(
                "Invalid remote.drug_base_url '{}': {}",
                config.drug_base_url, e
            ))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| TermgraphError::Remote(format!("Failed to build HTTP client: {}", e)))?;
        Ok(RxNavClient {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    /// GET a JSON document with retry on rate limiting and server errors.
    /// `Ok(None)` covers the transient "no data" cases: a 404, a request
    /// timeout, or a payload that fails to parse.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.client.get(&url).query(query).send().await {
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
}

#[async_trait]
impl DrugLookup for RxNavClient {
    async fn related_concepts(
        &self,
        drug_id: &str,
        relation: DrugRelation,
    ) -> Result<BTreeSet<String>> {
        let path = format!("/rxcui/{}/related.json", drug_id);
        let query = [("tty", relation_term_types(relation).to_string())];
        let Some(response) = self.get_json::<RelatedResponse>(&path, &query).await? else {
            return Ok(BTreeSet::new());
        };
        Ok(response
            .related_group
            .concept_group
            .into_iter()
            .flat_map(|group| group.concept_properties)
            .map(|p| p.umlscui)
            .filter(|cui| !cui.is_empty())
            .collect())
    }

    async fn primary_ids(&self, drug_id: &str) -> Result<BTreeSet<String>> {
        let path = format!("/rxcui/{}/property.json", drug_id);
        let query = [("propName", "UMLSCUI".to_string())];
        let Some(response) = self.get_json::<PropertyResponse>(&path, &query).await? else {
            return Ok(BTreeSet::new());
        };
        Ok(response
            .prop_concept_group
            .prop_concept
            .into_iter()
            .map(|p| p.prop_value)
            .filter(|v| !v.is_empty())
            .collect())
    }

    async fn class_members(&self, class_id: &str) -> Result<BTreeSet<String>> {
        let path = "/rxclass/classMembers.json";
        let query = [
            ("classId", class_id.to_string()),
            ("relaSource", rela_source(class_id).to_string()),
        ];
        let Some(response) = self.get_json::<ClassMembersResponse>(path, &query).await? else {
            return Ok(BTreeSet::new());
        };
        Ok(response
            .drug_member_group
            .drug_member
            .into_iter()
            .map(|m| m.min_concept.rxcui)
            .filter(|id| !id.is_empty())
            .collect())
    }
}

//! Cliente del servicio de similitud (Turnitin Core API).
//!
//! Transporte: HTTPS con bearer auth y cabeceras de integración constantes;
//! cuerpos JSON salvo la subida de texto, que va como `binary/octet-stream`
//! con `Content-Disposition`. Al construirse acepta la última versión de la
//! EULA en nombre del usuario de sistema.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use cp_core::traits::{ApiError, SimilarityApi, SubmissionInfo};
use cp_core::TcaConfig;
use cp_domain::{MwTimestamp, NewSource, Site};

use crate::http::{expect_json, expect_success, send_with_retry};
use crate::VERSION;

const SYSTEM_USER: &str = ":system:";
const EULA_LANGUAGE: &str = "en-US";
const REPORT_PRIORITY: &str = "LOW";
const SEARCH_REPOSITORIES: [&str; 5] =
    ["INTERNET", "SUBMITTED_WORK", "PUBLICATION", "CROSSREF", "CROSSREF_POSTED_CONTENT"];

pub struct TurnitinClient {
    http: Client,
    base_url: String,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct EulaVersion {
    version: String,
}

#[derive(Debug, Deserialize)]
struct SubmissionCreated {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct SubmissionInfoResponse {
    id: Uuid,
    status: String,
    #[serde(default)]
    error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReportInfoResponse {
    submission_id: Uuid,
    status: String,
    #[serde(default)]
    top_source_largest_matched_word_count: u64,
}

#[derive(Debug, Deserialize)]
struct SourcesResponse {
    submission_id: Uuid,
    #[serde(default)]
    match_aggregates: Vec<MatchAggregate>,
}

#[derive(Debug, Deserialize)]
struct MatchAggregate {
    is_excluded: bool,
    #[serde(default)]
    match_sources: Vec<MatchSource>,
}

#[derive(Debug, Deserialize)]
struct MatchSource {
    is_excluded: bool,
    description: String,
    #[serde(default)]
    link: Option<String>,
    percent: f32,
}

impl TurnitinClient {
    /// Construye el cliente y completa el handshake de la EULA.
    pub fn new(config: &TcaConfig) -> Result<Self, ApiError> {
        let client = Self::without_eula(&format!("https://{}/api/v1", config.domain), &config.key,
                                        config.max_retries)?;
        let version = client.latest_eula_version()?;
        client.accept_eula(&version)?;
        Ok(client)
    }

    /// Cliente sin handshake, con base URL explícita (pruebas).
    pub fn without_eula(base_url: &str, key: &str, max_retries: u32) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| ApiError::Transport(format!("invalid api key: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("From", HeaderValue::from_static("copypatrol.backend@toolforge.org"));
        let agent = HeaderValue::from_str(&format!("copypatrol-backend-bot/{VERSION}"))
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        headers.insert(USER_AGENT, agent);
        headers.insert("X-Turnitin-Integration-Name", HeaderValue::from_static("CopyPatrol"));
        headers.insert("X-Turnitin-Integration-Version",
                       HeaderValue::from_str(VERSION).map_err(|e| ApiError::Transport(e.to_string()))?);
        let http = Client::builder().default_headers(headers)
                                    .timeout(Duration::from_secs(60))
                                    .build()
                                    .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(TurnitinClient { http, base_url: base_url.to_string(), max_retries })
    }

    fn latest_eula_version(&self) -> Result<String, ApiError> {
        let request = self.http
                          .get(format!("{}/eula/latest", self.base_url))
                          .query(&[("lang", EULA_LANGUAGE)]);
        let eula: EulaVersion = expect_json(send_with_retry(request, self.max_retries)?)?;
        Ok(eula.version)
    }

    fn accept_eula(&self, version: &str) -> Result<(), ApiError> {
        let request = self.http
                          .post(format!("{}/eula/{version}/accept", self.base_url))
                          .json(&json!({
                              "version": version,
                              "user_id": SYSTEM_USER,
                              "accepted_timestamp": MwTimestamp::now().to_iso(),
                              "language": EULA_LANGUAGE,
                          }));
        expect_success(send_with_retry(request, self.max_retries)?)
    }

    fn report_info(&self, submission_id: Uuid) -> Result<ReportInfoResponse, ApiError> {
        debug!("getting report info for sid={submission_id}");
        let request = self.http.get(format!("{}/submissions/{submission_id}/similarity", self.base_url));
        let info: ReportInfoResponse = expect_json(send_with_retry(request, self.max_retries)?)?;
        if info.submission_id != submission_id {
            return Err(ApiError::UnexpectedResponse(format!("report info for {} instead of {submission_id}",
                                                            info.submission_id)));
        }
        Ok(info)
    }

    fn fetch_sources(&self, submission_id: Uuid) -> Result<Vec<NewSource>, ApiError> {
        debug!("getting sources for sid={submission_id}");
        let request = self.http
                          .get(format!("{}/submissions/{submission_id}/similarity/view/sources", self.base_url));
        let response: SourcesResponse = expect_json(send_with_retry(request, self.max_retries)?)?;
        if response.submission_id != submission_id {
            return Err(ApiError::UnexpectedResponse(format!("sources for {} instead of {submission_id}",
                                                            response.submission_id)));
        }
        Ok(flatten_sources(response))
    }
}

/// Aplana los agregados descartando lo marcado `is_excluded` en cualquiera
/// de los dos niveles.
fn flatten_sources(response: SourcesResponse) -> Vec<NewSource> {
    response.match_aggregates
            .into_iter()
            .filter(|aggregate| !aggregate.is_excluded)
            .flat_map(|aggregate| aggregate.match_sources)
            .filter(|source| !source.is_excluded)
            .map(|source| NewSource { description: source.description,
                                      url: source.link,
                                      percent: source.percent })
            .collect()
}

impl SimilarityApi for TurnitinClient {
    fn create_submission(&self, site: &Site, title: &str, timestamp: MwTimestamp, owner: &str)
                         -> Result<Uuid, ApiError> {
        debug!("creating submission for title={title:?} ...");
        let request = self.http
                          .post(format!("{}/submissions", self.base_url))
                          .json(&json!({
                              "owner": owner,
                              "title": title,
                              "submitter": SYSTEM_USER,
                              "metadata": {
                                  "group": {
                                      "id": site.to_string(),
                                      "name": site.to_string(),
                                      "type": "FOLDER",
                                  },
                                  "original_submitted_time": timestamp.to_iso(),
                              },
                              "owner_default_permission_set": "USER",
                              "submitter_default_permission_set": "ADMINISTRATOR",
                          }));
        let created: SubmissionCreated = expect_json(send_with_retry(request, self.max_retries)?)?;
        debug!("sid={}", created.id);
        Ok(created.id)
    }

    fn upload_submission(&self, submission_id: Uuid, text: &str) -> Result<(), ApiError> {
        debug!("uploading submission for sid={submission_id} ...");
        let request = self.http
                          .put(format!("{}/submissions/{submission_id}/original", self.base_url))
                          .header("Content-Type", "binary/octet-stream")
                          .header("Content-Disposition", format!("inline; filename='{submission_id}.txt'"))
                          .body(text.as_bytes().to_vec());
        expect_success(send_with_retry(request, self.max_retries)?)?;
        debug!("upload successful for sid={submission_id}");
        Ok(())
    }

    fn submission_info(&self, submission_id: Uuid) -> Result<SubmissionInfo, ApiError> {
        debug!("getting submission info for sid={submission_id}");
        let request = self.http.get(format!("{}/submissions/{submission_id}", self.base_url));
        let info: SubmissionInfoResponse = expect_json(send_with_retry(request, self.max_retries)?)?;
        if info.id != submission_id {
            return Err(ApiError::UnexpectedResponse(format!("info for {} instead of {submission_id}", info.id)));
        }
        Ok(SubmissionInfo { status: info.status, error_code: info.error_code })
    }

    fn generate_report(&self, submission_id: Uuid) -> Result<(), ApiError> {
        debug!("generating report for sid={submission_id}");
        let request = self.http
                          .put(format!("{}/submissions/{submission_id}/similarity", self.base_url))
                          .json(&json!({
                              "generation_settings": {
                                  "search_repositories": SEARCH_REPOSITORIES,
                                  "priority": REPORT_PRIORITY,
                              },
                          }));
        expect_success(send_with_retry(request, self.max_retries)?)
    }

    fn report_sources(&self, submission_id: Uuid) -> Result<Option<Vec<NewSource>>, ApiError> {
        let info = self.report_info(submission_id)?;
        if info.status != "COMPLETE" {
            return Ok(None);
        }
        if info.top_source_largest_matched_word_count == 0 {
            return Ok(Some(Vec::new()));
        }
        Ok(Some(self.fetch_sources(submission_id)?))
    }
}

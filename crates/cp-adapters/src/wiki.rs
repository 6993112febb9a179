//! Cliente de la action API de MediaWiki.
//!
//! Un cliente por sitio, con el léxico (espacios de nombres, extensiones de
//! archivo) y el token CSRF cacheados tras la primera consulta. La fábrica
//! comparte una única sesión HTTP entre sitios.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, error, info};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use cp_core::traits::{ApiError, WikiApi, WikiFactory};
use cp_domain::{RevisionData, Site, SiteLexicon};

use crate::http::{expect_json, send_with_retry};
use crate::VERSION;

const CATEGORY_NAMESPACE: i32 = 14;
const FILE_NAMESPACE: i32 = 6;
const PAGETRIAGE_RIGHT: &str = "pagetriage-copyvio";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    error: Option<ApiErrorBody>,
    #[serde(default)]
    query: Option<QueryBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<PageBody>,
    #[serde(default)]
    tokens: Option<TokensBody>,
    #[serde(default)]
    namespaces: HashMap<String, NamespaceBody>,
    #[serde(default, rename = "namespacealiases")]
    namespace_aliases: Vec<NamespaceAliasBody>,
    #[serde(default, rename = "fileextensions")]
    file_extensions: Vec<FileExtensionBody>,
    #[serde(default)]
    extensions: Vec<ExtensionBody>,
    #[serde(default)]
    userinfo: Option<UserInfoBody>,
}

#[derive(Debug, Deserialize)]
struct PageBody {
    #[serde(default)]
    pageid: Option<u64>,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    revisions: Vec<RevisionBody>,
}

#[derive(Debug, Deserialize)]
struct RevisionBody {
    #[serde(default)]
    revid: u32,
    #[serde(default)]
    user: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    commenthidden: bool,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    slots: HashMap<String, SlotBody>,
}

#[derive(Debug, Deserialize)]
struct SlotBody {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TokensBody {
    #[serde(rename = "csrftoken")]
    csrf_token: String,
}

#[derive(Debug, Deserialize)]
struct NamespaceBody {
    id: i32,
    #[serde(default)]
    name: String,
    #[serde(default)]
    canonical: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamespaceAliasBody {
    id: i32,
    alias: String,
}

#[derive(Debug, Deserialize)]
struct FileExtensionBody {
    ext: String,
}

#[derive(Debug, Deserialize)]
struct ExtensionBody {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoBody {
    #[serde(default)]
    rights: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PageTriageListResponse {
    #[serde(default)]
    error: Option<ApiErrorBody>,
    #[serde(default, rename = "pagetriagelist")]
    list: Option<PageTriageListBody>,
}

#[derive(Debug, Default, Deserialize)]
struct PageTriageListBody {
    #[serde(default)]
    pages_missing_metadata: Vec<u64>,
}

pub struct ActionApiClient {
    http: Client,
    site: Site,
    api_url: String,
    max_retries: u32,
    lexicon: OnceCell<Arc<SiteLexicon>>,
    csrf_token: OnceCell<String>,
}

impl ActionApiClient {
    pub fn new(site: Site, max_retries: u32) -> Result<Self, ApiError> {
        Ok(Self::with_http(shared_client()?, site, max_retries))
    }

    /// Cliente sobre una sesión HTTP ya construida (la fábrica la comparte).
    pub fn with_http(http: Client, site: Site, max_retries: u32) -> Self {
        let api_url = format!("https://{}/w/api.php", site.hostname());
        ActionApiClient { http,
                          site,
                          api_url,
                          max_retries,
                          lexicon: OnceCell::new(),
                          csrf_token: OnceCell::new() }
    }

    fn get_api<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> Result<T, ApiError> {
        let request = self.http
                          .get(&self.api_url)
                          .query(&[("format", "json"), ("formatversion", "2")])
                          .query(params);
        expect_json(send_with_retry(request, self.max_retries)?)
    }

    fn get_query(&self, params: &[(&str, String)]) -> Result<QueryBody, ApiError> {
        let response: ApiResponse = self.get_api(params)?;
        if let Some(api_error) = response.error {
            return Err(ApiError::UnexpectedResponse(format!("API error {}: {}", api_error.code, api_error.info)));
        }
        Ok(response.query.unwrap_or_default())
    }

    fn page_revisions(&self, title: &str, limit: usize) -> Result<Vec<RevisionBody>, ApiError> {
        let query = self.get_query(&[("action", "query".to_string()),
                                     ("titles", title.to_string()),
                                     ("prop", "revisions".to_string()),
                                     ("rvprop", "ids|content".to_string()),
                                     ("rvslots", "main".to_string()),
                                     ("rvlimit", limit.to_string())])?;
        Ok(query.pages.into_iter().next().map(|page| page.revisions).unwrap_or_default())
    }

    fn csrf(&self) -> Result<&str, ApiError> {
        self.csrf_token
            .get_or_try_init(|| {
                let query = self.get_query(&[("action", "query".to_string()),
                                             ("meta", "tokens".to_string()),
                                             ("type", "csrf".to_string())])?;
                query.tokens
                     .map(|tokens| tokens.csrf_token)
                     .ok_or_else(|| ApiError::UnexpectedResponse("no csrf token in response".into()))
            })
            .map(String::as_str)
    }

    fn ensure_pagetriage_available(&self) -> Result<(), ApiError> {
        let query = self.get_query(&[("action", "query".to_string()),
                                     ("meta", "siteinfo".to_string()),
                                     ("siprop", "extensions".to_string())])?;
        if !query.extensions.iter().any(|extension| extension.name == "PageTriage") {
            return Err(ApiError::Privilege(format!("PageTriage is not enabled on {}", self.site)));
        }
        let query = self.get_query(&[("action", "query".to_string()),
                                     ("meta", "userinfo".to_string()),
                                     ("uiprop", "rights".to_string())])?;
        let has_right = query.userinfo
                             .map(|userinfo| userinfo.rights.iter().any(|right| right == PAGETRIAGE_RIGHT))
                             .unwrap_or(false);
        if !has_right {
            return Err(ApiError::Privilege(format!("the operator is missing the {PAGETRIAGE_RIGHT} right on {}",
                                                   self.site)));
        }
        Ok(())
    }
}

impl WikiApi for ActionApiClient {
    fn site(&self) -> &Site {
        &self.site
    }

    fn lexicon(&self) -> Result<Arc<SiteLexicon>, ApiError> {
        self.lexicon
            .get_or_try_init(|| {
                let query = self.get_query(&[("action", "query".to_string()),
                                             ("meta", "siteinfo".to_string()),
                                             ("siprop", "namespaces|namespacealiases|fileextensions".to_string())])?;
                Ok(Arc::new(lexicon_from_query(query)))
            })
            .cloned()
    }

    fn load_revisions(&self, rev_ids: &[u32]) -> Result<HashMap<u32, RevisionData>, ApiError> {
        let revids: Vec<String> = rev_ids.iter().map(u32::to_string).collect();
        let query = self.get_query(&[("action", "query".to_string()),
                                     ("revids", revids.join("|")),
                                     ("prop", "revisions".to_string()),
                                     ("rvprop", "ids|timestamp|user|comment|tags|content".to_string()),
                                     ("rvslots", "main".to_string())])?;
        let mut revisions = HashMap::new();
        for page in query.pages {
            for revision in page.revisions {
                let text = revision.slots.get("main").map(|slot| slot.content.clone()).unwrap_or_default();
                revisions.insert(revision.revid,
                                 RevisionData { rev_id: revision.revid,
                                                text,
                                                comment: revision.comment,
                                                comment_hidden: revision.commenthidden,
                                                tags: revision.tags,
                                                user: revision.user });
            }
        }
        Ok(revisions)
    }

    fn page_exists(&self, title: &str) -> Result<bool, ApiError> {
        let query = self.get_query(&[("action", "query".to_string()), ("titles", title.to_string())])?;
        Ok(query.pages
                .first()
                .map(|page| !page.missing && !page.invalid)
                .unwrap_or(false))
    }

    fn last_revision_texts(&self, title: &str, total: usize) -> Result<Vec<String>, ApiError> {
        let revisions = self.page_revisions(title, total)?;
        Ok(revisions.into_iter()
                    .map(|revision| {
                        revision.slots.get("main").map(|slot| slot.content.clone()).unwrap_or_default()
                    })
                    .collect())
    }

    fn page_text(&self, title: &str) -> Result<String, ApiError> {
        let mut texts = self.last_revision_texts(title, 1)?;
        Ok(if texts.is_empty() { String::new() } else { texts.remove(0) })
    }

    fn page_id(&self, namespace: i32, title: &str) -> Result<Option<u64>, ApiError> {
        let full_title = self.lexicon()?.canonical_title(namespace, title);
        let query = self.get_query(&[("action", "query".to_string()), ("titles", full_title)])?;
        Ok(query.pages
                .first()
                .filter(|page| !page.missing && !page.invalid)
                .and_then(|page| page.pageid))
    }

    fn submit_page_triage(&self, page_id: u64, rev_id: u32) -> Result<(), ApiError> {
        self.ensure_pagetriage_available()?;
        let response: PageTriageListResponse = self.get_api(&[("action", "pagetriagelist".to_string()),
                                                              ("page_id", page_id.to_string())])?;
        if let Some(api_error) = response.error {
            return Err(ApiError::UnexpectedResponse(format!("pagetriagelist failed: {} {}",
                                                            api_error.code, api_error.info)));
        }
        let missing_metadata = response.list.unwrap_or_default().pages_missing_metadata;
        if missing_metadata.contains(&page_id) {
            debug!("page {page_id} is missing PageTriage metadata, not tagging");
            return Ok(());
        }

        let token = self.csrf()?.to_string();
        let form = [("action", "pagetriagetagcopyvio".to_string()),
                    ("revid", rev_id.to_string()),
                    ("token", token),
                    ("format", "json".to_string()),
                    ("formatversion", "2".to_string())];
        let request = self.http.post(&self.api_url).form(&form);
        let body: serde_json::Value = expect_json(send_with_retry(request, self.max_retries)?)?;
        if body.get("error").is_some() {
            error!("failed to add rev_id={rev_id} to PageTriage: {body}");
        } else {
            info!("rev_id={rev_id} added to PageTriage");
        }
        Ok(())
    }
}

/// Construye el léxico del sitio desde la respuesta de siteinfo.
fn lexicon_from_query(query: QueryBody) -> SiteLexicon {
    let mut lexicon = SiteLexicon::default();
    for namespace in query.namespaces.values() {
        if !namespace.name.is_empty() {
            lexicon.namespace_names.insert(namespace.id, namespace.name.clone());
        }
        let aliases = match namespace.id {
            CATEGORY_NAMESPACE => &mut lexicon.category_aliases,
            FILE_NAMESPACE => &mut lexicon.file_aliases,
            _ => continue,
        };
        if !namespace.name.is_empty() {
            aliases.push(namespace.name.clone());
        }
        if let Some(canonical) = &namespace.canonical {
            if !canonical.is_empty() && canonical != &namespace.name {
                aliases.push(canonical.clone());
            }
        }
    }
    for alias in query.namespace_aliases {
        let target = match alias.id {
            CATEGORY_NAMESPACE => &mut lexicon.category_aliases,
            FILE_NAMESPACE => &mut lexicon.file_aliases,
            _ => continue,
        };
        if !target.contains(&alias.alias) {
            target.push(alias.alias);
        }
    }
    lexicon.file_extensions = query.file_extensions.into_iter().map(|extension| extension.ext).collect();
    lexicon
}

fn shared_client() -> Result<Client, ApiError> {
    let mut headers = HeaderMap::new();
    let agent = HeaderValue::from_str(&format!("copypatrol-backend-bot/{VERSION}"))
        .map_err(|e| ApiError::Transport(e.to_string()))?;
    headers.insert(USER_AGENT, agent);
    Client::builder().default_headers(headers)
                     .timeout(Duration::from_secs(60))
                     .build()
                     .map_err(|e| ApiError::Transport(e.to_string()))
}

/// Fábrica con una sesión HTTP compartida y un cliente cacheado por sitio.
pub struct ActionApiFactory {
    http: Client,
    max_retries: u32,
    cache: Mutex<HashMap<Site, Arc<ActionApiClient>>>,
}

impl ActionApiFactory {
    pub fn new(max_retries: u32) -> Result<Self, ApiError> {
        Ok(ActionApiFactory { http: shared_client()?,
                              max_retries,
                              cache: Mutex::new(HashMap::new()) })
    }
}

impl WikiFactory for ActionApiFactory {
    fn client(&self, site: &Site) -> Result<Arc<dyn WikiApi>, ApiError> {
        let mut cache = self.cache
                            .lock()
                            .map_err(|_| ApiError::Transport("wiki client cache poisoned".into()))?;
        if let Some(existing) = cache.get(site) {
            return Ok(existing.clone());
        }
        let client = Arc::new(ActionApiClient::with_http(self.http.clone(), site.clone(), self.max_retries));
        cache.insert(site.clone(), client.clone());
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revisions_response_decodes() {
        let payload = serde_json::json!({
            "query": {
                "pages": [{
                    "pageid": 151674,
                    "ns": 0,
                    "title": "Kommet, ihr Hirten",
                    "revisions": [
                        {
                            "revid": 1126962296,
                            "parentid": 1125722395,
                            "user": "B",
                            "timestamp": "2022-12-12T02:12:22Z",
                            "comment": "better score; +English text.",
                            "tags": ["wikieditor"],
                            "slots": {"main": {"contentmodel": "wikitext", "content": "'''Kommet'''"}},
                        },
                        {
                            "revid": 1125722395,
                            "user": "A",
                            "timestamp": "2022-12-05T00:00:00Z",
                            "commenthidden": true,
                            "tags": [],
                            "slots": {"main": {"content": "old text"}},
                        },
                    ],
                }],
            },
        });
        let response: ApiResponse = serde_json::from_value(payload).unwrap();
        let query = response.query.unwrap();
        let revisions = &query.pages[0].revisions;
        assert_eq!(revisions[0].revid, 1126962296);
        assert_eq!(revisions[0].tags, vec!["wikieditor".to_string()]);
        assert_eq!(revisions[0].slots["main"].content, "'''Kommet'''");
        assert!(!revisions[0].commenthidden);
        assert!(revisions[1].commenthidden);
        assert_eq!(revisions[1].comment, "");
    }

    #[test]
    fn lexicon_is_built_from_siteinfo() {
        let payload = serde_json::json!({
            "namespaces": {
                "0": {"id": 0, "name": ""},
                "6": {"id": 6, "name": "Datei", "canonical": "File"},
                "14": {"id": 14, "name": "Kategorie", "canonical": "Category"},
                "118": {"id": 118, "name": "Entwurf", "canonical": "Draft"},
            },
            "namespacealiases": [
                {"id": 6, "alias": "Bild"},
                {"id": 14, "alias": "Kat"},
                {"id": 2, "alias": "Benutzerin"},
            ],
            "fileextensions": [{"ext": "png"}, {"ext": "jpg"}],
        });
        let query: QueryBody = serde_json::from_value(payload).unwrap();
        let lexicon = lexicon_from_query(query);
        assert_eq!(lexicon.category_aliases, vec!["Kategorie".to_string(), "Category".to_string(), "Kat".to_string()]);
        assert_eq!(lexicon.file_aliases, vec!["Datei".to_string(), "File".to_string(), "Bild".to_string()]);
        assert_eq!(lexicon.file_extensions, vec!["png".to_string(), "jpg".to_string()]);
        assert_eq!(lexicon.namespace_names.get(&118), Some(&"Entwurf".to_string()));
    }

    #[test]
    fn missing_pages_do_not_exist() {
        let payload = serde_json::json!({
            "query": {"pages": [{"ns": 0, "title": "Nope", "missing": true}]},
        });
        let response: ApiResponse = serde_json::from_value(payload).unwrap();
        let page = &response.query.unwrap().pages[0];
        assert!(page.missing);
        assert_eq!(page.pageid, None);
    }
}

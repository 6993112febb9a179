//! Recorrido de la máquina de estados con colaboradores sustituidos.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use cp_core::traits::{ApiError, DiffStore, SimilarityApi, SubmissionInfo, WikiApi, WikiFactory};
use cp_core::{Config, MemoryDiffStore, Pipeline};
use cp_domain::{MwTimestamp, NewDiff, NewSource, RevisionData, Site, SiteLexicon, Status};

const SID: &str = "7b3074cf-4d3b-4648-8c68-f56aee0f1058";

struct StubWiki {
    site: Site,
    lexicon: Arc<SiteLexicon>,
    revisions: HashMap<u32, RevisionData>,
    /// título -> textos de sus últimas revisiones
    linked_pages: HashMap<String, Vec<String>>,
    triaged: Mutex<Vec<(u64, u32)>>,
}

impl StubWiki {
    fn new(revisions: Vec<RevisionData>) -> Self {
        StubWiki { site: Site::new("wikipedia", "en"),
                   lexicon: Arc::new(SiteLexicon::default()),
                   revisions: revisions.into_iter().map(|rev| (rev.rev_id, rev)).collect(),
                   linked_pages: HashMap::new(),
                   triaged: Mutex::new(Vec::new()) }
    }
}

impl WikiApi for StubWiki {
    fn site(&self) -> &Site {
        &self.site
    }

    fn lexicon(&self) -> Result<Arc<SiteLexicon>, ApiError> {
        Ok(self.lexicon.clone())
    }

    fn load_revisions(&self, rev_ids: &[u32]) -> Result<HashMap<u32, RevisionData>, ApiError> {
        Ok(rev_ids.iter()
                  .filter_map(|id| self.revisions.get(id).cloned())
                  .map(|rev| (rev.rev_id, rev))
                  .collect())
    }

    fn page_exists(&self, title: &str) -> Result<bool, ApiError> {
        Ok(self.linked_pages.contains_key(title))
    }

    fn last_revision_texts(&self, title: &str, total: usize) -> Result<Vec<String>, ApiError> {
        Ok(self.linked_pages.get(title).cloned().unwrap_or_default().into_iter().take(total).collect())
    }

    fn page_text(&self, _title: &str) -> Result<String, ApiError> {
        Ok(String::new())
    }

    fn page_id(&self, _namespace: i32, _title: &str) -> Result<Option<u64>, ApiError> {
        Ok(Some(4242))
    }

    fn submit_page_triage(&self, page_id: u64, rev_id: u32) -> Result<(), ApiError> {
        self.triaged.lock().unwrap().push((page_id, rev_id));
        Ok(())
    }
}

struct StubFactory {
    wiki: Arc<StubWiki>,
}

impl WikiFactory for StubFactory {
    fn client(&self, _site: &Site) -> Result<Arc<dyn WikiApi>, ApiError> {
        Ok(self.wiki.clone())
    }
}

#[derive(Default)]
struct StubSimilarity {
    info: Mutex<SubmissionInfo>,
    sources: Mutex<Option<Vec<NewSource>>>,
    uploads: Mutex<Vec<(Uuid, String)>>,
}

impl StubSimilarity {
    fn with_info(status: &str, error_code: Option<&str>) -> Self {
        let stub = StubSimilarity::default();
        *stub.info.lock().unwrap() = SubmissionInfo { status: status.to_string(),
                                                      error_code: error_code.map(str::to_string) };
        stub
    }
}

impl SimilarityApi for StubSimilarity {
    fn create_submission(&self, _site: &Site, _title: &str, _timestamp: MwTimestamp, _owner: &str)
                         -> Result<Uuid, ApiError> {
        Ok(Uuid::parse_str(SID).unwrap())
    }

    fn upload_submission(&self, submission_id: Uuid, text: &str) -> Result<(), ApiError> {
        self.uploads.lock().unwrap().push((submission_id, text.to_string()));
        Ok(())
    }

    fn submission_info(&self, _submission_id: Uuid) -> Result<SubmissionInfo, ApiError> {
        Ok(self.info.lock().unwrap().clone())
    }

    fn generate_report(&self, _submission_id: Uuid) -> Result<(), ApiError> {
        Ok(())
    }

    fn report_sources(&self, _submission_id: Uuid) -> Result<Option<Vec<NewSource>>, ApiError> {
        Ok(self.sources.lock().unwrap().clone())
    }
}

fn new_revision(rev_id: u32, text: &str, tags: &[&str]) -> RevisionData {
    RevisionData { rev_id,
                   text: text.to_string(),
                   comment: "an edit summary".to_string(),
                   comment_hidden: false,
                   tags: tags.iter().map(|t| t.to_string()).collect(),
                   user: "Example editor".to_string() }
}

fn tracked_creation(store: &MemoryDiffStore, rev_id: u32) {
    store.add_revision(NewDiff { site: Site::new("wikipedia", "en"),
                                 page_namespace: 0,
                                 page_title: "Kommet,_ihr_Hirten".into(),
                                 rev_id,
                                 rev_parent_id: 0,
                                 rev_timestamp: MwTimestamp::from_mw("20221202021222").unwrap(),
                                 rev_user_text: "Example editor".into() })
         .unwrap();
}

fn empty_config() -> Config {
    Config::from_paths(&[], &[])
}

fn config_with(content: &str) -> Config {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    let path = file.into_temp_path();
    let paths: Vec<PathBuf> = vec![path.to_path_buf()];
    let config = Config::from_paths(&paths, &paths);
    path.close().unwrap();
    config
}

#[test]
fn happy_path_reaches_ready() {
    let store = MemoryDiffStore::new();
    tracked_creation(&store, 1126962296);
    let body = "baz ".repeat(500);
    let wiki = Arc::new(StubWiki::new(vec![new_revision(1126962296, &body, &[])]));
    let factory = StubFactory { wiki };
    let similarity = StubSimilarity::with_info("COMPLETE", None);
    let config = empty_config();
    let pipeline = Pipeline::new(&store, &factory, &similarity, &config);

    // Unsubmitted -> Uploaded
    pipeline.check_changes().unwrap();
    let row = &store.rows()[0];
    assert_eq!(row.status, Status::Uploaded);
    assert_eq!(row.submission_id, Some(Uuid::parse_str(SID).unwrap()));
    assert_eq!(similarity.uploads.lock().unwrap().len(), 1);

    // Uploaded -> Pending
    pipeline.generate_reports().unwrap();
    assert_eq!(store.rows()[0].status, Status::Pending);

    // Pending -> Ready, con la fuente de bajo porcentaje filtrada
    *similarity.sources.lock().unwrap() =
        Some(vec![NewSource { description: "come-all-ye-shepherds.htm".into(),
                              url: Some("http://www.reindeerland.org/come-all-ye-shepherds.htm".into()),
                              percent: 89.28 },
                  NewSource { description: "\"Adoration of the Shepherds\", Wikipedia".into(),
                              url: Some("https://en.wikipedia.org/wiki?curid=2349963".into()),
                              percent: 28.57 }]);
    pipeline.check_reports().unwrap();
    let row = &store.rows()[0];
    assert_eq!(row.status, Status::Ready);
    assert_eq!(row.sources.len(), 1);
    assert!((row.sources[0].percent - 89.28).abs() < f32::EPSILON);
}

#[test]
fn revert_is_removed() {
    let store = MemoryDiffStore::new();
    store.add_revision(NewDiff { site: Site::new("wikipedia", "en"),
                                 page_namespace: 0,
                                 page_title: "Barack_Obama".into(),
                                 rev_id: 1089519971,
                                 rev_parent_id: 1088665641,
                                 rev_timestamp: MwTimestamp::from_mw("20221202021222").unwrap(),
                                 rev_user_text: "B".into() })
         .unwrap();
    let wiki = Arc::new(StubWiki::new(vec![new_revision(1088665641, &"foo bar".repeat(100), &[]),
                                           new_revision(1089519971, &"baz".repeat(500), &["mw-rollback"])]));
    let factory = StubFactory { wiki };
    let similarity = StubSimilarity::default();
    let config = empty_config();
    Pipeline::new(&store, &factory, &similarity, &config).check_changes().unwrap();
    assert!(store.rows().is_empty());
}

#[test]
fn small_addition_is_removed() {
    let store = MemoryDiffStore::new();
    tracked_creation(&store, 7);
    let wiki = Arc::new(StubWiki::new(vec![new_revision(7, &"small".repeat(50), &[])]));
    let factory = StubFactory { wiki };
    let similarity = StubSimilarity::default();
    let config = empty_config();
    Pipeline::new(&store, &factory, &similarity, &config).check_changes().unwrap();
    assert!(store.rows().is_empty());
}

#[test]
fn copied_from_linked_page_is_removed() {
    let store = MemoryDiffStore::new();
    tracked_creation(&store, 8);
    let body = "copied paragraph about shepherds ".repeat(30);
    let mut wiki = StubWiki::new(vec![RevisionData { rev_id: 8,
                                                     text: body.clone(),
                                                     comment: "split from [[Example]]".into(),
                                                     comment_hidden: false,
                                                     tags: vec![],
                                                     user: "B".into() }]);
    wiki.linked_pages.insert("Example".into(), vec![body]);
    let factory = StubFactory { wiki: Arc::new(wiki) };
    let similarity = StubSimilarity::default();
    let config = empty_config();
    Pipeline::new(&store, &factory, &similarity, &config).check_changes().unwrap();
    assert!(store.rows().is_empty());
}

#[test]
fn processing_error_resets_to_unsubmitted() {
    let store = MemoryDiffStore::new();
    tracked_creation(&store, 9);
    let diff_id = store.rows()[0].diff_id;
    store.set_submission(diff_id, Uuid::parse_str(SID).unwrap()).unwrap();
    store.set_status(diff_id, Status::Uploaded).unwrap();

    let wiki = Arc::new(StubWiki::new(vec![]));
    let factory = StubFactory { wiki };
    let similarity = StubSimilarity::with_info("ERROR", Some("PROCESSING_ERROR"));
    let config = empty_config();
    Pipeline::new(&store, &factory, &similarity, &config).generate_reports().unwrap();
    let row = &store.rows()[0];
    assert_eq!(row.status, Status::Unsubmitted);
    assert!(row.submission_id.is_none());
}

#[test]
fn terminal_error_deletes_row() {
    let store = MemoryDiffStore::new();
    tracked_creation(&store, 10);
    let diff_id = store.rows()[0].diff_id;
    store.set_submission(diff_id, Uuid::parse_str(SID).unwrap()).unwrap();
    store.set_status(diff_id, Status::Uploaded).unwrap();

    let wiki = Arc::new(StubWiki::new(vec![]));
    let factory = StubFactory { wiki };
    let similarity = StubSimilarity::with_info("ERROR", Some("TOO_LITTLE_TEXT"));
    let config = empty_config();
    Pipeline::new(&store, &factory, &similarity, &config).generate_reports().unwrap();
    assert!(store.rows().is_empty());
}

#[test]
fn empty_sources_delete_row() {
    let store = MemoryDiffStore::new();
    tracked_creation(&store, 11);
    let diff_id = store.rows()[0].diff_id;
    store.set_submission(diff_id, Uuid::parse_str(SID).unwrap()).unwrap();
    store.set_status(diff_id, Status::Pending).unwrap();

    let wiki = Arc::new(StubWiki::new(vec![]));
    let factory = StubFactory { wiki };
    let similarity = StubSimilarity::default();
    *similarity.sources.lock().unwrap() = Some(vec![]);
    let config = empty_config();
    Pipeline::new(&store, &factory, &similarity, &config).check_reports().unwrap();
    assert!(store.rows().is_empty());
}

#[test]
fn still_processing_report_leaves_row() {
    let store = MemoryDiffStore::new();
    tracked_creation(&store, 12);
    let diff_id = store.rows()[0].diff_id;
    store.set_submission(diff_id, Uuid::parse_str(SID).unwrap()).unwrap();
    store.set_status(diff_id, Status::Pending).unwrap();

    let wiki = Arc::new(StubWiki::new(vec![]));
    let factory = StubFactory { wiki };
    let similarity = StubSimilarity::default(); // report_sources -> None
    let config = empty_config();
    Pipeline::new(&store, &factory, &similarity, &config).check_reports().unwrap();
    assert_eq!(store.rows()[0].status, Status::Pending);
}

#[test]
fn ready_on_watched_namespace_triggers_pagetriage() {
    let config = config_with("[copypatrol:en.wikipedia.org]\nenabled = true\nnamespaces = 0\npagetriage-namespaces = 0\n");
    let store = MemoryDiffStore::new();
    tracked_creation(&store, 13);
    let diff_id = store.rows()[0].diff_id;
    store.set_submission(diff_id, Uuid::parse_str(SID).unwrap()).unwrap();
    store.set_status(diff_id, Status::Pending).unwrap();

    let wiki = Arc::new(StubWiki::new(vec![]));
    let factory = StubFactory { wiki: wiki.clone() };
    let similarity = StubSimilarity::default();
    *similarity.sources.lock().unwrap() = Some(vec![NewSource { description: "match".into(),
                                                                url: None,
                                                                percent: 75.0 }]);
    Pipeline::new(&store, &factory, &similarity, &config).check_reports().unwrap();
    assert_eq!(store.rows()[0].status, Status::Ready);
    assert_eq!(*wiki.triaged.lock().unwrap(), vec![(4242, 13)]);
}

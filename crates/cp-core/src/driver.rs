//! Pasadas del pipeline sobre el almacén.
//!
//! Tres pasadas independientes, cada una recorre las filas en el estado que
//! le corresponde y avanza la máquina de estados
//! {Unsubmitted → Created → Uploaded → Pending → Ready}:
//! - `check_changes`: extrae el texto añadido y lo sube como submission;
//! - `check_reports`: recoge fuentes de informes terminados y filtra;
//! - `generate_reports`: pide el informe cuando la submission terminó de
//!   procesarse.
//!
//! Un fallo en una fila se registra y no aborta la pasada; la excepción son
//! los errores de privilegio de PageTriage, fatales para la operación.

use log::{debug, error, info};
use regex::Regex;

use cp_domain::{Diff, NewSource, Site, Status, TextCleaner};

use crate::config::Config;
use crate::error::CoreError;
use crate::extract;
use crate::ignore;
use crate::traits::{ApiError, DiffStore, SimilarityApi, WikiFactory};

pub struct Pipeline<'a> {
    store: &'a dyn DiffStore,
    wikis: &'a dyn WikiFactory,
    similarity: &'a dyn SimilarityApi,
    config: &'a Config,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a dyn DiffStore,
               wikis: &'a dyn WikiFactory,
               similarity: &'a dyn SimilarityApi,
               config: &'a Config)
               -> Self {
        Pipeline { store, wikis, similarity, config }
    }

    /// Unsubmitted ∪ Created → Uploaded (o borrado si no amerita).
    pub fn check_changes(&self) -> Result<(), CoreError> {
        for diff in self.store.diffs_by_status(&[Status::Unsubmitted, Status::Created])? {
            if let Err(row_error) = self.check_one(&diff) {
                error!("check-changes failed for revision {} on {}: {row_error}", diff.rev_id, diff.site);
            }
        }
        Ok(())
    }

    fn check_one(&self, diff: &Diff) -> Result<(), CoreError> {
        let wiki = self.wikis.client(&diff.site)?;
        let lexicon = wiki.lexicon()?;
        let cleaner = TextCleaner::new(&lexicon);
        let added_text = match extract::check_diff(wiki.as_ref(),
                                                   &cleaner,
                                                   &diff.page_title,
                                                   diff.rev_parent_id,
                                                   diff.rev_id)? {
            Some(text) => text,
            None => {
                self.store.remove(diff.diff_id)?;
                return Ok(());
            }
        };

        let submission_id = match diff.submission_id {
            Some(existing) => existing,
            None => {
                let title = format!("Revision {} of {}",
                                    diff.rev_id,
                                    lexicon.canonical_title(diff.page_namespace, &diff.page_title));
                let created = self.similarity
                                  .create_submission(&diff.site, &title, diff.rev_timestamp, &diff.rev_user_text)?;
                self.store.set_submission(diff.diff_id, created)?;
                created
            }
        };
        self.similarity.upload_submission(submission_id, &added_text)?;
        self.store.set_status(diff.diff_id, Status::Uploaded)?;
        Ok(())
    }

    /// Uploaded → Pending | Unsubmitted | borrado, según el servicio.
    pub fn generate_reports(&self) -> Result<(), CoreError> {
        for diff in self.store.diffs_by_status(&[Status::Uploaded])? {
            if let Err(row_error) = self.generate_one(&diff) {
                error!("reports failed for revision {} on {}: {row_error}", diff.rev_id, diff.site);
            }
        }
        Ok(())
    }

    fn generate_one(&self, diff: &Diff) -> Result<(), CoreError> {
        let submission_id = diff.submission_id.ok_or(CoreError::MissingSubmission(diff.diff_id))?;
        let info = self.similarity.submission_info(submission_id)?;
        match info.status.as_str() {
            "COMPLETE" => {
                self.similarity.generate_report(submission_id)?;
                self.store.set_status(diff.diff_id, Status::Pending)?;
            }
            "ERROR" => {
                let error_code = info.error_code.as_deref().unwrap_or("");
                error!("submission {submission_id} error_code={error_code:?}");
                if error_code == "PROCESSING_ERROR" {
                    // reintento como submission nueva
                    self.store.reset_submission(diff.diff_id)?;
                } else {
                    self.store.remove(diff.diff_id)?;
                }
            }
            "PROCESSING" => {}
            other => {
                error!("submission {submission_id} unhandled status={other:?}");
            }
        }
        Ok(())
    }

    /// Pending → Ready (fuentes adjuntas) o borrado.
    pub fn check_reports(&self) -> Result<(), CoreError> {
        let ignore_patterns = self.load_ignore_patterns()?;
        for diff in self.store.diffs_by_status(&[Status::Pending])? {
            match self.report_one(&diff, &ignore_patterns) {
                Err(fatal @ CoreError::Api(ApiError::Privilege(_))) => return Err(fatal),
                Err(row_error) => {
                    error!("reports failed for revision {} on {}: {row_error}", diff.rev_id, diff.site);
                }
                Ok(()) => {}
            }
        }
        Ok(())
    }

    fn report_one(&self, diff: &Diff, ignore_patterns: &[Regex]) -> Result<(), CoreError> {
        let submission_id = diff.submission_id.ok_or(CoreError::MissingSubmission(diff.diff_id))?;
        let sources = match self.similarity.report_sources(submission_id)? {
            // informe todavía en proceso
            None => return Ok(()),
            Some(sources) => sources,
        };
        let kept = filter_sources(sources, ignore_patterns);
        if kept.is_empty() {
            debug!("no sources kept for submission {submission_id}, removing row");
            self.store.remove(diff.diff_id)?;
            return Ok(());
        }
        self.store.save_sources(diff.diff_id, submission_id, &kept)?;
        info!("revision {} on {} is ready for review with {} sources", diff.rev_id, diff.site, kept.len());

        let site_config = self.config.site_config(&diff.site.hostname());
        if site_config.pagetriage_namespaces.contains(&diff.page_namespace) {
            let wiki = self.wikis.client(&diff.site)?;
            match wiki.page_id(diff.page_namespace, &diff.page_title)? {
                Some(page_id) => wiki.submit_page_triage(page_id, diff.rev_id)?,
                None => debug!("page {:?} no longer exists, skipping PageTriage", diff.page_title),
            }
        }
        Ok(())
    }

    fn load_ignore_patterns(&self) -> Result<Vec<Regex>, CoreError> {
        let Some(title) = self.config.ignore_list_title() else {
            return Ok(Vec::new());
        };
        // la lista vive en el primer dominio habilitado
        let domains = self.config.domains()?;
        let site = Site::from_domain(&domains[0])?;
        let wiki = self.wikis.client(&site)?;
        Ok(ignore::load_ignore_list(wiki.as_ref(), Some(&title))?)
    }
}

/// Filtro de fuentes de la pasada de informes: se conservan las de más de 50%
/// cuya URL (si existe) no casa con ningún patrón de exclusión. Las fuentes
/// sin URL nunca se filtran por la lista.
pub fn filter_sources(sources: Vec<NewSource>, ignore_patterns: &[Regex]) -> Vec<NewSource> {
    sources.into_iter()
           .filter(|source| source.percent > 50.0)
           .filter(|source| match &source.url {
               Some(url) => !ignore_patterns.iter().any(|pattern| pattern.is_match(url)),
               None => true,
           })
           .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore::parse_ignore_list;

    fn source(url: Option<&str>, percent: f32) -> NewSource {
        NewSource { description: url.unwrap_or("unnamed source").to_string(),
                    url: url.map(str::to_string),
                    percent }
    }

    #[test]
    fn low_percent_sources_are_dropped() {
        let kept = filter_sources(vec![source(Some("https://a.example"), 50.0),
                                       source(Some("https://b.example"), 50.1),
                                       source(Some("https://c.example"), 28.5)],
                                  &[]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url.as_deref(), Some("https://b.example"));
    }

    #[test]
    fn ignored_urls_are_dropped() {
        let patterns = parse_ignore_list(r"\bexample\.org\b");
        let kept = filter_sources(vec![source(Some("https://example.org/x"), 90.0),
                                       source(Some("https://kept.example.com"), 90.0)],
                                  &patterns);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url.as_deref(), Some("https://kept.example.com"));
    }

    #[test]
    fn null_url_sources_are_never_ignore_filtered() {
        // el patrón casa con cualquier cosa, pero sin URL no se aplica
        let patterns = parse_ignore_list(".*");
        let kept = filter_sources(vec![source(None, 90.0)], &patterns);
        assert_eq!(kept.len(), 1);
    }
}

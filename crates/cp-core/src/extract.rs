//! Decisión sobre una revisión: texto añadido o descarte.
//!
//! Implementa el procedimiento completo de comparación entre una revisión y
//! su padre: carga de contenido, rechazo temprano por tamaño, detección de
//! reversiones, limpieza + diff, y la exclusión por páginas enlazadas en el
//! resumen de edición. Devuelve `None` cuando la revisión no amerita
//! comprobarse (la fila se borra aguas arriba).

use log::debug;

use cp_domain::{added_revision_text, markup, TextCleaner};

use crate::error::CoreError;
use crate::traits::WikiApi;

/// Umbral en caracteres por debajo del cual un texto no se comprueba.
const MIN_TEXT_CHARS: usize = 500;

/// Compara dos revisiones de una página y extrae la prosa añadida.
///
/// `old == 0` significa creación de página: el texto añadido es la revisión
/// nueva completa, limpia.
pub fn check_diff(wiki: &dyn WikiApi,
                  cleaner: &TextCleaner,
                  page_title: &str,
                  old: u32,
                  new: u32)
                  -> Result<Option<String>, CoreError> {
    let small = |text: &str| {
        if text.chars().count() < MIN_TEXT_CHARS {
            debug!("revision {new} to {page_title:?} too small to compare");
            true
        } else {
            false
        }
    };

    let rev_ids: Vec<u32> = [old, new].into_iter().filter(|&id| id > 0).collect();
    let revisions = wiki.load_revisions(&rev_ids)?;
    let new_rev = revisions.get(&new).ok_or(CoreError::MissingRevision(new))?;
    if small(&new_rev.text) {
        return Ok(None);
    }

    let added_text = if old > 0 {
        let old_rev = revisions.get(&old).ok_or(CoreError::MissingRevision(old))?;
        if new_rev.is_revert() {
            debug!("revision {new} to {page_title:?} was a revert");
            return Ok(None);
        }
        if new_rev.was_reverted() {
            debug!("revision {new} to {page_title:?} was reverted");
            return Ok(None);
        }
        added_revision_text(&old_rev.text, &new_rev.text, cleaner)
    } else {
        cleaner.clean(&new_rev.text)
    };
    if small(&added_text) {
        return Ok(None);
    }

    // texto posiblemente copiado de una página enlazada en el resumen
    let mut added_text = added_text;
    if !new_rev.comment_hidden && !new_rev.comment.is_empty() {
        for target in markup::wikilink_targets(&new_rev.comment) {
            if !wiki.page_exists(&target)? {
                continue;
            }
            debug!("checking linked page {target:?} for revision {new}");
            for linked_text in wiki.last_revision_texts(&target, 2)? {
                let linked_clean = cleaner.clean(&linked_text);
                added_text = added_text.lines()
                                       .filter(|line| line.trim().is_empty() || !linked_clean.contains(*line))
                                       .collect::<Vec<_>>()
                                       .join("\n");
            }
        }
        if small(&added_text) {
            return Ok(None);
        }
    }
    Ok(Some(added_text))
}

//! Backend en memoria del almacén de diffs.
//!
//! Implementación de referencia de `DiffStore`, con la misma semántica que
//! el backend MySQL (unicidad, cascada de fuentes, sellos de transición).
//! Se usa en las pruebas del driver y como documentación ejecutable del
//! contrato.

use std::sync::Mutex;

use uuid::Uuid;

use cp_domain::{Diff, MwTimestamp, NewDiff, NewSource, Site, Status};

use crate::traits::{DiffStore, StoreError};

#[derive(Default)]
pub struct MemoryDiffStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_diff_id: u32,
    next_source_id: u32,
    rows: Vec<Diff>,
}

impl MemoryDiffStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copia de todas las filas, en orden de inserción.
    pub fn rows(&self) -> Vec<Diff> {
        self.inner.lock().expect("memory store poisoned").rows.clone()
    }
}

impl Inner {
    fn row_mut(&mut self, diff_id: u32) -> Result<&mut Diff, StoreError> {
        self.rows
            .iter_mut()
            .find(|row| row.diff_id == diff_id)
            .ok_or(StoreError::NotFound)
    }
}

impl DiffStore for MemoryDiffStore {
    fn add_revision(&self, revision: NewDiff) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let duplicate = inner.rows
                             .iter()
                             .any(|row| row.site == revision.site && row.rev_id == revision.rev_id);
        if duplicate {
            return Err(StoreError::Duplicate);
        }
        inner.next_diff_id += 1;
        let diff_id = inner.next_diff_id;
        inner.rows.push(Diff { diff_id,
                               site: revision.site,
                               page_namespace: revision.page_namespace,
                               page_title: revision.page_title,
                               rev_id: revision.rev_id,
                               rev_parent_id: revision.rev_parent_id,
                               rev_timestamp: revision.rev_timestamp,
                               rev_user_text: revision.rev_user_text,
                               submission_id: None,
                               status: Status::Unsubmitted,
                               status_timestamp: None,
                               status_user_text: None,
                               sources: Vec::new() });
        Ok(())
    }

    fn diffs_by_status(&self, statuses: &[Status]) -> Result<Vec<Diff>, StoreError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.rows
                .iter()
                .filter(|row| statuses.contains(&row.status))
                .cloned()
                .collect())
    }

    fn set_submission(&self, diff_id: u32, submission_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let taken = inner.rows
                         .iter()
                         .any(|row| row.submission_id == Some(submission_id) && row.diff_id != diff_id);
        if taken {
            return Err(StoreError::Duplicate);
        }
        let row = inner.row_mut(diff_id)?;
        row.submission_id = Some(submission_id);
        row.status = Status::Created;
        row.status_timestamp = Some(MwTimestamp::now());
        Ok(())
    }

    fn set_status(&self, diff_id: u32, status: Status) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let row = inner.row_mut(diff_id)?;
        row.status = status;
        row.status_timestamp = Some(MwTimestamp::now());
        Ok(())
    }

    fn reset_submission(&self, diff_id: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let row = inner.row_mut(diff_id)?;
        row.submission_id = None;
        row.status = Status::Unsubmitted;
        row.status_timestamp = Some(MwTimestamp::now());
        row.sources.clear();
        Ok(())
    }

    fn save_sources(&self, diff_id: u32, submission_id: Uuid, sources: &[NewSource]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let mut next_source_id = inner.next_source_id;
        let row = inner.row_mut(diff_id)?;
        row.sources = sources.iter()
                             .map(|source| {
                                 next_source_id += 1;
                                 cp_domain::Source { source_id: next_source_id,
                                                     submission_id,
                                                     description: source.description.clone(),
                                                     url: source.url.clone(),
                                                     percent: source.percent }
                             })
                             .collect();
        row.status = Status::Ready;
        row.status_timestamp = Some(MwTimestamp::now());
        inner.next_source_id = next_source_id;
        Ok(())
    }

    fn remove(&self, diff_id: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let before = inner.rows.len();
        inner.rows.retain(|row| row.diff_id != diff_id);
        if inner.rows.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn remove_revision(&self, site: &Site, rev_id: u32) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let before = inner.rows.len();
        inner.rows.retain(|row| !(row.site == *site && row.rev_id == rev_id));
        Ok((before - inner.rows.len()) as u64)
    }

    fn remove_submission(&self, submission_id: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let before = inner.rows.len();
        inner.rows.retain(|row| row.submission_id != Some(submission_id));
        Ok((before - inner.rows.len()) as u64)
    }

    fn create_tables(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

//! Mapeo fila ⇄ dominio.
//!
//! Las columnas binarias guardan texto UTF-8 codificado; la decodificación
//! fallida se reporta como `CorruptRow` en vez de truncar en silencio.

use diesel::prelude::*;
use uuid::Uuid;

use cp_domain::{Diff, MwTimestamp, NewDiff, NewSource, Site, Source, Status};

use crate::error::PersistenceError;
use crate::schema::{diffs, report_sources};

#[derive(Queryable, Debug)]
pub struct DiffRow {
    pub diff_id: u32,
    pub project: Vec<u8>,
    pub lang: Vec<u8>,
    pub page_namespace: i32,
    pub page_title: Vec<u8>,
    pub rev_id: u32,
    pub rev_parent_id: u32,
    pub rev_timestamp: Vec<u8>,
    pub rev_user_text: Vec<u8>,
    pub submission_id: Option<Vec<u8>>,
    pub status: i8,
    pub status_timestamp: Option<Vec<u8>>,
    pub status_user_text: Option<Vec<u8>>,
}

impl DiffRow {
    pub fn into_domain(self, sources: Vec<Source>) -> Result<Diff, PersistenceError> {
        Ok(Diff { diff_id: self.diff_id,
                  site: Site::new(text(self.project)?, text(self.lang)?),
                  page_namespace: self.page_namespace,
                  page_title: text(self.page_title)?,
                  rev_id: self.rev_id,
                  rev_parent_id: self.rev_parent_id,
                  rev_timestamp: timestamp(self.rev_timestamp)?,
                  rev_user_text: text(self.rev_user_text)?,
                  submission_id: self.submission_id.map(uuid_value).transpose()?,
                  status: Status::try_from(self.status).map_err(|e| PersistenceError::CorruptRow(e.to_string()))?,
                  status_timestamp: self.status_timestamp.map(timestamp).transpose()?,
                  status_user_text: self.status_user_text.map(text).transpose()?,
                  sources })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = diffs)]
pub struct NewDiffRow {
    pub project: Vec<u8>,
    pub lang: Vec<u8>,
    pub page_namespace: i32,
    pub page_title: Vec<u8>,
    pub rev_id: u32,
    pub rev_parent_id: u32,
    pub rev_timestamp: Vec<u8>,
    pub rev_user_text: Vec<u8>,
    pub status: i8,
}

impl From<&NewDiff> for NewDiffRow {
    fn from(revision: &NewDiff) -> Self {
        NewDiffRow { project: revision.site.project.clone().into_bytes(),
                     lang: revision.site.lang.clone().into_bytes(),
                     page_namespace: revision.page_namespace,
                     page_title: revision.page_title.clone().into_bytes(),
                     rev_id: revision.rev_id,
                     rev_parent_id: revision.rev_parent_id,
                     rev_timestamp: revision.rev_timestamp.to_mw().into_bytes(),
                     rev_user_text: revision.rev_user_text.clone().into_bytes(),
                     status: Status::Unsubmitted.value() }
    }
}

#[derive(Queryable, Debug)]
pub struct SourceRow {
    pub source_id: u32,
    pub submission_id: Vec<u8>,
    pub description: Vec<u8>,
    pub url: Option<Vec<u8>>,
    pub percent: f32,
}

impl SourceRow {
    pub fn into_domain(self) -> Result<Source, PersistenceError> {
        Ok(Source { source_id: self.source_id,
                    submission_id: uuid_value(self.submission_id)?,
                    description: text(self.description)?,
                    url: self.url.map(text).transpose()?,
                    percent: self.percent })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = report_sources)]
pub struct NewSourceRow {
    pub submission_id: Vec<u8>,
    pub description: Vec<u8>,
    pub url: Option<Vec<u8>>,
    pub percent: f32,
}

impl NewSourceRow {
    pub fn from_domain(submission_id: Uuid, source: &NewSource) -> Self {
        NewSourceRow { submission_id: uuid_bytes(submission_id),
                       description: source.description.clone().into_bytes(),
                       url: source.url.clone().map(String::into_bytes),
                       percent: source.percent }
    }
}

/// UUID en su forma canónica de 36 bytes, tal como se persiste.
pub fn uuid_bytes(value: Uuid) -> Vec<u8> {
    value.to_string().into_bytes()
}

fn uuid_value(bytes: Vec<u8>) -> Result<Uuid, PersistenceError> {
    let decoded = text(bytes)?;
    Uuid::parse_str(&decoded).map_err(|_| PersistenceError::CorruptRow(format!("bad uuid: {decoded:?}")))
}

fn timestamp(bytes: Vec<u8>) -> Result<MwTimestamp, PersistenceError> {
    let decoded = text(bytes)?;
    MwTimestamp::from_mw(&decoded).map_err(|e| PersistenceError::CorruptRow(e.to_string()))
}

fn text(bytes: Vec<u8>) -> Result<String, PersistenceError> {
    String::from_utf8(bytes).map_err(|e| PersistenceError::CorruptRow(format!("invalid utf8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_text_roundtrip() {
        for value in ["Example", "Éxàmþlë", "ﭗﭧﭷﮇﮗ", "𒀇𒀗𒀧𒀷"] {
            let bytes = value.as_bytes().to_vec();
            assert_eq!(text(bytes).unwrap(), value);
        }
    }

    #[test]
    fn timestamp_roundtrip() {
        let ts = MwTimestamp::from_mw("20230102030405").unwrap();
        assert_eq!(timestamp(ts.to_mw().into_bytes()).unwrap(), ts);
    }

    #[test]
    fn uuid_roundtrip() {
        let sid = Uuid::new_v4();
        let bytes = uuid_bytes(sid);
        assert_eq!(bytes.len(), 36);
        assert_eq!(uuid_value(bytes).unwrap(), sid);
    }

    #[test]
    fn corrupt_values_are_reported() {
        assert!(matches!(uuid_value(b"123456789".to_vec()), Err(PersistenceError::CorruptRow(_))));
        assert!(matches!(timestamp(b"not-a-date".to_vec()), Err(PersistenceError::CorruptRow(_))));
        assert!(matches!(text(vec![0xff, 0xfe]), Err(PersistenceError::CorruptRow(_))));
    }
}

//! Registros de dominio: la fila `Diff` y sus fuentes de informe.

use uuid::Uuid;

use crate::site::Site;
use crate::status::Status;
use crate::timestamp::MwTimestamp;

/// Una revisión rastreada y su progreso por el pipeline.
///
/// Invariantes (reflejan las restricciones del esquema):
/// - (project, lang, rev_id) es único.
/// - `submission_id` es `None` si y solo si `status == Unsubmitted`.
/// - `sources` solo es no vacío cuando `status == Ready`.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff {
    pub diff_id: u32,
    pub site: Site,
    pub page_namespace: i32,
    /// Forma de base de datos: guiones bajos, sin prefijo de espacio de nombres.
    pub page_title: String,
    pub rev_id: u32,
    /// 0 significa creación de página.
    pub rev_parent_id: u32,
    pub rev_timestamp: MwTimestamp,
    pub rev_user_text: String,
    pub submission_id: Option<Uuid>,
    pub status: Status,
    pub status_timestamp: Option<MwTimestamp>,
    /// Reservado para el flujo de revisión humana.
    pub status_user_text: Option<String>,
    pub sources: Vec<Source>,
}

/// Campos para insertar una revisión recién ingerida (status Unsubmitted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDiff {
    pub site: Site,
    pub page_namespace: i32,
    pub page_title: String,
    pub rev_id: u32,
    pub rev_parent_id: u32,
    pub rev_timestamp: MwTimestamp,
    pub rev_user_text: String,
}

/// Fuente externa que el servicio de similitud asoció a una submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub source_id: u32,
    pub submission_id: Uuid,
    pub description: String,
    pub url: Option<String>,
    pub percent: f32,
}

/// Fuente todavía sin persistir, tal como llega del servicio.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSource {
    pub description: String,
    pub url: Option<String>,
    pub percent: f32,
}

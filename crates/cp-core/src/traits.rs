//! Contratos de los colaboradores con efectos.
//!
//! El driver del pipeline opera exclusivamente contra estas interfaces; la
//! implementación real vive en `cp-persistence` (almacén) y `cp-adapters`
//! (clientes HTTP). Las pruebas las sustituyen por dobles en memoria.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use cp_domain::{Diff, MwTimestamp, NewDiff, NewSource, RevisionData, Site, SiteLexicon, Status};

/// Errores del almacén de diffs.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Violación de la unicidad (project, lang, rev_id) o de submission_id.
    #[error("duplicate row")]
    Duplicate,
    #[error("row not found")]
    NotFound,
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errores de los clientes remotos (wiki y servicio de similitud).
#[derive(Debug, Error)]
pub enum ApiError {
    /// Fallo de red o de protocolo, ya agotados los reintentos.
    #[error("transport error: {0}")]
    Transport(String),
    /// Respuesta sintácticamente válida pero fuera de contrato.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    /// Extensión ausente o permiso insuficiente; fatal para la operación.
    #[error("missing privilege: {0}")]
    Privilege(String),
}

/// Almacén persistente de revisiones rastreadas.
///
/// Cada método es una unidad transaccional propia: un fallo deja la fila en
/// su estado previo y la siguiente pasada retoma desde ahí.
pub trait DiffStore {
    /// Inserta una revisión con status `Unsubmitted`. Los duplicados por
    /// (project, lang, rev_id) devuelven `StoreError::Duplicate`.
    fn add_revision(&self, revision: NewDiff) -> Result<(), StoreError>;

    /// Filas en cualquiera de los estados pedidos, en orden de inserción.
    fn diffs_by_status(&self, statuses: &[Status]) -> Result<Vec<Diff>, StoreError>;

    /// Asigna la submission y pasa la fila a `Created`.
    fn set_submission(&self, diff_id: u32, submission_id: Uuid) -> Result<(), StoreError>;

    fn set_status(&self, diff_id: u32, status: Status) -> Result<(), StoreError>;

    /// Limpia submission_id y devuelve la fila a `Unsubmitted` (reintento
    /// como submission nueva).
    fn reset_submission(&self, diff_id: u32) -> Result<(), StoreError>;

    /// Adjunta las fuentes filtradas y pasa la fila a `Ready`.
    fn save_sources(&self, diff_id: u32, submission_id: Uuid, sources: &[NewSource]) -> Result<(), StoreError>;

    fn remove(&self, diff_id: u32) -> Result<(), StoreError>;

    /// Borra por rev_id dentro de un sitio. Devuelve filas afectadas.
    fn remove_revision(&self, site: &Site, rev_id: u32) -> Result<u64, StoreError>;

    /// Borra por submission_id. Devuelve filas afectadas.
    fn remove_submission(&self, submission_id: Uuid) -> Result<u64, StoreError>;

    /// Creación idempotente del esquema.
    fn create_tables(&self) -> Result<(), StoreError>;
}

/// Estado de una submission según el servicio de similitud.
#[derive(Debug, Clone, Default)]
pub struct SubmissionInfo {
    pub status: String,
    pub error_code: Option<String>,
}

/// Cliente del servicio de similitud, sobre ids de submission opacos.
pub trait SimilarityApi {
    fn create_submission(&self, site: &Site, title: &str, timestamp: MwTimestamp, owner: &str)
                         -> Result<Uuid, ApiError>;

    fn upload_submission(&self, submission_id: Uuid, text: &str) -> Result<(), ApiError>;

    fn submission_info(&self, submission_id: Uuid) -> Result<SubmissionInfo, ApiError>;

    fn generate_report(&self, submission_id: Uuid) -> Result<(), ApiError>;

    /// `None` mientras el informe se procesa; lista vacía cuando no hubo
    /// coincidencias; fuentes en caso contrario.
    fn report_sources(&self, submission_id: Uuid) -> Result<Option<Vec<NewSource>>, ApiError>;
}

/// Cliente de la API de un wiki concreto.
pub trait WikiApi {
    fn site(&self) -> &Site;

    /// Léxico del sitio (alias de espacios de nombres, extensiones). Cacheado
    /// por el cliente.
    fn lexicon(&self) -> Result<Arc<SiteLexicon>, ApiError>;

    /// Contenido y metadatos de las revisiones pedidas, en una sola llamada.
    fn load_revisions(&self, rev_ids: &[u32]) -> Result<HashMap<u32, RevisionData>, ApiError>;

    fn page_exists(&self, title: &str) -> Result<bool, ApiError>;

    /// Texto de las últimas `total` revisiones de una página, la más
    /// reciente primero.
    fn last_revision_texts(&self, title: &str, total: usize) -> Result<Vec<String>, ApiError>;

    /// Wikitexto actual de una página (lista de exclusión).
    fn page_text(&self, title: &str) -> Result<String, ApiError>;

    fn page_id(&self, namespace: i32, title: &str) -> Result<Option<u64>, ApiError>;

    /// Marca la revisión como posible copyvio en la cola de PageTriage.
    /// `ApiError::Privilege` si la extensión o el permiso faltan.
    fn submit_page_triage(&self, page_id: u64, rev_id: u32) -> Result<(), ApiError>;
}

/// Fábrica de clientes por sitio; las filas de la base pueden pertenecer a
/// wikis distintos dentro de una misma pasada.
pub trait WikiFactory {
    fn client(&self, site: &Site) -> Result<Arc<dyn WikiApi>, ApiError>;
}

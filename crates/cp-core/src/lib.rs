//! cp-core: contratos y orquestación del pipeline.
//!
//! Propósito:
//! - Definir las interfaces estrechas de los colaboradores con efectos (el
//!   almacén de diffs, la API del wiki, el servicio de similitud) para que
//!   las pruebas puedan sustituirlos sin red ni base de datos.
//! - Orquestar el procedimiento de extracción de diffs (`extract`) y las
//!   pasadas del pipeline (`driver`) sobre esas interfaces.
//! - Cargar la configuración tipada por sitio y servicio (`config`).
//!
//! Componentes principales:
//! - `traits`: `DiffStore`, `WikiApi`, `WikiFactory`, `SimilarityApi`.
//! - `extract`: decide si una revisión merece comprobarse y produce el texto
//!   añadido.
//! - `driver`: las pasadas check-changes y reports de la máquina de estados.
//! - `ignore`: lista de exclusión de URLs basada en una página del wiki.
//! - `memory`: `MemoryDiffStore`, backend en memoria de referencia para
//!   pruebas.

pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod ignore;
pub mod memory;
pub mod traits;

// Re-exports públicos principales
pub use config::{Config, DatabaseConfig, SiteConfig, TcaConfig};
pub use driver::Pipeline;
pub use error::CoreError;
pub use memory::MemoryDiffStore;
pub use traits::{ApiError, DiffStore, SimilarityApi, StoreError, SubmissionInfo, WikiApi, WikiFactory};

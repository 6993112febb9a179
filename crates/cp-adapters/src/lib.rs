//! cp-adapters: clientes con efectos del backend.
//!
//! Implementaciones reales de las interfaces que define `cp-core`:
//! - `tca`: cliente del servicio de similitud (Turnitin Core API).
//! - `wiki`: cliente de la action API de MediaWiki, uno por sitio.
//! - `stream`: lector del feed Server-Sent Events `revision-create` y el
//!   filtro de aceptación de eventos.
//! - `http`: envío con reintentos compartido por los clientes.

pub mod http;
pub mod stream;
pub mod tca;
pub mod wiki;

pub use stream::{accept_event, RevisionCreateEvent, RevisionStream};
pub use tca::TurnitinClient;
pub use wiki::{ActionApiClient, ActionApiFactory};

/// Versión publicada en los User-Agent e integration headers.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! cp-persistence
//!
//! Implementación MySQL/MariaDB (Diesel + r2d2) del almacén de diffs.
//! Objetivo: dar al `DiffStore` del core un backend durable con la misma
//! semántica que el backend en memoria: unicidad por (project, lang, rev_id),
//! cascada de fuentes al borrar una fila y sellos de transición.
//!
//! Módulos:
//! - `store`: `MysqlDiffStore` y utilidades de pool/reintento.
//! - `rows`: mapeo fila ⇄ dominio (varbinary ⇄ texto, BINARY(14) ⇄ instante,
//!   VARBINARY(36) ⇄ UUID).
//! - `schema`: tablas Diesel.
//! - `migrations`: runner embebido para la creación idempotente del esquema.

pub mod error;
pub mod migrations;
pub mod rows;
pub mod schema;
pub mod store;

pub use error::PersistenceError;
pub use store::{build_pool, ConnectionProvider, MysqlDiffStore, MysqlPool, PoolProvider};

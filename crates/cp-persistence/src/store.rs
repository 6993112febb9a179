//! Implementación MySQL (Diesel) del `DiffStore` del core.
//!
//! Cada operación es su propia unidad transaccional: una fila que falla a
//! mitad de pasada queda en su estado previo y la siguiente pasada la retoma.
//! Los errores transitorios de conexión se reintentan con backoff corto.

use diesel::mysql::MysqlConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};
use uuid::Uuid;

use cp_core::traits::{DiffStore, StoreError};
use cp_domain::{Diff, MwTimestamp, NewDiff, NewSource, Site, Source, Status};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::rows::{uuid_bytes, DiffRow, NewDiffRow, NewSourceRow, SourceRow};
use crate::schema::{diffs, report_sources};

/// Alias de tipo para el pool r2d2 de conexiones MySQL.
pub type MysqlPool = r2d2::Pool<ConnectionManager<MysqlConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real (producción / pruebas de integración) o un
/// doble en pruebas unitarias sin acoplar a r2d2.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<MysqlConnection>>, PersistenceError>;
}

/// Implementación de provider a partir de un pool r2d2.
pub struct PoolProvider {
    pub pool: MysqlPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<MysqlConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Determina si un error amerita reintento con backoff.
fn is_retryable(error: &PersistenceError) -> bool {
    match error {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        // Mensajes comunes del driver MySQL que llegan sin clasificar.
        PersistenceError::Unknown(msg) => {
            let msg = msg.to_lowercase();
            msg.contains("deadlock found")
            || msg.contains("lock wait timeout")
            || msg.contains("server has gone away")
            || msg.contains("connection refused")
            || msg.contains("broken pipe")
            || msg.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple con backoff (hasta 3 intentos: 15ms, 30ms, 45ms).
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            result => return result,
        }
    }
}

fn status_stamp() -> Vec<u8> {
    MwTimestamp::now().to_mw().into_bytes()
}

/// Almacén de diffs sobre MySQL.
pub struct MysqlDiffStore<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> MysqlDiffStore<P> {
    pub fn new(provider: P) -> Self {
        MysqlDiffStore { provider }
    }
}

impl MysqlDiffStore<PoolProvider> {
    pub fn from_pool(pool: MysqlPool) -> Self {
        MysqlDiffStore::new(PoolProvider { pool })
    }
}

impl<P: ConnectionProvider> MysqlDiffStore<P> {
    fn sources_for(conn: &mut MysqlConnection, submission_id: &[u8]) -> Result<Vec<Source>, PersistenceError> {
        let rows: Vec<SourceRow> = report_sources::table.filter(report_sources::submission_id.eq(submission_id))
                                                        .order(report_sources::source_id.asc())
                                                        .load(conn)?;
        rows.into_iter().map(SourceRow::into_domain).collect()
    }
}

impl<P: ConnectionProvider> DiffStore for MysqlDiffStore<P> {
    fn add_revision(&self, revision: NewDiff) -> Result<(), StoreError> {
        debug!("add_revision rev_id={} site={}", revision.rev_id, revision.site);
        let row = NewDiffRow::from(&revision);
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(diffs::table).values(&row)
                                             .execute(&mut conn)
                                             .map(|_| ())
                                             .map_err(PersistenceError::from)
        }).map_err(StoreError::from)
    }

    fn diffs_by_status(&self, statuses: &[Status]) -> Result<Vec<Diff>, StoreError> {
        let values: Vec<i8> = statuses.iter().map(|s| s.value()).collect();
        let result: Result<Vec<Diff>, PersistenceError> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            let rows: Vec<DiffRow> = diffs::table.filter(diffs::status.eq_any(values.as_slice()))
                                                 .order(diffs::diff_id.asc())
                                                 .load(&mut conn)?;
            let mut result = Vec::with_capacity(rows.len());
            for row in rows {
                let sources = match (&row.submission_id, row.status == Status::Ready.value()) {
                    (Some(submission), true) => Self::sources_for(&mut conn, submission)?,
                    _ => Vec::new(),
                };
                result.push(row.into_domain(sources)?);
            }
            Ok(result)
        });
        result.map_err(StoreError::from)
    }

    fn set_submission(&self, diff_id: u32, submission_id: Uuid) -> Result<(), StoreError> {
        let updated = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::update(diffs::table.filter(diffs::diff_id.eq(diff_id)))
                .set((diffs::submission_id.eq(Some(uuid_bytes(submission_id))),
                      diffs::status.eq(Status::Created.value()),
                      diffs::status_timestamp.eq(Some(status_stamp()))))
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn set_status(&self, diff_id: u32, status: Status) -> Result<(), StoreError> {
        let updated = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::update(diffs::table.filter(diffs::diff_id.eq(diff_id)))
                .set((diffs::status.eq(status.value()),
                      diffs::status_timestamp.eq(Some(status_stamp()))))
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn reset_submission(&self, diff_id: u32) -> Result<(), StoreError> {
        let updated = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::update(diffs::table.filter(diffs::diff_id.eq(diff_id)))
                .set((diffs::submission_id.eq(None::<Vec<u8>>),
                      diffs::status.eq(Status::Unsubmitted.value()),
                      diffs::status_timestamp.eq(Some(status_stamp()))))
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn save_sources(&self, diff_id: u32, submission_id: Uuid, sources: &[NewSource]) -> Result<(), StoreError> {
        let submission = uuid_bytes(submission_id);
        let rows: Vec<NewSourceRow> = sources.iter()
                                             .map(|source| NewSourceRow::from_domain(submission_id, source))
                                             .collect();
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.transaction::<_, diesel::result::Error, _>(|tx| {
                   // idempotente ante una pasada repetida sobre la misma fila
                   diesel::delete(report_sources::table
                       .filter(report_sources::submission_id.eq(&submission)))
                       .execute(tx)?;
                   diesel::insert_into(report_sources::table).values(&rows).execute(tx)?;
                   diesel::update(diffs::table.filter(diffs::diff_id.eq(diff_id)))
                       .set((diffs::status.eq(Status::Ready.value()),
                             diffs::status_timestamp.eq(Some(status_stamp()))))
                       .execute(tx)?;
                   Ok(())
               })
               .map_err(PersistenceError::from)
        }).map_err(StoreError::from)
    }

    fn remove(&self, diff_id: u32) -> Result<(), StoreError> {
        let removed = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::delete(diffs::table.filter(diffs::diff_id.eq(diff_id))).execute(&mut conn)
                                                                           .map_err(PersistenceError::from)
        }).map_err(StoreError::from)?;
        if removed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn remove_revision(&self, site: &Site, rev_id: u32) -> Result<u64, StoreError> {
        let project = site.project.clone().into_bytes();
        let lang = site.lang.clone().into_bytes();
        let removed = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::delete(diffs::table.filter(diffs::project.eq(&project))
                                       .filter(diffs::lang.eq(&lang))
                                       .filter(diffs::rev_id.eq(rev_id)))
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        }).map_err(StoreError::from)?;
        Ok(removed as u64)
    }

    fn remove_submission(&self, submission_id: Uuid) -> Result<u64, StoreError> {
        let submission = uuid_bytes(submission_id);
        let removed = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::delete(diffs::table.filter(diffs::submission_id.eq(&submission))).execute(&mut conn)
                                                                                     .map_err(PersistenceError::from)
        }).map_err(StoreError::from)?;
        Ok(removed as u64)
    }

    fn create_tables(&self) -> Result<(), StoreError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            run_pending_migrations(&mut conn)
        }).map_err(StoreError::from)
    }
}

/// Construye un pool MySQL r2d2 a partir de una URL.
///
/// Ajusta tamaños inválidos (`min > max` colapsa a `max`) y devuelve
/// `TransientIo` ante errores del manager.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<MysqlPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("min_size > max_size ({validated_min} > {validated_max}), using min=max");
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<MysqlConnection>::new(database_url);
    r2d2::Pool::builder().min_idle(Some(final_min))
                         .max_size(validated_max)
                         .build(manager)
                         .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))
}

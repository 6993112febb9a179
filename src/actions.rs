//! Cableado de las acciones del CLI sobre los componentes reales.

use log::{info, warn};

use cp_adapters::{accept_event, ActionApiFactory, RevisionStream, TurnitinClient};
use cp_core::traits::DiffStore;
use cp_core::{Config, CoreError, Pipeline, StoreError};
use cp_domain::{site, MwTimestamp, NewDiff, Site};
use cp_persistence::store::PoolProvider;
use cp_persistence::{build_pool, MysqlDiffStore};

use crate::cli::{Action, DbArgs};

const POOL_MIN: u32 = 1;
const POOL_MAX: u32 = 4;
/// Reintentos de la API del wiki (el presupuesto del TCA sale de la config).
const WIKI_MAX_RETRIES: u32 = 3;

pub fn run(action: Action) -> Result<(), CoreError> {
    let config = Config::load();
    match action {
        Action::StoreChanges { since, total } => store_changes(&config, since, total),
        Action::CheckChanges => check_changes(&config),
        Action::Reports => reports(&config),
        Action::Db(args) => db(&config, args),
    }
}

fn open_store(config: &Config) -> Result<MysqlDiffStore<PoolProvider>, CoreError> {
    let database = config.database_config()?;
    let pool = build_pool(&database.url(), POOL_MIN, POOL_MAX).map_err(StoreError::from)?;
    Ok(MysqlDiffStore::from_pool(pool))
}

fn store_changes(config: &Config, since: Option<MwTimestamp>, total: Option<u64>) -> Result<(), CoreError> {
    // valida temprano que haya dominios vigilados
    config.domains()?;
    let store = open_store(config)?;
    let stream = RevisionStream::wikimedia(since);
    let mut stored: u64 = 0;
    for event in stream {
        let event = event?;
        if !accept_event(config, &event) {
            continue;
        }
        let revision = NewDiff { site: Site::from_domain(&event.meta.domain)?,
                                 page_namespace: event.page_namespace,
                                 page_title: site::db_title(event.page_namespace, &event.page_title),
                                 rev_id: event.rev_id,
                                 rev_parent_id: event.rev_parent_id,
                                 rev_timestamp: event.rev_timestamp,
                                 rev_user_text: event.performer.user_text.clone() };
        match store.add_revision(revision) {
            Ok(()) => info!("stored revision {} from {}", event.rev_id, event.meta.domain),
            Err(StoreError::Duplicate) => {
                warn!("revision {} on {} is already tracked", event.rev_id, event.meta.domain);
            }
            Err(store_error) => return Err(store_error.into()),
        }
        stored += 1;
        if total.is_some_and(|limit| stored >= limit) {
            break;
        }
    }
    Ok(())
}

fn check_changes(config: &Config) -> Result<(), CoreError> {
    let store = open_store(config)?;
    let similarity = TurnitinClient::new(&config.tca_config()?)?;
    let wikis = ActionApiFactory::new(WIKI_MAX_RETRIES)?;
    Pipeline::new(&store, &wikis, &similarity, config).check_changes()
}

fn reports(config: &Config) -> Result<(), CoreError> {
    let store = open_store(config)?;
    let similarity = TurnitinClient::new(&config.tca_config()?)?;
    let wikis = ActionApiFactory::new(WIKI_MAX_RETRIES)?;
    let pipeline = Pipeline::new(&store, &wikis, &similarity, config);
    pipeline.check_reports()?;
    pipeline.generate_reports()
}

fn db(config: &Config, args: DbArgs) -> Result<(), CoreError> {
    let store = open_store(config)?;
    if args.create_tables {
        store.create_tables()?;
        info!("database tables created");
    } else if let Some(rev_id) = args.remove_revision {
        // el ámbito es el primer dominio habilitado
        let domains = config.domains()?;
        let scope = Site::from_domain(&domains[0])?;
        let removed = store.remove_revision(&scope, rev_id)?;
        info!("removed {removed} row(s) for revision {rev_id} on {scope}");
    } else if let Some(submission_id) = args.remove_submission {
        let removed = store.remove_submission(submission_id)?;
        info!("removed {removed} row(s) for submission {submission_id}");
    }
    Ok(())
}

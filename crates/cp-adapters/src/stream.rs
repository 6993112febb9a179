//! Lector del feed de eventos `revision-create`.
//!
//! El feed es Server-Sent Events sobre HTTP; la conexión y el enmarcado los
//! lleva `sse_client::EventSource`, y este módulo consume su canal de
//! eventos como un `Iterator` de eventos decodificados. Los bloques `data`
//! que no decodifican (líneas truncadas, eventos canary de otros esquemas)
//! se saltan. Al reconectar se reanuda con el parámetro `since` del feed,
//! avanzado al sello de tiempo del último evento recibido; el `since`
//! inicial, si lo hay, solo aplica a la primera conexión.

use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;
use sse_client::EventSource;

use cp_core::{ApiError, Config};
use cp_domain::MwTimestamp;

const WIKIMEDIA_STREAM_URL: &str = "https://stream.wikimedia.org/v2/stream/revision-create";
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const MAX_CONNECT_FAILURES: u32 = 5;

/// Largo mínimo en bytes de una revisión para entrar al pipeline.
const MIN_REV_LEN: u64 = 500;

/// Evento de creación de revisión, con los campos que usa el filtro.
#[derive(Debug, Clone, Deserialize)]
pub struct RevisionCreateEvent {
    pub meta: EventMeta,
    pub page_namespace: i32,
    pub page_title: String,
    pub rev_id: u32,
    /// Ausente en creaciones de página; 0 equivale a "sin padre".
    #[serde(default)]
    pub rev_parent_id: u32,
    pub rev_timestamp: MwTimestamp,
    #[serde(default)]
    pub rev_len: u64,
    pub performer: EventPerformer,
    #[serde(default)]
    pub rev_content_changed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventMeta {
    pub domain: String,
    pub uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventPerformer {
    pub user_text: String,
    #[serde(default)]
    pub user_is_bot: bool,
}

/// Criterio de aceptación del ingestor: dominio habilitado, espacio de
/// nombres vigilado, contenido cambiado, editor humano y tamaño mínimo.
pub fn accept_event(config: &Config, event: &RevisionCreateEvent) -> bool {
    let site_config = config.site_config(&event.meta.domain);
    site_config.enabled
        && site_config.namespaces.contains(&event.page_namespace)
        && event.rev_content_changed
        && !event.performer.user_is_bot
        && event.rev_len > MIN_REV_LEN
}

/// Bloque `data` de un evento SSE decodificado al tipo del feed, o `None`
/// si no corresponde (vacío, truncado o de otro esquema).
fn decode_event(data: &str) -> Option<RevisionCreateEvent> {
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str(data) {
        Ok(event) => Some(event),
        Err(decode_error) => {
            debug!("undecodable stream event ({decode_error})");
            None
        }
    }
}

pub struct RevisionStream {
    url: String,
    /// Punto de reanudación de la próxima conexión.
    since: Option<MwTimestamp>,
    source: Option<EventSource>,
    receiver: Option<Receiver<sse_client::Event>>,
    connect_failures: u32,
}

impl RevisionStream {
    /// Stream público de Wikimedia.
    pub fn wikimedia(since: Option<MwTimestamp>) -> Self {
        Self::new(WIKIMEDIA_STREAM_URL, since)
    }

    pub fn new(url: &str, since: Option<MwTimestamp>) -> Self {
        RevisionStream { url: url.to_string(),
                         since,
                         source: None,
                         receiver: None,
                         connect_failures: 0 }
    }

    fn connect(&mut self) -> Result<(), ApiError> {
        let url = match self.since {
            Some(since) => format!("{}?since={}", self.url, since.to_iso()),
            None => self.url.clone(),
        };
        let source = EventSource::new(&url)
            .map_err(|connect_error| ApiError::Transport(format!("{connect_error:?}")))?;
        debug!("connected to {url}");
        self.receiver = Some(source.receiver());
        self.source = Some(source);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.receiver = None;
        if let Some(source) = self.source.take() {
            source.close();
        }
    }
}

impl Iterator for RevisionStream {
    type Item = Result<RevisionCreateEvent, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.receiver.is_none() {
                match self.connect() {
                    Ok(()) => {}
                    Err(connect_error) => {
                        self.connect_failures += 1;
                        if self.connect_failures >= MAX_CONNECT_FAILURES {
                            return Some(Err(connect_error));
                        }
                        warn!("stream connect failed ({connect_error}), retrying in {RECONNECT_DELAY:?}");
                        thread::sleep(RECONNECT_DELAY);
                        continue;
                    }
                }
            }
            let received = self.receiver.as_ref().and_then(|receiver| receiver.recv().ok());
            match received {
                Some(frame) => {
                    let Some(event) = decode_event(&frame.data) else { continue };
                    // próximo punto de reanudación
                    self.since = Some(event.rev_timestamp);
                    self.connect_failures = 0;
                    return Some(Ok(event));
                }
                None => {
                    // la fuente cerró su canal; reconectar desde `since`
                    self.disconnect();
                    self.connect_failures += 1;
                    if self.connect_failures >= MAX_CONNECT_FAILURES {
                        return Some(Err(ApiError::Transport("event stream closed repeatedly".into())));
                    }
                    warn!("stream closed, reconnecting in {RECONNECT_DELAY:?}");
                    thread::sleep(RECONNECT_DELAY);
                }
            }
        }
    }
}

impl Drop for RevisionStream {
    fn drop(&mut self) {
        self.disconnect();
    }
}

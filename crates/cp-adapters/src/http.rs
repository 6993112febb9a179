//! Envío HTTP con política de reintentos compartida.
//!
//! Una sola implementación para todos los clientes: reintenta 429, 5xx y
//! fallos de conexión con backoff exponencial acotado. Los estados de error
//! no reintentables vuelven al llamador, que decide con `error_for_status`.

use std::thread;
use std::time::Duration;

use log::warn;
use reqwest::blocking::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use cp_core::ApiError;

/// Techo del backoff exponencial entre reintentos.
const BACKOFF_MAX_SECS: u64 = 120;

pub fn send_with_retry(request: RequestBuilder, max_retries: u32) -> Result<Response, ApiError> {
    let mut attempt: u32 = 0;
    loop {
        let this_try = request.try_clone()
                              .ok_or_else(|| ApiError::Transport("request body is not replayable".into()))?;
        let outcome = this_try.send();
        let retryable = match &outcome {
            Ok(response) => {
                let status = response.status();
                status.as_u16() == 429 || status.is_server_error()
            }
            Err(error) => error.is_timeout() || error.is_connect(),
        };
        if !retryable || attempt >= max_retries {
            return outcome.map_err(|error| ApiError::Transport(error.to_string()));
        }
        let delay = Duration::from_secs((1u64 << attempt.min(16)).min(BACKOFF_MAX_SECS));
        warn!("retryable HTTP failure (attempt {}): sleeping {delay:?}", attempt + 1);
        thread::sleep(delay);
        attempt += 1;
    }
}

/// Respuesta 2xx decodificada como JSON.
pub fn expect_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = response.error_for_status().map_err(|error| ApiError::Transport(error.to_string()))?;
    response.json().map_err(|error| ApiError::UnexpectedResponse(error.to_string()))
}

/// Respuesta 2xx sin cuerpo relevante.
pub fn expect_success(response: Response) -> Result<(), ApiError> {
    response.error_for_status()
            .map(|_| ())
            .map_err(|error| ApiError::Transport(error.to_string()))
}

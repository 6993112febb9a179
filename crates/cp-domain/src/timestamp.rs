//! Instante UTC con precisión de segundos.
//!
//! MediaWiki intercambia sellos de tiempo en dos formas: ISO 8601 en la API y
//! el stream de eventos, y la forma compacta de 14 caracteres
//! `YYYYMMDDHHMMSS` en la base de datos. `MwTimestamp` encapsula ambas y
//! garantiza el truncado a segundos, de modo que el viaje de ida y vuelta por
//! la columna BINARY(14) preserve igualdad.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Timelike, Utc};
use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::DomainError;

const MW_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MwTimestamp(DateTime<Utc>);

impl MwTimestamp {
    /// Instante actual, truncado a segundos.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Construye desde cualquier `DateTime<Utc>`, descartando subsegundos.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        // with_nanosecond(0) solo falla con valores fuera de rango; 0 nunca lo está
        MwTimestamp(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// Interpreta la forma compacta `YYYYMMDDHHMMSS`.
    pub fn from_mw(value: &str) -> Result<Self, DomainError> {
        NaiveDateTime::parse_from_str(value, MW_FORMAT)
            .map(|naive| MwTimestamp(naive.and_utc()))
            .map_err(|_| DomainError::InvalidTimestamp(value.to_string()))
    }

    /// Interpreta ISO 8601, con o sin zona horaria (sin zona se asume UTC).
    pub fn from_iso(value: &str) -> Result<Self, DomainError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(Self::from_datetime(dt.with_timezone(&Utc)));
        }
        for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
                return Ok(MwTimestamp(naive.and_utc()));
            }
        }
        Err(DomainError::InvalidTimestamp(value.to_string()))
    }

    /// Forma compacta de 14 caracteres para la base de datos.
    pub fn to_mw(self) -> String {
        self.0.format(MW_FORMAT).to_string()
    }

    /// Forma ISO 8601 con sufijo `Z`, usada en los cuerpos JSON.
    pub fn to_iso(self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for MwTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso())
    }
}

impl<'de> Deserialize<'de> for MwTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where D: Deserializer<'de>
    {
        let raw = String::deserialize(deserializer)?;
        MwTimestamp::from_iso(&raw).map_err(de::Error::custom)
    }
}

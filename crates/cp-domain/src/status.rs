//! Estado de un `Diff` dentro del pipeline.
//!
//! Las transiciones válidas son:
//! - `Unsubmitted` -> `Created` (alta en el servicio de similitud)
//! - `Created` -> `Uploaded` (texto subido)
//! - `Uploaded` -> `Pending` (informe solicitado)
//! - `Pending` -> `Ready` (fuentes adjuntadas; terminal)
//! - `Pending` -> `Unsubmitted` (error reintentable; se limpia submission_id)
//!
//! Cualquier estado puede terminar en borrado de la fila. Los valores
//! negativos marcan trabajo en vuelo; cero es terminal, de modo que un rango
//! sobre la columna `status` selecciona lo pendiente.

use crate::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i8)]
pub enum Status {
    /// Fila recién ingerida; sin submission en el servicio externo.
    Unsubmitted = -4,
    /// Submission creada; el texto todavía no se subió.
    Created = -3,
    /// Texto subido; a la espera de que el servicio lo procese.
    Uploaded = -2,
    /// Informe de similitud solicitado; a la espera de fuentes.
    Pending = -1,
    /// Fuentes adjuntadas; espera revisión humana.
    Ready = 0,
}

impl Status {
    /// Valor persistido en la columna `status` (TINYINT).
    pub fn value(self) -> i8 {
        self as i8
    }
}

impl TryFrom<i8> for Status {
    type Error = DomainError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -4 => Ok(Status::Unsubmitted),
            -3 => Ok(Status::Created),
            -2 => Ok(Status::Uploaded),
            -1 => Ok(Status::Pending),
            0 => Ok(Status::Ready),
            other => Err(DomainError::InvalidStatus(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_values() {
        for status in [Status::Unsubmitted, Status::Created, Status::Uploaded, Status::Pending, Status::Ready] {
            assert_eq!(Status::try_from(status.value()).unwrap(), status);
        }
    }

    #[test]
    fn in_flight_ordering() {
        // El orden monotónico permite seleccionar trabajo en vuelo por rango.
        assert!(Status::Unsubmitted < Status::Created);
        assert!(Status::Created < Status::Uploaded);
        assert!(Status::Uploaded < Status::Pending);
        assert!(Status::Pending < Status::Ready);
    }

    #[test]
    fn unknown_value_is_rejected() {
        assert_eq!(Status::try_from(1), Err(DomainError::InvalidStatus(1)));
        assert_eq!(Status::try_from(-5), Err(DomainError::InvalidStatus(-5)));
    }
}

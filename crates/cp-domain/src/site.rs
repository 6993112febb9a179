//! Identidad de un wiki y léxico por sitio.
//!
//! Un sitio se identifica por el par (project, lang); su dominio público
//! sigue el patrón `<lang>.<project>.org`. El `SiteLexicon` reúne los datos
//! dependientes del sitio que necesita el limpiador de wikitexto: alias de
//! los espacios de nombres Category y File, extensiones de archivo conocidas
//! y los nombres canónicos de cada espacio de nombres.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Par (project, lang) que identifica un wiki concreto.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Site {
    pub project: String,
    pub lang: String,
}

impl Site {
    pub fn new(project: impl Into<String>, lang: impl Into<String>) -> Self {
        Site { project: project.into(), lang: lang.into() }
    }

    /// Deriva la identidad desde un dominio `<lang>.<project>.org`.
    pub fn from_domain(domain: &str) -> Result<Self, DomainError> {
        let mut parts = domain.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(lang), Some(project), Some("org"), None) if !lang.is_empty() && !project.is_empty() => {
                Ok(Site::new(project, lang))
            }
            _ => Err(DomainError::InvalidDomain(domain.to_string())),
        }
    }

    /// Dominio público del sitio.
    pub fn hostname(&self) -> String {
        format!("{}.{}.org", self.lang, self.project)
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project, self.lang)
    }
}

/// Datos por sitio que alimentan el limpiador y la normalización de títulos.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteLexicon {
    /// Nombres y alias del espacio de nombres Category (ns 14).
    pub category_aliases: Vec<String>,
    /// Nombres y alias del espacio de nombres File (ns 6).
    pub file_aliases: Vec<String>,
    /// Extensiones de archivo subibles según el sitio.
    pub file_extensions: Vec<String>,
    /// Nombre canónico local de cada espacio de nombres.
    pub namespace_names: HashMap<i32, String>,
}

impl SiteLexicon {
    /// Título de presentación: espacios y, fuera del ns principal, el prefijo
    /// canónico del espacio de nombres.
    pub fn canonical_title(&self, namespace: i32, db_title: &str) -> String {
        let readable = db_title.replace('_', " ");
        if namespace == 0 {
            return readable;
        }
        match self.namespace_names.get(&namespace) {
            Some(name) if !name.is_empty() => format!("{name}:{readable}"),
            _ => readable,
        }
    }
}

/// Título en forma de base de datos: guiones bajos, sin prefijo de espacio de
/// nombres. Los eventos del stream traen el prefijo local cuando ns != 0.
pub fn db_title(namespace: i32, raw_title: &str) -> String {
    let bare = if namespace != 0 {
        raw_title.split_once(':').map(|(_, rest)| rest).unwrap_or(raw_title)
    } else {
        raw_title
    };
    bare.trim().replace(' ', "_")
}

//! Lista de exclusión de URLs de fuentes.
//!
//! Una página del wiki cuyas líneas son patrones regex (sin distinción de
//! mayúsculas), con comentario opcional tras `#`. Las líneas inválidas se
//! registran y se saltan. Solo se aplica a URLs de fuentes durante el filtro
//! de la pasada de informes.

use log::error;
use regex::{Regex, RegexBuilder};

use crate::traits::{ApiError, WikiApi};

/// Compila las líneas de la página en patrones utilizables.
pub fn parse_ignore_list(text: &str) -> Vec<Regex> {
    let mut patterns = Vec::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        match RegexBuilder::new(line).case_insensitive(true).build() {
            Ok(pattern) => patterns.push(pattern),
            Err(parse_error) => {
                error!("{parse_error}");
                error!("invalid regex ignored: {line:?}");
            }
        }
    }
    patterns
}

/// Lee y compila la lista desde el wiki; vacía si no hay título configurado.
pub fn load_ignore_list(wiki: &dyn WikiApi, title: Option<&str>) -> Result<Vec<Regex>, ApiError> {
    match title {
        Some(title) => Ok(parse_ignore_list(&wiki.page_text(title)?)),
        None => Ok(Vec::new()),
    }
}

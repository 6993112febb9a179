//! Limpieza de wikitexto previa a la comparación de revisiones.
//!
//! El orden de las pasadas es contractual:
//! 1. recorte; vacío corta temprano;
//! 2. negrita/cursiva: series de 2 o 3 apóstrofos emparejadas se reducen a su
//!    contenido;
//! 3. enlaces de categoría (alias del sitio, sin distinción de mayúsculas);
//! 4. citas cortas: toda subcadena `"…"` con menos de 50 palabras se elimina
//!    en todas sus apariciones;
//! 5. recorrido del marcado (ver `markup`);
//! 6. referencias a archivos `<alias>:….<extensión conocida>`;
//! 7. colapso de espacios, recorte por línea y colapso de líneas en blanco;
//! 8. recorte final.
//!
//! El resultado es determinista e idempotente sobre salida ya limpia.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::markup;
use crate::site::SiteLexicon;

// Apóstrofos de apertura y cierre emparejados; necesita retrorreferencia.
static BOLD_ITALIC_RE: Lazy<fancy_regex::Regex> =
    Lazy::new(|| fancy_regex::Regex::new(r"('{2,3})(.+?)\1").expect("bold/italic regex"));

static QUOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"".+?""#).expect("quote regex"));

static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("space regex"));

static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"( ?\n){3,}").expect("blank line regex"));

const SHORT_QUOTE_WORDS: usize = 50;

/// Limpiador ligado a un sitio: compila una sola vez las expresiones que
/// dependen de sus alias de espacios de nombres y extensiones de archivo.
#[derive(Debug)]
pub struct TextCleaner {
    category_re: Regex,
    file_re: Regex,
}

impl TextCleaner {
    pub fn new(lexicon: &SiteLexicon) -> Self {
        let categories = alternation(&lexicon.category_aliases, "Category");
        let files = alternation(&lexicon.file_aliases, "File");
        let extensions = alternation(&lexicon.file_extensions, "png");
        let category_re = RegexBuilder::new(&format!(r"\[\[\s*:?\s*({categories})\s*:[^\]]+?\]\]\s*"))
            .case_insensitive(true)
            .build()
            .expect("category regex");
        let file_re = RegexBuilder::new(&format!(r"({files})\s*:.+?\.({extensions})"))
            .case_insensitive(true)
            .build()
            .expect("file regex");
        TextCleaner { category_re, file_re }
    }

    /// Normaliza wikitexto a prosa comparable.
    pub fn clean(&self, text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        let text = BOLD_ITALIC_RE.replace_all(trimmed, "$2");
        let text = self.category_re.replace_all(&text, "");

        // las citas se localizan antes de aplicar cualquier reemplazo
        let quotes: Vec<String> = QUOTE_RE.find_iter(&text).map(|m| m.as_str().to_owned()).collect();
        let mut text = text.into_owned();
        for quote in quotes {
            if quote.split_whitespace().count() < SHORT_QUOTE_WORDS {
                text = text.replace(&quote, "");
            }
        }

        let text = markup::strip_markup(&text);
        let text = self.file_re.replace_all(&text, "");
        let text = MULTI_SPACE_RE.replace_all(&text, " ");
        let text = text.lines().map(str::trim).collect::<Vec<_>>().join("\n");
        let text = BLANK_RUN_RE.replace_all(&text, "\n\n");
        text.trim().to_string()
    }
}

fn alternation(values: &[String], fallback: &str) -> String {
    if values.is_empty() {
        return regex::escape(fallback);
    }
    values.iter().map(|value| regex::escape(value)).collect::<Vec<_>>().join("|")
}

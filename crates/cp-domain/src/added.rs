//! Selección del texto añadido entre dos revisiones limpias.

use similar::{capture_diff_slices, Algorithm, DiffTag};

use crate::wikitext::TextCleaner;

/// Una inserción/sustitución cuenta solo si supera este largo en caracteres.
const MIN_RUN_CHARS: usize = 50;

/// Texto introducido por la revisión nueva respecto de la vieja.
///
/// Ambos textos se limpian y se comparan como secuencias de caracteres. Se
/// emiten los tramos de inserción o sustitución cuyo lado nuevo supera los 50
/// caracteres y que no aparecen literalmente en el texto viejo limpio; los
/// tramos se unen con saltos de línea.
pub fn added_revision_text(old: &str, new: &str, cleaner: &TextCleaner) -> String {
    let old = cleaner.clean(old);
    let new = cleaner.clean(new);
    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();

    let mut parts: Vec<String> = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, &old_chars, &new_chars) {
        if !matches!(op.tag(), DiffTag::Insert | DiffTag::Replace) {
            continue;
        }
        let range = op.new_range();
        if range.len() <= MIN_RUN_CHARS {
            continue;
        }
        let part: String = new_chars[range].iter().collect();
        if old.contains(&part) {
            continue;
        }
        parts.push(part.trim_matches(' ').to_string());
    }
    parts.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::SiteLexicon;

    fn cleaner() -> TextCleaner {
        TextCleaner::new(&SiteLexicon::default())
    }

    #[test]
    fn identical_texts_add_nothing() {
        let text = "foo bar ".repeat(100);
        assert_eq!(added_revision_text(&text, &text, &cleaner()), "");
    }

    #[test]
    fn fresh_prose_is_extracted() {
        let old = "foo bar ".repeat(100);
        let addition = "entirely new paragraph about something else ".repeat(4);
        let new = format!("{old}{addition}");
        let result = added_revision_text(&old, &new, &cleaner());
        // el alineamiento exacto depende del diff; el contenido no
        assert!(result.contains("entirely new paragraph about something else"));
        assert!(result.len() + 2 >= addition.trim().len());
    }

    #[test]
    fn run_length_boundary() {
        // 50 caracteres insertados: fuera; 51: dentro
        let old = "base text that stays";
        let insert_50 = "x".repeat(50);
        let insert_51 = "x".repeat(51);
        assert_eq!(added_revision_text(old, &format!("{old}{insert_50}"), &cleaner()), "");
        let result = added_revision_text(old, &format!("{old}{insert_51}"), &cleaner());
        assert!(result.contains(&insert_51));
    }

    #[test]
    fn text_already_present_in_old_is_skipped() {
        // el bloque duplicado ya existe literalmente en el texto viejo
        let block = "a paragraph that was simply moved somewhere else entirely, word by word".to_string();
        let old = format!("{block} tail");
        let new = format!("{block}{block}");
        assert_eq!(added_revision_text(&old, &new, &cleaner()), "");
    }
}

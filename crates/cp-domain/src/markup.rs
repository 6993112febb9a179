//! Recorrido no estricto del marcado wiki.
//!
//! Reproduce la semántica de un parser tolerante al renderizar texto plano:
//! - plantillas `{{…}}`: se emiten los valores de sus parámetros, unidos por
//!   espacios (el nombre de la plantilla se descarta);
//! - argumentos `{{{…|def}}}`: se emite el valor por defecto si existe;
//! - enlaces internos `[[destino|etiqueta]]`: etiqueta si existe, si no el
//!   destino;
//! - enlaces externos `[url título]`: solo el título; URLs sueltas y enlaces
//!   sin título desaparecen;
//! - encabezados `== X ==`: solo el texto interior;
//! - etiquetas HTML: se descarta el marcado y se conserva el contenido;
//! - comentarios `<!-- … -->`: se descartan por completo.
//!
//! El marcado mal cerrado se conserva literal, de modo que una segunda pasada
//! produzca el mismo resultado.

const URL_SCHEMES: [&str; 3] = ["http://", "https://", "ftp://"];

/// Convierte wikitexto en texto plano según las reglas del módulo.
pub fn strip_markup(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    strip_chars(&chars, true)
}

fn strip_chars(chars: &[char], mut at_line_start: bool) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if starts_with(chars, i, "<!--") {
            match find_seq(chars, i + 4, "-->") {
                Some(end) => {
                    i = end + 3;
                    continue;
                }
                None => {
                    // comentario sin cerrar: literal
                    out.push(c);
                    i += 1;
                    continue;
                }
            }
        }
        if starts_with(chars, i, "{{{") {
            if let Some(end) = find_balanced(chars, i, "{{{", "}}}") {
                let inner = &chars[i + 3..end];
                let parts = split_top_level(inner, '|');
                if parts.len() > 1 {
                    out.push_str(&strip_chars(&join_parts(&parts[1..]), false));
                }
                i = end + 3;
                at_line_start = false;
                continue;
            }
        }
        if starts_with(chars, i, "{{") {
            if let Some(end) = find_balanced(chars, i, "{{", "}}") {
                let inner = &chars[i + 2..end];
                let parts = split_top_level(inner, '|');
                // el nombre de la plantilla se descarta; quedan los valores
                let values: Vec<String> = parts.iter()
                                               .skip(1)
                                               .map(|param| param_value(param))
                                               .map(|value| strip_chars(&value, false))
                                               .filter(|value| !value.trim().is_empty())
                                               .collect();
                out.push_str(&values.join(" "));
                i = end + 2;
                at_line_start = false;
                continue;
            }
        }
        if starts_with(chars, i, "[[") {
            if let Some(end) = find_balanced(chars, i, "[[", "]]") {
                let inner = &chars[i + 2..end];
                let parts = split_top_level(inner, '|');
                let rendered = if parts.len() > 1 {
                    strip_chars(&join_parts(&parts[1..]), false)
                } else {
                    strip_chars(&parts[0], false)
                };
                out.push_str(&rendered);
                i = end + 2;
                at_line_start = false;
                continue;
            }
        }
        if c == '[' {
            if let Some(end) = find_seq(chars, i + 1, "]") {
                let inner = &chars[i + 1..end];
                if is_external_target(inner) {
                    // [url] desaparece; [url título] deja el título
                    if let Some(space) = inner.iter().position(|ch| ch.is_whitespace()) {
                        out.push_str(&strip_chars(&inner[space + 1..], false));
                    }
                    i = end + 1;
                    at_line_start = false;
                    continue;
                }
            }
            out.push(c);
            i += 1;
            at_line_start = false;
            continue;
        }
        if bare_url_len(chars, i) > 0 {
            i += bare_url_len(chars, i);
            at_line_start = false;
            continue;
        }
        if c == '<' && i + 1 < chars.len() && (chars[i + 1] == '/' || chars[i + 1].is_ascii_alphabetic()) {
            if let Some(end) = find_seq(chars, i + 1, ">") {
                i = end + 1;
                continue;
            }
            out.push(c);
            i += 1;
            continue;
        }
        if c == '=' && at_line_start {
            if let Some((inner, line_end)) = heading_inner(chars, i) {
                out.push_str(strip_chars(&inner, false).trim());
                i = line_end;
                at_line_start = false;
                continue;
            }
        }
        out.push(c);
        at_line_start = c == '\n';
        i += 1;
    }
    out
}

fn starts_with(chars: &[char], at: usize, needle: &str) -> bool {
    let mut i = at;
    for expected in needle.chars() {
        if chars.get(i) != Some(&expected) {
            return false;
        }
        i += 1;
    }
    true
}

/// Posición de la primera ocurrencia de `needle` desde `from`.
fn find_seq(chars: &[char], from: usize, needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() || chars.len() < needle.len() {
        return None;
    }
    (from..=chars.len() - needle.len()).find(|&i| chars[i..i + needle.len()] == needle[..])
}

/// Cierre balanceado para delimitadores de apertura/cierre de igual longitud.
fn find_balanced(chars: &[char], open_at: usize, open: &str, close: &str) -> Option<usize> {
    let len = open.chars().count();
    let mut depth = 0usize;
    let mut i = open_at;
    while i < chars.len() {
        if starts_with(chars, i, open) {
            depth += 1;
            i += len;
        } else if starts_with(chars, i, close) {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
            i += len;
        } else {
            i += 1;
        }
    }
    None
}

/// Divide en el nivel superior, ignorando separadores anidados en llaves o
/// corchetes.
fn split_top_level(chars: &[char], separator: char) -> Vec<Vec<char>> {
    let mut parts = vec![Vec::new()];
    let mut depth = 0i32;
    for &c in chars {
        match c {
            '{' | '[' => depth += 1,
            '}' | ']' => depth -= 1,
            _ => {}
        }
        if c == separator && depth <= 0 {
            parts.push(Vec::new());
        } else if let Some(part) = parts.last_mut() {
            part.push(c);
        }
    }
    parts
}

fn join_parts(parts: &[Vec<char>]) -> Vec<char> {
    let mut joined = Vec::new();
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            joined.push('|');
        }
        joined.extend_from_slice(part);
    }
    joined
}

/// Valor de un parámetro de plantilla: lo que sigue al primer `=` de nivel
/// superior, o el parámetro completo si es posicional.
fn param_value(param: &[char]) -> Vec<char> {
    let mut depth = 0i32;
    for (index, &c) in param.iter().enumerate() {
        match c {
            '{' | '[' => depth += 1,
            '}' | ']' => depth -= 1,
            '=' if depth <= 0 => return param[index + 1..].to_vec(),
            _ => {}
        }
    }
    param.to_vec()
}

fn is_external_target(inner: &[char]) -> bool {
    let lowered: String = inner.iter().take(8).collect::<String>().to_ascii_lowercase();
    URL_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) || lowered.starts_with("//")
}

/// Longitud de una URL suelta que empieza en `at`, o 0 si no hay URL.
fn bare_url_len(chars: &[char], at: usize) -> usize {
    if !URL_SCHEMES.iter().any(|scheme| {
        starts_with_nocase(chars, at, scheme)
    }) {
        return 0;
    }
    let mut len = 0;
    while at + len < chars.len() {
        let c = chars[at + len];
        if c.is_whitespace() || matches!(c, '[' | ']' | '<' | '>' | '{' | '}' | '|' | '"') {
            break;
        }
        len += 1;
    }
    len
}

fn starts_with_nocase(chars: &[char], at: usize, needle: &str) -> bool {
    let needle: Vec<char> = needle.chars().collect();
    chars.len() - at >= needle.len()
        && chars[at..at + needle.len()].iter()
                                       .zip(needle.iter())
                                       .all(|(a, b)| a.to_ascii_lowercase() == *b)
}

/// Encabezado `=+ texto =+` que ocupa la línea completa a partir de `at`.
/// Devuelve el texto interior y la posición del fin de línea.
fn heading_inner(chars: &[char], at: usize) -> Option<(Vec<char>, usize)> {
    let line_end = (at..chars.len()).find(|&i| chars[i] == '\n').unwrap_or(chars.len());
    let mut line = &chars[at..line_end];
    while let Some((' ' | '\t', rest)) = line.split_last().map(|(last, rest)| (*last, rest)) {
        line = rest;
    }
    let leading = line.iter().take_while(|&&c| c == '=').count();
    let trailing = line.iter().rev().take_while(|&&c| c == '=').count();
    if leading == 0 || trailing == 0 || leading > 6 || leading + trailing >= line.len() {
        return None;
    }
    Some((line[leading..line.len() - trailing].to_vec(), line_end))
}

/// Destinos de los enlaces internos presentes en un texto, en orden de
/// aparición. Se usa sobre resúmenes de edición; los destinos vacíos o con
/// caracteres ilegales en títulos se descartan.
pub fn wikilink_targets(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut targets = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if starts_with(&chars, i, "[[") {
            if let Some(end) = find_balanced(&chars, i, "[[", "]]") {
                let inner = &chars[i + 2..end];
                let parts = split_top_level(inner, '|');
                let target: String = parts[0].iter().collect();
                // el fragmento no identifica página
                let target = target.split('#').next().unwrap_or("").trim();
                let target = target.strip_prefix(':').unwrap_or(target).trim();
                if !target.is_empty() && !target.contains(['<', '>', '{', '}', '[', ']']) {
                    targets.push(target.to_string());
                }
                i = end + 2;
                continue;
            }
        }
        i += 1;
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_keep_parameter_values() {
        assert_eq!(strip_markup("{{Infobox|name=Carol|year=1847}}"), "Carol 1847");
        assert_eq!(strip_markup("{{lang|de|Kommet, ihr Hirten}}"), "de Kommet, ihr Hirten");
        assert_eq!(strip_markup("{{reflist}}"), "");
    }

    #[test]
    fn nested_templates() {
        assert_eq!(strip_markup("{{outer|{{inner|deep}}}}"), "deep");
    }

    #[test]
    fn wikilinks_render_label_or_target() {
        assert_eq!(strip_markup("[[Christmas carol]]"), "Christmas carol");
        assert_eq!(strip_markup("[[Christmas carol|a carol]]"), "a carol");
    }

    #[test]
    fn external_links_render_title_only() {
        assert_eq!(strip_markup("[https://example.org Example site]"), "Example site");
        assert_eq!(strip_markup("[https://example.org]"), "");
        assert_eq!(strip_markup("see https://example.org/page now"), "see  now");
    }

    #[test]
    fn non_link_brackets_are_literal() {
        assert_eq!(strip_markup("[sic]"), "[sic]");
    }

    #[test]
    fn headings_lose_their_markers() {
        assert_eq!(strip_markup("== History ==\ntext"), "History\ntext");
        assert_eq!(strip_markup("a == b == c"), "a == b == c");
    }

    #[test]
    fn tags_and_comments() {
        assert_eq!(strip_markup("a <b>bold</b> word"), "a bold word");
        assert_eq!(strip_markup("before<!-- hidden -->after"), "beforeafter");
    }

    #[test]
    fn unclosed_markup_stays_literal() {
        assert_eq!(strip_markup("{{unclosed"), "{{unclosed");
        assert_eq!(strip_markup("[[unclosed"), "[[unclosed");
    }

    #[test]
    fn strip_is_idempotent() {
        let samples = ["{{Infobox|name=Carol}} [[a|b]] [https://x.org t] == H ==\nplain",
                       "[sic] {{unclosed and https://u.example/x",
                       "text <ref>kept contents</ref> more"];
        for sample in samples {
            let once = strip_markup(sample);
            assert_eq!(strip_markup(&once), once, "no idempotente para {sample:?}");
        }
    }

    #[test]
    fn comment_link_targets() {
        let targets = wikilink_targets("copied from [[Example]] and [[:Other page#frag|label]], not [[]]");
        assert_eq!(targets, vec!["Example".to_string(), "Other page".to_string()]);
    }
}

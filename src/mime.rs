//! Content-type → file extension resolution.
//!
//! The system MIME database lists extensions alphabetically, so a plain
//! lookup maps `text/plain` to `.asc` or similar. The override table pins
//! the types a site actually serves; everything else falls through to
//! [`mime_guess`], and an unknown type is written as `.html`.

/// Extensions for the content types sites serve most, checked first.
const COMMON_MIME_MAPS: &[(&str, &str)] = &[
    ("text/plain", ".txt"),
    ("text/html", ".html"),
    ("text/javascript", ".js"),
    ("application/javascript", ".js"),
    ("text/json", ".json"),
    ("application/json", ".json"),
    ("text/css", ".css"),
];

const DEFAULT_EXTENSION: &str = ".html";

/// Drop `; charset=...` and similar parameters from a content-type.
pub fn strip_params(content_type: &str) -> &str {
    content_type
        .split_once(';')
        .map_or(content_type, |(essence, _)| essence)
        .trim()
}

/// Resolve the file extension (with leading dot) for a content-type.
pub fn resolve_extension(content_type: &str) -> String {
    let essence = strip_params(content_type).to_ascii_lowercase();

    if let Some((_, ext)) = COMMON_MIME_MAPS.iter().find(|(mime, _)| *mime == essence) {
        return (*ext).to_string();
    }

    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_params_removes_charset() {
        assert_eq!(strip_params("text/html; charset=utf-8"), "text/html");
        assert_eq!(strip_params("text/css"), "text/css");
        assert_eq!(strip_params(""), "");
    }

    #[test]
    fn override_table_wins() {
        assert_eq!(resolve_extension("text/plain"), ".txt");
        assert_eq!(resolve_extension("text/html"), ".html");
        assert_eq!(resolve_extension("text/javascript"), ".js");
        assert_eq!(resolve_extension("application/javascript"), ".js");
        assert_eq!(resolve_extension("text/json"), ".json");
        assert_eq!(resolve_extension("application/json"), ".json");
        assert_eq!(resolve_extension("text/css"), ".css");
    }

    #[test]
    fn parameters_ignored() {
        assert_eq!(
            resolve_extension("application/json; charset=utf-8"),
            ".json"
        );
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(resolve_extension("Text/CSS"), ".css");
    }

    #[test]
    fn falls_back_to_system_database() {
        assert_eq!(resolve_extension("image/png"), ".png");
    }

    #[test]
    fn unknown_type_defaults_to_html() {
        assert_eq!(resolve_extension("application/x-sitepress-unknown"), ".html");
        assert_eq!(resolve_extension(""), ".html");
    }
}

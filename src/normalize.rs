use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Turns a human-readable resource name into a stable, filesystem-safe folder name.
///
/// Accents are stripped (NFD decomposition with combining marks dropped), the result is
/// lower-cased, `" - "` collapses to a single separator, spaces become underscores and a
/// single trailing underscore is removed.
pub fn normalize(name: &str) -> String {
    let stripped: String = name.nfd().filter(|ch| !is_combining_mark(*ch)).collect();
    let mut normalized = stripped
        .to_lowercase()
        .replace(" - ", " ")
        .replace(' ', "_");
    if normalized.ends_with('_') {
        normalized.pop();
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_dash_separator() {
        assert_eq!(normalize("Despesas - Gerais 2024"), "despesas_gerais_2024");
    }

    #[test]
    fn strips_accents() {
        assert_eq!(normalize("Execução Orçamentária"), "execucao_orcamentaria");
    }

    #[test]
    fn drops_single_trailing_underscore() {
        assert_eq!(normalize("Despesa "), "despesa");
        assert_eq!(normalize("Despesa__"), "despesa_");
    }

    #[test]
    fn empty_input_is_total() {
        assert_eq!(normalize(""), "");
    }
}

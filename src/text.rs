// Text Normalizer
// Turns the raw character stream a PDF extractor hands back into an ordered
// sequence of clean lines the statement parsers can scan.

/// Collapse line-ending variants, trim every line and drop the empty ones.
///
/// Lines are never reordered or deduplicated: the statement parsers depend
/// on the original top-to-bottom order. Empty input yields an empty vec.
pub fn normalize_lines(raw: &str) -> Vec<String> {
    raw.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_line_ending_variants() {
        let raw = "uno\r\ndos\rtres\ncuatro";
        let lines = normalize_lines(raw);
        assert_eq!(lines, vec!["uno", "dos", "tres", "cuatro"]);
    }

    #[test]
    fn test_trims_and_drops_blank_lines() {
        let raw = "  02.01.26  \n\n   \n COTO SUPER \n";
        let lines = normalize_lines(raw);
        assert_eq!(lines, vec!["02.01.26", "COTO SUPER"]);
    }

    #[test]
    fn test_preserves_order() {
        let raw = "b\na\nc";
        assert_eq!(normalize_lines(raw), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize_lines("").is_empty());
        assert!(normalize_lines("\n\r\n  \n").is_empty());
    }
}

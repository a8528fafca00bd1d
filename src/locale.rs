// Locale decoders for Argentine statement formats:
// thousands-dot / decimal-comma amounts ("28.600,00") and partial dates
// derived from month abbreviations.

/// Month abbreviations as they appear in Banco Macro statement lines.
/// Scanned in this order; first hit wins.
pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sep", "oct", "nov", "dic",
];

/// Sentinel used when no date can be derived for a record.
pub const NO_DATE: &str = "Sin fecha";

/// Decode an amount token in thousands-dot / decimal-comma notation.
///
/// "28.600,00" -> 28600.00, "10,00" -> 10.00. Returns `None` on malformed
/// input; callers discard the candidate record instead of storing it.
pub fn decode_amount(token: &str) -> Option<f64> {
    let cleaned = token
        .trim()
        .replace('.', "") // thousands separators
        .replace(',', "."); // decimal comma -> decimal point
    cleaned.parse::<f64>().ok()
}

/// Look for a 3-letter month abbreviation anywhere in the text and derive a
/// partial date label ("Mes: Mar"). Falls back to the no-date sentinel.
pub fn derive_month_label(text: &str) -> String {
    let lower = text.to_lowercase();
    for abbr in MONTH_ABBREVIATIONS {
        if lower.contains(abbr) {
            let mut label = abbr.to_string();
            // capitalize for display: "mar" -> "Mar"
            if let Some(first) = label.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            return format!("Mes: {}", label);
        }
    }
    NO_DATE.to_string()
}

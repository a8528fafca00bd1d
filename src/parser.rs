// 🏗️ Statement Parsers
// Two line-scanning state machines for the two Macro statement layouts:
// date-anchored multi-line (Visa) and amount-anchored (cuenta corriente).

use regex::Regex;

use crate::categorize::Categorizer;
use crate::db::ExpenseRecord;
use crate::locale::{decode_amount, derive_month_label};

/// How many lines after a date anchor may hold the matching amount.
const LOOKAHEAD_WINDOW: usize = 5;

/// Descriptions in the amount-anchored layout are cut to this many chars.
const MAX_DESCRIPTION_CHARS: usize = 45;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Issuer - where a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issuer {
    VisaMacro,
    BancoMacro,
    Csv,
    Manual,
}

impl Issuer {
    /// Source tag stored on every record
    pub fn name(&self) -> &'static str {
        match self {
            Issuer::VisaMacro => "Visa Macro",
            Issuer::BancoMacro => "Banco Macro",
            Issuer::Csv => "CSV",
            Issuer::Manual => "Efectivo",
        }
    }
}

/// StatementParser - one per statement layout
///
/// Parsers work on the normalized line sequence and classify through the
/// caller's rule snapshot. They never fail: lines that do not fit the layout
/// simply produce no records.
pub trait StatementParser: Send + Sync {
    /// Check whether the line sequence looks like this layout
    fn detect(&self, lines: &[String]) -> bool;

    /// Scan the lines into expense records
    fn parse_lines(&self, lines: &[String], categorizer: &Categorizer) -> Vec<ExpenseRecord>;

    /// Which issuer this layout belongs to
    fn issuer(&self) -> Issuer;
}

/// All layout parsers, in detection priority order. The date-anchored layout
/// is the stricter pattern, so it is tried first.
pub fn get_parsers() -> Vec<Box<dyn StatementParser>> {
    vec![
        Box::new(VisaMacroParser::new()),
        Box::new(BancoMacroParser::new()),
    ]
}

/// JS-style numeric check: bare codes like "454507" are not description text.
fn is_numeric_line(line: &str) -> bool {
    line.trim().parse::<f64>().is_ok()
}

// ============================================================================
// DATE-ANCHORED MULTI-LINE PARSER (Visa Macro)
// ============================================================================

/// Each transaction starts on a line holding only a dd.mm.yy date; the
/// amount shows up on one of the next five lines in 1.000,00 notation, with
/// the description spread over the lines in between.
pub struct VisaMacroParser {
    date_re: Regex,
    amount_re: Regex,
}

impl VisaMacroParser {
    pub fn new() -> Self {
        VisaMacroParser {
            // Strict: the whole line is the date (e.g. "02.01.26")
            date_re: Regex::new(r"^\d{2}\.\d{2}\.\d{2}$").expect("valid date regex"),
            // Thousands-dot groups, mandatory two decimals (e.g. "28.600,00")
            amount_re: Regex::new(r"[0-9]{1,3}(?:\.[0-9]{3})*,[0-9]{2}")
                .expect("valid amount regex"),
        }
    }
}

impl Default for VisaMacroParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for VisaMacroParser {
    fn detect(&self, lines: &[String]) -> bool {
        lines.iter().any(|l| self.date_re.is_match(l))
    }

    fn parse_lines(&self, lines: &[String], categorizer: &Categorizer) -> Vec<ExpenseRecord> {
        let mut records = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            if !self.date_re.is_match(&lines[i]) {
                i += 1;
                continue;
            }

            let date = lines[i].clone();
            let mut description = String::new();
            let mut amount = None;
            let mut skip = 0;

            // Look ahead up to 5 lines for the amount; everything before it
            // that is neither a date nor a bare number is description text.
            for j in 1..=LOOKAHEAD_WINDOW {
                let Some(line) = lines.get(i + j) else {
                    break; // window ran past the end of the statement
                };

                if let Some(m) = self.amount_re.find(line) {
                    amount = decode_amount(m.as_str());
                    skip = j;
                    break; // first amount wins
                }

                if !self.date_re.is_match(line) && !is_numeric_line(line) {
                    description.push_str(line);
                    description.push(' ');
                }
            }

            match amount {
                Some(monto) if monto > 0.0 => {
                    let description = description.trim().to_string();
                    let description = if description.is_empty() {
                        "Consumo Visa".to_string()
                    } else {
                        description
                    };
                    let category = categorizer.classify(&description);

                    records.push(ExpenseRecord {
                        id: 0,
                        date,
                        description,
                        amount: monto,
                        category,
                        source: self.issuer().name().to_string(),
                    });

                    // Jump past the consumed lines so they are not re-read
                    i += skip + 1;
                }
                _ => {
                    // No usable amount in the window: the date line is simply
                    // never revisited as a new scan start.
                    i += 1;
                }
            }
        }

        records
    }

    fn issuer(&self) -> Issuer {
        Issuer::VisaMacro
    }
}

// ============================================================================
// AMOUNT-ANCHORED PARSER (Banco Macro)
// ============================================================================

/// No per-transaction date anchor in this layout. Every line with an
/// amount-like token is a candidate; the preceding line usually carries the
/// rest of the description. Balance/minimum-payment lines are noise.
pub struct BancoMacroParser {
    amount_re: Regex,
}

impl BancoMacroParser {
    pub fn new() -> Self {
        BancoMacroParser {
            // Digits, comma, two decimals; no grouping requirement
            amount_re: Regex::new(r"\d+,\d{2}").expect("valid amount regex"),
        }
    }
}

impl Default for BancoMacroParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for BancoMacroParser {
    fn detect(&self, lines: &[String]) -> bool {
        lines.iter().any(|l| self.amount_re.is_match(l))
    }

    fn parse_lines(&self, lines: &[String], categorizer: &Categorizer) -> Vec<ExpenseRecord> {
        let mut records = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let lower = line.to_lowercase();
            if lower.contains("saldo") || lower.contains("minimo") {
                continue; // non-transactional noise
            }

            let Some(m) = self.amount_re.find(line) else {
                continue;
            };
            let Some(amount) = decode_amount(m.as_str()) else {
                continue;
            };
            if amount <= 0.0 {
                continue;
            }

            // Previous line's full text + current line minus the amount token
            let mut candidate = String::new();
            if i > 0 {
                candidate.push_str(&lines[i - 1]);
                candidate.push(' ');
            }
            candidate.push_str(&line[..m.start()]);
            candidate.push_str(&line[m.end()..]);
            let candidate = candidate.trim().to_string();

            if candidate.chars().count() <= 3 {
                continue;
            }
            if candidate.to_lowercase().contains("su pago") {
                continue; // payment-due boilerplate
            }

            let date = derive_month_label(&candidate);
            let description: String = candidate.chars().take(MAX_DESCRIPTION_CHARS).collect();
            let category = categorizer.classify(&description);

            records.push(ExpenseRecord {
                id: 0,
                date,
                description,
                amount,
                category,
                source: self.issuer().name().to_string(),
            });
        }

        records
    }

    fn issuer(&self) -> Issuer {
        Issuer::BancoMacro
    }
}

// ============================================================================
// TESTS
// ============================================================================

// 🏷️ Categorization Engine - Rules as Data
// Two tiers: user-taught keyword rules first, static vendor heuristics second.
// First match wins in both tiers; iteration order is part of the contract.

use anyhow::{bail, Result};
use rusqlite::Connection;

use crate::db::{self, CategoryRule};

/// Fallback category when nothing matches.
pub const VARIOS: &str = "Varios";

// ============================================================================
// STATIC HEURISTIC GROUPS
// ============================================================================

/// Known-vendor substrings per category, evaluated after user rules, in this
/// exact order. Each group's keywords are scanned in listing order.
const HEURISTIC_GROUPS: &[(&str, &[&str])] = &[
    (
        "Supermercado",
        &["super", "coto", "carrefour", "dia", "jumbo", "vea"],
    ),
    (
        "Transporte",
        &["uber", "cabify", "shell", "ypf", "axion", "puma"],
    ),
    (
        "Suscripciones",
        &["netflix", "spotify", "steam", "hbo", "disney", "apple", "prime"],
    ),
    (
        "Comida",
        &["mcdonalds", "burger", "rappi", "pedidosya", "starbucks", "mostaza"],
    ),
    (
        "Salud",
        &["farmacia", "hospital", "osde", "swiss", "galeno"],
    ),
    (
        "MercadoPago/Compras",
        &["merpago", "mercado pago", "meli"],
    ),
    (
        "Impuestos",
        &["impuesto", "sellos", "iva", "perc"],
    ),
];

// ============================================================================
// CATEGORIZER
// ============================================================================

/// Holds an explicitly owned snapshot of the persisted rule set.
///
/// Each upload/teach builds or reloads its own snapshot; there is no global
/// cache. A teach running concurrently with an upload may or may not be
/// reflected in that upload's classifications (last snapshot wins).
pub struct Categorizer {
    rules: Vec<CategoryRule>,
}

impl Categorizer {
    /// Engine with no user rules; only the static heuristics apply.
    pub fn new() -> Self {
        Categorizer { rules: Vec::new() }
    }

    /// Build an engine from an injected rule list (tests, reload).
    pub fn from_rules(rules: Vec<CategoryRule>) -> Self {
        Categorizer { rules }
    }

    /// Snapshot of the persisted rule table, in insertion order.
    pub fn load(conn: &Connection) -> Result<Self> {
        Ok(Categorizer {
            rules: db::get_all_rules(conn)?,
        })
    }

    /// Full reload from persisted state, replacing the current snapshot.
    pub fn reload(&mut self, conn: &Connection) -> Result<()> {
        self.rules = db::get_all_rules(conn)?;
        Ok(())
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Map a free-text description to a category label.
    ///
    /// User rules are scanned first in insertion order, then the static
    /// heuristic groups. Substring match, first hit wins, no longest-match.
    pub fn classify(&self, text: &str) -> String {
        if text.is_empty() {
            return VARIOS.to_string();
        }

        let t = text.to_lowercase();

        for rule in &self.rules {
            if t.contains(&rule.keyword) {
                return rule.category.clone();
            }
        }

        for (category, keywords) in HEURISTIC_GROUPS {
            if keywords.iter().any(|k| t.contains(k)) {
                return (*category).to_string();
            }
        }

        VARIOS.to_string()
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TEACH + RETROACTIVE CORRECTION
// ============================================================================

/// Outcome of a teach operation. The correction pass is best-effort: rows
/// that fail to save are reported here, not rolled back.
#[derive(Debug)]
pub struct TeachReport {
    /// Normalized keyword the rule was stored under.
    pub keyword: String,
    /// Historical records whose category was overwritten.
    pub corrected: usize,
    /// (record id, error) for rows the correction pass could not save.
    pub failures: Vec<(i64, String)>,
}

impl Categorizer {
    /// Teach a keyword -> category rule and re-label matching history.
    ///
    /// Upserts the rule, reloads this snapshot in full, then scans every
    /// stored record: where the lower-cased description contains the keyword
    /// and the category differs, the category is overwritten. A failed row
    /// does not halt the pass; the rule upsert and the corrections are not
    /// atomic as a unit.
    pub fn teach(&mut self, conn: &Connection, keyword: &str, category: &str) -> Result<TeachReport> {
        let keyword = keyword.trim().to_lowercase();
        let category = category.trim();

        if keyword.is_empty() || category.is_empty() {
            bail!("palabra y categoria son obligatorias");
        }

        db::upsert_rule(conn, &keyword, category)?;

        // Subsequent classify calls on this engine see the new rule without
        // a process restart
        self.reload(conn)?;

        let mut corrected = 0;
        let mut failures = Vec::new();

        for record in db::get_all_records(conn)? {
            if record.description.to_lowercase().contains(&keyword) && record.category != category {
                match db::update_record_category(conn, record.id, category) {
                    Ok(()) => corrected += 1,
                    Err(e) => failures.push((record.id, e.to_string())),
                }
            }
        }

        Ok(TeachReport {
            keyword,
            corrected,
            failures,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_record, get_all_records, setup_database, ExpenseRecord};

    fn rule(keyword: &str, category: &str) -> CategoryRule {
        CategoryRule {
            id: 0,
            keyword: keyword.to_string(),
            category: category.to_string(),
        }
    }

    fn stored(conn: &Connection, description: &str, category: &str) -> i64 {
        create_record(
            conn,
            &ExpenseRecord {
                id: 0,
                date: "02.01.26".to_string(),
                description: description.to_string(),
                amount: 100.0,
                category: category.to_string(),
                source: "Visa Macro".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_empty_text_is_varios() {
        let engine = Categorizer::new();
        assert_eq!(engine.classify(""), "Varios");
    }

    #[test]
    fn test_heuristic_groups() {
        let engine = Categorizer::new();
        assert_eq!(engine.classify("COTO SUPER"), "Supermercado");
        assert_eq!(engine.classify("YPF COMBUSTIBLE"), "Transporte");
        assert_eq!(engine.classify("NETFLIX.COM"), "Suscripciones");
        assert_eq!(engine.classify("RAPPI PEDIDO"), "Comida");
        assert_eq!(engine.classify("FARMACIA CENTRAL"), "Salud");
        assert_eq!(engine.classify("MERPAGO*VENTA"), "MercadoPago/Compras");
        assert_eq!(engine.classify("PERC IIBB"), "Impuestos");
    }

    #[test]
    fn test_no_match_is_varios() {
        let engine = Categorizer::new();
        assert_eq!(engine.classify("ZZZ DESCONOCIDO"), "Varios");
    }

    #[test]
    fn test_user_rules_override_heuristics() {
        // "coto" would hit the Supermercado heuristic; the taught rule wins
        let engine = Categorizer::from_rules(vec![rule("coto", "Mayorista")]);
        assert_eq!(engine.classify("COTO SUCURSAL 12"), "Mayorista");
    }

    #[test]
    fn test_first_rule_wins_on_overlap() {
        let engine = Categorizer::from_rules(vec![
            rule("uber eats", "Comida"),
            rule("uber", "Transporte"),
        ]);
        // Both keywords are substrings; load order decides
        assert_eq!(engine.classify("UBER EATS BA"), "Comida");
    }

    #[test]
    fn test_classify_is_deterministic_for_fixed_snapshot() {
        let engine = Categorizer::from_rules(vec![rule("club", "Deporte")]);
        let a = engine.classify("CLUB ATLETICO");
        let b = engine.classify("CLUB ATLETICO");
        assert_eq!(a, b);
        assert_eq!(a, "Deporte");
    }

    #[test]
    fn test_group_priority_order() {
        // "dia" (Supermercado) and "uber" (Transporte) both present;
        // Supermercado is evaluated first
        let engine = Categorizer::new();
        assert_eq!(engine.classify("dia uber"), "Supermercado");
    }

    #[test]
    fn test_teach_validation() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let mut engine = Categorizer::new();
        assert!(engine.teach(&conn, "  ", "Salud").is_err());
        assert!(engine.teach(&conn, "farmacia", "").is_err());
        // Nothing persisted on validation failure
        assert_eq!(db::get_all_rules(&conn).unwrap().len(), 0);
    }

    #[test]
    fn test_teach_normalizes_keyword() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let mut engine = Categorizer::new();
        let report = engine.teach(&conn, "  GIMNASIO ", "Salud").unwrap();
        assert_eq!(report.keyword, "gimnasio");

        let rules = db::get_all_rules(&conn).unwrap();
        assert_eq!(rules[0].keyword, "gimnasio");
    }

    #[test]
    fn test_reteach_changes_future_classifications() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        // The same engine sees each new rule without a reload by the caller
        let mut engine = Categorizer::load(&conn).unwrap();
        assert_eq!(engine.rule_count(), 0);

        engine.teach(&conn, "club", "Deporte").unwrap();
        assert_eq!(engine.classify("CLUB ATLETICO"), "Deporte");

        // Re-teaching the same keyword overwrites, it does not duplicate
        engine.teach(&conn, "club", "Ocio").unwrap();
        assert_eq!(engine.rule_count(), 1);
        assert_eq!(engine.classify("CLUB ATLETICO"), "Ocio");
    }

    #[test]
    fn test_teach_retroactively_corrects_history() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let a = stored(&conn, "GIMNASIO MEGATLON", "Varios");
        let b = stored(&conn, "GIMNASIO BARRIO", "Salud"); // already right
        let c = stored(&conn, "COTO SUPER", "Supermercado"); // unrelated

        let report = Categorizer::new().teach(&conn, "gimnasio", "Salud").unwrap();
        assert_eq!(report.corrected, 1);
        assert!(report.failures.is_empty());

        let by_id = |id: i64| {
            get_all_records(&conn)
                .unwrap()
                .into_iter()
                .find(|r| r.id == id)
                .unwrap()
        };
        assert_eq!(by_id(a).category, "Salud");
        assert_eq!(by_id(b).category, "Salud");
        assert_eq!(by_id(c).category, "Supermercado");
    }
}

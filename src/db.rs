use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

// ============================================================================
// DATA MODEL
// ============================================================================

/// Default category when no classification rule matches a description.
pub const SIN_CATEGORIA: &str = "Sin categoria";

/// One detected or manually entered expense.
///
/// Dates are statement-native strings ("02.01.26", "Mes: Mar", "Sin fecha");
/// no canonical date type is enforced. Field names on the wire stay in the
/// original Spanish so the existing frontend keeps working.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseRecord {
    #[serde(default)]
    pub id: i64,

    #[serde(rename = "fecha")]
    pub date: String,

    #[serde(rename = "descripcion")]
    pub description: String,

    #[serde(rename = "monto")]
    pub amount: f64,

    #[serde(rename = "categoria")]
    pub category: String,

    #[serde(rename = "tarjeta")]
    pub source: String,
}

/// A user-taught keyword -> category mapping. Keywords are stored
/// lower-cased and trimmed, unique across all rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    #[serde(default)]
    pub id: i64,

    #[serde(rename = "palabra")]
    pub keyword: String,

    #[serde(rename = "categoria")]
    pub category: String,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS gastos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fecha TEXT NOT NULL,
            descripcion TEXT NOT NULL,
            monto REAL NOT NULL,
            categoria TEXT NOT NULL DEFAULT 'Sin categoria',
            tarjeta TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reglas (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            palabra TEXT UNIQUE NOT NULL,
            categoria TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_gastos_categoria ON gastos(categoria)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reglas_palabra ON reglas(palabra)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// EXPENSE RECORDS
// ============================================================================

/// Bulk insert a batch of extracted records. The batch goes in atomically:
/// all rows or none.
pub fn insert_records(conn: &Connection, records: &[ExpenseRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;

    for record in records {
        tx.execute(
            "INSERT INTO gastos (fecha, descripcion, monto, categoria, tarjeta)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.date,
                record.description,
                record.amount,
                record.category,
                record.source,
            ],
        )
        .context("Failed to insert expense record")?;
    }

    tx.commit()?;
    Ok(records.len())
}

/// Insert a single record (manual entry path).
pub fn create_record(conn: &Connection, record: &ExpenseRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO gastos (fecha, descripcion, monto, categoria, tarjeta)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.date,
            record.description,
            record.amount,
            record.category,
            record.source,
        ],
    )
    .context("Failed to insert expense record")?;

    Ok(conn.last_insert_rowid())
}

/// All stored records, newest first by insertion id.
pub fn get_all_records(conn: &Connection) -> Result<Vec<ExpenseRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, fecha, descripcion, monto, categoria, tarjeta
         FROM gastos
         ORDER BY id DESC",
    )?;

    let records = stmt
        .query_map([], |row| {
            Ok(ExpenseRecord {
                id: row.get(0)?,
                date: row.get(1)?,
                description: row.get(2)?,
                amount: row.get(3)?,
                category: row.get(4)?,
                source: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Overwrite one record's category. Used by the retroactive correction pass.
pub fn update_record_category(conn: &Connection, id: i64, category: &str) -> Result<()> {
    conn.execute(
        "UPDATE gastos SET categoria = ?1 WHERE id = ?2",
        params![category, id],
    )
    .context("Failed to update record category")?;

    Ok(())
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM gastos", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// CATEGORY RULES
// ============================================================================

pub fn find_rule_by_keyword(conn: &Connection, keyword: &str) -> Result<Option<CategoryRule>> {
    let rule = conn
        .query_row(
            "SELECT id, palabra, categoria FROM reglas WHERE palabra = ?1",
            params![keyword],
            |row| {
                Ok(CategoryRule {
                    id: row.get(0)?,
                    keyword: row.get(1)?,
                    category: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(rule)
}

pub fn create_rule(conn: &Connection, keyword: &str, category: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO reglas (palabra, categoria) VALUES (?1, ?2)",
        params![keyword, category],
    )
    .context("Failed to insert rule")?;

    Ok(())
}

pub fn update_rule(conn: &Connection, keyword: &str, category: &str) -> Result<()> {
    conn.execute(
        "UPDATE reglas SET categoria = ?1 WHERE palabra = ?2",
        params![category, keyword],
    )
    .context("Failed to update rule")?;

    Ok(())
}

/// Upsert a rule: re-teaching an existing keyword overwrites its category
/// instead of duplicating. Keyword uniqueness is enforced by the schema.
pub fn upsert_rule(conn: &Connection, keyword: &str, category: &str) -> Result<()> {
    if find_rule_by_keyword(conn, keyword)?.is_some() {
        update_rule(conn, keyword, category)
    } else {
        create_rule(conn, keyword, category)
    }
}

/// All rules in insertion order; this order is the classification priority.
pub fn get_all_rules(conn: &Connection) -> Result<Vec<CategoryRule>> {
    let mut stmt = conn.prepare("SELECT id, palabra, categoria FROM reglas ORDER BY id ASC")?;

    let rules = stmt
        .query_map([], |row| {
            Ok(CategoryRule {
                id: row.get(0)?,
                keyword: row.get(1)?,
                category: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rules)
}

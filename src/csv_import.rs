// CSV Column Normalizer
// Banks export CSVs with loosely-named headers (or none worth trusting);
// rows are mapped onto the canonical record shape by header candidates
// first, position second.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;

use crate::categorize::Categorizer;
use crate::db::ExpenseRecord;
use crate::locale::NO_DATE;
use crate::parser::Issuer;

/// Resolve a field by header name, skipping empty values.
fn field<'a>(headers: &StringRecord, record: &'a StringRecord, name: &str) -> Option<&'a str> {
    let idx = headers.iter().position(|h| h == name)?;
    record.get(idx).map(str::trim).filter(|v| !v.is_empty())
}

/// Positional fallback, also skipping empty values.
fn positional<'a>(record: &'a StringRecord, idx: usize) -> Option<&'a str> {
    record.get(idx).map(str::trim).filter(|v| !v.is_empty())
}

/// Map one CSV row onto the canonical record shape.
///
/// Description comes from "Descripcion"/"Concepto" or the second column;
/// the amount string from "Importe"/"Monto" or the third column. Rows whose
/// amount does not decode, or decodes to exactly zero, are dropped. Amounts
/// are normalized to their absolute value (card exports sign expenses).
pub fn normalize_row(
    headers: &StringRecord,
    record: &StringRecord,
    categorizer: &Categorizer,
) -> Option<ExpenseRecord> {
    let description = field(headers, record, "Descripcion")
        .or_else(|| field(headers, record, "Concepto"))
        .or_else(|| positional(record, 1))
        .unwrap_or("Gasto")
        .to_string();

    let amount_str = field(headers, record, "Importe")
        .or_else(|| field(headers, record, "Monto"))
        .or_else(|| positional(record, 2))
        .unwrap_or("0");

    let cleaned = amount_str
        .replace('$', "")
        .replace('.', "")
        .replace(',', ".")
        .trim()
        .to_string();

    let amount: f64 = cleaned.parse().ok()?;
    if amount == 0.0 {
        return None;
    }

    let date = field(headers, record, "Fecha")
        .or_else(|| positional(record, 0))
        .unwrap_or(NO_DATE)
        .to_string();

    let category = categorizer.classify(&description);

    Some(ExpenseRecord {
        id: 0,
        date,
        description,
        amount: amount.abs(),
        category,
        source: Issuer::Csv.name().to_string(),
    })
}

/// Stream CSV rows into a batch of validated records.
///
/// Rows are consumed incrementally and accumulated in memory; callers
/// persist the batch in bulk once the stream is exhausted. A row that fails
/// to decode is dropped, it does not abort the batch.
pub fn parse_csv<R: Read>(reader: R, categorizer: &Categorizer) -> Result<Vec<ExpenseRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                eprintln!("⚠️ Fila CSV ilegible, se omite: {}", e);
                continue;
            }
        };

        if let Some(record) = normalize_row(&headers, &row, categorizer) {
            records.push(record);
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(csv_text: &str) -> Vec<ExpenseRecord> {
        parse_csv(csv_text.as_bytes(), &Categorizer::new()).unwrap()
    }

    #[test]
    fn test_named_columns() {
        let records = parse("Fecha,Descripcion,Importe\n02/01/2026,YPF COMBUSTIBLE,\"$1.500,50\"\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, "YPF COMBUSTIBLE");
        assert_eq!(records[0].amount, 1500.50);
        assert_eq!(records[0].category, "Transporte");
        assert_eq!(records[0].date, "02/01/2026");
        assert_eq!(records[0].source, "CSV");
    }

    #[test]
    fn test_concepto_and_monto_header_variants() {
        let records = parse("Fecha,Concepto,Monto\n03/01/2026,NETFLIX.COM,\"4.500,00\"\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, "NETFLIX.COM");
        assert_eq!(records[0].amount, 4500.00);
        assert_eq!(records[0].category, "Suscripciones");
    }

    #[test]
    fn test_positional_fallback() {
        let records = parse("col_a,col_b,col_c\n05/01/2026,COTO SUPER,\"2.000,00\"\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, "05/01/2026");
        assert_eq!(records[0].description, "COTO SUPER");
        assert_eq!(records[0].amount, 2000.00);
    }

    #[test]
    fn test_zero_amount_dropped() {
        let records = parse("Fecha,Descripcion,Importe\n02/01/2026,AJUSTE,0\n");
        assert!(records.is_empty());
    }

    #[test]
    fn test_unparseable_amount_dropped() {
        let records = parse("Fecha,Descripcion,Importe\n02/01/2026,AJUSTE,no-es-numero\n");
        assert!(records.is_empty());
    }

    #[test]
    fn test_negative_amount_normalized_to_absolute() {
        let records = parse("Fecha,Descripcion,Importe\n02/01/2026,DEBITO,\"-1.200,00\"\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, 1200.00);
    }

    #[test]
    fn test_missing_description_defaults() {
        let records = parse("Fecha,Descripcion,Importe\n02/01/2026,,\"100,00\"\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, "Gasto");
        assert_eq!(records[0].category, "Varios");
    }

    #[test]
    fn test_missing_date_gets_sentinel() {
        let records = parse("Fecha,Descripcion,Importe\n,PANADERIA,\"100,00\"\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, "Sin fecha");
    }

    #[test]
    fn test_user_rule_applies_to_csv_rows() {
        let engine = Categorizer::from_rules(vec![crate::db::CategoryRule {
            id: 0,
            keyword: "panaderia".to_string(),
            category: "Comida".to_string(),
        }]);
        let records = parse_csv(
            "Fecha,Descripcion,Importe\n02/01/2026,PANADERIA LA ESPIGA,\"350,00\"\n".as_bytes(),
            &engine,
        )
        .unwrap();
        assert_eq!(records[0].category, "Comida");
    }
}

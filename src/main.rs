use anyhow::{bail, Result};
use rusqlite::Connection;
use std::env;
use std::fs::File;
use std::path::Path;

use gastos::{
    detect_kind, get_all_records, insert_records, parse_csv, parse_pdf_file, setup_database,
    verify_count, Categorizer, UploadKind,
};

fn db_path() -> String {
    env::var("GASTOS_DB").unwrap_or_else(|_| "gastos.sqlite".to_string())
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") => {
            let Some(path) = args.get(2) else {
                bail!("Uso: gastos import <archivo.pdf|archivo.csv>");
            };
            run_import(Path::new(path))
        }
        Some("list") => run_list(),
        Some("ensenar") => {
            let (Some(keyword), Some(category)) = (args.get(2), args.get(3)) else {
                bail!("Uso: gastos ensenar <palabra> <categoria>");
            };
            run_teach(keyword, category)
        }
        _ => {
            println!("Uso:");
            println!("  gastos import <archivo.pdf|archivo.csv>");
            println!("  gastos list");
            println!("  gastos ensenar <palabra> <categoria>");
            Ok(())
        }
    }
}

fn run_import(path: &Path) -> Result<()> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let Some(kind) = detect_kind(filename) else {
        bail!("Solo se aceptan .csv o .pdf");
    };

    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;

    // Fresh rule snapshot for this import
    let categorizer = Categorizer::load(&conn)?;

    let records = match kind {
        UploadKind::Pdf => parse_pdf_file(path, &categorizer),
        UploadKind::Csv => {
            let file = File::open(path)?;
            parse_csv(file, &categorizer)?
        }
    };

    if records.is_empty() {
        println!("⚠️ No encontré el patrón de gastos en {}", path.display());
        return Ok(());
    }

    insert_records(&conn, &records)?;

    println!("✅ Se detectaron {} gastos:", records.len());
    for record in &records {
        println!(
            "   {} | {} | ${:.2} | {}",
            record.date, record.description, record.amount, record.category
        );
    }

    let count = verify_count(&conn)?;
    println!("✓ La base contiene {} gastos", count);

    Ok(())
}

fn run_list() -> Result<()> {
    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;

    let records = get_all_records(&conn)?;
    println!("📊 {} gastos guardados:", records.len());
    for record in &records {
        println!(
            "   #{} {} | {} | ${:.2} | {} | {}",
            record.id, record.date, record.description, record.amount, record.category,
            record.source
        );
    }

    Ok(())
}

fn run_teach(keyword: &str, category: &str) -> Result<()> {
    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;

    let mut categorizer = Categorizer::load(&conn)?;
    let report = categorizer.teach(&conn, keyword, category)?;

    println!(
        "✅ Regla guardada: \"{}\" -> {}",
        report.keyword, category
    );
    println!("✓ {} reglas activas", categorizer.rule_count());
    println!("✓ {} gastos históricos corregidos", report.corrected);
    for (id, error) in &report.failures {
        eprintln!("⚠️ No se pudo corregir el gasto #{}: {}", id, error);
    }

    Ok(())
}

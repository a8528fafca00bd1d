// Statement ingestion: extension dispatch, PDF text extraction and layout
// auto-detection. Extraction failures degrade to an empty batch; callers
// cannot tell "zero records" from "extraction failed", by contract.

use anyhow::{Context, Result};
use std::path::Path;

use crate::categorize::Categorizer;
use crate::db::ExpenseRecord;
use crate::parser::get_parsers;
use crate::text::normalize_lines;

#[cfg(feature = "server")]
use std::path::PathBuf;
#[cfg(feature = "server")]
use std::time::Duration;

/// Deadline for the blocking PDF text extraction. Past it the result is
/// abandoned and discarded, not force-killed.
#[cfg(feature = "server")]
pub const EXTRACT_TIMEOUT: Duration = Duration::from_secs(5);

/// Supported upload formats, dispatched on the declared filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Pdf,
    Csv,
}

/// Dispatch on the original filename's extension. Anything that is not
/// `.pdf` or `.csv` is rejected at the boundary.
pub fn detect_kind(filename: &str) -> Option<UploadKind> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".pdf") {
        Some(UploadKind::Pdf)
    } else if lower.ends_with(".csv") {
        Some(UploadKind::Csv)
    } else {
        None
    }
}

/// Pull the text stream out of a PDF file.
pub fn extract_text(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path)
        .with_context(|| format!("Failed to extract text from {}", path.display()))
}

/// Run statement text through the normalizer and the first layout parser
/// that recognizes it. Unrecognized text yields zero records.
pub fn parse_statement_text(text: &str, categorizer: &Categorizer) -> Vec<ExpenseRecord> {
    let lines = normalize_lines(text);

    for parser in get_parsers() {
        if parser.detect(&lines) {
            return parser.parse_lines(&lines, categorizer);
        }
    }

    Vec::new()
}

/// Synchronous PDF pipeline (CLI path). Extraction errors are logged and
/// degrade to an empty batch.
pub fn parse_pdf_file(path: &Path, categorizer: &Categorizer) -> Vec<ExpenseRecord> {
    println!("📂 Leyendo PDF: {}", path.display());

    match extract_text(path) {
        Ok(text) => parse_statement_text(&text, categorizer),
        Err(e) => {
            eprintln!("❌ Error leyendo PDF: {:#}", e);
            Vec::new()
        }
    }
}

/// Run a blocking extraction on its own thread, racing the deadline.
///
/// Whichever settles first wins. On timeout the extraction is abandoned and
/// its late result, if any, is discarded. Panics and extraction errors
/// degrade to `None` the same way.
#[cfg(feature = "server")]
async fn extract_with_deadline<F>(extract: F, deadline: Duration) -> Option<String>
where
    F: FnOnce() -> Result<String> + Send + 'static,
{
    let extraction = tokio::task::spawn_blocking(extract);

    match tokio::time::timeout(deadline, extraction).await {
        Ok(Ok(Ok(text))) => Some(text),
        Ok(Ok(Err(e))) => {
            eprintln!("❌ Error leyendo PDF: {:#}", e);
            None
        }
        Ok(Err(join_err)) => {
            eprintln!("❌ Error leyendo PDF: {}", join_err);
            None
        }
        Err(_) => {
            eprintln!(
                "⏱️ Extracción de PDF abandonada tras {}ms",
                deadline.as_millis()
            );
            None
        }
    }
}

/// Deadline-bounded PDF pipeline (server path). A missed deadline or a
/// failed extraction yields the empty batch.
#[cfg(feature = "server")]
pub async fn parse_pdf_with_deadline(
    path: PathBuf,
    categorizer: &Categorizer,
    deadline: Duration,
) -> Vec<ExpenseRecord> {
    println!("📂 Leyendo PDF: {}", path.display());

    match extract_with_deadline(move || extract_text(&path), deadline).await {
        Some(text) => parse_statement_text(&text, categorizer),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_kind() {
        assert_eq!(detect_kind("resumen_enero.pdf"), Some(UploadKind::Pdf));
        assert_eq!(detect_kind("RESUMEN.PDF"), Some(UploadKind::Pdf));
        assert_eq!(detect_kind("movimientos.csv"), Some(UploadKind::Csv));
        assert_eq!(detect_kind("foto.png"), None);
        assert_eq!(detect_kind("sin_extension"), None);
    }

    #[test]
    fn test_dispatch_picks_date_anchored_layout() {
        let text = "02.01.26\nCOTO SUPER\n28.600,00\n";
        let records = parse_statement_text(text, &Categorizer::new());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, "Visa Macro");
    }

    #[test]
    fn test_dispatch_falls_back_to_amount_anchored_layout() {
        let text = "COMPRA DEBITO\nCOTO SUCURSAL 12 1500,50\n";
        let records = parse_statement_text(text, &Categorizer::new());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, "Banco Macro");
    }

    #[test]
    fn test_unrecognized_text_yields_zero_records() {
        let records = parse_statement_text("esto no es un resumen", &Categorizer::new());
        assert!(records.is_empty());
    }

    #[test]
    fn test_empty_text_yields_zero_records() {
        assert!(parse_statement_text("", &Categorizer::new()).is_empty());
    }

    #[test]
    fn test_unreadable_file_degrades_to_empty_batch() {
        // Plain text behind a .pdf name: extraction fails, the batch is
        // empty, no error reaches the caller
        let path = std::env::temp_dir().join(format!(
            "gastos-test-{}-no-es-pdf.pdf",
            std::process::id()
        ));
        std::fs::write(&path, "esto no es un pdf").unwrap();

        let records = parse_pdf_file(&path, &Categorizer::new());
        let _ = std::fs::remove_file(&path);

        assert!(records.is_empty());
    }

    #[cfg(feature = "server")]
    mod deadline {
        use super::super::*;

        #[tokio::test]
        async fn test_slow_extraction_abandoned_past_deadline() {
            let text = extract_with_deadline(
                || {
                    std::thread::sleep(Duration::from_millis(500));
                    Ok("02.01.26\nCOTO SUPER\n28.600,00".to_string())
                },
                Duration::from_millis(20),
            )
            .await;

            // The late result is discarded, not delivered
            assert!(text.is_none());
        }

        #[tokio::test]
        async fn test_fast_extraction_beats_deadline() {
            let text = extract_with_deadline(
                || Ok("02.01.26\nCOTO SUPER\n28.600,00".to_string()),
                Duration::from_secs(5),
            )
            .await;

            assert_eq!(text.as_deref(), Some("02.01.26\nCOTO SUPER\n28.600,00"));
        }

        #[tokio::test]
        async fn test_extraction_error_degrades_to_none() {
            let text = extract_with_deadline(
                || anyhow::bail!("archivo corrupto"),
                Duration::from_secs(5),
            )
            .await;

            assert!(text.is_none());
        }

        #[tokio::test]
        async fn test_deadline_miss_yields_empty_batch() {
            let path = std::env::temp_dir().join(format!(
                "gastos-test-{}-inexistente.pdf",
                std::process::id()
            ));

            // Missing file: the extraction itself errors; the pipeline
            // still answers with the empty batch
            let records =
                parse_pdf_with_deadline(path, &Categorizer::new(), Duration::from_secs(5)).await;
            assert!(records.is_empty());
        }
    }
}

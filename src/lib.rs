// Gastos - Core Library
// Statement-text extraction and classification pipeline, exposed for the
// CLI, the API server and tests.

pub mod categorize;
pub mod csv_import;
pub mod db;
pub mod ingest;
pub mod locale;
pub mod parser;
pub mod text;

// Re-export commonly used types
pub use categorize::{Categorizer, TeachReport, VARIOS};
pub use csv_import::{normalize_row, parse_csv};
pub use db::{
    create_record, find_rule_by_keyword, get_all_records, get_all_rules, insert_records,
    setup_database, update_record_category, upsert_rule, verify_count, CategoryRule,
    ExpenseRecord, SIN_CATEGORIA,
};
pub use ingest::{detect_kind, parse_pdf_file, parse_statement_text, UploadKind};
#[cfg(feature = "server")]
pub use ingest::{parse_pdf_with_deadline, EXTRACT_TIMEOUT};
pub use locale::{decode_amount, derive_month_label, NO_DATE};
pub use parser::{
    get_parsers, BancoMacroParser, Issuer, StatementParser, VisaMacroParser,
};
pub use text::normalize_lines;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

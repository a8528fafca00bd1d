// Gastos - Web Server
// Thin HTTP plumbing around the extraction/classification core: upload a
// statement, list stored expenses, add one by hand, teach a rule.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tower_http::cors::CorsLayer;

use gastos::{
    create_record, detect_kind, get_all_records, insert_records, parse_csv,
    parse_pdf_with_deadline, setup_database, Categorizer, ExpenseRecord, Issuer, UploadKind,
    EXTRACT_TIMEOUT, NO_DATE, SIN_CATEGORIA,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// Every response carries a human-readable message
#[derive(Serialize)]
struct Mensaje {
    mensaje: String,
}

impl Mensaje {
    fn new(text: impl Into<String>) -> Json<Self> {
        Json(Self {
            mensaje: text.into(),
        })
    }
}

/// Manual entry payload: descripcion and monto are mandatory
#[derive(Deserialize)]
struct NuevoGasto {
    fecha: Option<String>,
    descripcion: Option<String>,
    monto: Option<f64>,
    categoria: Option<String>,
}

/// Teach payload
#[derive(Deserialize)]
struct NuevaRegla {
    palabra: Option<String>,
    categoria: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Mensaje::new("OK")
}

/// POST /subir-resumen - Upload a statement file (multipart field "archivo")
async fn subir_resumen(State(state): State<AppState>, mut multipart: Multipart) -> impl IntoResponse {
    // Pull the uploaded file out of the form
    let (filename, bytes) = loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let filename = field.file_name().map(str::to_string);
                match (filename, field.bytes().await) {
                    (Some(name), Ok(bytes)) => break (name, bytes),
                    (_, Err(e)) => {
                        eprintln!("Error leyendo el archivo subido: {}", e);
                        return (StatusCode::BAD_REQUEST, Mensaje::new("Falta archivo"));
                    }
                    _ => continue, // non-file field, keep looking
                }
            }
            Ok(None) => return (StatusCode::BAD_REQUEST, Mensaje::new("Falta archivo")),
            Err(e) => {
                eprintln!("Error leyendo el formulario: {}", e);
                return (StatusCode::BAD_REQUEST, Mensaje::new("Falta archivo"));
            }
        }
    };

    let Some(kind) = detect_kind(&filename) else {
        return (
            StatusCode::BAD_REQUEST,
            Mensaje::new("Solo se aceptan .csv o .pdf"),
        );
    };

    // Spool to a temp file; deleted on every path once processing ends
    let temp_path = temp_upload_path(&filename);
    if let Err(e) = std::fs::write(&temp_path, &bytes) {
        eprintln!("Error guardando el archivo temporal: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Mensaje::new("Error interno"),
        );
    }

    // Each upload classifies against its own rule snapshot
    let categorizer = {
        let conn = state.db.lock().unwrap();
        match Categorizer::load(&conn) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error cargando reglas: {}", e);
                let _ = std::fs::remove_file(&temp_path);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Mensaje::new("Error interno"),
                );
            }
        }
    };

    let records = match kind {
        UploadKind::Pdf => {
            parse_pdf_with_deadline(temp_path.clone(), &categorizer, EXTRACT_TIMEOUT).await
        }
        UploadKind::Csv => match std::fs::File::open(&temp_path) {
            Ok(file) => parse_csv(file, &categorizer).unwrap_or_else(|e| {
                eprintln!("Error leyendo CSV: {}", e);
                Vec::new()
            }),
            Err(e) => {
                eprintln!("Error abriendo el archivo temporal: {}", e);
                Vec::new()
            }
        },
    };

    // Best-effort cleanup, success or failure
    let _ = std::fs::remove_file(&temp_path);

    // The detected count is reported even if the bulk insert fails; the
    // failure is logged server-side.
    if !records.is_empty() {
        let conn = state.db.lock().unwrap();
        if let Err(e) = insert_records(&conn, &records) {
            eprintln!("Error guardando gastos: {}", e);
        }
    }

    let mensaje = match kind {
        UploadKind::Pdf if records.is_empty() => {
            "⚠️ Leí el PDF pero no encontré el patrón de gastos.".to_string()
        }
        UploadKind::Pdf => format!(
            "✅ ¡Éxito! Se detectaron {} gastos en el PDF.",
            records.len()
        ),
        UploadKind::Csv => format!("CSV: Se encontraron {} movimientos.", records.len()),
    };

    (StatusCode::OK, Mensaje::new(mensaje))
}

/// GET /api/gastos - All stored records, newest first
async fn listar_gastos(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match get_all_records(&conn) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => {
            eprintln!("Error listando gastos: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Mensaje::new("Error interno"),
            )
                .into_response()
        }
    }
}

/// POST /api/gastos - Manual entry
async fn crear_gasto(
    State(state): State<AppState>,
    Json(payload): Json<NuevoGasto>,
) -> impl IntoResponse {
    let descripcion = payload
        .descripcion
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    let monto = payload.monto.unwrap_or(0.0);

    // Validation happens before any persistence call
    if descripcion.is_empty() || monto <= 0.0 {
        return (
            StatusCode::BAD_REQUEST,
            Mensaje::new("descripcion y monto son obligatorios"),
        );
    }

    let record = ExpenseRecord {
        id: 0,
        date: payload
            .fecha
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| NO_DATE.to_string()),
        description: descripcion.to_string(),
        amount: monto,
        category: payload
            .categoria
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| SIN_CATEGORIA.to_string()),
        source: Issuer::Manual.name().to_string(),
    };

    let conn = state.db.lock().unwrap();
    match create_record(&conn, &record) {
        Ok(_) => (StatusCode::OK, Mensaje::new("✅ Gasto registrado.")),
        Err(e) => {
            eprintln!("Error guardando gasto manual: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Mensaje::new("Error interno"),
            )
        }
    }
}

/// POST /api/ensenar - Teach a keyword -> category rule
async fn ensenar(
    State(state): State<AppState>,
    Json(payload): Json<NuevaRegla>,
) -> impl IntoResponse {
    let palabra = payload.palabra.as_deref().map(str::trim).unwrap_or_default();
    let categoria = payload
        .categoria
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();

    if palabra.is_empty() || categoria.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Mensaje::new("palabra y categoria son obligatorias"),
        );
    }

    let conn = state.db.lock().unwrap();
    let result = Categorizer::load(&conn)
        .and_then(|mut categorizer| categorizer.teach(&conn, palabra, categoria));
    match result {
        Ok(report) => {
            for (id, error) in &report.failures {
                eprintln!("No se pudo corregir el gasto #{}: {}", id, error);
            }
            (
                StatusCode::OK,
                Mensaje::new(format!(
                    "✅ Regla guardada. {} gastos históricos corregidos.",
                    report.corrected
                )),
            )
        }
        Err(e) => {
            eprintln!("Error guardando regla: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Mensaje::new("Error interno"),
            )
        }
    }
}

fn temp_upload_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let ext = if filename.to_lowercase().ends_with(".pdf") {
        "pdf"
    } else {
        "csv"
    };
    std::env::temp_dir().join(format!("resumen-{}-{}.{}", std::process::id(), nanos, ext))
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    println!("🌐 Gastos - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db_path =
        std::env::var("GASTOS_DB").unwrap_or_else(|_| "gastos.sqlite".to_string());

    let conn = Connection::open(&db_path).expect("Failed to open database");
    setup_database(&conn).expect("Failed to set up database");
    println!("✓ Base de datos lista: {}", db_path);

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/gastos", get(listar_gastos).post(crear_gasto))
        .route("/ensenar", post(ensenar));

    // Build main router
    let app = Router::new()
        .route("/subir-resumen", post(subir_resumen))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Servidor listo en: http://localhost:3000");
    println!("   API: http://localhost:3000/api/gastos");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}

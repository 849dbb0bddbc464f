//! Dataset download and extraction against a local archive server.

use std::io::{Cursor, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    routing::get,
    Router,
};
use rncs::acquire::{AcquisitionError, Acquirer, ExtractionError, Fetched};
use rncs::config::SourceConfig;
use rncs::parse::RecordParser;
use rncs::store::IndexStore;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const HEADER: &str = "RNC,RAZON SOCIAL,NOMBRE COMERCIAL,CATEGORIA,ESTADO\n";

#[derive(Clone)]
struct ArchiveState {
    status: StatusCode,
    body: Arc<Mutex<Vec<u8>>>,
    seen_user_agent: Arc<Mutex<Option<String>>>,
}

async fn serve_archive(
    State(state): State<ArchiveState>,
    headers: HeaderMap,
) -> (StatusCode, Vec<u8>) {
    let ua = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.seen_user_agent.lock().unwrap() = ua;
    (state.status, state.body.lock().unwrap().clone())
}

async fn spawn_archive_server(status: StatusCode, body: Vec<u8>) -> (SocketAddr, ArchiveState) {
    let state = ArchiveState {
        status,
        body: Arc::new(Mutex::new(body)),
        seen_user_agent: Arc::new(Mutex::new(None)),
    };
    let app = Router::new()
        .route("/RNC_CONTRIBUYENTES.zip", get(serve_archive))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut w = zip::ZipWriter::new(&mut buf);
        for (name, body) in entries {
            w.start_file(*name, SimpleFileOptions::default()).unwrap();
            w.write_all(body.as_bytes()).unwrap();
        }
        w.finish().unwrap();
    }
    buf.into_inner()
}

fn source_config(addr: SocketAddr) -> SourceConfig {
    SourceConfig {
        url: format!("http://{}/RNC_CONTRIBUYENTES.zip", addr),
        user_agent: "Mozilla/5.0 (rncs test)".to_string(),
        timeout_secs: 10,
        ..SourceConfig::default()
    }
}

fn leftover_scratch_dirs(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| n.starts_with(".rncs-download-"))
        .collect()
}

#[tokio::test]
async fn ensure_downloads_and_extracts_matching_entry() {
    let dataset = format!("{HEADER}132138279,ACME SRL,,X,ACTIVO\n");
    let archive = zip_with(&[("LEEME.txt", "info"), ("TMP/RNC_Contribuyentes.CSV", &dataset)]);
    let (addr, state) = spawn_archive_server(StatusCode::OK, archive).await;

    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("rncs.csv");
    let acquirer = Acquirer::new(&source_config(addr)).unwrap();

    assert_eq!(acquirer.ensure(&path).await.unwrap(), Fetched::Created);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), dataset);
    assert_eq!(
        state.seen_user_agent.lock().unwrap().as_deref(),
        Some("Mozilla/5.0 (rncs test)")
    );
    assert!(leftover_scratch_dirs(tmp.path()).is_empty());

    // Second call must not hit the network again.
    *state.seen_user_agent.lock().unwrap() = None;
    assert_eq!(acquirer.ensure(&path).await.unwrap(), Fetched::AlreadyPresent);
    assert!(state.seen_user_agent.lock().unwrap().is_none());
}

#[tokio::test]
async fn non_success_status_is_a_download_error() {
    let (addr, _state) = spawn_archive_server(StatusCode::FORBIDDEN, b"denied".to_vec()).await;

    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("rncs.csv");
    let acquirer = Acquirer::new(&source_config(addr)).unwrap();

    let err = acquirer.ensure(&path).await.unwrap_err();
    assert!(
        matches!(err, AcquisitionError::Status { status, .. } if status == StatusCode::FORBIDDEN)
    );
    assert!(!path.exists());
    assert!(leftover_scratch_dirs(tmp.path()).is_empty());
}

#[tokio::test]
async fn archive_without_dataset_entry_is_an_extraction_error() {
    let archive = zip_with(&[("LEEME.txt", "nothing to see")]);
    let (addr, _state) = spawn_archive_server(StatusCode::OK, archive).await;

    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("rncs.csv");
    let acquirer = Acquirer::new(&source_config(addr)).unwrap();

    let err = acquirer.ensure(&path).await.unwrap_err();
    assert!(matches!(
        err,
        AcquisitionError::Extraction(ExtractionError::MissingEntry { .. })
    ));
    assert!(!path.exists());
    assert!(leftover_scratch_dirs(tmp.path()).is_empty());
}

#[tokio::test]
async fn refresh_replaces_file_and_reloads_index() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("rncs.csv");
    std::fs::write(&path, format!("{HEADER}101,OLD SRL,,X,ACTIVO\n")).unwrap();

    let store = Arc::new(IndexStore::new(&path, RecordParser::default()));
    assert!(store.get("101").unwrap().is_some());

    let fresh = format!("{HEADER}101,OLD SRL,,X,DADO DE BAJA\n202,NEW SRL,,X,ACTIVO\n");
    let (addr, _state) =
        spawn_archive_server(StatusCode::OK, zip_with(&[("rncs.csv", &fresh)])).await;
    let acquirer = Acquirer::new(&source_config(addr)).unwrap();

    let fetched = acquirer.refresh(&path, Arc::clone(&store)).await.unwrap();
    assert_eq!(fetched, Fetched::Replaced);
    assert_eq!(store.generation(), 2);
    assert_eq!(store.get("101").unwrap().unwrap().status, "DADO DE BAJA");
    assert_eq!(store.get("202").unwrap().unwrap().social_name, "NEW SRL");
    assert!(leftover_scratch_dirs(tmp.path()).is_empty());
}

#[tokio::test]
async fn failed_download_during_refresh_keeps_file_and_snapshot() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("rncs.csv");
    let original = format!("{HEADER}101,OLD SRL,,X,ACTIVO\n");
    std::fs::write(&path, &original).unwrap();

    let store = Arc::new(IndexStore::new(&path, RecordParser::default()));
    store.ensure_built().unwrap();

    let (addr, _state) =
        spawn_archive_server(StatusCode::INTERNAL_SERVER_ERROR, Vec::new()).await;
    let acquirer = Acquirer::new(&source_config(addr)).unwrap();

    assert!(acquirer.refresh(&path, Arc::clone(&store)).await.is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    assert_eq!(store.get("101").unwrap().unwrap().status, "ACTIVO");
    assert_eq!(store.generation(), 1);
}

#[tokio::test]
async fn refresh_succeeds_even_if_reload_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("rncs.csv");
    std::fs::write(&path, format!("{HEADER}101,OLD SRL,,X,ACTIVO\n")).unwrap();

    // The store reads a different file that does not exist, so its reload fails.
    let store = Arc::new(IndexStore::new(
        tmp.path().join("elsewhere.csv"),
        RecordParser::default(),
    ));

    let fresh = format!("{HEADER}202,NEW SRL,,X,ACTIVO\n");
    let (addr, _state) =
        spawn_archive_server(StatusCode::OK, zip_with(&[("rncs.csv", &fresh)])).await;
    let acquirer = Acquirer::new(&source_config(addr)).unwrap();

    let fetched = acquirer.refresh(&path, Arc::clone(&store)).await.unwrap();
    assert_eq!(fetched, Fetched::Replaced);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), fresh);
    assert_eq!(store.generation(), 0);
}

//! In-memory implementation of the direct-mail REST API for tests.
//!
//! Mirrors the hosted service's observable quirks: form-encoded request
//! bodies, response bodies JSON-encoded *as a JSON string* (clients decode
//! twice), id lookups answered with a one-element array (empty array when
//! absent), and zero-based pagination with a deliberately small page size so
//! client pagination loops see more than one page.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use base64::prelude::*;
use chrono::{NaiveDateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};

/// Records per browse/all page.
pub const PAGE_SIZE: usize = 2;

const SIZES: &[&str] = &["standard"];
const TURNAROUNDS: &[&str] = &["threeday"];
const STYLES: &[&str] = &["color"];
const OUTPUTS: &[&str] = &["single"];
const BATCH_STATUSES: &[&str] = &["processing", "hold", "archive"];
const FORMATS: &[&str] = &["json", "pdf", "html", "none"];

#[derive(Clone, Serialize)]
pub struct ConfigRow {
    pub config_id: i32,
    pub size: String,
    pub turnaround: String,
    pub style: String,
    pub output: String,
    pub returnenvelope: bool,
}

#[derive(Clone, Serialize)]
pub struct BatchRow {
    pub batch_id: i32,
    pub config_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub status: String,
    #[serde(skip)]
    pub created: NaiveDateTime,
}

#[derive(Clone, Serialize)]
pub struct MailingRow {
    pub mailing_id: i32,
    pub batch_id: i32,
    pub address: String,
    pub returnaddress: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    pub status: String,
    #[serde(skip)]
    pub created: NaiveDateTime,
}

#[derive(Default)]
pub struct Store {
    next_id: i32,
    pub configs: Vec<ConfigRow>,
    pub batches: Vec<BatchRow>,
    pub mailings: Vec<MailingRow>,
}

impl Store {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/test/ping", get(ping))
        .route("/configs", post(create_config))
        .route("/configs/{id}", get(get_config))
        .route("/configs/all/{page}", get(all_configs))
        .route("/batches", post(create_batch))
        .route(
            "/batches/{id}",
            get(get_batch).post(update_batch).delete(delete_batch),
        )
        .route("/batches/browse/{start}/{finish}/{page}", get(browse_batches))
        .route(
            "/batches/with/{status}/{start}/{finish}/{page}",
            get(browse_batches_with_status),
        )
        .route(
            "/batches/{id}/browse/{start}/{finish}/{page}",
            get(browse_batch_mailings),
        )
        .route(
            "/batches/{id}/with/{status}/{start}/{finish}/{page}",
            get(browse_batch_mailings_with_status),
        )
        .route("/mailings", post(create_mailing))
        .route("/mailings/{id}", get(get_mailing).delete(delete_mailing))
        .route(
            "/mailings/browse/{start}/{finish}/{page}",
            get(browse_mailings),
        )
        .route(
            "/mailings/with/{status}/{start}/{finish}/{page}",
            get(browse_mailings_with_status),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Encode a response body the way the service does: JSON wrapped in a JSON
/// string.
fn wire<T: Serialize>(value: &T) -> Json<String> {
    Json(serde_json::to_string(value).expect("wire value serializes"))
}

fn parse_when(s: &str) -> Result<NaiveDateTime, StatusCode> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map_err(|_| StatusCode::BAD_REQUEST)
}

fn page_of<T: Clone>(rows: impl Iterator<Item = T>, page: usize) -> Vec<T> {
    rows.skip(page * PAGE_SIZE).take(PAGE_SIZE).collect()
}

fn md5_hex(data: &[u8]) -> String {
    use std::fmt::Write;

    let digest = Md5::digest(data);
    let mut out = String::with_capacity(32);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

async fn ping() -> Json<String> {
    let now = Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
    wire(&serde_json::json!({ "pong": now }))
}

// --- configs ---

#[derive(Deserialize)]
pub struct ConfigForm {
    pub size: String,
    pub turnaround: String,
    pub style: String,
    pub output: String,
    pub returnenvelope: bool,
}

async fn create_config(
    State(db): State<Db>,
    Form(input): Form<ConfigForm>,
) -> Result<Json<String>, StatusCode> {
    if !SIZES.contains(&input.size.as_str())
        || !TURNAROUNDS.contains(&input.turnaround.as_str())
        || !STYLES.contains(&input.style.as_str())
        || !OUTPUTS.contains(&input.output.as_str())
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut store = db.write().await;
    let id = store.next_id();
    store.configs.push(ConfigRow {
        config_id: id,
        size: input.size,
        turnaround: input.turnaround,
        style: input.style,
        output: input.output,
        returnenvelope: input.returnenvelope,
    });
    Ok(wire(&serde_json::json!({ "config_id": id })))
}

async fn get_config(State(db): State<Db>, Path(id): Path<i32>) -> Json<String> {
    let store = db.read().await;
    let found: Vec<&ConfigRow> = store
        .configs
        .iter()
        .filter(|c| c.config_id == id)
        .collect();
    wire(&found)
}

async fn all_configs(State(db): State<Db>, Path(page): Path<usize>) -> Json<String> {
    let store = db.read().await;
    wire(&page_of(store.configs.iter().cloned(), page))
}

// --- batches ---

#[derive(Deserialize)]
pub struct BatchForm {
    pub config_id: i32,
    pub status: String,
    pub template: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusForm {
    pub status: String,
}

async fn create_batch(
    State(db): State<Db>,
    Form(input): Form<BatchForm>,
) -> Result<Json<String>, StatusCode> {
    if !BATCH_STATUSES.contains(&input.status.as_str()) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut store = db.write().await;
    if !store.configs.iter().any(|c| c.config_id == input.config_id) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let id = store.next_id();
    store.batches.push(BatchRow {
        batch_id: id,
        config_id: input.config_id,
        template: input.template,
        status: input.status,
        created: Utc::now().naive_utc(),
    });
    Ok(wire(&serde_json::json!({ "batch_id": id })))
}

async fn get_batch(State(db): State<Db>, Path(id): Path<i32>) -> Json<String> {
    let store = db.read().await;
    let found: Vec<&BatchRow> = store.batches.iter().filter(|b| b.batch_id == id).collect();
    wire(&found)
}

async fn update_batch(
    State(db): State<Db>,
    Path(id): Path<i32>,
    Form(input): Form<StatusForm>,
) -> Result<Json<String>, StatusCode> {
    if !BATCH_STATUSES.contains(&input.status.as_str()) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut store = db.write().await;
    let batch = store
        .batches
        .iter_mut()
        .find(|b| b.batch_id == id)
        .ok_or(StatusCode::NOT_FOUND)?;
    batch.status = input.status;
    Ok(wire(&serde_json::json!({ "batch_id": id })))
}

async fn delete_batch(
    State(db): State<Db>,
    Path(id): Path<i32>,
) -> Result<Json<String>, StatusCode> {
    let mut store = db.write().await;
    if !store.batches.iter().any(|b| b.batch_id == id) {
        return Err(StatusCode::NOT_FOUND);
    }
    // A batch that still owns mailings can't be deleted.
    if store.mailings.iter().any(|m| m.batch_id == id) {
        return Err(StatusCode::CONFLICT);
    }
    store.batches.retain(|b| b.batch_id != id);
    Ok(wire(&serde_json::json!({})))
}

async fn browse_batches(
    State(db): State<Db>,
    Path((start, finish, page)): Path<(String, String, usize)>,
) -> Result<Json<String>, StatusCode> {
    batches_in_range(&db, &start, &finish, None, page).await
}

async fn browse_batches_with_status(
    State(db): State<Db>,
    Path((status, start, finish, page)): Path<(String, String, String, usize)>,
) -> Result<Json<String>, StatusCode> {
    batches_in_range(&db, &start, &finish, Some(status), page).await
}

async fn batches_in_range(
    db: &Db,
    start: &str,
    finish: &str,
    status: Option<String>,
    page: usize,
) -> Result<Json<String>, StatusCode> {
    let start = parse_when(start)?;
    let finish = parse_when(finish)?;

    let store = db.read().await;
    let rows = store.batches.iter().filter(|b| {
        b.created >= start
            && b.created <= finish
            && status.as_ref().is_none_or(|s| &b.status == s)
    });
    Ok(wire(&page_of(rows.cloned(), page)))
}

// --- mailings ---

#[derive(Deserialize)]
pub struct MailingForm {
    pub batch_id: i32,
    pub address: String,
    pub returnaddress: String,
    pub format: String,
    pub data: Option<String>,
    pub md5: Option<String>,
}

async fn create_mailing(
    State(db): State<Db>,
    Form(input): Form<MailingForm>,
) -> Result<Json<String>, StatusCode> {
    if !FORMATS.contains(&input.format.as_str()) {
        return Err(StatusCode::BAD_REQUEST);
    }
    if let Some(data) = &input.data {
        if BASE64_STANDARD.decode(data.as_bytes()).is_err() {
            return Err(StatusCode::BAD_REQUEST);
        }
        // The digest covers the payload as shipped, still base64-encoded.
        match &input.md5 {
            Some(digest) if *digest == md5_hex(data.as_bytes()) => {}
            _ => return Err(StatusCode::BAD_REQUEST),
        }
    }

    let mut store = db.write().await;
    if !store.batches.iter().any(|b| b.batch_id == input.batch_id) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let id = store.next_id();
    store.mailings.push(MailingRow {
        mailing_id: id,
        batch_id: input.batch_id,
        address: input.address,
        returnaddress: input.returnaddress,
        format: input.format,
        data: input.data,
        md5: input.md5,
        status: "received".to_string(),
        created: Utc::now().naive_utc(),
    });
    Ok(wire(&serde_json::json!({ "mailing_id": id })))
}

async fn get_mailing(State(db): State<Db>, Path(id): Path<i32>) -> Json<String> {
    let store = db.read().await;
    let found: Vec<&MailingRow> = store
        .mailings
        .iter()
        .filter(|m| m.mailing_id == id)
        .collect();
    wire(&found)
}

async fn delete_mailing(
    State(db): State<Db>,
    Path(id): Path<i32>,
) -> Result<Json<String>, StatusCode> {
    let mut store = db.write().await;
    if !store.mailings.iter().any(|m| m.mailing_id == id) {
        return Err(StatusCode::NOT_FOUND);
    }
    store.mailings.retain(|m| m.mailing_id != id);
    Ok(wire(&serde_json::json!({})))
}

async fn browse_mailings(
    State(db): State<Db>,
    Path((start, finish, page)): Path<(String, String, usize)>,
) -> Result<Json<String>, StatusCode> {
    mailings_in_range(&db, &start, &finish, None, None, page).await
}

async fn browse_mailings_with_status(
    State(db): State<Db>,
    Path((status, start, finish, page)): Path<(String, String, String, usize)>,
) -> Result<Json<String>, StatusCode> {
    mailings_in_range(&db, &start, &finish, Some(status), None, page).await
}

async fn browse_batch_mailings(
    State(db): State<Db>,
    Path((id, start, finish, page)): Path<(i32, String, String, usize)>,
) -> Result<Json<String>, StatusCode> {
    mailings_in_range(&db, &start, &finish, None, Some(id), page).await
}

async fn browse_batch_mailings_with_status(
    State(db): State<Db>,
    Path((id, status, start, finish, page)): Path<(i32, String, String, String, usize)>,
) -> Result<Json<String>, StatusCode> {
    mailings_in_range(&db, &start, &finish, Some(status), Some(id), page).await
}

async fn mailings_in_range(
    db: &Db,
    start: &str,
    finish: &str,
    status: Option<String>,
    batch_id: Option<i32>,
    page: usize,
) -> Result<Json<String>, StatusCode> {
    let start = parse_when(start)?;
    let finish = parse_when(finish)?;

    let store = db.read().await;
    let rows = store.mailings.iter().filter(|m| {
        m.created >= start
            && m.created <= finish
            && status.as_ref().is_none_or(|s| &m.status == s)
            && batch_id.is_none_or(|b| m.batch_id == b)
    });
    Ok(wire(&page_of(rows.cloned(), page)))
}

use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::app;
use tower::ServiceExt;

/// Decode a response body through the service's double encoding: the bytes
/// are a JSON string, which itself contains the JSON payload.
async fn body_value(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let outer: String = serde_json::from_slice(&bytes).unwrap();
    serde_json::from_str(&outer).unwrap()
}

fn form_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(body.to_string())
        .unwrap()
}

fn get_request(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn delete_request(uri: &str) -> Request<String> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(String::new())
        .unwrap()
}

const CONFIG_FORM: &str = "size=standard&turnaround=threeday&style=color&output=single&returnenvelope=false";

async fn create_config(app: &axum::Router) -> i64 {
    let resp = app
        .clone()
        .oneshot(form_request("POST", "/configs", CONFIG_FORM))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    body_value(resp).await["config_id"].as_i64().unwrap()
}

async fn create_batch(app: &axum::Router, config_id: i64) -> i64 {
    let resp = app
        .clone()
        .oneshot(form_request(
            "POST",
            "/batches",
            &format!("config_id={config_id}&status=processing"),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    body_value(resp).await["batch_id"].as_i64().unwrap()
}

async fn create_mailing(app: &axum::Router, batch_id: i64) -> i64 {
    let resp = app
        .clone()
        .oneshot(form_request(
            "POST",
            "/mailings",
            &format!("batch_id={batch_id}&address=addr1&returnaddress=addr2&format=none"),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    body_value(resp).await["mailing_id"].as_i64().unwrap()
}

fn md5_hex(data: &[u8]) -> String {
    use md5::{Digest, Md5};
    use std::fmt::Write;

    let digest = Md5::digest(data);
    let mut out = String::with_capacity(32);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

// --- ping ---

#[tokio::test]
async fn ping_returns_a_timestamp() {
    let app = app();
    let resp = app.oneshot(get_request("/test/ping")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let value = body_value(resp).await;
    assert!(value["pong"].as_str().unwrap().starts_with(|c: char| c.is_ascii_digit()));
}

// --- configs ---

#[tokio::test]
async fn create_config_assigns_sequential_ids() {
    let app = app();
    assert_eq!(create_config(&app).await, 1);
    assert_eq!(create_config(&app).await, 2);
}

#[tokio::test]
async fn create_config_rejects_unknown_size() {
    let app = app();
    let resp = app
        .oneshot(form_request(
            "POST",
            "/configs",
            "size=huge&turnaround=threeday&style=color&output=single&returnenvelope=false",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_config_returns_a_one_element_array() {
    let app = app();
    let id = create_config(&app).await;

    let resp = app
        .oneshot(get_request(&format!("/configs/{id}")))
        .await
        .unwrap();
    let value = body_value(resp).await;

    let records = value.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["config_id"], id);
    assert_eq!(records[0]["returnenvelope"], false);
}

#[tokio::test]
async fn get_missing_config_returns_an_empty_array() {
    let app = app();
    let resp = app.oneshot(get_request("/configs/99")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_value(resp).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn configs_all_pages_with_fixed_page_size() {
    let app = app();
    for _ in 0..3 {
        create_config(&app).await;
    }

    let page0 = body_value(app.clone().oneshot(get_request("/configs/all/0")).await.unwrap()).await;
    let page1 = body_value(app.clone().oneshot(get_request("/configs/all/1")).await.unwrap()).await;
    let page2 = body_value(app.clone().oneshot(get_request("/configs/all/2")).await.unwrap()).await;

    assert_eq!(page0.as_array().unwrap().len(), 2);
    assert_eq!(page1.as_array().unwrap().len(), 1);
    assert!(page2.as_array().unwrap().is_empty());
}

// --- batches ---

#[tokio::test]
async fn create_batch_requires_an_existing_config() {
    let app = app();
    let resp = app
        .oneshot(form_request(
            "POST",
            "/batches",
            "config_id=42&status=processing",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_status_update_persists() {
    let app = app();
    let config_id = create_config(&app).await;
    let batch_id = create_batch(&app, config_id).await;

    let resp = app
        .clone()
        .oneshot(form_request(
            "POST",
            &format!("/batches/{batch_id}"),
            "status=hold",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(get_request(&format!("/batches/{batch_id}")))
        .await
        .unwrap();
    let value = body_value(resp).await;
    assert_eq!(value[0]["status"], "hold");
}

#[tokio::test]
async fn delete_batch_refuses_while_mailings_remain() {
    let app = app();
    let config_id = create_config(&app).await;
    let batch_id = create_batch(&app, config_id).await;
    let mailing_id = create_mailing(&app, batch_id).await;

    let resp = app
        .clone()
        .oneshot(delete_request(&format!("/batches/{batch_id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = app
        .clone()
        .oneshot(delete_request(&format!("/mailings/{mailing_id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(delete_request(&format!("/batches/{batch_id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// --- mailings ---

#[tokio::test]
async fn create_mailing_rejects_a_bad_digest() {
    let app = app();
    let config_id = create_config(&app).await;
    let batch_id = create_batch(&app, config_id).await;

    // base64 of "hello world!", digest deliberately wrong.
    let resp = app
        .oneshot(form_request(
            "POST",
            "/mailings",
            &format!(
                "batch_id={batch_id}&address=addr1&returnaddress=addr2&format=html&data=aGVsbG8gd29ybGQh&md5=234234"
            ),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_mailing_stores_the_payload() {
    let app = app();
    let config_id = create_config(&app).await;
    let batch_id = create_batch(&app, config_id).await;

    let encoded = "aGVsbG8gd29ybGQh";
    let digest = md5_hex(encoded.as_bytes());
    let resp = app
        .clone()
        .oneshot(form_request(
            "POST",
            "/mailings",
            &format!(
                "batch_id={batch_id}&address=addr1&returnaddress=addr2&format=html&data={encoded}&md5={digest}"
            ),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let mailing_id = body_value(resp).await["mailing_id"].as_i64().unwrap();

    let resp = app
        .oneshot(get_request(&format!("/mailings/{mailing_id}")))
        .await
        .unwrap();
    let value = body_value(resp).await;
    assert_eq!(value[0]["data"], encoded);
    assert_eq!(value[0]["md5"], digest);
    assert_eq!(value[0]["status"], "received");
    assert_eq!(value[0]["returnaddress"], "addr2");
}

#[tokio::test]
async fn browse_mailings_filters_by_status_and_batch() {
    let app = app();
    let config_id = create_config(&app).await;
    let batch_id = create_batch(&app, config_id).await;
    create_mailing(&app, batch_id).await;

    let all = body_value(
        app.clone()
            .oneshot(get_request(&format!(
                "/batches/{batch_id}/browse/1900-01-01T00:00:00/2100-01-01T00:00:00/0"
            )))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    let none = body_value(
        app.oneshot(get_request(
            "/mailings/with/shipped/1900-01-01T00:00:00/2100-01-01T00:00:00/0",
        ))
        .await
        .unwrap(),
    )
    .await;
    assert!(none.as_array().unwrap().is_empty());
}

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use lost_items::{
    models::image::ImageUpload,
    services::{
        blob_service::BlobService,
        chat_service::{ChatError, ChatResult, ChatService},
        lost_item_store::LostItemStore,
    },
    state::AppState,
};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use std::{collections::HashMap, sync::Arc};
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "lost-items-test-boundary";

/// Chat delegate with a fixed alias table. Unknown input is returned as-is.
#[derive(Default)]
pub struct StubChatService {
    pub aliases: HashMap<String, String>,
    pub fail: bool,
}

impl StubChatService {
    pub fn with_aliases(pairs: &[(&str, &str)]) -> Self {
        Self {
            aliases: pairs
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            aliases: HashMap::new(),
            fail: true,
        }
    }

    fn lookup(&self, text: &str) -> ChatResult<String> {
        if self.fail {
            return Err(ChatError::Api {
                status: 503,
                body: "upstream unavailable".into(),
            });
        }
        Ok(self
            .aliases
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string()))
    }
}

#[async_trait]
impl ChatService for StubChatService {
    async fn select_location(&self, text: &str) -> ChatResult<String> {
        self.lookup(text)
    }

    async fn select_category(&self, text: &str) -> ChatResult<String> {
        self.lookup(text)
    }

    async fn process_image(&self, image: &ImageUpload) -> ChatResult<Value> {
        self.lookup(&image.file_name)?;
        Ok(json!({
            "categoryName": "wallet",
            "fileName": image.file_name,
            "size": image.data.len(),
        }))
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: LostItemStore,
    pub account_url: String,
    pub blob_dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(StubChatService::default()).await
    }

    pub async fn spawn_with(chat: StubChatService) -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        let store = LostItemStore::new(Arc::new(pool));
        store.migrate().await.expect("Failed to run migrations");

        let blob_dir = tempfile::tempdir().expect("Failed to create blob dir");
        let account_url = format!("file://{}", blob_dir.path().display());
        let blobs = BlobService::from_account_url(&account_url, reqwest::Client::new())
            .expect("Failed to build blob service");

        let state = AppState::new(store.clone(), blobs, Arc::new(chat));
        TestApp {
            router: lost_items::app(state),
            store,
            account_url,
            blob_dir,
        }
    }

    /// App whose uploads go through `blobs` instead of a temp directory.
    pub async fn spawn_with_blobs(blobs: BlobService, account_url: &str) -> Self {
        let mut app = Self::spawn().await;
        let state = AppState::new(
            app.store.clone(),
            blobs,
            Arc::new(StubChatService::default()),
        );
        app.router = lost_items::app(state);
        app.account_url = account_url.to_string();
        app
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request("POST", uri, body)).await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request("PUT", uri, body)).await
    }

    pub async fn post_image(
        &self,
        uri: &str,
        field: &str,
        file_name: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(field, file_name, data)))
            .unwrap();
        self.send(request).await
    }

    /// Create a record through the API and return its JSON.
    pub async fn create(&self, category: &str, place: &str) -> Value {
        let (status, body) = self
            .post_json(
                "/lostitems",
                json!({ "item": { "categoryName": category }, "createUserPlace": place }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

mod common;

use axum::{
    Json, Router,
    body::{Bytes, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};
use common::TestApp;
use lost_items::{
    models::image::ImageUpload,
    services::{
        blob_service::{AzureBlobBackend, BlobError, BlobService},
        credential::{
            CredentialError, IdentitySource, ManagedIdentityCredential, STORAGE_RESOURCE,
        },
    },
};
use serde_json::json;
use std::sync::{Arc, Mutex};

const TOKEN_PATH: &str = "/msi/token";
const IDENTITY_HEADER: &str = "identity-secret";
const CLIENT_ID: &str = "user-assigned-id";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
}

impl Recorded {
    fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

/// Stands in for both the identity endpoint and the storage account.
#[derive(Clone)]
struct MockAzure {
    base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    token_status: StatusCode,
    blob_status: StatusCode,
}

impl MockAzure {
    async fn start(token_status: StatusCode, blob_status: StatusCode) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mock = MockAzure {
            base_url: format!("http://{}", listener.local_addr().unwrap()),
            requests: Arc::new(Mutex::new(Vec::new())),
            token_status,
            blob_status,
        };
        let app = Router::new().fallback(handle).with_state(mock.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        mock
    }

    async fn healthy() -> Self {
        Self::start(StatusCode::OK, StatusCode::CREATED).await
    }

    fn credential(
        &self,
        client: reqwest::Client,
        client_id: Option<&str>,
    ) -> ManagedIdentityCredential {
        ManagedIdentityCredential::new(
            client,
            IdentitySource::AppService {
                endpoint: format!("{}{}", self.base_url, TOKEN_PATH),
                header: IDENTITY_HEADER.into(),
            },
            client_id.map(str::to_string),
        )
    }

    fn blob_service(&self) -> BlobService {
        let client = client();
        let credential = self.credential(client.clone(), Some(CLIENT_ID));
        let backend = AzureBlobBackend::new(self.base_url.clone(), client, credential);
        BlobService::new(self.base_url.clone(), Arc::new(backend))
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn puts(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::PUT)
            .collect()
    }
}

async fn handle(State(mock): State<MockAzure>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
    mock.requests.lock().unwrap().push(Recorded {
        method: parts.method,
        path: path.clone(),
        query,
        headers: parts.headers,
        body,
    });

    if path == TOKEN_PATH {
        if mock.token_status.is_success() {
            return Json(json!({ "access_token": "test-token", "token_type": "Bearer" }))
                .into_response();
        }
        return (mock.token_status, "identity unavailable").into_response();
    }
    mock.blob_status.into_response()
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn image(name: &str, data: &'static [u8]) -> ImageUpload {
    ImageUpload {
        file_name: name.into(),
        content_type: Some("image/jpeg".into()),
        data: Bytes::from_static(data),
    }
}

#[tokio::test]
async fn upload_puts_block_blob_with_bearer_token() {
    let mock = MockAzure::healthy().await;
    let service = mock.blob_service();

    let url = service
        .upload_image(&image("wallet.jpg", b"jpeg bytes"))
        .await
        .unwrap();
    assert_eq!(url, format!("{}/images/wallet.jpg", mock.base_url));

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);

    let token = &requests[0];
    assert_eq!(token.method, Method::GET);
    assert_eq!(token.path, TOKEN_PATH);
    assert_eq!(token.header("x-identity-header"), IDENTITY_HEADER);
    let query = token.query.as_deref().unwrap();
    assert!(query.contains("resource=https%3A%2F%2Fstorage.azure.com%2F"), "{query}");
    assert!(query.contains("api-version=2019-08-01"), "{query}");
    assert!(query.contains(&format!("client_id={}", CLIENT_ID)), "{query}");

    let put = &requests[1];
    assert_eq!(put.method, Method::PUT);
    assert_eq!(put.path, "/images/wallet.jpg");
    assert_eq!(put.header("authorization"), "Bearer test-token");
    assert_eq!(put.header("x-ms-blob-type"), "BlockBlob");
    assert_eq!(put.header("x-ms-version"), "2021-08-06");
    assert_eq!(put.header("content-type"), "image/jpeg");
    assert_eq!(
        put.header("content-md5"),
        general_purpose::STANDARD.encode(md5::compute(b"jpeg bytes").0)
    );
    assert_eq!(put.body, Bytes::from_static(b"jpeg bytes"));
}

#[tokio::test]
async fn reserved_characters_stay_in_the_blob_name() {
    let mock = MockAzure::healthy().await;
    let service = mock.blob_service();

    let cases = [
        ("a#b.jpg", "/images/a%23b.jpg"),
        ("a#c.jpg", "/images/a%23c.jpg"),
        ("q?x=1.jpg", "/images/q%3Fx=1.jpg"),
        ("100%.jpg", "/images/100%25.jpg"),
    ];
    for (name, _) in cases {
        let url = service.upload_image(&image(name, b"bytes")).await.unwrap();
        assert_eq!(url, format!("{}/images/{}", mock.base_url, name));
    }

    let puts = mock.puts();
    assert_eq!(puts.len(), cases.len());
    for (put, (name, path)) in puts.iter().zip(cases) {
        assert_eq!(put.path, path, "{name}");
        assert_eq!(put.query, None, "{name}");
    }
}

#[tokio::test]
async fn rejected_put_is_reported_with_status() {
    let mock = MockAzure::start(StatusCode::OK, StatusCode::FORBIDDEN).await;
    let err = mock
        .blob_service()
        .upload_image(&image("wallet.jpg", b"bytes"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, BlobError::Rejected { status: 403, .. }),
        "{err:?}"
    );
}

#[tokio::test]
async fn credential_failure_stops_the_upload() {
    let mock = MockAzure::start(StatusCode::BAD_REQUEST, StatusCode::CREATED).await;
    let err = mock
        .blob_service()
        .upload_image(&image("wallet.jpg", b"bytes"))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            BlobError::Credential(CredentialError::Rejected { status: 400, .. })
        ),
        "{err:?}"
    );
    assert!(mock.puts().is_empty());
}

#[tokio::test]
async fn token_request_omits_client_id_for_system_identity() {
    let mock = MockAzure::healthy().await;
    let credential = mock.credential(client(), None);

    let token = credential.token(STORAGE_RESOURCE).await.unwrap();
    assert_eq!(token, "test-token");

    let requests = mock.requests();
    let query = requests[0].query.as_deref().unwrap();
    assert!(!query.contains("client_id"), "{query}");
}

#[tokio::test]
async fn upload_endpoint_returns_verbatim_url() {
    let mock = MockAzure::healthy().await;
    let app = TestApp::spawn_with_blobs(mock.blob_service(), &mock.base_url).await;

    let (status, body) = app
        .post_image("/upload-image", "image", "a#b.jpg", b"bytes")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imageUrl"], format!("{}/images/a#b.jpg", app.account_url));
    assert_eq!(mock.puts()[0].path, "/images/a%23b.jpg");
}

#[tokio::test]
async fn upload_endpoint_reports_credential_failure() {
    let mock = MockAzure::start(StatusCode::INTERNAL_SERVER_ERROR, StatusCode::CREATED).await;
    let app = TestApp::spawn_with_blobs(mock.blob_service(), &mock.base_url).await;

    let (status, body) = app
        .post_image("/upload-image", "image", "wallet.jpg", b"bytes")
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .starts_with("画像のアップロードに失敗しました")
    );
    assert!(mock.puts().is_empty());
}

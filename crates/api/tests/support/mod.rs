//! Test harness for router-level API tests
//!
//! Real SQLite repositories on a temp database, a programmable mock
//! provider, and the plain-text path of the real extractor.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Request, Response};
use axum::Router;
use contendo_api::{build_router, AppContext};
use contendo_core::{
    CalendarProvider, ChannelRegistration, FetchCursor, RemoteEventDraft, RemotePage, SyncError,
    SyncResult,
};
use contendo_domain::{
    ApiToken, AuthConfig, Config, DatabaseConfig, GoogleConfig, OcrConfig, Role, ServerConfig,
    SyncConfig,
};
use contendo_infra::{
    DbManager, SqliteEmployeeDirectory, SqliteEventStore, SqliteModuleFlags,
    SqliteSyncStateRepository, TextExtractor,
};
use parking_lot::Mutex;
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_T1: &str = "tok-admin-t1";
pub const EMPLOYEE_T1: &str = "tok-employee-t1";
pub const ADMIN_T2: &str = "tok-admin-t2";
pub const ADMIN_T3: &str = "tok-admin-t3";

/// Programmable provider mock.
#[derive(Default)]
pub struct MockProvider {
    pub pages: Mutex<VecDeque<RemotePage>>,
    pub created: Mutex<Vec<RemoteEventDraft>>,
    pub fail_auth: Mutex<bool>,
}

#[async_trait]
impl CalendarProvider for MockProvider {
    async fn fetch_events(
        &self,
        _tenant_id: &str,
        _cursor: &FetchCursor,
        _page_token: Option<&str>,
    ) -> SyncResult<RemotePage> {
        if *self.fail_auth.lock() {
            return Err(SyncError::Auth("invalid_grant".into()));
        }
        Ok(self.pages.lock().pop_front().unwrap_or_default())
    }

    async fn create_event(&self, _tenant_id: &str, draft: &RemoteEventDraft) -> SyncResult<String> {
        let mut created = self.created.lock();
        created.push(draft.clone());
        Ok(format!("g-evt-{}", created.len()))
    }

    async fn update_event(
        &self,
        _tenant_id: &str,
        _external_id: &str,
        _draft: &RemoteEventDraft,
    ) -> SyncResult<()> {
        Ok(())
    }

    async fn delete_event(&self, _tenant_id: &str, _external_id: &str) -> SyncResult<()> {
        Ok(())
    }

    async fn register_channel(
        &self,
        _tenant_id: &str,
        channel_id: &str,
        _token: &str,
    ) -> SyncResult<ChannelRegistration> {
        Ok(ChannelRegistration {
            resource_id: format!("res-{channel_id}"),
            expiry: 2_000_000_000,
        })
    }

    async fn stop_channel(
        &self,
        _tenant_id: &str,
        _channel_id: &str,
        _resource_id: &str,
    ) -> SyncResult<()> {
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub ctx: Arc<AppContext>,
    pub provider: Arc<MockProvider>,
    pub db: Arc<DbManager>,
    _temp: TempDir,
}

impl TestApp {
    pub fn event_store(&self) -> SqliteEventStore {
        SqliteEventStore::new(self.db.clone())
    }
}

/// Tenants: t1 fully provisioned (module on, sync connected), t2 module on
/// but sync disconnected, t3 without any module record.
pub fn spawn_app(gating_fail_open: bool) -> TestApp {
    let temp = TempDir::new().unwrap();
    let db = Arc::new(DbManager::new(temp.path().join("api-test.db"), 4).unwrap());

    let flags = SqliteModuleFlags::new(db.clone());
    flags.set_module("t1", "calendar", true).unwrap();
    flags.set_module("t2", "calendar", true).unwrap();

    let directory = SqliteEmployeeDirectory::new(db.clone());
    directory.insert_employee("t1", "Juan Pérez", Some("juan@acme.es")).unwrap();
    directory.insert_employee("t1", "María López", None).unwrap();

    let states = SqliteSyncStateRepository::new(db.clone());
    states.set_connected("t1", "refresh-secret").unwrap();

    let config = Config {
        database: DatabaseConfig {
            path: temp.path().join("api-test.db").display().to_string(),
            pool_size: 4,
        },
        server: ServerConfig { bind_addr: "127.0.0.1:0".to_string(), gating_fail_open },
        sync: SyncConfig { max_attempts: 1, ..SyncConfig::default() },
        ocr: OcrConfig::default(),
        google: GoogleConfig {
            client_id: "cid".to_string(),
            client_secret: "csecret".to_string(),
            calendar_id: "primary".to_string(),
            webhook_callback_url: "https://contendo.example/calendar-webhook".to_string(),
        },
        auth: AuthConfig {
            tokens: vec![
                token(ADMIN_T1, "t1", Role::Admin, Some("ana")),
                token(EMPLOYEE_T1, "t1", Role::Employee, None),
                token(ADMIN_T2, "t2", Role::Admin, None),
                token(ADMIN_T3, "t3", Role::Admin, None),
            ],
        },
    };

    let provider = Arc::new(MockProvider::default());
    let extractor = Arc::new(TextExtractor::new(&config.ocr));
    let ctx = AppContext::assemble(config, db.clone(), provider.clone(), extractor);
    let router = build_router(ctx.clone());

    TestApp { router, ctx, provider, db, _temp: temp }
}

fn token(value: &str, tenant: &str, role: Role, label: Option<&str>) -> ApiToken {
    ApiToken {
        token: value.to_string(),
        tenant_id: tenant.to_string(),
        role,
        label: label.map(str::to_string),
    }
}

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, bearer: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder =
        Request::builder().method("POST").uri(uri).header(CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn post_empty(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Build a multipart upload of plain-text files.
pub fn post_files(uri: &str, bearer: &str, files: &[(&str, &str)]) -> Request<Body> {
    let boundary = "contendo-test-boundary";
    let mut body = String::new();
    for (name, content) in files {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {bearer}"))
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

//! Service Tests
//!
//! Tests verify:
//! - Generate: validation, missing credential, best-effort persistence
//! - Projects: listing and exact-version lookup
//! - Preview bundling of stored versions
//! - The HTTP completion client against a canned local endpoint

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use sitesmith::completion::{CompletionClient, CompletionRequest, HttpCompletionClient};
use sitesmith::config::{Config, StoreBackend};
use sitesmith::error::ErrorKind;
use sitesmith::kv::MemoryKv;
use sitesmith::service::{GenerateRequest, ProjectsQuery, ProjectsResponse, UNPERSISTED_VERSION};
use sitesmith::{
    FileEntry, KvProjectStore, Manifest, ProjectStore, ProjectSummary, Result, SiteError,
    SiteService,
};

// =============================================================================
// Helper Types
// =============================================================================

/// Completion client that answers with a fixed text and records requests
struct CannedCompletion {
    reply: Result<String>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl CannedCompletion {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(SiteError::UpstreamGeneration {
                status,
                detail: "rate limited".to_string(),
            }),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl CompletionClient for CannedCompletion {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.seen.lock().unwrap().push(request.clone());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(SiteError::UpstreamGeneration { status, detail }) => {
                Err(SiteError::UpstreamGeneration {
                    status: *status,
                    detail: detail.clone(),
                })
            }
            Err(e) => Err(SiteError::Internal(e.to_string())),
        }
    }
}

/// Store whose writes always fail
struct BrokenStore;

impl ProjectStore for BrokenStore {
    fn latest_version(&self, _owner: &str, _project_id: &str) -> Result<u64> {
        Err(SiteError::Persistence("unreachable".to_string()))
    }

    fn get(&self, _owner: &str, _project_id: &str, _version: u64) -> Result<Option<Manifest>> {
        Err(SiteError::Persistence("unreachable".to_string()))
    }

    fn put(&self, _owner: &str, _project_id: &str, _manifest: &Manifest) -> Result<u64> {
        Err(SiteError::Persistence("unreachable".to_string()))
    }

    fn list(&self, _owner: &str) -> Result<Vec<ProjectSummary>> {
        Err(SiteError::Persistence("unreachable".to_string()))
    }
}

const SITE_JSON: &str = r#"{"entry":"index.html","files":[
    {"name":"index.html","content":"<!doctype html><link rel=stylesheet href=style.css><h1>Hi</h1>"},
    {"name":"style.css","content":"h1{color:teal}"}]}"#;

fn request(prompt: &str, username: &str, project_id: &str) -> GenerateRequest {
    GenerateRequest {
        prompt: prompt.to_string(),
        username: username.to_string(),
        project_id: project_id.to_string(),
        ..Default::default()
    }
}

fn service_with_memory_store(completion: Arc<CannedCompletion>) -> SiteService {
    let store: Arc<dyn ProjectStore> = Arc::new(KvProjectStore::new(MemoryKv::new()));
    SiteService::new(Some(completion), Some(store), &Config::default())
}

// =============================================================================
// Generate Tests
// =============================================================================

#[test]
fn test_generate_assigns_increasing_versions() {
    let service = service_with_memory_store(CannedCompletion::replying(SITE_JSON));

    let first = service.generate(&request("a portfolio", "ada", "folio")).unwrap();
    let second = service.generate(&request("a portfolio", "ada", "folio")).unwrap();

    assert_eq!(first.project_id, "folio");
    assert_eq!(first.version, 1);
    assert_eq!(second.version, 2);
    assert_eq!(first.manifest.entry, "index.html");
    assert_eq!(first.manifest.files.len(), 2);
}

#[test]
fn test_generate_normalizes_completion_text() {
    let service = service_with_memory_store(CannedCompletion::replying("```html\n<p>bare</p>\n```"));

    let response = service.generate(&request("x", "ada", "p")).unwrap();

    assert_eq!(
        response.manifest.files,
        vec![FileEntry::new("index.html", "<!doctype html>\n<p>bare</p>")]
    );
}

#[test]
fn test_generate_uses_default_or_requested_model() {
    let completion = CannedCompletion::replying(SITE_JSON);
    let service = service_with_memory_store(Arc::clone(&completion));

    service.generate(&request("one", "ada", "p")).unwrap();
    let mut custom = request("two", "ada", "p");
    custom.model = Some("llama-3.1-8b-instant".to_string());
    service.generate(&custom).unwrap();

    let seen = completion.requests();
    assert_eq!(seen[0].model, Config::default().model);
    assert_eq!(seen[1].model, "llama-3.1-8b-instant");
    assert_eq!(seen[0].prompt, "one");
    assert!(seen[0].user_message().contains("one"));
}

#[test]
fn test_generate_rejects_missing_fields() {
    let completion = CannedCompletion::replying(SITE_JSON);
    let service = service_with_memory_store(Arc::clone(&completion));

    let err = service.generate(&request("  ", "ada", "")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(err.code(), "BadRequest");
    assert!(err
        .public_message()
        .starts_with("Missing fields: prompt, projectId."));
    assert!(completion.requests().is_empty());
}

#[test]
fn test_generate_without_credential_is_unconfigured() {
    let service = SiteService::new(None, None, &Config::default());

    let err = service.generate(&request("x", "ada", "p")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unconfigured);
    assert_eq!(err.code(), "MissingConfig");
}

#[test]
fn test_generate_surfaces_upstream_failure() {
    let service = service_with_memory_store(CannedCompletion::failing(429));

    let err = service.generate(&request("x", "ada", "p")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UpstreamGeneration);
    assert!(err.to_string().contains("429"));
    assert!(!err.public_message().contains("rate limited"));
}

#[test]
fn test_generate_without_store_reports_version_one() {
    let service = SiteService::new(
        Some(CannedCompletion::replying(SITE_JSON)),
        None,
        &Config::default(),
    );

    let first = service.generate(&request("x", "ada", "p")).unwrap();
    let second = service.generate(&request("x", "ada", "p")).unwrap();

    assert!(!service.has_store());
    assert_eq!(first.version, UNPERSISTED_VERSION);
    assert_eq!(second.version, UNPERSISTED_VERSION);
    assert!(service.list("ada").unwrap().is_empty());
    assert_eq!(service.load("ada", "p", 1).unwrap(), None);
}

#[test]
fn test_generate_with_failing_store_still_succeeds() {
    let store: Arc<dyn ProjectStore> = Arc::new(BrokenStore);
    let service = SiteService::new(
        Some(CannedCompletion::replying(SITE_JSON)),
        Some(store),
        &Config::default(),
    );

    let response = service.generate(&request("x", "ada", "p")).unwrap();

    assert_eq!(response.version, 1);
    assert_eq!(response.manifest.files.len(), 2);
}

#[test]
fn test_user_id_is_preferred_owner_key() {
    let service = service_with_memory_store(CannedCompletion::replying(SITE_JSON));
    let mut req = request("x", "Ada L.", "p");
    req.user_id = Some("user_123".to_string());

    service.generate(&req).unwrap();

    assert_eq!(service.list("user_123").unwrap().len(), 1);
    assert!(service.list("Ada L.").unwrap().is_empty());
}

#[test]
fn test_blank_user_id_falls_back_to_username() {
    let mut req = request("x", "ada", "p");
    req.user_id = Some("   ".to_string());

    assert_eq!(req.owner_key(), "ada");
}

#[test]
fn test_generate_request_reads_camel_case() {
    let req: GenerateRequest = serde_json::from_value(json!({
        "prompt": "a bakery site",
        "username": "ada",
        "userId": "u1",
        "projectId": "bakery"
    }))
    .unwrap();

    assert_eq!(req.user_id.as_deref(), Some("u1"));
    assert_eq!(req.project_id, "bakery");
    assert_eq!(req.model, None);
}

// =============================================================================
// Projects and Preview Tests
// =============================================================================

#[test]
fn test_projects_lists_and_fetches() {
    let service = service_with_memory_store(CannedCompletion::replying(SITE_JSON));
    service.generate(&request("x", "ada", "shop")).unwrap();
    service.generate(&request("x", "ada", "blog")).unwrap();
    service.generate(&request("x", "ada", "blog")).unwrap();

    let listing = service
        .projects(&ProjectsQuery {
            user_key: "ada".to_string(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(
        serde_json::to_value(&listing).unwrap(),
        json!([
            {"projectId": "blog", "lastVersion": 2},
            {"projectId": "shop", "lastVersion": 1}
        ])
    );

    let found = service
        .projects(&ProjectsQuery {
            user_key: "ada".to_string(),
            project_id: Some("blog".to_string()),
            version: Some(2),
        })
        .unwrap();
    assert!(matches!(found, ProjectsResponse::Manifest(Some(_))));

    let missing = service
        .projects(&ProjectsQuery {
            user_key: "ada".to_string(),
            project_id: Some("blog".to_string()),
            version: Some(9),
        })
        .unwrap();
    assert_eq!(serde_json::to_value(&missing).unwrap(), serde_json::Value::Null);
}

#[test]
fn test_projects_requires_user_key() {
    let service = service_with_memory_store(CannedCompletion::replying(SITE_JSON));

    let err = service.projects(&ProjectsQuery::default()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[test]
fn test_preview_inlines_stored_version() {
    let service = service_with_memory_store(CannedCompletion::replying(SITE_JSON));
    let generated = service.generate(&request("x", "ada", "site")).unwrap();

    let document = service
        .preview("ada", "site", generated.version)
        .unwrap()
        .unwrap();

    assert!(document.starts_with("<!doctype html>\n"));
    assert!(document.contains("<style>h1{color:teal}</style>"));
    assert!(!document.contains("<link"));
    assert_eq!(service.preview("ada", "site", 42).unwrap(), None);
}

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_from_config_memory_backend_without_key() {
    let config = Config::builder().store_backend(StoreBackend::Memory).build();

    let service = SiteService::from_config(&config).unwrap();

    assert!(service.has_store());
    assert_eq!(
        service.generate(&request("x", "ada", "p")).unwrap_err().kind(),
        ErrorKind::Unconfigured
    );
}

#[test]
fn test_from_config_rejects_invalid_limits() {
    let config = Config::builder().max_files(0).build();

    assert!(matches!(SiteService::from_config(&config), Err(SiteError::Config(_))));
}

#[test]
fn test_limits_beyond_store_capacity_rejected() {
    let doubled = Config::builder().max_files(64).build();
    let defaults = Config::builder().build();

    assert!(doubled.validate().is_err());
    assert!(matches!(SiteService::from_config(&doubled), Err(SiteError::Config(_))));
    assert!(defaults.validate().is_ok());
}

#[test]
fn test_from_config_with_embedded_store() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .store_backend(StoreBackend::Embedded)
        .build();

    let service = SiteService::from_config(&config).unwrap();

    assert!(service.has_store());
    assert!(temp_dir.path().join("wal.log").exists());
}

// =============================================================================
// HTTP Completion Client Tests
// =============================================================================

/// Serve one canned HTTP response; returns the endpoint URL and the raw request
fn one_shot_endpoint(status_line: &'static str, body: String) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut head = String::new();
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap();
            }
            head.push_str(&line);
            if line == "\r\n" || line.is_empty() {
                break;
            }
        }
        let mut request_body = vec![0u8; content_length];
        reader.read_exact(&mut request_body).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        )
        .unwrap();
        stream.flush().unwrap();

        head + &String::from_utf8_lossy(&request_body)
    });

    (url, handle)
}

fn completion_request() -> CompletionRequest {
    CompletionRequest {
        model: "qwen/qwen3-32b".to_string(),
        temperature: 0.6,
        max_tokens: 4096,
        prompt: "a tea shop".to_string(),
    }
}

#[test]
fn test_http_client_returns_first_choice() {
    let reply = json!({
        "choices": [{"message": {"role": "assistant", "content": "<h1>Tea</h1>"}}]
    })
    .to_string();
    let (url, server) = one_shot_endpoint("200 OK", reply);
    let client = HttpCompletionClient::new(url, "test-key", Duration::from_secs(5)).unwrap();

    let text = client.complete(&completion_request()).unwrap();
    let raw_request = server.join().unwrap();

    assert_eq!(text, "<h1>Tea</h1>");
    assert!(raw_request.to_ascii_lowercase().contains("authorization: bearer test-key"));
    assert!(raw_request.contains("\"model\":\"qwen/qwen3-32b\""));
    assert!(raw_request.contains("a tea shop"));
}

#[test]
fn test_http_client_empty_choices_is_empty_text() {
    let (url, server) = one_shot_endpoint("200 OK", "{\"choices\":[]}".to_string());
    let client = HttpCompletionClient::new(url, "k", Duration::from_secs(5)).unwrap();

    assert_eq!(client.complete(&completion_request()).unwrap(), "");
    server.join().unwrap();
}

#[test]
fn test_http_client_non_success_is_upstream_error() {
    let (url, server) = one_shot_endpoint(
        "503 Service Unavailable",
        "{\"error\":\"overloaded\"}".to_string(),
    );
    let client = HttpCompletionClient::new(url, "k", Duration::from_secs(5)).unwrap();

    let err = client.complete(&completion_request()).unwrap_err();
    server.join().unwrap();

    match err {
        SiteError::UpstreamGeneration { status, detail } => {
            assert_eq!(status, 503);
            assert!(detail.contains("overloaded"));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[test]
fn test_http_client_requires_key() {
    let config = Config::default();

    assert!(matches!(
        HttpCompletionClient::from_config(&config),
        Err(SiteError::Unconfigured(_))
    ));
}

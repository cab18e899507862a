//! HttpFetcher against a local hosting-API double served by warp.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use glossa_fetch::{EntryKind, FetchError, FetcherConfig, HttpFetcher, RemoteFetcher};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::time::Duration;
use warp::http::{Response, StatusCode};
use warp::hyper::Body;
use warp::Filter;

const REVISION: &str = "0123456789abcdef0123456789abcdef01234567";
const TOKEN: &str = "test-token";

fn common_json() -> Vec<u8> {
    let mut body = String::from("{\n  \"greeting\": \"こんにちは\",\n  \"nested\": {\n");
    for i in 0..40 {
        body.push_str(&format!("    \"key{i}\": \"value number {i}\",\n"));
    }
    body.push_str("    \"last\": \"end\"\n  }\n}\n");
    body.into_bytes()
}

fn wrapped_base64(bytes: &[u8]) -> String {
    let encoded = BASE64.encode(bytes);
    encoded
        .as_bytes()
        .chunks(60)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

fn respond(status: StatusCode, headers: &[(&str, &str)], body: Vec<u8>) -> Response<Body> {
    let mut builder = Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body)).unwrap()
}

fn json(value: &serde_json::Value) -> Response<Body> {
    respond(
        StatusCode::OK,
        &[("content-type", "application/json")],
        serde_json::to_vec(value).unwrap(),
    )
}

fn contents(path: &str, accept: &str, query: &HashMap<String, String>) -> Response<Body> {
    if query.get("ref").map(String::as_str) != Some(REVISION) {
        return respond(StatusCode::NOT_FOUND, &[], Vec::new());
    }
    let raw = accept.contains("raw");
    match path {
        "locales/en/common.json" => {
            let bytes = common_json();
            if raw {
                respond(StatusCode::OK, &[], bytes)
            } else {
                json(&serde_json::json!({
                    "type": "file",
                    "encoding": "base64",
                    "content": wrapped_base64(&bytes),
                }))
            }
        }
        "flaky.json" if raw => respond(StatusCode::SERVICE_UNAVAILABLE, &[], Vec::new()),
        "flaky.json" => json(&serde_json::json!({
            "encoding": "base64",
            "content": wrapped_base64(b"{\"a\":\"b\"}"),
        })),
        "limited.json" => respond(
            StatusCode::TOO_MANY_REQUESTS,
            &[("retry-after", "2")],
            Vec::new(),
        ),
        "quota.json" => respond(
            StatusCode::FORBIDDEN,
            &[("x-ratelimit-remaining", "0")],
            Vec::new(),
        ),
        "locales" => json(&serde_json::json!([
            {"name": "en", "path": "locales/en", "type": "dir"},
            {"name": "README.md", "path": "locales/README.md", "type": "file"},
            {"name": "link", "path": "locales/link", "type": "symlink"},
        ])),
        _ => respond(StatusCode::NOT_FOUND, &[], Vec::new()),
    }
}

async fn start_with_token(token: Option<&str>) -> HttpFetcher {
    let authorized = warp::header::optional::<String>("authorization")
        .and_then(|auth: Option<String>| async move {
            let expected = format!("Bearer {TOKEN}");
            if auth.as_deref() == Some(expected.as_str()) {
                Ok::<(), warp::Rejection>(())
            } else {
                Err(warp::reject::not_found())
            }
        })
        .untuple_one();

    let contents_route = warp::get()
        .and(warp::path!("repos" / String / String / "contents" / ..))
        .and(warp::path::tail())
        .and(warp::header::optional::<String>("accept"))
        .and(warp::query::<HashMap<String, String>>())
        .and(authorized.clone())
        .map(
            |_owner: String,
             _name: String,
             tail: warp::path::Tail,
             accept: Option<String>,
             query: HashMap<String, String>| {
                contents(tail.as_str(), accept.as_deref().unwrap_or(""), &query)
            },
        );

    let commits_route = warp::get()
        .and(warp::path!("repos" / String / String / "commits"))
        .and(warp::query::<HashMap<String, String>>())
        .and(authorized.clone())
        .map(|_owner: String, _name: String, query: HashMap<String, String>| {
            if query.get("path").map(String::as_str) == Some("locales/en/common.json") {
                json(&serde_json::json!([{
                    "sha": "feedface",
                    "commit": {"author": {
                        "name": "Ada",
                        "email": "ada@example.com",
                        "date": "2024-03-01T12:00:00Z"
                    }}
                }]))
            } else {
                json(&serde_json::json!([]))
            }
        });

    let resolve_route = warp::get()
        .and(warp::path!("repos" / String / String / "commits" / String))
        .and(authorized)
        .map(|_owner: String, _name: String, reference: String| {
            if reference == "main" {
                json(&serde_json::json!({"sha": REVISION}))
            } else {
                respond(StatusCode::NOT_FOUND, &[], Vec::new())
            }
        });

    let routes = contents_route.or(commits_route).or(resolve_route);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    let mut config = FetcherConfig::default().with_api_base(format!("http://{addr}"));
    if let Some(token) = token {
        config = config.with_token(token);
    }
    HttpFetcher::new(&config, "acme/site").unwrap()
}

async fn start() -> HttpFetcher {
    start_with_token(Some(TOKEN)).await
}

#[tokio::test]
async fn streaming_and_whole_body_yield_identical_bytes() {
    let fetcher = start().await;
    let streamed = fetcher
        .fetch_streaming("locales/en/common.json", REVISION)
        .await
        .unwrap();
    let whole = fetcher
        .fetch_whole("locales/en/common.json", REVISION)
        .await
        .unwrap();

    assert_eq!(streamed.content, common_json());
    assert_eq!(streamed.content, whole.content);
    assert_eq!(streamed.revision_id, REVISION);
    assert_eq!(whole.path, "locales/en/common.json");
}

#[tokio::test]
async fn fetch_falls_back_when_streaming_fails() {
    let fetcher = start().await;
    let file = fetcher.fetch("flaky.json", REVISION).await.unwrap();
    assert_eq!(file.content, b"{\"a\":\"b\"}");
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let fetcher = start().await;
    let err = fetcher.fetch("missing.json", REVISION).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn wrong_revision_is_not_found() {
    let fetcher = start().await;
    let err = fetcher
        .fetch("locales/en/common.json", "other-revision")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn rate_limits_surface_retry_after() {
    let fetcher = start().await;
    let err = fetcher.fetch_streaming("limited.json", REVISION).await.unwrap_err();
    assert_eq!(
        err,
        FetchError::RateLimited {
            retry_after: Some(Duration::from_secs(2))
        }
    );

    let err = fetcher.fetch_streaming("quota.json", REVISION).await.unwrap_err();
    assert!(matches!(err, FetchError::RateLimited { retry_after: None }));
}

#[tokio::test]
async fn list_dir_maps_entry_kinds() {
    let fetcher = start().await;
    let entries = fetcher.list_dir("locales", REVISION).await.unwrap();
    let kinds: Vec<_> = entries.iter().map(|e| (e.path.as_str(), e.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            ("locales/en", EntryKind::Dir),
            ("locales/README.md", EntryKind::File),
            ("locales/link", EntryKind::Other),
        ]
    );
}

#[tokio::test]
async fn list_dir_on_file_is_unknown_error() {
    let fetcher = start().await;
    let err = fetcher
        .list_dir("locales/en/common.json", REVISION)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Unknown(_)));
}

#[tokio::test]
async fn latest_commit_becomes_blame() {
    let fetcher = start().await;
    let blame = fetcher
        .latest_commit("locales/en/common.json", REVISION)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(blame.revision_id, "feedface");
    assert_eq!(blame.author, "Ada");
    assert_eq!(blame.email, "ada@example.com");

    let none = fetcher.latest_commit("untracked.json", REVISION).await.unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn resolve_revision_pins_branch_to_sha() {
    let fetcher = start().await;
    assert_eq!(fetcher.resolve_revision("main").await.unwrap(), REVISION);
    // full SHAs resolve without a request
    assert_eq!(fetcher.resolve_revision(REVISION).await.unwrap(), REVISION);
    assert!(fetcher
        .resolve_revision("no-such-branch")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let anonymous = start_with_token(None).await;
    let err = anonymous
        .fetch("locales/en/common.json", REVISION)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

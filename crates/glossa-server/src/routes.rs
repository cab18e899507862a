//! warp filters and handlers
//!
//! Filenames may contain `/`, so file routes take the rest of the path as
//! the filename. A trailing `/reconciled` selects the merged view.

use crate::error::reject;
use glossa_cache::{conditional, CachePolicy, Conditional, ETag, SortKey, SortOrder};
use glossa_core::{batch_hash, SourceHash};
use glossa_manifest::{ManifestEntry, ManifestHeader};
use glossa_overlay::{validate_batch, OverlayFilter, OverlayStatus, TranslationCheck, ValidationResult};
use glossa_service::{ServiceError, Submission, TranslationService};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::header::{HeaderValue, CACHE_CONTROL, ETAG};
use warp::http::StatusCode;
use warp::path::Tail;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Header naming the acting user
pub const USER_HEADER: &str = "x-user-id";

/// Largest accepted JSON body
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

const RECONCILED_SUFFIX: &str = "/reconciled";

type Shared = Arc<TranslationService>;

/// Every endpoint, with rejections recovered into JSON errors
pub fn routes(service: Shared) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let reads = health()
        .or(manifest(service.clone()))
        .unify()
        .or(files(service.clone()))
        .unify()
        .or(file(service.clone()))
        .unify()
        .or(progress(service.clone()))
        .unify()
        .or(store(service.clone()))
        .unify()
        .or(overlay_list(service.clone()))
        .unify()
        .or(history(service.clone()))
        .unify();
    let writes = submit(service.clone())
        .or(transition(service.clone()))
        .unify()
        .or(sync(service))
        .unify();
    let compute = hash().or(validate()).unify();

    reads
        .or(writes)
        .unify()
        .or(compute)
        .unify()
        .recover(crate::error::recover)
        .with(warp::trace::request())
}

fn with_service(service: Shared) -> impl Filter<Extract = (Shared,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

fn if_none_match() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Copy {
    warp::header::optional::<String>("if-none-match")
}

fn user() -> impl Filter<Extract = (String,), Error = Rejection> + Copy {
    warp::header::<String>(USER_HEADER)
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Copy
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn health() -> impl Filter<Extract = (Response,), Error = Rejection> + Copy {
    warp::get().and(warp::path!("health")).map(|| {
        warp::reply::json(&serde_json::json!({ "status": "ok", "version": crate::VERSION })).into_response()
    })
}

fn manifest(service: Shared) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path!("projects" / String / "manifest"))
        .and(if_none_match())
        .and(with_service(service))
        .and_then(get_manifest)
}

fn files(service: Shared) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path!("projects" / String / "files"))
        .and(warp::query::<ListQuery>())
        .and(if_none_match())
        .and(with_service(service))
        .and_then(list_files)
}

fn file(service: Shared) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path!("projects" / String / "files" / String / ..))
        .and(warp::path::tail())
        .and(if_none_match())
        .and(with_service(service))
        .and_then(get_file)
}

fn progress(service: Shared) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path!("projects" / String / "progress" / String))
        .and(with_service(service))
        .and_then(get_progress)
}

fn store(service: Shared) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path!("projects" / String / "store" / String))
        .and(with_service(service))
        .and_then(get_store)
}

fn overlay_list(service: Shared) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path!("projects" / String / "overlay"))
        .and(warp::query::<OverlayQuery>())
        .and(if_none_match())
        .and(with_service(service))
        .and_then(list_overlay)
}

fn history(service: Shared) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path!("projects" / String / "overlay" / String / "history"))
        .and(with_service(service))
        .and_then(get_history)
}

fn submit(service: Shared) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::post()
        .and(warp::path!("projects" / String / "overlay"))
        .and(user())
        .and(json_body::<Submission>())
        .and(with_service(service))
        .and_then(post_submission)
}

fn transition(service: Shared) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::post()
        .and(warp::path!("projects" / String / "overlay" / String / String))
        .and(user())
        .and(with_service(service))
        .and_then(post_transition)
}

fn sync(service: Shared) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::post()
        .and(warp::path!("projects" / String / "sync"))
        .and(with_service(service))
        .and_then(post_sync)
}

fn hash() -> impl Filter<Extract = (Response,), Error = Rejection> + Copy {
    warp::post()
        .and(warp::path!("hash"))
        .and(json_body::<HashRequest>())
        .map(|request: HashRequest| {
            let hashes = batch_hash(request.values.as_slice());
            warp::reply::json(&HashResponse { hashes }).into_response()
        })
}

fn validate() -> impl Filter<Extract = (Response,), Error = Rejection> + Copy {
    warp::post()
        .and(warp::path!("validate"))
        .and(json_body::<ValidateRequest>())
        .map(|request: ValidateRequest| {
            let results = validate_batch(&request.translations, &request.source_hashes);
            warp::reply::json(&ValidateResponse { results }).into_response()
        })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    sort_by: Option<String>,
    order: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlayQuery {
    language: Option<String>,
    filename: Option<String>,
    status: Option<OverlayStatus>,
}

#[derive(Debug, Deserialize)]
struct HashRequest {
    values: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HashResponse {
    hashes: Vec<SourceHash>,
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    translations: Vec<TranslationCheck>,
    source_hashes: HashMap<String, SourceHash>,
}

#[derive(Debug, Serialize)]
struct ValidateResponse {
    results: Vec<ValidationResult>,
}

#[derive(Debug, Serialize)]
struct ManifestBody<'a> {
    header: &'a ManifestHeader,
    entries: &'a [ManifestEntry],
}

async fn get_manifest(project: String, if_none_match: Option<String>, service: Shared) -> Result<Response, Rejection> {
    let manifest = service.manifest(&project).await.map_err(reject)?;
    let etag = ETag::from_timestamps(manifest.last_updated());
    let body = ManifestBody {
        header: manifest.header(),
        entries: manifest.entries(),
    };
    Ok(respond(conditional(if_none_match.as_deref(), etag, CachePolicy::Manifest, body)))
}

async fn list_files(
    project: String,
    query: ListQuery,
    if_none_match: Option<String>,
    service: Shared,
) -> Result<Response, Rejection> {
    let sort = parse_or_default::<SortKey>(query.sort_by.as_deref())?;
    let order = parse_or_default::<SortOrder>(query.order.as_deref())?;
    let summaries = service.files(&project, sort, order).await.map_err(reject)?;
    let etag = ETag::from_timestamps(summaries.iter().map(|s| s.updated_at));
    Ok(respond(conditional(if_none_match.as_deref(), etag, CachePolicy::FilePayload, summaries)))
}

async fn get_file(
    project: String,
    language: String,
    tail: Tail,
    if_none_match: Option<String>,
    service: Shared,
) -> Result<Response, Rejection> {
    let path = tail.as_str().trim_end_matches('/');
    if let Some(filename) = path.strip_suffix(RECONCILED_SUFFIX) {
        return reconciled(&service, &project, &language, filename, if_none_match.as_deref()).await;
    }
    if path.is_empty() {
        return Err(warp::reject::not_found());
    }

    let policy = CachePolicy::FilePayload;
    let etag = service.file_etag(&project, &language, path).await.map_err(reject)?;
    if let Some(response) = not_modified(if_none_match.as_deref(), etag.as_ref(), policy) {
        return Ok(response);
    }

    let payload = service
        .file(&project, &language, path)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(ServiceError::not_found(format!("{language}/{path}"))))?;
    // a cache miss was filled by the read above
    let etag = match etag {
        Some(etag) => Some(etag),
        None => service.file_etag(&project, &language, path).await.map_err(reject)?,
    };
    Ok(respond(Conditional::Fresh {
        body: payload.as_ref(),
        etag,
        policy,
    }))
}

async fn reconciled(
    service: &TranslationService,
    project: &str,
    language: &str,
    filename: &str,
    if_none_match: Option<&str>,
) -> Result<Response, Rejection> {
    let policy = CachePolicy::OverlayList;
    let etag = service.overlay_etag(project, language, filename).await.map_err(reject)?;
    if let Some(response) = not_modified(if_none_match, etag.as_ref(), policy) {
        return Ok(response);
    }

    let views = service
        .reconciled(project, language, filename)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(ServiceError::not_found(format!("{language}/{filename}"))))?;
    let etag = service.overlay_etag(project, language, filename).await.map_err(reject)?;
    Ok(respond(Conditional::Fresh { body: views, etag, policy }))
}

async fn get_progress(project: String, language: String, service: Shared) -> Result<Response, Rejection> {
    let index = service.progress(&project, &language).await.map_err(reject)?;
    Ok(warp::reply::json(&index).into_response())
}

async fn get_store(project: String, language: String, service: Shared) -> Result<Response, Rejection> {
    let store = service.store(&project, &language).await.map_err(reject)?;
    Ok(warp::reply::json(&store).into_response())
}

async fn list_overlay(
    project: String,
    query: OverlayQuery,
    if_none_match: Option<String>,
    service: Shared,
) -> Result<Response, Rejection> {
    let filter = OverlayFilter {
        project_id: project,
        language: query.language,
        filename: query.filename,
        status: query.status,
    };
    let policy = CachePolicy::OverlayList;
    let etag = service.entries_etag(&filter).await.map_err(reject)?;
    if let Some(response) = not_modified(if_none_match.as_deref(), etag.as_ref(), policy) {
        return Ok(response);
    }

    let entries = service.entries(&filter).await.map_err(reject)?;
    Ok(respond(Conditional::Fresh {
        body: entries,
        etag,
        policy,
    }))
}

async fn get_history(project: String, id: String, service: Shared) -> Result<Response, Rejection> {
    let records = service.history(&project, &id).await.map_err(reject)?;
    Ok(warp::reply::json(&records).into_response())
}

async fn post_submission(
    project: String,
    user_id: String,
    submission: Submission,
    service: Shared,
) -> Result<Response, Rejection> {
    let entry = service.submit(&project, submission, &user_id).await.map_err(reject)?;
    Ok(warp::reply::with_status(warp::reply::json(&entry), StatusCode::CREATED).into_response())
}

async fn post_transition(
    project: String,
    id: String,
    action: String,
    actor: String,
    service: Shared,
) -> Result<Response, Rejection> {
    let entry = match action.as_str() {
        "approve" => service.approve(&project, &id, &actor).await,
        "reject" => service.reject(&project, &id, &actor).await,
        "delete" => service.delete(&project, &id, &actor).await,
        _ => return Err(warp::reject::not_found()),
    }
    .map_err(reject)?;
    Ok(warp::reply::json(&entry).into_response())
}

async fn post_sync(project: String, service: Shared) -> Result<Response, Rejection> {
    let report = service.sync_service().sync(&project).await.map_err(reject)?;
    Ok(warp::reply::json(&report).into_response())
}

fn parse_or_default<T>(value: Option<&str>) -> Result<T, Rejection>
where
    T: std::str::FromStr<Err = String> + Default,
{
    value
        .map_or_else(|| Ok(T::default()), str::parse)
        .map_err(|e| reject(ServiceError::invalid(e)))
}

fn not_modified(if_none_match: Option<&str>, etag: Option<&ETag>, policy: CachePolicy) -> Option<Response> {
    match (if_none_match, etag) {
        (Some(header), Some(etag)) if etag.matches(header) => Some(respond::<()>(Conditional::NotModified {
            etag: etag.clone(),
            policy,
        })),
        _ => None,
    }
}

fn respond<T: Serialize>(outcome: Conditional<T>) -> Response {
    match outcome {
        Conditional::NotModified { etag, policy } => {
            with_validators(StatusCode::NOT_MODIFIED.into_response(), Some(&etag), policy)
        }
        Conditional::Fresh { body, etag, policy } => {
            with_validators(warp::reply::json(&body).into_response(), etag.as_ref(), policy)
        }
    }
}

fn with_validators(mut response: Response, etag: Option<&ETag>, policy: CachePolicy) -> Response {
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(policy.header_value()));
    if let Some(value) = etag.and_then(|e| HeaderValue::from_str(e.as_str()).ok()) {
        headers.insert(ETAG, value);
    }
    response
}

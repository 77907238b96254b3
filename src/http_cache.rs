use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use once_cell::sync::Lazy;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{RequestBuilder, StatusCode};

use crate::error::ApiError;
use crate::http_client::read_body;

const MAX_ENTRIES: usize = 256;

static CACHE: Lazy<Mutex<HashMap<String, CacheEntry>>> = Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: Instant,
}

/// Conditional GET keyed by `key` (normally the URL). A `304` answers from the
/// in-memory copy, so repeated polls of unchanged data cost no body transfer.
pub async fn fetch_json_cached(req: RequestBuilder, key: &str) -> Result<String, ApiError> {
    let cached_entry = lock().get(key).cloned();

    let mut req = req;
    if let Some(entry) = cached_entry.as_ref() {
        if let Some(etag) = entry.etag.as_ref() {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = entry.last_modified.as_ref() {
            req = req.header(IF_MODIFIED_SINCE, last_modified);
        }
    }

    let resp = req.send().await?;
    if resp.status() == StatusCode::NOT_MODIFIED {
        let Some(mut entry) = cached_entry else {
            return Err(ApiError::decode("received 304 without cache body"));
        };
        entry.fetched_at = Instant::now();
        let body = entry.body.clone();
        store(key, entry);
        return Ok(body);
    }

    let headers = resp.headers().clone();
    let body = read_body(resp).await?;

    let etag = headers
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let last_modified = headers
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    if etag.is_some() || last_modified.is_some() {
        store(
            key,
            CacheEntry {
                body: body.clone(),
                etag,
                last_modified,
                fetched_at: Instant::now(),
            },
        );
    }
    Ok(body)
}

fn store(key: &str, entry: CacheEntry) {
    let mut cache = lock();
    if cache.len() >= MAX_ENTRIES && !cache.contains_key(key) {
        let oldest = cache
            .iter()
            .min_by_key(|(_, e)| e.fetched_at)
            .map(|(k, _)| k.clone());
        if let Some(oldest) = oldest {
            cache.remove(&oldest);
        }
    }
    cache.insert(key.to_string(), entry);
}

fn lock() -> std::sync::MutexGuard<'static, HashMap<String, CacheEntry>> {
    CACHE.lock().expect("http cache lock poisoned")
}

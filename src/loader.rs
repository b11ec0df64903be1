//! Document loading and the process-wide document cache.
//!
//! Resolves a spec path or URL to parsed JSON. Successful parses are cached
//! by exact path/URL string; a cache hit skips I/O entirely.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::SpecError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Rewrite a GitHub blob URL to its raw-content equivalent.
///
/// `https://github.com/org/repo/blob/master/spec.json` becomes
/// `https://raw.githubusercontent.com/org/repo/master/spec.json`.
/// Anything else passes through unchanged.
pub fn rewrite_github_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://github.com/") {
        if rest.contains("blob/") {
            return format!(
                "https://raw.githubusercontent.com/{}",
                rest.replacen("blob/", "", 1)
            );
        }
    }
    url.to_string()
}

/// Remove a leading byte-order mark if present.
pub fn strip_bom(content: &str) -> &str {
    content
        .strip_prefix('\u{feff}')
        .or_else(|| content.strip_prefix('\u{fffe}'))
        .unwrap_or(content)
}

/// Directory portion of a path or URL, using forward slashes.
///
/// `"a/b/swagger.json"` gives `"a/b"`; a bare file name gives `"."`.
pub fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => ".".to_string(),
    }
}

/// Join a relative reference onto a base directory with forward slashes.
///
/// `std::path::Path::join` would flip separators on Windows, which breaks
/// URL bases, so joining is done on slash-delimited segments with `.` and
/// `..` handling. An absolute URL reference is returned as-is.
pub fn join_spec_path(base_dir: &str, relative: &str) -> String {
    if is_url(relative) {
        return relative.to_string();
    }

    let mut segments: Vec<&str> = if base_dir == "." {
        Vec::new()
    } else {
        base_dir.split('/').collect()
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Read and parse a document, without consulting any cache.
fn fetch_document(path: &str) -> Result<Value, SpecError> {
    if is_url(path) {
        return fetch_url(path);
    }

    if !std::path::Path::new(path).exists() {
        return Err(SpecError::FileNotFound {
            path: path.to_string(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| SpecError::ReadError {
        path: path.to_string(),
        source,
    })?;

    serde_json::from_str(strip_bom(&content)).map_err(|source| SpecError::InvalidJson {
        path: path.to_string(),
        source,
    })
}

#[cfg(feature = "remote")]
fn fetch_url(url: &str) -> Result<Value, SpecError> {
    let url = rewrite_github_url(url);
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|source| SpecError::NetworkError {
            url: url.clone(),
            source,
        })?;

    let response = client
        .get(&url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|source| SpecError::NetworkError {
            url: url.clone(),
            source,
        })?;

    let body = response.text().map_err(|source| SpecError::NetworkError {
        url: url.clone(),
        source,
    })?;

    serde_json::from_str(strip_bom(&body)).map_err(|source| SpecError::InvalidJson {
        path: url,
        source,
    })
}

#[cfg(not(feature = "remote"))]
fn fetch_url(url: &str) -> Result<Value, SpecError> {
    Err(SpecError::FileNotFound {
        path: url.to_string(),
    })
}

/// Cache of parsed documents, keyed by exact path/URL string.
///
/// The cache is an injected service with explicit lifecycle: create one per
/// run (or share one `Arc` across validator instances) and `clear` it to
/// isolate runs. Each path has its own slot mutex, so concurrent requests
/// for the same path perform at most one load; the second caller blocks on
/// the slot until the first load completes. Failed loads are not cached.
#[derive(Debug, Default)]
pub struct DocumentCache {
    entries: Mutex<HashMap<String, Arc<Mutex<Option<Arc<Value>>>>>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        DocumentCache::default()
    }

    /// Parsed JSON for the given path or URL, loading it on first use.
    pub fn load(&self, path: &str) -> Result<Arc<Value>, SpecError> {
        let slot = {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            entries.entry(path.to_string()).or_default().clone()
        };

        let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(doc) = guard.as_ref() {
            tracing::debug!(path, "document cache hit");
            return Ok(doc.clone());
        }

        let doc = Arc::new(fetch_document(path)?);
        *guard = Some(doc.clone());
        tracing::debug!(path, "document loaded");
        Ok(doc)
    }

    /// Drop all cached documents.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

//! # Error Policy
//!
//! Classification of watch stream errors. Every error ends the current watch
//! session; the kind only decides how loudly it is reported.

use tracing::{error, warn};

/// Broad category of a watch stream failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// 401, the controller token or RBAC went away
    Unauthorized,
    /// 410, resource version too old
    Expired,
    /// 429 or API server storage reinitializing
    Throttled,
    /// 404 on the watched kind
    NotFound,
    Other,
}

impl WatchErrorKind {
    /// Classify by message, since the watcher wraps the API error several times
    pub fn classify(error_string: &str) -> Self {
        // 404 first: a plain-text 404 body surfaces as a serde error mentioning WatchFailed
        let is_not_found = error_string.contains("ObjectNotFound")
            || error_string.contains("404")
            || error_string.contains("not found");
        if is_not_found {
            return Self::NotFound;
        }
        if error_string.contains("401") || error_string.contains("Unauthorized") {
            return Self::Unauthorized;
        }
        if error_string.contains("410")
            || error_string.contains("too old resource version")
            || error_string.contains("Expired")
            || error_string.contains("Gone")
        {
            return Self::Expired;
        }
        if error_string.contains("429")
            || error_string.contains("storage is (re)initializing")
            || error_string.contains("TooManyRequests")
        {
            return Self::Throttled;
        }
        Self::Other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "401",
            Self::Expired => "410",
            Self::Throttled => "429",
            Self::NotFound => "404",
            Self::Other => "other",
        }
    }
}

/// Log a watch stream error for `kind` and return its classification
pub fn handle_watch_stream_error(kind: &str, error: &anyhow::Error) -> WatchErrorKind {
    let error_string = format!("{error:?}");
    let classified = WatchErrorKind::classify(&error_string);

    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        resource.kind = kind,
        error_type = classified.as_str()
    );
    let _error_guard = error_span.enter();

    match classified {
        WatchErrorKind::Unauthorized => {
            error!(
                "Watch on {} failed with 401 Unauthorized, check the controller ClusterRole and its binding",
                kind
            );
        }
        WatchErrorKind::Expired => {
            warn!(
                "Watch on {} resource version expired (410), watch will restart",
                kind
            );
        }
        WatchErrorKind::Throttled => {
            warn!(
                "API server throttled the {} watch (429), watch will restart",
                kind
            );
        }
        WatchErrorKind::NotFound => {
            warn!("Watch on {} returned 404: {}", kind, error_string);
        }
        WatchErrorKind::Other => {
            error!("{} watch stream error: {}", kind, error_string);
        }
    }

    classified
}

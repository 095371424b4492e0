use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

const PREFLIGHT_MAX_AGE_SECS: u64 = 86400;

/// Credentialed CORS for the browser front-end; the session cookie must
/// travel with cross-origin requests.
///
/// With no usable origin configured, development mirrors the caller's origin
/// and production allows none.
pub fn create_cors_layer(allowed_origins: &str, production: bool) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin_policy(allowed_origins, production))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([header::CONTENT_LENGTH, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(PREFLIGHT_MAX_AGE_SECS))
}

/// Entries of a comma-separated origin list that are valid header values.
pub fn parse_origins(origins_str: &str) -> Vec<HeaderValue> {
    origins_str
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => {
                tracing::debug!("CORS: Allowing origin: {}", origin);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect()
}

fn origin_policy(origins_str: &str, production: bool) -> AllowOrigin {
    let origins = parse_origins(origins_str);

    if !origins.is_empty() {
        tracing::info!("CORS: Configured with {} allowed origin(s)", origins.len());
        AllowOrigin::list(origins)
    } else if production {
        tracing::error!("CORS: No valid origins configured, refusing all cross-origin requests");
        AllowOrigin::list(Vec::<HeaderValue>::new())
    } else {
        // Credentialed CORS cannot use a wildcard, so mirror the caller instead.
        tracing::warn!("CORS: No valid origins configured, mirroring request origin for development");
        AllowOrigin::mirror_request()
    }
}

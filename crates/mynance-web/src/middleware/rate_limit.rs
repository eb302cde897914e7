//! Per-IP rate limiting in front of every route.
//!
//! Clients are keyed by peer address. When the limiter trusts forwarding
//! headers, `X-Forwarded-For`, `X-Real-IP` or `Forwarded` win (via
//! tower_governor's `SmartIpKeyExtractor`). Requests whose IP cannot be
//! resolved share the `0.0.0.0` bucket.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use mynance_core::{Decision, RateLimiter};
use tower_governor::key_extractor::{KeyExtractor, PeerIpKeyExtractor, SmartIpKeyExtractor};

use crate::error::AppError;

pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

pub fn client_ip<B>(req: &axum::http::Request<B>, trust_forwarded: bool) -> IpAddr {
    let ip = if trust_forwarded {
        SmartIpKeyExtractor.extract(req)
    } else {
        PeerIpKeyExtractor.extract(req)
    };
    ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_ip(&req, limiter.trusts_forwarded_headers());
    let decision = limiter.check(client);

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        tracing::warn!(%client, limit = decision.limit, "rate limit exceeded");
        AppError::TooManyRequests("Too many requests".to_string()).into_response()
    };
    annotate(&mut response, decision);
    response
}

/// Nested limiters report the innermost (most specific) budget.
fn annotate(response: &mut Response, decision: Decision) {
    let headers = response.headers_mut();
    headers
        .entry(LIMIT_HEADER)
        .or_insert_with(|| HeaderValue::from(decision.limit));
    headers
        .entry(REMAINING_HEADER)
        .or_insert_with(|| HeaderValue::from(decision.remaining));
    if let Some(wait) = decision.retry_after {
        // Whole seconds, rounded up.
        let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        headers
            .entry(RETRY_AFTER)
            .or_insert_with(|| HeaderValue::from(secs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::StatusCode;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app(limiter: Arc<RateLimiter>) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(limiter, rate_limit))
    }

    fn behind_proxy(burst: u32, per_minute: u32) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(burst, per_minute).trusting_forwarded_headers(true))
    }

    fn from(ip: &str) -> Request {
        Request::builder()
            .uri("/")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    fn forwarded_from_peer() -> axum::http::Request<()> {
        let mut req = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 4000))));
        req
    }

    #[test]
    fn forwarded_header_wins_when_trusted() {
        let req = forwarded_from_peer();
        assert_eq!(client_ip(&req, true), "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn forwarded_header_ignored_by_default() {
        let req = forwarded_from_peer();
        assert_eq!(client_ip(&req, false), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn peer_address_is_the_fallback() {
        let mut req = axum::http::Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 9], 4000))));
        assert_eq!(client_ip(&req, true), IpAddr::V4(Ipv4Addr::new(192, 168, 1, 9)));
    }

    #[test]
    fn unresolvable_client_shares_unspecified_bucket() {
        let req = axum::http::Request::builder().body(()).unwrap();
        assert_eq!(client_ip(&req, false), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(client_ip(&req, true), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[tokio::test]
    async fn headers_on_allowed_and_denied() {
        let app = app(behind_proxy(2, 1));

        let first = app.clone().oneshot(from("198.51.100.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[&LIMIT_HEADER], "2");
        assert_eq!(first.headers()[&REMAINING_HEADER], "1");
        assert!(!first.headers().contains_key(RETRY_AFTER));

        app.clone().oneshot(from("198.51.100.1")).await.unwrap();
        let denied = app.clone().oneshot(from("198.51.100.1")).await.unwrap();
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(denied.headers()[&REMAINING_HEADER], "0");
        let retry: u64 = denied.headers()[RETRY_AFTER].to_str().unwrap().parse().unwrap();
        assert!((1..=60).contains(&retry));

        let other = app.oneshot(from("198.51.100.2")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn spoofed_forwarding_does_not_buy_new_buckets() {
        let limiter = Arc::new(RateLimiter::new(1, 1));
        let app = app(limiter.clone());

        let first = app.clone().oneshot(from("198.51.100.7")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let rotated = app.oneshot(from("198.51.100.8")).await.unwrap();
        assert_eq!(rotated.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test]
    async fn innermost_limiter_reports_headers() {
        let outer = behind_proxy(100, 200);
        let inner = behind_proxy(5, 5);
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(inner, rate_limit))
            .layer(from_fn_with_state(outer.clone(), rate_limit));

        let response = app.oneshot(from("198.51.100.3")).await.unwrap();
        assert_eq!(response.headers()[&LIMIT_HEADER], "5");
        assert_eq!(response.headers()[&REMAINING_HEADER], "4");
        assert_eq!(outer.len(), 1);
    }
}

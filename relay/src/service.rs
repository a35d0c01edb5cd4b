//! Inbound HTTP surface of the relay.

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue, USER_AGENT};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use shared::http::{PeerAddr, make_error_response};

use crate::client::AnalyticsSink;
use crate::errors::RelayError;
use crate::metrics_defs;
use crate::track::{self, RequestContext, TrackParams, Tracker};

pub type ServiceBody = BoxBody<Bytes, RelayError>;

pub struct RelayService<S> {
    sink: Arc<S>,
}

impl<S: AnalyticsSink + 'static> RelayService<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }
}

impl<S: AnalyticsSink + 'static> Service<Request<Incoming>> for RelayService<S> {
    type Response = Response<ServiceBody>;
    type Error = RelayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let sink = self.sink.clone();
        Box::pin(async move { Ok(route(req, sink.as_ref()).await) })
    }
}

/// Dispatch one request. The body is never read; tracking calls carry
/// everything in the query string so they work as image pixels.
async fn route<B, S: AnalyticsSink + ?Sized>(req: Request<B>, sink: &S) -> Response<ServiceBody> {
    if req.method() != Method::GET {
        return make_error_response(StatusCode::METHOD_NOT_ALLOWED);
    }

    let tracker: &'static dyn Tracker = match req.uri().path() {
        "/health" => return health_response(),
        "/track/survey" => &track::SurveyTracker,
        "/track/social" => &track::SocialTracker,
        "/track/pageview" => &track::PageviewTracker,
        _ => return make_error_response(StatusCode::NOT_FOUND),
    };

    let params: TrackParams = url::form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
        .into_owned()
        .collect();
    let ctx = request_context(&req);

    match track::handle_track(tracker, sink, &params, &ctx).await {
        Ok(result) => json_response(StatusCode::OK, &result),
        Err(e) if e.is_client_error() => {
            shared::counter!(metrics_defs::REQUESTS_REJECTED).increment(1);
            json_response(
                StatusCode::BAD_REQUEST,
                &ErrorBody {
                    error: e.to_string(),
                },
            )
        }
        Err(e) => {
            tracing::error!(path = req.uri().path(), error = %e, "request failed");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &ErrorBody {
                    error: "Internal server error".to_string(),
                },
            )
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    timestamp: String,
    service: &'static str,
}

fn health_response() -> Response<ServiceBody> {
    json_response(
        StatusCode::OK,
        &HealthBody {
            status: "healthy",
            timestamp: chrono::Utc::now().to_rfc3339(),
            service: "analytics-relay",
        },
    )
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<ServiceBody> {
    let bytes = match serde_json::to_vec(value) {
        Ok(bytes) => bytes,
        Err(_) => return make_error_response(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let mut response = Response::new(
        Full::new(Bytes::from(bytes))
            .map_err(|e| match e {})
            .boxed(),
    );
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn request_context<B>(req: &Request<B>) -> RequestContext {
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    // Behind a load balancer the forwarded chain is authoritative; the
    // socket peer is the fallback.
    let remote_addr = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| req.extensions().get::<PeerAddr>().map(|p| p.0.ip().to_string()))
        .unwrap_or_default();

    RequestContext {
        user_agent,
        remote_addr,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

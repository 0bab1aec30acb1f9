//! Request handling for the registry API

use crate::payload::parse_registration;
use crate::render::{directory_html, directory_json};
use crate::ApiError;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, ACCEPT, ALLOW, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use registry_core::ServiceRegistry;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::sync::Arc;
use tracing::{debug, warn};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";
const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4";

/// Largest registration body accepted, in bytes
pub const MAX_REGISTRATION_BODY: usize = 64 * 1024;

/// HTTP front end for a [`ServiceRegistry`]
pub struct RegistryApi {
    registry: Arc<ServiceRegistry>,
}

impl RegistryApi {
    /// Create a new API over a shared registry
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// Get the service registry
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Route and answer a single request
    pub async fn handle<B>(&self, req: Request<B>) -> Result<Response<Full<Bytes>>, Infallible>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!("{} {}", method, path);

        let route = match path.as_str() {
            "/" | "/register" | "/api/endpoints" | "/healthz" | "/metrics" => path.as_str(),
            _ => "other",
        };
        self.registry
            .metrics()
            .http_requests_total
            .with_label_values(&[method.as_str(), route])
            .inc();

        let response = match (&method, path.as_str()) {
            (&Method::GET | &Method::POST, "/register") => self.register(req).await,
            (_, "/register") => method_not_allowed("GET, POST"),
            (&Method::GET, "/") if prefers_json(&req) => self.directory_json().await,
            (&Method::GET, "/") => self.directory_html().await,
            (&Method::GET, "/api/endpoints") => self.directory_json().await,
            (&Method::GET, "/healthz") => text(StatusCode::OK, "OK\n"),
            (&Method::GET, "/metrics") => self.metrics(),
            (_, "/" | "/api/endpoints" | "/healthz" | "/metrics") => method_not_allowed("GET"),
            _ => text(StatusCode::NOT_FOUND, format!("Not Found: {}\n", path)),
        };

        Ok(response)
    }

    async fn register<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        match self.try_register(req).await {
            Ok(()) => response(StatusCode::OK, TEXT_PLAIN, Bytes::new()),
            Err(e) => {
                if !matches!(e, ApiError::Rejected(_)) {
                    // The registry counts the rejections it sees itself
                    self.registry
                        .metrics()
                        .registrations_total
                        .with_label_values(&["rejected"])
                        .inc();
                }
                warn!("Rejected registration: {}", e);
                text(e.status(), format!("{}\n", e))
            }
        }
    }

    async fn try_register<B>(&self, req: Request<B>) -> Result<(), ApiError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let query = req.uri().query().map(str::to_string);

        let body = Limited::new(req.into_body(), MAX_REGISTRATION_BODY)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    ApiError::PayloadTooLarge(MAX_REGISTRATION_BODY)
                } else {
                    ApiError::Body(e.to_string())
                }
            })?
            .to_bytes();

        let endpoint = parse_registration(content_type.as_deref(), query.as_deref(), &body)?;
        self.registry.add(endpoint).await?;
        Ok(())
    }

    async fn directory_html(&self) -> Response<Full<Bytes>> {
        let snapshot = self.registry.snapshot().await;
        match directory_html(&snapshot) {
            Ok(html) => response(StatusCode::OK, TEXT_HTML, html),
            Err(e) => {
                warn!("Failed to render directory: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n")
            }
        }
    }

    async fn directory_json(&self) -> Response<Full<Bytes>> {
        let snapshot = self.registry.snapshot().await;
        match directory_json(&snapshot) {
            Ok(json) => response(StatusCode::OK, APPLICATION_JSON, json),
            Err(e) => {
                warn!("Failed to render directory: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n")
            }
        }
    }

    fn metrics(&self) -> Response<Full<Bytes>> {
        match self.registry.metrics().gather() {
            Ok(metrics) => response(StatusCode::OK, PROMETHEUS_TEXT, metrics),
            Err(e) => {
                warn!("Failed to gather metrics: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to gather metrics\n")
            }
        }
    }
}

fn prefers_json<B>(req: &Request<B>) -> bool {
    req.headers()
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains(APPLICATION_JSON) && !accept.contains("text/html"))
}

fn response(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    response(status, TEXT_PLAIN, body)
}

fn method_not_allowed(allow: &'static str) -> Response<Full<Bytes>> {
    let mut response = text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed\n");
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(allow));
    response
}

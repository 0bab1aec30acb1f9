//! Pages served by the registrant

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use minijinja::{context, Environment};
use std::convert::Infallible;
use tracing::{info, warn};

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="UTF-8">
    <title>Dynamic Port Server</title>
  </head>
  <body>
    <h1>{{ name }}</h1>
    <p>{{ address }}</p>
  </body>
</html>
"#;

/// Identity shown on the index page
pub struct InstanceInfo {
    pub name: String,
    pub advertised_addr: String,
}

pub async fn handle_request<B>(
    req: Request<B>,
    instance: &InstanceInfo,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/healthz") => {
            info!(
                "\"{} {} {:?}\" {}",
                req.method(),
                req.uri().path(),
                req.version(),
                req.headers()
                    .get("user-agent")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-")
            );
            text(StatusCode::OK, "text/plain; charset=utf-8", "OK\n")
        }
        (&Method::GET, "/") => match index_page(instance) {
            Ok(page) => text(StatusCode::OK, "text/html; charset=utf-8", page),
            Err(e) => {
                warn!("Failed to render index page: {}", e);
                text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain; charset=utf-8",
                    "Internal Server Error\n",
                )
            }
        },
        _ => text(StatusCode::NOT_FOUND, "text/plain; charset=utf-8", "Not Found\n"),
    };
    Ok(response)
}

fn index_page(instance: &InstanceInfo) -> Result<String, minijinja::Error> {
    Environment::new().render_named_str(
        "index.html",
        INDEX_TEMPLATE,
        context! { name => &instance.name, address => &instance.advertised_addr },
    )
}

fn text(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

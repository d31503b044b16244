//! Upstream request construction.
//!
//! # Responsibilities
//! - Map the inbound path and query onto the backend base URL
//! - Copy method and headers verbatim
//! - Fix up framing headers for buffered bodies
//!
//! # Design Decisions
//! - Outbound requests are always HTTP/1.1 (the pooled client speaks HTTP/1)
//! - Host is copied from the caller, like every other header

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Request, Uri, Version};
use url::Url;

use crate::http::error::BuildError;

/// Backend address every request is forwarded to.
#[derive(Debug, Clone)]
pub struct Upstream {
    /// `http://host[:port]`
    origin: String,
    /// Base path without trailing slash, possibly empty.
    base_path: String,
}

/// Outgoing request body.
#[derive(Debug)]
pub enum Outbound {
    /// Normalized body, fully buffered.
    Buffered(Bytes),
    /// Caller's body, relayed as it arrives.
    Streaming(Body),
}

impl Upstream {
    pub fn new(base_url: &str) -> Result<Self, BuildError> {
        let url = Url::parse(base_url)?;
        let host = match url.host_str() {
            Some(host) if url.scheme() == "http" => host,
            _ => return Err(BuildError::UnsupportedBackend(base_url.to_string())),
        };
        let origin = match url.port() {
            Some(port) => format!("http://{host}:{port}"),
            None => format!("http://{host}"),
        };

        Ok(Self {
            origin,
            base_path: url.path().trim_end_matches('/').to_string(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Backend URI for an inbound request URI.
    pub fn uri(&self, inbound: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = inbound.path_and_query().map_or("/", |pq| pq.as_str());
        let uri = format!("{}{}{}", self.origin, self.base_path, path_and_query).parse::<Uri>()?;
        Ok(uri)
    }

    /// Build the backend request from the caller's request head.
    pub fn request(&self, parts: &Parts, body: Outbound) -> Result<Request<Body>, axum::http::Error> {
        let mut builder = Request::builder()
            .method(parts.method.clone())
            .uri(self.uri(&parts.uri)?)
            .version(Version::HTTP_11);

        if let Some(headers) = builder.headers_mut() {
            for (name, value) in parts.headers.iter() {
                headers.append(name.clone(), value.clone());
            }
        }

        match body {
            Outbound::Buffered(bytes) => {
                if let Some(headers) = builder.headers_mut() {
                    headers.remove(TRANSFER_ENCODING);
                    headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                }
                builder.body(Body::from(bytes))
            }
            Outbound::Streaming(body) => builder.body(body),
        }
    }
}

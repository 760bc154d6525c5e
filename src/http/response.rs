//! Handler responses and their transcription onto the transport.
//!
//! # Responsibilities
//! - Carry status code, status text, headers and an optional body stream
//! - Transcribe all of it verbatim onto the transport response
//! - Stream handler bodies without buffering the whole payload
//!
//! # Design Decisions
//! - A custom status text is sent as the HTTP/1 reason phrase
//! - A missing body ends the response with no payload
//! - Error responses never carry internal failure detail

use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::StatusCode;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use hyper::ext::ReasonPhrase;

/// Boxed error type yielded by response body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Byte stream produced by a handler.
pub type BodyStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// Response produced by a route handler.
pub struct Response {
    status: StatusCode,
    status_text: Option<String>,
    headers: HeaderMap,
    body: Option<BodyStream>,
}

impl Response {
    /// A response with the given status, no headers and no body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            status_text: None,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The status text: the custom one if set, else the canonical reason.
    pub fn status_text(&self) -> &str {
        self.status_text
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = Some(text.into());
        self
    }

    /// Append a header value; repeated names keep every value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Set a fixed body.
    pub fn bytes(mut self, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        self.body = Some(stream::once(async move { Ok(body) }).boxed());
        self
    }

    /// Set a UTF-8 text body, defaulting the content type to `text/plain`.
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.default_content_type("text/plain; charset=utf-8");
        self.bytes(body.into())
    }

    /// Set a JSON body.
    pub fn json(mut self, value: &serde_json::Value) -> Self {
        self.default_content_type("application/json");
        self.bytes(value.to_string())
    }

    /// Set a streaming body.
    pub fn stream(mut self, body: BodyStream) -> Self {
        self.body = Some(body);
        self
    }

    /// Take the body stream, leaving the response without one.
    pub fn take_body(&mut self) -> Option<BodyStream> {
        self.body.take()
    }

    fn default_content_type(&mut self, value: &'static str) {
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(value));
        }
    }

    /// Transcribe onto the transport.
    ///
    /// `retain` is kept alive until the body stream has been fully written
    /// or dropped by the transport.
    pub fn into_transport<R>(self, retain: R) -> axum::response::Response
    where
        R: Send + 'static,
    {
        let body = match self.body {
            None => {
                drop(retain);
                Body::empty()
            }
            Some(stream) => Body::from_stream(stream.map(move |chunk| {
                let _ = &retain;
                chunk
            })),
        };

        let mut response = axum::response::Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;

        if let Some(text) = self.status_text {
            if Some(text.as_str()) != self.status.canonical_reason() {
                match ReasonPhrase::try_from(text) {
                    Ok(reason) => {
                        response.extensions_mut().insert(reason);
                    }
                    Err(_) => tracing::warn!(
                        status = self.status.as_u16(),
                        "Handler status text is not a valid reason phrase; using the canonical one"
                    ),
                }
            }
        }

        response
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("status_text", &self.status_text())
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Bare status response used for dispatch failures.
pub(crate) fn status_only(status: StatusCode) -> axum::response::Response {
    let mut response = axum::response::Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

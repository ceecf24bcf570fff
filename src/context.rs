use std::collections::BTreeMap;

use actix_web::{dev::Payload, http::Method, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{ready, Ready};
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::ApiError;

/// Cookie name to value, one entry per name.
pub type CookieMap = BTreeMap<String, String>;

/// Request body after the parsing middleware has run.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ParsedBody {
    /// No body, or a content type the parser leaves alone.
    #[default]
    Empty,
    Json(Value),
    /// URL-encoded form, expanded into nested objects and arrays.
    Form(Value),
}

impl ParsedBody {
    pub fn value(&self) -> Option<&Value> {
        match self {
            ParsedBody::Empty => None,
            ParsedBody::Json(value) | ParsedBody::Form(value) => Some(value),
        }
    }
}

/// Everything a handler may read about the inbound request, built once per
/// request by [`crate::middleware::RequestParser`].
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    path: String,
    cookies: CookieMap,
    body: ParsedBody,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>, cookies: CookieMap, body: ParsedBody) -> Self {
        Self {
            method,
            path: path.into(),
            cookies,
            body,
        }
    }

    #[cfg(test)]
    pub fn cookies(&self) -> &CookieMap {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    #[cfg(test)]
    pub fn body(&self) -> &ParsedBody {
        &self.body
    }

    /// Deserialize the parsed body into a typed request. An absent body is
    /// treated as an empty object so that missing fields surface as validation
    /// errors rather than a separate code path.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let value = self
            .body
            .value()
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        serde_json::from_value(value).map_err(|e| {
            debug!("Rejected body for {} {}: {}", self.method, self.path, e);
            ApiError::bad_request(format!("Invalid request body: {}", e))
        })
    }
}

impl FromRequest for RequestContext {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(req.extensions().get::<RequestContext>().cloned().ok_or_else(|| {
            ApiError::internal("Request context missing: request parser middleware is not installed")
        }))
    }
}

use std::rc::Rc;

use actix_web::{
    body::{EitherBody, MessageBody},
    cookie::Cookie,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    error::PayloadError,
    http::header::{self, HeaderMap},
    web::BytesMut,
    Error, HttpMessage,
};
use futures_util::{
    future::{ok, LocalBoxFuture, Ready},
    StreamExt,
};
use log::debug;

use super::urlencoded;
use crate::{
    context::{CookieMap, ParsedBody, RequestContext},
    errors::ApiError,
};

/// Upper bounds for buffered request bodies, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimits {
    pub json: usize,
    pub form: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFormat {
    Json,
    Form,
}

/// Builds the [`RequestContext`] for every request before routing: cookies
/// first, then a size-bounded JSON or URL-encoded body.
pub struct RequestParser {
    limits: BodyLimits,
}

impl RequestParser {
    pub fn new(limits: BodyLimits) -> Self {
        Self { limits }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestParser
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequestParserMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequestParserMiddleware {
            service: Rc::new(service),
            limits: self.limits,
        })
    }
}

pub struct RequestParserMiddleware<S> {
    service: Rc<S>,
    limits: BodyLimits,
}

impl<S, B> Service<ServiceRequest> for RequestParserMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limits = self.limits;

        Box::pin(async move {
            let cookies = parse_cookies(req.headers());
            let body = match read_body(&mut req, limits).await {
                Ok(body) => body,
                // Short-circuit before routing; the error stays attached for the normalizer.
                Err(err) => return Ok(req.error_response(err).map_into_right_body()),
            };

            let context = RequestContext::new(req.method().clone(), req.path(), cookies, body);
            req.extensions_mut().insert(context);

            service.call(req).await.map(ServiceResponse::map_into_left_body)
        })
    }
}

/// Split every `Cookie` header into name/value pairs. Malformed pairs are
/// skipped; when a name repeats the first occurrence wins.
pub fn parse_cookies(headers: &HeaderMap) -> CookieMap {
    let mut cookies = CookieMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else {
            debug!("Skipping non-ASCII Cookie header");
            continue;
        };
        for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            match Cookie::parse_encoded(pair) {
                Ok(cookie) => {
                    cookies
                        .entry(cookie.name().to_string())
                        .or_insert_with(|| cookie.value().to_string());
                }
                Err(e) => debug!("Skipping malformed cookie '{}': {}", pair, e),
            }
        }
    }
    cookies
}

fn body_format(req: &ServiceRequest) -> Option<BodyFormat> {
    let content_type = req.content_type().to_ascii_lowercase();
    if content_type == "application/json" || content_type.ends_with("+json") {
        Some(BodyFormat::Json)
    } else if content_type == "application/x-www-form-urlencoded" {
        Some(BodyFormat::Form)
    } else {
        None
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn too_large(limit: usize) -> ApiError {
    ApiError::payload_too_large(format!("Request body exceeds the {} byte limit", limit))
}

async fn read_body(req: &mut ServiceRequest, limits: BodyLimits) -> Result<ParsedBody, ApiError> {
    let Some(format) = body_format(req) else {
        return Ok(ParsedBody::Empty);
    };
    let limit = match format {
        BodyFormat::Json => limits.json,
        BodyFormat::Form => limits.form,
    };

    if declared_length(req.headers()).is_some_and(|len| len > limit) {
        return Err(too_large(limit));
    }

    let mut payload = req.take_payload();
    let mut bytes = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| match e {
            PayloadError::Overflow => too_large(limit),
            other => ApiError::bad_request(format!("Could not read request body: {}", other)),
        })?;
        if bytes.len() + chunk.len() > limit {
            return Err(too_large(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if bytes.is_empty() {
        return Ok(ParsedBody::Empty);
    }

    match format {
        BodyFormat::Json => serde_json::from_slice(&bytes)
            .map(ParsedBody::Json)
            .map_err(|e| ApiError::bad_request(format!("Malformed JSON body: {}", e))),
        BodyFormat::Form => urlencoded::decode(&bytes).map(ParsedBody::Form),
    }
}

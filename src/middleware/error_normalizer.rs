use std::rc::Rc;

use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::{
        header::{self, HeaderMap},
        StatusCode,
    },
    Error, HttpRequest,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use log::{error, warn};

use crate::{
    config::Environment,
    errors::{ApiError, ErrorKind},
};

/// Terminal error handler: the only place error responses are written and logged.
///
/// Every failure below this layer, whether an `Err` from a service, a response
/// carrying an attached error, or a bare 4xx/5xx response, is converted into
/// the `{"success": false, "message": ...}` envelope with the status of its
/// [`ErrorKind`].
pub struct ErrorNormalizer {
    expose_internal: bool,
}

impl ErrorNormalizer {
    pub fn new(environment: Environment) -> Self {
        Self {
            expose_internal: environment != Environment::Production,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ErrorNormalizer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ErrorNormalizerMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ErrorNormalizerMiddleware {
            service: Rc::new(service),
            expose_internal: self.expose_internal,
        })
    }
}

pub struct ErrorNormalizerMiddleware<S> {
    service: Rc<S>,
    expose_internal: bool,
}

impl<S, B> Service<ServiceRequest> for ErrorNormalizerMiddleware<S>
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

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let http_req = req.request().clone();
        let expose_internal = self.expose_internal;
        let fut = self.service.call(req);

        Box::pin(async move {
            let res = match fut.await {
                Ok(res) => res,
                Err(err) => {
                    let api_error = ApiError::from_actix(&err);
                    return Ok(render(http_req, None, &api_error, expose_internal));
                }
            };

            let normalized = match res.response().error() {
                Some(err) => Some(ApiError::from_actix(err)),
                None if res.status().is_client_error() || res.status().is_server_error() => {
                    Some(from_bare_status(res.request(), res.status()))
                }
                None => None,
            };

            match normalized {
                None => Ok(res.map_into_left_body()),
                Some(api_error) => {
                    let headers = res.headers().clone();
                    let (req, _) = res.into_parts();
                    Ok(render(req, Some(&headers), &api_error, expose_internal))
                }
            }
        })
    }
}

/// Error statuses produced by the framework itself. A method mismatch is an
/// unmatched route like any other.
fn from_bare_status(req: &HttpRequest, status: StatusCode) -> ApiError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => route_not_found(req),
        _ => ApiError::new(
            ErrorKind::from_status(status),
            status.canonical_reason().unwrap_or("Request failed"),
        ),
    }
}

pub fn route_not_found(req: &HttpRequest) -> ApiError {
    ApiError::not_found(format!("Route not found: {} {}", req.method(), req.path()))
}

fn render<B>(
    req: HttpRequest,
    original_headers: Option<&HeaderMap>,
    api_error: &ApiError,
    expose_internal: bool,
) -> ServiceResponse<EitherBody<B>> {
    let status = api_error.kind.status_code();
    let details = api_error
        .details
        .as_ref()
        .map(|d| format!(" {}", d))
        .unwrap_or_default();
    if status.is_server_error() {
        error!(
            "{} {} -> {} {:?}: {}{}",
            req.method(),
            req.path(),
            status.as_u16(),
            api_error.kind,
            api_error.message,
            details
        );
    } else {
        warn!(
            "{} {} -> {} {:?}: {}{}",
            req.method(),
            req.path(),
            status.as_u16(),
            api_error.kind,
            api_error.message,
            details
        );
    }

    let mut response = api_error.to_response(expose_internal);
    if let Some(headers) = original_headers {
        for (name, value) in headers.iter() {
            if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
                response.headers_mut().append(name.clone(), value.clone());
            }
        }
    }

    ServiceResponse::new(req, response).map_into_right_body()
}

use std::{rc::Rc, time::Duration};

use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    rt::time::timeout,
    Error, HttpResponse,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};

use crate::errors::ApiError;

/// Abandons a request whose downstream pipeline runs longer than `duration`
/// and answers with a `Timeout` error instead of leaving the client hanging.
pub struct RequestTimeout {
    duration: Duration,
}

impl RequestTimeout {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestTimeout
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequestTimeoutMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequestTimeoutMiddleware {
            service: Rc::new(service),
            duration: self.duration,
        })
    }
}

pub struct RequestTimeoutMiddleware<S> {
    service: Rc<S>,
    duration: Duration,
}

impl<S, B> Service<ServiceRequest> for RequestTimeoutMiddleware<S>
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
        let duration = self.duration;
        let fut = self.service.call(req);

        Box::pin(async move {
            match timeout(duration, fut).await {
                Ok(res) => res.map(ServiceResponse::map_into_left_body),
                Err(_) => {
                    let err = ApiError::timeout(format!(
                        "Request did not complete within {} seconds",
                        duration.as_secs()
                    ));
                    let response = HttpResponse::from_error(err);
                    Ok(ServiceResponse::new(http_req, response).map_into_right_body())
                }
            }
        })
    }
}

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, ResponseError,
};
use futures_util::future::LocalBoxFuture;
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::future::{ready, Ready};
use std::num::NonZeroU32;
use std::rc::Rc;
use std::sync::Arc;

use crate::core::AppError;

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Probes are never throttled
const EXEMPT_PATHS: [&str; 3] = ["/", "/health", "/ready"];

/// Global request budget for the HTTP surface, independent of the
/// per-submission limiter that gates run launches
///
/// Clones share one quota. Build it once and clone it into each worker's
/// `App` so the budget is not multiplied by the worker count.
#[derive(Clone)]
pub struct IngressRateLimiter {
    limiter: Arc<DirectLimiter>,
    clock: DefaultClock,
}

impl IngressRateLimiter {
    /// A zero budget is treated as one request per minute
    pub fn new(requests_per_minute: u32) -> Self {
        let quota =
            Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
        let clock = DefaultClock::default();
        let limiter = Arc::new(GovernorRateLimiter::direct(quota));

        Self { limiter, clock }
    }
}

impl<S, B> Transform<S, ServiceRequest> for IngressRateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<actix_web::body::BoxBody, B>>;
    type Error = Error;
    type InitError = ();
    type Transform = IngressRateLimiterMiddleware<S>;
    type Future = Ready<std::result::Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IngressRateLimiterMiddleware {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            clock: self.clock.clone(),
        }))
    }
}

pub struct IngressRateLimiterMiddleware<S> {
    service: Rc<S>,
    limiter: Arc<DirectLimiter>,
    clock: DefaultClock,
}

impl<S, B> Service<ServiceRequest> for IngressRateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<actix_web::body::BoxBody, B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let limiter = self.limiter.clone();
        let now = self.clock.now();

        Box::pin(async move {
            if EXEMPT_PATHS.contains(&req.path()) {
                return svc.call(req).await.map(|res| res.map_into_right_body());
            }

            match limiter.check() {
                Ok(_) => svc.call(req).await.map(|res| res.map_into_right_body()),
                Err(not_until) => {
                    let wait = not_until.wait_time_from(now);
                    tracing::warn!(
                        path = %req.path(),
                        wait_ms = wait.as_millis() as u64,
                        "Ingress rate limit exceeded"
                    );
                    let error_response = AppError::RateLimited {
                        wait_ms: wait.as_millis() as u64,
                    }
                    .error_response();
                    Ok(req.into_response(error_response).map_into_left_body())
                }
            }
        })
    }
}

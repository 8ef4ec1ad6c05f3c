//! Actix middleware that opens the server-side span for every request.
//!
//! The wrapper extracts the caller's B3 context (or roots a fresh trace),
//! opens a server span named after the matched route, parks an
//! [`ActiveSpan`] in the request extensions for handlers, and finishes the
//! span on every exit path. If the request future is dropped before a
//! response exists, the span finishes through its drop.

use std::{cell::RefCell, rc::Rc, task::Context};

use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::{future::LocalBoxFuture, FutureExt};
use futures_util::future::{ok, Ready};
use std::task::Poll;

use crate::propagation::{b3, ActixHeaderExtractor};
use crate::span::{tag, ActiveSpan};
use crate::tracer::Tracer;

#[derive(Clone)]
pub struct TraceWrapper {
    tracer: Tracer,
    name: Option<String>,
}

impl TraceWrapper {
    /// Wrap with spans named `"{method} {route}"` from the matched route.
    pub fn new(tracer: &Tracer) -> Self {
        TraceWrapper {
            tracer: tracer.clone(),
            name: None,
        }
    }

    /// Wrap with a fixed span name, e.g. for a scope with one purpose.
    pub fn named(tracer: &Tracer, name: &str) -> Self {
        TraceWrapper {
            tracer: tracer.clone(),
            name: Some(name.to_owned()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TraceWrapper
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = TraceMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(TraceMiddleware {
            service: Rc::new(RefCell::new(service)),
            tracer: self.tracer.clone(),
            name: self.name.clone(),
        })
    }
}

pub struct TraceMiddleware<S> {
    service: Rc<RefCell<S>>,
    tracer: Tracer,
    name: Option<String>,
}

impl<S, B> Service<ServiceRequest> for TraceMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, sreq: ServiceRequest) -> Self::Future {
        let extracted = b3::extract(&ActixHeaderExtractor(sreq.headers()));
        let debug = b3::extract_debug(&ActixHeaderExtractor(sreq.headers()));
        let name = self.name.clone().unwrap_or_else(|| {
            let route = sreq
                .match_pattern()
                .unwrap_or_else(|| "unknown".to_owned());
            format!("{} {route}", sreq.method())
        });

        let mut span = self.tracer.server_span(&name, extracted);
        span.set_tag(tag::HTTP_METHOD, sreq.method().as_str());
        if debug {
            span.set_debug(true);
        }
        let active = ActiveSpan::new(span);
        sreq.extensions_mut().insert(active.clone());

        let fut = self.service.call(sreq);

        async move {
            match fut.await {
                Ok(resp) => {
                    // Handler errors surface as responses carrying the
                    // original error, same place the Logger middleware
                    // looks for them
                    if let Some(err) = resp.response().error() {
                        active.set_tag(tag::ERROR, &err.to_string());
                    }
                    active.set_tag(tag::HTTP_STATUS_CODE, resp.status().as_str());
                    active.finish();
                    Ok(resp)
                }
                Err(err) => {
                    active.set_tag(tag::ERROR, &err.to_string());
                    active.set_tag(
                        tag::HTTP_STATUS_CODE,
                        err.as_response_error().status_code().as_str(),
                    );
                    active.finish();
                    Err(err)
                }
            }
        }
        .boxed_local()
    }
}

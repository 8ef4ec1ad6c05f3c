//! Wrapping outbound resource calls (databases, caches, downstream
//! services) in a resource-kind child span.
//!
//! The wrapper is deliberately thin: it opens the child span, tags it with
//! the peer attributes, runs the body, and lets RAII close the span on
//! every exit path. It never retries and never touches the body's result.

use std::future::Future;

use crate::span::{tag, ActiveSpan, Kind, Span};
use crate::tracer::Tracer;

/// Description of a single outbound call. Consumed per call site.
#[derive(Clone, Debug)]
pub struct OuterCall {
    pub op_name: String,
    pub peer_service: String,
    pub peer_hostname: String,
    pub peer_port: u16,
    /// One caller-supplied tag, e.g. the query being issued.
    pub tag_key: String,
    pub tag_value: String,
}

impl Tracer {
    /// Run `body` inside a resource span that is a child of `parent`.
    ///
    /// The span finishes when `body` returns, errors, or panics; the
    /// result is handed back untouched either way.
    pub fn outer_call<R>(
        &self,
        parent: &ActiveSpan,
        call: &OuterCall,
        body: impl FnOnce() -> R,
    ) -> R {
        let _span = self.outbound_span(parent, call);
        body()
    }

    /// [`Tracer::outer_call`] for async bodies. Dropping the returned
    /// future before completion still finishes the span.
    pub async fn outer_call_async<R>(
        &self,
        parent: &ActiveSpan,
        call: &OuterCall,
        body: impl Future<Output = R>,
    ) -> R {
        let _span = self.outbound_span(parent, call);
        body.await
    }

    fn outbound_span(&self, parent: &ActiveSpan, call: &OuterCall) -> Span {
        let mut span = self.start_span(&call.op_name, Kind::Resource, Some(&parent.context()));
        span.set_tag(tag::PEER_SERVICE, &call.peer_service);
        span.set_tag(tag::PEER_HOSTNAME, &call.peer_hostname);
        span.set_tag(tag::PEER_PORT, &call.peer_port.to_string());
        span.set_tag(&call.tag_key, &call.tag_value);
        span
    }
}

//! Carrier traits and the B3 multi-header codec.
//!
//! The codec reads and writes the Zipkin B3 headers:
//!
//! * `x-b3-traceid`: 16 or 32 lowercase hex digits
//! * `x-b3-spanid`: 16 lowercase hex digits
//! * `x-b3-parentspanid`: 16 lowercase hex digits, optional
//! * `x-b3-sampled`: `1`/`0` (missing means sampled)
//! * `x-b3-flags`: `1` marks a debug trace, which is always sampled
//!
//! Carriers are anything header-shaped. Inbound actix requests go through
//! [`ActixHeaderExtractor`]; plain `HashMap`s work on both sides, which is
//! what outbound clients typically stage headers in.

use std::collections::HashMap;

use actix_http::header::HeaderMap;

use crate::context::{SpanId, TraceContext, TraceId};

/// Read-only view of a carrier's headers.
pub trait Extractor {
    fn get(&self, key: &str) -> Option<&str>;
}

/// Write view of a carrier's headers.
pub trait Injector {
    fn set(&mut self, key: &str, value: String);
}

/// [`Extractor`] over actix header maps.
pub struct ActixHeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for ActixHeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }
}

impl Extractor for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }
}

impl Injector for HashMap<String, String> {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_owned(), value);
    }
}

pub mod b3 {
    use super::*;

    pub const TRACE_ID_HEADER: &str = "x-b3-traceid";
    pub const SPAN_ID_HEADER: &str = "x-b3-spanid";
    pub const PARENT_SPAN_ID_HEADER: &str = "x-b3-parentspanid";
    pub const SAMPLED_HEADER: &str = "x-b3-sampled";
    pub const FLAGS_HEADER: &str = "x-b3-flags";

    /// Decode a [`TraceContext`] from B3 headers.
    ///
    /// Returns `None` when the required headers are absent or any present
    /// header is malformed; callers start a fresh root trace in that case
    /// rather than failing the request.
    pub fn extract(carrier: &impl Extractor) -> Option<TraceContext> {
        let trace_id: TraceId = carrier.get(TRACE_ID_HEADER)?.parse().ok()?;
        let span_id: SpanId = carrier.get(SPAN_ID_HEADER)?.parse().ok()?;
        let parent_span_id = match carrier.get(PARENT_SPAN_ID_HEADER) {
            Some(raw) => Some(raw.parse().ok()?),
            None => None,
        };
        let sampled = extract_debug(carrier)
            || match carrier.get(SAMPLED_HEADER) {
                Some("0") | Some("false") => false,
                _ => true,
            };
        Some(TraceContext {
            trace_id,
            span_id,
            parent_span_id,
            sampled,
        })
    }

    /// Whether the carrier marks this a debug trace.
    pub fn extract_debug(carrier: &impl Extractor) -> bool {
        carrier.get(FLAGS_HEADER) == Some("1")
    }

    /// Encode `ctx` into B3 headers on the carrier.
    pub fn inject(ctx: &TraceContext, carrier: &mut impl Injector) {
        carrier.set(TRACE_ID_HEADER, ctx.trace_id.to_string());
        carrier.set(SPAN_ID_HEADER, ctx.span_id.to_string());
        if let Some(parent) = ctx.parent_span_id {
            carrier.set(PARENT_SPAN_ID_HEADER, parent.to_string());
        }
        carrier.set(
            SAMPLED_HEADER,
            if ctx.sampled { "1" } else { "0" }.to_owned(),
        );
    }
}

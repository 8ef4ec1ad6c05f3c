//! Span lifecycle and the request-scoped handle handed to handlers.
//!
//! A [`Span`] moves through exactly two states: live, then finished.
//! Finishing is idempotent and happens at the latest when the span is
//! dropped, so every span reaches the exporter exactly once on every exit
//! path, including panics and dropped request futures. Mutating a finished
//! span is a silent no-op; the exported record is the finish-time snapshot.

use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use futures::future::{self, Ready};
use serde_derive::Serialize;
use strum::Display;
use tokio::sync::mpsc::UnboundedSender;

use crate::context::TraceContext;
use crate::errors::{TraceError, TraceErrorKind};
use crate::export::{Endpoint, ExportMsg, SpanRecord};
use crate::util::timing::us_since_epoch;

/// Well-known tag names.
pub mod tag {
    pub const PEER_SERVICE: &str = "peer.service";
    pub const PEER_HOSTNAME: &str = "peer.hostname";
    pub const PEER_PORT: &str = "peer.port";
    pub const SPAN_KIND: &str = "span.kind";
    pub const HTTP_METHOD: &str = "http.method";
    pub const HTTP_STATUS_CODE: &str = "http.status_code";
    pub const ERROR: &str = "error";
}

/// The role a span plays in an RPC or resource access.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Kind {
    Client,
    Server,
    Producer,
    Consumer,
    /// Access to a non-RPC backend such as a database or cache. The wire
    /// format has no kind for these; they are exported without a `kind`
    /// field and with a `span.kind=resource` tag instead.
    Resource,
}

impl Kind {
    pub fn is_resource(&self) -> bool {
        matches!(self, Kind::Resource)
    }
}

impl serde::Serialize for Kind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A timestamped note attached to a span.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Annotation {
    #[serde(rename = "timestamp")]
    pub timestamp_us: u64,
    pub value: String,
}

/// A timed unit of work within a trace.
///
/// Spans are minted by the [`crate::tracer::Tracer`] and finish on
/// [`Span::finish`] or drop, whichever comes first.
#[derive(Debug)]
pub struct Span {
    context: TraceContext,
    name: String,
    kind: Kind,
    endpoint: Arc<Endpoint>,
    tags: HashMap<String, String>,
    annotations: Vec<Annotation>,
    start_us: u64,
    started: Instant,
    shared: bool,
    debug: bool,
    sender: Option<UnboundedSender<ExportMsg>>,
    finished: bool,
}

impl Span {
    pub(crate) fn new(
        context: TraceContext,
        name: &str,
        kind: Kind,
        endpoint: Arc<Endpoint>,
        shared: bool,
        debug: bool,
        sender: Option<UnboundedSender<ExportMsg>>,
    ) -> Self {
        Span {
            context,
            name: name.to_owned(),
            kind,
            endpoint,
            tags: HashMap::new(),
            annotations: Vec::new(),
            start_us: us_since_epoch(),
            started: Instant::now(),
            shared,
            debug,
            sender,
            finished: false,
        }
    }

    pub fn context(&self) -> TraceContext {
        self.context
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Attach or overwrite a tag. No-op once the span has finished.
    pub fn set_tag(&mut self, key: &str, value: &str) {
        if self.finished {
            return;
        }
        self.tags.insert(key.to_owned(), value.to_owned());
    }

    /// Record a timestamped annotation. No-op once the span has finished.
    pub fn log(&mut self, value: &str) {
        if self.finished {
            return;
        }
        self.annotations.push(Annotation {
            timestamp_us: us_since_epoch(),
            value: value.to_owned(),
        });
    }

    /// Mark this a debug span; collectors keep debug spans regardless of
    /// their own sampling. No-op once the span has finished.
    pub fn set_debug(&mut self, debug: bool) {
        if self.finished {
            return;
        }
        self.debug = debug;
    }

    /// Finish the span, fixing its duration from the monotonic clock and
    /// handing the record to the exporter. Idempotent: only the first call
    /// (or the drop, if no one called it) exports.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let duration_us = self.started.elapsed().as_micros() as u64;
        if !self.context.sampled {
            return;
        }
        let Some(sender) = self.sender.take() else {
            return;
        };
        let mut tags = mem::take(&mut self.tags);
        if self.kind.is_resource() {
            tags.insert(tag::SPAN_KIND.to_owned(), "resource".to_owned());
        }
        let record = SpanRecord {
            trace_id: self.context.trace_id,
            id: self.context.span_id,
            parent_id: self.context.parent_span_id,
            name: self.name.clone(),
            kind: self.kind,
            timestamp_us: self.start_us,
            duration_us,
            local_endpoint: (*self.endpoint).clone(),
            tags,
            annotations: mem::take(&mut self.annotations),
            debug: self.debug,
            shared: self.shared,
        };
        // The receiving side hangs up at shutdown; spans finishing after
        // that are dropped.
        let _ = sender.send(ExportMsg::Span(record));
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Cloneable, internally synchronized handle to a live span.
///
/// The tracing middleware stores one in the request extensions; handlers
/// get at it through the [`FromRequest`] impl. Clones share the span, so
/// tagging from concurrent tasks is safe.
#[derive(Clone, Debug)]
pub struct ActiveSpan(Arc<Mutex<Span>>);

impl ActiveSpan {
    pub fn new(span: Span) -> Self {
        ActiveSpan(Arc::new(Mutex::new(span)))
    }

    pub fn context(&self) -> TraceContext {
        self.lock().context()
    }

    /// See [`Span::set_tag`].
    pub fn set_tag(&self, key: &str, value: &str) {
        self.lock().set_tag(key, value);
    }

    /// See [`Span::log`].
    pub fn log(&self, value: &str) {
        self.lock().log(value);
    }

    /// See [`Span::finish`].
    pub fn finish(&self) {
        self.lock().finish();
    }

    fn lock(&self) -> MutexGuard<'_, Span> {
        // Every mutation is a single insert or push, so the span is still
        // consistent if a holder panicked.
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FromRequest for ActiveSpan {
    type Error = TraceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<ActiveSpan>() {
            Some(span) => future::ok(span.clone()),
            None => future::err(TraceErrorKind::NoActiveSpan.into()),
        }
    }
}

//! Client-side distributed tracing: span creation and annotation, B3 context
//! propagation over HTTP headers, and batched export of finished spans to a
//! Zipkin-compatible collector.
//!
//! The [`Tracer`] is built once from [`Settings`] and passed around
//! explicitly; there is no global registry. Requests are wrapped by
//! [`TraceWrapper`], which opens a server span and parks an [`ActiveSpan`]
//! handle in the request extensions for handlers to annotate. Outbound
//! resource calls are wrapped with [`Tracer::outer_call`].
#[macro_use]
extern crate slog;
#[macro_use]
extern crate slog_scope;

pub mod context;
pub mod errors;
pub mod export;
pub mod logging;
pub mod metric_name;
pub mod metrics;
pub mod middleware;
pub mod outbound;
pub mod propagation;
pub mod settings;
pub mod span;
pub mod test_support;
pub mod tracer;
pub mod util;

pub use crate::context::{SpanId, TraceContext, TraceId};
pub use crate::errors::{TraceError, TraceErrorKind};
pub use crate::export::{Endpoint, Exporter, HttpExporter, SpanRecord};
pub use crate::middleware::trace::TraceWrapper;
pub use crate::outbound::OuterCall;
pub use crate::settings::Settings;
pub use crate::span::{ActiveSpan, Annotation, Kind, Span};
pub use crate::tracer::Tracer;

//! The tracer: mints spans, owns the export channel, and carries the
//! process-wide tracing options.
//!
//! There is no global tracer. Build one with [`Tracer::init`] (or fall back
//! to [`Tracer::disabled`] when the collector is misconfigured) and pass it
//! by reference to the middleware and anything making outbound calls.
//! Clones are cheap and share the export channel.

use std::net::Ipv4Addr;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::oneshot;

use crate::context::{SpanId, TraceContext, TraceId};
use crate::errors::Result;
use crate::export::{spawn_pump, Endpoint, ExportMsg, Exporter, HttpExporter};
use crate::metrics;
use crate::settings::Settings;
use crate::span::{Kind, Span};

struct TracerInner {
    endpoint: Arc<Endpoint>,
    sender: Option<UnboundedSender<ExportMsg>>,
    same_span: bool,
    trace_id_128bit: bool,
    debug: bool,
}

#[derive(Clone)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

impl Tracer {
    /// Build a tracer from the settings and spawn the export pump. Needs a
    /// running tokio (or actix) runtime.
    ///
    /// Failure here is not fatal to the host service: the caller decides
    /// between aborting startup and continuing with [`Tracer::disabled`].
    pub fn init(settings: &Settings) -> Result<Self> {
        let exporter = HttpExporter::from_settings(settings)?;
        Self::with_exporter(settings, Box::new(exporter))
    }

    /// [`Tracer::init`] with a caller-provided exporter.
    pub fn with_exporter(settings: &Settings, exporter: Box<dyn Exporter>) -> Result<Self> {
        let metrics = metrics::from_settings(settings)?;
        let (tx, rx) = unbounded_channel();
        spawn_pump(
            rx,
            exporter,
            metrics,
            settings.max_batch_size,
            settings.flush_interval,
        );
        Ok(Tracer {
            inner: Arc::new(TracerInner {
                endpoint: Arc::new(local_endpoint(settings)),
                sender: Some(tx),
                same_span: settings.same_span,
                trace_id_128bit: settings.trace_id_128bit,
                debug: settings.debug,
            }),
        })
    }

    /// A tracer that records nothing. Spans it mints are unsampled and
    /// never exported, so instrumented code runs unchanged.
    pub fn disabled() -> Self {
        Tracer {
            inner: Arc::new(TracerInner {
                endpoint: Arc::new(Endpoint {
                    service_name: "disabled".to_owned(),
                    ipv4: None,
                    port: None,
                }),
                sender: None,
                same_span: false,
                trace_id_128bit: false,
                debug: false,
            }),
        }
    }

    /// Tracer wired to the given channel instead of a pump of its own;
    /// spans arrive there as they finish. Test seam.
    pub(crate) fn with_sender(settings: &Settings, sender: UnboundedSender<ExportMsg>) -> Self {
        Tracer {
            inner: Arc::new(TracerInner {
                endpoint: Arc::new(local_endpoint(settings)),
                sender: Some(sender),
                same_span: settings.same_span,
                trace_id_128bit: settings.trace_id_128bit,
                debug: settings.debug,
            }),
        }
    }

    /// Whether this tracer exports anything, i.e. whether it came out of
    /// [`Tracer::init`] rather than [`Tracer::disabled`].
    pub fn is_enabled(&self) -> bool {
        self.inner.sender.is_some()
    }

    /// Start a span. With a parent the span joins that trace and inherits
    /// its sampling decision; without one it roots a new trace, sampled
    /// whenever the tracer is enabled.
    pub fn start_span(&self, name: &str, kind: Kind, parent: Option<&TraceContext>) -> Span {
        let context = match parent {
            Some(parent) => parent.child_of(random_span_id()),
            None => self.new_root_context(),
        };
        self.build_span(name, kind, context, false)
    }

    /// Start the server-side span for an inbound request.
    ///
    /// Without an extracted context this roots a new trace. With one, the
    /// span is either a child of the caller's (the default) or, in
    /// same-span mode, a join: it reuses the caller's span id and its
    /// record is marked shared so the collector can merge both legs.
    pub fn server_span(&self, name: &str, extracted: Option<TraceContext>) -> Span {
        match extracted {
            None => self.start_span(name, Kind::Server, None),
            Some(ctx) if self.inner.same_span => self.build_span(name, Kind::Server, ctx, true),
            Some(ctx) => self.start_span(name, Kind::Server, Some(&ctx)),
        }
    }

    /// Deliver everything buffered in the export pump. Useful before
    /// shutdown and in tests; the request path never needs it.
    pub async fn flush(&self) {
        if let Some(sender) = &self.inner.sender {
            let (tx, rx) = oneshot::channel();
            if sender.send(ExportMsg::Flush(tx)).is_ok() {
                let _ = rx.await;
            }
        }
    }

    fn build_span(&self, name: &str, kind: Kind, context: TraceContext, shared: bool) -> Span {
        Span::new(
            context,
            name,
            kind,
            self.inner.endpoint.clone(),
            shared,
            self.inner.debug,
            self.inner.sender.clone(),
        )
    }

    fn new_root_context(&self) -> TraceContext {
        TraceContext {
            trace_id: self.random_trace_id(),
            span_id: random_span_id(),
            parent_span_id: None,
            sampled: self.is_enabled(),
        }
    }

    fn random_trace_id(&self) -> TraceId {
        let mut rng = rand::thread_rng();
        loop {
            let id = TraceId {
                hi: if self.inner.trace_id_128bit {
                    rng.gen()
                } else {
                    0
                },
                lo: rng.gen(),
            };
            if id.is_valid() {
                return id;
            }
        }
    }
}

fn random_span_id() -> SpanId {
    let mut rng = rand::thread_rng();
    loop {
        let id = SpanId(rng.gen());
        if id.is_valid() {
            return id;
        }
    }
}

fn local_endpoint(settings: &Settings) -> Endpoint {
    Endpoint {
        service_name: settings.service_name.clone(),
        // The bind address is only useful when it names this host
        ipv4: settings
            .host
            .parse::<Ipv4Addr>()
            .ok()
            .filter(|ip| !ip.is_unspecified()),
        port: Some(settings.port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tracer_pair;

    fn extracted() -> TraceContext {
        TraceContext {
            trace_id: TraceId { hi: 0, lo: 0x4d2 },
            span_id: SpanId(0x457),
            parent_span_id: Some(SpanId(0x1c8)),
            sampled: true,
        }
    }

    #[test]
    fn test_root_span_identity() {
        let (tracer, mut captured) = tracer_pair(&Settings::test_settings());
        let span = tracer.start_span("job", Kind::Client, None);
        let ctx = span.context();
        assert!(ctx.trace_id.is_valid());
        assert!(ctx.span_id.is_valid());
        assert_eq!(ctx.parent_span_id, None);
        assert!(ctx.sampled);
        // 128-bit ids by default
        assert_ne!(ctx.trace_id.hi, 0);
        drop(span);
        assert_eq!(captured.drain().len(), 1);
    }

    #[test]
    fn test_64_bit_trace_ids() {
        let settings = Settings {
            trace_id_128bit: false,
            ..Settings::test_settings()
        };
        let (tracer, _captured) = tracer_pair(&settings);
        let span = tracer.start_span("job", Kind::Client, None);
        assert_eq!(span.context().trace_id.hi, 0);
        assert_ne!(span.context().trace_id.lo, 0);
    }

    #[test]
    fn test_child_span_links_to_parent() {
        let (tracer, _captured) = tracer_pair(&Settings::test_settings());
        let parent = tracer.start_span("parent", Kind::Server, None);
        let pctx = parent.context();
        let child = tracer.start_span("child", Kind::Client, Some(&pctx));
        let cctx = child.context();
        assert_eq!(cctx.trace_id, pctx.trace_id);
        assert_eq!(cctx.parent_span_id, Some(pctx.span_id));
        assert_ne!(cctx.span_id, pctx.span_id);
    }

    #[test]
    fn test_server_span_continues_as_child() {
        let (tracer, mut captured) = tracer_pair(&Settings::test_settings());
        let span = tracer.server_span("GET /sum", Some(extracted()));
        let ctx = span.context();
        assert_eq!(ctx.trace_id, extracted().trace_id);
        assert_eq!(ctx.parent_span_id, Some(extracted().span_id));
        assert_ne!(ctx.span_id, extracted().span_id);
        drop(span);
        assert!(!captured.drain()[0].shared);
    }

    #[test]
    fn test_server_span_joins_in_same_span_mode() {
        let settings = Settings {
            same_span: true,
            ..Settings::test_settings()
        };
        let (tracer, mut captured) = tracer_pair(&settings);
        let span = tracer.server_span("GET /sum", Some(extracted()));
        assert_eq!(span.context(), extracted());
        drop(span);
        let records = captured.drain();
        assert_eq!(records[0].id, extracted().span_id);
        assert!(records[0].shared);
    }

    #[test]
    fn test_server_span_without_carrier_is_root() {
        let settings = Settings {
            same_span: true,
            ..Settings::test_settings()
        };
        let (tracer, mut captured) = tracer_pair(&settings);
        let span = tracer.server_span("GET /sum", None);
        assert_eq!(span.context().parent_span_id, None);
        drop(span);
        assert!(!captured.drain()[0].shared);
    }

    #[test]
    fn test_disabled_tracer_mints_unsampled_spans() {
        let tracer = Tracer::disabled();
        assert!(!tracer.is_enabled());
        let mut span = tracer.start_span("job", Kind::Client, None);
        assert!(!span.context().sampled);
        // Nothing to export to; must not panic
        span.finish();
    }

    #[test]
    fn test_debug_mode_marks_records() {
        let settings = Settings {
            debug: true,
            ..Settings::test_settings()
        };
        let (tracer, mut captured) = tracer_pair(&settings);
        tracer.start_span("job", Kind::Client, None).finish();
        assert!(captured.drain()[0].debug);
    }

    #[test]
    fn test_local_endpoint_from_settings() {
        let settings = Settings {
            host: "10.0.0.7".to_owned(),
            port: 8443,
            ..Settings::test_settings()
        };
        let (tracer, mut captured) = tracer_pair(&settings);
        tracer.start_span("job", Kind::Client, None).finish();
        let records = captured.drain();
        assert_eq!(records[0].local_endpoint.service_name, "test-service");
        assert_eq!(
            records[0].local_endpoint.ipv4,
            Some("10.0.0.7".parse().unwrap())
        );
        assert_eq!(records[0].local_endpoint.port, Some(8443));
    }

    #[tokio::test]
    async fn test_flush_waits_for_delivery() {
        use crate::export::MockExporter;

        let (batch_tx, mut batches) = unbounded_channel();
        let mut mock = MockExporter::new();
        mock.expect_export().returning(move |batch| {
            batch_tx.send(batch).ok();
            Ok(())
        });
        mock.expect_shutdown().returning(|| ());

        let settings = Settings {
            // Never flush on its own during the test
            flush_interval: std::time::Duration::from_secs(3600),
            ..Settings::test_settings()
        };
        let tracer = Tracer::with_exporter(&settings, Box::new(mock)).unwrap();
        tracer.start_span("job", Kind::Client, None).finish();
        tracer.flush().await;

        let batch = batches.try_recv().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].name, "job");
    }
}

//! Finished-span records, the exporter trait, and the background pump that
//! batches records out of the request path.
//!
//! Finishing a span is a non-blocking channel send; everything slow (JSON,
//! sockets, a dead collector) happens on the pump task. Batches go out when
//! they reach `max_batch_size`, when `flush_interval` elapses, on an
//! explicit flush, and at shutdown.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cadence::StatsdClient;
use mockall::automock;
use serde_derive::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;

use crate::context::{SpanId, TraceId};
use crate::errors::Result;
use crate::metric_name::MetricName;
use crate::metrics::StatsdClientExt;
use crate::span::{Annotation, Kind};

mod http;
pub use self::http::HttpExporter;

/// The local service endpoint spans are attributed to.
#[derive(Clone, Debug, Serialize)]
pub struct Endpoint {
    #[serde(rename = "serviceName")]
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Owned snapshot of a finished span, in the collector's JSON shape.
///
/// Records only exist for finished spans; every field is final.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanRecord {
    pub trace_id: TraceId,
    pub id: SpanId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SpanId>,
    pub name: String,
    #[serde(skip_serializing_if = "Kind::is_resource")]
    pub kind: Kind,
    #[serde(rename = "timestamp")]
    pub timestamp_us: u64,
    #[serde(rename = "duration")]
    pub duration_us: u64,
    pub local_endpoint: Endpoint,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub debug: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub shared: bool,
}

/// Message sent from finishing spans to the export pump.
#[derive(Debug)]
pub(crate) enum ExportMsg {
    Span(SpanRecord),
    /// Deliver everything buffered so far, then ack.
    Flush(oneshot::Sender<()>),
}

/// Sink for finished spans.
///
/// Implementations own their transport. The pump is the only caller and
/// hands over one batch at a time; a returned error means the batch is
/// dropped, not retried.
#[automock] // needs to appear before #[async_trait]
#[async_trait]
pub trait Exporter: Send {
    async fn export(&mut self, batch: Vec<SpanRecord>) -> Result<()>;

    /// Called once, after the last batch, when the pump shuts down.
    fn shutdown(&mut self) {}
}

/// Spawn the background task that drains `rx`, batching records by size
/// and flush interval. The task ends when every sender is gone.
pub(crate) fn spawn_pump(
    mut rx: UnboundedReceiver<ExportMsg>,
    mut exporter: Box<dyn Exporter>,
    metrics: Arc<StatsdClient>,
    max_batch_size: usize,
    flush_interval: Duration,
) {
    tokio::spawn(async move {
        let mut batch: Vec<SpanRecord> = Vec::with_capacity(max_batch_size);
        let mut tick = tokio::time::interval(flush_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(ExportMsg::Span(record)) => {
                        batch.push(record);
                        if batch.len() >= max_batch_size {
                            export_batch(exporter.as_mut(), &mut batch, &metrics).await;
                        }
                    }
                    Some(ExportMsg::Flush(ack)) => {
                        export_batch(exporter.as_mut(), &mut batch, &metrics).await;
                        let _ = ack.send(());
                    }
                    // The tracer and every live span hung up
                    None => break,
                },
                _ = tick.tick() => {
                    export_batch(exporter.as_mut(), &mut batch, &metrics).await;
                }
            }
        }
        export_batch(exporter.as_mut(), &mut batch, &metrics).await;
        exporter.shutdown();
        debug!("Export pump stopped");
    });
}

async fn export_batch(
    exporter: &mut dyn Exporter,
    batch: &mut Vec<SpanRecord>,
    metrics: &StatsdClient,
) {
    if batch.is_empty() {
        return;
    }
    let spans = std::mem::take(batch);
    let count = spans.len();
    match exporter.export(spans).await {
        Ok(()) => {
            let _ = metrics.count(MetricName::ExportSpan, count as i64);
            let _ = metrics.incr(MetricName::ExportBatch);
        }
        Err(e) => {
            // Delivery is best effort; the batch is gone (see Exporter)
            warn!("Failed to export {} spans: {}", count, e);
            let _ = metrics.incr(MetricName::ExportError);
        }
    }
}

//! Helpers for testing instrumented code without a collector.

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::export::{ExportMsg, SpanRecord};
use crate::settings::Settings;
use crate::tracer::Tracer;

/// Receiving end of a [`tracer_pair`] tracer. Finished spans land here
/// directly, with no pump task in between.
pub struct CapturedSpans(UnboundedReceiver<ExportMsg>);

impl CapturedSpans {
    /// Every span finished so far, in finish order.
    pub fn drain(&mut self) -> Vec<SpanRecord> {
        let mut records = Vec::new();
        while let Ok(msg) = self.0.try_recv() {
            if let ExportMsg::Span(record) = msg {
                records.push(record);
            }
        }
        records
    }
}

/// A tracer whose spans are captured instead of exported.
///
/// Finishing is a plain channel send, so this works in tests with no
/// runtime at all.
pub fn tracer_pair(settings: &Settings) -> (Tracer, CapturedSpans) {
    let (tx, rx) = unbounded_channel();
    (Tracer::with_sender(settings, tx), CapturedSpans(rx))
}

#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    crate::logging::init_test_logging();
}

//! Metric names emitted by the export path.
//!
//! Enum variants instead of string literals keep the names consistent and
//! discoverable.

use strum::{AsRefStr, Display, EnumString};
use strum_macros::IntoStaticStr;

#[derive(Debug, Clone, IntoStaticStr, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MetricName {
    /// Spans delivered to the collector
    #[strum(serialize = "export.span")]
    ExportSpan,

    /// Batches delivered to the collector
    #[strum(serialize = "export.batch")]
    ExportBatch,

    /// Batches dropped after a delivery failure
    #[strum(serialize = "export.error")]
    ExportError,
}

use std::net::UdpSocket;
use std::sync::Arc;

use cadence::{
    BufferedUdpMetricSink, Counted, Counter, MetricResult, NopMetricSink, QueuingMetricSink,
    StatsdClient,
};

use crate::errors::Result;
use crate::metric_name::MetricName;
use crate::settings::Settings;

/// Extension trait for StatsdClient to provide enum-based metric methods
pub trait StatsdClientExt {
    /// Increment a counter using a MetricName enum
    fn incr(&self, metric: MetricName) -> MetricResult<Counter>;

    /// Add `value` to a counter using a MetricName enum
    fn count(&self, metric: MetricName, value: i64) -> MetricResult<Counter>;
}

impl StatsdClientExt for StatsdClient {
    fn incr(&self, metric: MetricName) -> MetricResult<Counter> {
        let metric_tag: &'static str = metric.into();
        Counted::count(self, metric_tag, 1)
    }

    fn count(&self, metric: MetricName, value: i64) -> MetricResult<Counter> {
        let metric_tag: &'static str = metric.into();
        Counted::count(self, metric_tag, value)
    }
}

/// Create a cadence StatsdClient from the settings, falling back to a
/// no-op sink when no statsd host is configured.
pub fn from_settings(settings: &Settings) -> Result<Arc<StatsdClient>> {
    let builder = if let Some(host) = &settings.statsd_host {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;

        let addr = (host.as_str(), settings.statsd_port);
        let udp_sink = BufferedUdpMetricSink::from(addr, socket)?;
        let sink = QueuingMetricSink::from(udp_sink);
        StatsdClient::builder(&settings.statsd_label, sink)
    } else {
        StatsdClient::builder(&settings.statsd_label, NopMetricSink)
    };
    Ok(Arc::new(
        builder
            .with_error_handler(|err| warn!("Metric send error: {:?}", err))
            .build(),
    ))
}

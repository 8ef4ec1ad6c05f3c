//! HTTP exporter: POSTs span batches as JSON to the collector ingest URL.

use async_trait::async_trait;
use url::Url;

use crate::errors::{Result, TraceErrorKind};
use crate::export::{Exporter, SpanRecord};
use crate::settings::Settings;

#[derive(Debug)]
pub struct HttpExporter {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpExporter {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(HttpExporter {
            endpoint: Url::parse(&settings.collector_url)?,
            client: reqwest::Client::builder()
                .timeout(settings.export_timeout)
                .build()?,
        })
    }
}

#[async_trait]
impl Exporter for HttpExporter {
    async fn export(&mut self, batch: Vec<SpanRecord>) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&batch)
            .send()
            .await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(TraceErrorKind::CollectorError(format!("{status}: {body}")).into());
        }
        trace!("Exported {} spans", batch.len());
        Ok(())
    }
}

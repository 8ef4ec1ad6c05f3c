//! Application settings, read from config files and the environment.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde_derive::Deserialize;
use url::Url;

use crate::util::deserialize_u32_to_duration;

pub const ENV_PREFIX: &str = "traceline";

/// The tracing settings, read from the environment or a settings file.
/// Loaded once at startup; everything downstream treats them as immutable.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Service name reported on every exported span
    pub service_name: String,
    /// The application host to bind
    pub host: String,
    /// The application port to listen on
    pub port: u16,
    /// Span ingest URL of the collector
    pub collector_url: String,
    /// Mark every span as a debug span, exempt from collector sampling
    pub debug: bool,
    /// Join the caller's span on the server side instead of starting a
    /// child span, so both legs of an RPC log against one shared span
    pub same_span: bool,
    /// Mint 128-bit trace ids for new traces
    pub trace_id_128bit: bool,
    /// Per-batch timeout for collector requests
    #[serde(deserialize_with = "deserialize_u32_to_duration")]
    pub export_timeout: Duration,
    /// How long buffered spans may wait before being sent
    #[serde(deserialize_with = "deserialize_u32_to_duration")]
    pub flush_interval: Duration,
    /// Send a batch as soon as it holds this many spans
    pub max_batch_size: usize,
    /// The host name to send recorded metrics
    pub statsd_host: Option<String>,
    /// The port number to send recorded metrics
    pub statsd_port: u16,
    /// The root label to apply to metrics
    pub statsd_label: String,
    /// Use human readable (simplified, non-JSON) logging
    pub human_logs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_name: "traceline".to_owned(),
            host: "0.0.0.0".to_owned(),
            port: 8000,
            collector_url: "http://127.0.0.1:9411/api/v2/spans".to_owned(),
            debug: false,
            same_span: false,
            trace_id_128bit: true,
            export_timeout: Duration::from_secs(3),
            flush_interval: Duration::from_secs(1),
            max_batch_size: 100,
            statsd_host: None,
            statsd_port: 8125,
            statsd_label: "traceline".to_owned(),
            human_logs: false,
        }
    }
}

impl Settings {
    /// Load the settings from the config files in order first then the environment.
    pub fn with_env_and_config_files(filenames: &[String]) -> Result<Self, ConfigError> {
        let mut s = Config::builder();

        // Merge the configs from the files
        for filename in filenames {
            s = s.add_source(File::with_name(filename));
        }

        // Merge the environment overrides
        s = s.add_source(Environment::with_prefix(&ENV_PREFIX.to_uppercase()).separator("__"));

        let built = s.build()?;
        let s = built.try_deserialize::<Settings>()?;
        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = |val: Duration, name| {
            if val.is_zero() {
                return Err(ConfigError::Message(format!(
                    "Invalid {}_{}: cannot be 0",
                    ENV_PREFIX, name
                )));
            }
            Ok(())
        };
        non_zero(self.flush_interval, "FLUSH_INTERVAL")?;
        non_zero(self.export_timeout, "EXPORT_TIMEOUT")?;
        if self.max_batch_size == 0 {
            return Err(ConfigError::Message(format!(
                "Invalid {}_MAX_BATCH_SIZE: cannot be 0",
                ENV_PREFIX
            )));
        }
        if self.service_name.is_empty() {
            return Err(ConfigError::Message(format!(
                "Invalid {}_SERVICE_NAME: cannot be empty",
                ENV_PREFIX
            )));
        }
        Url::parse(&self.collector_url).map_err(|e| {
            ConfigError::Message(format!("Invalid {}_COLLECTOR_URL: {}", ENV_PREFIX, e))
        })?;
        Ok(())
    }

    pub fn test_settings() -> Self {
        Self {
            service_name: "test-service".to_owned(),
            statsd_host: None,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        // Test that the Config works the way we expect it to.
        use std::env;
        let port = format!("{}__PORT", ENV_PREFIX).to_uppercase();
        let same_span = format!("{}__SAME_SPAN", ENV_PREFIX).to_uppercase();

        let v1 = env::var(&port);
        let v2 = env::var(&same_span);
        env::set_var(&port, "9123");
        env::set_var(&same_span, "true");
        let settings = Settings::with_env_and_config_files(&Vec::new()).unwrap();
        assert_eq!(
            settings.collector_url,
            "http://127.0.0.1:9411/api/v2/spans".to_owned()
        );
        assert_eq!(&settings.port, &9123);
        assert!(settings.same_span);
        assert!(settings.trace_id_128bit);
        assert_eq!(settings.flush_interval, Duration::from_secs(1));

        // reset (just in case)
        if let Ok(p) = v1 {
            env::set_var(&port, p);
        } else {
            env::remove_var(&port);
        }
        if let Ok(p) = v2 {
            env::set_var(&same_span, p);
        } else {
            env::remove_var(&same_span);
        }
    }

    #[test]
    fn test_config_file_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traceline.toml");
        std::fs::write(
            &path,
            "service_name = \"svc1\"\nmax_batch_size = 10\ncollector_url = \"http://zipkin:9411/api/v2/spans\"\n",
        )
        .unwrap();

        let settings =
            Settings::with_env_and_config_files(&[path.to_string_lossy().to_string()]).unwrap();
        assert_eq!(settings.service_name, "svc1");
        assert_eq!(settings.max_batch_size, 10);
        assert_eq!(settings.collector_url, "http://zipkin:9411/api/v2/spans");

        // Loading runs validation too
        std::fs::write(&path, "max_batch_size = 0\n").unwrap();
        assert!(
            Settings::with_env_and_config_files(&[path.to_string_lossy().to_string()]).is_err()
        );
    }

    #[test]
    fn test_validation() {
        let zero_interval = Settings {
            flush_interval: Duration::from_secs(0),
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());

        let zero_batch = Settings {
            max_batch_size: 0,
            ..Default::default()
        };
        assert!(zero_batch.validate().is_err());

        let bad_url = Settings {
            collector_url: "not a url".to_owned(),
            ..Default::default()
        };
        assert!(bad_url.validate().is_err());

        assert!(Settings::default().validate().is_ok());
    }
}

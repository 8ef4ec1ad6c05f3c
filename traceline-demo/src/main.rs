#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

#[macro_use]
extern crate slog_scope;

mod handlers;

use actix_web::HttpServer;
use docopt::Docopt;
use serde_derive::Deserialize;

use traceline::{
    errors::{Result, TraceErrorKind},
    logging, Settings, Tracer,
};

const USAGE: &str = "
Usage: traceline-demo [options]

Options:
    -h, --help              Show this message.
    --config=CONFIGFILE     Configuration file path.
";

#[derive(Debug, Deserialize)]
struct Args {
    flag_config: Option<String>,
}

macro_rules! build_app {
    ($tracer: expr) => {
        actix_web::App::new()
            .app_data(actix_web::web::Data::new($tracer.clone()))
            .wrap(traceline::TraceWrapper::new(&$tracer))
            .configure(crate::handlers::config)
    };
}

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());
    let mut filenames = Vec::new();
    if let Some(config_filename) = args.flag_config {
        filenames.push(config_filename);
    }
    let settings =
        Settings::with_env_and_config_files(&filenames).map_err(TraceErrorKind::ConfigError)?;
    logging::init_logging(!settings.human_logs, logging::get_default_hostname())?;
    debug!("Starting up...");

    let tracer = match Tracer::init(&settings) {
        Ok(tracer) => tracer,
        Err(e) => {
            warn!("Failed to set up span export, tracing disabled: {}", e);
            Tracer::disabled()
        }
    };

    let (host, port) = (settings.host.clone(), settings.port);
    info!("Starting traceline-demo on {}:{}", host, port);
    let server_tracer = tracer.clone();
    HttpServer::new(move || build_app!(server_tracer))
        .bind((host, port))?
        .run()
        .await?;

    // Deliver whatever the pump still has buffered before exiting
    tracer.flush().await;
    info!("Shutting down traceline-demo");
    logging::reset_logging();
    Ok(())
}

use clap::Parser;
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use relay::config::Config;

#[derive(Parser)]
#[command(about = "Relay for browser tracking pixels to the analytics vendor")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long)]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            process::exit(1);
        }
    };

    // Deployment platforms hand out the listen port via the environment.
    if let Ok(port) = std::env::var("PORT") {
        match port.parse() {
            Ok(port) => config.listener.port = port,
            Err(_) => {
                eprintln!("invalid PORT value: {port}");
                process::exit(1);
            }
        }
    }

    if let Err(e) = config.validate() {
        eprintln!("invalid config: {e}");
        process::exit(1);
    }

    if let Some(metrics_config) = &config.metrics {
        install_statsd_recorder(metrics_config);
    }

    if let Err(e) = relay::run(config).await {
        tracing::error!(error = %e, "relay exited with error");
        process::exit(1);
    }
}

fn install_statsd_recorder(config: &relay::config::MetricsConfig) {
    match StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port).build(Some("relay"))
    {
        Ok(recorder) => {
            if let Err(e) = metrics::set_global_recorder(recorder) {
                tracing::warn!(error = %e, "failed to install metrics recorder");
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to build statsd recorder"),
    }
}

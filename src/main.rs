use tracing::info;

use ceilometer_agent::{
    ceilometer::CeilometerClient,
    config::Config,
    mappings,
    poller::{self, RetryPolicy},
    report::StdoutSink,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_args()?;

    // Setup tracing with optional file output
    let default_level = if config.verbose { "info" } else { "error" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let fmt_layer = tracing_subscriber::fmt().with_env_filter(env_filter);

    if let Some(log_file) = &config.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|e| format!("Failed to open log file {}: {}", log_file, e))?;
        fmt_layer.with_writer(std::sync::Arc::new(file)).init();
    } else {
        fmt_layer.init();
    }

    let policy = RetryPolicy::from_count(config.retry_count);

    info!("Starting ceilometer-agent");
    info!("Identity endpoint: {}", config.service_endpoint);
    info!("Poll interval: {}s", config.poll_interval_secs);
    info!("Retry policy: {:?}, delay {}s", policy, config.retry_delay_secs);

    let groups = mappings::default_groups();
    let client = CeilometerClient::new(&config)?;
    let mut sink = StdoutSink::new(config.metric_prefix.clone(), config.report_log_file.as_deref())?;

    poller::run(
        &client,
        &groups,
        &mut sink,
        policy,
        config.retry_delay(),
        config.poll_interval(),
    )
    .await?;

    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;
use kickhub_server::ServerConfig;
use kickhub_telemetry::{LogFormat, TelemetryConfig};
use tracing::Level;

/// Pusher-compatible WebSocket hub serving synthetic Kick events.
#[derive(Parser, Debug)]
#[command(name = "kickhub", version, about, long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, env = "KICKHUB_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "KICKHUB_PORT", default_value_t = 4400)]
    port: u16,

    /// Outbound frames queued per connection before it is disconnected
    #[arg(long, env = "KICKHUB_MAILBOX_CAPACITY", default_value_t = 256)]
    mailbox_capacity: usize,

    /// Seconds advertised to clients as `activity_timeout`
    #[arg(long, env = "KICKHUB_ACTIVITY_TIMEOUT", default_value_t = 120)]
    activity_timeout: u64,

    /// Emitter events per second for new sessions (1..=1000)
    #[arg(long, env = "KICKHUB_DEFAULT_RATE", default_value_t = 1.0)]
    default_rate: f64,

    /// Allowed browser origin; "*" allows any
    #[arg(long, env = "KICKHUB_CORS_ORIGIN", default_value = "http://localhost:5173")]
    cors_origin: String,

    /// Default log level. RUST_LOG takes precedence.
    #[arg(long, env = "KICKHUB_LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// Per-module override such as `kickhub_server::hub=debug`. Repeatable.
    #[arg(long = "log-module", value_parser = parse_module_level)]
    log_modules: Vec<(String, Level)>,

    /// Emit logs as JSON lines
    #[arg(long, env = "KICKHUB_JSON_LOGS")]
    json_logs: bool,
}

impl Args {
    fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            log_level: self.log_level,
            module_levels: self.log_modules.clone(),
            format: if self.json_logs {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
        }
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            mailbox_capacity: self.mailbox_capacity,
            activity_timeout_secs: self.activity_timeout,
            default_rate: self.default_rate,
            cors_origin: (self.cors_origin != "*").then(|| self.cors_origin.clone()),
        }
    }
}

fn parse_module_level(s: &str) -> Result<(String, Level), String> {
    let (module, level) = s
        .split_once('=')
        .ok_or_else(|| format!("expected MODULE=LEVEL, got `{s}`"))?;
    let level = level.parse::<Level>().map_err(|e| e.to_string())?;
    Ok((module.to_string(), level))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    kickhub_telemetry::init_telemetry(&args.telemetry_config());

    let config = args.server_config();
    tracing::info!(
        addr = %config.bind_addr(),
        mailbox_capacity = config.mailbox_capacity,
        default_rate = config.default_rate,
        "starting kickhub"
    );

    let handle = kickhub_server::start(config)
        .await
        .context("failed to start server")?;
    tracing::info!(port = handle.port, "kickhub ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    handle.shutdown().await;
    Ok(())
}

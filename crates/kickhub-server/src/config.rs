/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Capacity of each connection's outbound mailbox.
    pub mailbox_capacity: usize,
    /// Advertised to clients in `pusher:connection_established`.
    pub activity_timeout_secs: u64,
    /// Events per second for sessions that never sent `set_message_rate`.
    pub default_rate: f64,
    /// Allowed browser origin. `None` allows any origin.
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 4400,
            mailbox_capacity: 256,
            activity_timeout_secs: 120,
            default_rate: 1.0,
            cors_origin: Some("http://localhost:5173".into()),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

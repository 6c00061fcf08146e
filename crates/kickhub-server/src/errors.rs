use crate::session::{MAX_RATE, MIN_RATE};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HubError {
    #[error("message rate {0} is outside {min}..={max} events per second", min = MIN_RATE, max = MAX_RATE)]
    InvalidRate(f64),
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] HubError),

    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

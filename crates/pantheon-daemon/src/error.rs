use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

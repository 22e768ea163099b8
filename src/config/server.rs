use crate::core::{AppError, Result};
use std::env;

/// Server configuration for HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            // Handlers mostly wait on the automation engine
            workers: 2,
        }
    }

    pub fn from_env() -> Result<Self> {
        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| AppError::Configuration("Invalid SERVER_PORT".to_string()))?;
        let workers = env::var("SERVER_WORKERS")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .map_err(|_| AppError::Configuration("Invalid SERVER_WORKERS".to_string()))?;

        Ok(Self {
            workers,
            ..Self::new(host, port)
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default base the automation engine calls back into
    pub fn public_base_url(&self) -> String {
        format!("http://{}", self.bind_address())
    }
}

use serde::Deserialize;

/// Largest request, headers and body together, buffered before answering 413 (8 MiB).
const DEFAULT_MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial per-connection read buffer capacity.
const DEFAULT_INITIAL_BUFFER_SIZE: usize = 4096;

/// Transport tunables.
///
/// Every field has a default, so a partial document deserializes cleanly:
///
/// ```
/// use gantry::server::ServerConfig;
///
/// let config: ServerConfig = serde_json::from_str(r#"{"max_request_size": 1024}"#).unwrap();
/// assert_eq!(config.max_request_size(), 1024);
/// assert_eq!(config.initial_buffer_size(), 4096);
///
/// let config = ServerConfig::new().with_initial_buffer_size(512);
/// assert_eq!(config.initial_buffer_size(), 512);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    max_request_size: usize,
    initial_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            initial_buffer_size: DEFAULT_INITIAL_BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_request_size(mut self, bytes: usize) -> Self {
        self.max_request_size = bytes;
        self
    }

    #[must_use]
    pub fn with_initial_buffer_size(mut self, bytes: usize) -> Self {
        self.initial_buffer_size = bytes;
        self
    }

    pub fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    pub fn initial_buffer_size(&self) -> usize {
        self.initial_buffer_size
    }
}

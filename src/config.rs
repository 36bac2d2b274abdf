use std::time::Duration;

/// Server configuration.
/// Builder pattern: chain method calls, unset values keep their defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub port: u16,
    /// Frames queued per connection before new ones are dropped for it.
    pub outbound_capacity: usize,
    /// How long a new connection may stay silent before it is dropped.
    pub idle_timeout: Duration,
}

pub struct ServerConfigBuilder {
    addr: String,
    port: u16,
    outbound_capacity: usize,
    idle_timeout: Duration,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            addr: "0.0.0.0".to_string(),
            port: 8080,
            outbound_capacity: 64,
            idle_timeout: Duration::from_secs(10),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ServerConfigBuilder {
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn build(self) -> ServerConfig {
        ServerConfig {
            addr: self.addr,
            port: self.port,
            outbound_capacity: self.outbound_capacity.max(1),
            idle_timeout: self.idle_timeout,
        }
    }
}

//! Shared HTTP connection pool for all product clients

use std::time::Duration;

use super::config::Config;

pub struct ConnectionPoolConfig {
    pub max_idle_connections: usize,
    pub idle_timeout: Duration,
    pub connection_timeout: Duration,
    pub request_timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
    pub user_agent: String,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_connections: 10,
            idle_timeout: Duration::from_secs(90),
            connection_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            tcp_keepalive: Some(Duration::from_secs(30)),
            user_agent: format!("Terraform-Provider/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&Config> for ConnectionPoolConfig {
    fn from(config: &Config) -> Self {
        Self {
            connection_timeout: config.connect_timeout,
            request_timeout: config.read_timeout,
            user_agent: config.user_agent(),
            ..Default::default()
        }
    }
}

impl ConnectionPoolConfig {
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(self.request_timeout)
            .connect_timeout(self.connection_timeout)
            .pool_idle_timeout(self.idle_timeout)
            .pool_max_idle_per_host(self.max_idle_connections);

        if let Some(keepalive) = self.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_takes_timeouts_from_connectivity_config() {
        let mut config = Config::new("cn-hangzhou", "AK", "SK");
        config.read_timeout = Duration::from_secs(5);
        config.connect_timeout = Duration::from_secs(2);

        let pool = ConnectionPoolConfig::from(&config);
        assert_eq!(pool.request_timeout, Duration::from_secs(5));
        assert_eq!(pool.connection_timeout, Duration::from_secs(2));
        assert_eq!(pool.max_idle_connections, 10);
        assert!(pool.build_client().is_ok());
    }
}

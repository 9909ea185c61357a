//! Connectivity configuration shared by every product client

use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_REGION: &str = "cn-beijing";

pub const ENV_ACCESS_KEY: &str = "ALICLOUD_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "ALICLOUD_SECRET_KEY";
pub const ENV_SECURITY_TOKEN: &str = "ALICLOUD_SECURITY_TOKEN";
pub const ENV_REGION: &str = "ALICLOUD_REGION";

#[derive(Clone)]
pub struct Config {
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub security_token: Option<String>,
    /// Product code (e.g. "vpc") to endpoint host or URL
    pub endpoints: HashMap<String, String>,
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    /// Free-form label appended to the User-Agent
    pub configuration_source: Option<String>,
}

impl Config {
    pub fn new(region: &str, access_key: &str, secret_key: &str) -> Self {
        Self {
            region: region.to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            security_token: None,
            endpoints: HashMap::new(),
            read_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            configuration_source: None,
        }
    }

    pub fn with_endpoint(mut self, product: &str, endpoint: &str) -> Self {
        self.endpoints
            .insert(product.to_lowercase(), endpoint.to_string());
        self
    }

    pub fn with_security_token(mut self, token: Option<String>) -> Self {
        self.security_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn user_agent(&self) -> String {
        let mut agent = format!("Terraform-Provider/{}", env!("CARGO_PKG_VERSION"));
        if let Some(source) = &self.configuration_source {
            agent.push_str(" TerraformConfigurationSource/");
            agent.push_str(source);
        }
        agent
    }
}

// Secrets stay out of debug logs
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("security_token", &self.security_token.as_ref().map(|_| "<redacted>"))
            .field("endpoints", &self.endpoints)
            .field("read_timeout", &self.read_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("configuration_source", &self.configuration_source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_secrets() {
        let config = Config::new("cn-hangzhou", "AK", "very-secret")
            .with_security_token(Some("sts-token".to_string()));
        let printed = format!("{:?}", config);
        assert!(!printed.contains("very-secret"));
        assert!(!printed.contains("sts-token"));
        assert!(printed.contains("AK"));
    }

    #[test]
    fn empty_security_token_is_ignored() {
        let config = Config::new("cn-hangzhou", "AK", "SK").with_security_token(Some(String::new()));
        assert!(config.security_token.is_none());
    }

    #[test]
    fn user_agent_carries_configuration_source() {
        let mut config = Config::new("cn-hangzhou", "AK", "SK");
        assert!(config.user_agent().starts_with("Terraform-Provider/"));

        config.configuration_source = Some("team-a".to_string());
        assert!(config.user_agent().ends_with("TerraformConfigurationSource/team-a"));
    }

    #[test]
    fn endpoint_overrides_are_keyed_by_lowercase_product() {
        let config = Config::new("cn-hangzhou", "AK", "SK").with_endpoint("VPC", "http://localhost:8080");
        assert_eq!(
            config.endpoints.get("vpc").map(String::as_str),
            Some("http://localhost:8080")
        );
    }
}

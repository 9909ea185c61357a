//! Provider data handed to every resource and data source

use std::time::Duration;

use crate::api::cbn::CbnApi;
use crate::api::ecs::EcsApi;
use crate::api::ram::RamApi;
use crate::api::vpc::VpcApi;
use crate::api::{AliyunClient, ApiError, RetryPolicy, StateConf};

#[derive(Clone)]
pub struct AlicloudProviderData {
    pub client: AliyunClient,
    pub retry_policy: RetryPolicy,
    /// Wait before the first status check after a mutating call
    pub poll_delay: Duration,
    pub poll_interval: Duration,
}

impl AlicloudProviderData {
    pub fn new(client: AliyunClient) -> Self {
        Self {
            client,
            retry_policy: RetryPolicy::default(),
            poll_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(5),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_polling(mut self, delay: Duration, interval: Duration) -> Self {
        self.poll_delay = delay;
        self.poll_interval = interval;
        self
    }

    pub fn cbn(&self) -> Result<CbnApi, ApiError> {
        Ok(self.client.cbn()?.with_retry_policy(self.retry_policy.clone()))
    }

    pub fn vpc(&self) -> Result<VpcApi, ApiError> {
        Ok(self.client.vpc()?.with_retry_policy(self.retry_policy.clone()))
    }

    pub fn ram(&self) -> Result<RamApi, ApiError> {
        Ok(self.client.ram()?.with_retry_policy(self.retry_policy.clone()))
    }

    pub fn ecs(&self) -> Result<EcsApi, ApiError> {
        Ok(self.client.ecs()?.with_retry_policy(self.retry_policy.clone()))
    }

    pub fn wait_for(&self, target: &[&str], timeout: Duration) -> StateConf {
        StateConf::new(target, timeout)
            .delay(self.poll_delay)
            .poll_interval(self.poll_interval)
    }

    pub fn wait_for_deletion(&self, timeout: Duration) -> StateConf {
        StateConf::for_deletion(timeout)
            .delay(self.poll_delay)
            .poll_interval(self.poll_interval)
    }
}

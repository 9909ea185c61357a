//! Alibaba Cloud OpenAPI access: signing, the client registry, the
//! retry/poll/paginate core and typed per-product actions

pub mod cbn;
pub mod client;
pub mod common;
pub mod config;
pub mod ecs;
pub mod error;
pub mod paginate;
pub mod pool;
pub mod ram;
pub mod request;
pub mod response;
pub mod retry;
pub mod signer;
pub mod vpc;
pub mod waiter;

pub use client::{AliyunClient, Idempotency, Product, RpcAction, RpcClient};
pub use common::{ClientToken, InnerAccessPolicy, PaymentType};
pub use config::Config;
pub use error::ApiError;
pub use paginate::{collect_marker_pages, collect_pages, MarkerPage};
pub use request::RpcParams;
pub use response::{decode, Tag};
pub use retry::{retry, retry_on, RetryDecision, RetryPolicy};
pub use waiter::{Refresh, StateConf};

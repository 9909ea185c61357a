//! Resource Access Management users

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::client::{Idempotency, Product, RpcAction, RpcClient};
use super::error::ApiError;
use super::paginate::{collect_marker_pages, MarkerPage, DEFAULT_MAX_PAGES};
use super::response::wrapped_list;
use super::retry::{default_classifier, retry, RetryPolicy, READ_RETRY_TIMEOUT};

pub const USER_NOT_FOUND: &[&str] = &["EntityNotExist.User"];
pub const USER_ALREADY_EXISTS: &[&str] = &["EntityAlreadyExists.User"];

const LIST_USERS_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct User {
    pub user_id: String,
    pub user_name: String,
    pub display_name: String,
    pub mobile_phone: String,
    pub email: String,
    pub comments: String,
    pub create_date: String,
    pub update_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserResponse {
    pub user: User,
}

/// The user name is the natural key: repeating the call cannot create a
/// second user, it fails with `EntityAlreadyExists.User` instead
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateUserRequest {
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl RpcAction for CreateUserRequest {
    type Response = UserResponse;
    const ACTION: &'static str = "CreateUser";
    const PRODUCT: Product = Product::Ram;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
    const REGIONAL: bool = false;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetUserRequest {
    pub user_name: String,
}

impl RpcAction for GetUserRequest {
    type Response = UserResponse;
    const ACTION: &'static str = "GetUser";
    const PRODUCT: Product = Product::Ram;
    const IDEMPOTENCY: Idempotency = Idempotency::ReadOnly;
    const REGIONAL: bool = false;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateUserRequest {
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_mobile_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_comments: Option<String>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.new_user_name.is_none()
            && self.new_display_name.is_none()
            && self.new_mobile_phone.is_none()
            && self.new_email.is_none()
            && self.new_comments.is_none()
    }
}

impl RpcAction for UpdateUserRequest {
    type Response = UserResponse;
    const ACTION: &'static str = "UpdateUser";
    const PRODUCT: Product = Product::Ram;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
    const REGIONAL: bool = false;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteUserRequest {
    pub user_name: String,
}

impl RpcAction for DeleteUserRequest {
    type Response = super::response::Empty;
    const ACTION: &'static str = "DeleteUser";
    const PRODUCT: Product = Product::Ram;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
    const REGIONAL: bool = false;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListUsersRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    pub max_items: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListUsersResponse {
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub marker: Option<String>,
    #[serde(default, deserialize_with = "wrapped_list")]
    pub users: Vec<User>,
}

impl RpcAction for ListUsersRequest {
    type Response = ListUsersResponse;
    const ACTION: &'static str = "ListUsers";
    const PRODUCT: Product = Product::Ram;
    const IDEMPOTENCY: Idempotency = Idempotency::ReadOnly;
    const REGIONAL: bool = false;
}

pub struct RamApi {
    rpc: RpcClient,
    policy: RetryPolicy,
}

impl RamApi {
    pub fn new(rpc: RpcClient) -> Self {
        Self {
            rpc,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Creates the user. When an earlier attempt failed in a way that may
    /// have left the user created (a dropped connection or a 5xx), the retry
    /// fails with `EntityAlreadyExists.User` and the existing user is adopted.
    /// A conflict after only clean rejections means the name belongs to
    /// someone else and is returned as an error.
    pub async fn create_user(
        &self,
        request: &CreateUserRequest,
        timeout: Duration,
    ) -> Result<User, ApiError> {
        let maybe_created = AtomicBool::new(false);
        let result = retry(
            timeout,
            &self.policy,
            || {
                let maybe_created = &maybe_created;
                async move {
                    let result = self.rpc.call(request).await;
                    if matches!(&result, Err(e) if e.is_ambiguous()) {
                        maybe_created.store(true, Ordering::SeqCst);
                    }
                    result
                }
            },
            default_classifier,
        )
        .await;

        match result {
            Ok(response) => Ok(response.user),
            Err(e) if e.is_expected(USER_ALREADY_EXISTS) && maybe_created.load(Ordering::SeqCst) => {
                tracing::warn!(
                    user_name = %request.user_name,
                    "user already exists after an ambiguous create failure, adopting it"
                );
                self.get_user(&request.user_name).await
            }
            Err(e) => Err(e.context(&request.user_name, CreateUserRequest::ACTION)),
        }
    }

    pub async fn get_user(&self, user_name: &str) -> Result<User, ApiError> {
        let request = GetUserRequest {
            user_name: user_name.to_string(),
        };
        self.rpc
            .call_with_retry(&request, READ_RETRY_TIMEOUT, &self.policy, default_classifier)
            .await
            .map(|response| response.user)
            .map_err(|e| {
                if e.is_expected(USER_NOT_FOUND) {
                    ApiError::not_found("RamUser", user_name)
                } else {
                    e.context(user_name, GetUserRequest::ACTION)
                }
            })
    }

    pub async fn update_user(
        &self,
        request: &UpdateUserRequest,
        timeout: Duration,
    ) -> Result<User, ApiError> {
        self.rpc
            .call_with_retry(request, timeout, &self.policy, default_classifier)
            .await
            .map(|response| response.user)
            .map_err(|e| e.context(&request.user_name, UpdateUserRequest::ACTION))
    }

    pub async fn delete_user(&self, user_name: &str, timeout: Duration) -> Result<(), ApiError> {
        let request = DeleteUserRequest {
            user_name: user_name.to_string(),
        };
        match self
            .rpc
            .call_with_retry(&request, timeout, &self.policy, default_classifier)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_expected(USER_NOT_FOUND) => Ok(()),
            Err(e) => Err(e.context(user_name, DeleteUserRequest::ACTION)),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        collect_marker_pages(DEFAULT_MAX_PAGES, |marker| {
            let request = ListUsersRequest {
                marker,
                max_items: LIST_USERS_PAGE_SIZE,
            };
            async move {
                let response = self
                    .rpc
                    .call_with_retry(&request, READ_RETRY_TIMEOUT, &self.policy, default_classifier)
                    .await
                    .map_err(|e| e.context("", ListUsersRequest::ACTION))?;
                let next_marker = if response.is_truncated {
                    response.marker
                } else {
                    None
                };
                Ok(MarkerPage {
                    items: response.users,
                    next_marker,
                })
            }
        })
        .await
    }
}

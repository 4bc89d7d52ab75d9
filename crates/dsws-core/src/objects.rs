//! Shared model for the five user-created item types and the generic item
//! operations every resource client composes.
//!
//! The payload shape of each item type (time series data, list constituents,
//! expression text, index portfolios, regression parameters) belongs to the
//! resource layer; operations here are generic over it.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{ClientConfig, DEFAULT_TIMEOUT};
use crate::error::DswsError;
use crate::session::{Credential, SessionManager};
use crate::transport::{HttpTransport, Invoker, ReqwestTransport};
use crate::wire::Property;

/// Discriminates the five user-created item types on the wire. Responses that
/// carry no item report `NoType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum UserObjectType {
    NoType = 0,
    List = 1,
    Index = 2,
    TimeSeries = 3,
    Expression = 4,
    Regression = 5,
}

impl From<UserObjectType> for u8 {
    fn from(value: UserObjectType) -> Self {
        value as Self
    }
}

impl TryFrom<u8> for UserObjectType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NoType),
            1 => Ok(Self::List),
            2 => Ok(Self::Index),
            3 => Ok(Self::TimeSeries),
            4 => Ok(Self::Expression),
            5 => Ok(Self::Regression),
            other => Err(format!("unknown user object type {other}")),
        }
    }
}

/// Domain-level outcome embedded in every decoded item response. A non-success
/// value is returned as data for the caller to branch on, never as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ObjectResponseStatus {
    Success = 0,
    /// The identity is not permissioned to manage user-created items.
    Permissions = 1,
    NotPresent = 2,
    FormatError = 3,
    TypeError = 4,
    Error = 5,
}

impl From<ObjectResponseStatus> for u8 {
    fn from(value: ObjectResponseStatus) -> Self {
        value as Self
    }
}

impl TryFrom<u8> for ObjectResponseStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(Self::Success),
            1 => Ok(Self::Permissions),
            2 => Ok(Self::NotPresent),
            3 => Ok(Self::FormatError),
            4 => Ok(Self::TypeError),
            5 => Ok(Self::Error),
            other => Err(format!("unknown object response status {other}")),
        }
    }
}

/// How an item is shared with other identities under the same parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ShareType {
    NoType = 0,
    Company = 1,
    PrivateUserGroup = 2,
    UserGroup = 3,
    Global = 4,
}

impl From<ShareType> for u8 {
    fn from(value: ShareType) -> Self {
        value as Self
    }
}

impl TryFrom<u8> for ShareType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NoType),
            1 => Ok(Self::Company),
            2 => Ok(Self::PrivateUserGroup),
            3 => Ok(Self::UserGroup),
            4 => Ok(Self::Global),
            other => Err(format!("unknown share type {other}")),
        }
    }
}

/// Global items are read-only; everything a user owns is read-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum AccessRight {
    ReadWrite = 0,
    Read = 1,
}

impl From<AccessRight> for u8 {
    fn from(value: AccessRight) -> Self {
        value as Self
    }
}

impl TryFrom<u8> for AccessRight {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ReadWrite),
            1 => Ok(Self::Read),
            other => Err(format!("unknown access right {other}")),
        }
    }
}

/// Underlying data frequency for time series and regression items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ObjectFrequency {
    Daily = 0,
    Weekly = 1,
    Monthly = 2,
    Quarterly = 3,
    Yearly = 4,
}

impl From<ObjectFrequency> for u8 {
    fn from(value: ObjectFrequency) -> Self {
        value as Self
    }
}

impl TryFrom<u8> for ObjectFrequency {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Daily),
            1 => Ok(Self::Weekly),
            2 => Ok(Self::Monthly),
            3 => Ok(Self::Quarterly),
            4 => Ok(Self::Yearly),
            other => Err(format!("unknown object frequency {other}")),
        }
    }
}

/// Response to `GetItem`, `CreateItem`, `UpdateItem` and `DeleteItem`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserObjectResponse<T> {
    #[serde(default)]
    pub user_object_id: Option<String>,
    pub user_object_type: UserObjectType,
    #[serde(default = "Option::default")]
    pub user_object: Option<T>,
    pub response_status: ObjectResponseStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub properties: Option<Vec<Property>>,
}

impl<T> UserObjectResponse<T> {
    pub fn is_success(&self) -> bool {
        self.response_status == ObjectResponseStatus::Success
    }
}

/// Response to `GetAllItems`. Items arrive with summary fields only; the full
/// content requires a `GetItem` call per item.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserObjectsResponse<T> {
    pub user_object_type: UserObjectType,
    #[serde(default = "Option::default")]
    pub user_objects: Option<Vec<T>>,
    #[serde(default)]
    pub user_objects_count: u64,
    pub response_status: ObjectResponseStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub properties: Option<Vec<Property>>,
}

impl<T> UserObjectsResponse<T> {
    pub fn is_success(&self) -> bool {
        self.response_status == ObjectResponseStatus::Success
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetAllItemsRequest {
    filters: Option<Vec<Property>>,
    properties: Option<Vec<Property>>,
    token_value: String,
    user_object_type: UserObjectType,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ItemIdRequest {
    filters: Option<Vec<Property>>,
    properties: Option<Vec<Property>>,
    token_value: String,
    user_object_id: String,
    user_object_type: UserObjectType,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ItemUploadRequest<'a, T> {
    filters: Option<Vec<Property>>,
    properties: Option<Vec<Property>>,
    token_value: String,
    user_object: &'a T,
    user_object_type: UserObjectType,
}

/// Generic client for the user-created-items service. Resource-specific
/// clients compose this and supply their own payload types.
pub struct UserObjectClient {
    session: SessionManager,
}

impl UserObjectClient {
    /// Builds the transport from the config and authenticates immediately.
    pub fn connect(config: &ClientConfig) -> Result<Self, DswsError> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::from_config(config)?);
        Self::with_transport(config, transport)
    }

    /// Variant used by tests and embedders that bring their own transport.
    pub fn with_transport(
        config: &ClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, DswsError> {
        let credential = Credential::new(&config.username, &config.password)?;
        let invoker = Invoker::new(transport, config.effective_timeout(DEFAULT_TIMEOUT));
        let session = SessionManager::new(credential, config.user_data_url(), invoker);
        session.authenticate()?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Lists every item of one type available to the session. Summary fields
    /// only; large payload fields arrive unset.
    pub fn get_all_items<T>(
        &self,
        object_type: UserObjectType,
    ) -> Result<UserObjectsResponse<T>, DswsError>
    where
        T: DeserializeOwned,
    {
        info!(object_type = ?object_type, "requesting all items");
        let token = self.session.ensure_valid()?;
        let request = GetAllItemsRequest {
            filters: None,
            properties: None,
            token_value: token.value,
            user_object_type: object_type,
        };
        self.session
            .invoker()
            .post_json(&self.session.operation_url("GetAllItems"), &request)
    }

    /// Retrieves the full content of one item.
    pub fn get_item<T>(
        &self,
        object_type: UserObjectType,
        item_id: &str,
    ) -> Result<UserObjectResponse<T>, DswsError>
    where
        T: DeserializeOwned,
    {
        info!(item_id, "requesting item");
        let token = self.session.ensure_valid()?;
        let request = ItemIdRequest {
            filters: None,
            properties: None,
            token_value: token.value,
            user_object_id: item_id.to_owned(),
            user_object_type: object_type,
        };
        self.session
            .invoker()
            .post_json(&self.session.operation_url("GetItem"), &request)
    }

    pub fn create_item<T>(
        &self,
        object_type: UserObjectType,
        item: &T,
    ) -> Result<UserObjectResponse<T>, DswsError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.upload_item("CreateItem", object_type, item, false)
    }

    /// `skip_retrieval` asks the service not to echo the stored item back,
    /// which matters for large time series uploads.
    pub fn update_item<T>(
        &self,
        object_type: UserObjectType,
        item: &T,
        skip_retrieval: bool,
    ) -> Result<UserObjectResponse<T>, DswsError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.upload_item("UpdateItem", object_type, item, skip_retrieval)
    }

    pub fn delete_item(
        &self,
        object_type: UserObjectType,
        item_id: &str,
    ) -> Result<UserObjectResponse<serde_json::Value>, DswsError> {
        info!(item_id, "deleting item");
        let token = self.session.ensure_valid()?;
        let request = ItemIdRequest {
            filters: None,
            properties: None,
            token_value: token.value,
            user_object_id: item_id.to_owned(),
            user_object_type: object_type,
        };
        self.session
            .invoker()
            .post_json(&self.session.operation_url("DeleteItem"), &request)
    }

    fn upload_item<T>(
        &self,
        operation: &str,
        object_type: UserObjectType,
        item: &T,
        skip_retrieval: bool,
    ) -> Result<UserObjectResponse<T>, DswsError>
    where
        T: Serialize + DeserializeOwned,
    {
        info!(operation, object_type = ?object_type, "uploading item");
        let token = self.session.ensure_valid()?;
        let request = ItemUploadRequest {
            filters: skip_retrieval.then(|| vec![Property::flag("SkipRetrieval", true)]),
            properties: None,
            token_value: token.value,
            user_object: item,
            user_object_type: object_type,
        };
        self.session
            .invoker()
            .post_json(&self.session.operation_url(operation), &request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_type_round_trips_through_wire_integers() {
        let json = serde_json::to_string(&UserObjectType::TimeSeries).expect("must serialize");
        assert_eq!(json, "3");

        let back: UserObjectType = serde_json::from_str("5").expect("must deserialize");
        assert_eq!(back, UserObjectType::Regression);

        let err = serde_json::from_str::<UserObjectType>("9").expect_err("must fail");
        assert!(err.to_string().contains("unknown user object type"));
    }

    #[test]
    fn decodes_domain_failure_as_data() {
        let body = r#"{
            "UserObjectId": "TSZZZ001",
            "UserObjectType": 0,
            "UserObject": null,
            "ResponseStatus": 2,
            "ErrorMessage": "item not found",
            "Properties": null
        }"#;

        let response: UserObjectResponse<serde_json::Value> =
            serde_json::from_str(body).expect("must decode");
        assert!(!response.is_success());
        assert_eq!(response.response_status, ObjectResponseStatus::NotPresent);
        assert_eq!(response.error_message.as_deref(), Some("item not found"));
    }

    #[test]
    fn upload_request_serializes_skip_retrieval_filter() {
        let request = ItemUploadRequest {
            filters: Some(vec![Property::flag("SkipRetrieval", true)]),
            properties: None,
            token_value: String::from("tok"),
            user_object: &serde_json::json!({"Id": "TSZZZ001"}),
            user_object_type: UserObjectType::TimeSeries,
        };

        let json = serde_json::to_value(&request).expect("must serialize");
        assert_eq!(json["Filters"][0]["Key"], "SkipRetrieval");
        assert_eq!(json["Filters"][0]["Value"], true);
        assert_eq!(json["TokenValue"], "tok");
        assert_eq!(json["UserObjectType"], 3);
    }
}

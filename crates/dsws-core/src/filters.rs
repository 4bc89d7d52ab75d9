//! Custom economic filter management: named constituent sets used to narrow
//! the change feed to the series a caller actually tracks.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{ClientConfig, FILTER_SERVICE_TIMEOUT};
use crate::error::{DswsError, ValidationError};
use crate::session::{Credential, SessionManager};
use crate::transport::{HttpTransport, Invoker, ReqwestTransport};
use crate::wire::{Property, WireDateTime};

/// A filter's constituent list is bounded on both ends; violations never
/// reach the network.
pub const MAX_CONSTITUENTS: usize = 100_000;

static FILTER_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{5,45}$").expect("static pattern must compile"));

/// Filter identifiers are 5-45 alphanumeric-or-underscore characters.
pub fn validate_filter_id(filter_id: &str) -> Result<(), ValidationError> {
    if FILTER_ID_PATTERN.is_match(filter_id) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFilterId {
            value: filter_id.to_owned(),
        })
    }
}

/// Update verb sent with `CreateFilter`/`UpdateFilter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FilterUpdateAction {
    /// Reserved for the create call itself; rejected by `update_filter`.
    CreateFilter = 0,
    AppendConstituents = 1,
    ReplaceConstituents = 2,
    RemoveConstituents = 3,
    UpdateDescription = 4,
    UpdateSharedState = 5,
}

impl FilterUpdateAction {
    /// Constituent-list bounds apply to every action that touches the list.
    const fn requires_constituents(self) -> bool {
        matches!(
            self,
            Self::CreateFilter
                | Self::AppendConstituents
                | Self::ReplaceConstituents
                | Self::RemoveConstituents
        )
    }
}

impl From<FilterUpdateAction> for u8 {
    fn from(value: FilterUpdateAction) -> Self {
        value as Self
    }
}

impl TryFrom<u8> for FilterUpdateAction {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::CreateFilter),
            1 => Ok(Self::AppendConstituents),
            2 => Ok(Self::ReplaceConstituents),
            3 => Ok(Self::RemoveConstituents),
            4 => Ok(Self::UpdateDescription),
            5 => Ok(Self::UpdateSharedState),
            other => Err(format!("unknown filter update action {other}")),
        }
    }
}

/// Scope selector for `GetAllFilters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FilterScope {
    Personal = 0,
    Shared = 1,
    Datastream = 2,
    All = 3,
}

impl From<FilterScope> for u8 {
    fn from(value: FilterScope) -> Self {
        value as Self
    }
}

impl TryFrom<u8> for FilterScope {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Personal),
            1 => Ok(Self::Shared),
            2 => Ok(Self::Datastream),
            3 => Ok(Self::All),
            other => Err(format!("unknown filter scope {other}")),
        }
    }
}

/// Domain-level outcome for filter and change-feed operations. Returned as
/// data, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FilterResponseStatus {
    Success = 0,
    Permissions = 1,
    NotPresent = 2,
    FormatError = 3,
    SizeError = 4,
    ConstituentsError = 5,
    Error = 6,
}

impl From<FilterResponseStatus> for u8 {
    fn from(value: FilterResponseStatus) -> Self {
        value as Self
    }
}

impl TryFrom<u8> for FilterResponseStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(Self::Success),
            1 => Ok(Self::Permissions),
            2 => Ok(Self::NotPresent),
            3 => Ok(Self::FormatError),
            4 => Ok(Self::SizeError),
            5 => Ok(Self::ConstituentsError),
            6 => Ok(Self::Error),
            other => Err(format!("unknown filter response status {other}")),
        }
    }
}

/// A named constituent set. `created`/`last_modified`/`owner_id` are set only
/// on responses; outbound values are ignored by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EconomicFilter {
    pub filter_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub constituents: Option<Vec<String>>,
    #[serde(default)]
    pub constituents_count: u64,
    #[serde(default)]
    pub created: Option<WireDateTime>,
    #[serde(default)]
    pub last_modified: Option<WireDateTime>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub shared: bool,
}

impl EconomicFilter {
    pub fn new(filter_id: impl Into<String>, constituents: Vec<String>) -> Self {
        let count = constituents.len() as u64;
        Self {
            filter_id: filter_id.into(),
            description: None,
            constituents: Some(constituents),
            constituents_count: count,
            created: None,
            last_modified: None,
            owner_id: None,
            shared: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    fn validate(&self, action: FilterUpdateAction) -> Result<(), ValidationError> {
        validate_filter_id(&self.filter_id)?;
        if action.requires_constituents() {
            let count = self.constituents.as_ref().map_or(0, Vec::len);
            if count == 0 || count > MAX_CONSTITUENTS {
                return Err(ValidationError::ConstituentsOutOfRange {
                    count,
                    max: MAX_CONSTITUENTS,
                });
            }
        }
        Ok(())
    }

    /// Response-only fields are reset before upload; the service derives the
    /// true count from the constituent list.
    fn prepared_for_upload(&self) -> Self {
        let mut upload = self.clone();
        upload.constituents_count = upload.constituents.as_ref().map_or(0, Vec::len) as u64;
        upload.created = Some(WireDateTime::now());
        upload.last_modified = Some(WireDateTime::now());
        upload.owner_id = None;
        upload
    }
}

/// Response to `GetFilter`, `CreateFilter`, `UpdateFilter` and `DeleteFilter`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EconomicFilterResponse {
    #[serde(default)]
    pub filter: Option<EconomicFilter>,
    pub response_status: FilterResponseStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Constituents rejected as unknown or malformed during create/update.
    #[serde(default)]
    pub item_errors: Option<Vec<String>>,
    #[serde(default)]
    pub properties: Option<Vec<Property>>,
}

impl EconomicFilterResponse {
    pub fn is_success(&self) -> bool {
        self.response_status == FilterResponseStatus::Success
    }
}

/// Response to `GetAllFilters`. Constituent lists are omitted; only counts
/// are populated.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EconomicFiltersListResponse {
    #[serde(default)]
    pub filters: Option<Vec<EconomicFilter>>,
    #[serde(default)]
    pub filter_count: u64,
    pub response_status: FilterResponseStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub properties: Option<Vec<Property>>,
}

impl EconomicFiltersListResponse {
    pub fn is_success(&self) -> bool {
        self.response_status == FilterResponseStatus::Success
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetAllFiltersRequest {
    get_types: FilterScope,
    properties: Option<Vec<Property>>,
    token_value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FilterIdRequest {
    filter_id: String,
    properties: Option<Vec<Property>>,
    token_value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FilterUploadRequest<'a> {
    filter: &'a EconomicFilter,
    properties: Option<Vec<Property>>,
    token_value: String,
    update_action: FilterUpdateAction,
}

/// Client for the economic filter service: filter CRUD plus the change-feed
/// query implemented in the `changes` module.
#[derive(Debug)]
pub struct EconomicFiltersClient {
    session: SessionManager,
}

impl EconomicFiltersClient {
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
        let invoker = Invoker::new(transport, config.effective_timeout(FILTER_SERVICE_TIMEOUT));
        let session = SessionManager::new(credential, config.economic_filter_url(), invoker);
        session.authenticate()?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn get_all_filters(
        &self,
        scope: FilterScope,
    ) -> Result<EconomicFiltersListResponse, DswsError> {
        info!(scope = ?scope, "requesting all filters");
        let token = self.session.ensure_valid()?;
        let request = GetAllFiltersRequest {
            get_types: scope,
            properties: None,
            token_value: token.value,
        };
        self.session
            .invoker()
            .post_json(&self.session.operation_url("GetAllFilters"), &request)
    }

    pub fn get_filter(&self, filter_id: &str) -> Result<EconomicFilterResponse, DswsError> {
        validate_filter_id(filter_id)?;
        info!(filter_id, "requesting filter");
        let token = self.session.ensure_valid()?;
        let request = FilterIdRequest {
            filter_id: filter_id.to_owned(),
            properties: None,
            token_value: token.value,
        };
        self.session
            .invoker()
            .post_json(&self.session.operation_url("GetFilter"), &request)
    }

    pub fn create_filter(
        &self,
        filter: &EconomicFilter,
    ) -> Result<EconomicFilterResponse, DswsError> {
        self.upload_filter("CreateFilter", filter, FilterUpdateAction::CreateFilter)
    }

    pub fn update_filter(
        &self,
        filter: &EconomicFilter,
        action: FilterUpdateAction,
    ) -> Result<EconomicFilterResponse, DswsError> {
        if action == FilterUpdateAction::CreateFilter {
            return Err(DswsError::Configuration(String::from(
                "update_filter cannot be called with the CreateFilter action",
            )));
        }
        self.upload_filter("UpdateFilter", filter, action)
    }

    pub fn delete_filter(&self, filter_id: &str) -> Result<EconomicFilterResponse, DswsError> {
        validate_filter_id(filter_id)?;
        info!(filter_id, "deleting filter");
        let token = self.session.ensure_valid()?;
        let request = FilterIdRequest {
            filter_id: filter_id.to_owned(),
            properties: None,
            token_value: token.value,
        };
        self.session
            .invoker()
            .post_json(&self.session.operation_url("DeleteFilter"), &request)
    }

    fn upload_filter(
        &self,
        operation: &str,
        filter: &EconomicFilter,
        action: FilterUpdateAction,
    ) -> Result<EconomicFilterResponse, DswsError> {
        filter.validate(action)?;
        info!(operation, filter_id = %filter.filter_id, "uploading filter");
        let token = self.session.ensure_valid()?;
        let upload = filter.prepared_for_upload();
        let request = FilterUploadRequest {
            filter: &upload,
            properties: None,
            token_value: token.value,
            update_action: action,
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
    fn filter_id_bounds_and_charset() {
        assert!(validate_filter_id("AB").is_err());
        assert!(validate_filter_id("VALID_FILTER_1").is_ok());
        assert!(validate_filter_id("ABCDE").is_ok());
        assert!(validate_filter_id(&"A".repeat(45)).is_ok());
        assert!(validate_filter_id(&"A".repeat(46)).is_err());
        assert!(validate_filter_id("BAD-FILTER").is_err());
        assert!(validate_filter_id("").is_err());
    }

    #[test]
    fn constituent_bounds_apply_to_list_actions_only() {
        let empty = EconomicFilter {
            constituents: None,
            ..EconomicFilter::new("MY_FILTER", vec![])
        };
        assert!(matches!(
            empty.validate(FilterUpdateAction::ReplaceConstituents),
            Err(ValidationError::ConstituentsOutOfRange { count: 0, .. })
        ));
        // description updates may omit the list entirely
        assert!(empty.validate(FilterUpdateAction::UpdateDescription).is_ok());

        let populated = EconomicFilter::new("MY_FILTER", vec![String::from("USGDP...D")]);
        assert!(populated
            .validate(FilterUpdateAction::AppendConstituents)
            .is_ok());
    }

    #[test]
    fn upload_derives_count_and_clears_owner() {
        let mut filter = EconomicFilter::new(
            "MY_FILTER",
            vec![String::from("USGDP...D"), String::from("UKXRUSD.")],
        );
        filter.constituents_count = 99;
        filter.owner_id = Some(String::from("PARENT1"));

        let upload = filter.prepared_for_upload();
        assert_eq!(upload.constituents_count, 2);
        assert_eq!(upload.owner_id, None);
    }

    #[test]
    fn decodes_filter_response_with_item_errors() {
        let body = r#"{
            "Filter": {
                "FilterId": "MY_FILTER",
                "Description": "test",
                "Constituents": ["USGDP...D"],
                "ConstituentsCount": 1,
                "Created": "/Date(1700000000000)/",
                "LastModified": "/Date(1700000000000+0000)/",
                "OwnerId": "PARENT1",
                "Shared": false
            },
            "ResponseStatus": 0,
            "ErrorMessage": null,
            "ItemErrors": ["BOGUS123"],
            "Properties": null
        }"#;

        let response: EconomicFilterResponse = serde_json::from_str(body).expect("must decode");
        assert!(response.is_success());
        let filter = response.filter.expect("filter present");
        assert_eq!(filter.filter_id, "MY_FILTER");
        assert_eq!(response.item_errors.as_deref(), Some(&[String::from("BOGUS123")][..]));
    }
}

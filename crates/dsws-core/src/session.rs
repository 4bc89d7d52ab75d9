use std::fmt::{Debug, Formatter};
use std::sync::{Mutex, PoisonError};

use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use crate::error::{DswsError, ValidationError};
use crate::wire::{find_property, Property, TokenRequest, TokenResponse};

/// Tokens are renewed when a call arrives within this lead time of expiry, so
/// a multi-minute batch of calls cannot straddle expiry mid-flight. Fixed
/// policy, not configurable.
pub const RENEWAL_LEAD: Duration = Duration::minutes(15);

/// Identity string sent in the `__AppId` token-request property.
pub const APP_ID: &str = concat!("dsws-core/", env!("CARGO_PKG_VERSION"));

// Stub identity shipped in sample configuration; rejected before any network call.
const PLACEHOLDER_USERNAME: &str = "YourID";

/// Service identity and secret. Immutable for the session's lifetime and
/// never logged.
#[derive(Clone)]
pub struct Credential {
    username: String,
    password: String,
}

impl Credential {
    pub fn new(username: &str, password: &str) -> Result<Self, ValidationError> {
        let username = username.trim();
        let password = password.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ValidationError::EmptyCredentials);
        }
        if username == PLACEHOLDER_USERNAME {
            return Err(ValidationError::PlaceholderCredentials);
        }

        Ok(Self {
            username: username.to_owned(),
            password: password.to_owned(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Time-limited opaque credential issued by the service, plus the auxiliary
/// browse endpoints advertised alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub expiry: OffsetDateTime,
    pub navigator_series_url: Option<String>,
    pub navigator_datatypes_url: Option<String>,
}

impl Token {
    fn from_response(response: TokenResponse) -> Self {
        let properties = response.properties.unwrap_or_default();
        Self {
            value: response.token_value,
            expiry: response.token_expiry.into_inner(),
            navigator_series_url: find_property(&properties, "NavigatorSeries")
                .map(str::to_owned),
            navigator_datatypes_url: find_property(&properties, "NavigatorDatatypes")
                .map(str::to_owned),
        }
    }

    /// True once the token is at or past the renewal threshold.
    pub fn needs_renewal(&self, now: OffsetDateTime) -> bool {
        self.expiry <= now + RENEWAL_LEAD
    }
}

/// Owns the credential and the cached token; every outbound call passes
/// through [`SessionManager::ensure_valid`] first.
///
/// The token cache sits behind a mutex so concurrent callers sharing one
/// session never perform redundant renewals or observe a half-updated token.
pub struct SessionManager {
    credential: Credential,
    service_url: String,
    invoker: crate::transport::Invoker,
    token: Mutex<Option<Token>>,
}

impl SessionManager {
    pub fn new(
        credential: Credential,
        service_url: String,
        invoker: crate::transport::Invoker,
    ) -> Self {
        Self {
            credential,
            service_url,
            invoker,
            token: Mutex::new(None),
        }
    }

    /// One-time token issuance. Must succeed before any other operation.
    pub fn authenticate(&self) -> Result<Token, DswsError> {
        let mut guard = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        let token = self.request_token()?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Returns the cached token, renewing it first when within
    /// [`RENEWAL_LEAD`] of expiry. No network call is made otherwise.
    pub fn ensure_valid(&self) -> Result<Token, DswsError> {
        let mut guard = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        let current = guard
            .as_ref()
            .ok_or(ValidationError::NotAuthenticated)?;

        if current.needs_renewal(OffsetDateTime::now_utc()) {
            debug!("session token within renewal lead; refreshing");
            let fresh = self.request_token()?;
            *guard = Some(fresh.clone());
            return Ok(fresh);
        }

        Ok(current.clone())
    }

    /// True iff a non-empty token is held, regardless of whether its expiry
    /// has passed. The time check belongs to [`SessionManager::ensure_valid`].
    pub fn is_valid(&self) -> bool {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|token| !token.value.is_empty())
    }

    /// Snapshot of the cached token, if any.
    pub fn token(&self) -> Option<Token> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    pub fn invoker(&self) -> &crate::transport::Invoker {
        &self.invoker
    }

    pub fn operation_url(&self, operation: &str) -> String {
        format!("{}{operation}", self.service_url)
    }

    fn request_token(&self) -> Result<Token, DswsError> {
        info!(username = %self.credential.username(), "requesting session token");
        let request = TokenRequest {
            user_name: self.credential.username().to_owned(),
            password: self.credential.password().to_owned(),
            properties: vec![
                Property::string("__AppId", APP_ID),
                Property::string("ReturnOptions", "NavigatorSeries,NavigatorDatatypes"),
            ],
        };

        let response: TokenResponse = self
            .invoker
            .post_json(&self.operation_url("GetToken"), &request)?;
        info!("session token received");
        Ok(Token::from_response(response))
    }
}

impl Debug for SessionManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("credential", &self.credential)
            .field("service_url", &self.service_url)
            .field("authenticated", &self.is_valid())
            .finish()
    }
}

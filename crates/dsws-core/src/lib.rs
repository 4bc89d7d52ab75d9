//! Client core for the Datastream user-created-items and economic-changes
//! web services.
//!
//! This crate contains:
//! - The authenticated session manager with renew-before-expiry token caching
//! - The JSON request/response envelope and `/Date()/` wire date codec
//! - The transport invoker and its fault classification
//! - The economic change-feed cursor protocol and filter management
//! - Shared model and generic operations for the five user-created item types

pub mod changes;
pub mod config;
pub mod error;
pub mod filters;
pub mod objects;
pub mod session;
pub mod transport;
pub mod wire;

pub use changes::{
    prior_working_weekday, ChangeBacklog, ChangeQuery, ChangesResponse, EconomicUpdate,
    UpdateFrequency, MAX_LOOKBACK_DAYS, MAX_PAGE_ITEMS, MIN_POLL_INTERVAL,
};
pub use config::{
    ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, ECONOMIC_FILTER_SERVICE_PATH,
    FILTER_SERVICE_TIMEOUT, USER_DATA_SERVICE_PATH,
};
pub use error::{DswsError, TransportError, ValidationError};
pub use filters::{
    validate_filter_id, EconomicFilter, EconomicFilterResponse, EconomicFiltersClient,
    EconomicFiltersListResponse, FilterResponseStatus, FilterScope, FilterUpdateAction,
    MAX_CONSTITUENTS,
};
pub use objects::{
    AccessRight, ObjectFrequency, ObjectResponseStatus, ShareType, UserObjectClient,
    UserObjectResponse, UserObjectType, UserObjectsResponse,
};
pub use session::{Credential, SessionManager, Token, APP_ID, RENEWAL_LEAD};
pub use transport::{
    HttpError, HttpRequest, HttpResponse, HttpTransport, Invoker, ReqwestTransport,
};
pub use wire::{find_property, FaultBody, Property, TokenRequest, TokenResponse, WireDateTime};

//! Wire protocol: the JSON envelope shared by every operation and the
//! `/Date(<millis>)/` sentinel codec.

pub mod date;
pub mod envelope;

pub use date::WireDateTime;
pub use envelope::{find_property, FaultBody, Property, TokenRequest, TokenResponse};

//! Economic change-feed cursor protocol.
//!
//! The service keeps an append-only log of change-and-correction
//! notifications, each tagged with a monotonically increasing sequence
//! identifier. Polling is two-phase: resolve a calendar date to a starting
//! sequence, then page forward from that sequence until no updates are
//! pending. Callers persist the final sequence between poll cycles and should
//! wait at least [`MIN_POLL_INTERVAL`] before resuming.

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, Weekday};
use tracing::{debug, info};

use crate::error::{DswsError, TransportError, ValidationError};
use crate::filters::{validate_filter_id, EconomicFiltersClient, FilterResponseStatus};
use crate::wire::{Property, WireDateTime};

/// The service rejects resolve-mode dates further back than this; the client
/// enforces it before sending.
pub const MAX_LOOKBACK_DAYS: i64 = 28;

/// One page carries at most this many updates; a larger backlog sets the
/// pending flag.
pub const MAX_PAGE_ITEMS: usize = 10_000;

/// Recommended minimum interval between resume polls once the backlog is
/// drained. Caller policy; nothing here sleeps.
pub const MIN_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(600);

/// Update cadence of a changed series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum UpdateFrequency {
    Daily = 0,
    Weekly = 1,
    Monthly = 2,
    Quarterly = 3,
    SemiAnnually = 4,
    Annually = 5,
}

impl From<UpdateFrequency> for u8 {
    fn from(value: UpdateFrequency) -> Self {
        value as Self
    }
}

impl TryFrom<u8> for UpdateFrequency {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Daily),
            1 => Ok(Self::Weekly),
            2 => Ok(Self::Monthly),
            3 => Ok(Self::Quarterly),
            4 => Ok(Self::SemiAnnually),
            5 => Ok(Self::Annually),
            other => Err(format!("unknown update frequency {other}")),
        }
    }
}

/// One change-or-correction notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EconomicUpdate {
    /// Mnemonic of the series that changed, e.g. `USGDP...D`.
    pub series: String,
    pub frequency: UpdateFrequency,
    /// When the service received notification of the change, UTC.
    pub updated: WireDateTime,
}

/// Query surface for `GetEconomicChanges`. The two request modes are mutually
/// exclusive by construction, so a date and a sequence can never be supplied
/// together.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeQuery {
    /// Resolve the first update from midnight of the most recent prior
    /// working weekday. Computed server-side.
    Default,
    /// Resolve the first update at or after the given instant. Day-level
    /// precision; at most [`MAX_LOOKBACK_DAYS`] in the past. Future dates
    /// resolve to the next update yet to occur.
    FromDate(OffsetDateTime),
    /// Page through updates strictly after the given sequence, optionally
    /// restricted to a named filter's constituents.
    FromSequence {
        sequence: u64,
        filter: Option<String>,
    },
}

impl ChangeQuery {
    fn validate(&self, now: OffsetDateTime) -> Result<(), ValidationError> {
        match self {
            Self::Default => Ok(()),
            Self::FromDate(date) => {
                let lookback = (now - *date).whole_days();
                if lookback > MAX_LOOKBACK_DAYS {
                    return Err(ValidationError::LookbackExceeded {
                        days: lookback,
                        max: MAX_LOOKBACK_DAYS,
                    });
                }
                Ok(())
            }
            Self::FromSequence { sequence, filter } => {
                if *sequence == 0 {
                    return Err(ValidationError::ZeroSequence);
                }
                if let Some(filter) = filter {
                    validate_filter_id(filter)?;
                }
                Ok(())
            }
        }
    }
}

/// Midnight UTC of the most recent weekday strictly before `from`. This is
/// the date the service assumes when no date and no sequence are supplied.
pub fn prior_working_weekday(from: OffsetDateTime) -> OffsetDateTime {
    let mut date = from.date();
    while let Some(previous) = date.previous_day() {
        date = previous;
        if !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday) {
            break;
        }
    }
    date.midnight().assume_utc()
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ChangesRequest {
    token_value: String,
    start_date: Option<WireDateTime>,
    sequence_id: u64,
    filter: Option<String>,
    properties: Option<Vec<Property>>,
}

/// Response to `GetEconomicChanges`, covering both request modes.
///
/// In resolve mode `next_sequence_id` is the starting cursor and
/// `pending_count` the backlog size from that point. In page mode, while
/// `updates_pending` is true the cursor names the next page to fetch; once
/// false it names the position to resume from on a future poll.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangesResponse {
    #[serde(default)]
    pub next_sequence_id: u64,
    #[serde(default)]
    pub filter_id: Option<String>,
    #[serde(default)]
    pub updates_count: u64,
    #[serde(default)]
    pub updates: Option<Vec<EconomicUpdate>>,
    #[serde(default)]
    pub updates_pending: bool,
    #[serde(default)]
    pub pending_count: u64,
    pub response_status: FilterResponseStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub properties: Option<Vec<Property>>,
}

impl ChangesResponse {
    pub fn is_success(&self) -> bool {
        self.response_status == FilterResponseStatus::Success
    }
}

/// Everything drained from the backlog by [`EconomicFiltersClient::collect_pending`].
#[derive(Debug, Clone)]
pub struct ChangeBacklog {
    pub updates: Vec<EconomicUpdate>,
    /// Sequence to persist and resume from on the next poll cycle.
    pub next_sequence: u64,
    pub response_status: FilterResponseStatus,
    pub error_message: Option<String>,
}

impl EconomicFiltersClient {
    /// One change-feed call: resolve mode when the query carries a date (or
    /// is `Default`), page mode when it carries a non-zero sequence. Local
    /// validation failures never reach the network.
    pub fn get_economic_changes(&self, query: &ChangeQuery) -> Result<ChangesResponse, DswsError> {
        query.validate(OffsetDateTime::now_utc())?;

        let (start_date, sequence_id, filter) = match query {
            ChangeQuery::Default => (None, 0, None),
            ChangeQuery::FromDate(date) => (Some(WireDateTime::midnight_of(*date)), 0, None),
            ChangeQuery::FromSequence { sequence, filter } => {
                (None, *sequence, filter.clone())
            }
        };

        match query {
            ChangeQuery::Default => info!("requesting default update sequence"),
            ChangeQuery::FromDate(_) => info!("resolving update sequence from date"),
            ChangeQuery::FromSequence { sequence, .. } => {
                info!(sequence, "requesting updates from sequence")
            }
        }

        let token = self.session().ensure_valid()?;
        let request = ChangesRequest {
            token_value: token.value,
            start_date,
            sequence_id,
            filter,
            properties: None,
        };

        self.session()
            .invoker()
            .post_json(&self.session().operation_url("GetEconomicChanges"), &request)
    }

    /// Drains the backlog from `start_sequence`: pages while the service
    /// reports updates pending, concatenating the pages in call order. Stops
    /// early on a non-success status, which is carried in the result for the
    /// caller to branch on.
    pub fn collect_pending(
        &self,
        start_sequence: u64,
        filter: Option<&str>,
    ) -> Result<ChangeBacklog, DswsError> {
        let mut updates = Vec::new();
        let mut sequence = start_sequence;

        loop {
            let page = self.get_economic_changes(&ChangeQuery::FromSequence {
                sequence,
                filter: filter.map(str::to_owned),
            })?;

            if !page.is_success() {
                return Ok(ChangeBacklog {
                    updates,
                    next_sequence: sequence,
                    response_status: page.response_status,
                    error_message: page.error_message,
                });
            }

            if let Some(mut batch) = page.updates {
                updates.append(&mut batch);
            }

            if !page.updates_pending {
                debug!(
                    total = updates.len(),
                    next_sequence = page.next_sequence_id,
                    "backlog drained"
                );
                return Ok(ChangeBacklog {
                    updates,
                    next_sequence: page.next_sequence_id,
                    response_status: page.response_status,
                    error_message: page.error_message,
                });
            }

            // A pending page that fails to advance the cursor would loop forever.
            if page.next_sequence_id <= sequence {
                return Err(TransportError::JsonDecode(format!(
                    "service reported updates pending without advancing the cursor past {sequence}"
                ))
                .into());
            }
            sequence = page.next_sequence_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::Duration;

    #[test]
    fn monday_resolves_to_prior_friday() {
        // 2024-06-10 is a Monday
        let resolved = prior_working_weekday(datetime!(2024-06-10 09:30 UTC));
        assert_eq!(resolved, datetime!(2024-06-07 00:00 UTC));
    }

    #[test]
    fn midweek_resolves_to_previous_day() {
        // 2024-06-12 is a Wednesday
        let resolved = prior_working_weekday(datetime!(2024-06-12 17:00 UTC));
        assert_eq!(resolved, datetime!(2024-06-11 00:00 UTC));
    }

    #[test]
    fn lookback_window_is_enforced_locally() {
        let now = OffsetDateTime::now_utc();
        let too_old = ChangeQuery::FromDate(now - Duration::days(29));
        assert!(matches!(
            too_old.validate(now),
            Err(ValidationError::LookbackExceeded { days: 29, max: 28 })
        ));

        let in_window = ChangeQuery::FromDate(now - Duration::days(5));
        assert!(in_window.validate(now).is_ok());

        // future dates resolve to the next update yet to occur
        let future = ChangeQuery::FromDate(now + Duration::days(2));
        assert!(future.validate(now).is_ok());
    }

    #[test]
    fn page_mode_requires_nonzero_sequence_and_valid_filter() {
        let now = OffsetDateTime::now_utc();

        let zero = ChangeQuery::FromSequence {
            sequence: 0,
            filter: None,
        };
        assert_eq!(zero.validate(now), Err(ValidationError::ZeroSequence));

        let bad_filter = ChangeQuery::FromSequence {
            sequence: 7,
            filter: Some(String::from("AB")),
        };
        assert!(matches!(
            bad_filter.validate(now),
            Err(ValidationError::InvalidFilterId { .. })
        ));

        let good = ChangeQuery::FromSequence {
            sequence: 7,
            filter: Some(String::from("VALID_FILTER_1")),
        };
        assert!(good.validate(now).is_ok());
    }

    #[test]
    fn decodes_changes_response() {
        let body = r#"{
            "NextSequenceId": 1051,
            "FilterId": "VALID_FILTER_1",
            "UpdatesCount": 2,
            "Updates": [
                {"Series": "USGDP...D", "Frequency": 0, "Updated": "/Date(1700000000000)/"},
                {"Series": "UKXRUSD.", "Frequency": 2, "Updated": "/Date(1700000300000)/"}
            ],
            "UpdatesPending": true,
            "PendingCount": 12000,
            "ResponseStatus": 0,
            "ErrorMessage": null,
            "Properties": null
        }"#;

        let response: ChangesResponse = serde_json::from_str(body).expect("must decode");
        assert!(response.is_success());
        assert_eq!(response.next_sequence_id, 1051);
        assert!(response.updates_pending);
        let updates = response.updates.expect("updates present");
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].series, "USGDP...D");
        assert_eq!(updates[1].frequency, UpdateFrequency::Monthly);
    }
}

//! Behavior tests for the session manager: token issuance, the
//! renew-before-expiry policy, and credential prechecks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dsws_core::{
    ClientConfig, DswsError, EconomicFiltersClient, HttpError, HttpRequest, HttpResponse,
    HttpTransport, ValidationError,
};
use time::{Duration, OffsetDateTime};

/// Deterministic offline transport: replays canned outcomes in order and
/// records every request it sees.
struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().expect("lock").len()
    }

    fn request(&self, index: usize) -> HttpRequest {
        self.requests.lock().expect("lock")[index].clone()
    }
}

impl HttpTransport for ScriptedTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.requests.lock().expect("lock").push(request);
        self.responses
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::new("scripted transport exhausted")))
    }
}

fn token_body(value: &str, expiry: OffsetDateTime) -> HttpResponse {
    let millis = (expiry - OffsetDateTime::UNIX_EPOCH).whole_milliseconds();
    HttpResponse::ok_json(format!(
        r#"{{"TokenValue":"{value}","TokenExpiry":"/Date({millis})/","Properties":[{{"Key":"navigatorseries","Value":"https://navigator.example/series"}},{{"Key":"Unrecognized","Value":"ignored"}}]}}"#
    ))
}

fn connect(transport: Arc<ScriptedTransport>) -> EconomicFiltersClient {
    let config = ClientConfig::new("user1", "pwd1");
    EconomicFiltersClient::with_transport(&config, transport).expect("connect must succeed")
}

#[test]
fn connect_issues_exactly_one_token_request() {
    let transport = ScriptedTransport::new(vec![Ok(token_body(
        "tok-1",
        OffsetDateTime::now_utc() + Duration::hours(24),
    ))]);
    let client = connect(Arc::clone(&transport));

    assert_eq!(transport.calls(), 1);
    let request = transport.request(0);
    assert!(request.url.ends_with("GetToken"));
    // the issuance body carries credentials but never a TokenValue field
    let body: serde_json::Value = serde_json::from_str(&request.body).expect("json body");
    assert_eq!(body["UserName"], "user1");
    assert!(body.get("TokenValue").is_none());

    assert!(client.session().is_valid());
}

#[test]
fn fresh_token_is_reused_without_network_calls() {
    let expiry = OffsetDateTime::now_utc() + Duration::hours(24);
    let transport = ScriptedTransport::new(vec![Ok(token_body("tok-1", expiry))]);
    let client = connect(Arc::clone(&transport));

    let token = client.session().ensure_valid().expect("token");
    let again = client.session().ensure_valid().expect("token");

    assert_eq!(transport.calls(), 1, "no renewal traffic for a fresh token");
    assert_eq!(token.value, "tok-1");
    assert_eq!(token.expiry, again.expiry, "expiry must be left unchanged");
}

#[test]
fn token_within_fifteen_minutes_of_expiry_is_renewed() {
    let near = OffsetDateTime::now_utc() + Duration::minutes(10);
    let fresh = OffsetDateTime::now_utc() + Duration::hours(24);
    let transport = ScriptedTransport::new(vec![
        Ok(token_body("tok-1", near)),
        Ok(token_body("tok-2", fresh)),
    ]);
    let client = connect(Arc::clone(&transport));

    let token = client.session().ensure_valid().expect("token");

    assert_eq!(transport.calls(), 2, "renewal must perform one round-trip");
    assert_eq!(token.value, "tok-2");
    assert!(transport.request(1).url.ends_with("GetToken"));
}

#[test]
fn stale_token_still_counts_as_logged_on_but_triggers_renewal() {
    let stale = OffsetDateTime::now_utc() - Duration::hours(1);
    let fresh = OffsetDateTime::now_utc() + Duration::hours(24);
    let transport = ScriptedTransport::new(vec![
        Ok(token_body("tok-1", stale)),
        Ok(token_body("tok-2", fresh)),
    ]);
    let client = connect(Arc::clone(&transport));

    // is_valid ignores expiry; the time check belongs to ensure_valid
    assert!(client.session().is_valid());

    let token = client.session().ensure_valid().expect("token");
    assert_eq!(token.value, "tok-2");
    assert_eq!(transport.calls(), 2);
}

#[test]
fn auxiliary_endpoints_are_harvested_case_insensitively() {
    let transport = ScriptedTransport::new(vec![Ok(token_body(
        "tok-1",
        OffsetDateTime::now_utc() + Duration::hours(24),
    ))]);
    let client = connect(transport);

    let token = client.session().token().expect("token cached");
    assert_eq!(
        token.navigator_series_url.as_deref(),
        Some("https://navigator.example/series")
    );
    // the response advertised no datatypes endpoint; unknown keys were ignored
    assert_eq!(token.navigator_datatypes_url, None);
}

#[test]
fn placeholder_credentials_fail_before_any_network_call() {
    let transport = ScriptedTransport::new(vec![]);
    let config = ClientConfig::new("YourID", "pwd1");

    let err = EconomicFiltersClient::with_transport(&config, Arc::clone(&transport) as Arc<dyn HttpTransport>)
        .expect_err("must fail");
    assert_eq!(
        err,
        DswsError::Validation(ValidationError::PlaceholderCredentials)
    );
    assert_eq!(transport.calls(), 0);
}

#[test]
fn empty_credentials_fail_before_any_network_call() {
    let transport = ScriptedTransport::new(vec![]);
    let config = ClientConfig::new("user1", "");

    let err = EconomicFiltersClient::with_transport(&config, Arc::clone(&transport) as Arc<dyn HttpTransport>)
        .expect_err("must fail");
    assert_eq!(err, DswsError::Validation(ValidationError::EmptyCredentials));
    assert_eq!(transport.calls(), 0);
}

#[test]
fn bad_credentials_surface_the_service_fault() {
    let transport = ScriptedTransport::new(vec![Ok(HttpResponse {
        status: 403,
        body: String::from(r#"{"Code":"0100","SubCode":"01","Message":"bad creds"}"#),
    })]);
    let config = ClientConfig::new("user1", "wrong");

    let err = EconomicFiltersClient::with_transport(&config, transport as Arc<dyn HttpTransport>)
        .expect_err("must fail");
    assert_eq!(
        err,
        DswsError::ServiceFault {
            code: String::from("0100"),
            subcode: String::from("01"),
            message: String::from("bad creds"),
        }
    );
    assert!(!err.is_retryable());
}

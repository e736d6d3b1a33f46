//! One outbound request and the status indicator that tracks it.
//!
//! Every request issued by the kit gets a status node placed in the region
//! that asked for it. The node walks `Pending -> Error` or disappears on a
//! silent success; an error keeps enough information around to retry the
//! exact same request.

use std::time::{Duration, Instant};

use derive_more::Display;

use crate::protocol::csrf::{get_cookie, CSRF_COOKIE, CSRF_FORM_FIELD, CSRF_HEADER};

pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Method {
    #[display("GET")]
    Get,
    #[display("POST")]
    Post,
}

/// `application/x-www-form-urlencoded` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    fields: Vec<(String, String)>,
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `name` if present, append it otherwise.
    pub fn set(&mut self, name: &str, value: &str) -> &mut Self {
        match self.fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, old)) => *old = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields.iter())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    /// Path relative to the server root, e.g. `/api/problems/id</3`.
    pub url: String,
    pub form: Option<FormBody>,
    pub headers: Vec<(String, String)>,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            form: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>, form: FormBody) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            form: Some(form),
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attach the CSRF token from `cookies` both as a form field and as a
    /// header. Mutating requests are rejected by the server without it.
    pub fn with_csrf(mut self, cookies: &str) -> Self {
        let token = get_cookie(cookies, CSRF_COOKIE);
        self.form
            .get_or_insert_with(FormBody::new)
            .set(CSRF_FORM_FIELD, &token);
        self.headers.retain(|(name, _)| name != CSRF_HEADER);
        self.headers.push((CSRF_HEADER.to_string(), token));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What came back over the wire, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub date: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            content_type: None,
            date: None,
            body: body.into(),
        }
    }

    /// Media type without parameters, e.g. `text/plain`.
    pub fn media_type(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or("")
            .split(' ')
            .next()
            .unwrap_or("")
            .split(';')
            .next()
            .unwrap_or("")
    }
}

/// Failures reported by the transport itself, before an HTTP status exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Network(String),
    Timeout,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum RequestError {
    #[display("Network error")]
    Network,
    #[display("Request timeout")]
    Timeout,
    #[display("Request aborted")]
    Aborted,
    #[display("{}", http_error_text(*status, status_text, message.as_deref()))]
    Http {
        status: u16,
        status_text: String,
        message: Option<String>,
    },
    #[display("Response parse error")]
    Parse,
}

/// 400 is how the server reports a rejected request; its body says
/// everything.
fn http_error_text(status: u16, status_text: &str, message: Option<&str>) -> String {
    let mut out = String::new();
    if status != 400 {
        out.push_str(&format!("Error: {status}"));
        if !status_text.is_empty() && status_text != "OK" {
            out.push(' ');
            out.push_str(status_text);
        }
    }
    if let Some(message) = message {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(message);
    }
    out
}

impl std::error::Error for RequestError {}

impl From<TransportError> for RequestError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(_) => RequestError::Network,
            TransportError::Timeout => RequestError::Timeout,
            TransportError::Aborted => RequestError::Aborted,
        }
    }
}

/// Only 200 counts as success. A non-empty `text/plain` body of an error
/// response is shown to the operator.
pub fn classify_response(
    result: Result<HttpResponse, TransportError>,
) -> Result<HttpResponse, RequestError> {
    let response = result.map_err(|err| {
        if let TransportError::Network(detail) = &err {
            log::warn!("request failed: {detail}");
        }
        RequestError::from(err)
    })?;
    if response.status == 200 {
        return Ok(response);
    }
    let message = (!response.body.is_empty() && response.media_type() == "text/plain")
        .then(|| response.body.clone());
    Err(RequestError::Http {
        status: response.status,
        status_text: response.status_text,
        message,
    })
}

/// JSON body of a successful response; an empty body is `None`.
pub fn parse_json(response: &HttpResponse) -> Result<Option<serde_json::Value>, RequestError> {
    if response.body.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&response.body).map(Some).map_err(|err| {
        log::error!("response parse error: {err}");
        RequestError::Parse
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusState {
    Pending { request: RequestId, started: Instant },
    Error { message: String },
    Success { message: String },
}

/// Status node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusIndicator {
    pub state: StatusState,
}

impl StatusIndicator {
    pub fn pending(request: RequestId, started: Instant) -> Self {
        Self {
            state: StatusState::Pending { request, started },
        }
    }

    /// The abort control shows up only after the request has been pending
    /// for `delay`.
    pub fn abort_visible(&self, now: Instant, delay: Duration) -> bool {
        match self.state {
            StatusState::Pending { started, .. } => now.saturating_duration_since(started) >= delay,
            _ => false,
        }
    }

    pub fn can_retry(&self) -> bool {
        matches!(self.state, StatusState::Error { .. })
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        match self.state {
            StatusState::Pending { request, .. } => Some(request),
            _ => None,
        }
    }

    pub fn lines(&self) -> usize {
        match &self.state {
            StatusState::Pending { .. } => 1,
            // message plus the retry control
            StatusState::Error { message } => message.lines().count().max(1) + 1,
            StatusState::Success { message } => message.lines().count().max(1),
        }
    }
}

/// Handed to API response handlers so they can leave a message behind.
/// Leaving it untouched removes the indicator.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusReport {
    outcome: Option<StatusState>,
}

impl StatusReport {
    pub fn show_success(&mut self, message: impl Into<String>) {
        self.outcome = Some(StatusState::Success {
            message: message.into(),
        });
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        self.outcome = Some(StatusState::Error {
            message: message.into(),
        });
    }

    pub fn into_state(self) -> Option<StatusState> {
        self.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, status_text: &str, content_type: Option<&str>, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            status_text: status_text.to_string(),
            content_type: content_type.map(str::to_string),
            date: None,
            body: body.to_string(),
        }
    }

    #[test]
    fn transport_errors_have_fixed_messages() {
        let cases = [
            (TransportError::Network("refused".into()), "Network error"),
            (TransportError::Timeout, "Request timeout"),
            (TransportError::Aborted, "Request aborted"),
        ];
        for (err, msg) in cases {
            assert_eq!(classify_response(Err(err)).unwrap_err().to_string(), msg);
        }
    }

    #[test]
    fn http_error_messages() {
        let err = classify_response(Ok(response(500, "Internal Server Error", None, "boom")));
        assert_eq!(err.unwrap_err().to_string(), "Error: 500 Internal Server Error");

        let err = classify_response(Ok(response(404, "OK", Some("text/plain; charset=utf-8"), "No such problem")));
        assert_eq!(err.unwrap_err().to_string(), "Error: 404\nNo such problem");

        let err = classify_response(Ok(response(400, "Bad Request", Some("text/plain"), "Invalid name")));
        assert_eq!(err.unwrap_err().to_string(), "Invalid name");

        let err = classify_response(Ok(response(403, "", Some("text/html"), "<p>no</p>")));
        assert_eq!(err.unwrap_err().to_string(), "Error: 403");
    }

    #[test]
    fn only_200_is_success() {
        assert!(classify_response(Ok(response(200, "OK", None, "{}"))).is_ok());
        assert!(classify_response(Ok(response(204, "No Content", None, ""))).is_err());
    }

    #[test]
    fn json_parsing() {
        assert_eq!(parse_json(&HttpResponse::ok("")).unwrap(), None);
        assert!(parse_json(&HttpResponse::ok("{\"a\":1}")).unwrap().is_some());
        assert_eq!(parse_json(&HttpResponse::ok("{")), Err(RequestError::Parse));
    }

    #[test]
    fn csrf_token_goes_to_form_and_header() {
        let spec = RequestSpec::post("/api/logs/web", FormBody::new())
            .with_csrf("session=1; csrf_token=abc");
        assert_eq!(spec.header("X-CSRF-Token"), Some("abc"));
        assert_eq!(spec.form.as_ref().unwrap().get("csrf_token"), Some("abc"));
        assert_eq!(spec.form.unwrap().encode(), "csrf_token=abc");
    }

    #[test]
    fn abort_control_appears_after_delay() {
        let started = Instant::now();
        let status = StatusIndicator::pending(1, started);
        let delay = Duration::from_millis(1500);
        assert!(!status.abort_visible(started + Duration::from_millis(1000), delay));
        assert!(status.abort_visible(started + Duration::from_millis(1500), delay));
    }
}

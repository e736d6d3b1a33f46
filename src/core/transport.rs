//! How requests leave the process.
//!
//! The kit never blocks: `send` only hands the request over, and the outcome
//! later arrives on the completion bus.

use std::{collections::HashSet, sync::Arc, time::Duration};

use flume::Sender;
use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::core::{
    bus::Completion,
    request::{HttpResponse, Method, RequestId, RequestSpec, TransportError},
    task_manager::spawn_blocking_task,
};

pub trait Transport {
    fn send(&mut self, id: RequestId, spec: &RequestSpec);

    /// Abort an in-flight request. Its completion is `TransportError::Aborted`.
    fn abort(&mut self, id: RequestId);
}

/// Requests whose completion has not been reported yet. Whoever claims an id
/// first, the worker or an abort, reports it; the other stays silent.
#[derive(Debug, Clone, Default)]
struct InFlightSet(Arc<Mutex<HashSet<RequestId>>>);

impl InFlightSet {
    fn begin(&self, id: RequestId) {
        self.0.lock().insert(id);
    }

    fn claim(&self, id: RequestId) -> bool {
        self.0.lock().remove(&id)
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// HTTP transport running each request on the worker runtime.
pub struct UreqTransport {
    agent: ureq::Agent,
    base_url: String,
    cookies: String,
    handle: Handle,
    completion_tx: Sender<Completion>,
    in_flight: InFlightSet,
}

impl UreqTransport {
    pub fn new(
        base_url: &str,
        cookies: &str,
        default_timeout: Option<Duration>,
        handle: Handle,
        completion_tx: Sender<Completion>,
    ) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(default_timeout)
            .tls_config(
                ureq::tls::TlsConfig::builder()
                    .provider(ureq::tls::TlsProvider::NativeTls)
                    .build(),
            )
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookies: cookies.to_string(),
            handle,
            completion_tx,
            in_flight: InFlightSet::default(),
        }
    }

    /// Requests still waiting for their completion.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }
}

impl Transport for UreqTransport {
    fn send(&mut self, id: RequestId, spec: &RequestSpec) {
        let agent = self.agent.clone();
        let url = format!("{}{}", self.base_url, spec.url);
        let cookies = self.cookies.clone();
        let spec = spec.clone();
        let tx = self.completion_tx.clone();
        let in_flight = self.in_flight.clone();
        in_flight.begin(id);

        log::debug!("{} {url} (request {id})", spec.method);
        spawn_blocking_task(&self.handle, move || {
            let result = perform(&agent, &url, &cookies, &spec);
            if !in_flight.claim(id) {
                log::debug!("dropping response of aborted request {id}");
                return;
            }
            if tx.send(Completion { id, result }).is_err() {
                log::warn!("completion of request {id} has no receiver");
            }
        });
    }

    fn abort(&mut self, id: RequestId) {
        if !self.in_flight.claim(id) {
            log::debug!("request {id} already completed, nothing to abort");
            return;
        }
        if let Err(err) = self.completion_tx.send(Completion {
            id,
            result: Err(TransportError::Aborted),
        }) {
            log::warn!("failed to report abort of request {id}: {err}");
        }
    }
}

fn perform(
    agent: &ureq::Agent,
    url: &str,
    cookies: &str,
    spec: &RequestSpec,
) -> Result<HttpResponse, TransportError> {
    let response = match spec.method {
        Method::Get => {
            let mut request = agent.get(url);
            if !cookies.is_empty() {
                request = request.header("Cookie", cookies);
            }
            for (name, value) in &spec.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if spec.timeout.is_some() {
                request = request.config().timeout_global(spec.timeout).build();
            }
            request.call()
        }
        Method::Post => {
            let mut request = agent.post(url);
            if !cookies.is_empty() {
                request = request.header("Cookie", cookies);
            }
            for (name, value) in &spec.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            let body = spec.form.as_ref().map(|form| form.encode()).unwrap_or_default();
            if spec.timeout.is_some() {
                request = request.config().timeout_global(spec.timeout).build();
            }
            request
                .content_type("application/x-www-form-urlencoded")
                .send(body)
        }
    };

    let mut response = response.map_err(|err| match err {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        other => TransportError::Network(other.to_string()),
    })?;

    let status = response.status();
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let content_type = header("content-type");
    let date = header("date");
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|err| TransportError::Network(err.to_string()))?;

    Ok(HttpResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        content_type,
        date,
        body,
    })
}

/// Transport that never touches the network. Requests are recorded and
/// completed explicitly, which makes every interleaving reproducible.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    sent: Arc<Mutex<Vec<(RequestId, RequestSpec)>>>,
    aborted: Arc<Mutex<Vec<RequestId>>>,
    completion_tx: Sender<Completion>,
}

impl ScriptedTransport {
    pub fn new(completion_tx: Sender<Completion>) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            aborted: Arc::new(Mutex::new(Vec::new())),
            completion_tx,
        }
    }

    /// All requests sent so far, oldest first.
    pub fn sent(&self) -> Vec<(RequestId, RequestSpec)> {
        self.sent.lock().clone()
    }

    pub fn last(&self) -> Option<(RequestId, RequestSpec)> {
        self.sent.lock().last().cloned()
    }

    pub fn aborted(&self) -> Vec<RequestId> {
        self.aborted.lock().clone()
    }

    pub fn complete(&self, id: RequestId, result: Result<HttpResponse, TransportError>) {
        if self.completion_tx.send(Completion { id, result }).is_err() {
            log::warn!("scripted completion of request {id} has no receiver");
        }
    }

    pub fn respond(&self, id: RequestId, body: &str) {
        self.complete(id, Ok(HttpResponse::ok(body)));
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, id: RequestId, spec: &RequestSpec) {
        self.sent.lock().push((id, spec.clone()));
    }

    fn abort(&mut self, id: RequestId) {
        self.aborted.lock().push(id);
        self.complete(id, Err(TransportError::Aborted));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bus::Bus;

    #[test]
    fn scripted_transport_records_and_completes() {
        let bus = Bus::new();
        let mut transport = ScriptedTransport::new(bus.completion_tx.clone());
        let handle = transport.clone();

        transport.send(7, &RequestSpec::get("/api/jobs"));
        assert_eq!(handle.sent().len(), 1);
        assert_eq!(handle.last().unwrap().1.url, "/api/jobs");

        handle.respond(7, "{}");
        transport.abort(8);
        let done = bus.drain();
        assert_eq!(done.len(), 2);
        assert_eq!(done[0].result, Ok(HttpResponse::ok("{}")));
        assert_eq!(done[1].result, Err(TransportError::Aborted));
        assert_eq!(handle.aborted(), vec![8]);
    }

    #[test]
    fn in_flight_id_is_claimed_once() {
        let set = InFlightSet::default();
        set.begin(3);
        assert!(set.claim(3));
        assert!(!set.claim(3));
        assert!(!set.claim(4));
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn abort_after_completion_is_a_no_op() {
        let runtime = crate::core::task_manager::build_worker_runtime().unwrap();
        let bus = Bus::new();
        let mut transport = UreqTransport::new(
            "http://127.0.0.1:9",
            "",
            Some(Duration::from_millis(500)),
            runtime.handle().clone(),
            bus.completion_tx.clone(),
        );
        transport.send(1, &RequestSpec::get("/api/jobs"));
        let done = bus.completion_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(done.id, 1);
        assert!(done.result.is_err());

        transport.abort(1);
        assert_eq!(transport.pending(), 0);
        assert!(bus.drain().is_empty());
        runtime.shutdown_background();
    }
}

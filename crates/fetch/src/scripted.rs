use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::transport::{HttpResponse, HttpTransport, TransportError};

#[derive(Debug, Clone)]
enum Step {
    Respond(HttpResponse),
    Fail(String),
}

/// In-memory transport replaying canned responses per URL prefix.
///
/// Each prefix owns a queue of steps; the last step repeats once the queue is
/// drained. The longest registered prefix of a requested URL wins. Unknown
/// URLs fail with a network error. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Step>>>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for URLs starting with `prefix`.
    pub fn respond(self, prefix: &str, response: HttpResponse) -> Self {
        self.push(prefix, Step::Respond(response));
        self
    }

    /// Queue a 200 response with a JSON body.
    pub fn respond_json(self, prefix: &str, body: serde_json::Value) -> Self {
        self.respond(prefix, HttpResponse::ok(body.to_string()))
    }

    /// Queue a network failure for URLs starting with `prefix`.
    pub fn fail(self, prefix: &str, message: &str) -> Self {
        self.push(prefix, Step::Fail(message.to_string()));
        self
    }

    /// Queue `n` network failures.
    pub fn fail_times(mut self, prefix: &str, n: usize) -> Self {
        for i in 0..n {
            self = self.fail(prefix, &format!("scripted failure {}", i + 1));
        }
        self
    }

    fn push(&self, prefix: &str, step: Step) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.entry(prefix.to_string()).or_default().push_back(step);
        }
    }

    /// Number of requests whose URL starts with `prefix`.
    pub fn calls(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .map(|r| r.iter().filter(|(url, _)| url.starts_with(prefix)).count())
            .unwrap_or(0)
    }

    /// All requested URLs with their headers, in call order.
    pub fn requests(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_step(&self, url: &str) -> Option<Step> {
        let mut routes = self.routes.lock().ok()?;
        let key = routes
            .keys()
            .filter(|prefix| url.starts_with(prefix.as_str()))
            .max_by_key(|prefix| prefix.len())?
            .clone();
        let queue = routes.get_mut(&key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((url.to_string(), headers.to_vec()));
        }
        match self.next_step(url) {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail(message)) => Err(TransportError::Network(message)),
            None => Err(TransportError::Network(format!(
                "no scripted response for {url}"
            ))),
        }
    }
}

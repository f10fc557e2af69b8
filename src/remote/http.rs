use std::{sync::OnceLock, thread, time::Duration};

use reqwest::{blocking::Client, header};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{common::multipolygon_to_value, config::BackendConfig};

use super::{BackendError, ImageBackend, RegionRequest};

const MAX_ERROR_BODY: usize = 512; // Bytes of an error response kept for the message

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self { BackendConfig::default().retry_policy() }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based), capped at `max_backoff`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        self.initial_backoff.mul_f64(factor).min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    /// `sleep` is called between attempts.
    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, BackendError>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T, BackendError> {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= self.max_attempts => {
                    return Err(if attempt == 1 { err } else {
                        BackendError::RetriesExhausted { attempts: attempt, last: Box::new(err) }
                    });
                }
                Err(err) => {
                    let delay = self.delay(attempt);
                    warn!("[remote] attempt {attempt}/{} failed ({err}); retrying in {delay:?}", self.max_attempts);
                    sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

/// Authenticated connection state, built on first use.
#[derive(Debug)]
struct Session {
    client: Client,
    url: String,
}

impl Session {
    fn connect(config: &BackendConfig) -> Result<Self, BackendError> {
        let endpoint = config.endpoint.as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| BackendError::Config("no backend endpoint set ([backend] endpoint)".into()))?;
        let token = std::env::var(&config.token_env)
            .map_err(|_| BackendError::Config(format!("environment variable {} is not set", config.token_env)))?;

        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| BackendError::Config(format!("{} contains invalid header characters", config.token_env)))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent(concat!("urbanheat/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| BackendError::Config(format!("failed to build HTTP client: {e}")))?;

        let url = format!("{}/v1/reduce-region", endpoint.trim_end_matches('/'));
        debug!("[remote] session ready for {url}");
        Ok(Self { client, url })
    }
}

/// Decode a `{"value": number | null}` reply. The key is required: a reply
/// without it (an error payload, `{}`) is a failure, not an empty result.
fn decode_reduce_response(text: &str) -> Result<Option<f64>, BackendError> {
    let reply: Value = serde_json::from_str(text)
        .map_err(|e| BackendError::Decode(format!("invalid JSON: {e}")))?;
    match reply.get("value") {
        Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64()
            .map(Some)
            .ok_or_else(|| BackendError::Decode(format!("value {n} is not a float"))),
        Some(other) => Err(BackendError::Decode(format!("value must be a number or null, got {other}"))),
        None => {
            let mut reply = reply.to_string();
            truncate_at_char_boundary(&mut reply, MAX_ERROR_BODY);
            Err(BackendError::Decode(format!("reply has no \"value\": {reply}")))
        }
    }
}

fn truncate_at_char_boundary(text: &mut String, max: usize) {
    if let Some(cut) = (0..=max).rev().find(|&i| text.is_char_boundary(i)) {
        text.truncate(cut);
    }
}

/// HTTP client for the region-reduction service.
///
/// Construction is free: credentials are read and the HTTP client is built on
/// the first request, then reused for the lifetime of the handle.
#[derive(Debug)]
pub struct HttpBackend {
    config: BackendConfig,
    retry: RetryPolicy,
    session: OnceLock<Session>,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Self {
        let retry = config.retry_policy();
        Self { config, retry, session: OnceLock::new() }
    }

    fn session(&self) -> Result<&Session, BackendError> {
        if let Some(session) = self.session.get() {
            return Ok(session);
        }
        let session = Session::connect(&self.config)?;
        Ok(self.session.get_or_init(|| session))
    }

    fn request_body(request: &RegionRequest<'_>) -> Value {
        let dataset = request.dataset;
        let mut body = json!({
            "collection": dataset.collection,
            "band": dataset.band,
            "composite": dataset.composite.as_str(),
            "reducer": "mean",
            "scale": dataset.scale_m,
            "geometry": multipolygon_to_value(request.region),
        });
        if let Some(dates) = request.dates {
            body["start_date"] = json!(dates.start_iso());
            body["end_date"] = json!(dates.end_exclusive_iso());
        }
        body
    }

    fn send_once(session: &Session, body: &Value) -> Result<Option<f64>, BackendError> {
        let resp = session.client.post(&session.url).json(body).send()?;
        let status = resp.status();
        if !status.is_success() {
            let mut text = resp.text().unwrap_or_default();
            truncate_at_char_boundary(&mut text, MAX_ERROR_BODY);
            return Err(BackendError::Status { status: status.as_u16(), body: text });
        }
        // Body read failures (including timeouts) go through From<reqwest::Error>.
        decode_reduce_response(&resp.text()?)
    }
}

impl ImageBackend for HttpBackend {
    fn reduce_region(&self, request: &RegionRequest<'_>) -> Result<Option<f64>, BackendError> {
        let session = self.session()?;
        let body = Self::request_body(request);
        debug!(
            "[remote] reduce {}/{} scale={}m",
            request.dataset.collection, request.dataset.band, request.dataset.scale_m,
        );
        self.retry.run(|| Self::send_once(session, &body), thread::sleep)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        io::{BufRead, BufReader, Read, Write},
        net::TcpListener,
    };

    use geo::polygon;

    use super::*;
    use crate::{dates::DateRange, remote::Dataset};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            multiplier: 2.0,
        }
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let p = policy(5);
        assert_eq!(p.delay(1), Duration::from_millis(100));
        assert_eq!(p.delay(2), Duration::from_millis(200));
        assert_eq!(p.delay(3), Duration::from_millis(350));
        assert_eq!(p.delay(9), Duration::from_millis(350));
    }

    #[test]
    fn retries_transient_errors_until_success() {
        let calls = Cell::new(0);
        let mut slept = Vec::new();
        let result = policy(4).run(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 { Err(BackendError::Timeout) } else { Ok(Some(1.0)) }
            },
            |d| slept.push(d),
        );
        assert_eq!(result.unwrap(), Some(1.0));
        assert_eq!(calls.get(), 3);
        assert_eq!(slept, vec![Duration::from_millis(100), Duration::from_millis(200)]);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), _> = policy(3).run(
            || { calls.set(calls.get() + 1); Err(BackendError::Timeout) },
            |_| {},
        );
        let err = result.unwrap_err();
        assert_eq!(calls.get(), 3);
        assert!(matches!(err, BackendError::RetriesExhausted { attempts: 3, .. }));
        assert!(err.is_timeout());
    }

    #[test]
    fn client_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = policy(5).run(
            || {
                calls.set(calls.get() + 1);
                Err(BackendError::Status { status: 403, body: "forbidden".into() })
            },
            |_| panic!("must not sleep"),
        );
        assert!(matches!(result, Err(BackendError::Status { status: 403, .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn server_errors_and_throttling_are_retryable() {
        assert!(BackendError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(BackendError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!BackendError::Decode("bad json".into()).is_retryable());
        assert!(!BackendError::Config("missing".into()).is_retryable());
    }

    #[test]
    fn missing_endpoint_is_a_config_error() {
        let backend = HttpBackend::new(BackendConfig::default());
        let region = geo::MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]]);
        let request = RegionRequest { dataset: &Dataset::POPULATION_DENSITY, dates: None, region: &region };
        assert!(matches!(backend.reduce_region(&request), Err(BackendError::Config(_))));
    }

    #[test]
    fn request_body_carries_dataset_scale_and_dates() {
        let region = geo::MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]]);
        let dates = DateRange::parse("2024-06-01", "2024-07-01").unwrap();
        let request = RegionRequest { dataset: &Dataset::VEGETATION_INDEX, dates: Some(&dates), region: &region };
        let body = HttpBackend::request_body(&request);
        assert_eq!(body["collection"], "MODIS/061/MOD13A2");
        assert_eq!(body["band"], "NDVI");
        assert_eq!(body["scale"], 500.0);
        assert_eq!(body["composite"], "mean");
        assert_eq!(body["start_date"], "2024-06-01");
        assert_eq!(body["end_date"], "2024-07-02");
        assert_eq!(body["geometry"]["type"], "MultiPolygon");
    }

    #[test]
    fn reply_without_value_key_is_a_decode_error() {
        assert_eq!(decode_reduce_response(r#"{"value": null}"#).unwrap(), None);
        assert_eq!(decode_reduce_response(r#"{"value": 15000}"#).unwrap(), Some(15_000.0));
        assert!(matches!(decode_reduce_response("{}"), Err(BackendError::Decode(_))));
        assert!(matches!(
            decode_reduce_response(r#"{"error": "quota exceeded"}"#),
            Err(BackendError::Decode(msg)) if msg.contains("quota exceeded"),
        ));
        assert!(matches!(decode_reduce_response(r#"{"value": "12"}"#), Err(BackendError::Decode(_))));
        assert!(matches!(decode_reduce_response("<html>"), Err(BackendError::Decode(_))));
    }

    /// Serve one HTTP exchange on a local port: read the request, then write
    /// `head` and `body`, optionally stalling before the connection closes.
    fn serve_once(head: String, body: Vec<u8>, stall: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() { break }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = reader.into_inner();
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(&body).unwrap();
            stream.flush().unwrap();
            std::thread::sleep(stall);
        });
        format!("http://{addr}/v1/reduce-region")
    }

    fn respond(status: &str, body: &str) -> String {
        let head = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len(),
        );
        serve_once(head, body.as_bytes().to_vec(), Duration::ZERO)
    }

    fn local_session(url: String, timeout: Duration) -> Session {
        Session { client: Client::builder().timeout(timeout).build().unwrap(), url }
    }

    #[test]
    fn send_once_decodes_values_and_nulls() {
        let body = json!({"collection": "x"});
        let session = local_session(respond("200 OK", r#"{"value": 15700}"#), Duration::from_secs(5));
        assert_eq!(HttpBackend::send_once(&session, &body).unwrap(), Some(15_700.0));

        let session = local_session(respond("200 OK", r#"{"value": null}"#), Duration::from_secs(5));
        assert_eq!(HttpBackend::send_once(&session, &body).unwrap(), None);

        let session = local_session(respond("200 OK", r#"{"error": "quota exceeded"}"#), Duration::from_secs(5));
        assert!(matches!(HttpBackend::send_once(&session, &body), Err(BackendError::Decode(_))));
    }

    #[test]
    fn send_once_maps_status_and_truncates_body() {
        let long = "é".repeat(400); // 800 bytes, two per char
        let session = local_session(respond("503 Service Unavailable", &long), Duration::from_secs(5));
        let err = HttpBackend::send_once(&session, &json!({})).unwrap_err();
        let BackendError::Status { status, body } = &err else { panic!("expected a status error, got {err:?}") };
        assert_eq!(*status, 503);
        assert_eq!(body.len(), MAX_ERROR_BODY);
        assert!(err.is_retryable());

        let session = local_session(respond("403 Forbidden", "denied"), Duration::from_secs(5));
        let err = HttpBackend::send_once(&session, &json!({})).unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 403, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn stalled_reply_body_is_retryable_not_a_decode_error() {
        let head = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 64\r\n\r\n".to_string();
        let url = serve_once(head, br#"{"value":"#.to_vec(), Duration::from_secs(3));
        let session = local_session(url, Duration::from_millis(300));
        let err = HttpBackend::send_once(&session, &json!({})).unwrap_err();
        assert!(matches!(err, BackendError::Timeout | BackendError::Transport(_)), "got {err:?}");
        assert!(err.is_retryable());
    }
}

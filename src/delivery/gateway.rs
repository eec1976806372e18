/// Fire-and-forget delivery of readings to the collector
use log::{debug, error};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::transport::{Transport, TransportResponse};
use crate::config::Configuration;
use crate::models::Reading;
use crate::utils::format_datetime;

const CURRENT_CONDITIONS_ROUTE: &str = "v1/current";

/// What happened to one reading. Only tests look at this; the scheduler drops it.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Delivered,
    Rejected {
        status: Option<u16>,
        message: Option<String>,
    },
    Unreachable {
        error: String,
    },
}

/// Pushes readings to `{api}/v1/current`. Every reading gets exactly one attempt.
#[derive(Clone)]
pub struct DeliveryGateway {
    transport: Arc<dyn Transport>,
    endpoint: String,
    headers: Arc<Vec<(String, String)>>,
    in_flight: Option<Arc<Semaphore>>,
}

impl DeliveryGateway {
    pub fn new(transport: Arc<dyn Transport>, config: &Configuration) -> Self {
        let endpoint = format!(
            "{}/{}",
            config.api.as_str().trim_end_matches('/'),
            CURRENT_CONDITIONS_ROUTE
        );
        let headers = vec![
            ("x-api-key".to_string(), config.api_key.clone()),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];

        Self {
            transport,
            endpoint,
            headers: Arc::new(headers),
            in_flight: None,
        }
    }

    /// Cap the number of deliveries in flight. Dispatch never blocks; excess deliveries
    /// wait for a permit inside their own task.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.in_flight = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit a reading and return immediately. The handle may be dropped.
    pub fn dispatch(&self, reading: Reading) -> JoinHandle<DeliveryOutcome> {
        let gateway = self.clone();
        tokio::spawn(async move {
            // Permit is held until the delivery finishes
            let _permit = match &gateway.in_flight {
                Some(limit) => Arc::clone(limit).acquire_owned().await.ok(),
                None => None,
            };
            gateway.deliver(&reading).await
        })
    }

    /// Deliver one reading and log the outcome
    pub async fn deliver(&self, reading: &Reading) -> DeliveryOutcome {
        let timestamp = format_datetime(&reading.time);

        let payload = match serde_json::to_string(reading) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize reading from {}: {}", timestamp, e);
                return DeliveryOutcome::Rejected {
                    status: None,
                    message: Some(e.to_string()),
                };
            }
        };

        let response = self
            .transport
            .post(&self.endpoint, payload, &self.headers)
            .await;
        let outcome = classify(response);

        match self.failure_report(&timestamp, &outcome) {
            Some(report) => error!("{}", report),
            None => debug!("Delivered current conditions from {}", timestamp),
        }

        outcome
    }

    /// Log line for a failed delivery: the server's message when it sent one, otherwise
    /// a hint that the collector may be unreachable with whatever detail is known
    fn failure_report(&self, timestamp: &str, outcome: &DeliveryOutcome) -> Option<String> {
        let detail = match outcome {
            DeliveryOutcome::Delivered => return None,
            DeliveryOutcome::Rejected {
                status,
                message: Some(message),
            } => {
                let status = status.map_or_else(|| "none".to_string(), |s| s.to_string());
                return Some(format!(
                    "Collector rejected current conditions from {} (status {}): {}",
                    timestamp, status, message
                ));
            }
            DeliveryOutcome::Rejected {
                status: Some(status),
                message: None,
            } => format!("status {} without a message", status),
            DeliveryOutcome::Rejected {
                status: None,
                message: None,
            } => "no response".to_string(),
            DeliveryOutcome::Unreachable { error } => error.clone(),
        };

        Some(format!(
            "Failed to deliver current conditions from {}: collector at {} may be unreachable: {}",
            timestamp, self.endpoint, detail
        ))
    }
}

/// Pull a server-provided message out of a response body: the `message` field of a
/// JSON body, or the raw text otherwise.
fn server_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn classify(response: TransportResponse) -> DeliveryOutcome {
    if response.ok {
        return DeliveryOutcome::Delivered;
    }

    match (response.status, response.body) {
        (status @ Some(_), body) => DeliveryOutcome::Rejected {
            status,
            message: body
                .as_deref()
                .map(server_message)
                .filter(|message| !message.trim().is_empty()),
        },
        (None, Some(body)) => DeliveryOutcome::Rejected {
            status: None,
            message: Some(server_message(&body)),
        },
        (None, None) => DeliveryOutcome::Unreachable {
            error: response
                .error
                .unwrap_or_else(|| "no response".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigOverrides, ConfigResolver};
    use crate::models::CurrentConditions;
    use crate::units::RainCollectorSize;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use time::macros::datetime;
    use tokio::time::{sleep, Instant};

    #[derive(Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<(String, String, Vec<(String, String)>)>>,
        response: TransportResponse,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn post(
            &self,
            url: &str,
            payload: String,
            headers: &[(String, String)],
        ) -> TransportResponse {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), payload, headers.to_vec()));
            self.response.clone()
        }
    }

    /// Transport that takes a second per POST and tracks how many overlap
    #[derive(Default)]
    struct SlowTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        posts: AtomicUsize,
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn post(
            &self,
            _url: &str,
            _payload: String,
            _headers: &[(String, String)],
        ) -> TransportResponse {
            self.posts.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            sleep(Duration::from_secs(1)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            TransportResponse {
                ok: true,
                status: Some(200),
                ..Default::default()
            }
        }
    }

    fn config(api: &str) -> Configuration {
        ConfigResolver::new(ConfigOverrides {
            api: Some(api.to_string()),
            api_key: Some("key-123".to_string()),
            path: Some("COM5".to_string()),
            rain_collector_size: Some(RainCollectorSize::Mm02),
            ..Default::default()
        })
        .resolve()
        .unwrap()
        .config
    }

    fn reading() -> Reading {
        Reading::new(
            datetime!(2024-05-01 08:30:00 UTC),
            CurrentConditions {
                temperature_out: Some(18.5),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn posts_json_with_credentials_to_current_route() {
        let transport = Arc::new(RecordingTransport {
            response: TransportResponse {
                ok: true,
                status: Some(200),
                ..Default::default()
            },
            ..Default::default()
        });
        let gateway = DeliveryGateway::new(transport.clone(), &config("http://host/api"));

        assert_eq!(gateway.deliver(&reading()).await, DeliveryOutcome::Delivered);

        let calls = transport.calls.lock().unwrap();
        let (url, payload, headers) = &calls[0];
        assert_eq!(url, "http://host/api/v1/current");
        assert!(headers.contains(&("x-api-key".to_string(), "key-123".to_string())));
        assert!(headers.contains(&("Content-Type".to_string(), "application/json".to_string())));

        let body: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(body["time"], "2024-05-01T08:30:00Z");
        assert_eq!(body["temperature_out"], 18.5);
        assert!(body["pressure"].is_null());
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let transport = Arc::new(RecordingTransport::default());
        let gateway = DeliveryGateway::new(transport, &config("http://host/api/"));
        assert_eq!(gateway.endpoint(), "http://host/api/v1/current");
    }

    #[test]
    fn classifies_failures() {
        let rejected = classify(TransportResponse {
            ok: false,
            status: Some(401),
            body: Some(r#"{"message":"invalid api key"}"#.to_string()),
            error: None,
        });
        assert_eq!(
            rejected,
            DeliveryOutcome::Rejected {
                status: Some(401),
                message: Some("invalid api key".to_string()),
            }
        );

        let unreachable = classify(TransportResponse::unreachable("connection refused"));
        assert_eq!(
            unreachable,
            DeliveryOutcome::Unreachable {
                error: "connection refused".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn error_status_without_body_reports_unreachable_hint() {
        let transport = Arc::new(RecordingTransport {
            response: TransportResponse {
                ok: false,
                status: Some(500),
                body: Some(String::new()),
                error: None,
            },
            ..Default::default()
        });
        let gateway = DeliveryGateway::new(transport, &config("http://host/api"));

        let outcome = gateway.deliver(&reading()).await;
        assert_eq!(
            outcome,
            DeliveryOutcome::Rejected {
                status: Some(500),
                message: None,
            }
        );

        let report = gateway
            .failure_report("01.05.2024 - 08:30:00", &outcome)
            .unwrap();
        assert!(report.contains("http://host/api/v1/current may be unreachable"));
        assert!(report.contains("status 500"));
    }

    #[test]
    fn failure_report_prefers_server_message() {
        let transport = Arc::new(RecordingTransport::default());
        let gateway = DeliveryGateway::new(transport, &config("http://host/api"));

        let rejected = DeliveryOutcome::Rejected {
            status: Some(401),
            message: Some("invalid api key".to_string()),
        };
        let report = gateway.failure_report("now", &rejected).unwrap();
        assert!(report.ends_with("(status 401): invalid api key"));
        assert!(!report.contains("unreachable"));

        let unreachable = DeliveryOutcome::Unreachable {
            error: "connection refused".to_string(),
        };
        let report = gateway.failure_report("now", &unreachable).unwrap();
        assert!(report.ends_with("may be unreachable: connection refused"));

        assert_eq!(gateway.failure_report("now", &DeliveryOutcome::Delivered), None);
    }

    #[tokio::test]
    async fn dispatch_returns_before_delivery_completes() {
        let transport = Arc::new(RecordingTransport::default());
        let gateway =
            DeliveryGateway::new(transport.clone(), &config("http://host/api")).with_max_in_flight(1);

        let handle = gateway.dispatch(reading());
        assert!(transport.calls.lock().unwrap().is_empty());

        let outcome = handle.await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Unreachable { .. }));
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_cap_limits_concurrent_posts() {
        let transport = Arc::new(SlowTransport::default());
        let gateway =
            DeliveryGateway::new(transport.clone(), &config("http://host/api")).with_max_in_flight(2);

        let started = Instant::now();
        let handles: Vec<_> = (0..3).map(|_| gateway.dispatch(reading())).collect();
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(transport.posts.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(500)).await;
        assert_eq!(transport.posts.load(Ordering::SeqCst), 2);
        assert_eq!(transport.in_flight.load(Ordering::SeqCst), 2);

        for handle in handles {
            assert_eq!(handle.await.unwrap(), DeliveryOutcome::Delivered);
        }
        assert_eq!(transport.posts.load(Ordering::SeqCst), 3);
        assert_eq!(transport.peak.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn uncapped_gateway_posts_everything_at_once() {
        let transport = Arc::new(SlowTransport::default());
        let gateway = DeliveryGateway::new(transport.clone(), &config("http://host/api"));

        let started = Instant::now();
        let handles: Vec<_> = (0..3).map(|_| gateway.dispatch(reading())).collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(transport.peak.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }
}

//! Status reporter: pushes phase changes to the coordinator.
//!
//! Every push is a synchronous `POST <coordinator>/status/` that waits for the
//! coordinator's verdict. Anything but HTTP 200 with reply code OK is an error
//! the caller treats as fatal.

use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tgo_common::{KvBundle, ReplyCode, StatusMsg, StatusReply};
use tracing::{debug, error, info, warn};

use crate::environment::Fleet;
use crate::errors::StatusError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How often an unreachable coordinator is retried before giving up.
///
/// Protocol rejections are never retried. The default makes a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Raw outcome of one status round trip.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub http_status: u16,
    pub body: String,
}

impl Exchange {
    /// Decode the coordinator's reply. An empty body reads as a bare OK.
    pub fn reply(&self) -> Result<StatusReply, StatusError> {
        if self.body.trim().is_empty() {
            return Ok(StatusReply::default());
        }
        serde_json::from_str(&self.body).map_err(StatusError::InvalidReply)
    }
}

pub struct StatusReporter {
    client: reqwest::Client,
    status_url: String,
    retry: RetryPolicy,
}

impl StatusReporter {
    /// `coordinator_url` must end in `/`.
    pub fn new(coordinator_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            status_url: format!("{}status/", coordinator_url),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn status_url(&self) -> &str {
        &self.status_url
    }

    /// One round trip, without judging the answer.
    pub async fn send(&self, msg: &StatusMsg) -> Result<Exchange, StatusError> {
        let body = serde_json::to_vec(msg).map_err(StatusError::Marshal)?;
        let transport = |source| StatusError::Transport {
            url: self.status_url.clone(),
            source,
        };

        let resp = self
            .client
            .post(&self.status_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(transport)?;
        let http_status = resp.status().as_u16();
        let body = resp.text().await.map_err(transport)?;

        Ok(Exchange { http_status, body })
    }

    /// Push `msg` and insist on an OK verdict.
    pub async fn post(&self, msg: &StatusMsg) -> Result<StatusReply, StatusError> {
        let mut attempt = 1;
        let exchange = loop {
            match self.send(msg).await {
                Ok(exchange) => break exchange,
                Err(e) if e.is_transient() && attempt < self.retry.attempts => {
                    warn!(attempt, error = %e, "status push failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => {
                    error!(error = %e, "PostStatus returned error");
                    return Err(e);
                }
            }
        };

        if exchange.http_status != 200 {
            error!(code = exchange.http_status, "Bad HTTP response code");
            return Err(StatusError::BadHttpStatus {
                status: exchange.http_status,
            });
        }

        let reply = exchange.reply()?;
        debug!(?reply, "status reply");
        if reply.reply_code != ReplyCode::Ok {
            error!(
                label = %msg.state,
                code = %reply.reply_code,
                "coordinator is not happy with status"
            );
            return Err(StatusError::Rejected {
                label: msg.state.clone(),
                code: reply.reply_code,
                status: reply.status,
            });
        }
        Ok(reply)
    }

    /// Push a status on behalf of app `index` of the fleet.
    ///
    /// The bundle is only attached when it has a name and at least one entry.
    pub async fn report(
        &self,
        fleet: &Fleet,
        index: usize,
        label: &str,
        bundle: Option<KvBundle>,
    ) -> Result<StatusReply, StatusError> {
        let app = fleet.app(index);
        let msg = StatusMsg::new(label, &fleet.instance().inst_name, &app.uid).with_bundle(bundle);
        let reply = self.post(&msg).await?;
        info!(app = %app.name, label, "posted status");
        Ok(reply)
    }

    /// Push a status for this agent itself.
    pub async fn report_self(&self, fleet: &Fleet, label: &str) -> Result<StatusReply, StatusError> {
        let msg = StatusMsg::new(label, &fleet.instance().inst_name, fleet.self_uid());
        let reply = self.post(&msg).await?;
        info!(label, reply_code = %reply.reply_code, "posted own status");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        Coordinator, SharedCoordinator, app, fleet, request_count, serve_coordinator,
        start_coordinator,
    };
    use axum::http::StatusCode;

    fn two_apps() -> Fleet {
        let mut me = app("tgo");
        me.uid = "tgo-1".into();
        fleet(vec![me, app("prog2")])
    }

    #[test]
    fn test_retry_policy_floor() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
        assert_eq!(RetryPolicy::default(), RetryPolicy::none());
    }

    #[test]
    fn test_status_url() {
        let reporter = StatusReporter::new("http://coord:8100/");
        assert_eq!(reporter.status_url(), "http://coord:8100/status/");
    }

    #[tokio::test]
    async fn test_report_ok() {
        let (url, coord) = start_coordinator(Coordinator::default()).await;
        let reporter = StatusReporter::new(&url);

        let reply = reporter.report(&two_apps(), 1, "INIT", None).await.unwrap();
        assert_eq!(reply.reply_code, ReplyCode::Ok);

        let received = &coord.lock().unwrap().received;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].state, "INIT");
        assert_eq!(received[0].inst_name, "main");
        assert_eq!(received[0].uid, "prog2");
        assert!(received[0].kv.is_none());
    }

    #[tokio::test]
    async fn test_report_self_uses_own_uid() {
        let (url, coord) = start_coordinator(Coordinator::default()).await;
        let reporter = StatusReporter::new(&url);
        reporter.report_self(&two_apps(), "READY").await.unwrap();
        assert_eq!(coord.lock().unwrap().received[0].uid, "tgo-1");
    }

    #[tokio::test]
    async fn test_extended_report_carries_bundle() {
        let (url, coord) = start_coordinator(Coordinator::default()).await;
        let reporter = StatusReporter::new(&url);
        let mut bundle = KvBundle::new("testresults");
        bundle.push("passed", "3");

        reporter
            .report(&two_apps(), 1, "DONE", Some(bundle))
            .await
            .unwrap();
        let received = &coord.lock().unwrap().received;
        assert_eq!(received[0].kv.as_ref().unwrap().get("passed"), Some("3"));
    }

    #[tokio::test]
    async fn test_http_500_is_bad_http_status() {
        let (url, _coord) = start_coordinator(Coordinator {
            http: StatusCode::INTERNAL_SERVER_ERROR,
            ..Default::default()
        })
        .await;
        let reporter = StatusReporter::new(&url);
        let err = reporter.report(&two_apps(), 1, "INIT", None).await.unwrap_err();
        assert!(matches!(err, StatusError::BadHttpStatus { status: 500 }));
    }

    #[tokio::test]
    async fn test_non_ok_reply_is_rejected() {
        let (url, _coord) = start_coordinator(Coordinator {
            code: ReplyCode::NoSuchInstance,
            ..Default::default()
        })
        .await;
        let reporter = StatusReporter::new(&url);
        let err = reporter.report(&two_apps(), 1, "INIT", None).await.unwrap_err();
        match err {
            StatusError::Rejected { label, code, .. } => {
                assert_eq!(label, "INIT");
                assert_eq!(code, ReplyCode::NoSuchInstance);
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_does_not_judge() {
        let (url, _coord) = start_coordinator(Coordinator {
            code: ReplyCode::InvalidState,
            ..Default::default()
        })
        .await;
        let reporter = StatusReporter::new(&url);
        let exchange = reporter
            .send(&StatusMsg::new("YACK", "main", "prog2"))
            .await
            .unwrap();
        assert_eq!(exchange.http_status, 200);
        assert_eq!(exchange.reply().unwrap().reply_code, ReplyCode::InvalidState);
    }

    #[tokio::test]
    async fn test_unreachable_coordinator_is_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let reporter = StatusReporter::new(&format!("http://{}/", addr))
            .with_retry(RetryPolicy::new(2, Duration::from_millis(10)));
        let err = reporter.report(&two_apps(), 1, "INIT", None).await.unwrap_err();
        assert!(matches!(err, StatusError::Transport { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_transport_failure_is_retried_until_the_coordinator_answers() {
        // Reserve a port, then bring the coordinator up on it after the
        // first attempt has failed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let reporter = StatusReporter::new(&format!("http://{}/", addr))
            .with_retry(RetryPolicy::new(20, Duration::from_millis(50)));
        let coord: SharedCoordinator = Default::default();
        let late = coord.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            serve_coordinator(listener, late).await;
        });

        let reply = reporter.report(&two_apps(), 1, "INIT", None).await.unwrap();
        assert_eq!(reply.reply_code, ReplyCode::Ok);
        assert_eq!(request_count(&coord), 1);
    }

    #[tokio::test]
    async fn test_bad_http_status_is_not_retried() {
        let (url, coord) = start_coordinator(Coordinator {
            http: StatusCode::INTERNAL_SERVER_ERROR,
            ..Default::default()
        })
        .await;
        let reporter =
            StatusReporter::new(&url).with_retry(RetryPolicy::new(3, Duration::from_millis(10)));
        let err = reporter.report(&two_apps(), 1, "INIT", None).await.unwrap_err();
        assert!(matches!(err, StatusError::BadHttpStatus { status: 500 }));
        assert_eq!(request_count(&coord), 1);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let (url, coord) = start_coordinator(Coordinator {
            code: ReplyCode::InvalidState,
            ..Default::default()
        })
        .await;
        let reporter =
            StatusReporter::new(&url).with_retry(RetryPolicy::new(3, Duration::from_millis(10)));
        let err = reporter.report(&two_apps(), 1, "INIT", None).await.unwrap_err();
        assert!(matches!(err, StatusError::Rejected { .. }));
        assert_eq!(request_count(&coord), 1);
    }

    #[tokio::test]
    async fn test_reply_without_code_is_accepted() {
        for raw in ["", r#"{"Status":"noted"}"#] {
            let (url, _coord) = start_coordinator(Coordinator {
                raw_reply: Some(raw.to_string()),
                ..Default::default()
            })
            .await;
            let reply = StatusReporter::new(&url)
                .report(&two_apps(), 1, "INIT", None)
                .await
                .unwrap();
            assert_eq!(reply.reply_code, ReplyCode::Ok);
        }
    }

    #[tokio::test]
    async fn test_garbled_reply_is_rejected() {
        let (url, _coord) = start_coordinator(Coordinator {
            raw_reply: Some("<html>oops</html>".to_string()),
            ..Default::default()
        })
        .await;
        let err = StatusReporter::new(&url)
            .report(&two_apps(), 1, "INIT", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StatusError::InvalidReply(_)));
    }
}

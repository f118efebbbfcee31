use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;

use crate::config::CheckConfig;

/// Type of monitoring check to perform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    #[default]
    Web,
    Ping,
    Port,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckKind::Web => write!(f, "web"),
            CheckKind::Ping => write!(f, "ping"),
            CheckKind::Port => write!(f, "port"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("check timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("TCP connection failed: {0}")]
    Connect(#[source] std::io::Error),
    #[error("failed to run ping: {0}")]
    PingSpawn(#[source] std::io::Error),
    #[error("ping failed: {0}")]
    PingFailed(String),
}

/// What a checker observed. Classification happens later.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Probe {
    pub status_code: Option<u16>,
    pub body: String,
    /// Latency measured by the checker itself, if more precise than the
    /// wall time around the call.
    pub latency: Option<Duration>,
}

/// Checker trait for different types of monitoring checks
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Perform the check once. Timeouts are enforced by the caller.
    async fn check(&self, check: &CheckConfig) -> Result<Probe, CheckError>;
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(timeout: Duration) -> Result<Self, CheckError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, check: &CheckConfig) -> Result<Probe, CheckError> {
        let method = reqwest::Method::from_bytes(check.method.to_uppercase().as_bytes())
            .map_err(|_| CheckError::InvalidMethod(check.method.clone()))?;

        // params go into the query string for GET/HEAD, into the body otherwise
        let mut request = if check.params.is_empty() {
            self.client.request(method, &check.check)
        } else if method == reqwest::Method::GET || method == reqwest::Method::HEAD {
            let separator = if check.check.contains('?') { '&' } else { '?' };
            self.client.request(method, format!("{}{}{}", check.check, separator, check.params))
        } else {
            self.client.request(method, &check.check).body(check.params.clone())
        };

        for (name, value) in &check.headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status_code = response.status().as_u16();
        let body = response.text().await?;

        Ok(Probe { status_code: Some(status_code), body, latency: None })
    }
}

/// TCP port checker
pub struct TcpChecker;

#[async_trait::async_trait]
impl Checker for TcpChecker {
    async fn check(&self, check: &CheckConfig) -> Result<Probe, CheckError> {
        tokio::net::TcpStream::connect(check.address()).await.map_err(CheckError::Connect)?;

        Ok(Probe::default())
    }
}

/// ICMP checker, delegating to the system `ping` binary so no raw socket
/// privileges are needed
pub struct PingChecker {
    timeout_duration: Duration,
}

impl PingChecker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout_duration: timeout }
    }
}

#[async_trait::async_trait]
impl Checker for PingChecker {
    async fn check(&self, check: &CheckConfig) -> Result<Probe, CheckError> {
        let wait_secs = self.timeout_duration.as_secs().max(1);
        let output = Command::new("ping")
            .args(["-n", "-c", "1", "-W"])
            .arg(wait_secs.to_string())
            .arg(&check.check)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(CheckError::PingSpawn)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .chain(stdout.lines())
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or("no reply")
                .to_string();
            return Err(CheckError::PingFailed(reason));
        }

        Ok(Probe { status_code: None, body: String::new(), latency: parse_ping_latency(&stdout) })
    }
}

/// Extract the round trip time from `ping` output (`time=12.3 ms`).
pub fn parse_ping_latency(output: &str) -> Option<Duration> {
    let start = output.find("time=")? + "time=".len();
    let rest = &output[start..];
    let end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
    let millis: f64 = rest[..end].parse().ok()?;
    Some(Duration::from_secs_f64(millis / 1000.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ping_latency() {
        let linux = "PING example.com (93.184.216.34) 56(84) bytes of data.\n\
                     64 bytes from 93.184.216.34: icmp_seq=1 ttl=56 time=12.4 ms\n";
        assert_eq!(parse_ping_latency(linux), Some(Duration::from_micros(12_400)));

        let busybox = "64 bytes from 10.0.0.1: seq=0 ttl=64 time=0.250 ms";
        assert_eq!(parse_ping_latency(busybox), Some(Duration::from_micros(250)));

        assert_eq!(parse_ping_latency("1 packets transmitted, 0 received"), None);
    }

    #[tokio::test]
    async fn test_tcp_check_against_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut check = CheckConfig::new("local", "127.0.0.1", CheckKind::Port);
        check.port = Some(port);

        let probe = TcpChecker.check(&check).await.unwrap();
        assert_eq!(probe, Probe::default());
    }

    #[tokio::test]
    async fn test_tcp_check_refused() {
        // bind then drop to get a port nobody listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut check = CheckConfig::new("closed", "127.0.0.1", CheckKind::Port);
        check.port = Some(port);

        let result = TcpChecker.check(&check).await;
        assert!(matches!(result, Err(CheckError::Connect(_))));
    }

    #[tokio::test]
    async fn test_http_check_rejects_bad_method() {
        let checker = HttpChecker::new(Duration::from_secs(1)).unwrap();
        let mut check = CheckConfig::new("web", "http://127.0.0.1:9", CheckKind::Web);
        check.method = "NOT A METHOD".to_string();

        let result = checker.check(&check).await;
        assert!(matches!(result, Err(CheckError::InvalidMethod(_))));
    }
}

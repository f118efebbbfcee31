//! Check-kind specific validation of targets, run before anything is scheduled.

use anyhow::{Result, anyhow};
use url::Url;

use super::checker::CheckKind;
use crate::config::CheckConfig;
use crate::template::expand_env;

/// Validates a check target based on its kind
pub fn validate_check_target(check: &CheckConfig) -> Result<()> {
    let target = expand_env(&check.check);
    if target.trim().is_empty() {
        return Err(anyhow!("empty 'check', this field is mandatory"));
    }

    match check.kind {
        CheckKind::Web => validate_http_target(&target),
        CheckKind::Port => validate_tcp_target(&target, check.port),
        CheckKind::Ping => validate_icmp_target(&target),
    }
}

/// Validate HTTP/HTTPS target
fn validate_http_target(target: &str) -> Result<()> {
    let url = Url::parse(target).map_err(|e| anyhow!("Invalid URL {target:?}: {e}"))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Invalid scheme for web check: {}", other)),
    }

    if url.host_str().is_none() {
        return Err(anyhow!("URL {target:?} has no host"));
    }

    if let Some(port) = url.port() {
        validate_port(port)?;
    }

    Ok(())
}

/// Validate TCP target: `host` with a `port` field, or `host:port`
fn validate_tcp_target(target: &str, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        if target.contains(':') && !target.starts_with('[') {
            return Err(anyhow!("give the port either in 'check' or in 'port', not both"));
        }
        return validate_port(port);
    }

    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("port check needs a 'port' or a target in format host:port"))?;

    if host.is_empty() {
        return Err(anyhow!("port check target has no host"));
    }

    let port: u16 = port.parse().map_err(|_| anyhow!("Invalid port number {port:?}"))?;
    validate_port(port)
}

/// Validate ICMP target
fn validate_icmp_target(target: &str) -> Result<()> {
    if target.contains("://") || target.contains('/') {
        return Err(anyhow!("ping target must be a bare host name or address, got {target:?}"));
    }
    if target.starts_with('-') {
        return Err(anyhow!("ping target must not start with '-'"));
    }

    Ok(())
}

/// Validate port is in valid range
fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(anyhow!("Port 0 is not valid"));
    }
    Ok(())
}

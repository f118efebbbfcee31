use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::chat::ChatNotifier;
use super::command::CommandNotifier;
use super::event::{EventKind, Snapshot};
use super::mail::MailNotifier;
use crate::config::NotifierConfig;

/// Notification backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    #[default]
    Mail,
    Chat,
    Cmd,
}

impl std::fmt::Display for NotifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifierKind::Mail => write!(f, "mail"),
            NotifierKind::Chat => write!(f, "chat"),
            NotifierKind::Cmd => write!(f, "cmd"),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build mail: {0}")]
    MailBuild(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("chat webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat webhook answered {0}")]
    ChatStatus(reqwest::StatusCode),
    #[error("failed to run command: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("cannot pass value to the shell: {0}")]
    Quote(#[from] shlex::QuoteError),
    #[error("command exited with {status}: {stderr}")]
    CommandFailed { status: std::process::ExitStatus, stderr: String },
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// Rendered notification handed to a backend
#[derive(Debug, Clone)]
pub struct Message {
    pub subject: String,
    pub body: String,
    pub kind: EventKind,
    pub snapshot: Arc<Snapshot>,
}

/// Notifier trait, one implementation per backend type
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message
    async fn send(&self, message: &Message) -> Result<(), NotifyError>;

    /// Backend name, for logging
    fn name(&self) -> &str;
}

/// Build the backend selected by the notifier's `type`.
pub fn build_notifier(
    config: &NotifierConfig,
    timeout: Duration,
) -> Result<Arc<dyn Notifier>, NotifyError> {
    Ok(match config.kind {
        NotifierKind::Mail => Arc::new(MailNotifier::new(config, timeout)?),
        NotifierKind::Chat => Arc::new(ChatNotifier::new(config, timeout)?),
        NotifierKind::Cmd => Arc::new(CommandNotifier::new(config)),
    })
}

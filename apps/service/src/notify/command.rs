use std::borrow::Cow;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::notifier::{Message, Notifier, NotifyError};
use crate::config::NotifierConfig;
use crate::template;

/// Runs the notifier's `cmd` through `sh -c`.
///
/// The command is rendered like a message template, with `{subject}` and
/// `{body}` available in addition to the check tags. Every substituted value
/// is shell-quoted, so tags must not be wrapped in quotes in `cmd`. Subject,
/// body and event kind are also exported as `UPPE_SUBJECT`, `UPPE_BODY` and
/// `UPPE_EVENT`.
pub struct CommandNotifier {
    template: String,
}

impl CommandNotifier {
    pub fn new(config: &NotifierConfig) -> Self {
        Self { template: config.cmd.clone() }
    }

    fn command_line(&self, message: &Message) -> Result<String, NotifyError> {
        let line = template::render_escaped(
            &self.template,
            &message.snapshot,
            &[("subject", &message.subject), ("body", &message.body)],
            |value| shlex::try_quote(value).map(Cow::into_owned),
        )?;
        Ok(line)
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        let command_line = self.command_line(message)?;
        debug!(command = %command_line, "running notification command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&command_line)
            .env("UPPE_SUBJECT", &message.subject)
            .env("UPPE_BODY", &message.body)
            .env("UPPE_EVENT", message.kind.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(NotifyError::CommandFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "cmd"
    }
}

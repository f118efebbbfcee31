use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::debug;

use super::notifier::{Message, Notifier, NotifyError};
use crate::config::NotifierConfig;

/// Port on which the server expects TLS from the first byte.
const SMTPS_PORT: u16 = 465;

/// SMTP backend.
///
/// Port 465 uses implicit TLS, any other port upgrades with STARTTLS when the
/// server offers it. Authenticates only when a user is configured.
pub struct MailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl MailNotifier {
    pub fn new(config: &NotifierConfig, timeout: Duration) -> Result<Self, NotifyError> {
        let tls = TlsParameters::builder(config.server.clone())
            .dangerous_accept_invalid_certs(config.ignore_cert)
            .build()?;
        let tls = if config.port == SMTPS_PORT { Tls::Wrapper(tls) } else { Tls::Opportunistic(tls) };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
            .port(config.port)
            .tls(tls)
            .timeout(Some(timeout));
        if !config.user.is_empty() {
            builder = builder.credentials(Credentials::new(config.user.clone(), config.pass.clone()));
        }

        let to = config.to.iter().map(|addr| addr.parse()).collect::<Result<Vec<Mailbox>, _>>()?;

        Ok(Self { transport: builder.build(), from: config.from.parse()?, to })
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        let mut builder = lettre::Message::builder()
            .from(self.from.clone())
            .subject(&message.subject)
            .date(SystemTime::from(message.snapshot.timestamp))
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        let email = builder.body(message.body.clone())?;

        self.transport.send(email).await?;
        debug!(check = %message.snapshot.check_id, recipients = self.to.len(), "mail sent");
        Ok(())
    }

    fn name(&self) -> &str {
        "mail"
    }
}

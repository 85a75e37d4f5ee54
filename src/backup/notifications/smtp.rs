use crate::backup::function_path;
use crate::backup::notifications::Notification;
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use bon::Builder;
use function_name::named;
use getset::Getters;
use itertools::Itertools;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt::Display;
use std::time::Duration;
use validator::Validate;

static DEFAULT_MAX_TRY: u32 = 3;
static DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(3);

fn default_max_try() -> u32 {
    DEFAULT_MAX_TRY
}

fn default_retry_base_delay() -> Duration {
    DEFAULT_RETRY_BASE_DELAY
}

/// `email` section of the configuration.
///
/// Only read when `enabled` is set. A missing `password` sends without
/// authentication, a missing `username` authenticates as the sender address.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct SmtpNotificationConfig {
    #[serde(default)]
    #[builder(default)]
    enabled: bool,
    #[builder(into)]
    host: Option<String>,
    port: Option<u16>,
    #[serde(default)]
    #[builder(default)]
    smtp_mode: SmtpMode,
    from: Option<Mailbox>,
    #[serde(default)]
    #[builder(default)]
    to: Vec<Mailbox>,
    #[builder(into)]
    username: Option<String>,
    #[builder(into)]
    password: Option<RedactedString>,
    #[serde(default = "default_max_try")]
    #[builder(default = DEFAULT_MAX_TRY)]
    #[validate(range(min = 1))]
    max_try: u32,
    #[serde(default = "default_retry_base_delay", with = "humantime_serde")]
    #[builder(default = DEFAULT_RETRY_BASE_DELAY)]
    retry_base_delay: Duration,
}

impl Default for SmtpNotificationConfig {
    fn default() -> Self {
        SmtpNotificationConfig::builder().build()
    }
}

/// SMTP connection security modes
///
/// - `Unsecured`: Plain text connection
/// - `Ssl`: SSL/TLS encrypted connection from start
/// - `StartTls`: Start with plain text, then upgrade to TLS
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SmtpMode {
    #[default]
    Unsecured,
    Ssl,
    StartTls,
}

/// Ready to use SMTP channel built from a [`SmtpNotificationConfig`].
pub struct SmtpNotification {
    mailer: SmtpTransport,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpNotification {
    /// Fails fast when no host, sender or recipient is configured.
    #[named]
    pub fn new(config: &SmtpNotificationConfig) -> Result<Self> {
        let host = config
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(Error::EmailHostMissing)?;
        let from = config
            .from
            .clone()
            .ok_or_else(|| Error::invalid_email_config("sender address is required"))?;
        if config.to.is_empty() {
            return Err(Error::invalid_email_config("at least one recipient is required"));
        }

        let mut builder = match config.smtp_mode {
            SmtpMode::Unsecured => Ok(SmtpTransport::builder_dangerous(host)),
            SmtpMode::Ssl => SmtpTransport::relay(host),
            SmtpMode::StartTls => SmtpTransport::starttls_relay(host),
        }
        .map_err(Error::from)
        .add_msg(format!(
            "Failed to build smtp client for host: {:?} with mode {:?}",
            host, config.smtp_mode
        ))
        .add_fn_name(function_path!())?;

        if let Some(port) = config.port {
            builder = builder.port(port);
        }
        if let Some(password) = &config.password {
            let username = config
                .username
                .clone()
                .unwrap_or_else(|| from.email.to_string());
            builder = builder.credentials(Credentials::new(
                username,
                password.inner().to_string(),
            ));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
            to: config.to.clone(),
        })
    }
}

impl Notification for SmtpNotification {
    #[named]
    fn send<D1: Display, D2: Display>(&self, topic: D1, msg: D2) -> Result<()> {
        tracing::info!(
            "Started smtp email notification from {:?} to {:?}",
            self.from,
            self.to
        );
        let email = self
            .to
            .iter()
            .fold(Message::builder(), |email, send_to| {
                email.to(send_to.clone())
            })
            .from(self.from.clone())
            .subject(format!("{}", topic))
            .header(ContentType::TEXT_PLAIN)
            .body(format!("{}", msg))
            .map_err(Error::from)
            .add_msg(format!(
                "Fail to build notification email from {:?} to {:?}",
                self.from, self.to
            ))
            .add_fn_name(function_path!())?;

        tracing::info!("Sending email...");
        let response = self
            .mailer
            .send(&email)
            .map_err(Error::from)
            .add_fn_name(function_path!())?;
        if response.is_positive() {
            Ok(())
        } else {
            let error_vec = response
                .message()
                .map(|m| Error::smtp_send_error(m.to_owned()))
                .collect_vec();
            Err(Error::lots_of_error(error_vec))
        }
    }
}

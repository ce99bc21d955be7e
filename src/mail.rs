use anyhow::Context;
use axum::{async_trait, extract::State, routing::post, Json, Router};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::{
    config::SmtpConfig,
    error::{ApiMessage, Error},
    state::AppState,
};

/// Outbound email collaborator. Plain-text only; callers decide whether a
/// delivery failure is fatal for their request.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .context("smtp relay")?
            .credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ))
            .build();
        let from = cfg.from.parse::<Mailbox>().context("SMTP_FROM address")?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let to = to.parse::<Mailbox>().context("recipient address")?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("build message")?;
        self.transport.send(message).await.context("smtp send")?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: String,
    pub text: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/email/send", post(send_email))
}

#[instrument(skip(state, payload))]
pub async fn send_email(
    State(state): State<AppState>,
    Json(payload): Json<SendEmailRequest>,
) -> Result<Json<ApiMessage>, Error> {
    if payload.to.trim().is_empty() || payload.subject.trim().is_empty() {
        return Err(Error::Validation(
            "recipient and subject are required".into(),
        ));
    }

    state
        .mailer
        .send(&payload.to, &payload.subject, &payload.text)
        .await?;

    info!(to = %payload.to, "email sent");
    Ok(Json(ApiMessage::ok("email sent successfully")))
}

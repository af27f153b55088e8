use tracing::info;

/// Outbound email. Delivery itself is left to the deployment.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

/// Writes every message to the log instead of delivering it.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        info!(to, subject, "Outbound email: {}", html);
        Ok(())
    }
}

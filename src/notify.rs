//! Completion notifiers: a tracing-only sender and an SMTP sender via lettre.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use crate::config::EmailConfig;
use crate::error::NotificationError;
use crate::runner::NotificationSender;
use crate::task::{CallerContext, TaskResult};

/// Subject and body of a completion notice.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub subject: String,
    pub body: String,
}

impl Summary {
    pub fn for_result(result: &TaskResult, progress: &[String]) -> Self {
        let outcome = if result.is_failure() { "failed" } else { "completed" };
        let subject = format!("Task {} {}", result.task_id, outcome);

        let mut body = format!("Task {} {}.\n", result.task_id, outcome);
        match (&result.error, &result.payload) {
            (Some(error), _) => body.push_str(&format!("\nError: {error}\n")),
            (None, Some(payload)) if !payload.is_null() => {
                body.push_str(&format!("\nResult: {payload}\n"))
            }
            _ => {}
        }

        if !progress.is_empty() {
            body.push_str("\nRecent progress:\n");
            for line in progress {
                body.push_str("  - ");
                body.push_str(line);
                body.push('\n');
            }
        }

        Self { subject, body }
    }
}

/// Writes the notice to the log instead of delivering it.
pub struct LogNotifier;

#[async_trait]
impl NotificationSender for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(
        &self,
        caller: &CallerContext,
        result: &TaskResult,
        progress: &[String],
    ) -> Result<(), NotificationError> {
        let summary = Summary::for_result(result, progress);
        tracing::info!(
            task_id = %result.task_id,
            principal = caller.principal.as_deref().unwrap_or("anonymous"),
            subject = %summary.subject,
            "Completion notice"
        );
        Ok(())
    }
}

/// Mails the notice to the caller's address.
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn send_blocking(
        config: &EmailConfig,
        to: &str,
        summary: &Summary,
    ) -> Result<(), NotificationError> {
        let creds = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let transport = SmtpTransport::relay(&config.smtp_host)
            .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        let email = Message::builder()
            .from(
                config
                    .from_address
                    .parse()
                    .map_err(|e| send_failed(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| send_failed(format!("Invalid to address: {e}")))?)
            .subject(summary.subject.clone())
            .body(summary.body.clone())
            .map_err(|e| send_failed(format!("Failed to build email: {e}")))?;

        transport
            .send(&email)
            .map_err(|e| send_failed(format!("SMTP send failed: {e}")))?;

        tracing::info!("Completion email sent to {to}");
        Ok(())
    }
}

#[async_trait]
impl NotificationSender for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(
        &self,
        caller: &CallerContext,
        result: &TaskResult,
        progress: &[String],
    ) -> Result<(), NotificationError> {
        let Some(to) = caller.email.clone() else {
            return Err(NotificationError::NoRecipient {
                task_id: result.task_id.clone(),
            });
        };

        let summary = Summary::for_result(result, progress);
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || Self::send_blocking(&config, &to, &summary))
            .await
            .map_err(|e| send_failed(format!("SMTP worker panicked: {e}")))?
    }
}

fn send_failed(reason: String) -> NotificationError {
    NotificationError::SendFailed {
        name: "email".into(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use secrecy::SecretString;

    #[test]
    fn summary_includes_progress_and_payload() {
        let result = TaskResult::success("s1", serde_json::json!({"rows": 3}));
        let summary = Summary::for_result(&result, &["loaded".into(), "indexed".into()]);

        assert_eq!(summary.subject, "Task s1 completed");
        assert!(summary.body.contains("\"rows\":3"));
        assert!(summary.body.contains("  - loaded\n  - indexed"));
    }

    #[test]
    fn summary_reports_error() {
        let result = TaskResult::failure("s2", &TaskError::failed("disk full"));
        let summary = Summary::for_result(&result, &[]);

        assert_eq!(summary.subject, "Task s2 failed");
        assert!(summary.body.contains("Error: disk full"));
        assert!(!summary.body.contains("Recent progress"));
    }

    #[tokio::test]
    async fn email_without_recipient_is_rejected() {
        let notifier = EmailNotifier::new(EmailConfig {
            smtp_host: "smtp.invalid".into(),
            smtp_port: 587,
            username: "worker".into(),
            password: SecretString::from("secret".to_string()),
            from_address: "worker@example.com".into(),
        });

        let err = notifier
            .send(
                &CallerContext::user("dave"),
                &TaskResult::success("s3", serde_json::Value::Null),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::NoRecipient { ref task_id } if task_id == "s3"));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let result = TaskResult::success("s4", serde_json::Value::Null);
        assert!(LogNotifier
            .send(&CallerContext::anonymous(), &result, &[])
            .await
            .is_ok());
    }
}

use async_trait::async_trait;
use aws_sdk_sns::Client as SnsClient;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Errors that can occur while publishing a spend alert
#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("SNS SDK error: {0}")]
    SnsSdk(#[from] SdkError<aws_sdk_sns::operation::publish::PublishError, Response>),
    #[error("Maximum retry attempts exceeded")]
    MaxRetriesExceeded,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Publish-only channel for threshold-crossing alerts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertPublisher: Send + Sync {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), NotifierError>;
}

/// SNS-backed alert publisher with bounded exponential-backoff retry
#[derive(Clone)]
pub struct SnsAlertPublisher {
    client: Arc<SnsClient>,
    topic_arn: String,
    retry_attempts: u32,
}

impl SnsAlertPublisher {
    /// Create a new SnsAlertPublisher
    pub fn new(
        client: SnsClient,
        topic_arn: String,
        retry_attempts: u32,
    ) -> Result<Self, NotifierError> {
        if topic_arn.is_empty() {
            return Err(NotifierError::InvalidConfig(
                "Topic ARN cannot be empty".to_string(),
            ));
        }
        if retry_attempts == 0 {
            return Err(NotifierError::InvalidConfig(
                "Retry attempts must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            client: Arc::new(client),
            topic_arn,
            retry_attempts,
        })
    }

    /// Get the configured topic ARN
    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }

    async fn send_to_sns(&self, subject: &str, message: &str) -> Result<(), NotifierError> {
        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await?;

        Ok(())
    }
}

#[async_trait]
impl AlertPublisher for SnsAlertPublisher {
    /// Publish an alert with exponential backoff retry
    #[instrument(skip(self, message), fields(topic = %self.topic_arn, subject = %subject))]
    async fn publish(&self, subject: &str, message: &str) -> Result<(), NotifierError> {
        let mut attempts = 0;

        while attempts < self.retry_attempts {
            match self.send_to_sns(subject, message).await {
                Ok(()) => {
                    info!(attempt = attempts + 1, "Alert published to SNS");
                    return Ok(());
                }
                Err(e) => {
                    attempts += 1;

                    if attempts >= self.retry_attempts {
                        error!(
                            attempts = attempts,
                            error = %e,
                            "Failed to publish alert after maximum retry attempts"
                        );
                        return Err(NotifierError::MaxRetriesExceeded);
                    }

                    let delay = Duration::from_millis(100 * 2_u64.pow(attempts - 1));
                    warn!(
                        attempt = attempts,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Alert publish failed, retrying"
                    );

                    sleep(delay).await;
                }
            }
        }

        Err(NotifierError::MaxRetriesExceeded)
    }
}

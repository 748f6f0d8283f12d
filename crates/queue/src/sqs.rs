//! AWS SQS queue implementation.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_sqs::config::BehaviorVersion;
use aws_sdk_sqs::types::{MessageSystemAttributeName, QueueAttributeName};
use aws_sdk_sqs::Client;
use chrono::{TimeZone, Utc};
use tracing::{debug, info};

use scanjob_core::config::{AwsConfig, QueueConfig};

use crate::message::{MessageQueue, QueueHealth, QueueMessage};
use crate::error::QueueError;

/// SQS caps a single receive call at 10 messages.
const SQS_MAX_BATCH: usize = 10;

/// SQS-backed scan request queue.
pub struct SqsQueue {
    client: Client,
    visibility_timeout_secs: i32,
}

impl SqsQueue {
    /// Create a new SQS queue client from project config.
    pub fn new(aws: &AwsConfig, queue: &QueueConfig) -> Self {
        let region = aws_sdk_sqs::config::Region::new(aws.region.clone());

        // Build the client config directly so a generic AWS_ENDPOINT_URL meant
        // for another service never redirects queue traffic.
        let mut sqs_config = aws_sdk_sqs::Config::builder()
            .region(region)
            .behavior_version(BehaviorVersion::latest());

        if let (Some(key_id), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) {
            let creds = Credentials::new(
                key_id,
                secret,
                aws.session_token.clone(),
                None,
                "scanjob-queue-static",
            );
            sqs_config = sqs_config.credentials_provider(creds);
        }

        if let Some(ref endpoint) = aws.endpoint_url {
            let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                endpoint.clone()
            } else {
                format!("https://{endpoint}")
            };
            sqs_config = sqs_config.endpoint_url(&url);
        }

        let client = Client::from_conf(sqs_config.build());

        info!(
            queue_name = %queue.queue_name,
            region = %aws.region,
            "SQS queue client initialized"
        );

        Self {
            client,
            visibility_timeout_secs: i32::try_from(queue.visibility_timeout_secs).unwrap_or(i32::MAX),
        }
    }

    async fn queue_url(&self, queue: &str) -> Result<String, QueueError> {
        let resp = self
            .client
            .get_queue_url()
            .queue_name(queue)
            .send()
            .await
            .map_err(|e| QueueError::NotFound(format!("{queue}: {e:?}")))?;

        resp.queue_url()
            .map(str::to_string)
            .ok_or_else(|| QueueError::NotFound(queue.to_string()))
    }

    async fn receive_batch(&self, queue_url: &str, max: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let capped = max.min(SQS_MAX_BATCH) as i32;

        let resp = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(capped)
            .visibility_timeout(self.visibility_timeout_secs)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("SQS receive failed: {e:?}")))?;

        let sqs_messages = resp.messages.unwrap_or_default();
        let mut messages = Vec::with_capacity(sqs_messages.len());
        for msg in sqs_messages {
            let message_id = msg.message_id().unwrap_or("unknown").to_string();
            let message_text = msg.body().unwrap_or("").to_string();

            let receipt_handle = msg
                .receipt_handle()
                .ok_or_else(|| QueueError::InvalidResponse("message without receipt handle".into()))?
                .to_string();

            // SentTimestamp is epoch millis.
            let timestamp = msg
                .attributes()
                .and_then(|attrs| attrs.get(&MessageSystemAttributeName::SentTimestamp))
                .and_then(|ts| ts.parse::<i64>().ok())
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .unwrap_or_else(Utc::now);

            let dequeue_count = msg
                .attributes()
                .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                .and_then(|c| c.parse::<u32>().ok())
                .unwrap_or(1);

            messages.push(QueueMessage {
                message_id,
                message_text,
                receipt_handle,
                timestamp,
                dequeue_count,
            });
        }

        Ok(messages)
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn get_messages_with_total_count(
        &self,
        queue: &str,
        count: usize,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let queue_url = self.queue_url(queue).await?;
        let mut messages = Vec::with_capacity(count);

        while messages.len() < count {
            let batch = self.receive_batch(&queue_url, count - messages.len()).await?;
            if batch.is_empty() {
                break;
            }
            messages.extend(batch);
        }

        debug!(queue, requested = count, received = messages.len(), "Dequeued SQS messages");
        Ok(messages)
    }

    async fn delete_message(&self, queue: &str, message: &QueueMessage) -> Result<(), QueueError> {
        debug!(queue, message_id = %message.message_id, "Deleting SQS message");

        let queue_url = self.queue_url(queue).await?;
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(&message.receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(format!("SQS delete failed: {e:?}")))?;

        Ok(())
    }

    async fn health_check(&self, queue: &str) -> Result<QueueHealth, QueueError> {
        let queue_url = self.queue_url(queue).await?;
        let resp = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("SQS health check failed: {e:?}")))?;

        let count = resp
            .attributes()
            .and_then(|attrs| attrs.get(&QueueAttributeName::ApproximateNumberOfMessages))
            .and_then(|v| v.parse::<u64>().ok());

        Ok(QueueHealth {
            connected: true,
            approximate_message_count: count,
            provider: "sqs".to_string(),
        })
    }
}

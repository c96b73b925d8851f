use anyhow::bail;
use common::{MalformedMessagePolicy, ReceiveOptions, WorkerLoopConfig};
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Queue configuration
    /// SQS queue URL feeding the record worker
    pub record_queue_url: String,

    /// SQS queue URL feeding the archive worker
    pub archive_queue_url: String,

    /// Messages pulled per receive call (1..=10)
    #[serde(default = "default_receive_max_messages")]
    pub receive_max_messages: i32,

    /// Long-poll wait per receive call in seconds (0..=20)
    #[serde(default = "default_receive_wait_seconds")]
    pub receive_wait_seconds: i32,

    /// Visibility timeout applied to received messages in seconds
    #[serde(default = "default_visibility_timeout_seconds")]
    pub visibility_timeout_seconds: i32,

    /// Delay between polling iterations in seconds
    #[serde(default = "default_idle_delay_secs")]
    pub idle_delay_secs: u64,

    /// Bound on draining buffered metrics at shutdown in seconds
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// What to do with messages that can never succeed: "acknowledge" or
    /// "leave"
    #[serde(default = "default_malformed_message_policy")]
    pub malformed_message_policy: String,

    // Persistence configuration
    /// DynamoDB table holding catalog records
    #[serde(default = "default_catalog_table_name")]
    pub catalog_table_name: String,

    /// S3 bucket receiving archived deliveries
    pub archive_bucket_name: String,

    /// Service endpoint override for local stacks (LocalStack etc.)
    #[serde(default)]
    pub aws_endpoint_url: Option<String>,

    // Observability configuration
    /// CloudWatch EMF metrics namespace
    #[serde(default = "default_metrics_namespace")]
    pub metrics_namespace: String,

    /// UDP address of the local trace daemon
    #[serde(default = "default_trace_daemon_addr")]
    pub trace_daemon_addr: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_receive_max_messages() -> i32 {
    10
}

fn default_receive_wait_seconds() -> i32 {
    20
}

fn default_visibility_timeout_seconds() -> i32 {
    120
}

fn default_idle_delay_secs() -> u64 {
    5
}

fn default_drain_timeout_secs() -> u64 {
    10
}

fn default_malformed_message_policy() -> String {
    "acknowledge".to_string()
}

fn default_catalog_table_name() -> String {
    "BooksCatalog".to_string()
}

fn default_metrics_namespace() -> String {
    "CatalogWorkers".to_string()
}

fn default_trace_daemon_addr() -> String {
    "127.0.0.1:2000".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("CATALOG"))
            .build()?
            .try_deserialize()
    }

    pub fn receive_options(&self) -> ReceiveOptions {
        ReceiveOptions {
            max_messages: self.receive_max_messages,
            wait_seconds: self.receive_wait_seconds,
            visibility_timeout_seconds: self.visibility_timeout_seconds,
        }
    }

    pub fn malformed_policy(&self) -> anyhow::Result<MalformedMessagePolicy> {
        match self.malformed_message_policy.to_ascii_lowercase().as_str() {
            "acknowledge" => Ok(MalformedMessagePolicy::Acknowledge),
            "leave" => Ok(MalformedMessagePolicy::Leave),
            other => bail!("unknown malformed message policy: {other}"),
        }
    }

    pub fn loop_config(&self, service_name: &str) -> anyhow::Result<WorkerLoopConfig> {
        Ok(WorkerLoopConfig {
            service_name: service_name.to_string(),
            idle_delay: Duration::from_secs(self.idle_delay_secs),
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
            malformed_policy: self.malformed_policy()?,
        })
    }
}

//! Tenant-Aware Queues
//!
//! Queue names become `tenant:{id}:{queue}` and binding routing keys become
//! `tenant.{id}.{key}` (or `tenant.{id}` for an empty key). Exchanges are
//! shared infrastructure and keep their names. Message ids are globally
//! unique, so acknowledge and reject pass them through untouched.

use crate::manager::TenantManager;
use crate::tenant::{DEFAULT_SCOPE, scoped_key};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

/// Metadata key stamped on published messages
pub const TENANT_ID_METADATA_KEY: &str = "tenant_id";

/// Transport-specific options (durability, prefetch, ...)
pub type QueueOptions = Map<String, Value>;

/// Callback invoked for each consumed message
pub type MessageHandler = Arc<
    dyn Fn(EventMessage) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send>>
        + Send
        + Sync,
>;

/// An event travelling through a queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub event_name: String,
    pub payload: Value,
    pub module_name: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl EventMessage {
    pub fn new(event_name: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_name: event_name.into(),
            payload,
            module_name: None,
            metadata: Map::new(),
            retry_count: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_module(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = Some(module_name.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}

/// Tenant id stamped on a message by [`TenantQueue::publish`]
pub fn message_tenant_id(message: &EventMessage) -> Option<&str> {
    message
        .metadata
        .get(TENANT_ID_METADATA_KEY)
        .and_then(Value::as_str)
}

/// Queue errors
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Consume failed: {0}")]
    Consume(String),

    #[error("Declare failed: {0}")]
    Declare(String),

    #[error("Handler failed: {0}")]
    Handler(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Underlying message transport
#[async_trait]
pub trait QueueAdapter: Send + Sync {
    /// Publish, returning the transport's message id when it has one
    async fn publish(
        &self,
        queue: &str,
        message: EventMessage,
        options: QueueOptions,
    ) -> Result<Option<String>, QueueError>;

    async fn consume(
        &self,
        queue: &str,
        handler: MessageHandler,
        options: QueueOptions,
    ) -> Result<(), QueueError>;

    async fn acknowledge(&self, message_id: &str) -> Result<(), QueueError>;

    async fn reject(&self, message_id: &str, requeue: bool) -> Result<(), QueueError>;

    async fn declare_queue(&self, queue: &str, options: QueueOptions) -> Result<(), QueueError>;

    async fn declare_exchange(
        &self,
        exchange: &str,
        kind: &str,
        options: QueueOptions,
    ) -> Result<(), QueueError>;

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), QueueError>;
}

/// Tenant-aware wrapper over a [`QueueAdapter`]
#[derive(Clone)]
pub struct TenantQueue {
    base: Arc<dyn QueueAdapter>,
}

impl TenantQueue {
    pub fn new(base: Arc<dyn QueueAdapter>) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Arc<dyn QueueAdapter> {
        &self.base
    }

    /// `tenant:{id}:{queue}`
    pub fn queue_name(&self, ctx: &TenantManager, queue: &str) -> String {
        scoped_key(ctx.tenant_id(), queue)
    }

    /// `tenant.{id}.{routing_key}`, or `tenant.{id}` for an empty key
    pub fn routing_key(&self, ctx: &TenantManager, routing_key: &str) -> String {
        let tenant_id = ctx.tenant_id().unwrap_or(DEFAULT_SCOPE);
        if routing_key.is_empty() {
            format!("tenant.{tenant_id}")
        } else {
            format!("tenant.{tenant_id}.{routing_key}")
        }
    }

    /// Publish to the tenant's queue.
    ///
    /// With a current tenant the message is re-built with `tenant_id` in its
    /// metadata; an existing `tenant_id` entry is left as is.
    pub async fn publish(
        &self,
        ctx: &TenantManager,
        queue: &str,
        message: EventMessage,
        options: QueueOptions,
    ) -> Result<Option<String>, QueueError> {
        let message = match ctx.tenant_id() {
            Some(tenant_id) => stamp_tenant(message, tenant_id),
            None => message,
        };

        self.base
            .publish(&self.queue_name(ctx, queue), message, options)
            .await
    }

    pub async fn consume(
        &self,
        ctx: &TenantManager,
        queue: &str,
        handler: MessageHandler,
        options: QueueOptions,
    ) -> Result<(), QueueError> {
        self.base
            .consume(&self.queue_name(ctx, queue), handler, options)
            .await
    }

    pub async fn acknowledge(&self, message_id: &str) -> Result<(), QueueError> {
        self.base.acknowledge(message_id).await
    }

    pub async fn reject(&self, message_id: &str, requeue: bool) -> Result<(), QueueError> {
        self.base.reject(message_id, requeue).await
    }

    pub async fn declare_queue(
        &self,
        ctx: &TenantManager,
        queue: &str,
        options: QueueOptions,
    ) -> Result<(), QueueError> {
        self.base
            .declare_queue(&self.queue_name(ctx, queue), options)
            .await
    }

    pub async fn declare_exchange(
        &self,
        exchange: &str,
        kind: &str,
        options: QueueOptions,
    ) -> Result<(), QueueError> {
        self.base.declare_exchange(exchange, kind, options).await
    }

    pub async fn bind_queue(
        &self,
        ctx: &TenantManager,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), QueueError> {
        self.base
            .bind_queue(
                &self.queue_name(ctx, queue),
                exchange,
                &self.routing_key(ctx, routing_key),
            )
            .await
    }
}

impl std::fmt::Debug for TenantQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantQueue").finish_non_exhaustive()
    }
}

fn stamp_tenant(mut message: EventMessage, tenant_id: &str) -> EventMessage {
    message
        .metadata
        .entry(TENANT_ID_METADATA_KEY)
        .or_insert_with(|| Value::String(tenant_id.to_string()));
    message
}

//! Interfaces the bridge needs from the host assistant application.

pub mod events;
pub mod notifier;
pub mod store_host;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use relay_shared::{MessageSummary, ThreadSummary};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read access to the host's conversation threads.
///
/// Uses `Pin<Box<dyn Future>>` return types for object safety, so the bridge
/// can hold an `Arc<dyn HostChat>` and tests can swap in fakes.
pub trait HostChat: Send + Sync {
    /// Threads in host listing order.
    fn list_threads(&self) -> BoxFuture<'_, anyhow::Result<Vec<ThreadSummary>>>;

    /// Every message of a thread, oldest first.
    fn get_messages<'a>(
        &'a self,
        thread_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Vec<MessageSummary>>>;

    /// The thread currently focused in the host UI, if any.
    fn get_active_thread(&self) -> BoxFuture<'_, anyhow::Result<Option<ThreadSummary>>>;

    /// Hand text typed in the chat back to the host as a user message.
    fn post_user_message<'a>(
        &'a self,
        thread_id: &'a str,
        text: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Durable key-value storage, already scoped to the bridge.
pub trait KeyValueStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<Option<String>>>;

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// User-facing notices that travel outside the chat transport.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity, duration: Option<Duration>);
}

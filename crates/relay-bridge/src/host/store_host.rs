use std::sync::Arc;

use serde_json::Value;

use relay_shared::{MessageSummary, Role, ThreadSummary};

use crate::store::{Store, kv, messages, threads};

use super::{BoxFuture, HostChat, KeyValueStore};

/// Key under which the ingress records the host's focused thread.
pub const ACTIVE_THREAD_KEY: &str = "host.activeThreadId";

const THREAD_LISTING_LIMIT: usize = 500;

/// `HostChat` over the local SQLite store that the host feeds through the
/// ingress routes.
pub struct StoreHost {
    store: Arc<Store>,
}

impl StoreHost {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn set_active_thread(&self, thread_id: Option<&str>) -> anyhow::Result<()> {
        let conn = self.store.conn();
        match thread_id {
            Some(id) => {
                if threads::get_thread(&conn, id).is_none() {
                    anyhow::bail!("thread {id} not found");
                }
                kv::set(&conn, ACTIVE_THREAD_KEY, id)
            }
            None => {
                kv::remove(&conn, ACTIVE_THREAD_KEY);
                Ok(())
            }
        }
    }
}

impl HostChat for StoreHost {
    fn list_threads(&self) -> BoxFuture<'_, anyhow::Result<Vec<ThreadSummary>>> {
        Box::pin(async move {
            Ok(threads::list_threads(
                &self.store.conn(),
                THREAD_LISTING_LIMIT,
            ))
        })
    }

    fn get_messages<'a>(
        &'a self,
        thread_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Vec<MessageSummary>>> {
        Box::pin(async move {
            let conn = self.store.conn();
            if threads::get_thread(&conn, thread_id).is_none() {
                anyhow::bail!("thread {thread_id} not found");
            }
            Ok(messages::get_messages(&conn, thread_id))
        })
    }

    fn get_active_thread(&self) -> BoxFuture<'_, anyhow::Result<Option<ThreadSummary>>> {
        Box::pin(async move {
            let conn = self.store.conn();
            Ok(kv::get(&conn, ACTIVE_THREAD_KEY).and_then(|id| threads::get_thread(&conn, &id)))
        })
    }

    fn post_user_message<'a>(
        &'a self,
        thread_id: &'a str,
        text: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let conn = self.store.conn();
            let content = Value::String(text.to_string());
            messages::add_message(&conn, thread_id, None, Role::User, &content, None)?;
            Ok(())
        })
    }
}

/// `KeyValueStore` over the store's kv table with every key prefixed by
/// `<scope>.`.
pub struct StoreKv {
    store: Arc<Store>,
    scope: String,
}

impl StoreKv {
    pub fn new(store: Arc<Store>, scope: &str) -> Self {
        Self {
            store,
            scope: scope.to_string(),
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}.{key}", self.scope)
    }
}

impl KeyValueStore for StoreKv {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<Option<String>>> {
        Box::pin(async move { Ok(kv::get(&self.store.conn(), &self.scoped(key))) })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { kv::set(&self.store.conn(), &self.scoped(key), value) })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            kv::remove(&self.store.conn(), &self.scoped(key));
            Ok(())
        })
    }
}

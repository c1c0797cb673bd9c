use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use relay_shared::AssistantReply;

use crate::host::HostChat;
use crate::host::events::HostEvents;

use super::dispatcher::OutboundDispatcher;
use super::views;

/// Pushes every finished assistant reply into the chat.
///
/// Runs independently of the session loop and shares only the dispatcher
/// with it.
pub struct ReplyForwarder {
    dispatcher: Arc<OutboundDispatcher>,
    host: Arc<dyn HostChat>,
}

impl ReplyForwarder {
    pub fn new(dispatcher: Arc<OutboundDispatcher>, host: Arc<dyn HostChat>) -> Self {
        Self { dispatcher, host }
    }

    /// Subscribe to `events` and forward replies in a background task.
    /// Aborting the returned handle unsubscribes.
    pub fn start(self: Arc<Self>, events: &HostEvents) -> JoinHandle<()> {
        let mut rx = events.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(reply) => {
                        self.forward(&reply).await;
                    }
                    Err(RecvError::Lagged(count)) => {
                        warn!(count, "reply forwarder lagged behind host events");
                    }
                    Err(RecvError::Closed) => {
                        trace!("host event channel closed; reply forwarder stopping");
                        break;
                    }
                }
            }
        })
    }

    /// Returns the sent message id, `None` when the send failed.
    pub async fn forward(&self, reply: &AssistantReply) -> Option<i64> {
        let title = self.thread_title(&reply.thread_id).await;
        let screen = views::assistant_reply(&title, &reply.response.content);
        let sent = self.dispatcher.send_screen(&screen).await;
        if sent.is_some() {
            debug!(thread_id = %reply.thread_id, "forwarded assistant reply");
        }
        sent
    }

    /// Best-effort title lookup; falls back to the thread id.
    async fn thread_title(&self, thread_id: &str) -> String {
        match self.host.list_threads().await {
            Ok(threads) => threads
                .into_iter()
                .find(|t| t.id == thread_id)
                .map(|t| t.title)
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| thread_id.to_string()),
            Err(e) => {
                debug!(error = %e, thread_id, "thread title lookup failed");
                thread_id.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use relay_shared::ReplyResponse;
    use serde_json::json;

    use super::*;
    use crate::telegram::dispatcher::OUTBOUND_TEXT_LIMIT;
    use crate::telegram::dispatcher::tests::{Call, FakeTransport};
    use crate::telegram::navigation::tests::FakeHost;

    fn setup(host: FakeHost) -> (Arc<FakeTransport>, Arc<FakeHost>, Arc<ReplyForwarder>) {
        let transport = Arc::new(FakeTransport::default());
        let host = Arc::new(host);
        let dispatcher = Arc::new(OutboundDispatcher::new(transport.clone(), 42));
        let forwarder = Arc::new(ReplyForwarder::new(dispatcher, host.clone()));
        (transport, host, forwarder)
    }

    fn reply(thread_id: &str, content: serde_json::Value) -> AssistantReply {
        AssistantReply {
            thread_id: thread_id.into(),
            response: ReplyResponse { content },
        }
    }

    fn sent_texts(transport: &FakeTransport) -> Vec<String> {
        transport
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn reply_carries_thread_title() {
        let (transport, _, forwarder) = setup(FakeHost::with_threads(2));
        let id = forwarder
            .forward(&reply("t1", json!({"parts": [{"type": "text", "text": "**done**"}]})))
            .await;
        assert!(id.is_some());
        let texts = sent_texts(&transport);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("<b>Thread 1</b>"));
        assert!(texts[0].contains("<b>done</b>"));
    }

    #[tokio::test]
    async fn title_falls_back_to_id_when_host_fails() {
        let (transport, host, forwarder) = setup(FakeHost::with_threads(2));
        host.fail.store(true, Ordering::SeqCst);
        forwarder.forward(&reply("t1", json!("hi"))).await;
        assert!(sent_texts(&transport)[0].contains("<b>t1</b>"));
    }

    #[tokio::test]
    async fn long_replies_are_capped() {
        let (transport, _, forwarder) = setup(FakeHost::with_threads(1));
        forwarder.forward(&reply("t0", json!("z".repeat(9000)))).await;
        let text = &sent_texts(&transport)[0];
        assert!(text.contains("(truncated)"));
        assert!(text.chars().count() < views::MESSAGE_BODY_LIMIT + 100);
    }

    #[tokio::test]
    async fn escaped_code_blocks_stay_within_limit_as_html() {
        let (transport, _, forwarder) = setup(FakeHost::with_threads(1));
        let content = format!("```html\n{}```", "<li>a&amp;b</li>\n".repeat(170));
        forwarder.forward(&reply("t0", json!(content))).await;

        let calls = transport.calls();
        let Some(Call::Send { text, rich }) = calls.first() else {
            panic!("expected a send");
        };
        assert!(*rich);
        assert!(text.chars().count() <= OUTBOUND_TEXT_LIMIT);
        assert_eq!(text.matches("<pre>").count(), text.matches("</pre>").count());
        assert!(text.ends_with("(truncated)"));
    }

    #[tokio::test]
    async fn send_failure_is_swallowed() {
        let (transport, _, forwarder) = setup(FakeHost::with_threads(1));
        transport.fail_send.store(true, Ordering::SeqCst);
        assert_eq!(forwarder.forward(&reply("t0", json!("hi"))).await, None);
    }

    #[tokio::test]
    async fn published_events_reach_the_chat() {
        let (transport, _, forwarder) = setup(FakeHost::with_threads(1));
        let events = HostEvents::new();
        let handle = forwarder.start(&events);

        assert_eq!(events.publish(reply("t0", json!("first"))), 1);
        for _ in 0..100 {
            if !sent_texts(&transport).is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(sent_texts(&transport)[0].contains("first"));

        handle.abort();
        let _ = handle.await;
        assert_eq!(events.publish(reply("t0", json!("second"))), 0);
    }
}

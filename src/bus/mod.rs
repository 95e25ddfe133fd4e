//! Agent communication bus.
//!
//! Registry of named agent endpoints with point-to-point delivery,
//! response correlation under a deadline, broadcast fan-out, a bounded
//! audit history, and scan-based per-agent counters.

pub mod message;

pub use message::{JsonMap, Message, MessageBody, MessageType, Response};

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::errors::{AgentError, Result};

/// Default deadline for required-response sends
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Hard ceiling on retained message history
pub const MAX_HISTORY: usize = 1000;

/// Any registered agent is a handler of this signature.
///
/// Workers (scout, matcher, writer, application, tracker) are supplied by
/// surrounding code and may block on network I/O internally.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    async fn handle_message(&self, message: Message) -> Result<Response>;
}

/// Per-agent message counters, computed by scanning retained history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub sent: usize,
    pub received: usize,
    pub total: usize,
}

/// Message bus for routing messages between agents
pub struct CommunicationBus {
    registry: RwLock<HashMap<String, Arc<dyn AgentHandler>>>,
    history: Mutex<VecDeque<Message>>,
}

impl CommunicationBus {
    pub fn new() -> Self {
        info!("communication bus initialized");
        Self {
            registry: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Register an agent to receive messages.
    ///
    /// A duplicate name overwrites the previous handler; the overwrite is
    /// logged at warning level rather than surfaced as an error.
    pub fn register_agent(&self, name: impl Into<String>, handler: Arc<dyn AgentHandler>) {
        let name = name.into();
        let mut registry = self.registry.write().expect("registry lock poisoned");
        if registry.contains_key(&name) {
            warn!(agent = %name, "agent already registered, overwriting");
        }
        registry.insert(name.clone(), handler);
        info!(agent = %name, "registered agent");
    }

    /// Remove an agent from the registry. No-op if absent.
    pub fn unregister_agent(&self, name: &str) {
        let mut registry = self.registry.write().expect("registry lock poisoned");
        if registry.remove(name).is_some() {
            info!(agent = %name, "unregistered agent");
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry
            .read()
            .expect("registry lock poisoned")
            .contains_key(name)
    }

    pub fn list_agents(&self) -> Vec<String> {
        self.registry
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Send a message to its target agent.
    ///
    /// With `requires_response` the handler is awaited up to `timeout`.
    /// The handler runs on its own task, so a timeout abandons it rather
    /// than cancelling it: the handler still runs to completion and its
    /// eventual result is discarded. Without `requires_response` the
    /// handler runs detached and errors are only logged.
    pub async fn send(&self, message: Message, timeout: Duration) -> Result<Option<Response>> {
        let handler = {
            let registry = self.registry.read().expect("registry lock poisoned");
            registry
                .get(&message.to_agent)
                .cloned()
                .ok_or_else(|| AgentError::UnknownAgent {
                    name: message.to_agent.clone(),
                })?
        };

        self.log_message(&message);

        info!(
            message_type = message.message_type().as_str(),
            from = %message.from_agent,
            to = %message.to_agent,
            "sending message"
        );

        if !message.requires_response {
            let to_agent = message.to_agent.clone();
            tokio::spawn(async move {
                if let Err(e) = handler.handle_message(message).await {
                    error!(agent = %to_agent, error = %e, "fire-and-forget handler failed");
                }
            });
            return Ok(None);
        }

        let to_agent = message.to_agent.clone();
        // Spawned so the deadline races against the join handle only;
        // an expired handler keeps running and its result is dropped
        let task = tokio::spawn(async move { handler.handle_message(message).await });
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(response))) => {
                info!(agent = %to_agent, "received response");
                Ok(Some(response))
            }
            Ok(Ok(Err(e))) => {
                error!(agent = %to_agent, error = %e, "handler failed");
                Err(AgentError::Delivery {
                    agent: to_agent,
                    reason: e.to_string(),
                })
            }
            Ok(Err(join_err)) => {
                error!(agent = %to_agent, error = %join_err, "handler panicked");
                Err(AgentError::Delivery {
                    agent: to_agent,
                    reason: join_err.to_string(),
                })
            }
            Err(_) => {
                error!(agent = %to_agent, "timeout waiting for response");
                Err(AgentError::Timeout {
                    agent: to_agent,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Send with the default 30s deadline
    pub async fn send_default(&self, message: Message) -> Result<Option<Response>> {
        self.send(message, DEFAULT_SEND_TIMEOUT).await
    }

    /// Broadcast a message to all registered agents.
    ///
    /// Each recipient gets its own copy (same correlation id) delivered
    /// concurrently. Per-recipient failures, panics included, land as `Err`
    /// in that agent's slot; the map is fully populated before return.
    pub async fn broadcast(
        &self,
        message: Message,
        exclude_sender: bool,
    ) -> HashMap<String, Result<Response>> {
        info!(
            message_type = message.message_type().as_str(),
            from = %message.from_agent,
            "broadcasting message"
        );

        let recipients: Vec<(String, Arc<dyn AgentHandler>)> = {
            let registry = self.registry.read().expect("registry lock poisoned");
            registry
                .iter()
                .filter(|(name, _)| !(exclude_sender && **name == message.from_agent))
                .map(|(name, handler)| (name.clone(), Arc::clone(handler)))
                .collect()
        };

        let mut tasks = Vec::with_capacity(recipients.len());
        for (name, handler) in recipients {
            let copy = message.recipient_copy(&name);
            let task = tokio::spawn(async move { handler.handle_message(copy).await });
            tasks.push((name, task));
        }

        let mut responses = HashMap::new();
        for (name, task) in tasks {
            let outcome = match task.await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => {
                    error!(agent = %name, error = %e, "broadcast delivery failed");
                    Err(AgentError::Delivery {
                        agent: name.clone(),
                        reason: e.to_string(),
                    })
                }
                Err(join_err) => {
                    error!(agent = %name, error = %join_err, "broadcast handler panicked");
                    Err(AgentError::Delivery {
                        agent: name.clone(),
                        reason: join_err.to_string(),
                    })
                }
            };
            responses.insert(name, outcome);
        }

        responses
    }

    /// Append to history, then trim so the cap is a hard ceiling
    fn log_message(&self, message: &Message) {
        let mut history = self.history.lock().expect("history lock poisoned");
        history.push_back(message.clone());
        while history.len() > MAX_HISTORY {
            history.pop_front();
        }
    }

    /// Retained message history, most recent `limit` in chronological order.
    /// With `agent` given, filters to messages it sent or received.
    pub fn message_history(&self, agent: Option<&str>, limit: usize) -> Vec<Message> {
        let history = self.history.lock().expect("history lock poisoned");
        let filtered: Vec<Message> = history
            .iter()
            .filter(|msg| match agent {
                Some(name) => msg.from_agent == name || msg.to_agent == name,
                None => true,
            })
            .cloned()
            .collect();

        let skip = filtered.len().saturating_sub(limit);
        filtered.into_iter().skip(skip).collect()
    }

    /// Counters for one agent, computed by scanning retained history.
    ///
    /// Known limitation: once history wraps past the 1000-entry cap, counts
    /// silently exclude the dropped messages.
    pub fn agent_stats(&self, name: &str) -> BusStats {
        let history = self.history.lock().expect("history lock poisoned");
        let sent = history.iter().filter(|m| m.from_agent == name).count();
        let received = history.iter().filter(|m| m.to_agent == name).count();
        BusStats {
            sent,
            received,
            total: sent + received,
        }
    }

    /// Counters for every registered agent
    pub fn all_stats(&self) -> HashMap<String, BusStats> {
        self.list_agents()
            .into_iter()
            .map(|name| {
                let stats = self.agent_stats(&name);
                (name, stats)
            })
            .collect()
    }

    pub fn clear_history(&self) {
        self.history
            .lock()
            .expect("history lock poisoned")
            .clear();
        info!("message history cleared");
    }
}

impl Default for CommunicationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::assert_ok;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Handler that echoes a fixed tag back
    struct EchoHandler {
        tag: &'static str,
        calls: AtomicUsize,
    }

    impl EchoHandler {
        fn new(tag: &'static str) -> Arc<Self> {
            Arc::new(Self {
                tag,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AgentHandler for EchoHandler {
        async fn handle_message(&self, _message: Message) -> Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut response = Response::new();
            response.insert("tag".to_string(), json!(self.tag));
            Ok(response)
        }
    }

    /// Handler that never completes
    struct StuckHandler;

    #[async_trait]
    impl AgentHandler for StuckHandler {
        async fn handle_message(&self, _message: Message) -> Result<Response> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    /// Handler that always fails
    struct FailingHandler;

    #[async_trait]
    impl AgentHandler for FailingHandler {
        async fn handle_message(&self, _message: Message) -> Result<Response> {
            Err(AgentError::Generic("worker exploded".to_string()))
        }
    }

    fn request_to(to: &str) -> Message {
        Message::request("orchestrator", to, "search_jobs", JsonMap::new())
    }

    fn notification_to(to: &str) -> Message {
        Message::new(
            "orchestrator",
            to,
            MessageBody::Notification {
                info: JsonMap::new(),
            },
            false,
        )
    }

    #[tokio::test]
    async fn test_send_to_unknown_agent() {
        let bus = CommunicationBus::new();
        let result = bus.send_default(request_to("ghost")).await;
        assert!(matches!(
            result,
            Err(AgentError::UnknownAgent { name }) if name == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_send_with_response() {
        let bus = CommunicationBus::new();
        bus.register_agent("scout", EchoHandler::new("scout-v1"));

        let response = tokio_test::assert_ok!(bus.send_default(request_to("scout")).await);
        assert_eq!(response.unwrap()["tag"], json!("scout-v1"));
    }

    #[tokio::test]
    async fn test_fire_and_forget_returns_none() {
        let bus = CommunicationBus::new();
        let handler = EchoHandler::new("tracker");
        bus.register_agent("tracker", handler.clone());

        let response = bus
            .send_default(notification_to("tracker"))
            .await
            .unwrap();
        assert!(response.is_none());

        // Detached delivery still reaches the handler
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_timeout_bound() {
        let bus = CommunicationBus::new();
        bus.register_agent("slow", Arc::new(StuckHandler));

        let start = std::time::Instant::now();
        let result = bus
            .send(request_to("slow"), Duration::from_millis(50))
            .await;
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(AgentError::Timeout { timeout_ms: 50, .. })));
        // ~50ms plus scheduler slack
        assert!(elapsed < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_timed_out_handler_still_completes() {
        struct SlowHandler {
            done: Arc<AtomicBool>,
        }

        #[async_trait]
        impl AgentHandler for SlowHandler {
            async fn handle_message(&self, _message: Message) -> Result<Response> {
                tokio::time::sleep(Duration::from_millis(100)).await;
                self.done.store(true, Ordering::SeqCst);
                Ok(Response::new())
            }
        }

        let bus = CommunicationBus::new();
        let done = Arc::new(AtomicBool::new(false));
        bus.register_agent("slow", Arc::new(SlowHandler { done: done.clone() }));

        let result = bus.send(request_to("slow"), Duration::from_millis(20)).await;
        assert!(matches!(result, Err(AgentError::Timeout { .. })));

        // Abandoned, not cancelled: the handler finishes on its own task
        // and its result is discarded
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_handler_error_becomes_delivery_error() {
        let bus = CommunicationBus::new();
        bus.register_agent("application", Arc::new(FailingHandler));

        let result = bus.send_default(request_to("application")).await;
        match result {
            Err(AgentError::Delivery { agent, reason }) => {
                assert_eq!(agent, "application");
                assert!(reason.contains("worker exploded"));
            }
            other => panic!("expected delivery error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_duplicate_registration_overwrites() {
        // Documented choice: overwrite plus warning, not an error
        let bus = CommunicationBus::new();
        bus.register_agent("scout", EchoHandler::new("old"));
        bus.register_agent("scout", EchoHandler::new("new"));

        let response = tokio_test::assert_ok!(bus.send_default(request_to("scout")).await);
        assert_eq!(response.unwrap()["tag"], json!("new"));
        assert_eq!(bus.list_agents().len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let bus = CommunicationBus::new();
        bus.register_agent("scout", EchoHandler::new("scout"));
        bus.unregister_agent("scout");
        bus.unregister_agent("scout");
        assert!(!bus.is_registered("scout"));
    }

    #[tokio::test]
    async fn test_broadcast_completeness() {
        let bus = CommunicationBus::new();
        bus.register_agent("orchestrator", EchoHandler::new("orchestrator"));
        bus.register_agent("scout", EchoHandler::new("scout"));
        bus.register_agent("matcher", EchoHandler::new("matcher"));
        bus.register_agent("broken", Arc::new(FailingHandler));

        let msg = Message::new(
            "orchestrator",
            Message::BROADCAST,
            MessageBody::StatusUpdate {
                status: "searching".to_string(),
            },
            true,
        );
        let responses = bus.broadcast(msg, true).await;

        // N-1 slots: sender excluded, every other agent present
        assert_eq!(responses.len(), 3);
        assert!(!responses.contains_key("orchestrator"));
        assert!(responses["scout"].is_ok());
        assert!(responses["matcher"].is_ok());
        assert!(responses["broken"].is_err());
    }

    #[tokio::test]
    async fn test_broadcast_includes_sender_when_asked() {
        let bus = CommunicationBus::new();
        bus.register_agent("orchestrator", EchoHandler::new("orchestrator"));
        bus.register_agent("scout", EchoHandler::new("scout"));

        let msg = Message::new(
            "orchestrator",
            Message::BROADCAST,
            MessageBody::StatusUpdate {
                status: "idle".to_string(),
            },
            true,
        );
        let responses = bus.broadcast(msg, false).await;
        assert_eq!(responses.len(), 2);
    }

    #[tokio::test]
    async fn test_history_cap() {
        let bus = CommunicationBus::new();
        bus.register_agent("tracker", EchoHandler::new("tracker"));

        for i in 0..1500 {
            let mut msg = notification_to("tracker");
            msg.metadata.insert("seq".to_string(), json!(i));
            bus.send_default(msg).await.unwrap();
        }

        let history = bus.message_history(None, 2000);
        assert_eq!(history.len(), 1000);
        // Most recent 1000, original order preserved
        assert_eq!(history.first().unwrap().metadata["seq"], json!(500));
        assert_eq!(history.last().unwrap().metadata["seq"], json!(1499));
    }

    #[tokio::test]
    async fn test_history_filter_and_limit() {
        let bus = CommunicationBus::new();
        bus.register_agent("scout", EchoHandler::new("scout"));
        bus.register_agent("matcher", EchoHandler::new("matcher"));

        bus.send_default(request_to("scout")).await.unwrap();
        bus.send_default(request_to("matcher")).await.unwrap();
        bus.send_default(request_to("scout")).await.unwrap();

        let scout_history = bus.message_history(Some("scout"), 100);
        assert_eq!(scout_history.len(), 2);

        let limited = bus.message_history(None, 2);
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[1].to_agent, "scout");
    }

    #[tokio::test]
    async fn test_stats_scan_retained_window() {
        let bus = CommunicationBus::new();
        bus.register_agent("scout", EchoHandler::new("scout"));

        bus.send_default(request_to("scout")).await.unwrap();
        bus.send_default(request_to("scout")).await.unwrap();

        let stats = bus.agent_stats("scout");
        assert_eq!(stats.received, 2);
        assert_eq!(stats.sent, 0);
        assert_eq!(stats.total, 2);

        let sender_stats = bus.agent_stats("orchestrator");
        assert_eq!(sender_stats.sent, 2);

        bus.clear_history();
        assert_eq!(bus.agent_stats("scout").total, 0);
    }
}

use crate::signaling::{Delivery, Request, SignalingClient, Subscription};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Сигналинг в памяти процесса: хранит снимок каждой подписки и умеет
/// имитировать переподключение транспорта (`resume`).
pub struct MemorySignaling {
    session_id: String,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    snapshots: HashMap<Subscription, Value>,
    subscribers: HashMap<Subscription, Vec<mpsc::UnboundedSender<Delivery>>>,
    requests: Vec<Request>,
}

impl Inner {
    fn broadcast(&mut self, subscription: &Subscription, delivery: Delivery) {
        if let Some(subs) = self.subscribers.get_mut(subscription) {
            subs.retain(|tx| tx.send(delivery.clone()).is_ok());
        }
    }
}

impl MemorySignaling {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Новый снимок значения
    pub fn set(&self, subscription: &Subscription, value: Value) {
        let mut inner = self.lock();
        inner.snapshots.insert(subscription.clone(), value.clone());
        inner.broadcast(subscription, Delivery::Full(value));
    }

    /// Добавить элемент в список
    pub fn push(&self, subscription: &Subscription, value: Value) {
        let mut inner = self.lock();
        let snapshot = inner
            .snapshots
            .entry(subscription.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        match snapshot {
            Value::Array(items) => items.push(value.clone()),
            other => *other = Value::Array(vec![value.clone()]),
        }
        inner.broadcast(subscription, Delivery::Incremental(value));
    }

    /// Транспорт переподключился: все снимки приходят заново
    pub fn resume(&self) {
        let mut inner = self.lock();
        let snapshots: Vec<_> = inner
            .snapshots
            .iter()
            .map(|(s, v)| (s.clone(), v.clone()))
            .collect();
        tracing::debug!(count = snapshots.len(), "signaling resumed, redelivering snapshots");
        for (subscription, value) in snapshots {
            inner.broadcast(&subscription, Delivery::Full(value));
        }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }
}

impl SignalingClient for MemorySignaling {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn subscribe(&self, subscription: Subscription) -> mpsc::UnboundedReceiver<Delivery> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        if let Some(snapshot) = inner.snapshots.get(&subscription) {
            let _ = tx.send(Delivery::Full(snapshot.clone()));
        }
        tracing::debug!(%subscription, "subscribed");
        inner.subscribers.entry(subscription).or_default().push(tx);
        rx
    }

    fn request(&self, request: Request) {
        tracing::debug!(method = ?request.method(), "signaling request");
        self.lock().requests.push(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::types::IceCandidate;
    use crate::signaling::Topic;
    use serde_json::json;

    #[tokio::test]
    async fn late_subscriber_gets_snapshot() {
        let sig = MemorySignaling::new("s1");
        let role = Subscription::new(Topic::Role, "r");
        sig.set(&role, json!(true));

        let mut rx = sig.subscribe(role);
        assert_eq!(rx.recv().await, Some(Delivery::Full(json!(true))));
    }

    #[tokio::test]
    async fn push_then_resume_redelivers_list() {
        let sig = MemorySignaling::new("s1");
        let ice = Subscription::new(Topic::Candidates, "r");
        let mut rx = sig.subscribe(ice.clone());

        sig.push(&ice, json!({ "candidate": "a" }));
        sig.push(&ice, json!({ "candidate": "b" }));
        sig.resume();

        assert_eq!(rx.recv().await, Some(Delivery::Incremental(json!({ "candidate": "a" }))));
        assert_eq!(rx.recv().await, Some(Delivery::Incremental(json!({ "candidate": "b" }))));
        assert_eq!(
            rx.recv().await,
            Some(Delivery::Full(json!([{ "candidate": "a" }, { "candidate": "b" }])))
        );
    }

    #[test]
    fn requests_recorded_in_order() {
        let sig = MemorySignaling::new("s1");
        assert_eq!(sig.session_id(), "s1");
        sig.request(Request::PublishCandidate {
            room: "r".into(),
            candidate: IceCandidate::new("c1"),
        });
        sig.request(Request::PublishCandidate {
            room: "r".into(),
            candidate: IceCandidate::new("c2"),
        });
        let reqs = sig.requests();
        assert_eq!(reqs.len(), 2);
        assert!(matches!(&reqs[1], Request::PublishCandidate { candidate, .. } if candidate.candidate == "c2"));
    }
}

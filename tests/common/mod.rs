#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use ssc_call::peer::{
    ConnectionEvents, ConnectionFactory, IceCandidate, LocalMedia, MediaConnection, SdpType,
    ServerConfig, SessionDescription,
};
use ssc_call::{
    ChannelViewPort, MemorySignaling, Request, SessionCoordinator, SessionError, SessionResult,
    Subscription, Topic, ViewEvent,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Что происходило с соединениями, по порядку
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Connect(u64),
    Close(u64),
    AddIce(u64, String),
    SetRemote(u64, SdpType),
    SetLocal(u64, String),
}

#[derive(Default)]
pub struct MockFactory {
    pub ops: Arc<Mutex<Vec<Op>>>,
    pub events: Mutex<Vec<ConnectionEvents>>,
    /// create_offer первого соединения ждёт этого сигнала
    pub first_offer_gate: Mutex<Option<Arc<Notify>>>,
    pub fail_answers: bool,
}

impl MockFactory {
    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn built(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, Op::Connect(_)))
            .count()
    }

    pub fn ice_applied_to(&self, conn: u64) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::AddIce(id, c) if id == conn => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self, conn: u64) -> ConnectionEvents {
        self.events.lock().unwrap()[(conn - 1) as usize].clone()
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn connect(
        &self,
        _relays: &[ServerConfig],
        _media: &LocalMedia,
        events: ConnectionEvents,
    ) -> SessionResult<Arc<dyn MediaConnection>> {
        let id = {
            let mut all = self.events.lock().unwrap();
            all.push(events);
            all.len() as u64
        };
        self.ops.lock().unwrap().push(Op::Connect(id));

        let gate = if id == 1 {
            self.first_offer_gate.lock().unwrap().clone()
        } else {
            None
        };

        Ok(Arc::new(MockConnection {
            id,
            ops: self.ops.clone(),
            gate,
            fail_answers: self.fail_answers,
            state: Mutex::new(SignalingState::Stable),
        }))
    }
}

/// Переходы signaling state как в webrtc-rs (без rollback и pranswer)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
}

pub struct MockConnection {
    id: u64,
    ops: Arc<Mutex<Vec<Op>>>,
    gate: Option<Arc<Notify>>,
    fail_answers: bool,
    state: Mutex<SignalingState>,
}

impl MockConnection {
    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }

    fn state(&self) -> SignalingState {
        *self.state.lock().unwrap()
    }

    fn transition(&self, remote: bool, kind: SdpType) -> SessionResult<()> {
        use SignalingState::*;
        let mut state = self.state.lock().unwrap();
        let next = match (*state, remote, kind) {
            (Stable | HaveLocalOffer, false, SdpType::Offer) => HaveLocalOffer,
            (HaveRemoteOffer, false, SdpType::Answer) => Stable,
            (Stable | HaveRemoteOffer, true, SdpType::Offer) => HaveRemoteOffer,
            (HaveLocalOffer, true, SdpType::Answer) => Stable,
            (current, _, _) => {
                return Err(SessionError::Connection(format!(
                    "conn{}: invalid transition from {current:?} (remote={remote}, {kind})",
                    self.id
                )))
            }
        };
        *state = next;
        Ok(())
    }
}

#[async_trait]
impl MediaConnection for MockConnection {
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> SessionResult<()> {
        self.record(Op::AddIce(self.id, candidate.candidate));
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> SessionResult<()> {
        self.transition(true, desc.kind)?;
        self.record(Op::SetRemote(self.id, desc.kind));
        Ok(())
    }

    async fn set_local_description(&self, desc: SessionDescription) -> SessionResult<()> {
        self.transition(false, desc.kind)?;
        self.record(Op::SetLocal(self.id, desc.sdp));
        Ok(())
    }

    async fn create_offer(&self) -> SessionResult<SessionDescription> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.state() == SignalingState::HaveRemoteOffer {
            return Err(SessionError::Negotiation(format!(
                "conn{}: cannot create offer with a pending remote offer",
                self.id
            )));
        }
        Ok(SessionDescription::offer(format!("v=0 offer conn{}", self.id)))
    }

    async fn create_answer(&self) -> SessionResult<SessionDescription> {
        if self.state() != SignalingState::HaveRemoteOffer {
            return Err(SessionError::Negotiation(format!(
                "conn{}: no remote offer to answer",
                self.id
            )));
        }
        if self.fail_answers {
            return Err(SessionError::Negotiation("answer rejected".into()));
        }
        Ok(SessionDescription::answer(format!("v=0 answer conn{}", self.id)))
    }

    async fn close(&self) -> SessionResult<()> {
        self.record(Op::Close(self.id));
        Ok(())
    }
}

pub fn candidate(name: &str) -> Value {
    json!({ "candidate": name, "sdpMid": "0", "sdpMLineIndex": 0 })
}

pub struct Harness {
    pub coordinator: SessionCoordinator,
    pub signaling: Arc<MemorySignaling>,
    pub factory: Arc<MockFactory>,
    pub view_rx: mpsc::UnboundedReceiver<ViewEvent>,
    pub room: String,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_factory(MockFactory::default())
    }

    pub fn with_factory(factory: MockFactory) -> Self {
        let signaling = Arc::new(MemorySignaling::new("test-session"));
        let factory = Arc::new(factory);
        let (view, view_rx) = ChannelViewPort::new();
        let mut coordinator = SessionCoordinator::new(
            signaling.clone(),
            factory.clone(),
            Arc::new(view),
            LocalMedia::default(),
            Vec::new(),
        );
        coordinator.join_room("lobby").unwrap();
        Self {
            coordinator,
            signaling,
            factory,
            view_rx,
            room: "lobby".into(),
        }
    }

    fn sub(&self, topic: Topic) -> Subscription {
        Subscription::new(topic, self.room.clone())
    }

    /// Обрабатывает всё, что успело прийти
    pub async fn drain(&mut self) {
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(50), self.coordinator.next_event()).await
        {
            self.coordinator.handle(event).await;
        }
    }

    pub async fn role(&mut self, calling: bool) {
        self.signaling.set(&self.sub(Topic::Role), json!(calling));
        self.drain().await;
    }

    pub async fn identity(&mut self, ip: &str) {
        self.signaling.set(&self.sub(Topic::Identity), json!(ip));
        self.drain().await;
    }

    pub async fn push_candidate(&mut self, name: &str) {
        self.signaling
            .push(&self.sub(Topic::Candidates), candidate(name));
        self.drain().await;
    }

    pub async fn candidate_snapshot(&mut self, names: &[&str]) {
        let list: Vec<Value> = names.iter().map(|n| candidate(n)).collect();
        self.signaling
            .set(&self.sub(Topic::Candidates), Value::Array(list));
        self.drain().await;
    }

    pub async fn remote_description(&mut self, desc: Value) {
        self.signaling
            .set(&self.sub(Topic::RemoteDescription), desc);
        self.drain().await;
    }

    pub async fn resume(&mut self) {
        self.signaling.resume();
        self.drain().await;
    }

    pub fn published_descriptions(&self) -> Vec<SessionDescription> {
        self.signaling
            .requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::PublishLocalDescription { description, .. } => Some(description),
                _ => None,
            })
            .collect()
    }

    pub fn published_candidates(&self) -> Vec<IceCandidate> {
        self.signaling
            .requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::PublishCandidate { candidate, .. } => Some(candidate),
                _ => None,
            })
            .collect()
    }

    pub fn view_events(&mut self) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = self.view_rx.try_recv() {
            events.push(ev);
        }
        events
    }
}

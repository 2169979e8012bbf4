//! Координатор сессии: разбирает доставки сигналинга и решает, когда
//! пересоздавать соединение, а когда только переотправить описание.
//!
//! Все обработчики выполняются по одному, в одной задаче (`run`), поэтому
//! поля сессии меняются без гонок. Создание offer/answer уходит в отдельную
//! задачу; результат возвращается событием с поколением соединения и
//! отбрасывается, если соединение за это время пересоздали.

use crate::error::{SessionError, SessionResult};
use crate::logger::{analyze_candidates, dump_candidate, dump_description};
use crate::peer::connection::{ConnectionEvents, ConnectionFactory, MediaConnection, PeerEvent};
use crate::peer::media::LocalMedia;
use crate::peer::negotiation::spawn_negotiation;
use crate::peer::types::{IceCandidate, SdpType, ServerConfig, SessionDescription};
use crate::session::{Role, Session, SessionPhase};
use crate::signaling::{Delivery, Request, SignalingClient, Subscription, Topic};
use crate::view::ViewPort;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Статус для ошибок WebRTC на экране
pub const WEBRTC_ERROR_STATUS: &str = "WebRTC error occurred";

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Role(Delivery),
    Identity(Delivery),
    Candidates(Delivery),
    RemoteDescription(Delivery),
    Peer { generation: u64, event: PeerEvent },
}

struct Subscriptions {
    role: mpsc::UnboundedReceiver<Delivery>,
    identity: mpsc::UnboundedReceiver<Delivery>,
    candidates: mpsc::UnboundedReceiver<Delivery>,
    remote_description: mpsc::UnboundedReceiver<Delivery>,
}

pub struct SessionCoordinator {
    session: Session,
    relays: Vec<ServerConfig>,
    media: LocalMedia,
    signaling: Arc<dyn SignalingClient>,
    factory: Arc<dyn ConnectionFactory>,
    view: Arc<dyn ViewPort>,
    connection: Option<Arc<dyn MediaConnection>>,
    /// Растёт при каждом пересоздании соединения
    generation: u64,
    /// remote description уже применён к текущему соединению
    remote_applied: bool,
    /// Описание уничтоженного соединения; сервер может прислать его снова
    stale_remote: Option<SessionDescription>,
    peer_tx: mpsc::UnboundedSender<(u64, PeerEvent)>,
    peer_rx: mpsc::UnboundedReceiver<(u64, PeerEvent)>,
    subscriptions: Option<Subscriptions>,
}

fn decode<T: DeserializeOwned>(what: &'static str, value: Value) -> SessionResult<T> {
    serde_json::from_value(value).map_err(|e| SessionError::decode(what, e))
}

impl SessionCoordinator {
    pub fn new(
        signaling: Arc<dyn SignalingClient>,
        factory: Arc<dyn ConnectionFactory>,
        view: Arc<dyn ViewPort>,
        media: LocalMedia,
        relays: Vec<ServerConfig>,
    ) -> Self {
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let session = Session::new(signaling.session_id(), "");
        Self {
            session,
            relays,
            media,
            signaling,
            factory,
            view,
            connection: None,
            generation: 0,
            remote_applied: false,
            stale_remote: None,
            peer_tx,
            peer_rx,
            subscriptions: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Вход в комнату: экран ожидания и четыре подписки
    pub fn join_room(&mut self, name: &str) -> SessionResult<()> {
        if self.subscriptions.is_some() {
            return Err(SessionError::AlreadyJoined(self.session.room_name.clone()));
        }
        if name.trim().is_empty() {
            return Err(SessionError::InvalidRoomName(name.to_owned()));
        }

        self.session.room_name = name.to_owned();
        self.session.phase = SessionPhase::Joined;
        tracing::info!(session_id = %self.session.session_id, room = name, "joining room");
        self.view
            .show_loading(&format!("Connecting to room {name}"), Some("Please wait."));

        let signaling = self.signaling.clone();
        let sub = |topic| signaling.subscribe(Subscription::new(topic, name));
        self.subscriptions = Some(Subscriptions {
            role: sub(Topic::Role),
            identity: sub(Topic::Identity),
            candidates: sub(Topic::Candidates),
            remote_description: sub(Topic::RemoteDescription),
        });
        Ok(())
    }

    /// Следующее событие: доставка из сигналинга или событие соединения
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let peer_rx = &mut self.peer_rx;
        let Some(subs) = self.subscriptions.as_mut() else {
            return peer_rx
                .recv()
                .await
                .map(|(generation, event)| SessionEvent::Peer { generation, event });
        };

        tokio::select! {
            Some(d) = subs.role.recv() => Some(SessionEvent::Role(d)),
            Some(d) = subs.identity.recv() => Some(SessionEvent::Identity(d)),
            Some(d) = subs.candidates.recv() => Some(SessionEvent::Candidates(d)),
            Some(d) = subs.remote_description.recv() => Some(SessionEvent::RemoteDescription(d)),
            Some((generation, event)) = peer_rx.recv() => Some(SessionEvent::Peer { generation, event }),
            else => None,
        }
    }

    /// Цикл событий сессии, живёт столько же, сколько страница
    pub async fn run(mut self) {
        while let Some(event) = self.next_event().await {
            self.handle(event).await;
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(room = %self.session.room_name, generation = self.generation))]
    pub async fn handle(&mut self, event: SessionEvent) {
        let result = match event {
            SessionEvent::Role(d) => self.on_role(d).await,
            SessionEvent::Identity(d) => self.on_identity(d).await,
            SessionEvent::Candidates(d) => self.on_candidates(d).await,
            SessionEvent::RemoteDescription(d) => self.on_remote_description(d).await,
            SessionEvent::Peer { generation, event } => self.on_peer_event(generation, event).await,
        };

        match result {
            Ok(()) => {}
            Err(e @ SessionError::Decode { .. }) => {
                tracing::warn!(error = %e, "ignoring signaling delivery");
            }
            Err(e) => {
                tracing::error!(error = %e, "session error");
                self.session.phase = SessionPhase::Failed;
                self.view.show_error(&e.to_string(), Some(WEBRTC_ERROR_STATUS));
            }
        }
    }

    async fn on_role(&mut self, delivery: Delivery) -> SessionResult<()> {
        let calling: bool = decode("role", delivery.into_inner())?;
        let role = Role::from(calling);

        match self.session.role {
            Role::Unknown => {
                tracing::info!(?role, "role assigned");
                self.session.role = role;
                // адрес мог прийти раньше роли
                if self.session.network_identity.is_some() {
                    self.rebuild_connection().await?;
                }
            }
            current if current != role => {
                tracing::info!(from = ?current, to = ?role, "role reassigned");
                self.session.role = role;
                self.rebuild_connection().await?;
            }
            _ => tracing::debug!(?role, "role redelivered"),
        }
        Ok(())
    }

    async fn on_identity(&mut self, delivery: Delivery) -> SessionResult<()> {
        let identity: String = decode("network identity", delivery.into_inner())?;

        if self.session.network_identity.as_deref() == Some(identity.as_str()) {
            // тот же адрес - переподключился только сигналинг
            tracing::info!(%identity, "signaling resumed without network change");
            self.resend_local_description();
            return Ok(());
        }

        tracing::info!(
            from = ?self.session.network_identity,
            to = %identity,
            "network identity changed"
        );
        self.session.network_identity = Some(identity);
        self.rebuild_connection().await
    }

    async fn on_candidates(&mut self, delivery: Delivery) -> SessionResult<()> {
        match delivery {
            Delivery::Full(value) => {
                let candidates: Vec<IceCandidate> = if value.is_null() {
                    Vec::new()
                } else {
                    decode("candidate list", value)?
                };
                tracing::debug!(count = candidates.len(), "remote candidate snapshot");
                analyze_candidates(&candidates);
                self.session.remote_ice.replace(candidates);
            }
            Delivery::Incremental(value) => {
                let candidate: IceCandidate = decode("candidate", value)?;
                dump_candidate("REMOTE", &candidate);
                self.session.remote_ice.push(candidate);
            }
        }
        self.apply_remote_candidates().await;
        Ok(())
    }

    async fn on_remote_description(&mut self, delivery: Delivery) -> SessionResult<()> {
        let value = delivery.into_inner();
        if value.is_null() {
            tracing::debug!("peer has not negotiated yet");
            return Ok(());
        }
        let desc: SessionDescription = decode("remote description", value)?;
        if desc.sdp.is_empty() {
            tracing::debug!("empty remote description ignored");
            return Ok(());
        }

        let fits_role = match self.session.role {
            Role::Caller => desc.kind == SdpType::Answer,
            Role::Callee => desc.kind == SdpType::Offer,
            Role::Unknown => true,
        };
        if !fits_role {
            tracing::warn!(role = ?self.session.role, kind = %desc.kind, "remote description does not fit role, ignoring");
            return Ok(());
        }

        if self.stale_remote.as_ref() == Some(&desc) {
            tracing::debug!(kind = %desc.kind, "remote description of a destroyed connection ignored");
            return Ok(());
        }

        if self.remote_applied && self.session.remote_description.as_ref() == Some(&desc) {
            tracing::debug!("remote description redelivered, already applied");
            return Ok(());
        }

        // answer имеет смысл только после нашего offer на этом соединении
        if desc.kind == SdpType::Answer
            && self.connection.is_some()
            && self.session.local_description.is_none()
        {
            tracing::debug!("answer arrived before local offer, ignoring");
            return Ok(());
        }

        dump_description("REMOTE", &desc);
        self.session.remote_description = Some(desc.clone());

        let Some(conn) = self.connection.clone() else {
            tracing::debug!("no connection yet, remote description kept for rebuild");
            return Ok(());
        };
        conn.set_remote_description(desc).await?;
        self.remote_applied = true;

        if self.session.role == Role::Callee {
            self.start_negotiation(SdpType::Answer);
        }
        Ok(())
    }

    /// Применяет ещё не применённые удалённые кандидаты к текущему соединению
    async fn apply_remote_candidates(&mut self) {
        let Some(conn) = self.connection.clone() else {
            tracing::debug!(
                queued = self.session.remote_ice.len(),
                "no connection, candidates stay queued"
            );
            return;
        };

        for candidate in self.session.remote_ice.take_pending() {
            if let Err(e) = conn.add_ice_candidate(candidate).await {
                tracing::warn!(error = %e, "failed to add remote candidate");
            }
        }
    }

    /// Пересоздаёт соединение. Ничего не делает, пока не известны роль и адрес.
    pub async fn rebuild_connection(&mut self) -> SessionResult<()> {
        if !self.session.ready_to_connect() {
            tracing::debug!(role = ?self.session.role, "waiting for role and network identity");
            return Ok(());
        }

        self.session.phase = SessionPhase::Resetting;
        if let Some(old) = self.connection.take() {
            tracing::info!(generation = self.generation, "destroying peer connection");
            if let Err(e) = old.close().await {
                tracing::warn!(error = %e, "failed to close old peer connection");
            }
        }

        self.generation += 1;
        self.remote_applied = false;
        self.session.local_description = None;
        self.session.remote_ice.reset_applied();

        // новому соединению годится только offer для callee; answer отвечал
        // на offer уничтоженного соединения
        let keep_remote = matches!(
            (&self.session.role, &self.session.remote_description),
            (Role::Callee, Some(desc)) if desc.kind == SdpType::Offer
        );
        if !keep_remote {
            if let Some(stale) = self.session.remote_description.take() {
                tracing::debug!(kind = %stale.kind, "dropping remote description of destroyed connection");
                self.stale_remote = Some(stale);
            }
        }

        tracing::info!(
            generation = self.generation,
            role = ?self.session.role,
            "creating peer connection"
        );
        let events = ConnectionEvents::new(self.generation, self.peer_tx.clone());
        let conn = self.factory.connect(&self.relays, &self.media, events).await?;
        self.connection = Some(conn.clone());
        self.session.phase = SessionPhase::Negotiating;

        self.apply_remote_candidates().await;

        if let Some(desc) = self.session.remote_description.clone() {
            conn.set_remote_description(desc).await?;
            self.remote_applied = true;
        }

        match self.session.role {
            Role::Caller => self.start_negotiation(SdpType::Offer),
            Role::Callee if self.remote_applied => self.start_negotiation(SdpType::Answer),
            _ => {}
        }
        Ok(())
    }

    /// Переотправка последнего описания без пересогласования
    pub fn resend_local_description(&self) {
        match (&self.connection, &self.session.local_description) {
            (Some(_), Some(desc)) => {
                tracing::info!(kind = %desc.kind, "resending cached local description");
                self.signaling.request(Request::PublishLocalDescription {
                    room: self.session.room_name.clone(),
                    description: desc.clone(),
                });
            }
            _ => tracing::debug!("no local description to resend yet"),
        }
    }

    fn start_negotiation(&self, kind: SdpType) {
        if let Some(conn) = &self.connection {
            let events = ConnectionEvents::new(self.generation, self.peer_tx.clone());
            spawn_negotiation(conn.clone(), kind, events);
        }
    }

    async fn on_peer_event(&mut self, generation: u64, event: PeerEvent) -> SessionResult<()> {
        let conn = match &self.connection {
            Some(conn) if generation == self.generation => conn.clone(),
            _ => {
                tracing::debug!(
                    generation,
                    current = self.generation,
                    "discarding event of a destroyed connection"
                );
                return Ok(());
            }
        };

        match event {
            PeerEvent::LocalCandidate(candidate) => {
                self.signaling.request(Request::PublishCandidate {
                    room: self.session.room_name.clone(),
                    candidate,
                });
            }
            PeerEvent::RemoteStream(stream) => {
                tracing::info!(stream_id = %stream.stream_id, "remote stream attached");
                self.session.phase = SessionPhase::Connected;
                self.view.show_video(stream);
            }
            PeerEvent::Negotiated { kind, result } => {
                let desc = result.map_err(SessionError::Negotiation)?;
                conn.set_local_description(desc.clone())
                    .await
                    .map_err(|e| SessionError::Negotiation(e.to_string()))?;
                dump_description("LOCAL", &desc);
                tracing::info!(%kind, "publishing local description");
                self.session.local_description = Some(desc.clone());
                self.signaling.request(Request::PublishLocalDescription {
                    room: self.session.room_name.clone(),
                    description: desc,
                });
            }
        }
        Ok(())
    }
}

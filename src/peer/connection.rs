use crate::error::SessionResult;
use crate::logger::dump_candidate;
use crate::peer::media::LocalMedia;
use crate::peer::types::{IceCandidate, RemoteStream, SdpType, ServerConfig, SessionDescription};
use crate::utils::add_ice_url_scheme;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

/// События от соединения обратно в координатор
#[derive(Debug, Clone)]
pub enum PeerEvent {
    LocalCandidate(IceCandidate),
    RemoteStream(RemoteStream),
    Negotiated {
        kind: SdpType,
        result: Result<SessionDescription, String>,
    },
}

/// Канал событий конкретного соединения. Каждое событие помечено
/// поколением соединения, чтобы координатор мог отбросить события
/// уже уничтоженного соединения.
#[derive(Debug, Clone)]
pub struct ConnectionEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, PeerEvent)>,
}

impl ConnectionEvents {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, PeerEvent)>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn send(&self, event: PeerEvent) {
        if self.tx.send((self.generation, event)).is_err() {
            tracing::debug!(generation = self.generation, "session gone, peer event dropped");
        }
    }

    pub fn local_candidate(&self, candidate: IceCandidate) {
        self.send(PeerEvent::LocalCandidate(candidate));
    }

    pub fn remote_stream(&self, stream: RemoteStream) {
        self.send(PeerEvent::RemoteStream(stream));
    }

    pub fn negotiated(&self, kind: SdpType, result: Result<SessionDescription, String>) {
        self.send(PeerEvent::Negotiated { kind, result });
    }
}

/// Медиасоединение с удалённой стороной
#[async_trait]
pub trait MediaConnection: Send + Sync {
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> SessionResult<()>;
    async fn set_remote_description(&self, desc: SessionDescription) -> SessionResult<()>;
    async fn set_local_description(&self, desc: SessionDescription) -> SessionResult<()>;
    async fn create_offer(&self) -> SessionResult<SessionDescription>;
    async fn create_answer(&self) -> SessionResult<SessionDescription>;
    /// Освобождает ресурсы и отключает все колбэки
    async fn close(&self) -> SessionResult<()>;
}

/// Создаёт новые соединения: relay-конфигурация, локальные треки, колбэки
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(
        &self,
        relays: &[ServerConfig],
        media: &LocalMedia,
        events: ConnectionEvents,
    ) -> SessionResult<Arc<dyn MediaConnection>>;
}

/// Фабрика на webrtc-rs
pub struct WebRtcConnector {
    api: Arc<API>,
}

impl WebRtcConnector {
    pub fn new() -> SessionResult<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api: Arc::new(api) })
    }
}

#[async_trait]
impl ConnectionFactory for WebRtcConnector {
    async fn connect(
        &self,
        relays: &[ServerConfig],
        media: &LocalMedia,
        events: ConnectionEvents,
    ) -> SessionResult<Arc<dyn MediaConnection>> {
        let pc = Arc::new(self.api.new_peer_connection(rtc_config(relays)).await?);

        for track in &media.tracks {
            pc.add_track(track.clone()).await?;
        }

        let ev = events.clone();
        pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
            let ev = ev.clone();
            Box::pin(async move {
                match cand {
                    Some(c) => match c.to_json() {
                        Ok(init) => {
                            let candidate = IceCandidate::from(init);
                            dump_candidate("LOCAL", &candidate);
                            ev.local_candidate(candidate);
                        }
                        Err(e) => tracing::warn!(error = %e, "cannot serialize local candidate"),
                    },
                    // cand == None означает конец сбора
                    None => tracing::debug!(generation = ev.generation(), "ICE gathering completed"),
                }
            })
        }));

        let ev = events.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver: Arc<RTCRtpTransceiver>| {
                let stream = RemoteStream {
                    stream_id: track.stream_id(),
                    track_id: track.id(),
                    kind: track.kind().to_string(),
                    track: Some(track),
                };
                tracing::info!(stream_id = %stream.stream_id, kind = %stream.kind, "remote track arrived");
                ev.remote_stream(stream);
                Box::pin(async {})
            },
        ));

        let generation = events.generation();
        pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
            tracing::info!(generation, state = %st, "peer connection state changed");
            Box::pin(async {})
        }));

        Ok(Arc::new(WebRtcConnection {
            pc,
            pending: Mutex::new(Vec::new()),
        }))
    }
}

struct WebRtcConnection {
    pc: Arc<RTCPeerConnection>,
    /// Кандидаты, полученные до установки remote description
    pending: Mutex<Vec<IceCandidate>>,
}

impl WebRtcConnection {
    /// Применяет все отложенные кандидаты после установки remote description
    async fn apply_pending_candidates(&self) {
        let candidates = std::mem::take(&mut *self.pending.lock().await);
        for candidate in candidates {
            dump_candidate("REMOTE-PENDING", &candidate);
            if let Err(e) = self.pc.add_ice_candidate(candidate.into()).await {
                tracing::warn!(error = %e, "failed to apply pending candidate");
            }
        }
    }
}

fn to_rtc(desc: SessionDescription) -> SessionResult<RTCSessionDescription> {
    let rtc = match desc.kind {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
    };
    Ok(rtc)
}

#[async_trait]
impl MediaConnection for WebRtcConnection {
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> SessionResult<()> {
        if self.pc.remote_description().await.is_none() {
            tracing::debug!("remote description not set yet, queuing candidate");
            self.pending.lock().await.push(candidate);
            return Ok(());
        }
        self.pc.add_ice_candidate(candidate.into()).await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> SessionResult<()> {
        self.pc.set_remote_description(to_rtc(desc)?).await?;
        self.apply_pending_candidates().await;
        Ok(())
    }

    async fn set_local_description(&self, desc: SessionDescription) -> SessionResult<()> {
        self.pc.set_local_description(to_rtc(desc)?).await?;
        Ok(())
    }

    async fn create_offer(&self) -> SessionResult<SessionDescription> {
        let offer = self.pc.create_offer(None).await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> SessionResult<SessionDescription> {
        let answer = self.pc.create_answer(None).await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn close(&self) -> SessionResult<()> {
        self.pc
            .on_ice_candidate(Box::new(|_: Option<RTCIceCandidate>| Box::pin(async {})));
        self.pc.on_track(Box::new(
            |_: Arc<TrackRemote>, _: Arc<RTCRtpReceiver>, _: Arc<RTCRtpTransceiver>| {
                Box::pin(async {})
            },
        ));
        self.pc.on_peer_connection_state_change(Box::new(
            |_: RTCPeerConnectionState| Box::pin(async {}),
        ));
        self.pending.lock().await.clear();
        self.pc.close().await?;
        Ok(())
    }
}

/// Создает конфигурацию для peer connection
pub fn rtc_config(relays: &[ServerConfig]) -> RTCConfiguration {
    let ice_servers = if relays.is_empty() {
        vec![RTCIceServer {
            urls: vec![
                "stun:stun.l.google.com:19302".into(),
                "stun:stun1.l.google.com:19302".into(),
            ],
            ..Default::default()
        }]
    } else {
        ice_servers(relays)
    };

    RTCConfiguration {
        ice_servers,
        ice_candidate_pool_size: 10,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

pub fn ice_servers(relays: &[ServerConfig]) -> Vec<RTCIceServer> {
    relays
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect()
}

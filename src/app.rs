use crate::config::SessionConfig;
use crate::coordinator::SessionCoordinator;
use crate::error::{SessionError, SessionResult};
use crate::peer::connection::ConnectionFactory;
use crate::peer::media::{LocalMedia, MediaSource};
use crate::session::SessionPhase;
use crate::signaling::SignalingClient;
use crate::view::ViewPort;
use std::sync::Arc;

/// Клиент звонка до входа в комнату: захват камеры, затем ввод комнаты
pub struct CallApp {
    config: SessionConfig,
    signaling: Arc<dyn SignalingClient>,
    factory: Arc<dyn ConnectionFactory>,
    view: Arc<dyn ViewPort>,
    media_source: Arc<dyn MediaSource>,
    media: Option<LocalMedia>,
    phase: SessionPhase,
}

impl CallApp {
    pub fn new(
        config: SessionConfig,
        signaling: Arc<dyn SignalingClient>,
        factory: Arc<dyn ConnectionFactory>,
        view: Arc<dyn ViewPort>,
        media_source: Arc<dyn MediaSource>,
    ) -> Self {
        Self {
            config,
            signaling,
            factory,
            view,
            media_source,
            media: None,
            phase: SessionPhase::Idle,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Ждём камеру. Ошибка захвата финальна, повторов нет.
    pub async fn start(&mut self) -> SessionResult<()> {
        if self.phase != SessionPhase::Idle {
            return Err(SessionError::WrongPhase("start"));
        }

        self.phase = SessionPhase::AwaitingMedia;
        self.view
            .show_loading("Waiting for video input.", Some("Please connect camera."));

        match self.media_source.acquire().await {
            Ok(media) => {
                tracing::info!(stream_id = %media.stream_id, tracks = media.tracks.len(), "local media ready");
                self.media = Some(media);
                self.phase = SessionPhase::AwaitingRoomEntry;
                self.view.show_room_input();
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "media capture failed");
                self.phase = SessionPhase::Failed;
                self.view.show_error("Camera device not found.", Some("..."));
                Err(match e {
                    SessionError::MediaCapture(_) => e,
                    other => SessionError::MediaCapture(other.to_string()),
                })
            }
        }
    }

    /// Вход в комнату: возвращает координатор, которому дальше нужен `run()`
    pub fn enter_room(&mut self, room_name: &str) -> SessionResult<SessionCoordinator> {
        let media = match (&self.phase, &self.media) {
            (SessionPhase::AwaitingRoomEntry, Some(media)) => media.clone(),
            _ => return Err(SessionError::WrongPhase("enter_room")),
        };

        let mut coordinator = SessionCoordinator::new(
            self.signaling.clone(),
            self.factory.clone(),
            self.view.clone(),
            media,
            self.config.relay_servers.clone(),
        );
        coordinator.join_room(room_name)?;
        self.phase = SessionPhase::Joined;
        Ok(coordinator)
    }
}

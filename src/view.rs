use crate::peer::types::RemoteStream;
use tokio::sync::mpsc;

/// Экран клиента: загрузка, ошибка, ввод комнаты, видео
pub trait ViewPort: Send + Sync {
    fn show_loading(&self, text: &str, status: Option<&str>);
    fn show_error(&self, text: &str, status: Option<&str>);
    fn show_room_input(&self);
    fn show_video(&self, stream: RemoteStream);
}

#[derive(Debug, Clone)]
pub enum ViewEvent {
    Loading { text: String, status: Option<String> },
    Error { text: String, status: Option<String> },
    RoomInput,
    Video(RemoteStream),
}

impl ViewEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ViewEvent::Loading { .. } => "ssc-loading",
            ViewEvent::Error { .. } => "ssc-error",
            ViewEvent::RoomInput => "ssc-room-input",
            ViewEvent::Video(_) => "ssc-connected",
        }
    }
}

/// Отправляет состояния экрана в канал; UI (или тест) читает их сам
#[derive(Debug, Clone)]
pub struct ChannelViewPort {
    tx: mpsc::UnboundedSender<ViewEvent>,
}

impl ChannelViewPort {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ViewEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit_state(&self, event: ViewEvent) {
        tracing::debug!(event = event.name(), "view state");
        if self.tx.send(event).is_err() {
            tracing::debug!("view receiver dropped");
        }
    }
}

impl ViewPort for ChannelViewPort {
    fn show_loading(&self, text: &str, status: Option<&str>) {
        self.emit_state(ViewEvent::Loading {
            text: text.to_owned(),
            status: status.map(str::to_owned),
        });
    }

    fn show_error(&self, text: &str, status: Option<&str>) {
        self.emit_state(ViewEvent::Error {
            text: text.to_owned(),
            status: status.map(str::to_owned),
        });
    }

    fn show_room_input(&self) {
        self.emit_state(ViewEvent::RoomInput);
    }

    fn show_video(&self, stream: RemoteStream) {
        self.emit_state(ViewEvent::Video(stream));
    }
}

use crate::peer::ice::IceQueue;
use crate::peer::types::SessionDescription;

/// Кто начинает обмен offer/answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Unknown,
    Caller,
    Callee,
}

impl From<bool> for Role {
    fn from(calling: bool) -> Self {
        if calling {
            Role::Caller
        } else {
            Role::Callee
        }
    }
}

/// Фаза клиента, от запуска до видео
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingMedia,
    AwaitingRoomEntry,
    /// Комната выбрана, ждём роль и адрес
    Joined,
    Resetting,
    Negotiating,
    Connected,
    Failed,
}

/// Состояние одной сессии в комнате. Соединение здесь не хранится:
/// им владеет координатор, тут только данные сигналинга.
#[derive(Debug)]
pub struct Session {
    pub session_id: String,
    pub room_name: String,
    pub role: Role,
    pub network_identity: Option<String>,
    pub remote_ice: IceQueue,
    pub remote_description: Option<SessionDescription>,
    pub local_description: Option<SessionDescription>,
    pub phase: SessionPhase,
}

impl Session {
    pub fn new(session_id: impl Into<String>, room_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            room_name: room_name.into(),
            role: Role::Unknown,
            network_identity: None,
            remote_ice: IceQueue::default(),
            remote_description: None,
            local_description: None,
            phase: SessionPhase::Joined,
        }
    }

    /// Роль и адрес известны - можно строить соединение
    pub fn ready_to_connect(&self) -> bool {
        self.role != Role::Unknown && self.network_identity.is_some()
    }
}

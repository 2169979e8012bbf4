//! Типы ошибок для сессии звонка

use thiserror::Error;

/// Ошибки сессии и жизненного цикла соединения
#[derive(Debug, Error)]
pub enum SessionError {
    /// Камера/микрофон недоступны - сессия дальше не продолжается
    #[error("media capture failed: {0}")]
    MediaCapture(String),

    /// Ошибка создания offer/answer
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// Ошибка peer connection (создание, применение кандидатов, описаний)
    #[error("peer connection error: {0}")]
    Connection(String),

    /// Невалидный payload из сигналинга
    #[error("cannot decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid relay server {url:?}: {reason}")]
    InvalidRelay { url: String, reason: String },

    #[error("room {0:?} is already joined")]
    AlreadyJoined(String),

    #[error("invalid room name {0:?}")]
    InvalidRoomName(String),

    /// Метод вызван в неподходящей фазе клиента
    #[error("{0} not allowed in current phase")]
    WrongPhase(&'static str),
}

impl SessionError {
    pub fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            what,
            reason: err.to_string(),
        }
    }
}

impl From<webrtc::Error> for SessionError {
    fn from(err: webrtc::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

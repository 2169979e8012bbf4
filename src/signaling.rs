//! Контракт сигналинга: подписки на состояние комнаты и запросы к серверу.
//!
//! Транспорт переподключаемый: после восстановления он повторно присылает
//! текущий снимок каждой подписки (`Delivery::Full`), даже если ничего не
//! изменилось. Порядок доставок сохраняется только внутри одной подписки.

pub mod memory;

use crate::peer::types::{IceCandidate, SessionDescription};
use serde_json::{json, Value};
use std::fmt;
use tokio::sync::mpsc;

/// Доставка по подписке
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T = Value> {
    /// Текущий снимок; повторяется после переподключения
    Full(T),
    /// Одно новое событие, доставляется не более одного раза
    Incremental(T),
}

impl<T> Delivery<T> {
    pub fn into_inner(self) -> T {
        match self {
            Delivery::Full(v) | Delivery::Incremental(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// bool: true = мы звоним
    Role,
    /// строка: адрес клиента, как его видит сервер
    Identity,
    Candidates,
    RemoteDescription,
}

impl Topic {
    fn segment(self) -> &'static str {
        match self {
            Topic::Role => "amICalling",
            Topic::Identity => "myIp",
            Topic::Candidates => "otherUserIce",
            Topic::RemoteDescription => "otherUserSdp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub topic: Topic,
    pub room: String,
}

impl Subscription {
    pub fn new(topic: Topic, room: impl Into<String>) -> Self {
        Self {
            topic,
            room: room.into(),
        }
    }

    pub fn path(&self) -> [&str; 3] {
        ["room", self.topic.segment(), &self.room]
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path().join("/"))
    }
}

/// Запросы к серверу, без подтверждения
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// upsert описания этого клиента
    PublishLocalDescription {
        room: String,
        description: SessionDescription,
    },
    /// добавить кандидата в список этого клиента
    PublishCandidate {
        room: String,
        candidate: IceCandidate,
    },
}

impl Request {
    pub fn method(&self) -> [&'static str; 2] {
        match self {
            Request::PublishLocalDescription { .. } => ["room", "setSdp"],
            Request::PublishCandidate { .. } => ["room", "addIce"],
        }
    }

    pub fn args(&self) -> Vec<Value> {
        match self {
            Request::PublishLocalDescription { room, description } => {
                vec![json!(room), json!(description)]
            }
            Request::PublishCandidate { room, candidate } => vec![json!(room), json!(candidate)],
        }
    }
}

/// Клиент сигналинга. Провод и переподключение - забота реализации.
pub trait SignalingClient: Send + Sync {
    /// Идентификатор сессии, которым клиент помечает свои сообщения
    fn session_id(&self) -> &str;

    fn subscribe(&self, subscription: Subscription) -> mpsc::UnboundedReceiver<Delivery>;

    /// fire-and-forget
    fn request(&self, request: Request);
}

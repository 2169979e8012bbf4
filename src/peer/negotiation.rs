use crate::peer::connection::{ConnectionEvents, MediaConnection};
use crate::peer::types::SdpType;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Запускает создание offer/answer в отдельной задаче.
///
/// Результат приходит обратно как `PeerEvent::Negotiated` с поколением
/// соединения, на котором он создавался. Установка local description и
/// публикация делаются уже в координаторе, после проверки поколения:
/// пока задача ждёт, соединение могли пересоздать.
pub fn spawn_negotiation(
    conn: Arc<dyn MediaConnection>,
    kind: SdpType,
    events: ConnectionEvents,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(generation = events.generation(), %kind, "creating local description");
        let result = match kind {
            SdpType::Offer => conn.create_offer().await,
            SdpType::Answer => conn.create_answer().await,
        };
        events.negotiated(kind, result.map_err(|e| e.to_string()));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SessionError, SessionResult};
    use crate::peer::connection::PeerEvent;
    use crate::peer::types::{IceCandidate, SessionDescription};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct FailingAnswer;

    #[async_trait]
    impl MediaConnection for FailingAnswer {
        async fn add_ice_candidate(&self, _: IceCandidate) -> SessionResult<()> {
            Ok(())
        }
        async fn set_remote_description(&self, _: SessionDescription) -> SessionResult<()> {
            Ok(())
        }
        async fn set_local_description(&self, _: SessionDescription) -> SessionResult<()> {
            Ok(())
        }
        async fn create_offer(&self) -> SessionResult<SessionDescription> {
            Ok(SessionDescription::offer("v=0 offer"))
        }
        async fn create_answer(&self) -> SessionResult<SessionDescription> {
            Err(SessionError::Negotiation("no remote offer".into()))
        }
        async fn close(&self) -> SessionResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn offer_result_carries_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_negotiation(Arc::new(FailingAnswer), SdpType::Offer, ConnectionEvents::new(3, tx))
            .await
            .unwrap();

        let (generation, event) = rx.recv().await.unwrap();
        assert_eq!(generation, 3);
        match event {
            PeerEvent::Negotiated { kind, result } => {
                assert_eq!(kind, SdpType::Offer);
                assert_eq!(result.unwrap().sdp, "v=0 offer");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn answer_failure_is_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_negotiation(Arc::new(FailingAnswer), SdpType::Answer, ConnectionEvents::new(1, tx))
            .await
            .unwrap();

        let (_, event) = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            PeerEvent::Negotiated { kind: SdpType::Answer, result: Err(msg) } if msg.contains("no remote offer")
        ));
    }
}

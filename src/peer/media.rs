use crate::error::SessionResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// Локальный поток (камера + микрофон), который добавляется в каждое новое соединение
#[derive(Clone, Default)]
pub struct LocalMedia {
    pub stream_id: String,
    pub tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>,
}

impl fmt::Debug for LocalMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalMedia")
            .field("stream_id", &self.stream_id)
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

/// Источник захвата медиа (камера, микрофон)
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self) -> SessionResult<LocalMedia>;
}

/// Источник с sample-треками: приложение само пишет в них кадры
pub struct SampleTrackSource {
    stream_id: String,
    audio: Arc<TrackLocalStaticSample>,
    video: Arc<TrackLocalStaticSample>,
}

impl SampleTrackSource {
    pub fn new(stream_id: impl Into<String>) -> Self {
        let stream_id = stream_id.into();
        let audio = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            "audio".to_owned(),
            stream_id.clone(),
        ));
        let video = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                ..Default::default()
            },
            "video".to_owned(),
            stream_id.clone(),
        ));
        Self {
            stream_id,
            audio,
            video,
        }
    }

    pub fn audio(&self) -> Arc<TrackLocalStaticSample> {
        self.audio.clone()
    }

    pub fn video(&self) -> Arc<TrackLocalStaticSample> {
        self.video.clone()
    }
}

#[async_trait]
impl MediaSource for SampleTrackSource {
    async fn acquire(&self) -> SessionResult<LocalMedia> {
        Ok(LocalMedia {
            stream_id: self.stream_id.clone(),
            tracks: vec![
                self.audio.clone() as Arc<dyn TrackLocal + Send + Sync>,
                self.video.clone() as Arc<dyn TrackLocal + Send + Sync>,
            ],
        })
    }
}

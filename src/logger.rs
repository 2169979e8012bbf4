use crate::config::{LogConfig, LOG_ENV};
use crate::peer::types::{IceCandidate, SessionDescription};
use tracing_subscriber::{fmt, EnvFilter};

/// Инициализация логирования через tracing-subscriber.
/// `SSC_LOG` переопределяет уровень из конфигурации.
pub fn init_logging(config: &LogConfig) {
    if !config.enabled {
        return;
    }

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // повторная инициализация (например, из тестов) просто игнорируется
    let _ = match config.format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        _ => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
}

/// Печать ICE-candidate (Trickle-ICE)
pub fn dump_candidate(label: &str, cand: &IceCandidate) {
    tracing::debug!(
        label,
        candidate = %cand.candidate,
        sdp_mid = ?cand.sdp_mid,
        sdp_mline_index = ?cand.sdp_mline_index,
        "trickle candidate"
    );
}

pub fn dump_description(label: &str, desc: &SessionDescription) {
    tracing::debug!(label, kind = %desc.kind, sdp_len = desc.sdp.len(), "session description");
}

/// Сводка по типам кандидатов
pub fn analyze_candidates(candidates: &[IceCandidate]) -> (usize, usize, usize) {
    let mut host_count = 0;
    let mut srflx_count = 0;
    let mut relay_count = 0;

    for candidate in candidates {
        if candidate.candidate.contains("typ host") {
            host_count += 1;
        } else if candidate.candidate.contains("typ srflx") {
            srflx_count += 1;
        } else if candidate.candidate.contains("typ relay") {
            relay_count += 1;
        }
    }

    tracing::debug!(host_count, srflx_count, relay_count, "candidate analysis");
    if !candidates.is_empty() && relay_count == 0 {
        tracing::warn!("no TURN relay candidates from peer, connection through NAT may fail");
    }
    (host_count, srflx_count, relay_count)
}

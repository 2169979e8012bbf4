use crate::peer::types::IceCandidate;
use std::collections::HashSet;

/// Удалённые ICE кандидаты в порядке прихода.
///
/// Список не очищается при пересоздании соединения: после rebuild все
/// кандидаты проигрываются заново на новом соединении. `applied` помнит,
/// что уже отдано текущему соединению, чтобы повторный снимок после
/// переподключения сигналинга не применял кандидат дважды.
#[derive(Debug, Default)]
pub struct IceQueue {
    entries: Vec<IceCandidate>,
    applied: HashSet<IceCandidate>,
}

impl IceQueue {
    /// Полный снимок (`Full`) заменяет очередь
    pub fn replace(&mut self, candidates: Vec<IceCandidate>) {
        self.entries = candidates;
    }

    /// Инкрементальная доставка - в конец очереди
    pub fn push(&mut self, candidate: IceCandidate) {
        self.entries.push(candidate);
    }

    /// Новое соединение - ничего ещё не применено
    pub fn reset_applied(&mut self) {
        self.applied.clear();
    }

    /// Кандидаты, ещё не применённые к текущему соединению, в порядке прихода.
    /// Возвращённые помечаются применёнными.
    pub fn take_pending(&mut self) -> Vec<IceCandidate> {
        let mut pending = Vec::new();
        for candidate in &self.entries {
            if self.applied.insert(candidate.clone()) {
                pending.push(candidate.clone());
            }
        }
        pending
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(n: u32) -> IceCandidate {
        IceCandidate::new(format!("candidate:{n} 1 udp 1 10.0.0.{n} 5000 typ host"))
    }

    #[test]
    fn pending_keeps_arrival_order() {
        let mut q = IceQueue::default();
        q.push(cand(3));
        q.push(cand(1));
        q.push(cand(2));
        assert_eq!(q.take_pending(), vec![cand(3), cand(1), cand(2)]);
        assert!(q.take_pending().is_empty());
    }

    #[test]
    fn repeated_snapshot_not_reapplied() {
        let mut q = IceQueue::default();
        q.replace(vec![cand(1), cand(2)]);
        assert_eq!(q.take_pending().len(), 2);

        q.replace(vec![cand(1), cand(2), cand(3)]);
        assert_eq!(q.take_pending(), vec![cand(3)]);
    }

    #[test]
    fn duplicate_in_snapshot_applied_once() {
        let mut q = IceQueue::default();
        q.replace(vec![cand(1), cand(1)]);
        assert_eq!(q.take_pending(), vec![cand(1)]);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn reset_replays_everything() {
        let mut q = IceQueue::default();
        q.push(cand(1));
        q.push(cand(2));
        q.take_pending();

        q.reset_applied();
        assert_eq!(q.take_pending(), vec![cand(1), cand(2)]);
        assert_eq!(q.len(), 2);
    }
}

use serde::{Deserialize, Serialize};

use crate::timeline::Millis;

/// Category of a transient user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoticeKind {
    MaxEntitiesExceeded,
    InvalidTransition,
    PersistenceFailure,
    AssetResolutionFailure,
    AudioDeviceFailure,
    Saved,
    General,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub posted_at: Millis,
    pub expires_at: Millis,
}

/// Self-clearing notices. Nothing posted here is ever permanent.
#[derive(Debug, Clone)]
pub struct NoticeBoard {
    ttl: Millis,
    notices: Vec<Notice>,
}

impl NoticeBoard {
    pub fn new(ttl: Millis) -> Self {
        Self {
            ttl,
            notices: Vec::new(),
        }
    }

    /// Posts a notice. A notice of the same kind that is still showing is
    /// replaced so rapid repeats extend rather than stack.
    pub fn post(&mut self, now: Millis, kind: NoticeKind, message: impl Into<String>) {
        self.notices.retain(|notice| notice.kind != kind);
        self.notices.push(Notice {
            kind,
            message: message.into(),
            posted_at: now,
            expires_at: now.saturating_add(self.ttl),
        });
    }

    /// Drops expired notices.
    pub fn tick(&mut self, now: Millis) {
        self.notices.retain(|notice| notice.expires_at > now);
    }

    pub fn active(&self, now: Millis) -> impl Iterator<Item = &Notice> {
        self.notices.iter().filter(move |notice| notice.expires_at > now)
    }

    pub fn is_showing(&self, now: Millis, kind: NoticeKind) -> bool {
        self.active(now).any(|notice| notice.kind == kind)
    }

    pub fn clear(&mut self) {
        self.notices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_expire_after_ttl() {
        let mut board = NoticeBoard::new(1_000);
        board.post(0, NoticeKind::MaxEntitiesExceeded, "three deities max");

        assert!(board.is_showing(999, NoticeKind::MaxEntitiesExceeded));
        assert!(!board.is_showing(1_000, NoticeKind::MaxEntitiesExceeded));

        board.tick(1_000);
        assert_eq!(board.active(0).count(), 0);
    }

    #[test]
    fn reposting_replaces_same_kind() {
        let mut board = NoticeBoard::new(1_000);
        board.post(0, NoticeKind::Saved, "saved");
        board.post(800, NoticeKind::Saved, "saved again");
        board.post(800, NoticeKind::General, "hello");

        assert_eq!(board.active(800).count(), 2);
        assert!(board.is_showing(1_500, NoticeKind::Saved));
    }
}

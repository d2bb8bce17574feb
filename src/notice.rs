use std::collections::VecDeque;
use std::time::{Duration, Instant};

const MAX_VISIBLE: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn ttl(self) -> Duration {
        match self {
            NoticeLevel::Success => Duration::from_secs(7),
            _ => Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }
}

#[derive(Default)]
pub struct Notices {
    items: VecDeque<(Notice, Instant)>,
}

impl Notices {
    pub fn push(&mut self, notice: Notice) {
        self.push_at(notice, Instant::now());
    }

    pub fn push_at(&mut self, notice: Notice, now: Instant) {
        match notice.level {
            NoticeLevel::Error | NoticeLevel::Warning => log::warn!("{}", notice.message),
            _ => log::info!("{}", notice.message),
        }
        let expires = now + notice.level.ttl();
        self.items.push_back((notice, expires));
        while self.items.len() > MAX_VISIBLE {
            self.items.pop_front();
        }
    }

    /// Drops expired notices; returns true while any remain.
    pub fn prune(&mut self, now: Instant) -> bool {
        self.items.retain(|(_, expires)| *expires > now);
        !self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.items.iter().map(|(notice, _)| notice)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Lifecycle phases of a crawl run
///
/// ```text
/// Idle ──► Running ──► Draining   (frontier empty)
///             │  ▲
///             ▼  │
///          Suspended              (interrupted or step limit reached)
/// ```
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// State loaded, no step taken yet
    Idle,

    /// Steps are being taken
    Running,

    /// Frontier is empty; the crawl is finished
    Draining,

    /// Stopped early with all completed steps persisted
    Suspended,
}

impl CrawlPhase {
    /// Returns true if `next` is a legal successor of this phase
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Suspended, Self::Running)
                | (Self::Running, Self::Draining)
                | (Self::Running, Self::Suspended)
        )
    }

    /// Returns true once no further work remains
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Draining)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Suspended => "suspended",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use std::time::Duration;

use log::trace;
use tokio::time::{sleep_until, Instant};

/// What the state machine does when its timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerAction {
    StartDone,
    ReadyDone,
    AnswerTimeout,
    /// Short pause after an answer before the result is revealed
    Settle,
    LeaderboardDone,
    CloseDone,
}

/// Single-slot timer. Arming replaces whatever was pending, so at most one
/// phase timer is ever outstanding.
#[derive(Debug, Default)]
pub struct PhaseScheduler {
    pending: Option<(Instant, TimerAction)>,
    fired: usize,
}

impl PhaseScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, delay: Duration, action: TimerAction) {
        if let Some((_, replaced)) = self.pending {
            trace!("Timer {:?} replaced by {:?}", replaced, action);
        }
        self.pending = Some((Instant::now() + delay, action));
    }

    pub fn cancel(&mut self) -> Option<TimerAction> {
        self.pending.take().map(|(_, action)| action)
    }

    pub fn pending(&self) -> Option<TimerAction> {
        self.pending.map(|(_, action)| action)
    }

    /// Number of timers that have fired so far
    pub fn fired(&self) -> usize {
        self.fired
    }

    /// Resolve when the pending timer fires; never resolves while idle.
    /// Dropping the future before it resolves leaves the timer armed.
    pub async fn next_fire(&mut self) -> TimerAction {
        match self.pending {
            Some((deadline, action)) => {
                sleep_until(deadline).await;
                self.pending = None;
                self.fired += 1;
                action
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_arm_replaces_pending_timer() {
        let mut scheduler = PhaseScheduler::new();
        scheduler.arm(Duration::from_secs(5), TimerAction::StartDone);
        scheduler.arm(Duration::from_millis(300), TimerAction::Settle);
        assert_eq!(scheduler.pending(), Some(TimerAction::Settle));

        let start = Instant::now();
        assert_eq!(scheduler.next_fire().await, TimerAction::Settle);
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(scheduler.pending(), None);
        assert_eq!(scheduler.fired(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_scheduler_never_fires() {
        let mut scheduler = PhaseScheduler::new();
        let result = tokio::time::timeout(Duration::from_secs(60), scheduler.next_fire()).await;
        assert!(result.is_err());
        assert_eq!(scheduler.fired(), 0);
    }
}

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::trace;

/// Spaces out completed dispatches of one fetcher.
///
/// Every caller sleeps the configured delay after its dispatch completes,
/// and the sleep happens while holding the pacer's lock. Concurrent fetches
/// on the same instance therefore return to their callers at least
/// `min_delay` apart.
pub struct Pacer {
    min_delay: Duration,
    jitter: Duration,
    state: Mutex<PacerState>,
}

#[derive(Debug, Default)]
struct PacerState {
    completed: u64,
}

impl Pacer {
    pub fn new(delay_ms: u64, jitter_ms: u64) -> Self {
        Self {
            min_delay: Duration::from_millis(delay_ms),
            jitter: Duration::from_millis(jitter_ms),
            state: Mutex::new(PacerState::default()),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Wait out this caller's turn after a completed dispatch.
    pub async fn wait_turn(&self) {
        let mut state = self.state.lock().await;
        let delay = self.next_delay();
        sleep(delay).await;

        state.completed += 1;
        trace!("pacer released dispatch #{} after {:?}", state.completed, delay);
    }

    pub async fn completed(&self) -> u64 {
        self.state.lock().await.completed
    }

    /// Configured delay plus random jitter.
    fn next_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.min_delay;
        }
        self.min_delay + Duration::from_millis(rand::random_range(0..=jitter_ms))
    }
}

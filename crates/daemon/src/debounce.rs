//! Retile debouncing.
//!
//! Shell notifications arrive in bursts (a window being created fires
//! created, activated and several redraws). Each qualifying notification
//! restarts a timer; the retile runs once the timer survives the whole
//! settle delay.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Delays an event until notifications stop arriving.
pub struct RetileDebouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl RetileDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Change the delay. A timer already running keeps its old deadline.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// (Re)start the timer. When it fires, `event` is sent on `tx`.
    ///
    /// Any previously scheduled event is dropped.
    pub fn schedule<E: Send + 'static>(&mut self, tx: &mpsc::Sender<E>, event: E) {
        self.cancel();

        let tx = tx.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event).await;
        }));
    }

    /// Drop the scheduled event, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Whether a scheduled event has not been delivered yet.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RetileDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::Receiver<u32>) -> Vec<u32> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_burst_coalesces_into_one_event() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut debouncer = RetileDebouncer::new(Duration::from_millis(100));

        for i in 0..5 {
            debouncer.schedule(&tx, i);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(drain(&mut rx), vec![4]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test]
    async fn test_nothing_fires_before_delay() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut debouncer = RetileDebouncer::new(Duration::from_millis(500));

        debouncer.schedule(&tx, 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(drain(&mut rx).is_empty());
        assert!(debouncer.is_pending());
    }

    #[tokio::test]
    async fn test_separate_bursts_fire_separately() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut debouncer = RetileDebouncer::new(Duration::from_millis(20));

        debouncer.schedule(&tx, 1);
        tokio::time::sleep(Duration::from_millis(150)).await;
        debouncer.schedule(&tx, 2);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(drain(&mut rx), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_cancel_drops_pending_event() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut debouncer = RetileDebouncer::new(Duration::from_millis(20));

        debouncer.schedule(&tx, 1);
        debouncer.cancel();
        assert!(!debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_set_delay_applies_to_next_schedule() {
        let mut debouncer = RetileDebouncer::new(Duration::from_millis(100));
        debouncer.set_delay(Duration::from_millis(250));
        assert_eq!(debouncer.delay(), Duration::from_millis(250));
    }
}

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Environment signal fed in by the host: the wizard lost input focus, or
/// the app was hidden/backgrounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvEvent {
    FocusLost,
    Hidden,
}

/// Fan-out hub for environment signals. The host owns one of these and
/// emits platform focus/visibility events into it; each running session
/// subscribes for the lifetime of that session.
#[derive(Clone)]
pub struct EnvSignals {
    tx: broadcast::Sender<EnvEvent>,
}

impl EnvSignals {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn emit(&self, event: EnvEvent) {
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<EnvEvent> {
        self.tx.subscribe()
    }
}

impl Default for EnvSignals {
    fn default() -> Self {
        Self::new()
    }
}

/// Session-owned distraction counters, bumped by the subscription task.
#[derive(Default)]
pub(crate) struct DistractionCounters {
    pub focus_lost: AtomicU32,
    pub hidden: AtomicU32,
}

impl DistractionCounters {
    pub fn focus_lost_count(&self) -> u32 {
        self.focus_lost.load(Ordering::SeqCst)
    }

    pub fn hidden_count(&self) -> u32 {
        self.hidden.load(Ordering::SeqCst)
    }
}

/// Owned handle for one session's signal subscription. Installed on
/// entering `Running`, released unconditionally on leaving the session.
pub(crate) struct SignalSubscription {
    handle: Option<JoinHandle<()>>,
    token: CancellationToken,
}

impl SignalSubscription {
    pub fn install(signals: &EnvSignals, counters: Arc<DistractionCounters>) -> Self {
        let mut rx = signals.subscribe();
        let token = CancellationToken::new();
        let loop_token = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Ok(EnvEvent::FocusLost) => {
                            counters.focus_lost.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok(EnvEvent::Hidden) => {
                            counters.hidden.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = loop_token.cancelled() => break,
                }
            }
        });

        Self {
            handle: Some(handle),
            token,
        }
    }

    pub async fn release(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn subscription_counts_events_until_released() {
        let signals = EnvSignals::new();
        let counters = Arc::new(DistractionCounters::default());
        let sub = SignalSubscription::install(&signals, Arc::clone(&counters));

        signals.emit(EnvEvent::FocusLost);
        signals.emit(EnvEvent::Hidden);
        signals.emit(EnvEvent::Hidden);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(counters.focus_lost_count(), 1);
        assert_eq!(counters.hidden_count(), 2);

        sub.release().await;
        signals.emit(EnvEvent::FocusLost);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(counters.focus_lost_count(), 1);
    }
}

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::session::LanSession;
use crate::prelude::*;

/// Periodically marks a session as expired so the owner runs a fresh key exchange.
///
/// The timer stops when [`RekeyTimer::stop`] is called or the timer is dropped.
pub struct RekeyTimer {
    stop: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl RekeyTimer {
    /// Must be called from within a tokio runtime.
    pub fn spawn(session: Arc<LanSession>, period: Duration) -> Self {
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        session.mark_expired();
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            trace_packet!("rekey timer stopped");
        });
        RekeyTimer {
            stop,
            handle: Some(handle),
        }
    }

    /// Stops the timer and waits for its task to finish.
    pub async fn stop(mut self) {
        let _ = self.stop.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RekeyTimer {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

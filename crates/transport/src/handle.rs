//! Async front end: the controller plus a position poller.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::controller::{PollOutcome, TransportController};
use crate::engine::{EngineFactory, StartTimePrompt};
use crate::{TransportError, TransportState};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shortest poll period; tokio intervals cannot tick every zero seconds.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct TransportHandle<F: EngineFactory + 'static> {
    controller: Arc<Mutex<TransportController<F>>>,
    poll_interval: Duration,
    poller: Option<(CancellationToken, JoinHandle<()>)>,
    updates: watch::Sender<PollOutcome>,
}

impl<F: EngineFactory + 'static> TransportHandle<F> {
    pub fn new(factory: F, poll_interval: Duration) -> Self {
        if poll_interval < MIN_POLL_INTERVAL {
            warn!(?poll_interval, "poll interval too short, using {MIN_POLL_INTERVAL:?}");
        }
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let (updates, _) = watch::channel(PollOutcome::Idle);
        Self {
            controller: Arc::new(Mutex::new(TransportController::new(factory))),
            poll_interval,
            poller: None,
            updates,
        }
    }

    /// Poll results as they happen.
    pub fn subscribe(&self) -> watch::Receiver<PollOutcome> {
        self.updates.subscribe()
    }

    pub async fn state(&self) -> TransportState {
        self.controller.lock().await.state().clone()
    }

    pub async fn play(&mut self, source: &Path) -> Result<(), TransportError> {
        self.cancel_polling();
        self.controller.lock().await.play(source)?;
        self.start_polling();
        Ok(())
    }

    pub async fn play_from(
        &mut self,
        source: &Path,
        prompt: &mut dyn StartTimePrompt,
    ) -> Result<(), TransportError> {
        self.cancel_polling();
        self.controller.lock().await.play_from(source, prompt)?;
        self.start_polling();
        Ok(())
    }

    pub async fn pause(&mut self) -> Result<(), TransportError> {
        self.controller.lock().await.pause()?;
        self.cancel_polling();
        self.updates.send_replace(PollOutcome::Paused);
        Ok(())
    }

    pub async fn resume(&mut self, source: &Path) -> Result<(), TransportError> {
        self.cancel_polling();
        self.controller.lock().await.resume(source)?;
        self.start_polling();
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), TransportError> {
        self.cancel_polling();
        self.controller.lock().await.stop()?;
        self.updates.send_replace(PollOutcome::Idle);
        Ok(())
    }

    pub async fn reset(&mut self) {
        self.cancel_polling();
        self.controller.lock().await.reset();
        self.updates.send_replace(PollOutcome::Idle);
    }

    fn start_polling(&mut self) {
        self.cancel_polling();

        let token = CancellationToken::new();
        let cancel = token.clone();
        let controller = Arc::clone(&self.controller);
        let updates = self.updates.clone();
        let period = self.poll_interval;

        let task = tokio::spawn(async move {
            // first look one period after start, never at position zero
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let outcome = controller.lock().await.poll();
                        let keep_going = matches!(outcome, PollOutcome::Progress(_));
                        updates.send_replace(outcome);
                        if !keep_going {
                            break;
                        }
                    }
                }
            }
            debug!("position poller finished");
        });

        self.poller = Some((token, task));
    }

    fn cancel_polling(&mut self) {
        if let Some((token, _task)) = self.poller.take() {
            token.cancel();
        }
    }
}

impl<F: EngineFactory + 'static> Drop for TransportHandle<F> {
    fn drop(&mut self) {
        self.cancel_polling();
    }
}

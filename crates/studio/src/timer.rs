//! Tokio driver for a [`FakeProgress`] model.
//!
//! A [`ProgressTimer`] owns one progress model and, while a run is
//! active, a ticker task that recomputes the percentage every
//! `config.tick`.  The ticker stops on its own once the model pins at
//! 99, and is cancelled by [`ProgressTimer::finish`],
//! [`ProgressTimer::reset`], a restart, or the parent token.
//!
//! Every change is published on a [`watch`] channel.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use brewpost_core::progress::{FakeProgress, ProgressConfig, ProgressState, ProgressView, TickOutcome};
use brewpost_core::workflow::ProgressSlot;

/// Bookkeeping for the ticker task of the current run.
struct TickerRun {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct ProgressTimer {
    slot: ProgressSlot,
    model: Arc<Mutex<FakeProgress>>,
    state_tx: watch::Sender<ProgressState>,
    run: Mutex<Option<TickerRun>>,
    /// Cancelled on controller shutdown.
    parent: CancellationToken,
}

impl ProgressTimer {
    pub fn new(slot: ProgressSlot, config: ProgressConfig, parent: &CancellationToken) -> Self {
        let (state_tx, _) = watch::channel(ProgressState::default());
        Self {
            slot,
            model: Arc::new(Mutex::new(FakeProgress::new(config))),
            state_tx,
            run: Mutex::new(None),
            parent: parent.clone(),
        }
    }

    pub fn slot(&self) -> ProgressSlot {
        self.slot
    }

    /// Latest published state.
    pub fn state(&self) -> ProgressState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.state_tx.subscribe()
    }

    /// Render the latest state with this slot's skin.
    pub fn view(&self, label: Option<&str>) -> ProgressView {
        self.slot.skin().render(self.state(), label)
    }

    /// Begin a fresh run at 0% and start ticking.
    pub async fn start(&self) {
        let mut run = self.run.lock().await;
        Self::stop_ticker(run.take());

        let tick = {
            let mut model = self.model.lock().await;
            model.start(Instant::now().into_std());
            self.state_tx.send_replace(model.state());
            model.config().tick
        };

        let cancel = self.parent.child_token();
        let handle = tokio::spawn(run_ticker(
            self.slot,
            Arc::clone(&self.model),
            self.state_tx.clone(),
            tick,
            cancel.clone(),
        ));
        *run = Some(TickerRun { cancel, handle });

        tracing::debug!(slot = ?self.slot, "Progress timer started");
    }

    /// Jump to 100% and stop ticking.
    pub async fn finish(&self) {
        let mut run = self.run.lock().await;
        Self::stop_ticker(run.take());

        let mut model = self.model.lock().await;
        model.finish();
        self.state_tx.send_replace(model.state());
        tracing::debug!(slot = ?self.slot, "Progress timer finished");
    }

    /// Back to idle at 0%.
    pub async fn reset(&self) {
        let mut run = self.run.lock().await;
        Self::stop_ticker(run.take());

        let mut model = self.model.lock().await;
        model.reset();
        self.state_tx.send_replace(model.state());
    }

    /// Stop ticking and wait for the ticker task to exit.
    pub async fn shutdown(&self) {
        let run = self.run.lock().await.take();
        if let Some(run) = run {
            run.cancel.cancel();
            if let Err(e) = run.handle.await {
                tracing::warn!(slot = ?self.slot, error = %e, "Progress ticker task failed");
            }
        }
    }

    fn stop_ticker(run: Option<TickerRun>) {
        if let Some(run) = run {
            run.cancel.cancel();
        }
    }
}

async fn run_ticker(
    slot: ProgressSlot,
    model: Arc<Mutex<FakeProgress>>,
    state_tx: watch::Sender<ProgressState>,
    tick: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let mut model = model.lock().await;
        // A finish/reset may have raced with this tick.
        if cancel.is_cancelled() {
            return;
        }
        let outcome = model.tick(Instant::now().into_std());
        state_tx.send_replace(model.state());

        match outcome {
            TickOutcome::Continue => {}
            TickOutcome::Pinned => {
                tracing::debug!(slot = ?slot, percent = model.state().percent, "Progress pinned");
                return;
            }
            TickOutcome::Inactive => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use brewpost_core::progress::{ProgressPhase, COMPLETE, RUNNING_CEILING};

    use super::*;

    fn timer(expected_ms: u64) -> ProgressTimer {
        let config = ProgressConfig::with_expected(Duration::from_millis(expected_ms));
        ProgressTimer::new(ProgressSlot::Copy, config, &CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn climbs_through_phases_and_pins() {
        let t = timer(1000);
        t.start().await;
        assert_eq!(t.state().phase, ProgressPhase::Running);
        assert_eq!(t.state().percent, 0.0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        let at_phase_one = t.state().percent;
        assert!(at_phase_one > 60.0 && at_phase_one <= 70.0, "got {at_phase_one}");

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(t.state().percent, RUNNING_CEILING);
        assert_eq!(t.state().phase, ProgressPhase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn percent_never_decreases() {
        let t = timer(500);
        let mut rx = t.subscribe();
        t.start().await;

        let mut last = 0.0;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(40)).await;
            let now = rx.borrow_and_update().percent;
            assert!(now >= last, "{now} < {last}");
            last = now;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn finish_jumps_to_complete() {
        let t = timer(1000);
        t.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        t.finish().await;
        assert_eq!(t.state().percent, COMPLETE);
        assert_eq!(t.state().phase, ProgressPhase::Done);

        // No ticker left to move it.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(t.state().percent, COMPLETE);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_returns_to_idle() {
        let t = timer(1000);
        t.start().await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        t.reset().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(t.state(), ProgressState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_begins_at_zero() {
        let t = timer(1000);
        t.start().await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(t.state().percent > 70.0);

        t.start().await;
        assert_eq!(t.state().percent, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_stops_ticking() {
        let parent = CancellationToken::new();
        let t = ProgressTimer::new(
            ProgressSlot::Image,
            ProgressConfig::with_expected(Duration::from_millis(1000)),
            &parent,
        );
        t.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        parent.cancel();
        tokio::task::yield_now().await;
        let frozen = t.state().percent;
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(t.state().percent, frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn view_uses_slot_skin() {
        let t = timer(1000);
        t.finish().await;
        let view = t.view(None);
        assert_eq!(view.counter, "100/100");
        assert_eq!(view.label, "Done!");
    }
}

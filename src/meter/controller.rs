//! Meter lifecycle controller
//!
//! Owns the [`MeterState`] and, while running, two background tasks: the
//! clock ticker and the position reader. Both belong to an `ActiveRun`
//! that is dropped on every exit from `running`. Dropping it releases the
//! source subscription before returning, then cancels the token and aborts
//! the tasks. Callbacks that still race in carry a stale epoch and are
//! discarded by the state.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use gpx::Track;
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::state::{MeterSnapshot, MeterState, Phase, Transition, TripReceipt};
use super::tariff::Tariff;
use crate::sources::{FixStream, LiveSource, Subscription, Unsubscribe};

/// Default clock cadence
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Fire-and-forget lifecycle notification
pub type Hook = Box<dyn Fn() + Send + Sync>;

type SharedState = Arc<Mutex<MeterState>>;
type Updates = Arc<watch::Sender<MeterSnapshot>>;

/// Resources held for one running interval
struct ActiveRun {
    subscription: Option<Unsubscribe>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        if let Some(handle) = self.subscription.take() {
            handle.cancel();
        }
        self.cancel.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Live fare meter.
///
/// Lifecycle calls must happen inside a Tokio runtime, since entering
/// `running` spawns the clock and position tasks.
pub struct Meter<S>
where
    S: LiveSource,
{
    state: SharedState,
    source: S,
    updates: Updates,
    tick_interval: Duration,
    run: Option<ActiveRun>,
    on_start: Option<Hook>,
    on_pause: Option<Hook>,
    on_stop: Option<Hook>,
}

impl<S> Meter<S>
where
    S: LiveSource,
{
    pub fn new(source: S, tariff: Tariff) -> Self {
        let state = MeterState::new(tariff);
        let (updates, _) = watch::channel(state.snapshot());

        Self {
            state: Arc::new(Mutex::new(state)),
            source,
            updates: Arc::new(updates),
            tick_interval: DEFAULT_TICK_INTERVAL,
            run: None,
            on_start: None,
            on_pause: None,
            on_stop: None,
        }
    }

    /// Clock cadence, applied from the next running interval
    pub fn tick_interval(&mut self, interval: Duration) -> &mut Self {
        self.tick_interval = interval.max(Duration::from_millis(1));

        self
    }

    pub fn on_start<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_start = Some(Box::new(hook));

        self
    }

    pub fn on_pause<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_pause = Some(Box::new(hook));

        self
    }

    pub fn on_stop<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_stop = Some(Box::new(hook));

        self
    }

    /// Start a trip, or resume a paused one. No-op while running.
    pub fn start(&mut self) -> Transition {
        let now = Instant::now();

        let (transition, epoch) = {
            let mut state = self.state.lock();
            let transition = state.start(now.into_std(), OffsetDateTime::now_utc());
            if transition != Transition::Ignored {
                self.updates.send_replace(state.snapshot());
            }
            (transition, state.running_epoch())
        };

        let epoch = match (transition, epoch) {
            (Transition::Ignored, _) | (_, None) => return Transition::Ignored,
            (_, Some(epoch)) => epoch,
        };

        self.acquire(epoch, now);
        fire(&self.on_start);

        transition
    }

    pub fn resume(&mut self) -> Transition {
        self.start()
    }

    /// Freeze the accumulators and release the clock and position source
    pub fn pause(&mut self) -> Transition {
        let transition = {
            let mut state = self.state.lock();
            let transition = state.pause(Instant::now().into_std());
            if transition == Transition::Paused {
                self.updates.send_replace(state.snapshot());
            }
            transition
        };

        if transition != Transition::Paused {
            return transition;
        }

        self.release();
        fire(&self.on_pause);

        transition
    }

    /// End the trip, release everything and zero the meter.
    ///
    /// Returns the receipt of the trip, or None when the meter was idle.
    pub fn stop(&mut self) -> Option<TripReceipt> {
        let receipt = {
            let mut state = self.state.lock();
            let receipt = state.stop(Instant::now().into_std(), OffsetDateTime::now_utc());
            if receipt.is_some() {
                self.updates.send_replace(state.snapshot());
            }
            receipt
        };

        self.release();

        if receipt.is_some() {
            fire(&self.on_stop);
        }

        receipt
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase()
    }

    pub fn tariff(&self) -> Tariff {
        *self.state.lock().tariff()
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        self.state.lock().snapshot()
    }

    /// Receiver notified with a fresh snapshot on every state change
    pub fn subscribe(&self) -> watch::Receiver<MeterSnapshot> {
        self.updates.subscribe()
    }

    /// Route recorded in the current trip
    pub fn route(&self, name: &str) -> Track {
        self.state.lock().route(name)
    }

    /// True while the clock and position resources are held
    pub fn is_acquired(&self) -> bool {
        self.run.is_some()
    }

    fn acquire(&mut self, epoch: u64, origin: Instant) {
        // a leftover run would keep stale tasks alive
        self.release();

        let cancel = CancellationToken::new();
        let mut tasks = vec![tokio::spawn(drive_clock(
            Arc::clone(&self.state),
            Arc::clone(&self.updates),
            epoch,
            origin,
            self.tick_interval,
            cancel.clone(),
        ))];

        let subscription = match self.source.watch() {
            Ok(Subscription { fixes, handle }) => {
                debug!(epoch, "Position subscription acquired");
                tasks.push(tokio::spawn(drive_fixes(
                    Arc::clone(&self.state),
                    Arc::clone(&self.updates),
                    epoch,
                    fixes,
                    cancel.clone(),
                )));
                Some(handle)
            }
            Err(error) => {
                warn!(%error, "Position source unavailable, fare accrues from time only");
                None
            }
        };

        self.run = Some(ActiveRun {
            subscription,
            cancel,
            tasks,
        });
    }

    fn release(&mut self) {
        if self.run.take().is_some() {
            debug!("Clock and position subscription released");
        }
    }
}

fn fire(hook: &Option<Hook>) {
    if let Some(hook) = hook {
        hook();
    }
}

async fn drive_clock(
    state: SharedState,
    updates: Updates,
    epoch: u64,
    origin: Instant,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticks = interval_at(origin, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let at = tokio::select! {
            _ = cancel.cancelled() => break,
            at = ticks.tick() => at,
        };

        let mut guard = state.lock();
        if !guard.tick(epoch, at.into_std()) {
            break;
        }
        updates.send_replace(guard.snapshot());
    }

    debug!(epoch, "Clock task finished");
}

async fn drive_fixes(
    state: SharedState,
    updates: Updates,
    epoch: u64,
    mut fixes: FixStream,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = fixes.next() => next,
        };

        match next {
            Some(Ok(fix)) => {
                let mut guard = state.lock();
                if !guard.accept_fix(epoch, &fix) {
                    break;
                }
                updates.send_replace(guard.snapshot());
            }
            Some(Err(error)) => {
                warn!(%error, "Position fix failed, keeping last known values");
            }
            None => {
                debug!(epoch, "Position source ended");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::sleep;

    use super::Meter;
    use crate::meter::state::{Phase, Transition};
    use crate::meter::tariff::Tariff;
    use crate::sources::{FixFeed, SourceError, Unavailable};
    use crate::Fix;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[tokio::test(start_paused = true)]
    async fn pause_resume_continuity() {
        let mut meter = Meter::new(Unavailable, Tariff::default());

        meter.start();
        sleep(ms(10_500)).await;
        assert_eq!(10_000, meter.snapshot().elapsed_millis);

        meter.pause();
        assert_eq!(10_500, meter.snapshot().elapsed_millis);
        assert!(!meter.is_acquired());

        sleep(ms(60_000)).await;
        assert_eq!(10_500, meter.snapshot().elapsed_millis);

        assert_eq!(Transition::Resumed, meter.resume());
        sleep(ms(5_000)).await;
        meter.pause();
        assert_eq!(15_500, meter.snapshot().elapsed_millis);
    }

    #[tokio::test(start_paused = true)]
    async fn time_only_without_source() {
        let mut meter = Meter::new(Unavailable, Tariff::default());

        meter.start();
        sleep(ms(2_500)).await;

        let snap = meter.snapshot();
        assert_eq!(Phase::Running, snap.phase);
        assert_eq!(2_000, snap.elapsed_millis);
        assert_eq!(0.0, snap.total_distance_meters);
        // 1000 + 2/60 * 50
        assert_eq!(1002, snap.estimated_fare);
    }

    #[tokio::test(start_paused = true)]
    async fn late_fix_after_pause_is_dropped() {
        let (feed, publisher) = FixFeed::channel(16);
        let mut meter = Meter::new(feed, Tariff::default());

        meter.start();
        publisher.publish(Fix::at(35.6762, 139.6503).with_speed(10.0));
        sleep(ms(100)).await;
        assert_eq!(0.0, meter.snapshot().total_distance_meters);

        publisher.publish(Fix::at(35.6862, 139.6603).with_speed(10.0));
        sleep(ms(100)).await;
        let before = meter.snapshot();
        assert!(before.total_distance_meters > 1400.0);
        assert_eq!(36.0, before.current_speed_kmh);

        meter.pause();
        publisher.publish(Fix::at(36.0, 140.0));
        sleep(ms(5_000)).await;

        let after = meter.snapshot();
        assert_eq!(before.total_distance_meters, after.total_distance_meters);
        assert_eq!(before.last_position, after.last_position);
        assert_eq!(0, publisher.subscribers());
    }

    #[tokio::test(start_paused = true)]
    async fn resume_seeds_before_adding_distance() {
        let (feed, publisher) = FixFeed::channel(16);
        let mut meter = Meter::new(feed, Tariff::default());

        meter.start();
        publisher.publish(Fix::at(35.6762, 139.6503));
        publisher.publish(Fix::at(35.6862, 139.6603));
        sleep(ms(100)).await;
        let distance = meter.snapshot().total_distance_meters;

        meter.pause();
        meter.resume();
        publisher.publish(Fix::at(36.0, 140.0));
        sleep(ms(100)).await;
        assert_eq!(distance, meter.snapshot().total_distance_meters);

        let route = meter.route("trip");
        assert_eq!(2, route.segments.len());
    }

    #[tokio::test(start_paused = true)]
    async fn source_error_keeps_running() {
        let (feed, publisher) = FixFeed::channel(16);
        let mut meter = Meter::new(feed, Tariff::default());

        meter.start();
        publisher.publish(Fix::at(35.6762, 139.6503).with_speed(5.0));
        publisher.fail(SourceError::PermissionDenied);
        publisher.fail(SourceError::Timeout);
        sleep(ms(1_500)).await;

        let snap = meter.snapshot();
        assert_eq!(Phase::Running, snap.phase);
        assert_eq!(18.0, snap.current_speed_kmh);
        assert_eq!(1_000, snap.elapsed_millis);
        assert_eq!(1, publisher.subscribers());
    }

    #[tokio::test(start_paused = true)]
    async fn start_then_stop() {
        let mut meter = Meter::new(Unavailable, Tariff::default());

        meter.start();
        let receipt = meter.stop();
        assert_eq!(Some(1000), receipt.map(|r| r.fare));

        let snap = meter.snapshot();
        assert_eq!(Phase::Idle, snap.phase);
        assert_eq!(1000, snap.estimated_fare);
        assert_eq!(0, snap.elapsed_millis);
        assert_eq!(0.0, snap.total_distance_meters);
        assert_eq!(0.0, snap.current_speed_kmh);
        assert_eq!(None, snap.last_position);
        assert!(!meter.is_acquired());

        assert!(meter.stop().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn hooks_fire_on_effective_transitions() {
        let starts = Arc::new(AtomicUsize::new(0));
        let pauses = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));

        let mut meter = Meter::new(Unavailable, Tariff::default());
        {
            let (s, p, t) = (starts.clone(), pauses.clone(), stops.clone());
            meter
                .on_start(move || {
                    s.fetch_add(1, Ordering::SeqCst);
                })
                .on_pause(move || {
                    p.fetch_add(1, Ordering::SeqCst);
                })
                .on_stop(move || {
                    t.fetch_add(1, Ordering::SeqCst);
                });
        }

        meter.pause();
        meter.stop();
        meter.start();
        meter.start();
        meter.pause();
        meter.pause();
        meter.resume();
        meter.stop();
        meter.stop();

        assert_eq!(2, starts.load(Ordering::SeqCst));
        assert_eq!(1, pauses.load(Ordering::SeqCst));
        assert_eq!(1, stops.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_toggling_holds_resources_only_while_running() {
        let (feed, publisher) = FixFeed::channel(16);
        let mut meter = Meter::new(feed, Tariff::default());

        for _ in 0..10 {
            meter.start();
            assert!(meter.is_acquired());
            assert_eq!(1, publisher.subscribers());
            meter.pause();
            assert!(!meter.is_acquired());
            assert_eq!(0, publisher.subscribers());
        }
        meter.stop();
        assert!(!meter.is_acquired());
        assert_eq!(0, publisher.subscribers());
    }

    #[tokio::test(start_paused = true)]
    async fn subscription_released_before_pause_returns() {
        let (feed, publisher) = FixFeed::channel(16);
        let mut meter = Meter::new(feed, Tariff::default());

        meter.start();
        tokio::task::yield_now().await;
        assert_eq!(1, publisher.subscribers());

        meter.pause();
        assert_eq!(0, publisher.subscribers());
        assert_eq!(0, publisher.publish(Fix::at(36.0, 140.0)));

        meter.resume();
        tokio::task::yield_now().await;
        assert_eq!(1, publisher.subscribers());

        meter.stop();
        assert_eq!(0, publisher.subscribers());
    }

    #[tokio::test(start_paused = true)]
    async fn observers_see_updates() {
        let mut meter = Meter::new(Unavailable, Tariff::default());
        meter.tick_interval(ms(500));
        let mut rx = meter.subscribe();

        meter.start();
        sleep(ms(1_200)).await;

        assert!(rx.has_changed().unwrap_or(false));
        let seen = rx.borrow_and_update().clone();
        assert_eq!(1_000, seen.elapsed_millis);
        assert_eq!(Phase::Running, seen.phase);
    }
}

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::frame::{FrameHandle, FrameHandler, FramePrimitive};
use crate::time::Timestamp;

use super::callback::{FrameCallback, FrameControl};
use super::config::{PanicPolicy, SchedulerConfig};

struct Inner {
    config: SchedulerConfig,
    primitive: RefCell<Box<dyn FramePrimitive>>,

    registry: RefCell<Vec<FrameCallback>>,
    // Only populated while a tick is draining it.
    active: RefCell<VecDeque<FrameCallback>>,

    running: Cell<bool>,
    ticking: Cell<bool>,
    clock: Cell<Timestamp>,
    pending: Cell<Option<FrameHandle>>,
    // Bumped on every request and on stop; deliveries carrying an older
    // generation are stale.
    generation: Cell<u64>,
}

/// Drives registered callbacks once per delivered frame.
///
/// `FrameScheduler` is a cheap handle: clones share the same registry, clock
/// and running state, which lets callbacks capture the scheduler and mutate
/// it mid-tick. A callback that captures a strong clone keeps the scheduler
/// alive for as long as it stays registered; capture a [`WeakScheduler`]
/// to avoid that.
///
/// The scheduler is single-threaded (`!Send`). Every operation is
/// synchronous and never fails; invalid requests (double start, stop while
/// stopped, removing an unknown callback, re-adding a registered one) are
/// ignored.
#[derive(Clone)]
pub struct FrameScheduler {
    inner: Rc<Inner>,
}

/// Non-owning reference to a [`FrameScheduler`].
#[derive(Clone)]
pub struct WeakScheduler {
    inner: Weak<Inner>,
}

impl WeakScheduler {
    /// Returns the scheduler if it is still alive.
    pub fn upgrade(&self) -> Option<FrameScheduler> {
        self.inner.upgrade().map(|inner| FrameScheduler { inner })
    }
}

impl FrameScheduler {
    /// Creates an empty, stopped scheduler fed by `primitive`.
    pub fn new<P>(primitive: P) -> Self
    where
        P: FramePrimitive + 'static,
    {
        Self::with_config(primitive, SchedulerConfig::default())
    }

    /// Creates an empty, stopped scheduler with an explicit configuration.
    pub fn with_config<P>(primitive: P, config: SchedulerConfig) -> Self
    where
        P: FramePrimitive + 'static,
    {
        Self {
            inner: Rc::new(Inner {
                config,
                primitive: RefCell::new(Box::new(primitive)),
                registry: RefCell::new(Vec::new()),
                active: RefCell::new(VecDeque::new()),
                running: Cell::new(false),
                ticking: Cell::new(false),
                clock: Cell::new(0.0),
                pending: Cell::new(None),
                generation: Cell::new(0),
            }),
        }
    }

    /// Returns a reference that does not keep the scheduler alive.
    pub fn downgrade(&self) -> WeakScheduler {
        WeakScheduler {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    // ── registration ──────────────────────────────────────────────────────

    /// Registers `callback` unless it is already registered.
    ///
    /// Returns the handle to pass to [`remove_callback`](Self::remove_callback).
    /// A callback added during a tick is first invoked on the next tick.
    pub fn add_callback(&self, callback: FrameCallback) -> FrameCallback {
        let mut registry = self.inner.registry.borrow_mut();
        if !registry.iter().any(|c| c.ptr_eq(&callback)) {
            registry.push(callback.clone());
        }
        callback
    }

    /// Wraps `f` in a new [`FrameCallback`] and registers it.
    pub fn add<F>(&self, f: F) -> FrameCallback
    where
        F: FnMut(Timestamp) + 'static,
    {
        self.add_callback(FrameCallback::new(f))
    }

    /// Unregisters `callback`.
    ///
    /// During a tick the callback is also dropped from the rest of that
    /// tick, so it is never invoked again. Unknown callbacks are ignored.
    pub fn remove_callback(&self, callback: &FrameCallback) {
        self.inner
            .registry
            .borrow_mut()
            .retain(|c| !c.ptr_eq(callback));
        self.inner
            .active
            .borrow_mut()
            .retain(|c| !c.ptr_eq(callback));
    }

    /// Returns true if `callback` is registered.
    pub fn contains(&self, callback: &FrameCallback) -> bool {
        self.inner
            .registry
            .borrow()
            .iter()
            .any(|c| c.ptr_eq(callback))
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Starts requesting frames. Does nothing if already running.
    pub fn start(&self) -> &Self {
        if !self.inner.running.get() {
            self.inner.running.set(true);
            log::debug!("[{}] started", self.inner.config.label);
            // A callback may restart the scheduler mid-tick; the tick itself
            // requests the next frame in that case.
            if self.inner.pending.get().is_none() && !self.inner.ticking.get() {
                self.request_frame();
            }
        }
        self
    }

    /// Cancels the pending frame and stops requesting new ones.
    ///
    /// The registry and the clock are kept; [`start`](Self::start) resumes.
    /// Does nothing if not running.
    pub fn stop(&self) -> &Self {
        if self.inner.running.get() {
            self.inner.running.set(false);
            self.cancel_pending();
            log::debug!(
                "[{}] stopped at t={}",
                self.inner.config.label,
                self.inner.clock.get()
            );
        }
        self
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Returns true while registered callbacks are being invoked.
    pub fn is_ticking(&self) -> bool {
        self.inner.ticking.get()
    }

    /// Timestamp of the last tick; frozen while stopped.
    pub fn time(&self) -> Timestamp {
        self.inner.clock.get()
    }

    fn request_frame(&self) {
        let generation = self.inner.generation.get().wrapping_add(1);
        self.inner.generation.set(generation);

        let weak = Rc::downgrade(&self.inner);
        let handler: FrameHandler = Box::new(move |timestamp| {
            if let Some(inner) = weak.upgrade() {
                FrameScheduler { inner }.on_frame(generation, timestamp);
            }
        });

        let handle = self.inner.primitive.borrow_mut().request_frame(handler);
        self.inner.pending.set(Some(handle));
    }

    fn cancel_pending(&self) {
        self.inner
            .generation
            .set(self.inner.generation.get().wrapping_add(1));
        if let Some(handle) = self.inner.pending.take() {
            self.inner.primitive.borrow_mut().cancel_frame(handle);
        }
    }

    // ── tick ──────────────────────────────────────────────────────────────

    fn on_frame(&self, generation: u64, timestamp: Timestamp) {
        let label = &self.inner.config.label;

        if generation != self.inner.generation.get() || !self.inner.running.get() {
            log::warn!("[{label}] ignoring stale frame at t={timestamp}");
            return;
        }

        // While ticking no request is outstanding: `start()` defers to the
        // end of the tick, so this delivery cannot nest inside another.
        self.inner.pending.set(None);
        self.tick(timestamp);

        if self.inner.running.get() && self.inner.pending.get().is_none() {
            self.request_frame();
        }
    }

    fn tick(&self, timestamp: Timestamp) {
        let timestamp = self.inner.clock.get().max(timestamp);
        self.inner.clock.set(timestamp);

        {
            let registry = self.inner.registry.borrow();
            let mut active = self.inner.active.borrow_mut();
            active.clear();
            active.extend(registry.iter().cloned());
            log::trace!(
                "[{}] tick t={timestamp} callbacks={}",
                self.inner.config.label,
                active.len()
            );
        }

        let _guard = TickGuard::enter(self);

        loop {
            // Keep the borrow short: callbacks mutate `active` through
            // `remove_callback`.
            let next = self.inner.active.borrow_mut().pop_front();
            let Some(callback) = next else {
                break;
            };

            if self.invoke(&callback, timestamp) == FrameControl::Remove {
                self.remove_callback(&callback);
            }
        }
    }

    fn invoke(&self, callback: &FrameCallback, timestamp: Timestamp) -> FrameControl {
        let label = &self.inner.config.label;

        let result = match self.inner.config.panic_policy {
            PanicPolicy::Propagate => callback.invoke(timestamp),
            PanicPolicy::Isolate => {
                match panic::catch_unwind(AssertUnwindSafe(|| callback.invoke(timestamp))) {
                    Ok(result) => result,
                    Err(payload) => {
                        log::error!(
                            "[{label}] frame callback panicked at t={timestamp}: {}",
                            panic_message(payload.as_ref())
                        );
                        return FrameControl::Continue;
                    }
                }
            }
        };

        result.unwrap_or_else(|| {
            log::warn!("[{label}] skipping callback that is already running");
            FrameControl::Continue
        })
    }
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("label", &self.inner.config.label)
            .field("callbacks", &self.len())
            .field("running", &self.inner.running.get())
            .field("ticking", &self.inner.ticking.get())
            .field("time", &self.inner.clock.get())
            .finish()
    }
}

impl fmt::Debug for WeakScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakScheduler")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Marks the scheduler as ticking and restores its invariants on exit,
/// including when a callback panic unwinds through the tick.
struct TickGuard<'a> {
    scheduler: &'a FrameScheduler,
}

impl<'a> TickGuard<'a> {
    fn enter(scheduler: &'a FrameScheduler) -> Self {
        scheduler.inner.ticking.set(true);
        Self { scheduler }
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        let inner = &self.scheduler.inner;
        inner.ticking.set(false);
        inner.active.borrow_mut().clear();

        if std::thread::panicking() {
            log::error!(
                "[{}] frame callback panicked; stopping scheduler",
                inner.config.label
            );
            self.scheduler.stop();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::frame::ManualFrames;

    type Log = Rc<RefCell<Vec<(&'static str, Timestamp)>>>;

    fn setup() -> (ManualFrames, FrameScheduler) {
        let frames = ManualFrames::new();
        let scheduler = FrameScheduler::new(frames.clone());
        (frames, scheduler)
    }

    fn recording(log: &Log, name: &'static str) -> FrameCallback {
        let log = log.clone();
        FrameCallback::new(move |t| log.borrow_mut().push((name, t)))
    }

    fn calls(log: &Log, name: &str) -> usize {
        log.borrow().iter().filter(|(n, _)| *n == name).count()
    }

    // ── registration ──────────────────────────────────────────────────────

    #[test]
    fn duplicate_add_is_ignored() {
        let (_, scheduler) = setup();
        let cb = FrameCallback::new(|_| {});

        let returned = scheduler.add_callback(cb.clone());
        scheduler.add_callback(cb.clone());

        assert_eq!(returned, cb);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn duplicate_add_runs_once_per_tick() {
        let (frames, scheduler) = setup();
        let log = Log::default();
        let cb = recording(&log, "a");
        scheduler.add_callback(cb.clone());
        scheduler.add_callback(cb);
        scheduler.start();

        frames.fire(0.0);
        assert_eq!(calls(&log, "a"), 1);
    }

    #[test]
    fn remove_unknown_and_double_remove_are_noops() {
        let (_, scheduler) = setup();
        let kept = scheduler.add(|_| {});
        let other = FrameCallback::new(|_| {});

        scheduler.remove_callback(&other);
        assert_eq!(scheduler.len(), 1);

        scheduler.remove_callback(&kept);
        scheduler.remove_callback(&kept);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let (frames, scheduler) = setup();
        let log = Log::default();
        scheduler.add_callback(recording(&log, "a"));
        scheduler.add_callback(recording(&log, "b"));
        scheduler.add_callback(recording(&log, "c"));
        scheduler.start();

        frames.fire(1.0);
        let names: Vec<_> = log.borrow().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn new_scheduler_is_stopped_and_empty() {
        let (frames, scheduler) = setup();
        assert!(!scheduler.is_running());
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.time(), 0.0);
        assert!(!frames.has_pending());
    }

    #[test]
    fn double_start_requests_one_frame() {
        let (frames, scheduler) = setup();
        scheduler.start().start();
        assert_eq!(frames.pending(), 1);
    }

    #[test]
    fn stop_without_start_is_noop() {
        let (frames, scheduler) = setup();
        scheduler.stop().stop();
        assert!(!scheduler.is_running());
        assert!(!frames.has_pending());
    }

    #[test]
    fn stop_cancels_first_request() {
        let (frames, scheduler) = setup();
        let log = Log::default();
        scheduler.add_callback(recording(&log, "a"));

        scheduler.start();
        scheduler.stop();

        assert_eq!(frames.fire(10.0), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(scheduler.time(), 0.0);
    }

    #[test]
    fn stop_freezes_time() {
        let (frames, scheduler) = setup();
        scheduler.start();
        frames.fire(16.0);
        frames.fire(32.0);
        scheduler.stop();

        frames.fire(48.0);
        frames.fire(64.0);
        assert_eq!(scheduler.time(), 32.0);
        assert_eq!(scheduler.time(), 32.0);
    }

    #[test]
    fn restart_after_stop_resumes_ticking() {
        let (frames, scheduler) = setup();
        let log = Log::default();
        scheduler.add_callback(recording(&log, "a"));

        scheduler.start();
        frames.fire(0.0);
        scheduler.stop();
        frames.fire(16.0);
        scheduler.start();
        frames.fire(32.0);
        frames.fire(48.0);

        assert_eq!(*log.borrow(), vec![("a", 0.0), ("a", 32.0), ("a", 48.0)]);
    }

    #[test]
    fn stale_delivery_after_stop_is_ignored() {
        // A primitive that cannot withdraw requests.
        #[derive(Clone, Default)]
        struct Leaky(Rc<RefCell<Vec<FrameHandler>>>);

        impl FramePrimitive for Leaky {
            fn request_frame(&mut self, handler: FrameHandler) -> FrameHandle {
                let mut pending = self.0.borrow_mut();
                pending.push(handler);
                FrameHandle::from_raw(pending.len() as u64)
            }

            fn cancel_frame(&mut self, _handle: FrameHandle) {}
        }

        let leaky = Leaky::default();
        let scheduler = FrameScheduler::new(leaky.clone());
        let log = Log::default();
        scheduler.add_callback(recording(&log, "a"));

        scheduler.start();
        scheduler.stop();
        scheduler.start();

        let handlers: Vec<_> = leaky.0.borrow_mut().drain(..).collect();
        assert_eq!(handlers.len(), 2);
        for handler in handlers {
            handler(5.0);
        }

        // Only the request issued by the second start() is honored.
        assert_eq!(calls(&log, "a"), 1);
        assert_eq!(leaky.0.borrow().len(), 1);
    }

    // ── tick ──────────────────────────────────────────────────────────────

    #[test]
    fn end_to_end_add_tick_remove_stop() {
        let (frames, scheduler) = setup();
        let log = Log::default();
        let a = scheduler.add_callback(recording(&log, "a"));
        scheduler.start();

        frames.fire(0.0);
        frames.fire(16.0);
        frames.fire(32.0);
        assert_eq!(*log.borrow(), vec![("a", 0.0), ("a", 16.0), ("a", 32.0)]);

        scheduler.remove_callback(&a);
        frames.fire(48.0);
        assert_eq!(calls(&log, "a"), 3);

        // The tick at 48 still advanced the clock.
        scheduler.stop();
        frames.fire(64.0);
        assert_eq!(scheduler.time(), 48.0);
    }

    #[test]
    fn end_to_end_time_frozen_at_last_tick_before_stop() {
        let (frames, scheduler) = setup();
        let log = Log::default();
        let a = scheduler.add_callback(recording(&log, "a"));
        scheduler.start();

        frames.fire(0.0);
        frames.fire(16.0);
        frames.fire(32.0);
        scheduler.remove_callback(&a);
        scheduler.stop();

        frames.fire(48.0);
        assert_eq!(calls(&log, "a"), 3);
        assert_eq!(scheduler.time(), 32.0);
    }

    #[test]
    fn removing_later_callback_mid_tick_skips_it() {
        let (frames, scheduler) = setup();
        let log = Log::default();
        let victim = recording(&log, "victim");

        let s = scheduler.clone();
        let v = victim.clone();
        scheduler.add(move |_| s.remove_callback(&v));
        scheduler.add_callback(victim.clone());
        scheduler.start();

        frames.fire(0.0);
        assert_eq!(calls(&log, "victim"), 0);
        assert!(!scheduler.contains(&victim));
    }

    #[test]
    fn self_removal_by_handle_completes() {
        let (frames, scheduler) = setup();
        let log = Log::default();
        let slot: Rc<RefCell<Option<FrameCallback>>> = Rc::default();

        let s = scheduler.downgrade();
        let me = slot.clone();
        let l = log.clone();
        let cb = scheduler.add(move |t| {
            if let (Some(s), Some(me)) = (s.upgrade(), me.borrow().as_ref()) {
                s.remove_callback(me);
            }
            l.borrow_mut().push(("self", t));
        });
        *slot.borrow_mut() = Some(cb.clone());
        scheduler.add_callback(recording(&log, "after"));
        scheduler.start();

        frames.fire(0.0);
        frames.fire(16.0);

        assert_eq!(calls(&log, "self"), 1);
        assert_eq!(calls(&log, "after"), 2);
        assert!(!scheduler.contains(&cb));
        slot.borrow_mut().take();
    }

    #[test]
    fn self_removal_by_control() {
        let (frames, scheduler) = setup();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let cb = scheduler.add_callback(FrameCallback::with_control(move |_| {
            c.set(c.get() + 1);
            FrameControl::Remove
        }));
        scheduler.start();

        frames.fire(0.0);
        frames.fire(16.0);
        assert_eq!(count.get(), 1);
        assert!(!scheduler.contains(&cb));
    }

    #[test]
    fn callbacks_added_mid_tick_wait_for_next_tick() {
        let (frames, scheduler) = setup();
        let log = Log::default();
        let late = recording(&log, "late");

        let s = scheduler.clone();
        let l = late.clone();
        scheduler.add(move |_| {
            s.add_callback(l.clone());
        });
        scheduler.start();

        frames.fire(0.0);
        assert_eq!(calls(&log, "late"), 0);
        assert!(scheduler.contains(&late));

        frames.fire(16.0);
        assert_eq!(*log.borrow(), vec![("late", 16.0)]);
    }

    #[test]
    fn snapshot_is_empty_outside_ticks() {
        let (frames, scheduler) = setup();
        let s = scheduler.clone();
        let seen_ticking = Rc::new(Cell::new(false));
        let flag = seen_ticking.clone();
        scheduler.add(move |_| flag.set(s.is_ticking()));
        scheduler.start();

        frames.fire(0.0);
        assert!(seen_ticking.get());
        assert!(!scheduler.is_ticking());
        assert!(scheduler.inner.active.borrow().is_empty());
    }

    #[test]
    fn stop_inside_tick_finishes_tick_without_rescheduling() {
        let (frames, scheduler) = setup();
        let log = Log::default();
        let s = scheduler.clone();
        scheduler.add(move |_| {
            s.stop();
        });
        scheduler.add_callback(recording(&log, "b"));
        scheduler.start();

        frames.fire(0.0);
        assert_eq!(calls(&log, "b"), 1);
        assert!(!scheduler.is_running());
        assert!(!frames.has_pending());
    }

    #[test]
    fn stop_then_start_inside_tick_keeps_one_request() {
        let (frames, scheduler) = setup();
        let s = scheduler.clone();
        scheduler.add(move |_| {
            s.stop().start();
        });
        scheduler.start();

        frames.fire(0.0);
        assert!(scheduler.is_running());
        assert_eq!(frames.pending(), 1);
    }

    #[test]
    fn restart_inside_tick_is_not_delivered_early() {
        let (frames, scheduler) = setup();
        let count = Rc::new(Cell::new(0));

        let nested = Rc::new(Cell::new(usize::MAX));

        let s = scheduler.clone();
        let f = frames.clone();
        let c = count.clone();
        let n = nested.clone();
        scheduler.add(move |_| {
            c.set(c.get() + 1);
            if c.get() == 1 {
                s.stop().start();
                n.set(f.fire(1.0));
            }
        });
        scheduler.start();

        frames.fire(0.0);
        assert_eq!(nested.get(), 0);
        assert_eq!(count.get(), 1);
        assert_eq!(frames.pending(), 1);

        frames.fire(16.0);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn clock_never_goes_backwards() {
        let (frames, scheduler) = setup();
        scheduler.start();
        frames.fire(100.0);
        frames.fire(50.0);
        assert_eq!(scheduler.time(), 100.0);
    }

    #[test]
    fn independent_schedulers_do_not_share_state() {
        let (frames_a, a) = setup();
        let (_, b) = setup();
        a.add(|_| {});
        a.start();
        frames_a.fire(10.0);

        assert_eq!(a.len(), 1);
        assert_eq!(a.time(), 10.0);
        assert!(b.is_empty());
        assert_eq!(b.time(), 0.0);
        assert!(!b.is_running());
    }

    #[test]
    fn dropped_scheduler_ignores_delivery() {
        let (frames, scheduler) = setup();
        scheduler.start();
        drop(scheduler);
        assert_eq!(frames.fire(0.0), 1);
    }

    // ── failures ──────────────────────────────────────────────────────────

    #[test]
    fn panicking_callback_is_isolated() {
        let (frames, scheduler) = setup();
        let log = Log::default();
        let bad = scheduler.add(|_| panic!("boom"));
        scheduler.add_callback(recording(&log, "after"));
        scheduler.start();

        frames.fire(0.0);
        frames.fire(16.0);

        assert_eq!(calls(&log, "after"), 2);
        assert!(scheduler.contains(&bad));
        assert!(scheduler.is_running());
        assert!(!scheduler.is_ticking());
    }

    #[test]
    fn propagate_policy_stops_and_rethrows() {
        let frames = ManualFrames::new();
        let scheduler = FrameScheduler::with_config(
            frames.clone(),
            SchedulerConfig {
                panic_policy: PanicPolicy::Propagate,
                ..SchedulerConfig::default()
            },
        );
        let log = Log::default();
        scheduler.add(|_| panic!("boom"));
        scheduler.add_callback(recording(&log, "after"));
        scheduler.start();

        let result = panic::catch_unwind(AssertUnwindSafe(|| frames.fire(0.0)));

        assert!(result.is_err());
        assert_eq!(calls(&log, "after"), 0);
        assert!(!scheduler.is_running());
        assert!(!scheduler.is_ticking());
        assert!(scheduler.inner.active.borrow().is_empty());
        assert!(!frames.has_pending());
    }

    #[test]
    fn panic_message_extracts_strings() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "<non-string panic payload>");
    }
}

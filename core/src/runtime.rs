// Time sources and one-shot timers
// Wall clock with a timer thread for live use, virtual time for replay and tests

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{trace, warn};

/// A deferred callback.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Monotonic time since an arbitrary origin.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Identifies one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// One-shot timers with cancellation.
///
/// Cancelling a timer that already fired, or was already cancelled, is a
/// no-op. A task must not be run while the scheduler holds any lock a task
/// could need.
pub trait Scheduler: Send + Sync {
    fn arm(&self, delay: Duration, task: Task) -> TimerHandle;
    fn cancel(&self, handle: TimerHandle);
}

/// Wall-clock time measured from construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

enum Command {
    Arm { id: u64, deadline: Instant, task: Task },
    Cancel(u64),
}

/// Real-time scheduler backed by a single timer thread.
///
/// The thread sleeps on its command channel until the earliest deadline,
/// then runs due tasks in deadline order. It exits once the scheduler is
/// dropped; timers still pending at that point never fire.
pub struct ThreadScheduler {
    commands: Sender<Command>,
    next_id: AtomicU64,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        let (commands, rx) = crossbeam_channel::unbounded();
        let spawned = thread::Builder::new()
            .name("morsekey-timer".into())
            .spawn(move || run_timer_thread(rx));
        if let Err(e) = spawned {
            warn!("failed to spawn timer thread: {e}");
        }

        Self {
            commands,
            next_id: AtomicU64::new(0),
        }
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn arm(&self, delay: Duration, task: Task) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + delay;
        if self.commands.send(Command::Arm { id, deadline, task }).is_err() {
            warn!(id, "timer thread is gone; timer will never fire");
        }
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        // a closed channel means nothing is pending anyway
        let _ = self.commands.send(Command::Cancel(handle.0));
    }
}

fn run_timer_thread(rx: Receiver<Command>) {
    let mut queue: BTreeMap<(Instant, u64), Task> = BTreeMap::new();
    let mut deadlines: HashMap<u64, Instant> = HashMap::new();

    loop {
        let now = Instant::now();
        while let Some(&(deadline, id)) = queue.keys().next() {
            if deadline > now {
                break;
            }
            deadlines.remove(&id);
            if let Some(task) = queue.remove(&(deadline, id)) {
                trace!(id, "timer fired");
                task();
            }
        }

        let command = match queue.keys().next() {
            Some(&(deadline, _)) => match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            Command::Arm { id, deadline, task } => {
                deadlines.insert(id, deadline);
                queue.insert((deadline, id), task);
            }
            Command::Cancel(id) => {
                if let Some(deadline) = deadlines.remove(&id) {
                    queue.remove(&(deadline, id));
                }
            }
        }
    }
}

#[derive(Default)]
struct VirtualState {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, u64), Task>,
    deadlines: HashMap<u64, Duration>,
}

/// Manually advanced clock and scheduler for deterministic replay.
///
/// Time only moves in [`advance`](Self::advance) /
/// [`advance_to`](Self::advance_to), which run every task that falls due on
/// the way, in deadline order, with the clock set to each task's deadline.
#[derive(Default)]
pub struct VirtualTime {
    state: Mutex<VirtualState>,
}

impl VirtualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        self.advance_to(target);
    }

    pub fn advance_to(&self, target: Duration) {
        loop {
            let task = {
                let mut state = self.state.lock();
                let due = state.queue.keys().next().copied().filter(|&(deadline, _)| deadline <= target);
                match due {
                    Some((deadline, id)) => {
                        state.deadlines.remove(&id);
                        state.now = state.now.max(deadline);
                        state.queue.remove(&(deadline, id))
                    }
                    None => {
                        state.now = state.now.max(target);
                        None
                    }
                }
            };
            // run outside the lock: tasks may arm or cancel timers
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Advance until no timer is pending.
    pub fn run_until_idle(&self) {
        loop {
            let last = self.state.lock().queue.keys().next_back().map(|&(deadline, _)| deadline);
            match last {
                Some(deadline) => self.advance_to(deadline),
                None => break,
            }
        }
    }

    /// Number of armed timers that have not fired.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }
}

impl Clock for VirtualTime {
    fn now(&self) -> Duration {
        self.state.lock().now
    }
}

impl Scheduler for VirtualTime {
    fn arm(&self, delay: Duration, task: Task) -> TimerHandle {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let deadline = state.now + delay;
        state.deadlines.insert(id, deadline);
        state.queue.insert((deadline, id), task);
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        let mut state = self.state.lock();
        if let Some(deadline) = state.deadlines.remove(&handle.0) {
            state.queue.remove(&(deadline, handle.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl Fn(u64) -> Task) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |tag: u64| -> Task {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().push(tag))
        };
        (log, make)
    }

    #[test]
    fn test_virtual_fires_in_deadline_order() {
        let time = VirtualTime::new();
        let (log, task) = recorder();
        time.arm(ms(30), task(3));
        time.arm(ms(10), task(1));
        time.arm(ms(20), task(2));

        time.advance(ms(15));
        assert_eq!(*log.lock(), vec![1]);
        assert_eq!(time.now(), ms(15));

        time.advance(ms(100));
        assert_eq!(*log.lock(), vec![1, 2, 3]);
        assert_eq!(time.now(), ms(115));
        assert_eq!(time.pending(), 0);
    }

    #[test]
    fn test_virtual_cancel_is_idempotent() {
        let time = VirtualTime::new();
        let (log, task) = recorder();
        let first = time.arm(ms(10), task(1));
        let second = time.arm(ms(10), task(2));

        time.cancel(first);
        time.cancel(first);
        time.advance(ms(10));
        assert_eq!(*log.lock(), vec![2]);

        // already fired
        time.cancel(second);
        assert_eq!(time.pending(), 0);
    }

    #[test]
    fn test_virtual_clock_reads_deadline_inside_task() {
        let time = Arc::new(VirtualTime::new());
        let seen = Arc::new(Mutex::new(None));
        let (clock, sink) = (Arc::clone(&time), Arc::clone(&seen));
        time.arm(ms(42), Box::new(move || *sink.lock() = Some(clock.now())));

        time.advance(ms(100));
        assert_eq!(*seen.lock(), Some(ms(42)));
    }

    #[test]
    fn test_virtual_task_can_arm() {
        let time = Arc::new(VirtualTime::new());
        let (log, task) = recorder();
        let inner = Arc::clone(&time);
        let follow_up = task(2);
        time.arm(
            ms(10),
            Box::new(move || {
                inner.arm(ms(5), follow_up);
            }),
        );
        time.run_until_idle();
        assert_eq!(*log.lock(), vec![2]);
        assert_eq!(time.now(), ms(15));
    }

    #[test]
    fn test_thread_scheduler_fires_and_cancels() {
        let scheduler = ThreadScheduler::new();
        let (fired_tx, fired_rx) = crossbeam_channel::unbounded();

        let tx = fired_tx.clone();
        let cancelled = scheduler.arm(ms(20), Box::new(move || tx.send(1).unwrap()));
        let tx = fired_tx.clone();
        scheduler.arm(ms(40), Box::new(move || tx.send(2).unwrap()));
        scheduler.cancel(cancelled);

        assert_eq!(fired_rx.recv_timeout(Duration::from_secs(2)), Ok(2));
        assert!(fired_rx.recv_timeout(ms(100)).is_err());
    }
}

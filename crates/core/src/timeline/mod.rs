//! Virtual time, cancellable timers and ordered step sequences.
//!
//! Nothing in here reads the wall clock. The host advances a
//! [`VirtualClock`] and hands `now` to whoever owns timers, so every
//! animation and audio schedule can be replayed deterministically.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Milliseconds on the virtual timeline.
pub type Millis = u64;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VirtualClock {
    now: Millis,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn reset(&mut self) {
        self.now = 0;
    }

    /// Moves the clock forward and returns the new time.
    pub fn advance(&mut self, delta: Millis) -> Millis {
        self.now = self.now.saturating_add(delta);
        self.now
    }
}

/// Handle returned when a timer is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(u64);

/// A timer that came due during [`Scheduler::drain_due`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent<K> {
    pub id: TimerId,
    pub due_at: Millis,
    pub payload: K,
}

#[derive(Debug, Clone)]
struct TimerEntry<K> {
    id: TimerId,
    payload: K,
    repeat_every: Option<Millis>,
}

/// Priority queue of one-shot and repeating timers keyed by due time.
///
/// Timers due at the same instant fire in scheduling order.
#[derive(Debug, Clone)]
pub struct Scheduler<K> {
    queue: BTreeMap<(Millis, u64), TimerEntry<K>>,
    index: HashMap<TimerId, (Millis, u64)>,
    next_seq: u64,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<K: Clone> Scheduler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.index.contains_key(&id)
    }

    /// Schedules `payload` to fire once at `due_at`.
    pub fn schedule_at(&mut self, due_at: Millis, payload: K) -> TimerId {
        self.insert(due_at, payload, None)
    }

    /// Schedules `payload` to fire at `first_at` and then every `interval`
    /// until cancelled. A zero interval is treated as one millisecond.
    pub fn schedule_repeating(&mut self, first_at: Millis, interval: Millis, payload: K) -> TimerId {
        self.insert(first_at, payload, Some(interval.max(1)))
    }

    /// Cancels a timer. Returns `false` when it already fired or never existed.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.index.remove(&id) {
            Some(key) => {
                self.queue.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Cancels every timer whose payload matches `predicate`.
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let doomed: Vec<(Millis, u64)> = self
            .queue
            .iter()
            .filter(|(_, entry)| predicate(&entry.payload))
            .map(|(key, _)| *key)
            .collect();
        for key in &doomed {
            if let Some(entry) = self.queue.remove(key) {
                self.index.remove(&entry.id);
            }
        }
        doomed.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.index.clear();
    }

    /// Due time of the earliest pending timer.
    pub fn next_due(&self) -> Option<Millis> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    /// Removes and returns the earliest timer due at or before `now`.
    ///
    /// Repeating timers are re-armed for their next interval before being
    /// returned, so a caller may cancel them from inside its handler.
    pub fn pop_due(&mut self, now: Millis) -> Option<ScheduledEvent<K>> {
        let (&(due_at, seq), _) = self.queue.iter().next()?;
        if due_at > now {
            return None;
        }
        let entry = self.queue.remove(&(due_at, seq))?;
        self.index.remove(&entry.id);

        if let Some(interval) = entry.repeat_every {
            let next_at = due_at.saturating_add(interval);
            let seq = self.bump_seq();
            self.index.insert(entry.id, (next_at, seq));
            self.queue.insert(
                (next_at, seq),
                TimerEntry {
                    id: entry.id,
                    payload: entry.payload.clone(),
                    repeat_every: entry.repeat_every,
                },
            );
        }

        Some(ScheduledEvent {
            id: entry.id,
            due_at,
            payload: entry.payload,
        })
    }

    /// Drains every timer due at or before `now`, in firing order.
    pub fn drain_due(&mut self, now: Millis) -> Vec<ScheduledEvent<K>> {
        let mut fired = Vec::new();
        while let Some(event) = self.pop_due(now) {
            fired.push(event);
        }
        fired
    }

    fn insert(&mut self, due_at: Millis, payload: K, repeat_every: Option<Millis>) -> TimerId {
        let seq = self.bump_seq();
        let id = TimerId(seq);
        self.index.insert(id, (due_at, seq));
        self.queue.insert(
            (due_at, seq),
            TimerEntry {
                id,
                payload,
                repeat_every,
            },
        );
        id
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// One `{duration, action}` entry of a [`Sequence`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step<A> {
    pub duration: Millis,
    pub action: A,
}

impl<A> Step<A> {
    pub fn new(duration: Millis, action: A) -> Self {
        Self { duration, action }
    }
}

/// Position inside a running sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepCursor {
    pub index: usize,
    /// Progress through the step in `[0, 1]`.
    pub progress: f64,
}

/// Strictly ordered list of timed steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence<A> {
    steps: Vec<Step<A>>,
}

impl<A> Sequence<A> {
    pub fn new(steps: Vec<Step<A>>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step<A>] {
        &self.steps
    }

    pub fn total_duration(&self) -> Millis {
        self.steps.iter().map(|step| step.duration).sum()
    }

    /// Offset of step `index` from the start of the sequence.
    pub fn start_of(&self, index: usize) -> Millis {
        self.steps.iter().take(index).map(|step| step.duration).sum()
    }

    /// Locates the step active at `elapsed`. Past the end the cursor rests on
    /// the last step at full progress.
    pub fn locate(&self, elapsed: Millis) -> Option<StepCursor> {
        let mut offset = 0;
        for (index, step) in self.steps.iter().enumerate() {
            let end = offset + step.duration;
            if elapsed < end {
                let progress = (elapsed - offset) as f64 / step.duration as f64;
                return Some(StepCursor { index, progress });
            }
            offset = end;
        }
        self.steps.len().checked_sub(1).map(|index| StepCursor {
            index,
            progress: 1.0,
        })
    }
}

/// Drives a [`Sequence`] from a start time, reporting each step exactly once.
#[derive(Debug, Clone)]
pub struct SequenceDriver<A> {
    sequence: Sequence<A>,
    started_at: Millis,
    entered: usize,
}

impl<A: Clone> SequenceDriver<A> {
    pub fn new(sequence: Sequence<A>, started_at: Millis) -> Self {
        Self {
            sequence,
            started_at,
            entered: 0,
        }
    }

    pub fn sequence(&self) -> &Sequence<A> {
        &self.sequence
    }

    pub fn started_at(&self) -> Millis {
        self.started_at
    }

    pub fn ends_at(&self) -> Millis {
        self.started_at + self.sequence.total_duration()
    }

    pub fn is_finished(&self, now: Millis) -> bool {
        self.entered == self.sequence.steps.len() && now >= self.ends_at()
    }

    /// Returns `(index, action)` for every step whose start time has passed
    /// since the previous poll, in order.
    pub fn poll(&mut self, now: Millis) -> Vec<(usize, A)> {
        let mut entered = Vec::new();
        while self.entered < self.sequence.steps.len() {
            let start = self.started_at + self.sequence.start_of(self.entered);
            if start > now {
                break;
            }
            entered.push((self.entered, self.sequence.steps[self.entered].action.clone()));
            self.entered += 1;
        }
        entered
    }

    /// Cursor at `now`, or `None` before the sequence starts.
    pub fn cursor(&self, now: Millis) -> Option<StepCursor> {
        if now < self.started_at {
            return None;
        }
        self.sequence.locate(now - self.started_at)
    }
}

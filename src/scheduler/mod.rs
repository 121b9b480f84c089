//! Microsecond event scheduler.
//!
//! Two priority classes are kept: `Fine` events are polled on every main
//! loop iteration, `Coarse` events on a slower cadence. Each class holds
//! a deadline-ordered list; the embedder can arm a hardware timer from
//! [`Scheduler::next_deadline`].
//!
//! Callbacks do not run from interrupt context. Firing returns the
//! attached event tokens to the caller, which dispatches them with full
//! access to the MAC context; this keeps the re-entrancy of the C
//! original (scheduling from inside a fired event) without sharing
//! mutable state with an ISR.

use alloc::vec::Vec;

use log::{trace, warn};
use smallvec::SmallVec;

/// Scheduler priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedClass {
	/// Polled often; sub-beacon-interval fidelity.
	Fine,
	/// Polled on a coarse cadence; housekeeping sweeps.
	Coarse,
}

/// Identifier of a scheduled event. Ids are monotonic per class and not
/// recycled until the 31-bit space wraps; coarse ids carry the MSB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedId(u32);

const COARSE_ID_BASE: u32 = 0x8000_0000;

/// Calls value meaning "repeat forever".
pub const SCHEDULE_REPEAT_FOREVER: u32 = 0;

#[derive(Debug)]
struct SchedEntry<E> {
	id: u32,
	enabled: bool,
	delay_us: u64,
	/// Remaining calls; `SCHEDULE_REPEAT_FOREVER` repeats forever.
	remaining: u32,
	target_us: u64,
	event: E,
}

struct ClassState<E> {
	/// Sorted by `target_us`, earliest last (pop from the back).
	entries: Vec<SchedEntry<E>>,
	next_id: u32,
}

impl<E> ClassState<E> {
	fn new(id_base: u32) -> Self {
		Self {
			entries: Vec::new(),
			next_id: id_base,
		}
	}

	fn insert(&mut self, entry: SchedEntry<E>) {
		// Earliest deadline at the end keeps firing O(1).
		let pos = self
			.entries
			.partition_point(|e| e.target_us > entry.target_us);
		self.entries.insert(pos, entry);
	}
}

/// The event scheduler. `E` is the event token type dispatched by the
/// owner when an entry fires.
pub struct Scheduler<E> {
	fine: ClassState<E>,
	coarse: ClassState<E>,
}

impl<E: Clone> Scheduler<E> {
	pub fn new() -> Self {
		Self {
			fine: ClassState::new(0),
			coarse: ClassState::new(COARSE_ID_BASE),
		}
	}

	/// Schedules `event` to fire once, `delay_us` from `now`.
	pub fn schedule_once(&mut self, class: SchedClass, now: u64, delay_us: u64, event: E) -> SchedId {
		self.schedule_repeated(class, now, delay_us, 1, event)
	}

	/// Schedules `event` every `delay_us`, `num_calls` times
	/// ([`SCHEDULE_REPEAT_FOREVER`] = forever).
	pub fn schedule_repeated(
		&mut self,
		class: SchedClass,
		now: u64,
		delay_us: u64,
		num_calls: u32,
		event: E,
	) -> SchedId {
		let state = self.class_mut(class);
		let id = state.next_id;
		state.next_id = match class {
			SchedClass::Fine => id.wrapping_add(1) & !COARSE_ID_BASE,
			SchedClass::Coarse => COARSE_ID_BASE | (id.wrapping_add(1) & !COARSE_ID_BASE),
		};
		state.insert(SchedEntry {
			id,
			enabled: true,
			delay_us,
			remaining: num_calls,
			target_us: now + delay_us,
			event,
		});
		trace!("scheduled event {id:#x} in {delay_us} us");
		SchedId(id)
	}

	/// Cancels a scheduled event. The entry is marked disabled and
	/// reclaimed lazily at its next deadline.
	pub fn remove(&mut self, class: SchedClass, id: SchedId) {
		let state = self.class_mut(class);
		match state.entries.iter_mut().find(|e| e.id == id.0) {
			Some(entry) => entry.enabled = false,
			None => warn!("remove of unknown schedule id {:#x}", id.0),
		}
	}

	pub fn remove_all(&mut self) {
		self.fine.entries.clear();
		self.coarse.entries.clear();
	}

	/// Deadline of the earliest enabled entry across both classes.
	pub fn next_deadline(&self) -> Option<u64> {
		let earliest = |state: &ClassState<E>| {
			state
				.entries
				.iter()
				.rev()
				.find(|e| e.enabled)
				.map(|e| e.target_us)
		};
		match (earliest(&self.fine), earliest(&self.coarse)) {
			(Some(a), Some(b)) => Some(a.min(b)),
			(a, b) => a.or(b),
		}
	}

	/// Fires every due entry of `class`, returning their event tokens in
	/// deadline order. Repeating entries re-arm relative to their
	/// previous target so periodic events do not drift.
	pub fn poll(&mut self, class: SchedClass, now: u64) -> SmallVec<[(SchedId, E); 4]> {
		let state = self.class_mut(class);
		let mut fired = SmallVec::new();
		while let Some(entry) = state.entries.last() {
			if entry.target_us > now {
				break;
			}
			let mut entry = state.entries.pop().unwrap();
			if !entry.enabled {
				continue;
			}
			fired.push((SchedId(entry.id), entry.event.clone()));
			let rearm = match entry.remaining {
				SCHEDULE_REPEAT_FOREVER => true,
				1 => false,
				_ => {
					entry.remaining -= 1;
					true
				}
			};
			if rearm {
				entry.target_us += entry.delay_us;
				state.insert(entry);
			}
		}
		fired
	}

	fn class_mut(&mut self, class: SchedClass) -> &mut ClassState<E> {
		match class {
			SchedClass::Fine => &mut self.fine,
			SchedClass::Coarse => &mut self.coarse,
		}
	}
}

impl<E: Clone> Default for Scheduler<E> {
	fn default() -> Self {
		Self::new()
	}
}

//! Local traffic generator.
//!
//! LTGs are programmable synthetic packet sources used to load the Tx
//! queues during experiments. Each LTG owns a schedule (periodic or
//! uniform-random interval), a payload descriptor, and a stop condition;
//! the MAC context drives it through the event scheduler and builds one
//! data frame per indicated destination at every firing.

use alloc::vec::Vec;

use log::{debug, warn};
use rand_chacha::rand_core::RngCore;
use rand_chacha::ChaCha8Rng;

use crate::eth::{write_llc_header, ETHERTYPE_LTG};
use crate::frame::LLC_HEADER_LEN;
use crate::scheduler::SchedId;
use crate::MacAddr;

/// Stop-time / call-count value meaning "run forever".
pub const LTG_DURATION_FOREVER: u64 = 0;

/// Bytes of the LTG payload header: LLC/SNAP, unique sequence, LTG id.
pub const LTG_HEADER_LEN: usize = LLC_HEADER_LEN + 8 + 4;

/// Firing cadence of an LTG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LtgSchedule {
	Periodic {
		interval_usec: u32,
	},
	/// Interval drawn uniformly from `[min, max]` before every firing.
	UniformRand {
		min_interval_usec: u32,
		max_interval_usec: u32,
	},
}

/// What each firing produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LtgPayload {
	/// One fixed-length frame to one address.
	Fixed { dest: MacAddr, length: u16 },
	/// One uniformly-random-length frame to one address.
	UniformRand {
		dest: MacAddr,
		min_length: u16,
		max_length: u16,
	},
	/// One fixed-length frame to every associated station.
	AllAssocFixed { length: u16 },
}

/// When an LTG stops firing on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LtgStop {
	Forever,
	/// Absolute system time.
	AtTime(u64),
	AfterCalls(u64),
}

#[derive(Debug)]
struct LtgEntry {
	id: u32,
	schedule: LtgSchedule,
	payload: LtgPayload,
	stop: LtgStop,
	calls: u64,
	running: bool,
	sched_id: Option<SchedId>,
}

/// One planned transmission returned by a firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LtgFrame {
	/// `None` means "every associated station".
	pub dest: Option<MacAddr>,
	pub length: u16,
}

/// Result of driving one LTG firing.
#[derive(Debug)]
pub struct LtgFire {
	pub frame: LtgFrame,
	/// Delay until the next firing; `None` ends the schedule.
	pub next_interval_usec: Option<u64>,
}

/// The set of configured traffic generators.
pub struct LtgStore {
	entries: Vec<LtgEntry>,
	next_id: u32,
}

impl LtgStore {
	pub fn new() -> Self {
		Self {
			entries: Vec::new(),
			next_id: 0,
		}
	}

	/// Registers a new LTG; it does not fire until started.
	pub fn create(&mut self, schedule: LtgSchedule, payload: LtgPayload, stop: LtgStop) -> u32 {
		let id = self.next_id;
		self.next_id += 1;
		self.entries.push(LtgEntry {
			id,
			schedule,
			payload,
			stop,
			calls: 0,
			running: false,
			sched_id: None,
		});
		debug!("created LTG {id}");
		id
	}

	pub fn ids(&self) -> Vec<u32> {
		self.entries.iter().map(|e| e.id).collect()
	}

	pub fn is_running(&self, id: u32) -> bool {
		self.entry(id).is_some_and(|e| e.running)
	}

	/// Marks an LTG started and returns the delay to its first firing.
	pub fn start(&mut self, id: u32, rng: &mut ChaCha8Rng) -> Option<u64> {
		let entry = self.entry_mut(id)?;
		entry.running = true;
		entry.calls = 0;
		Some(Self::draw_interval(entry.schedule, rng))
	}

	/// Records the scheduler id driving this LTG so removal can cancel
	/// it.
	pub fn set_sched_id(&mut self, id: u32, sched_id: SchedId) {
		if let Some(entry) = self.entry_mut(id) {
			entry.sched_id = Some(sched_id);
		}
	}

	/// Stops an LTG; returns the scheduler event to cancel.
	pub fn stop(&mut self, id: u32) -> Option<SchedId> {
		let entry = self.entry_mut(id)?;
		entry.running = false;
		entry.sched_id.take()
	}

	/// Removes an LTG entirely. The parameter block is dropped here;
	/// any in-flight frame it produced still completes normally.
	pub fn remove(&mut self, id: u32) -> Option<SchedId> {
		let index = self.entries.iter().position(|e| e.id == id)?;
		let entry = self.entries.swap_remove(index);
		debug!("removed LTG {id}");
		entry.sched_id
	}

	/// Drives one firing. Returns the frame to build and the next
	/// interval, or `None` when the LTG is stopped or complete.
	pub fn fire(&mut self, id: u32, now: u64, rng: &mut ChaCha8Rng) -> Option<LtgFire> {
		let entry = match self.entry_mut(id) {
			Some(entry) => entry,
			None => {
				warn!("fire of unknown LTG {id}");
				return None;
			}
		};
		if !entry.running {
			return None;
		}
		if let LtgStop::AtTime(stop) = entry.stop {
			if stop != LTG_DURATION_FOREVER && now >= stop {
				entry.running = false;
				return None;
			}
		}
		entry.calls += 1;
		let done = matches!(entry.stop, LtgStop::AfterCalls(max) if entry.calls >= max);

		let frame = match entry.payload {
			LtgPayload::Fixed { dest, length } => LtgFrame {
				dest: Some(dest),
				length,
			},
			LtgPayload::UniformRand {
				dest,
				min_length,
				max_length,
			} => LtgFrame {
				dest: Some(dest),
				length: uniform_u16(rng, min_length, max_length),
			},
			LtgPayload::AllAssocFixed { length } => LtgFrame { dest: None, length },
		};

		let next_interval_usec = if done {
			entry.running = false;
			None
		} else {
			Some(Self::draw_interval(entry.schedule, rng))
		};
		Some(LtgFire {
			frame,
			next_interval_usec,
		})
	}

	fn draw_interval(schedule: LtgSchedule, rng: &mut ChaCha8Rng) -> u64 {
		match schedule {
			LtgSchedule::Periodic { interval_usec } => u64::from(interval_usec),
			LtgSchedule::UniformRand {
				min_interval_usec,
				max_interval_usec,
			} => u64::from(uniform_u32(rng, min_interval_usec, max_interval_usec)),
		}
	}

	fn entry(&self, id: u32) -> Option<&LtgEntry> {
		self.entries.iter().find(|e| e.id == id)
	}

	fn entry_mut(&mut self, id: u32) -> Option<&mut LtgEntry> {
		self.entries.iter_mut().find(|e| e.id == id)
	}
}

impl Default for LtgStore {
	fn default() -> Self {
		Self::new()
	}
}

fn uniform_u32(rng: &mut ChaCha8Rng, min: u32, max: u32) -> u32 {
	if max <= min {
		return min;
	}
	min + rng.next_u32() % (max - min + 1)
}

fn uniform_u16(rng: &mut ChaCha8Rng, min: u16, max: u16) -> u16 {
	uniform_u32(rng, u32::from(min), u32::from(max)) as u16
}

/// Writes the LTG payload header into a frame body: LLC/SNAP with the
/// LTG EtherType, a zero unique-sequence placeholder (stamped at
/// dequeue) and the LTG id.
pub fn write_ltg_header(buf: &mut [u8], ltg_id: u32) -> usize {
	let mut off = write_llc_header(buf, ETHERTYPE_LTG);
	buf[off..off + 8].fill(0);
	off += 8;
	buf[off..off + 4].copy_from_slice(&ltg_id.to_le_bytes());
	off += 4;
	off
}

//! Transmit queue framework.
//!
//! All queue elements come from one fixed free pool sized at boot; the
//! logical queues are intrusive lists over that pool. Every element
//! carries a staged frame-info header, the encoded MPDU with PHY-header
//! headroom, and producer metadata that tells the Tx service loop where
//! the frame's Tx parameters come from.

use alloc::boxed::Box;
use alloc::vec::Vec;

use hashbrown::HashMap;
use log::{error, trace, warn};
use smallvec::SmallVec;

use crate::collections::{Arena, Handle, List};
use crate::config::QUEUE_BUFFER_SIZE;
use crate::error::QueueError;
use crate::pktbuf::{TxFrameInfo, TxParams};
use zerocopy::FromZeroes;

/// Identifier of a logical Tx queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(pub u16);

/// Shared queue for multicast/broadcast data.
pub const MCAST_QID: QueueId = QueueId(0);
/// Queue for beacons.
pub const BEACON_QID: QueueId = QueueId(1);
/// Queue for management frames.
pub const MANAGEMENT_QID: QueueId = QueueId(2);

/// Data queue of an associated station.
#[inline]
pub const fn station_id_to_queue_id(station_id: u16) -> QueueId {
	QueueId(station_id + 2)
}

/// Where the Tx service loop finds the Tx parameters for a queued frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMetadata {
	/// No metadata; the frame-info params are already final.
	#[default]
	Ignore,
	/// Resolve the station's current Tx params at dequeue time.
	StationId(u16),
	/// Fixed Tx params captured at enqueue time.
	TxParams(TxParams),
}

/// One element of the Tx queue free pool.
pub struct TxQueueBuffer {
	pub metadata: QueueMetadata,
	/// Staged header, copied into the Tx packet buffer at dequeue.
	pub frame_info: TxFrameInfo,
	/// PHY-header headroom plus the encoded MPDU.
	pub frame: Box<[u8; QUEUE_BUFFER_SIZE]>,
}

impl TxQueueBuffer {
	fn new() -> Self {
		Self {
			metadata: QueueMetadata::Ignore,
			frame_info: TxFrameInfo::new_zeroed(),
			frame: Box::new([0; QUEUE_BUFFER_SIZE]),
		}
	}

	fn reset(&mut self) {
		self.metadata = QueueMetadata::Ignore;
		self.frame_info = TxFrameInfo::new_zeroed();
	}

	/// The encoded MPDU, trimmed to the staged length.
	pub fn mpdu(&self) -> &[u8] {
		&self.frame[..self.frame_info.length.get() as usize]
	}
}

/// Occupancy transition of a queue, consumed by the Ethernet bridge for
/// backpressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
	BecameOccupied(QueueId),
	BecameEmpty(QueueId),
}

/// The Tx queue manager: one free pool, many logical FIFOs.
pub struct QueueManager {
	arena: Arena<TxQueueBuffer>,
	free: List,
	queues: HashMap<QueueId, List>,
	events: SmallVec<[QueueEvent; 4]>,
}

impl QueueManager {
	/// Allocates the free pool. `num_elements` is fixed for the process
	/// lifetime.
	pub fn new(num_elements: usize) -> Self {
		let mut arena = Arena::with_capacity(num_elements);
		let mut free = List::new();
		for _ in 0..num_elements {
			let handle = arena
				.insert(TxQueueBuffer::new())
				.unwrap_or_else(|_| unreachable!());
			free.push_back(&mut arena, handle);
		}
		Self {
			arena,
			free,
			queues: HashMap::new(),
			events: SmallVec::new(),
		}
	}

	/// Takes one element from the free pool.
	pub fn checkout(&mut self) -> Result<Handle, QueueError> {
		match self.free.pop_front(&mut self.arena) {
			Some(handle) => Ok(handle),
			None => {
				warn!("tx queue free pool exhausted");
				Err(QueueError::Exhausted)
			}
		}
	}

	/// Returns an element to the free pool.
	pub fn checkin(&mut self, handle: Handle) {
		match self.arena.get_mut(handle) {
			Some(buffer) => {
				buffer.reset();
				self.free.push_back(&mut self.arena, handle);
			}
			None => error!("checkin of stale queue element"),
		}
	}

	/// Takes up to `n` elements into `list`; returns how many.
	pub fn checkout_list(&mut self, list: &mut List, n: u32) -> u32 {
		list.append_first_n(&mut self.arena, &mut self.free, n)
	}

	/// Returns every element of `list` to the free pool.
	pub fn checkin_list(&mut self, list: &mut List) -> u32 {
		let mut count = 0;
		while let Some(handle) = list.pop_front(&mut self.arena) {
			self.checkin(handle);
			count += 1;
		}
		count
	}

	pub fn get(&self, handle: Handle) -> Option<&TxQueueBuffer> {
		self.arena.get(handle)
	}

	pub fn get_mut(&mut self, handle: Handle) -> Option<&mut TxQueueBuffer> {
		self.arena.get_mut(handle)
	}

	/// Appends a checked-out element to `qid`. The queue-of-origin
	/// details in the staged frame info are filled in here.
	pub fn enqueue_tail(&mut self, qid: QueueId, handle: Handle) {
		let queue = self.queues.entry(qid).or_insert_with(List::new);
		let was_empty = queue.is_empty();
		queue.push_back(&mut self.arena, handle);
		let occupancy = queue.len();
		if let Some(buffer) = self.arena.get_mut(handle) {
			buffer.frame_info.queue_info.id = qid.0 as u8;
			buffer.frame_info.queue_info.occupancy.set(occupancy as u16);
		}
		if was_empty {
			self.events.push(QueueEvent::BecameOccupied(qid));
		}
		trace!("enqueue to queue {}: occupancy {occupancy}", qid.0);
	}

	/// Removes and returns the head of `qid`, or `None` when empty.
	pub fn dequeue_head(&mut self, qid: QueueId) -> Option<Handle> {
		let queue = self.queues.get_mut(&qid)?;
		let handle = queue.pop_front(&mut self.arena)?;
		if queue.is_empty() {
			self.events.push(QueueEvent::BecameEmpty(qid));
		}
		Some(handle)
	}

	/// Releases all elements of `qid` to the free pool and returns how
	/// many were released.
	pub fn purge(&mut self, qid: QueueId) -> u32 {
		let Some(mut queue) = self.queues.remove(&qid) else {
			return 0;
		};
		let mut count = 0;
		while let Some(handle) = queue.pop_front(&mut self.arena) {
			self.checkin(handle);
			count += 1;
		}
		if count > 0 {
			self.events.push(QueueEvent::BecameEmpty(qid));
			trace!("purged {count} elements from queue {}", qid.0);
		}
		count
	}

	pub fn num_free(&self) -> u32 {
		self.free.len()
	}

	pub fn num_queued(&self, qid: QueueId) -> u32 {
		self.queues.get(&qid).map_or(0, List::len)
	}

	/// Total number of elements in the pool.
	pub fn total_size(&self) -> u32 {
		self.arena.capacity() as u32
	}

	/// Drains the occupancy transitions recorded since the last call.
	pub fn take_events(&mut self) -> SmallVec<[QueueEvent; 4]> {
		core::mem::take(&mut self.events)
	}

	/// Queues that currently hold at least one element, in unspecified
	/// order.
	pub fn occupied_queues(&self) -> Vec<QueueId> {
		self.queues
			.iter()
			.filter(|(_, q)| !q.is_empty())
			.map(|(&qid, _)| qid)
			.collect()
	}
}

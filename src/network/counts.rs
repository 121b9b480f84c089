//! Tx/Rx counters per peer address.
//!
//! Counts are keyed by address rather than by station so peers that
//! never associate are observable too. Receptions are de-duplicated
//! with the (retry bit, 12-bit sequence) rule: a retried frame whose
//! sequence matches the previous reception from that address bumps only
//! the `_total` counters.

use alloc::vec::Vec;

use hashbrown::HashMap;
use log::{debug, info};

use crate::collections::{Arena, Handle, List};
use crate::config::{COUNTS_TXRX_TIMEOUT_USEC, MAX_NUM_COUNTS};
use crate::error::StoreError;
use crate::MacAddr;

bitflags::bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct CountsFlags: u8 {
		/// Entry survives list resets and station removal.
		const KEEP = 0x01;
	}
}

/// Counters for one frame class (data or management).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounts {
	/// Successfully received bytes, de-duplicated.
	pub rx_num_bytes: u64,
	/// Successfully received bytes including duplicates.
	pub rx_num_bytes_total: u64,
	/// Successfully transmitted MPDU bytes.
	pub tx_num_bytes_success: u64,
	/// All transmitted MPDU bytes.
	pub tx_num_bytes_total: u64,
	/// Successfully received packets, de-duplicated.
	pub rx_num_packets: u32,
	/// Successfully received packets including duplicates.
	pub rx_num_packets_total: u32,
	/// Successfully transmitted MPDUs.
	pub tx_num_packets_success: u32,
	/// All transmitted MPDUs.
	pub tx_num_packets_total: u32,
	/// Low-level attempts including retransmissions.
	pub tx_num_attempts: u64,
}

/// The counts record of one peer address.
#[derive(Debug)]
pub struct TxRxCounts {
	pub addr: MacAddr,
	pub flags: CountsFlags,
	pub data: FrameCounts,
	pub mgmt: FrameCounts,
	/// MAC time of the last counted frame in either direction.
	pub latest_txrx_timestamp: u64,
	/// Sequence number of the last reception, for de-duplication.
	pub rx_latest_seq: u16,
	seq_valid: bool,
}

impl TxRxCounts {
	fn new(addr: MacAddr, now: u64) -> Self {
		Self {
			addr,
			flags: CountsFlags::empty(),
			data: FrameCounts::default(),
			mgmt: FrameCounts::default(),
			latest_txrx_timestamp: now,
			rx_latest_seq: 0,
			seq_valid: false,
		}
	}

	fn zero(&mut self) {
		self.data = FrameCounts::default();
		self.mgmt = FrameCounts::default();
		self.seq_valid = false;
	}

	fn class_mut(&mut self, is_data: bool) -> &mut FrameCounts {
		if is_data {
			&mut self.data
		} else {
			&mut self.mgmt
		}
	}
}

/// Bounded directory of counts records.
pub struct CountsStore {
	arena: Arena<TxRxCounts>,
	inuse: List,
	index: HashMap<MacAddr, Handle>,
}

impl CountsStore {
	pub fn new() -> Self {
		Self::with_capacity(MAX_NUM_COUNTS)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			arena: Arena::with_capacity(capacity),
			inuse: List::new(),
			index: HashMap::with_capacity(capacity),
		}
	}

	pub fn get(&self, handle: Handle) -> Option<&TxRxCounts> {
		self.arena.get(handle)
	}

	pub fn get_mut(&mut self, handle: Handle) -> Option<&mut TxRxCounts> {
		self.arena.get_mut(handle)
	}

	pub fn find_addr(&self, addr: &MacAddr) -> Option<Handle> {
		self.index.get(addr).copied()
	}

	pub fn iter(&self) -> impl Iterator<Item = Handle> + '_ {
		self.inuse.iter(&self.arena)
	}

	pub fn len(&self) -> usize {
		self.inuse.len() as usize
	}

	pub fn is_empty(&self) -> bool {
		self.inuse.is_empty()
	}

	pub fn get_or_create(&mut self, addr: &MacAddr, now: u64) -> Result<Handle, StoreError> {
		if let Some(handle) = self.find_addr(addr) {
			return Ok(handle);
		}
		if self.arena.num_free() == 0 {
			self.evict_oldest()?;
		}
		let handle = self
			.arena
			.insert(TxRxCounts::new(*addr, now))
			.map_err(|_| StoreError::CountsStoreFull)?;
		self.inuse.push_back(&mut self.arena, handle);
		self.index.insert(*addr, handle);
		debug!("created counts entry for {addr:02x?}");
		Ok(handle)
	}

	fn evict_oldest(&mut self) -> Result<(), StoreError> {
		let victim = self.inuse.iter(&self.arena).find(|&h| {
			self.arena
				.get(h)
				.is_some_and(|c| !c.flags.contains(CountsFlags::KEEP))
		});
		let Some(victim) = victim else {
			return Err(StoreError::CountsStoreFull);
		};
		self.remove(victim);
		Ok(())
	}

	pub fn remove(&mut self, handle: Handle) {
		let Some(counts) = self.arena.get(handle) else {
			return;
		};
		let addr = counts.addr;
		self.inuse.remove(&mut self.arena, handle);
		self.arena.remove(handle);
		self.index.remove(&addr);
	}

	/// Accounts one good reception from `addr`. Returns `true` when the
	/// frame is a duplicate (retry bit set, sequence unchanged); in that
	/// case only the `_total` counters moved.
	pub fn rx_process(
		&mut self,
		addr: &MacAddr,
		is_data: bool,
		length: u16,
		seq: u16,
		retry: bool,
		now: u64,
	) -> bool {
		let Ok(handle) = self.get_or_create(addr, now) else {
			return false;
		};
		// Warm entries move to the tail like the networks store.
		self.inuse.remove(&mut self.arena, handle);
		self.inuse.push_back(&mut self.arena, handle);

		let counts = self.arena.get_mut(handle).unwrap();
		counts.latest_txrx_timestamp = now;
		let duplicate = retry && counts.seq_valid && counts.rx_latest_seq == seq;
		counts.rx_latest_seq = seq;
		counts.seq_valid = true;

		let class = counts.class_mut(is_data);
		class.rx_num_packets_total += 1;
		class.rx_num_bytes_total += u64::from(length);
		if !duplicate {
			class.rx_num_packets += 1;
			class.rx_num_bytes += u64::from(length);
		}
		duplicate
	}

	/// Accounts one completed transmission towards `addr`.
	pub fn tx_process(
		&mut self,
		addr: &MacAddr,
		is_data: bool,
		length: u16,
		num_attempts: u16,
		success: bool,
		now: u64,
	) {
		let Ok(handle) = self.get_or_create(addr, now) else {
			return;
		};
		let counts = self.arena.get_mut(handle).unwrap();
		counts.latest_txrx_timestamp = now;
		let class = counts.class_mut(is_data);
		class.tx_num_packets_total += 1;
		class.tx_num_bytes_total += u64::from(length);
		class.tx_num_attempts += u64::from(num_attempts);
		if success {
			class.tx_num_packets_success += 1;
			class.tx_num_bytes_success += u64::from(length);
		}
	}

	/// Zeroes every counter without removing entries.
	pub fn zero_all(&mut self) {
		let handles: Vec<Handle> = self.inuse.iter(&self.arena).collect();
		for handle in handles {
			if let Some(counts) = self.arena.get_mut(handle) {
				counts.zero();
			}
		}
		info!("zeroed all txrx counts");
	}

	/// Removes every entry not flagged `KEEP`.
	pub fn reset(&mut self) {
		let victims: Vec<Handle> = self
			.inuse
			.iter(&self.arena)
			.filter(|&h| {
				self.arena
					.get(h)
					.is_some_and(|c| !c.flags.contains(CountsFlags::KEEP))
			})
			.collect();
		for handle in victims {
			self.remove(handle);
		}
	}

	/// Periodic sweep reclaiming idle, unpinned entries.
	pub fn timestamp_check(&mut self, now: u64) {
		let expired: Vec<Handle> = self
			.inuse
			.iter(&self.arena)
			.filter(|&h| {
				self.arena.get(h).is_some_and(|c| {
					!c.flags.contains(CountsFlags::KEEP)
						&& now.saturating_sub(c.latest_txrx_timestamp)
							> COUNTS_TXRX_TIMEOUT_USEC
				})
			})
			.collect();
		for handle in expired {
			self.remove(handle);
		}
	}
}

impl Default for CountsStore {
	fn default() -> Self {
		Self::new()
	}
}

//! Event log for post-hoc analysis.
//!
//! Entries are fixed-layout, 32-bit-aligned records with a 64-bit
//! timestamp as their first word, appended to a byte ring that a host
//! can map and drain. When the ring fills, the write cursor wraps and
//! the oldest entries are overwritten.

mod entries;

use alloc::vec;
use alloc::vec::Vec;

use log::trace;
use zerocopy::AsBytes;

pub use self::entries::{
	EntryType, NetworkInfoEntry, NodeInfoEntry, RxCommonEntry, StationInfoEntry,
	TemperatureEntry, TimeInfoEntry, TimeInfoReason, TxHighEntry, TxLowEntry, TxRxCountsEntry,
	ENTRY_HEADER_SIZE,
};

/// Ring buffer of log entries.
pub struct EventLog {
	buf: Vec<u8>,
	/// Next write offset.
	write: usize,
	/// Total entries ever appended.
	num_entries: u64,
	/// Total bytes ever appended (pre-wrap accounting).
	bytes_written: u64,
	wrapped: bool,
	enabled: bool,
}

impl EventLog {
	pub fn new(capacity: usize) -> Self {
		Self {
			buf: vec![0; capacity],
			write: 0,
			num_entries: 0,
			bytes_written: 0,
			wrapped: false,
			enabled: true,
		}
	}

	pub fn capacity(&self) -> usize {
		self.buf.len()
	}

	pub fn num_entries(&self) -> u64 {
		self.num_entries
	}

	pub fn bytes_written(&self) -> u64 {
		self.bytes_written
	}

	pub fn set_enabled(&mut self, enabled: bool) {
		self.enabled = enabled;
	}

	/// Discards the whole log.
	pub fn reset(&mut self) {
		self.write = 0;
		self.num_entries = 0;
		self.bytes_written = 0;
		self.wrapped = false;
	}

	/// Appends one fixed-layout entry. A record never straddles the
	/// wrap point: when it does not fit at the tail, the cursor wraps
	/// and the record lands at offset zero.
	pub fn append<T: AsBytes>(&mut self, entry_type: EntryType, entry: &T) {
		if !self.enabled {
			return;
		}
		let payload = entry.as_bytes();
		let record_len = ENTRY_HEADER_SIZE + payload.len();
		debug_assert!(record_len % 4 == 0);
		if record_len > self.buf.len() {
			return;
		}
		if self.write + record_len > self.buf.len() {
			self.write = 0;
			self.wrapped = true;
		}
		let header = entries::EntryHeader::new(entry_type, payload.len() as u16);
		self.buf[self.write..self.write + ENTRY_HEADER_SIZE].copy_from_slice(header.as_bytes());
		self.buf[self.write + ENTRY_HEADER_SIZE..self.write + record_len]
			.copy_from_slice(payload);
		self.write += record_len;
		self.num_entries += 1;
		self.bytes_written += record_len as u64;
		trace!("log entry {entry_type:?}, {record_len} bytes");
	}

	/// Raw byte extraction for the host surface. Returns the number of
	/// bytes copied.
	pub fn read(&self, offset: usize, out: &mut [u8]) -> usize {
		let end = if self.wrapped {
			self.buf.len()
		} else {
			self.write
		};
		if offset >= end {
			return 0;
		}
		let n = out.len().min(end - offset);
		out[..n].copy_from_slice(&self.buf[offset..offset + n]);
		n
	}

	/// Bytes currently held in the ring.
	pub fn size(&self) -> usize {
		if self.wrapped {
			self.buf.len()
		} else {
			self.write
		}
	}
}

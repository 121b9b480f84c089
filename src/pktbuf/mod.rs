//! Packet buffers shared with CPU-Low.
//!
//! A fixed set of Tx and Rx slots lives in memory both CPUs can reach.
//! Exclusive access to a slot is arbitrated by a per-slot hardware-style
//! mutex; acquiring it yields a typed guard through which the slot bytes
//! (frame info header, PHY header pad, MPDU) are read and written. The
//! state byte inside the frame info is advisory and is only ever written
//! by the current mutex holder.
//!
//! The byte layouts in [`layout`] are part of the CPU-Low ABI. Their
//! sizes are pinned by compile-time assertions; field offsets must never
//! change without a matching CPU-Low build.

mod layout;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, Ordering};

use zerocopy::FromBytes;

use crate::config::{
	MAX_PKT_SIZE_B, NUM_RX_PKT_BUFS, NUM_TX_PKT_BUFS, PHY_PKT_BUF_PHY_HDR_SIZE,
};
use crate::error::PktBufError;

pub use self::layout::{
	MacTxParams, PhyMode, PhyRxDetails, PhyTxParams, PktBufGroup, RxFlags, RxFrameInfo,
	RxPktBufState, TxFlags, TxFrameInfo, TxLowDetails, TxParams, TxPktBufState, TxQueueDetails,
	TxResult, RX_FRAME_INFO_SIZE, TX_FRAME_INFO_SIZE, TX_LOW_DETAILS_SIZE,
};

/// Mutex owner id used by this CPU.
pub const CPU_HIGH_MUTEX_ID: u32 = 1;
/// Mutex owner id used by the lower MAC.
pub const CPU_LOW_MUTEX_ID: u32 = 2;

/// Total size of one Tx slot: frame info, PHY header pad, MPDU area.
pub const TX_PKT_BUF_SIZE: usize = TX_FRAME_INFO_SIZE + PHY_PKT_BUF_PHY_HDR_SIZE + MAX_PKT_SIZE_B;
/// Total size of one Rx slot.
pub const RX_PKT_BUF_SIZE: usize = RX_FRAME_INFO_SIZE + PHY_PKT_BUF_PHY_HDR_SIZE + MAX_PKT_SIZE_B;

const UNLOCKED: u32 = 0;

struct SlotLock {
	owner: AtomicU32,
}

impl SlotLock {
	fn new() -> Self {
		Self {
			owner: AtomicU32::new(UNLOCKED),
		}
	}

	fn try_lock(&self, owner: u32) -> bool {
		self.owner
			.compare_exchange(UNLOCKED, owner, Ordering::Acquire, Ordering::Relaxed)
			.is_ok()
	}

	fn unlock(&self, owner: u32) -> bool {
		self.owner
			.compare_exchange(owner, UNLOCKED, Ordering::Release, Ordering::Relaxed)
			.is_ok()
	}

	fn status(&self) -> (bool, u32) {
		let owner = self.owner.load(Ordering::Relaxed);
		(owner != UNLOCKED, owner)
	}
}

/// The shared Tx/Rx packet-buffer pool.
///
/// Slot contents are only reachable through the guards returned by the
/// lock operations, so the `UnsafeCell` accesses are serialised by the
/// per-slot mutex.
pub struct PktBufPool {
	tx_locks: [SlotLock; NUM_TX_PKT_BUFS],
	rx_locks: [SlotLock; NUM_RX_PKT_BUFS],
	tx_slots: Box<[UnsafeCell<[u8; TX_PKT_BUF_SIZE]>]>,
	rx_slots: Box<[UnsafeCell<[u8; RX_PKT_BUF_SIZE]>]>,
}

unsafe impl Sync for PktBufPool {}
unsafe impl Send for PktBufPool {}

impl PktBufPool {
	pub fn new() -> Arc<Self> {
		let tx_slots: Vec<_> = (0..NUM_TX_PKT_BUFS)
			.map(|_| UnsafeCell::new([0u8; TX_PKT_BUF_SIZE]))
			.collect();
		let rx_slots: Vec<_> = (0..NUM_RX_PKT_BUFS)
			.map(|_| UnsafeCell::new([0u8; RX_PKT_BUF_SIZE]))
			.collect();
		Arc::new(Self {
			tx_locks: core::array::from_fn(|_| SlotLock::new()),
			rx_locks: core::array::from_fn(|_| SlotLock::new()),
			tx_slots: tx_slots.into_boxed_slice(),
			rx_slots: rx_slots.into_boxed_slice(),
		})
	}

	/// Boot-time cleanup: attempt to unlock every slot this CPU might
	/// still own after a soft reset. Failures are harmless.
	pub fn unlock_all(&self, owner: u32) {
		for i in 0..NUM_TX_PKT_BUFS {
			let _ = self.unlock_tx(i, owner);
		}
		for i in 0..NUM_RX_PKT_BUFS {
			let _ = self.unlock_rx(i, owner);
		}
	}

	pub fn try_lock_tx(&self, index: usize, owner: u32) -> Result<TxSlotGuard<'_>, PktBufError> {
		if index >= NUM_TX_PKT_BUFS {
			return Err(PktBufError::InvalidBuf(index));
		}
		if !self.tx_locks[index].try_lock(owner) {
			return Err(PktBufError::AlreadyLocked(index));
		}
		Ok(TxSlotGuard {
			pool: self,
			index,
			owner,
		})
	}

	pub fn try_lock_rx(&self, index: usize, owner: u32) -> Result<RxSlotGuard<'_>, PktBufError> {
		if index >= NUM_RX_PKT_BUFS {
			return Err(PktBufError::InvalidBuf(index));
		}
		if !self.rx_locks[index].try_lock(owner) {
			return Err(PktBufError::AlreadyLocked(index));
		}
		Ok(RxSlotGuard {
			pool: self,
			index,
			owner,
		})
	}

	pub fn unlock_tx(&self, index: usize, owner: u32) -> Result<(), PktBufError> {
		if index >= NUM_TX_PKT_BUFS {
			return Err(PktBufError::InvalidBuf(index));
		}
		if self.tx_locks[index].unlock(owner) {
			Ok(())
		} else {
			Err(PktBufError::NotLockOwner(index))
		}
	}

	pub fn unlock_rx(&self, index: usize, owner: u32) -> Result<(), PktBufError> {
		if index >= NUM_RX_PKT_BUFS {
			return Err(PktBufError::InvalidBuf(index));
		}
		if self.rx_locks[index].unlock(owner) {
			Ok(())
		} else {
			Err(PktBufError::NotLockOwner(index))
		}
	}

	pub fn status_tx(&self, index: usize) -> Result<(bool, u32), PktBufError> {
		if index >= NUM_TX_PKT_BUFS {
			return Err(PktBufError::InvalidBuf(index));
		}
		Ok(self.tx_locks[index].status())
	}

	pub fn status_rx(&self, index: usize) -> Result<(bool, u32), PktBufError> {
		if index >= NUM_RX_PKT_BUFS {
			return Err(PktBufError::InvalidBuf(index));
		}
		Ok(self.rx_locks[index].status())
	}
}

/// Exclusive view of a locked Tx slot. Dropping the guard releases the
/// mutex.
pub struct TxSlotGuard<'a> {
	pool: &'a PktBufPool,
	index: usize,
	owner: u32,
}

impl TxSlotGuard<'_> {
	pub fn index(&self) -> usize {
		self.index
	}

	pub fn bytes(&self) -> &[u8; TX_PKT_BUF_SIZE] {
		unsafe { &*self.pool.tx_slots[self.index].get() }
	}

	pub fn bytes_mut(&mut self) -> &mut [u8; TX_PKT_BUF_SIZE] {
		unsafe { &mut *self.pool.tx_slots[self.index].get() }
	}

	pub fn frame_info(&self) -> &TxFrameInfo {
		TxFrameInfo::ref_from_prefix(self.bytes().as_slice()).unwrap()
	}

	pub fn frame_info_mut(&mut self) -> &mut TxFrameInfo {
		TxFrameInfo::mut_from_prefix(self.bytes_mut().as_mut_slice()).unwrap()
	}

	/// The MPDU area (after the frame info and the PHY header pad).
	pub fn mpdu(&self) -> &[u8] {
		&self.bytes()[TX_FRAME_INFO_SIZE + PHY_PKT_BUF_PHY_HDR_SIZE..]
	}

	pub fn mpdu_mut(&mut self) -> &mut [u8] {
		&mut self.bytes_mut()[TX_FRAME_INFO_SIZE + PHY_PKT_BUF_PHY_HDR_SIZE..]
	}
}

impl Drop for TxSlotGuard<'_> {
	fn drop(&mut self) {
		let _ = self.pool.tx_locks[self.index].unlock(self.owner);
	}
}

/// Exclusive view of a locked Rx slot.
pub struct RxSlotGuard<'a> {
	pool: &'a PktBufPool,
	index: usize,
	owner: u32,
}

impl RxSlotGuard<'_> {
	pub fn index(&self) -> usize {
		self.index
	}

	pub fn bytes(&self) -> &[u8; RX_PKT_BUF_SIZE] {
		unsafe { &*self.pool.rx_slots[self.index].get() }
	}

	pub fn bytes_mut(&mut self) -> &mut [u8; RX_PKT_BUF_SIZE] {
		unsafe { &mut *self.pool.rx_slots[self.index].get() }
	}

	pub fn frame_info(&self) -> &RxFrameInfo {
		RxFrameInfo::ref_from_prefix(self.bytes().as_slice()).unwrap()
	}

	pub fn frame_info_mut(&mut self) -> &mut RxFrameInfo {
		RxFrameInfo::mut_from_prefix(self.bytes_mut().as_mut_slice()).unwrap()
	}

	/// The received MPDU, trimmed to the PHY-reported length.
	pub fn mpdu(&self) -> &[u8] {
		let len = (self.frame_info().phy_details.length.get() as usize).min(MAX_PKT_SIZE_B);
		let start = RX_FRAME_INFO_SIZE + PHY_PKT_BUF_PHY_HDR_SIZE;
		&self.bytes()[start..start + len]
	}

	pub fn mpdu_mut(&mut self) -> &mut [u8] {
		&mut self.bytes_mut()[RX_FRAME_INFO_SIZE + PHY_PKT_BUF_PHY_HDR_SIZE..]
	}
}

impl Drop for RxSlotGuard<'_> {
	fn drop(&mut self) {
		let _ = self.pool.rx_locks[self.index].unlock(self.owner);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use zerocopy::FromBytes;

	#[test]
	fn lock_exclusion() {
		let pool = PktBufPool::new();
		let guard = pool.try_lock_tx(0, CPU_HIGH_MUTEX_ID).unwrap();
		assert_eq!(
			pool.try_lock_tx(0, CPU_LOW_MUTEX_ID).err(),
			Some(PktBufError::AlreadyLocked(0))
		);
		assert_eq!(pool.status_tx(0).unwrap(), (true, CPU_HIGH_MUTEX_ID));
		drop(guard);
		assert_eq!(pool.status_tx(0).unwrap(), (false, 0));
		let _ = pool.try_lock_tx(0, CPU_LOW_MUTEX_ID).unwrap();
	}

	#[test]
	fn invalid_index() {
		let pool = PktBufPool::new();
		assert_eq!(
			pool.try_lock_tx(NUM_TX_PKT_BUFS, CPU_HIGH_MUTEX_ID).err(),
			Some(PktBufError::InvalidBuf(NUM_TX_PKT_BUFS))
		);
		assert_eq!(
			pool.unlock_rx(99, CPU_HIGH_MUTEX_ID).err(),
			Some(PktBufError::InvalidBuf(99))
		);
	}

	#[test]
	fn unlock_owner_check() {
		let pool = PktBufPool::new();
		let guard = pool.try_lock_rx(1, CPU_LOW_MUTEX_ID).unwrap();
		// The pool-level unlock enforces ownership.
		assert_eq!(
			pool.unlock_rx(1, CPU_HIGH_MUTEX_ID).err(),
			Some(PktBufError::NotLockOwner(1))
		);
		drop(guard);
		assert_eq!(pool.status_rx(1).unwrap().0, false);
	}

	#[test]
	fn frame_info_is_slot_prefix() {
		let pool = PktBufPool::new();
		let mut guard = pool.try_lock_tx(3, CPU_HIGH_MUTEX_ID).unwrap();
		guard.frame_info_mut().length.set(1234);
		guard.frame_info_mut().set_state(TxPktBufState::Ready);
		drop(guard);

		let guard = pool.try_lock_tx(3, CPU_LOW_MUTEX_ID).unwrap();
		let info = TxFrameInfo::ref_from_prefix(guard.bytes().as_slice()).unwrap();
		assert_eq!(info.length.get(), 1234);
		assert_eq!(info.state(), Some(TxPktBufState::Ready));
	}
}

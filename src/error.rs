//! Crate-wide error types.
//!
//! Every recoverable failure is typed; callers either propagate with `?`
//! or log and continue, matching the local-recovery policy of the design.

use thiserror::Error;

/// Errors of the packet-buffer mutex protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PktBufError {
	/// The slot index is outside the pool.
	#[error("invalid packet buffer index {0}")]
	InvalidBuf(usize),
	/// The try-lock lost against the other CPU.
	#[error("packet buffer {0} already locked")]
	AlreadyLocked(usize),
	/// Unlock attempted by a CPU that does not hold the mutex.
	#[error("packet buffer {0} not owned by caller")]
	NotLockOwner(usize),
}

/// Errors of the Tx queue framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
	/// The free pool has no element left.
	#[error("tx queue free pool exhausted")]
	Exhausted,
	/// A queue id that was never created.
	#[error("unknown queue id {0}")]
	UnknownQueue(u16),
	/// The target queue is at its occupancy cap.
	#[error("queue {0} full")]
	QueueFull(u16),
}

/// Capacity failures of the bounded directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
	#[error("network directory full and no evictable entry")]
	NetworkStoreFull,
	#[error("station directory full")]
	StationStoreFull,
	#[error("counts directory full")]
	CountsStoreFull,
	#[error("duplicate entry")]
	Duplicate,
	#[error("no free station id")]
	NoFreeId,
}

/// Join failures surfaced to the caller of the join FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JoinError {
	#[error("join timed out without finding the network")]
	Timeout,
	/// Authentication rejected; carries the 802.11 status code.
	#[error("authentication rejected with status {0}")]
	AuthReject(u16),
	/// Association rejected; carries the 802.11 status code.
	#[error("association rejected with status {0}")]
	AssocReject(u16),
}

/// Top-level error of the MAC context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MacError {
	#[error(transparent)]
	PktBuf(#[from] PktBufError),
	#[error(transparent)]
	Queue(#[from] QueueError),
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error(transparent)]
	Join(#[from] JoinError),
	/// CPU-Low reported an exception. This is the only fatal path: the
	/// embedder must halt and surface the code on user I/O.
	#[error("CPU-Low exception {0:#x}")]
	CpuLowException(u32),
	/// A frame arrived that no builder/parser of this crate covers.
	#[error("unsupported frame")]
	UnsupportedFrame,
	/// The mailbox to CPU-Low is full.
	#[error("mailbox full")]
	MailboxFull,
}

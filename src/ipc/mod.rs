//! Typed mailbox between CPU-High and CPU-Low.
//!
//! The hardware mailbox of the reference platform carries length-prefixed
//! word messages; here each message is a typed value on a bounded FIFO
//! channel. Ordering per direction is strict FIFO, which is what the
//! packet-buffer handshake relies on: `TX_READY` for a slot is never
//! reordered against the matching `TX_DONE`, and Rx buffer notifications
//! arrive in the order CPU-Low completed the receptions.

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use smallvec::SmallVec;

use crate::error::MacError;
use crate::pktbuf::{TxLowDetails, TxParams};
use crate::synch::Spinlock;
use crate::MacAddr;

/// Message ids on the mailbox. The discriminants are the wire ids of the
/// word-based transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum IpcMsgId {
	TxReady = 0x01,
	TxDone = 0x02,
	RxReady = 0x03,
	CpuStatus = 0x04,
	ConfigChannel = 0x10,
	ConfigTxParams = 0x11,
	ConfigRxAntMode = 0x12,
	ConfigTxCtrlPower = 0x13,
	ConfigRxFilter = 0x14,
	ConfigBeaconTxRx = 0x15,
	SetMacAddr = 0x16,
	TimeUpdate = 0x20,
}

/// How a time-update message changes the MAC time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUpdate {
	/// Overwrite the MAC time.
	Set(u64),
	/// Apply a signed delta to the MAC time.
	Delta(i64),
}

/// Channel specification: primary channel plus bandwidth type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChanSpec {
	pub chan_pri: u8,
	pub chan_type: ChanType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ChanType {
	#[default]
	Bw20 = 0,
	Bw40SecBelow = 1,
	Bw40SecAbove = 2,
}

impl ChanSpec {
	pub const fn bw20(chan: u8) -> Self {
		Self {
			chan_pri: chan,
			chan_type: ChanType::Bw20,
		}
	}
}

bitflags::bitflags! {
	/// Rx filter handed to CPU-Low: which receptions are passed up.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct RxFilter: u32 {
		/// Pass frames with good FCS only.
		const FCS_GOOD = 0x0001;
		/// Pass all frames regardless of FCS.
		const FCS_ALL = 0x0002;
		/// Pass only frames addressed to this node.
		const HDR_ADDR_MATCH_MPDU = 0x0100;
		/// Pass all data and management frames.
		const HDR_ALL_MPDU = 0x0200;
		/// Pass everything, including control frames.
		const HDR_ALL = 0x0400;
	}
}

/// Beacon Tx/Rx configuration pushed down to CPU-Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconTxRxConfig {
	/// How MAC time follows received beacons.
	pub ts_update_mode: MacTimeUpdateMode,
	/// BSSID receptions are matched against.
	pub bssid_match: MacAddr,
	/// Beacon interval in TU.
	pub beacon_interval_tu: u16,
	/// DTIM period in beacon intervals.
	pub dtim_period: u8,
}

/// MAC-time update policy on beacon reception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum MacTimeUpdateMode {
	#[default]
	Never = 0,
	Always = 1,
	/// Only update when the received timestamp is in the future
	/// (IBSS rule: only the earlier-TSF station defers).
	FutureOnly = 2,
}

/// One mailbox message.
#[derive(Debug, Clone)]
pub enum IpcMessage {
	/// A Tx packet buffer is staged and ready for transmission.
	TxReady { pkt_buf: u8 },
	/// CPU-Low completed a transmission; per-attempt details follow.
	TxDone {
		pkt_buf: u8,
		details: SmallVec<[TxLowDetails; 2]>,
	},
	/// CPU-Low filled an Rx packet buffer.
	RxReady { pkt_buf: u8 },
	/// CPU-Low status word; see [`cpu_status`].
	CpuStatus { status: u32 },
	ConfigChannel { chan: ChanSpec },
	ConfigTxParams { params: TxParams },
	ConfigRxAntMode { mode: u8 },
	ConfigTxCtrlPower { power_dbm: i8 },
	ConfigRxFilter { filter: RxFilter },
	ConfigBeaconTxRx { config: BeaconTxRxConfig },
	SetMacAddr { addr: MacAddr },
	TimeUpdate { update: TimeUpdate },
}

impl IpcMessage {
	pub fn id(&self) -> IpcMsgId {
		match self {
			IpcMessage::TxReady { .. } => IpcMsgId::TxReady,
			IpcMessage::TxDone { .. } => IpcMsgId::TxDone,
			IpcMessage::RxReady { .. } => IpcMsgId::RxReady,
			IpcMessage::CpuStatus { .. } => IpcMsgId::CpuStatus,
			IpcMessage::ConfigChannel { .. } => IpcMsgId::ConfigChannel,
			IpcMessage::ConfigTxParams { .. } => IpcMsgId::ConfigTxParams,
			IpcMessage::ConfigRxAntMode { .. } => IpcMsgId::ConfigRxAntMode,
			IpcMessage::ConfigTxCtrlPower { .. } => IpcMsgId::ConfigTxCtrlPower,
			IpcMessage::ConfigRxFilter { .. } => IpcMsgId::ConfigRxFilter,
			IpcMessage::ConfigBeaconTxRx { .. } => IpcMsgId::ConfigBeaconTxRx,
			IpcMessage::SetMacAddr { .. } => IpcMsgId::SetMacAddr,
			IpcMessage::TimeUpdate { .. } => IpcMsgId::TimeUpdate,
		}
	}
}

/// CPU-Low status word decoding.
pub mod cpu_status {
	/// CPU-Low finished booting.
	pub const INITIALIZED: u32 = 0x0000_0001;
	/// CPU-Low hit an unrecoverable exception; the low 16 bits of the
	/// status word carry the error code.
	pub const EXCEPTION: u32 = 0x8000_0000;

	pub fn exception_code(status: u32) -> u32 {
		status & 0xffff
	}
}

/// One direction of the mailbox.
struct Channel {
	queue: Spinlock<VecDeque<IpcMessage>>,
	capacity: usize,
}

impl Channel {
	fn new(capacity: usize) -> Arc<Self> {
		Arc::new(Self {
			queue: Spinlock::new(VecDeque::with_capacity(capacity)),
			capacity,
		})
	}
}

/// One endpoint of the bidirectional mailbox.
pub struct MailboxEndpoint {
	tx: Arc<Channel>,
	rx: Arc<Channel>,
}

impl MailboxEndpoint {
	/// Creates a connected endpoint pair (CPU-High side, CPU-Low side).
	pub fn pair(capacity: usize) -> (MailboxEndpoint, MailboxEndpoint) {
		let a = Channel::new(capacity);
		let b = Channel::new(capacity);
		(
			MailboxEndpoint {
				tx: a.clone(),
				rx: b.clone(),
			},
			MailboxEndpoint { tx: b, rx: a },
		)
	}

	pub fn send(&self, msg: IpcMessage) -> Result<(), MacError> {
		let mut queue = self.tx.queue.lock();
		if queue.len() >= self.tx.capacity {
			return Err(MacError::MailboxFull);
		}
		queue.push_back(msg);
		Ok(())
	}

	pub fn recv(&self) -> Option<IpcMessage> {
		self.rx.queue.lock().pop_front()
	}

	pub fn pending(&self) -> usize {
		self.rx.queue.lock().len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fifo_order_per_direction() {
		let (high, low) = MailboxEndpoint::pair(8);
		high.send(IpcMessage::TxReady { pkt_buf: 1 }).unwrap();
		high.send(IpcMessage::TxReady { pkt_buf: 2 }).unwrap();
		assert!(matches!(
			low.recv(),
			Some(IpcMessage::TxReady { pkt_buf: 1 })
		));
		assert!(matches!(
			low.recv(),
			Some(IpcMessage::TxReady { pkt_buf: 2 })
		));
		assert!(low.recv().is_none());
	}

	#[test]
	fn bounded() {
		let (high, _low) = MailboxEndpoint::pair(1);
		high.send(IpcMessage::RxReady { pkt_buf: 0 }).unwrap();
		assert_eq!(
			high.send(IpcMessage::RxReady { pkt_buf: 1 }).err(),
			Some(MacError::MailboxFull)
		);
	}

	#[test]
	fn exception_code_extraction() {
		let status = cpu_status::EXCEPTION | 0x1234;
		assert_ne!(status & cpu_status::EXCEPTION, 0);
		assert_eq!(cpu_status::exception_code(status), 0x1234);
	}
}

//! Byte layouts shared with CPU-Low.
//!
//! All multi-byte fields are little-endian and unaligned so the structs
//! have no padding; the compile-time size assertions at the bottom pin
//! the ABI.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use zerocopy::byteorder::{LittleEndian, I16, U16, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

type U16le = U16<LittleEndian>;
type U32le = U32<LittleEndian>;
type U64le = U64<LittleEndian>;
type I16le = I16<LittleEndian>;

/// State of a Tx packet buffer. CPU-High owns the slot in `HighCtrl`,
/// `Ready` and `Done`; CPU-Low owns it in `LowCtrl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TxPktBufState {
	Uninitialized = 0,
	HighCtrl = 1,
	Ready = 2,
	LowCtrl = 3,
	Done = 4,
}

/// State of an Rx packet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum RxPktBufState {
	Uninitialized = 0,
	HighCtrl = 1,
	Ready = 2,
	LowCtrl = 3,
}

/// Packet-buffer group a queued frame belongs to. DTIM-deferred
/// multicast is released by CPU-Low only at DTIM TBTTs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PktBufGroup {
	General = 0,
	DtimMcast = 1,
	Other = 0xff,
}

/// Modulation family of a waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PhyMode {
	Dsss = 0,
	NonHt = 1,
	Htmf = 2,
}

/// Result byte reported by CPU-Low for a completed transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TxResult {
	Success = 0,
	Failure = 1,
}

bitflags! {
	/// Flags en/disabling operations of the lower MAC for one frame.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct TxFlags: u8 {
		/// CPU-Low stamps the TSF into the frame body at Tx time.
		const FILL_TIMESTAMP = 0x01;
		/// CPU-Low computes and fills the duration field.
		const FILL_DURATION = 0x02;
		/// Request a timeout (ACK expected).
		const REQ_TO = 0x04;
		/// Request a fresh backoff before transmission.
		const REQ_BO = 0x08;
		/// CPU-Low drops the frame if its TBTT has already passed.
		const AUTOCANCEL = 0x10;
		/// CPU-Low overwrites the MAC sequence number from the unique
		/// sequence counter.
		const FILL_UNIQ_SEQ = 0x20;
	}
}

bitflags! {
	/// Flags recorded by CPU-Low for one reception.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct RxFlags: u8 {
		const FCS_GOOD = 0x01;
		const DUPLICATE = 0x02;
		/// CPU-Low formed and transmitted a control response (ACK/CTS).
		const RESPONSE_TX = 0x04;
		const CHAN_EST_VALID = 0x08;
	}
}

/// PHY parameters of one transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct PhyTxParams {
	/// MCS index.
	pub mcs: u8,
	/// PHY mode selection, one of [`PhyMode`].
	pub phy_mode: u8,
	/// Tx antenna selection.
	pub antenna_mode: u8,
	/// Tx power in dBm.
	pub power: i8,
}

/// Lower-MAC parameters of one transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct MacTxParams {
	/// [`TxFlags`] bits.
	pub flags: u8,
	pub reserved: [u8; 3],
}

/// Combined Tx parameters handed to CPU-Low with every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct TxParams {
	pub phy: PhyTxParams,
	pub mac: MacTxParams,
}

impl TxParams {
	pub const fn new(mcs: u8, phy_mode: PhyMode, antenna_mode: u8, power: i8) -> Self {
		Self {
			phy: PhyTxParams {
				mcs,
				phy_mode: phy_mode as u8,
				antenna_mode,
				power,
			},
			mac: MacTxParams {
				flags: 0,
				reserved: [0; 3],
			},
		}
	}
}

/// Information about the Tx queue a frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct TxQueueDetails {
	/// Queue id.
	pub id: u8,
	/// [`PktBufGroup`] byte.
	pub pkt_buf_group: u8,
	/// Queue occupancy when the frame was enqueued (including itself).
	pub occupancy: U16le,
}

/// Header of every Tx packet buffer, shared with CPU-Low.
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct TxFrameInfo {
	/// MAC time of packet creation.
	pub timestamp_create: U64le,
	/// Microseconds from creation to acceptance by CPU-Low.
	pub timestamp_accept: U64le,
	/// Microseconds from acceptance to Tx completion.
	pub timestamp_done: U64le,
	/// Unique sequence number; the 12 LSB become the 802.11 sequence.
	pub unique_seq: U64le,
	pub queue_info: TxQueueDetails,
	/// Number of transmission attempts performed.
	pub num_tx_attempts: U16le,
	/// [`TxResult`] byte, written by CPU-Low.
	pub tx_result: u8,
	pub reserved0: u8,
	/// [`TxPktBufState`] byte; written only by the mutex holder.
	pub tx_pkt_buf_state: u8,
	/// [`TxFlags`] bits.
	pub flags: u8,
	/// PHY sampling rate (MSps).
	pub phy_samp_rate: u8,
	pub padding0: u8,
	/// MPDU length in bytes including MAC header and FCS.
	pub length: U16le,
	/// Station id of the addressee, 0 if none.
	pub station_id: U16le,
	pub params: TxParams,
}

impl TxFrameInfo {
	pub fn state(&self) -> Option<TxPktBufState> {
		TxPktBufState::try_from(self.tx_pkt_buf_state).ok()
	}

	pub fn set_state(&mut self, state: TxPktBufState) {
		self.tx_pkt_buf_state = state.into();
	}

	pub fn tx_flags(&self) -> TxFlags {
		TxFlags::from_bits_truncate(self.flags)
	}
}

/// Per-attempt metadata recorded by CPU-Low for one transmission.
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct TxLowDetails {
	pub tx_start_timestamp_mpdu: U64le,
	pub tx_start_timestamp_ctrl: U64le,
	pub phy_params_mpdu: PhyTxParams,
	pub phy_params_ctrl: PhyTxParams,
	pub tx_details_type: u8,
	pub chan_num: u8,
	pub duration: U16le,
	pub num_slots: I16le,
	pub cw: U16le,
	pub tx_start_timestamp_frac_mpdu: u8,
	pub tx_start_timestamp_frac_ctrl: u8,
	/// Short retry count at this attempt.
	pub src: u8,
	/// Long retry count at this attempt.
	pub lrc: u8,
	pub ssrc: U16le,
	pub slrc: U16le,
	pub flags: u8,
	pub reserved: u8,
	pub attempt_number: U16le,
}

/// Per-attempt Tx detail kinds reported by CPU-Low.
pub mod tx_details_type {
	pub const MPDU: u8 = 0;
	pub const RTS_ONLY: u8 = 1;
	pub const RTS_MPDU: u8 = 2;
	pub const CTS: u8 = 3;
	pub const ACK: u8 = 4;
}

/// PHY reception details filled in by CPU-Low.
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct PhyRxDetails {
	pub mcs: u8,
	/// [`PhyMode`] byte.
	pub phy_mode: u8,
	pub reserved: [u8; 2],
	/// MPDU length in bytes.
	pub length: U16le,
	/// Data bits per OFDM symbol; computed once in CPU-Low.
	pub n_dbps: U16le,
}

/// Header of every Rx packet buffer, shared with CPU-Low.
#[derive(Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct RxFrameInfo {
	/// [`RxFlags`] bits.
	pub flags: u8,
	/// Rx antenna selection.
	pub ant_mode: u8,
	/// Rx power in dBm.
	pub rx_power: i8,
	/// Rx gain index; interpretation is radio-specific.
	pub rx_gain_index: u8,
	/// Channel index the radio was tuned to.
	pub channel: u8,
	/// [`RxPktBufState`] byte; written only by the mutex holder.
	pub rx_pkt_buf_state: u8,
	pub reserved0: U16le,
	/// Carrier frequency offset estimate.
	pub cfo_est: U32le,
	pub reserved1: U32le,
	pub phy_details: PhyRxDetails,
	/// Fractional timestamp beyond the microsecond timestamp.
	pub timestamp_frac: u8,
	pub phy_samp_rate: u8,
	pub reserved2: [u8; 2],
	pub additional_info: U32le,
	/// Details of the control response (ACK/CTS) the low MAC emitted.
	pub resp_low_tx_details: TxLowDetails,
	pub reserved3: U32le,
	/// MAC time at reception.
	pub timestamp: U64le,
	/// Rx PHY channel estimates.
	pub channel_est: [U32le; 64],
}

impl RxFrameInfo {
	pub fn state(&self) -> Option<RxPktBufState> {
		RxPktBufState::try_from(self.rx_pkt_buf_state).ok()
	}

	pub fn set_state(&mut self, state: RxPktBufState) {
		self.rx_pkt_buf_state = state.into();
	}

	pub fn rx_flags(&self) -> RxFlags {
		RxFlags::from_bits_truncate(self.flags)
	}

	pub fn phy_mode(&self) -> Option<PhyMode> {
		PhyMode::try_from(self.phy_details.phy_mode).ok()
	}
}

pub const TX_FRAME_INFO_SIZE: usize = 56;
pub const TX_LOW_DETAILS_SIZE: usize = 44;
pub const RX_FRAME_INFO_SIZE: usize = 344;

const _: () = assert!(core::mem::size_of::<TxParams>() == 8);
const _: () = assert!(core::mem::size_of::<TxQueueDetails>() == 4);
const _: () = assert!(core::mem::size_of::<TxFrameInfo>() == TX_FRAME_INFO_SIZE);
const _: () = assert!(core::mem::size_of::<TxLowDetails>() == TX_LOW_DETAILS_SIZE);
const _: () = assert!(core::mem::size_of::<PhyRxDetails>() == 8);
const _: () = assert!(core::mem::size_of::<RxFrameInfo>() == RX_FRAME_INFO_SIZE);

#[cfg(test)]
mod tests {
	use super::*;
	use zerocopy::AsBytes;

	#[test]
	fn tx_frame_info_roundtrip() {
		let mut info = TxFrameInfo::new_zeroed();
		info.unique_seq.set(0x1234_5678_9abc_def0);
		info.length.set(512);
		info.set_state(TxPktBufState::LowCtrl);
		info.params = TxParams::new(7, PhyMode::Htmf, 1, 15);

		let bytes = info.as_bytes();
		let back = TxFrameInfo::ref_from(bytes).unwrap();
		assert_eq!(back.unique_seq.get(), 0x1234_5678_9abc_def0);
		assert_eq!(back.length.get(), 512);
		assert_eq!(back.state(), Some(TxPktBufState::LowCtrl));
		assert_eq!(back.params.phy.mcs, 7);
	}

	#[test]
	fn state_byte_offset_matches_abi() {
		// CPU-Low pokes the state byte directly at offset 40.
		let mut info = TxFrameInfo::new_zeroed();
		info.set_state(TxPktBufState::Done);
		assert_eq!(info.as_bytes()[40], TxPktBufState::Done as u8);
	}
}

//! Log entry layouts.
//!
//! The type codes are part of the host tooling ABI. Every entry starts
//! with a 64-bit timestamp and is a multiple of 32 bits long.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use zerocopy::byteorder::{LittleEndian, U16, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

type U16le = U16<LittleEndian>;
type U32le = U32<LittleEndian>;
type U64le = U64<LittleEndian>;

/// Entry type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum EntryType {
	NodeInfo = 1,
	StationInfo = 3,
	Temperature = 4,
	TimeInfo = 6,
	NetworkInfo = 7,
	RxOfdm = 10,
	RxOfdmLtg = 11,
	RxDsss = 15,
	TxHigh = 20,
	TxHighLtg = 21,
	TxLow = 25,
	TxLowLtg = 26,
	TxRxCounts = 30,
}

/// Why a time-info entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum TimeInfoReason {
	System = 0,
	SetTime = 1,
	AddLog = 2,
}

/// Header prefixed to every record in the ring.
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct EntryHeader {
	pub entry_type: U16le,
	pub entry_length: U16le,
}

pub const ENTRY_HEADER_SIZE: usize = 4;

impl EntryHeader {
	pub fn new(entry_type: EntryType, entry_length: u16) -> Self {
		Self {
			entry_type: U16le::new(entry_type as u16),
			entry_length: U16le::new(entry_length),
		}
	}
}

/// Identity of the node, written once at boot.
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct NodeInfoEntry {
	pub timestamp: U64le,
	pub node_role: U32le,
	pub serial_number: U32le,
	pub fpga_dna: [U32le; 2],
	pub wlan_addr: [u8; 6],
	pub padding: [u8; 2],
	pub version: U32le,
}

/// MAC/system/host time correlation record.
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct TimeInfoEntry {
	/// MAC time in the old timebase.
	pub timestamp: U64le,
	pub time_id: U32le,
	/// [`TimeInfoReason`] word.
	pub reason: U32le,
	/// MAC time in the new timebase.
	pub mac_timestamp: U64le,
	pub system_timestamp: U64le,
	/// All-ones when the host time is unknown.
	pub host_timestamp: U64le,
}

#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct TemperatureEntry {
	pub timestamp: U64le,
	pub temp_current: U32le,
	pub temp_min: U32le,
	pub temp_max: U32le,
	pub padding: U32le,
}

/// Snapshot of one station record.
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct StationInfoEntry {
	pub timestamp: U64le,
	pub addr: [u8; 6],
	pub id: U16le,
	pub flags: U32le,
	pub latest_rx_timestamp: U64le,
	pub latest_rx_seq: U16le,
	pub padding: U16le,
}

/// Snapshot of one network record.
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct NetworkInfoEntry {
	pub timestamp: U64le,
	pub bssid: [u8; 6],
	pub channel: u8,
	pub state: u8,
	pub ssid: [u8; 32],
	pub beacon_interval_tu: U16le,
	pub capabilities: U16le,
}

/// Mirror of one frame-class counter block.
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct FrameCountsRaw {
	pub rx_num_bytes: U64le,
	pub rx_num_bytes_total: U64le,
	pub tx_num_bytes_success: U64le,
	pub tx_num_bytes_total: U64le,
	pub rx_num_packets: U32le,
	pub rx_num_packets_total: U32le,
	pub tx_num_packets_success: U32le,
	pub tx_num_packets_total: U32le,
	pub tx_num_attempts: U64le,
}

/// Snapshot of one counts record.
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct TxRxCountsEntry {
	pub timestamp: U64le,
	pub addr: [u8; 6],
	pub padding: [u8; 2],
	pub data: FrameCountsRaw,
	pub mgmt: FrameCountsRaw,
}

/// One reception (both OFDM and DSSS shapes).
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct RxCommonEntry {
	pub timestamp: U64le,
	/// Additional fractional timestamp in PHY clock units.
	pub timestamp_frac: u8,
	pub phy_samp_rate: u8,
	pub chan_num: u8,
	pub mcs: u8,
	pub phy_mode: u8,
	pub ant_mode: u8,
	pub rx_power: i8,
	/// Rx packet-buffer flag bits (FCS, duplicate, response formed).
	pub flags: u8,
	pub length: U16le,
	pub seq: U16le,
	pub frame_control_1: u8,
	pub frame_control_2: u8,
	pub padding: [u8; 2],
	pub addr2: [u8; 6],
	pub padding2: [u8; 2],
}

/// One completed high-level transmission.
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct TxHighEntry {
	pub timestamp_create: U64le,
	/// Microseconds from creation to CPU-Low acceptance.
	pub delay_accept: U32le,
	/// Microseconds from acceptance to completion.
	pub delay_done: U32le,
	pub unique_seq: U64le,
	pub num_tx_attempts: U16le,
	pub length: U16le,
	pub tx_result: u8,
	pub chan_num: u8,
	pub mcs: u8,
	pub phy_mode: u8,
	pub ant_mode: u8,
	pub power: i8,
	pub flags: u8,
	pub queue_id: u8,
	pub addr1: [u8; 6],
	pub padding: [u8; 2],
}

/// One low-level transmission attempt.
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct TxLowEntry {
	pub timestamp_send: U64le,
	pub unique_seq: U64le,
	pub attempt_number: U16le,
	pub length: U16le,
	pub mcs: u8,
	pub phy_mode: u8,
	pub ant_mode: u8,
	pub power: i8,
	pub flags: u8,
	pub pkt_type: u8,
	pub chan_num: u8,
	pub timestamp_send_frac: u8,
	pub num_slots: U16le,
	pub cw: U16le,
}

const _: () = assert!(core::mem::size_of::<EntryHeader>() == ENTRY_HEADER_SIZE);
const _: () = assert!(core::mem::size_of::<TimeInfoEntry>() % 4 == 0);
const _: () = assert!(core::mem::size_of::<NodeInfoEntry>() % 4 == 0);
const _: () = assert!(core::mem::size_of::<TemperatureEntry>() % 4 == 0);
const _: () = assert!(core::mem::size_of::<StationInfoEntry>() % 4 == 0);
const _: () = assert!(core::mem::size_of::<NetworkInfoEntry>() % 4 == 0);
const _: () = assert!(core::mem::size_of::<FrameCountsRaw>() == 56);
const _: () = assert!(core::mem::size_of::<TxRxCountsEntry>() % 4 == 0);
const _: () = assert!(core::mem::size_of::<RxCommonEntry>() % 4 == 0);
const _: () = assert!(core::mem::size_of::<TxHighEntry>() % 4 == 0);
const _: () = assert!(core::mem::size_of::<TxLowEntry>() % 4 == 0);

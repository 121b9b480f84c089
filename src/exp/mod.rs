//! Host command surface.
//!
//! Experiment hosts drive a node with framed commands: a big-endian
//! command header (24-bit command id qualified by a group byte) followed
//! by a little-endian payload of 32-bit words. Responses echo the
//! command id and lead with a status word. Long outputs (station lists,
//! log reads) are chunked by the caller re-issuing the command with an
//! offset.

use alloc::vec::Vec;

use log::{debug, warn};
use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::eventlog::{EntryType, NetworkInfoEntry, StationInfoEntry, TxRxCountsEntry};
use crate::ltg::{LtgPayload, LtgSchedule, LtgStop};
use crate::mac_high::MacHigh;
use crate::MacAddr;

type U16be = U16<BigEndian>;
type U32be = U32<BigEndian>;

/// Response status words.
pub const STATUS_SUCCESS: u32 = 0;
pub const STATUS_ERROR: u32 = 0xff00_0000;

/// Command groups (the high byte of the command word).
pub mod group {
	pub const NODE: u8 = 0x00;
	pub const LOG: u8 = 0x03;
	pub const COUNTS: u8 = 0x04;
	pub const LTG: u8 = 0x05;
	pub const STATION: u8 = 0x06;
	pub const SCAN: u8 = 0x07;
	pub const JOIN: u8 = 0x08;
}

/// Group-qualified command ids (group byte in bits 31:24).
pub mod cmd {
	pub const NODE_RESET_STATE: u32 = 0x00_0001;
	pub const NODE_TIME: u32 = 0x00_0002;
	pub const NODE_CHANNEL: u32 = 0x00_0003;
	pub const NODE_TX_POWER: u32 = 0x00_0004;
	pub const NODE_TX_RATE: u32 = 0x00_0005;

	pub const LOG_GET_CAPACITY: u32 = 0x03_0001;
	pub const LOG_READ: u32 = 0x03_0002;
	pub const LOG_RESET: u32 = 0x03_0003;

	pub const COUNTS_GET_TXRX: u32 = 0x04_0001;
	pub const COUNTS_ZERO_ALL: u32 = 0x04_0002;

	pub const LTG_CONFIG: u32 = 0x05_0001;
	pub const LTG_START: u32 = 0x05_0002;
	pub const LTG_STOP: u32 = 0x05_0003;
	pub const LTG_REMOVE: u32 = 0x05_0004;

	pub const STATION_INFO_LIST: u32 = 0x06_0001;
	pub const NETWORK_INFO_LIST: u32 = 0x06_0002;

	pub const SCAN_START: u32 = 0x07_0001;
	pub const SCAN_STOP: u32 = 0x07_0002;

	pub const JOIN_START: u32 = 0x08_0001;
}

/// Command and response framing header.
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct CmdHeader {
	/// Group byte in bits 31:24, command id in bits 23:0.
	pub cmd: U32be,
	/// Payload length in bytes.
	pub length: U16be,
	/// Number of 32-bit arguments in the payload.
	pub num_args: U16be,
}

pub const CMD_HEADER_SIZE: usize = 8;
const _: () = assert!(core::mem::size_of::<CmdHeader>() == CMD_HEADER_SIZE);

impl CmdHeader {
	pub fn group(&self) -> u8 {
		(self.cmd.get() >> 24) as u8
	}

	pub fn command(&self) -> u32 {
		self.cmd.get() & 0x00ff_ffff
	}
}

/// Payload reader for the little-endian argument words.
struct Args<'a> {
	payload: &'a [u8],
	offset: usize,
}

impl<'a> Args<'a> {
	fn new(payload: &'a [u8]) -> Self {
		Self { payload, offset: 0 }
	}

	fn u32(&mut self) -> Option<u32> {
		let bytes = self.payload.get(self.offset..self.offset + 4)?;
		self.offset += 4;
		Some(u32::from_le_bytes(bytes.try_into().unwrap()))
	}

	fn u64(&mut self) -> Option<u64> {
		let lo = self.u32()?;
		let hi = self.u32()?;
		Some(u64::from(hi) << 32 | u64::from(lo))
	}

	fn mac_addr(&mut self) -> Option<MacAddr> {
		let bytes = self.payload.get(self.offset..self.offset + 6)?;
		self.offset += 8; // address plus 2 pad bytes keeps word alignment
		Some(bytes.try_into().unwrap())
	}

	fn str(&mut self, len: usize) -> Option<&'a str> {
		let bytes = self.payload.get(self.offset..self.offset + len)?;
		self.offset += len.next_multiple_of(4);
		core::str::from_utf8(bytes).ok()
	}
}

/// Response writer: echoed header, status word, then payload.
struct Resp<'a> {
	out: &'a mut Vec<u8>,
}

impl<'a> Resp<'a> {
	fn new(out: &'a mut Vec<u8>, request: &CmdHeader) -> Self {
		out.clear();
		let mut header = *request;
		header.length.set(0);
		header.num_args.set(0);
		out.extend_from_slice(header.as_bytes());
		out.extend_from_slice(&STATUS_SUCCESS.to_le_bytes());
		Self { out }
	}

	fn u32(&mut self, value: u32) {
		self.out.extend_from_slice(&value.to_le_bytes());
	}

	fn u64(&mut self, value: u64) {
		self.u32(value as u32);
		self.u32((value >> 32) as u32);
	}

	fn bytes(&mut self, bytes: &[u8]) {
		self.out.extend_from_slice(bytes);
		for _ in 0..bytes.len().next_multiple_of(4) - bytes.len() {
			self.out.push(0);
		}
	}

	fn set_status(&mut self, status: u32) {
		self.out[CMD_HEADER_SIZE..CMD_HEADER_SIZE + 4].copy_from_slice(&status.to_le_bytes());
	}

	fn finish(self) {
		let payload_len = (self.out.len() - CMD_HEADER_SIZE) as u16;
		let num_args = payload_len / 4;
		self.out[4..6].copy_from_slice(&payload_len.to_be_bytes());
		self.out[6..8].copy_from_slice(&num_args.to_be_bytes());
	}
}

/// Values read/set sentinel used by the time and channel commands.
const CMD_PARAM_READ: u32 = 0xffff_ffff;

/// Maximum payload bytes a single response carries; longer outputs are
/// chunked across repeated commands.
pub const MAX_RESP_PAYLOAD: usize = 1400;

/// Processes one framed command against the MAC context, appending the
/// full response frame to `out`. Unknown commands produce an error
/// status, not a failure.
pub fn process_command(mac: &mut MacHigh, request: &[u8], out: &mut Vec<u8>) -> bool {
	let Some(header) = CmdHeader::ref_from_prefix(request) else {
		warn!("runt command frame");
		return false;
	};
	let payload_len = header.length.get() as usize;
	let Some(payload) = request.get(CMD_HEADER_SIZE..CMD_HEADER_SIZE + payload_len) else {
		warn!("command payload truncated");
		return false;
	};
	let header = *header;
	let mut args = Args::new(payload);
	let mut resp = Resp::new(out, &header);
	debug!(
		"host command {:#x} (group {:#x})",
		header.command(),
		header.group()
	);

	let ok = match header.cmd.get() {
		cmd::NODE_RESET_STATE => {
			mac.counts.zero_all();
			mac.eventlog.reset();
			true
		}
		cmd::NODE_TIME => match args.u32() {
			Some(CMD_PARAM_READ) => {
				resp.u64(mac.mac_time_usec());
				resp.u64(mac.system_time_usec());
				true
			}
			Some(_) => match args.u64() {
				Some(new_time) => {
					mac.set_mac_time_usec(new_time);
					true
				}
				None => false,
			},
			None => false,
		},
		cmd::NODE_CHANNEL => match args.u32() {
			Some(CMD_PARAM_READ) => {
				resp.u32(u32::from(mac.channel()));
				true
			}
			Some(chan) if chan <= 0xff => {
				mac.set_channel(chan as u8);
				resp.u32(chan);
				true
			}
			_ => false,
		},
		cmd::NODE_TX_POWER => match args.u32() {
			Some(power) => {
				let power_dbm = power as i32 as i8;
				mac.ucast_data_tx_params.phy.power = power_dbm;
				mac.ucast_mgmt_tx_params.phy.power = power_dbm;
				mac.mcast_data_tx_params.phy.power = power_dbm;
				mac.mcast_mgmt_tx_params.phy.power = power_dbm;
				mac.set_tx_ctrl_power(power_dbm);
				true
			}
			None => false,
		},
		cmd::NODE_TX_RATE => match args.u32() {
			Some(mcs) if mcs <= 7 => {
				mac.ucast_data_tx_params.phy.mcs = mcs as u8;
				true
			}
			_ => false,
		},
		cmd::LOG_GET_CAPACITY => {
			resp.u32(mac.eventlog.capacity() as u32);
			resp.u32(mac.eventlog.size() as u32);
			resp.u64(mac.eventlog.num_entries());
			true
		}
		cmd::LOG_READ => match (args.u32(), args.u32()) {
			(Some(offset), Some(max_bytes)) => {
				let mut chunk = alloc::vec![0u8; (max_bytes as usize).min(MAX_RESP_PAYLOAD)];
				let n = mac.eventlog.read(offset as usize, &mut chunk);
				resp.u32(n as u32);
				resp.bytes(&chunk[..n]);
				true
			}
			_ => false,
		},
		cmd::LOG_RESET => {
			mac.eventlog.reset();
			true
		}
		cmd::COUNTS_GET_TXRX => match args.mac_addr() {
			Some(addr) => {
				let entry = mac
					.counts
					.find_addr(&addr)
					.and_then(|h| mac.counts.get(h))
					.map(counts_entry);
				match entry {
					Some(entry) => {
						let now = mac.mac_time_usec();
						let mut entry = entry;
						entry.timestamp.set(now);
						resp.bytes(entry.as_bytes());
						mac.eventlog.append(EntryType::TxRxCounts, &entry);
						true
					}
					None => false,
				}
			}
			None => false,
		},
		cmd::COUNTS_ZERO_ALL => {
			mac.counts.zero_all();
			true
		}
		cmd::LTG_CONFIG => ltg_config(mac, &mut args, &mut resp),
		cmd::LTG_START => match args.u32() {
			Some(id) => mac.ltg_start(id),
			None => false,
		},
		cmd::LTG_STOP => match args.u32() {
			Some(id) => {
				mac.ltg_stop(id);
				true
			}
			None => false,
		},
		cmd::LTG_REMOVE => match args.u32() {
			Some(id) => {
				mac.ltg_remove(id);
				true
			}
			None => false,
		},
		cmd::STATION_INFO_LIST => {
			let now = mac.mac_time_usec();
			let entries = station_entries(mac, now);
			resp.u32(entries.len() as u32);
			for entry in entries {
				resp.bytes(entry.as_bytes());
			}
			true
		}
		cmd::NETWORK_INFO_LIST => {
			let now = mac.mac_time_usec();
			let entries = network_entries(mac, now);
			resp.u32(entries.len() as u32);
			for entry in entries {
				resp.bytes(entry.as_bytes());
			}
			true
		}
		cmd::SCAN_START => mac.scan_start(),
		cmd::SCAN_STOP => {
			mac.scan_stop();
			true
		}
		cmd::JOIN_START => match (args.u32(), args.u32()) {
			(Some(timeout_usec), Some(ssid_len)) => {
				match args.str(ssid_len as usize) {
					Some(ssid) => {
						let timeout = (timeout_usec != 0).then_some(u64::from(timeout_usec));
						mac.join_start(ssid, timeout)
					}
					None => false,
				}
			}
			_ => false,
		},
		_ => {
			warn!("unknown host command {:#x}", header.cmd.get());
			false
		}
	};

	if !ok {
		resp.set_status(STATUS_ERROR);
	}
	resp.finish();
	true
}

fn ltg_config(mac: &mut MacHigh, args: &mut Args<'_>, resp: &mut Resp<'_>) -> bool {
	// kind, interval(s), payload kind, dest, length(s), stop.
	let Some(sched_kind) = args.u32() else {
		return false;
	};
	let schedule = match sched_kind {
		0 => match args.u32() {
			Some(interval_usec) => LtgSchedule::Periodic { interval_usec },
			None => return false,
		},
		1 => match (args.u32(), args.u32()) {
			(Some(min), Some(max)) => LtgSchedule::UniformRand {
				min_interval_usec: min,
				max_interval_usec: max,
			},
			_ => return false,
		},
		_ => return false,
	};
	let Some(payload_kind) = args.u32() else {
		return false;
	};
	let payload = match payload_kind {
		0 => match (args.mac_addr(), args.u32()) {
			(Some(dest), Some(length)) => LtgPayload::Fixed {
				dest,
				length: length as u16,
			},
			_ => return false,
		},
		1 => match (args.mac_addr(), args.u32(), args.u32()) {
			(Some(dest), Some(min), Some(max)) => LtgPayload::UniformRand {
				dest,
				min_length: min as u16,
				max_length: max as u16,
			},
			_ => return false,
		},
		2 => match args.u32() {
			Some(length) => LtgPayload::AllAssocFixed {
				length: length as u16,
			},
			None => return false,
		},
		_ => return false,
	};
	let stop = match args.u64() {
		Some(0) => LtgStop::Forever,
		Some(calls) => LtgStop::AfterCalls(calls),
		None => LtgStop::Forever,
	};
	let id = mac.ltg.create(schedule, payload, stop);
	resp.u32(id);
	true
}

fn counts_entry(counts: &crate::network::TxRxCounts) -> TxRxCountsEntry {
	let mut entry = TxRxCountsEntry::new_zeroed();
	entry.addr = counts.addr;
	for (raw, sub) in [
		(&mut entry.data, &counts.data),
		(&mut entry.mgmt, &counts.mgmt),
	] {
		raw.rx_num_bytes.set(sub.rx_num_bytes);
		raw.rx_num_bytes_total.set(sub.rx_num_bytes_total);
		raw.tx_num_bytes_success.set(sub.tx_num_bytes_success);
		raw.tx_num_bytes_total.set(sub.tx_num_bytes_total);
		raw.rx_num_packets.set(sub.rx_num_packets);
		raw.rx_num_packets_total.set(sub.rx_num_packets_total);
		raw.tx_num_packets_success.set(sub.tx_num_packets_success);
		raw.tx_num_packets_total.set(sub.tx_num_packets_total);
		raw.tx_num_attempts.set(sub.tx_num_attempts);
	}
	entry
}

fn station_entries(mac: &MacHigh, now: u64) -> Vec<StationInfoEntry> {
	let Some(members) = mac
		.my_network()
		.and_then(|h| mac.networks.get(h))
		.map(|n| n.members)
	else {
		return Vec::new();
	};
	mac.stations
		.iter_members(&members)
		.filter_map(|h| mac.stations.get(h))
		.map(|station| {
			let mut entry = StationInfoEntry::new_zeroed();
			entry.timestamp.set(now);
			entry.addr = station.addr;
			entry.id.set(station.id);
			entry.flags.set(station.flags.bits());
			entry.latest_rx_timestamp.set(station.latest_rx_timestamp);
			entry.latest_rx_seq.set(station.latest_rx_seq);
			entry
		})
		.collect()
}

fn network_entries(mac: &MacHigh, now: u64) -> Vec<NetworkInfoEntry> {
	mac.networks
		.iter()
		.filter_map(|h| mac.networks.get(h))
		.map(|network| {
			let mut entry = NetworkInfoEntry::new_zeroed();
			entry.timestamp.set(now);
			entry.bssid = network.bssid;
			entry.channel = network.chan_spec.chan_pri;
			entry.state = match network.state {
				crate::network::BssState::Unauthenticated => 1,
				crate::network::BssState::Authenticated => 2,
				crate::network::BssState::Associated => 4,
				crate::network::BssState::Owned => 8,
			};
			let ssid = network.ssid.as_bytes();
			entry.ssid[..ssid.len()].copy_from_slice(ssid);
			entry.beacon_interval_tu.set(network.beacon_interval_tu);
			entry.capabilities.set(network.capabilities.bits());
			entry
		})
		.collect()
}

/// Builds a command frame (host side of the transport); used by the
/// tests and by embedders that tunnel commands.
pub fn build_command(cmd_id: u32, payload: &[u8], out: &mut Vec<u8>) {
	out.clear();
	let mut header = CmdHeader::new_zeroed();
	header.cmd.set(cmd_id);
	header.length.set(payload.len() as u16);
	header.num_args.set((payload.len() / 4) as u16);
	out.extend_from_slice(header.as_bytes());
	out.extend_from_slice(payload);
}

/// Parses the status word of a response frame.
pub fn response_status(response: &[u8]) -> Option<u32> {
	let payload = response.get(CMD_HEADER_SIZE..CMD_HEADER_SIZE + 4)?;
	Some(u32::from_le_bytes(payload.try_into().unwrap()))
}

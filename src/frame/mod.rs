//! 802.11 frame construction and parsing.
//!
//! Builders write an MPDU into a caller-provided buffer (a Tx queue
//! element's frame area) and return the number of bytes written, never
//! exceeding [`crate::config::MAX_PKT_SIZE_B`]. Parsers are the inverse
//! views used on the Rx path. Control frames (RTS/CTS/ACK) are built by
//! CPU-Low on the air; the builders here exist so completed handshakes
//! can be reconstructed for the event log.
//!
//! Frame formats follow IEEE 802.11-2012 clause 8 for the covered
//! subtypes; addr4 (WDS) is not used.

pub mod ie;

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::MacAddr;

pub use self::ie::{InfoElement, InfoElementIter, Tag};

/// Length of the common three-address MAC header.
pub const MAC_HEADER_LEN: usize = 24;
/// Length of the LLC/SNAP encapsulation header.
pub const LLC_HEADER_LEN: usize = 8;
/// Length of the FCS appended by the PHY.
pub const FCS_LEN: usize = 4;

/// frame_control_1 type field (bits 3:2 shifted into the byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
	Mgmt = 0x00,
	Ctrl = 0x04,
	Data = 0x08,
}

/// Full frame_control_1 bytes of the covered subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum FrameControl1 {
	AssocReq = 0x00,
	AssocResp = 0x10,
	ReassocReq = 0x20,
	ReassocResp = 0x30,
	ProbeReq = 0x40,
	ProbeResp = 0x50,
	Beacon = 0x80,
	Atim = 0x90,
	Disassoc = 0xa0,
	Auth = 0xb0,
	Deauth = 0xc0,
	Action = 0xd0,
	PsPoll = 0xa4,
	Rts = 0xb4,
	Cts = 0xc4,
	Ack = 0xd4,
	Data = 0x08,
	QosData = 0x88,
	NullData = 0x48,
}

impl FrameControl1 {
	/// The type bits of a raw frame_control_1 byte.
	pub fn frame_type(fc1: u8) -> u8 {
		fc1 & 0x0c
	}

	pub fn is_data(fc1: u8) -> bool {
		Self::frame_type(fc1) == FrameType::Data as u8
	}

	pub fn is_mgmt(fc1: u8) -> bool {
		Self::frame_type(fc1) == FrameType::Mgmt as u8
	}

	pub fn is_ctrl(fc1: u8) -> bool {
		Self::frame_type(fc1) == FrameType::Ctrl as u8
	}
}

bitflags! {
	/// frame_control_2 flag bits.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct FrameControl2: u8 {
		const TO_DS = 0x01;
		const FROM_DS = 0x02;
		const MORE_FRAGS = 0x04;
		const RETRY = 0x08;
		const POWER_MGMT = 0x10;
		const MORE_DATA = 0x20;
		const PROTECTED = 0x40;
		const ORDER = 0x80;
	}
}

bitflags! {
	/// Capability information bits of beacons and (re)association frames.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct Capabilities: u16 {
		const ESS = 0x0001;
		const IBSS = 0x0002;
		const PRIVACY = 0x0010;
		const SHORT_PREAMBLE = 0x0020;
		const SPEC_MGMT = 0x0100;
		const SHORT_TIMESLOT = 0x0400;
		const APSD = 0x0800;
		const DSSS_OFDM = 0x2000;
		const DELAYED_BLOCK_ACK = 0x4000;
		const IMMEDIATE_BLOCK_ACK = 0x8000;
	}
}

/// Open System is the only supported authentication algorithm.
pub const AUTH_ALGO_OPEN_SYSTEM: u16 = 0x00;
/// Authentication transaction sequence numbers.
pub const AUTH_SEQ_REQ: u16 = 0x01;
pub const AUTH_SEQ_RESP: u16 = 0x02;

/// Status codes (IEEE 802.11-2012 Table 8-37) used by this design.
pub mod status {
	pub const SUCCESS: u16 = 0;
	pub const AUTH_REJECT_UNSPECIFIED: u16 = 1;
	pub const AUTH_REJECT_OUTSIDE_SCOPE: u16 = 12;
	pub const AUTH_REJECT_CHALLENGE_FAILURE: u16 = 15;
	pub const REJECT_TOO_MANY_ASSOCIATIONS: u16 = 17;
}

/// Reason codes (IEEE 802.11-2012 Table 8-36) used by this design.
pub mod reason {
	pub const STA_IS_LEAVING: u16 = 3;
	pub const INACTIVITY: u16 = 4;
	pub const NONASSOCIATED_STA: u16 = 7;
	pub const DISASSOC_STA_IS_LEAVING: u16 = 8;
}

/// Marker bit for a basic rate inside a Supported Rates element.
pub const RATE_BASIC: u8 = 0x80;

/// Default 2.4 GHz b/g rate set: 1, 2, 5.5, 11 (basic) and 6, 9, 12, 18.
pub const DEFAULT_SUPPORTED_RATES: [u8; 8] = [0x82, 0x84, 0x8b, 0x96, 0x0c, 0x12, 0x18, 0x24];
/// Default extended rates: 24, 36, 48, 54.
pub const DEFAULT_EXT_SUPPORTED_RATES: [u8; 4] = [0x30, 0x48, 0x60, 0x6c];

/// Parsed view of the common three-address MAC header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacHeader {
	pub frame_control_1: u8,
	pub frame_control_2: FrameControl2,
	pub duration_id: u16,
	pub address_1: MacAddr,
	pub address_2: MacAddr,
	pub address_3: MacAddr,
	pub sequence_control: u16,
}

impl MacHeader {
	/// Parses the header; returns the header and the body offset.
	pub fn parse(mpdu: &[u8]) -> Option<(MacHeader, usize)> {
		if mpdu.len() < MAC_HEADER_LEN {
			return None;
		}
		let mut address_1 = [0; 6];
		let mut address_2 = [0; 6];
		let mut address_3 = [0; 6];
		address_1.copy_from_slice(&mpdu[4..10]);
		address_2.copy_from_slice(&mpdu[10..16]);
		address_3.copy_from_slice(&mpdu[16..22]);
		Some((
			MacHeader {
				frame_control_1: mpdu[0],
				frame_control_2: FrameControl2::from_bits_truncate(mpdu[1]),
				duration_id: u16::from_le_bytes([mpdu[2], mpdu[3]]),
				address_1,
				address_2,
				address_3,
				sequence_control: u16::from_le_bytes([mpdu[22], mpdu[23]]),
			},
			MAC_HEADER_LEN,
		))
	}

	/// The 12-bit sequence number.
	pub fn sequence_number(&self) -> u16 {
		(self.sequence_control >> 4) & 0x0fff
	}

	pub fn retry(&self) -> bool {
		self.frame_control_2.contains(FrameControl2::RETRY)
	}
}

/// Writes a three-address header. `seq` is the 12-bit sequence number.
pub fn write_mac_header(
	buf: &mut [u8],
	fc1: u8,
	fc2: FrameControl2,
	addr1: &MacAddr,
	addr2: &MacAddr,
	addr3: &MacAddr,
	seq: u16,
) -> usize {
	buf[0] = fc1;
	buf[1] = fc2.bits();
	buf[2..4].copy_from_slice(&0u16.to_le_bytes());
	buf[4..10].copy_from_slice(addr1);
	buf[10..16].copy_from_slice(addr2);
	buf[16..22].copy_from_slice(addr3);
	buf[22..24].copy_from_slice(&((seq & 0x0fff) << 4).to_le_bytes());
	MAC_HEADER_LEN
}

/// TIM element contents for AP beacons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimInfo {
	pub dtim_count: u8,
	pub dtim_period: u8,
	/// Bit 0 advertises buffered multicast at DTIM.
	pub bitmap_control: u8,
	/// First byte of the partial virtual bitmap.
	pub bitmap: u8,
}

/// Everything a beacon or probe response advertises about the BSS.
#[derive(Debug, Clone)]
pub struct BeaconParams<'a> {
	pub ssid: &'a str,
	pub beacon_interval_tu: u16,
	pub capabilities: Capabilities,
	pub channel: u8,
	pub ht_capable: bool,
	/// Present for AP beacons only.
	pub tim: Option<TimInfo>,
}

/// Builds a beacon or probe response. The timestamp field is left zero;
/// CPU-Low stamps the TSF at Tx time when `FILL_TIMESTAMP` is set.
pub fn create_beacon_probe_resp(
	buf: &mut [u8],
	subtype: FrameControl1,
	addr1: &MacAddr,
	addr2: &MacAddr,
	bssid: &MacAddr,
	seq: u16,
	params: &BeaconParams<'_>,
) -> usize {
	debug_assert!(matches!(
		subtype,
		FrameControl1::Beacon | FrameControl1::ProbeResp
	));
	let mut off = write_mac_header(
		buf,
		subtype.into(),
		FrameControl2::empty(),
		addr1,
		addr2,
		bssid,
		seq,
	);

	// Fixed fields: timestamp, beacon interval, capabilities.
	buf[off..off + 8].fill(0);
	off += 8;
	buf[off..off + 2].copy_from_slice(&params.beacon_interval_tu.to_le_bytes());
	off += 2;
	buf[off..off + 2].copy_from_slice(&params.capabilities.bits().to_le_bytes());
	off += 2;

	off += ie::write_ssid(&mut buf[off..], params.ssid);
	off += ie::write_rates(&mut buf[off..], Tag::SupportedRates, &DEFAULT_SUPPORTED_RATES);
	off += ie::write_ds_params(&mut buf[off..], params.channel);
	if let Some(tim) = &params.tim {
		off += ie::write_tim(&mut buf[off..], tim);
	}
	off += ie::write_rates(
		&mut buf[off..],
		Tag::ExtSupportedRates,
		&DEFAULT_EXT_SUPPORTED_RATES,
	);
	if params.ht_capable {
		off += ie::write_ht_capabilities(&mut buf[off..]);
		off += ie::write_ht_information(&mut buf[off..], params.channel);
	}
	off
}

/// Builds a probe request towards `bssid` (broadcast for a wildcard
/// scan). An empty `ssid` produces the wildcard SSID element.
pub fn create_probe_req(
	buf: &mut [u8],
	addr1: &MacAddr,
	addr2: &MacAddr,
	bssid: &MacAddr,
	seq: u16,
	ssid: &str,
	channel: u8,
) -> usize {
	let mut off = write_mac_header(
		buf,
		FrameControl1::ProbeReq.into(),
		FrameControl2::empty(),
		addr1,
		addr2,
		bssid,
		seq,
	);
	off += ie::write_ssid(&mut buf[off..], ssid);
	off += ie::write_rates(&mut buf[off..], Tag::SupportedRates, &DEFAULT_SUPPORTED_RATES);
	off += ie::write_ds_params(&mut buf[off..], channel);
	off
}

/// Builds an authentication frame (Open System only).
pub fn create_auth(
	buf: &mut [u8],
	addr1: &MacAddr,
	addr2: &MacAddr,
	bssid: &MacAddr,
	seq: u16,
	auth_algorithm: u16,
	auth_seq: u16,
	status_code: u16,
) -> usize {
	let mut off = write_mac_header(
		buf,
		FrameControl1::Auth.into(),
		FrameControl2::empty(),
		addr1,
		addr2,
		bssid,
		seq,
	);
	for field in [auth_algorithm, auth_seq, status_code] {
		buf[off..off + 2].copy_from_slice(&field.to_le_bytes());
		off += 2;
	}
	off
}

/// Builds a deauthentication or disassociation frame.
pub fn create_deauth_disassoc(
	buf: &mut [u8],
	subtype: FrameControl1,
	addr1: &MacAddr,
	addr2: &MacAddr,
	bssid: &MacAddr,
	seq: u16,
	reason_code: u16,
) -> usize {
	debug_assert!(matches!(
		subtype,
		FrameControl1::Deauth | FrameControl1::Disassoc
	));
	let mut off = write_mac_header(
		buf,
		subtype.into(),
		FrameControl2::empty(),
		addr1,
		addr2,
		bssid,
		seq,
	);
	buf[off..off + 2].copy_from_slice(&reason_code.to_le_bytes());
	off += 2;
	off
}

/// Builds an (re)association request.
pub fn create_assoc_req(
	buf: &mut [u8],
	subtype: FrameControl1,
	addr1: &MacAddr,
	addr2: &MacAddr,
	bssid: &MacAddr,
	seq: u16,
	capabilities: Capabilities,
	listen_interval: u16,
	ssid: &str,
) -> usize {
	debug_assert!(matches!(
		subtype,
		FrameControl1::AssocReq | FrameControl1::ReassocReq
	));
	let mut off = write_mac_header(
		buf,
		subtype.into(),
		FrameControl2::empty(),
		addr1,
		addr2,
		bssid,
		seq,
	);
	buf[off..off + 2].copy_from_slice(&capabilities.bits().to_le_bytes());
	off += 2;
	buf[off..off + 2].copy_from_slice(&listen_interval.to_le_bytes());
	off += 2;
	off += ie::write_ssid(&mut buf[off..], ssid);
	off += ie::write_rates(&mut buf[off..], Tag::SupportedRates, &DEFAULT_SUPPORTED_RATES);
	off += ie::write_rates(
		&mut buf[off..],
		Tag::ExtSupportedRates,
		&DEFAULT_EXT_SUPPORTED_RATES,
	);
	off
}

/// Builds an (re)association response. The response subtype mirrors the
/// request subtype. A successful response carries the AID with the two
/// MSBs set per the standard's encoding.
pub fn create_assoc_resp(
	buf: &mut [u8],
	subtype: FrameControl1,
	addr1: &MacAddr,
	addr2: &MacAddr,
	bssid: &MacAddr,
	seq: u16,
	capabilities: Capabilities,
	status_code: u16,
	aid: u16,
) -> usize {
	debug_assert!(matches!(
		subtype,
		FrameControl1::AssocResp | FrameControl1::ReassocResp
	));
	let mut off = write_mac_header(
		buf,
		subtype.into(),
		FrameControl2::empty(),
		addr1,
		addr2,
		bssid,
		seq,
	);
	buf[off..off + 2].copy_from_slice(&capabilities.bits().to_le_bytes());
	off += 2;
	buf[off..off + 2].copy_from_slice(&status_code.to_le_bytes());
	off += 2;
	let aid_field = if status_code == status::SUCCESS {
		aid | 0xc000
	} else {
		0
	};
	buf[off..off + 2].copy_from_slice(&aid_field.to_le_bytes());
	off += 2;
	off += ie::write_rates(&mut buf[off..], Tag::SupportedRates, &DEFAULT_SUPPORTED_RATES);
	off += ie::write_rates(
		&mut buf[off..],
		Tag::ExtSupportedRates,
		&DEFAULT_EXT_SUPPORTED_RATES,
	);
	off
}

/// Writes a data frame header. The LLC header and payload follow at the
/// returned offset.
pub fn create_data_header(
	buf: &mut [u8],
	fc2: FrameControl2,
	addr1: &MacAddr,
	addr2: &MacAddr,
	addr3: &MacAddr,
	seq: u16,
) -> usize {
	write_mac_header(buf, FrameControl1::Data.into(), fc2, addr1, addr2, addr3, seq)
}

/// Builds an RTS control header (log reconstruction only).
pub fn create_rts(buf: &mut [u8], ra: &MacAddr, ta: &MacAddr, duration: u16) -> usize {
	buf[0] = FrameControl1::Rts.into();
	buf[1] = 0;
	buf[2..4].copy_from_slice(&duration.to_le_bytes());
	buf[4..10].copy_from_slice(ra);
	buf[10..16].copy_from_slice(ta);
	16
}

/// Builds a CTS control header (log reconstruction only).
pub fn create_cts(buf: &mut [u8], ra: &MacAddr, duration: u16) -> usize {
	buf[0] = FrameControl1::Cts.into();
	buf[1] = 0;
	buf[2..4].copy_from_slice(&duration.to_le_bytes());
	buf[4..10].copy_from_slice(ra);
	10
}

/// Builds an ACK control header (log reconstruction only).
pub fn create_ack(buf: &mut [u8], ra: &MacAddr) -> usize {
	buf[0] = FrameControl1::Ack.into();
	buf[1] = 0;
	buf[2..4].copy_from_slice(&0u16.to_le_bytes());
	buf[4..10].copy_from_slice(ra);
	10
}

/// Fixed fields of a beacon or probe response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconFixed {
	pub timestamp: u64,
	pub beacon_interval_tu: u16,
	pub capabilities: Capabilities,
}

impl BeaconFixed {
	pub const LEN: usize = 12;

	pub fn parse(body: &[u8]) -> Option<BeaconFixed> {
		if body.len() < Self::LEN {
			return None;
		}
		Some(BeaconFixed {
			timestamp: u64::from_le_bytes(body[0..8].try_into().unwrap()),
			beacon_interval_tu: u16::from_le_bytes([body[8], body[9]]),
			capabilities: Capabilities::from_bits_truncate(u16::from_le_bytes([
				body[10], body[11],
			])),
		})
	}
}

/// Body of an authentication frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthBody {
	pub algorithm: u16,
	pub auth_sequence: u16,
	pub status_code: u16,
}

impl AuthBody {
	pub fn parse(body: &[u8]) -> Option<AuthBody> {
		if body.len() < 6 {
			return None;
		}
		Some(AuthBody {
			algorithm: u16::from_le_bytes([body[0], body[1]]),
			auth_sequence: u16::from_le_bytes([body[2], body[3]]),
			status_code: u16::from_le_bytes([body[4], body[5]]),
		})
	}
}

/// Fixed fields of an (re)association request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssocReqFixed {
	pub capabilities: Capabilities,
	pub listen_interval: u16,
}

impl AssocReqFixed {
	/// Fixed-field length of a plain association request. A
	/// reassociation request carries the current-AP address as well.
	pub fn parse(body: &[u8], reassoc: bool) -> Option<(AssocReqFixed, usize)> {
		let fixed_len = if reassoc { 10 } else { 4 };
		if body.len() < fixed_len {
			return None;
		}
		Some((
			AssocReqFixed {
				capabilities: Capabilities::from_bits_truncate(u16::from_le_bytes([
					body[0], body[1],
				])),
				listen_interval: u16::from_le_bytes([body[2], body[3]]),
			},
			fixed_len,
		))
	}
}

/// Fixed fields of an (re)association response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssocRespFixed {
	pub capabilities: Capabilities,
	pub status_code: u16,
	pub aid: u16,
}

impl AssocRespFixed {
	pub fn parse(body: &[u8]) -> Option<AssocRespFixed> {
		if body.len() < 6 {
			return None;
		}
		Some(AssocRespFixed {
			capabilities: Capabilities::from_bits_truncate(u16::from_le_bytes([body[0], body[1]])),
			status_code: u16::from_le_bytes([body[2], body[3]]),
			aid: u16::from_le_bytes([body[4], body[5]]) & 0x3fff,
		})
	}
}

/// Reason code of a deauthentication/disassociation body.
pub fn parse_reason_code(body: &[u8]) -> Option<u16> {
	if body.len() < 2 {
		return None;
	}
	Some(u16::from_le_bytes([body[0], body[1]]))
}

#[cfg(test)]
mod tests {
	use super::*;

	const A1: MacAddr = [0x02, 0, 0, 0, 0, 1];
	const A2: MacAddr = [0x02, 0, 0, 0, 0, 2];
	const A3: MacAddr = [0x02, 0, 0, 0, 0, 3];

	#[test]
	fn header_roundtrip() {
		let mut buf = [0u8; 64];
		let len = write_mac_header(
			&mut buf,
			FrameControl1::Beacon.into(),
			FrameControl2::RETRY,
			&A1,
			&A2,
			&A3,
			0x123,
		);
		assert_eq!(len, MAC_HEADER_LEN);
		let (hdr, off) = MacHeader::parse(&buf).unwrap();
		assert_eq!(off, MAC_HEADER_LEN);
		assert_eq!(hdr.frame_control_1, u8::from(FrameControl1::Beacon));
		assert!(hdr.retry());
		assert_eq!(hdr.address_1, A1);
		assert_eq!(hdr.address_2, A2);
		assert_eq!(hdr.address_3, A3);
		assert_eq!(hdr.sequence_number(), 0x123);
	}

	#[test]
	fn beacon_roundtrip() {
		let mut buf = [0u8; 512];
		let params = BeaconParams {
			ssid: "MangoNet",
			beacon_interval_tu: 100,
			capabilities: Capabilities::ESS | Capabilities::SHORT_TIMESLOT,
			channel: 6,
			ht_capable: true,
			tim: Some(TimInfo {
				dtim_count: 0,
				dtim_period: 3,
				bitmap_control: 0x01,
				bitmap: 0,
			}),
		};
		let len = create_beacon_probe_resp(
			&mut buf,
			FrameControl1::Beacon,
			&crate::BCAST_ADDR,
			&A2,
			&A3,
			7,
			&params,
		);
		let (hdr, body_off) = MacHeader::parse(&buf[..len]).unwrap();
		assert_eq!(hdr.frame_control_1, u8::from(FrameControl1::Beacon));

		let body = &buf[body_off..len];
		let fixed = BeaconFixed::parse(body).unwrap();
		assert_eq!(fixed.timestamp, 0);
		assert_eq!(fixed.beacon_interval_tu, 100);
		assert_eq!(
			fixed.capabilities,
			Capabilities::ESS | Capabilities::SHORT_TIMESLOT
		);

		let ies = &body[BeaconFixed::LEN..];
		let ssid = ie::find(ies, Tag::Ssid).unwrap();
		assert_eq!(ssid, b"MangoNet");
		let ds = ie::find(ies, Tag::DsParams).unwrap();
		assert_eq!(ds, [6]);
		let tim = ie::find(ies, Tag::Tim).unwrap();
		assert_eq!(tim[0], 0); // dtim count
		assert_eq!(tim[1], 3); // dtim period
		assert_eq!(tim[2], 0x01); // mcast pending
		assert!(ie::find(ies, Tag::HtCapabilities).is_some());
		assert!(ie::find(ies, Tag::HtInformation).is_some());
	}

	#[test]
	fn auth_roundtrip() {
		let mut buf = [0u8; 64];
		let len = create_auth(
			&mut buf,
			&A1,
			&A2,
			&A3,
			1,
			AUTH_ALGO_OPEN_SYSTEM,
			AUTH_SEQ_RESP,
			status::SUCCESS,
		);
		let (_, off) = MacHeader::parse(&buf[..len]).unwrap();
		let body = AuthBody::parse(&buf[off..len]).unwrap();
		assert_eq!(body.algorithm, AUTH_ALGO_OPEN_SYSTEM);
		assert_eq!(body.auth_sequence, AUTH_SEQ_RESP);
		assert_eq!(body.status_code, status::SUCCESS);
	}

	#[test]
	fn assoc_resp_aid_encoding() {
		let mut buf = [0u8; 128];
		let len = create_assoc_resp(
			&mut buf,
			FrameControl1::AssocResp,
			&A1,
			&A2,
			&A3,
			2,
			Capabilities::ESS,
			status::SUCCESS,
			1,
		);
		let (_, off) = MacHeader::parse(&buf[..len]).unwrap();
		let body = AssocRespFixed::parse(&buf[off..len]).unwrap();
		assert_eq!(body.status_code, status::SUCCESS);
		assert_eq!(body.aid, 1);

		let len = create_assoc_resp(
			&mut buf,
			FrameControl1::ReassocResp,
			&A1,
			&A2,
			&A3,
			3,
			Capabilities::ESS,
			status::REJECT_TOO_MANY_ASSOCIATIONS,
			0,
		);
		let (hdr, off) = MacHeader::parse(&buf[..len]).unwrap();
		assert_eq!(hdr.frame_control_1, u8::from(FrameControl1::ReassocResp));
		let body = AssocRespFixed::parse(&buf[off..len]).unwrap();
		assert_eq!(body.status_code, status::REJECT_TOO_MANY_ASSOCIATIONS);
		assert_eq!(body.aid, 0);
	}

	#[test]
	fn deauth_reason() {
		let mut buf = [0u8; 64];
		let len = create_deauth_disassoc(
			&mut buf,
			FrameControl1::Deauth,
			&A1,
			&A2,
			&A3,
			4,
			reason::INACTIVITY,
		);
		let (_, off) = MacHeader::parse(&buf[..len]).unwrap();
		assert_eq!(parse_reason_code(&buf[off..len]), Some(reason::INACTIVITY));
	}

	#[test]
	fn control_frame_lengths() {
		let mut buf = [0u8; 32];
		assert_eq!(create_rts(&mut buf, &A1, &A2, 44), 16);
		assert_eq!(create_cts(&mut buf, &A1, 32), 10);
		assert_eq!(create_ack(&mut buf, &A1), 10);
		assert!(FrameControl1::is_ctrl(buf[0]));
	}
}

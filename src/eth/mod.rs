//! Ethernet ↔ 802.11 encapsulation bridge.
//!
//! Wired frames become LLC/SNAP-encapsulated data MPDUs with the
//! addressing dictated by the node role; wireless data frames are
//! de-encapsulated back to Ethernet. In AP mode the bridge additionally
//! inspects ARP and DHCP traffic passing the portal to learn the
//! hostname and IPv4 binding of each station.

use log::trace;
use smoltcp::wire::{ArpOperation, ArpPacket, EthernetFrame, EthernetProtocol, IpProtocol, Ipv4Packet, UdpPacket};

use crate::frame::{self, FrameControl1, FrameControl2, LLC_HEADER_LEN, MAC_HEADER_LEN};
use crate::network::station::Hostname;
use crate::MacAddr;

/// LLC/SNAP constants: `AA AA 03 00 00 00 TT TT`.
pub const LLC_SNAP: u8 = 0xaa;
pub const LLC_CNTRL_UNNUMBERED: u8 = 0x03;

/// EtherTypes the bridge recognises; everything else passes through.
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
/// Non-standard type carried by LTG frames between cooperating nodes.
pub const ETHERTYPE_LTG: u16 = 0x9090;

/// Offset of the payload inside an encapsulated MPDU.
pub const ENCAP_PAYLOAD_OFFSET: usize = MAC_HEADER_LEN + LLC_HEADER_LEN;

const ETH_HEADER_LEN: usize = 14;

/// Addressing mode of the encapsulation, derived from the node role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncapMode {
	Ap,
	Sta,
	Ibss,
}

/// A de-encapsulated wireless frame, viewed as Ethernet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecapFrame<'a> {
	pub dst: MacAddr,
	pub src: MacAddr,
	pub ethertype: u16,
	pub payload: &'a [u8],
}

/// Writes the LLC/SNAP header for `ethertype`.
pub fn write_llc_header(buf: &mut [u8], ethertype: u16) -> usize {
	buf[0] = LLC_SNAP;
	buf[1] = LLC_SNAP;
	buf[2] = LLC_CNTRL_UNNUMBERED;
	buf[3..6].fill(0);
	buf[6..8].copy_from_slice(&ethertype.to_be_bytes());
	LLC_HEADER_LEN
}

/// Encapsulates an Ethernet frame into `mpdu_buf` as an 802.11 data
/// frame. Returns the MPDU length and the wireless destination address,
/// or `None` for a runt input.
pub fn encap(
	mpdu_buf: &mut [u8],
	mode: EncapMode,
	self_addr: &MacAddr,
	bssid: &MacAddr,
	eth_frame: &[u8],
	seq: u16,
) -> Option<(usize, MacAddr)> {
	let eth = EthernetFrame::new_checked(eth_frame).ok()?;
	let dst: MacAddr = eth.dst_addr().0;
	let src: MacAddr = eth.src_addr().0;
	let ethertype: u16 = eth.ethertype().into();
	let payload = eth.payload();

	if mpdu_buf.len() < ENCAP_PAYLOAD_OFFSET + payload.len() {
		return None;
	}

	let (fc2, addr1, addr2, addr3) = match mode {
		EncapMode::Sta => (FrameControl2::TO_DS, *bssid, *self_addr, dst),
		EncapMode::Ap => (FrameControl2::FROM_DS, dst, *bssid, src),
		EncapMode::Ibss => (FrameControl2::empty(), dst, *self_addr, *bssid),
	};

	let mut off = frame::create_data_header(mpdu_buf, fc2, &addr1, &addr2, &addr3, seq);
	off += write_llc_header(&mut mpdu_buf[off..], ethertype);
	mpdu_buf[off..off + payload.len()].copy_from_slice(payload);
	off += payload.len();
	trace!("encapsulated {} eth payload bytes towards {dst:02x?}", payload.len());
	Some((off, dst))
}

/// De-encapsulates a received data MPDU. `mpdu` must not include the
/// FCS. Returns `None` for non-data frames or missing LLC/SNAP.
pub fn decap(mpdu: &[u8]) -> Option<DecapFrame<'_>> {
	let (hdr, hdr_len) = frame::MacHeader::parse(mpdu)?;
	if !FrameControl1::is_data(hdr.frame_control_1) {
		return None;
	}
	let llc = mpdu.get(hdr_len..hdr_len + LLC_HEADER_LEN)?;
	if llc[0] != LLC_SNAP || llc[1] != LLC_SNAP || llc[2] != LLC_CNTRL_UNNUMBERED {
		return None;
	}
	let ethertype = u16::from_be_bytes([llc[6], llc[7]]);

	let to_ds = hdr.frame_control_2.contains(FrameControl2::TO_DS);
	let from_ds = hdr.frame_control_2.contains(FrameControl2::FROM_DS);
	let (dst, src) = match (to_ds, from_ds) {
		(false, false) => (hdr.address_1, hdr.address_2),
		(false, true) => (hdr.address_1, hdr.address_3),
		(true, false) => (hdr.address_3, hdr.address_2),
		// addr4 frames are not produced by this design.
		(true, true) => return None,
	};

	Some(DecapFrame {
		dst,
		src,
		ethertype,
		payload: &mpdu[hdr_len + LLC_HEADER_LEN..],
	})
}

/// Rebuilds the Ethernet frame for a de-encapsulated MPDU.
pub fn decap_to_eth(out: &mut [u8], decap: &DecapFrame<'_>) -> usize {
	out[0..6].copy_from_slice(&decap.dst);
	out[6..12].copy_from_slice(&decap.src);
	out[12..14].copy_from_slice(&decap.ethertype.to_be_bytes());
	out[ETH_HEADER_LEN..ETH_HEADER_LEN + decap.payload.len()].copy_from_slice(decap.payload);
	ETH_HEADER_LEN + decap.payload.len()
}

/// Something the AP portal learned about a host behind the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalLearning {
	/// Hardware address the learning applies to.
	pub addr: MacAddr,
	pub ip_addr: Option<[u8; 4]>,
	pub hostname: Option<Hostname>,
}

const DHCP_MAGIC_COOKIE: u32 = 0x6382_5363;
const DHCP_OPTIONS_OFFSET: usize = 240;
const DHCP_OPTION_MSG_TYPE: u8 = 53;
const DHCP_OPTION_HOST_NAME: u8 = 12;
const DHCP_OPTION_END: u8 = 255;
const DHCP_TYPE_REQUEST: u8 = 3;
const DHCP_TYPE_ACK: u8 = 5;
const UDP_PORT_BOOTPS: u16 = 67;
const UDP_PORT_BOOTPC: u16 = 68;

/// Inspects one bridged Ethernet frame for ARP and DHCP address
/// bindings. Called on both portal directions in AP mode.
pub fn inspect_portal(eth_frame: &[u8]) -> Option<PortalLearning> {
	let eth = EthernetFrame::new_checked(eth_frame).ok()?;
	match eth.ethertype() {
		EthernetProtocol::Arp => inspect_arp(eth.payload()),
		EthernetProtocol::Ipv4 => inspect_dhcp(eth.payload()),
		_ => None,
	}
}

fn inspect_arp(payload: &[u8]) -> Option<PortalLearning> {
	let arp = ArpPacket::new_checked(payload).ok()?;
	if arp.operation() != ArpOperation::Request && arp.operation() != ArpOperation::Reply {
		return None;
	}
	let mut addr = [0u8; 6];
	addr.copy_from_slice(arp.source_hardware_addr());
	let mut ip = [0u8; 4];
	ip.copy_from_slice(arp.source_protocol_addr());
	if ip == [0; 4] {
		// ARP probe; nothing to bind yet.
		return None;
	}
	Some(PortalLearning {
		addr,
		ip_addr: Some(ip),
		hostname: None,
	})
}

fn inspect_dhcp(payload: &[u8]) -> Option<PortalLearning> {
	let ip = Ipv4Packet::new_checked(payload).ok()?;
	if ip.next_header() != IpProtocol::Udp {
		return None;
	}
	let udp = UdpPacket::new_checked(ip.payload()).ok()?;
	let ports = (udp.src_port(), udp.dst_port());
	if ports != (UDP_PORT_BOOTPC, UDP_PORT_BOOTPS) && ports != (UDP_PORT_BOOTPS, UDP_PORT_BOOTPC) {
		return None;
	}
	let dhcp = udp.payload();
	if dhcp.len() < DHCP_OPTIONS_OFFSET {
		return None;
	}
	let cookie = u32::from_be_bytes(dhcp[236..240].try_into().unwrap());
	if cookie != DHCP_MAGIC_COOKIE {
		return None;
	}
	let mut chaddr = [0u8; 6];
	chaddr.copy_from_slice(&dhcp[28..34]);
	let mut yiaddr = [0u8; 4];
	yiaddr.copy_from_slice(&dhcp[16..20]);

	let mut msg_type = None;
	let mut hostname = None;
	let mut options = &dhcp[DHCP_OPTIONS_OFFSET..];
	while options.len() >= 2 && options[0] != DHCP_OPTION_END {
		let tag = options[0];
		let len = options[1] as usize;
		if options.len() < 2 + len {
			break;
		}
		let value = &options[2..2 + len];
		match tag {
			DHCP_OPTION_MSG_TYPE if len == 1 => msg_type = Some(value[0]),
			DHCP_OPTION_HOST_NAME => {
				// Truncated copy, like the station-info field.
				let mut name = Hostname::new();
				for &b in value {
					if name.push(b as char).is_err() {
						break;
					}
				}
				hostname = Some(name);
			}
			_ => {}
		}
		options = &options[2 + len..];
	}

	match msg_type? {
		DHCP_TYPE_REQUEST => Some(PortalLearning {
			addr: chaddr,
			ip_addr: None,
			hostname,
		}),
		DHCP_TYPE_ACK => Some(PortalLearning {
			addr: chaddr,
			ip_addr: (yiaddr != [0; 4]).then_some(yiaddr),
			hostname,
		}),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const SELF_ADDR: MacAddr = [0x40, 0xd8, 0x55, 0, 0, 1];
	const BSSID: MacAddr = [0x40, 0xd8, 0x55, 0, 0, 2];

	fn eth_frame(dst: MacAddr, src: MacAddr, ethertype: u16, payload: &[u8]) -> std::vec::Vec<u8> {
		let mut f = std::vec::Vec::new();
		f.extend_from_slice(&dst);
		f.extend_from_slice(&src);
		f.extend_from_slice(&ethertype.to_be_bytes());
		f.extend_from_slice(payload);
		f
	}

	#[test]
	fn encap_decap_roundtrip() {
		let dst = [0x02, 0, 0, 0, 0, 0x11];
		let src = [0x02, 0, 0, 0, 0, 0x22];
		let payload = [0xde, 0xad, 0xbe, 0xef, 0x01, 0x02];
		let eth = eth_frame(dst, src, ETHERTYPE_IPV4, &payload);

		for mode in [EncapMode::Sta, EncapMode::Ap, EncapMode::Ibss] {
			let mut mpdu = [0u8; 256];
			let (len, wireless_dst) =
				encap(&mut mpdu, mode, &SELF_ADDR, &BSSID, &eth, 0).unwrap();
			assert_eq!(wireless_dst, dst);

			let decapped = decap(&mpdu[..len]).unwrap();
			assert_eq!(decapped.dst, dst);
			assert_eq!(decapped.ethertype, ETHERTYPE_IPV4);
			assert_eq!(decapped.payload, payload);
			// The STA substitutes its own address as transmitter; the
			// other modes carry the original source end to end.
			match mode {
				EncapMode::Sta => assert_eq!(decapped.src, SELF_ADDR),
				_ => assert_eq!(decapped.src, src),
			}

			let mut out = [0u8; 256];
			let out_len = decap_to_eth(&mut out, &decapped);
			assert_eq!(&out[12..14], ETHERTYPE_IPV4.to_be_bytes());
			assert_eq!(&out[out_len - payload.len()..out_len], payload);
		}
	}

	#[test]
	fn decap_rejects_non_llc() {
		let mut mpdu = [0u8; 64];
		let len = frame::create_data_header(
			&mut mpdu,
			FrameControl2::empty(),
			&SELF_ADDR,
			&BSSID,
			&SELF_ADDR,
			0,
		);
		// Garbage instead of LLC/SNAP.
		mpdu[len] = 0x12;
		assert!(decap(&mpdu[..len + 8]).is_none());
	}

	#[test]
	fn arp_learning() {
		// who-has 10.0.0.1 tell 10.0.0.2
		let sender_mac = [0x02, 0, 0, 0, 0, 0x33];
		let mut arp = [0u8; 28];
		arp[0..2].copy_from_slice(&1u16.to_be_bytes()); // htype ethernet
		arp[2..4].copy_from_slice(&0x0800u16.to_be_bytes());
		arp[4] = 6;
		arp[5] = 4;
		arp[6..8].copy_from_slice(&1u16.to_be_bytes()); // request
		arp[8..14].copy_from_slice(&sender_mac);
		arp[14..18].copy_from_slice(&[10, 0, 0, 2]);
		let eth = eth_frame([0xff; 6], sender_mac, ETHERTYPE_ARP, &arp);

		let learning = inspect_portal(&eth).unwrap();
		assert_eq!(learning.addr, sender_mac);
		assert_eq!(learning.ip_addr, Some([10, 0, 0, 2]));
		assert!(learning.hostname.is_none());
	}

	fn dhcp_frame(msg_type: u8, chaddr: MacAddr, yiaddr: [u8; 4], hostname: &[u8]) -> std::vec::Vec<u8> {
		let mut dhcp = std::vec::Vec::new();
		dhcp.resize(240, 0u8);
		dhcp[0] = 1; // BOOTREQUEST
		dhcp[16..20].copy_from_slice(&yiaddr);
		dhcp[28..34].copy_from_slice(&chaddr);
		dhcp[236..240].copy_from_slice(&DHCP_MAGIC_COOKIE.to_be_bytes());
		dhcp.extend_from_slice(&[DHCP_OPTION_MSG_TYPE, 1, msg_type]);
		if !hostname.is_empty() {
			dhcp.push(DHCP_OPTION_HOST_NAME);
			dhcp.push(hostname.len() as u8);
			dhcp.extend_from_slice(hostname);
		}
		dhcp.push(DHCP_OPTION_END);

		let (src_port, dst_port) = if msg_type == DHCP_TYPE_ACK {
			(UDP_PORT_BOOTPS, UDP_PORT_BOOTPC)
		} else {
			(UDP_PORT_BOOTPC, UDP_PORT_BOOTPS)
		};
		let udp_len = 8 + dhcp.len();
		let mut udp = std::vec::Vec::new();
		udp.extend_from_slice(&src_port.to_be_bytes());
		udp.extend_from_slice(&dst_port.to_be_bytes());
		udp.extend_from_slice(&(udp_len as u16).to_be_bytes());
		udp.extend_from_slice(&0u16.to_be_bytes());
		udp.extend_from_slice(&dhcp);

		let total_len = 20 + udp.len();
		let mut ip = std::vec::Vec::new();
		ip.push(0x45);
		ip.push(0);
		ip.extend_from_slice(&(total_len as u16).to_be_bytes());
		ip.extend_from_slice(&[0; 4]); // ident / frag
		ip.push(64); // ttl
		ip.push(17); // udp
		ip.extend_from_slice(&0u16.to_be_bytes()); // checksum (unverified)
		ip.extend_from_slice(&[0, 0, 0, 0]);
		ip.extend_from_slice(&[255, 255, 255, 255]);
		ip.extend_from_slice(&udp);

		eth_frame([0xff; 6], chaddr, ETHERTYPE_IPV4, &ip)
	}

	#[test]
	fn dhcp_request_learns_hostname_truncated() {
		let chaddr = [0x02, 0, 0, 0, 0, 0x44];
		let eth = dhcp_frame(
			DHCP_TYPE_REQUEST,
			chaddr,
			[0; 4],
			b"a-very-long-hostname-past-limit",
		);
		let learning = inspect_portal(&eth).unwrap();
		assert_eq!(learning.addr, chaddr);
		assert!(learning.ip_addr.is_none());
		let hostname = learning.hostname.unwrap();
		assert_eq!(hostname.len(), STATION_HOSTNAME_LIMIT);
		assert_eq!(hostname.as_str(), "a-very-long-hostname-past-limit".split_at(STATION_HOSTNAME_LIMIT).0);
	}

	const STATION_HOSTNAME_LIMIT: usize = crate::network::station::STATION_INFO_HOSTNAME_MAXLEN;

	#[test]
	fn dhcp_ack_learns_ipv4_binding() {
		let chaddr = [0x02, 0, 0, 0, 0, 0x55];
		let eth = dhcp_frame(DHCP_TYPE_ACK, chaddr, [192, 168, 1, 42], b"");
		let learning = inspect_portal(&eth).unwrap();
		assert_eq!(learning.addr, chaddr);
		assert_eq!(learning.ip_addr, Some([192, 168, 1, 42]));
	}
}

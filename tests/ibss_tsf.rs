//! IBSS TSF follow: only later-timestamp beacons advance the local
//! clock, and the TBTT rephases behind the peer's.

mod common;

use common::*;
use wlan_mac_high::config::{MICROSECONDS_PER_TU, PHY_T_OFFSET_USEC};
use wlan_mac_high::frame::{self, BeaconParams, Capabilities, FrameControl1};
use wlan_mac_high::network::BssState;
use wlan_mac_high::platform::TimerPlane;
use wlan_mac_high::MacAddr;

/// Boots an IBSS node and lets the join timeout found a new network.
fn founded_ibss() -> (Harness, MacAddr) {
	let mut h = Harness::ibss(100);
	assert!(h.mac.join_start("test-ibss", Some(1_000_000)));
	h.advance(1_500_000);

	let handle = h.mac.my_network().expect("IBSS must self-found on timeout");
	let network = h.mac.networks.get(handle).unwrap();
	assert_eq!(network.state, BssState::Owned);
	let bssid = network.bssid;
	(h, bssid)
}

fn peer_beacon(bssid: &MacAddr, timestamp: u64) -> Vec<u8> {
	let peer: MacAddr = [0x02, 0, 0, 0, 0, 0x42];
	let mut buf = [0u8; 512];
	let len = frame::create_beacon_probe_resp(
		&mut buf,
		FrameControl1::Beacon,
		&[0xff; 6],
		&peer,
		bssid,
		9,
		&BeaconParams {
			ssid: "test-ibss",
			beacon_interval_tu: 100,
			capabilities: Capabilities::IBSS | Capabilities::SHORT_TIMESLOT,
			channel: 1,
			ht_capable: false,
			tim: None,
		},
	);
	// Stamp the TSF the way the peer's CPU-Low would.
	buf[24..32].copy_from_slice(&timestamp.to_le_bytes());
	buf[..len].to_vec()
}

#[test]
fn later_peer_timestamp_advances_tsf() {
	let (mut h, bssid) = founded_ibss();

	let local_rx_time = h.clock.mac_time_usec();
	let remote_ts = local_rx_time + 480_000;
	let beacon = peer_beacon(&bssid, remote_ts);
	h.low.deliver_at(&beacon, 1, -40, local_rx_time);
	h.settle();

	// TSF advanced by the delta plus the PHY pipeline compensation.
	let expected = local_rx_time + 480_000 + PHY_T_OFFSET_USEC;
	assert_eq!(h.clock.mac_time_usec(), expected);
}

#[test]
fn earlier_peer_timestamp_is_ignored() {
	let (mut h, bssid) = founded_ibss();

	let local_rx_time = h.clock.mac_time_usec();
	let before = h.clock.mac_time_usec();
	let beacon = peer_beacon(&bssid, local_rx_time.saturating_sub(50_000));
	h.low.deliver_at(&beacon, 1, -40, local_rx_time);
	h.settle();

	// Only the earlier-TSF station keeps its schedule; ours is the
	// later one here, so nothing moves.
	assert_eq!(h.clock.mac_time_usec(), before);
}

#[test]
fn tbtt_rephases_behind_the_peer() {
	let (mut h, bssid) = founded_ibss();
	let interval = 100 * MICROSECONDS_PER_TU;

	let beacons_before = h.low.transmitted_of(FrameControl1::Beacon.into()).len();

	// Peer TBTT happened 30 TU ago (in the peer's timebase).
	let local_rx_time = h.clock.mac_time_usec();
	let remote_ts = local_rx_time + 480_000;
	let beacon = peer_beacon(&bssid, remote_ts);
	h.low.deliver_at(&beacon, 1, -40, local_rx_time);
	h.settle();

	// Our next beacon fires one interval after the peer's timestamp,
	// not on the old schedule.
	h.advance(interval + 20_000);
	let beacons_after = h.low.transmitted_of(FrameControl1::Beacon.into()).len();
	assert!(
		beacons_after > beacons_before,
		"rephased TBTT must produce a beacon within one interval"
	);
}

#[test]
fn ibss_beacons_carry_autocancel_flags() {
	let (mut h, _) = founded_ibss();
	h.advance(110 * MICROSECONDS_PER_TU);
	let beacons = h.low.transmitted_of(FrameControl1::Beacon.into());
	assert!(!beacons.is_empty());
	let flags = beacons[0].frame_info.flags;
	let expected = wlan_mac_high::pktbuf::TxFlags::FILL_TIMESTAMP
		| wlan_mac_high::pktbuf::TxFlags::REQ_BO
		| wlan_mac_high::pktbuf::TxFlags::AUTOCANCEL;
	assert_eq!(flags, expected.bits());
}

#[test]
fn probe_requests_are_answered_like_an_ap() {
	let (mut h, bssid) = founded_ibss();
	let peer: MacAddr = [0x02, 0, 0, 0, 0, 0x42];
	let mut buf = [0u8; 256];
	let len = frame::create_probe_req(&mut buf, &[0xff; 6], &peer, &[0xff; 6], 1, "test-ibss", 1);
	h.rx(&buf[..len]);

	let resps = h.low.transmitted_of(FrameControl1::ProbeResp.into());
	assert_eq!(resps.len(), 1);
	assert_eq!(resps[0].addr1(), peer);
	let (hdr, _) = frame::MacHeader::parse(&resps[0].mpdu).unwrap();
	assert_eq!(hdr.address_3, bssid);
}

//! STA join: scan, authenticate, associate, then pass data.

mod common;

use common::*;
use wlan_mac_high::frame::{
	self, status, BeaconParams, Capabilities, FrameControl1, FrameControl2,
	AUTH_ALGO_OPEN_SYSTEM, AUTH_SEQ_RESP,
};
use wlan_mac_high::network::BssState;

fn ap_beacon(ssid: &str, channel: u8) -> Vec<u8> {
	let mut buf = [0u8; 512];
	let len = frame::create_beacon_probe_resp(
		&mut buf,
		FrameControl1::Beacon,
		&[0xff; 6],
		&AP_ADDR,
		&AP_ADDR,
		1,
		&BeaconParams {
			ssid,
			beacon_interval_tu: 100,
			capabilities: Capabilities::ESS,
			channel,
			ht_capable: false,
			tim: None,
		},
	);
	buf[..len].to_vec()
}

#[test]
fn sta_joins_and_bridges_data() {
	let mut h = Harness::sta();
	assert!(h.mac.join_start("MangoNet", Some(10_000_000)));
	h.settle();

	// The scan emits probe requests on the management queue.
	h.advance(100_000);
	assert!(!h
		.low
		.transmitted_of(FrameControl1::ProbeReq.into())
		.is_empty());

	// The target network appears; the next join poll adopts it and
	// sends the auth request.
	h.rx(&ap_beacon("MangoNet", 6));
	h.advance(200_000);
	assert_eq!(h.mac.channel(), 6);
	let auths = h.low.transmitted_of(FrameControl1::Auth.into());
	assert!(!auths.is_empty());
	assert_eq!(auths[0].addr1(), AP_ADDR);

	// AP accepts authentication; the STA proceeds to association.
	let mut buf = [0u8; 256];
	let len = frame::create_auth(
		&mut buf,
		&STA_ADDR,
		&AP_ADDR,
		&AP_ADDR,
		5,
		AUTH_ALGO_OPEN_SYSTEM,
		AUTH_SEQ_RESP,
		status::SUCCESS,
	);
	h.rx(&buf[..len]);
	let assoc_reqs = h.low.transmitted_of(FrameControl1::AssocReq.into());
	assert!(!assoc_reqs.is_empty());

	// AP grants AID 1.
	let len = frame::create_assoc_resp(
		&mut buf,
		FrameControl1::AssocResp,
		&STA_ADDR,
		&AP_ADDR,
		&AP_ADDR,
		6,
		Capabilities::ESS,
		status::SUCCESS,
		1,
	);
	h.rx(&buf[..len]);

	let network = h.mac.networks.get(h.mac.my_network().unwrap()).unwrap();
	assert_eq!(network.state, BssState::Associated);
	let members = network.members;
	let ap_station = h.mac.stations.find_addr(&members, &AP_ADDR).unwrap();
	assert_eq!(h.mac.stations.get(ap_station).unwrap().id, 1);

	// Wired traffic now encapsulates towards the AP with To-DS set.
	let mut eth = Vec::new();
	eth.extend_from_slice(&AP_ADDR);
	eth.extend_from_slice(&STA_ADDR);
	eth.extend_from_slice(&0x0800u16.to_be_bytes());
	eth.extend_from_slice(&[0x11; 32]);
	assert!(h.mac.eth_rx(&eth));
	h.settle();

	let data = h
		.low
		.transmitted
		.iter()
		.find(|t| FrameControl1::is_data(t.subtype()))
		.expect("data frame must reach the air");
	let (hdr, _) = frame::MacHeader::parse(&data.mpdu).unwrap();
	assert!(hdr.frame_control_2.contains(FrameControl2::TO_DS));
	assert_eq!(hdr.address_1, AP_ADDR);
	assert_eq!(hdr.address_2, STA_ADDR);

	// Frames from the DS come back out on the wire.
	let downlink_payload = [0x22u8; 24];
	let mut mpdu = vec![0u8; 24 + 8 + downlink_payload.len()];
	let off = frame::create_data_header(
		&mut mpdu,
		FrameControl2::FROM_DS,
		&STA_ADDR,
		&AP_ADDR,
		&[0x02, 0, 0, 0, 0, 0x77],
		9,
	);
	let off = off + wlan_mac_high::eth::write_llc_header(&mut mpdu[off..], 0x0800);
	mpdu[off..].copy_from_slice(&downlink_payload);
	h.rx(&mpdu);

	let sent = h.eth.sent.lock().unwrap();
	assert_eq!(sent.len(), 1);
	assert_eq!(&sent[0][0..6], STA_ADDR);
	assert_eq!(&sent[0][12..14], 0x0800u16.to_be_bytes());
	assert_eq!(&sent[0][14..], downlink_payload);
}

#[test]
fn join_times_out_without_a_match() {
	let mut h = Harness::sta();
	assert!(h.mac.join_start("nowhere", Some(1_000_000)));
	h.advance(1_500_000);
	assert!(!h.mac.join.is_joining());
	assert!(h.mac.my_network().is_none());
}

#[test]
fn assoc_reject_returns_to_idle() {
	let mut h = Harness::sta();
	h.mac.join_start("MangoNet", Some(10_000_000));
	h.rx(&ap_beacon("MangoNet", 6));
	h.advance(200_000);

	let mut buf = [0u8; 256];
	let len = frame::create_auth(
		&mut buf,
		&STA_ADDR,
		&AP_ADDR,
		&AP_ADDR,
		5,
		AUTH_ALGO_OPEN_SYSTEM,
		AUTH_SEQ_RESP,
		status::SUCCESS,
	);
	h.rx(&buf[..len]);

	let len = frame::create_assoc_resp(
		&mut buf,
		FrameControl1::AssocResp,
		&STA_ADDR,
		&AP_ADDR,
		&AP_ADDR,
		6,
		Capabilities::ESS,
		status::REJECT_TOO_MANY_ASSOCIATIONS,
		0,
	);
	h.rx(&buf[..len]);
	assert!(!h.mac.join.is_joining());
}

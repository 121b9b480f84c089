//! AP inactivity sweep: idle stations are deauthenticated and their
//! resources reclaimed.

mod common;

use common::*;
use wlan_mac_high::config::ASSOCIATION_TIMEOUT_USEC;
use wlan_mac_high::frame::{
	self, reason, status, Capabilities, FrameControl1, AUTH_ALGO_OPEN_SYSTEM, AUTH_SEQ_REQ,
};
use wlan_mac_high::network::StationFlags;

fn associate(h: &mut Harness) {
	let mut buf = [0u8; 256];
	let len = frame::create_auth(
		&mut buf,
		&AP_ADDR,
		&STA_ADDR,
		&AP_ADDR,
		1,
		AUTH_ALGO_OPEN_SYSTEM,
		AUTH_SEQ_REQ,
		status::SUCCESS,
	);
	h.rx(&buf[..len]);
	let len = frame::create_assoc_req(
		&mut buf,
		FrameControl1::AssocReq,
		&AP_ADDR,
		&STA_ADDR,
		&AP_ADDR,
		2,
		Capabilities::ESS,
		1,
		"MangoNet",
	);
	h.rx(&buf[..len]);
}

#[test]
fn idle_station_is_deauthenticated() {
	let mut h = Harness::ap("MangoNet", 6, 2);
	let free_before_assoc = h.mac.queues.num_free();
	associate(&mut h);
	let members = h
		.mac
		.networks
		.get(h.mac.my_network().unwrap())
		.unwrap()
		.members;
	assert_eq!(members.len(), 1);

	// Silence past the association timeout; the 1 Hz sweeper fires.
	h.advance(ASSOCIATION_TIMEOUT_USEC + 2_000_000);

	let deauths = h.low.transmitted_of(FrameControl1::Deauth.into());
	assert_eq!(deauths.len(), 1);
	assert_eq!(deauths[0].addr1(), STA_ADDR);
	assert_eq!(
		frame::parse_reason_code(deauths[0].body()),
		Some(reason::INACTIVITY)
	);

	let members = h
		.mac
		.networks
		.get(h.mac.my_network().unwrap())
		.unwrap()
		.members;
	assert_eq!(members.len(), 0);
	// Queue elements all returned to the pool.
	assert_eq!(h.mac.queues.num_free(), free_before_assoc);
}

#[test]
fn disable_assoc_check_spares_the_station() {
	let mut h = Harness::ap("MangoNet", 6, 2);
	associate(&mut h);
	let members = h
		.mac
		.networks
		.get(h.mac.my_network().unwrap())
		.unwrap()
		.members;
	let station = h.mac.stations.find_addr(&members, &STA_ADDR).unwrap();
	h.mac.stations.get_mut(station).unwrap().flags |= StationFlags::DISABLE_ASSOC_CHECK;

	h.advance(ASSOCIATION_TIMEOUT_USEC + 2_000_000);

	assert!(h.low.transmitted_of(FrameControl1::Deauth.into()).is_empty());
	let members = h
		.mac
		.networks
		.get(h.mac.my_network().unwrap())
		.unwrap()
		.members;
	assert_eq!(members.len(), 1);
}

#[test]
fn active_station_is_kept() {
	let mut h = Harness::ap("MangoNet", 6, 2);
	associate(&mut h);

	// Keep talking at half the timeout; the sweeper never triggers.
	let mut buf = [0u8; 128];
	for seq in 0..4u16 {
		h.advance(ASSOCIATION_TIMEOUT_USEC / 2);
		let len = frame::create_data_header(
			&mut buf,
			frame::FrameControl2::TO_DS,
			&AP_ADDR,
			&STA_ADDR,
			&AP_ADDR,
			10 + seq,
		);
		h.rx(&buf[..len]);
	}
	assert!(h.low.transmitted_of(FrameControl1::Deauth.into()).is_empty());
}

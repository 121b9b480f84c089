//! Host command surface framing and dispatch.

mod common;

use common::*;
use wlan_mac_high::exp::{self, cmd, CMD_HEADER_SIZE, STATUS_ERROR, STATUS_SUCCESS};

fn run(h: &mut Harness, cmd_id: u32, payload: &[u8]) -> Vec<u8> {
	let mut request = Vec::new();
	exp::build_command(cmd_id, payload, &mut request);
	let mut response = Vec::new();
	assert!(exp::process_command(&mut h.mac, &request, &mut response));
	response
}

fn payload_words(response: &[u8]) -> Vec<u32> {
	response[CMD_HEADER_SIZE + 4..]
		.chunks_exact(4)
		.map(|c| u32::from_le_bytes(c.try_into().unwrap()))
		.collect()
}

#[test]
fn time_read_and_set() {
	let mut h = Harness::ap("MangoNet", 6, 4);

	let response = run(&mut h, cmd::NODE_TIME, &0xffff_ffffu32.to_le_bytes());
	assert_eq!(exp::response_status(&response), Some(STATUS_SUCCESS));
	let words = payload_words(&response);
	let mac_time = u64::from(words[1]) << 32 | u64::from(words[0]);
	assert_eq!(mac_time, h.mac.mac_time_usec());

	// Set: mac_time_usec() afterwards lands in [t, t + epsilon].
	let target = 5_000_000u64;
	let mut payload = Vec::new();
	payload.extend_from_slice(&1u32.to_le_bytes());
	payload.extend_from_slice(&(target as u32).to_le_bytes());
	payload.extend_from_slice(&((target >> 32) as u32).to_le_bytes());
	let response = run(&mut h, cmd::NODE_TIME, &payload);
	assert_eq!(exp::response_status(&response), Some(STATUS_SUCCESS));
	let now = h.mac.mac_time_usec();
	assert!(now >= target && now < target + 1_000);
}

#[test]
fn channel_set_and_read() {
	let mut h = Harness::ap("MangoNet", 6, 4);
	let response = run(&mut h, cmd::NODE_CHANNEL, &11u32.to_le_bytes());
	assert_eq!(exp::response_status(&response), Some(STATUS_SUCCESS));
	assert_eq!(h.mac.channel(), 11);

	let response = run(&mut h, cmd::NODE_CHANNEL, &0xffff_ffffu32.to_le_bytes());
	assert_eq!(payload_words(&response)[0], 11);
}

#[test]
fn unknown_command_gets_error_status() {
	let mut h = Harness::ap("MangoNet", 6, 4);
	let response = run(&mut h, 0x00ff_ffff, &[]);
	assert_eq!(exp::response_status(&response), Some(STATUS_ERROR));
}

#[test]
fn log_capacity_and_read() {
	let mut h = Harness::ap("MangoNet", 6, 4);
	let response = run(&mut h, cmd::LOG_GET_CAPACITY, &[]);
	let words = payload_words(&response);
	assert_eq!(words[0] as usize, h.mac.eventlog.capacity());
	// Boot already produced entries (node info).
	assert!(words[1] > 0);

	let mut payload = Vec::new();
	payload.extend_from_slice(&0u32.to_le_bytes());
	payload.extend_from_slice(&64u32.to_le_bytes());
	let response = run(&mut h, cmd::LOG_READ, &payload);
	let words = payload_words(&response);
	assert!(words[0] > 0, "log read must return bytes");
}

#[test]
fn station_list_after_association() {
	use wlan_mac_high::frame::{
		self, status, Capabilities, FrameControl1, AUTH_ALGO_OPEN_SYSTEM, AUTH_SEQ_REQ,
	};

	let mut h = Harness::ap("MangoNet", 6, 4);
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

	let response = run(&mut h, cmd::STATION_INFO_LIST, &[]);
	let words = payload_words(&response);
	assert_eq!(words[0], 1, "one station expected");
	// The record follows the count: timestamp (2 words) then address.
	let record = &response[CMD_HEADER_SIZE + 4 + 4..];
	assert_eq!(&record[8..14], STA_ADDR);
}

#[test]
fn counts_zero_all_via_host() {
	let mut h = Harness::ap("MangoNet", 6, 4);
	let mut buf = [0u8; 64];
	let len = wlan_mac_high::frame::create_data_header(
		&mut buf,
		wlan_mac_high::frame::FrameControl2::TO_DS,
		&AP_ADDR,
		&STA_ADDR,
		&AP_ADDR,
		1,
	);
	h.rx(&buf[..len]);
	let counts_handle = h.mac.counts.find_addr(&STA_ADDR).unwrap();
	assert!(h.mac.counts.get(counts_handle).unwrap().data.rx_num_packets > 0);

	let response = run(&mut h, cmd::COUNTS_ZERO_ALL, &[]);
	assert_eq!(exp::response_status(&response), Some(STATUS_SUCCESS));
	assert_eq!(
		h.mac.counts.get(counts_handle).unwrap().data.rx_num_packets,
		0
	);
}

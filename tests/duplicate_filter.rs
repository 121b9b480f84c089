//! Receive de-duplication: a retried frame with an unchanged sequence
//! number only moves the `_total` counters.

mod common;

use common::*;
use wlan_mac_high::frame::{self, FrameControl2};

fn data_frame(seq: u16, retry: bool, len: usize) -> Vec<u8> {
	let mut buf = vec![0u8; len];
	let mut fc2 = FrameControl2::TO_DS;
	if retry {
		fc2 |= FrameControl2::RETRY;
	}
	frame::create_data_header(&mut buf, fc2, &AP_ADDR, &STA_ADDR, &AP_ADDR, seq);
	buf
}

#[test]
fn duplicate_filter() {
	let mut h = Harness::ap("MangoNet", 6, 2);

	h.rx(&data_frame(27, false, 100));
	h.rx(&data_frame(27, true, 100));

	let counts = h
		.mac
		.counts
		.get(h.mac.counts.find_addr(&STA_ADDR).unwrap())
		.unwrap();
	assert_eq!(counts.data.rx_num_packets, 1);
	assert_eq!(counts.data.rx_num_packets_total, 2);
	assert_eq!(counts.data.rx_num_bytes, 100);
	assert_eq!(counts.data.rx_num_bytes_total, 200);
}

#[test]
fn new_sequence_with_retry_counts_fully() {
	let mut h = Harness::ap("MangoNet", 6, 2);

	h.rx(&data_frame(27, false, 100));
	h.rx(&data_frame(28, true, 100));

	let counts = h
		.mac
		.counts
		.get(h.mac.counts.find_addr(&STA_ADDR).unwrap())
		.unwrap();
	assert_eq!(counts.data.rx_num_packets, 2);
	assert_eq!(counts.data.rx_num_packets_total, 2);
}

#[test]
fn counters_are_monotonic_and_consistent() {
	let mut h = Harness::ap("MangoNet", 6, 2);
	for (seq, retry) in [(1, false), (1, true), (2, false), (3, false), (3, true)] {
		h.rx(&data_frame(seq, retry, 64));
	}
	let counts = h
		.mac
		.counts
		.get(h.mac.counts.find_addr(&STA_ADDR).unwrap())
		.unwrap();
	assert!(counts.data.rx_num_packets <= counts.data.rx_num_packets_total);
	assert!(counts.data.rx_num_bytes <= counts.data.rx_num_bytes_total);
	assert_eq!(counts.data.rx_num_packets, 3);
	assert_eq!(counts.data.rx_num_packets_total, 5);
}

//! Tx service loop and packet-buffer handshake.

mod common;

use common::*;
use wlan_mac_high::config::NUM_TX_PKT_BUFS;
use wlan_mac_high::frame::{
	self, status, Capabilities, FrameControl1, AUTH_ALGO_OPEN_SYSTEM, AUTH_SEQ_REQ,
};
use wlan_mac_high::pktbuf::{TxResult, CPU_HIGH_MUTEX_ID};

fn associate(h: &mut Harness, sta: [u8; 6]) {
	let mut buf = [0u8; 256];
	let len = frame::create_auth(
		&mut buf,
		&AP_ADDR,
		&sta,
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
		&sta,
		&AP_ADDR,
		2,
		Capabilities::ESS,
		1,
		"MangoNet",
	);
	h.rx(&buf[..len]);
}

fn eth_to(h: &mut Harness, dst: [u8; 6], marker: u8) -> bool {
	let mut eth = Vec::new();
	eth.extend_from_slice(&dst);
	eth.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x99]);
	eth.extend_from_slice(&0x0800u16.to_be_bytes());
	eth.extend_from_slice(&[marker; 32]);
	h.mac.eth_rx(&eth)
}

#[test]
fn queue_elements_return_to_the_pool_after_tx_done() {
	let mut h = Harness::ap("MangoNet", 6, 4);
	associate(&mut h, STA_ADDR);
	let free_idle = h.mac.queues.num_free();

	assert!(eth_to(&mut h, STA_ADDR, 0x41));
	h.settle();

	assert_eq!(h.mac.queues.num_free(), free_idle);
	// All Tx slot mutexes are released after the handshake.
	for slot in 0..NUM_TX_PKT_BUFS {
		let (locked, _) = h.low.pktbufs.status_tx(slot).unwrap();
		assert!(!locked, "slot {slot} still locked");
	}
}

#[test]
fn unique_sequence_numbers_increase() {
	let mut h = Harness::ap("MangoNet", 6, 4);
	associate(&mut h, STA_ADDR);
	for marker in 0..3 {
		assert!(eth_to(&mut h, STA_ADDR, marker));
		h.settle();
	}
	let seqs: Vec<u64> = h
		.low
		.transmitted
		.iter()
		.map(|t| t.frame_info.unique_seq.get())
		.collect();
	for pair in seqs.windows(2) {
		assert!(pair[0] < pair[1], "unique_seq must be monotonic: {seqs:?}");
	}
	// The MAC sequence number is the 12 LSB of the unique sequence.
	let last = h.low.transmitted.last().unwrap();
	let (hdr, _) = frame::MacHeader::parse(&last.mpdu).unwrap();
	assert_eq!(
		u64::from(hdr.sequence_number()),
		last.frame_info.unique_seq.get() & 0xfff
	);
}

#[test]
fn tx_counts_accumulate_per_result() {
	let mut h = Harness::ap("MangoNet", 6, 4);
	associate(&mut h, STA_ADDR);

	h.low.num_tx_attempts = 3;
	assert!(eth_to(&mut h, STA_ADDR, 1));
	h.settle();
	h.low.tx_result = TxResult::Failure;
	h.low.num_tx_attempts = 7;
	assert!(eth_to(&mut h, STA_ADDR, 2));
	h.settle();

	let counts = h
		.mac
		.counts
		.get(h.mac.counts.find_addr(&STA_ADDR).unwrap())
		.unwrap();
	assert_eq!(counts.data.tx_num_packets_total, 2);
	assert_eq!(counts.data.tx_num_packets_success, 1);
	assert_eq!(counts.data.tx_num_attempts, 10);
	assert!(counts.data.tx_num_bytes_success <= counts.data.tx_num_bytes_total);
}

#[test]
fn queued_frames_of_a_departing_station_are_purged() {
	let mut h = Harness::ap("MangoNet", 6, 4);
	associate(&mut h, STA_ADDR);
	let free_idle = h.mac.queues.num_free();

	// Two frames: the first stages immediately, the second waits in
	// the station queue behind it.
	assert!(eth_to(&mut h, STA_ADDR, 0x42));
	assert!(eth_to(&mut h, STA_ADDR, 0x43));

	// The station deauthenticates before CPU-Low gets to run; its
	// queue is purged.
	let mut buf = [0u8; 64];
	let len = frame::create_deauth_disassoc(
		&mut buf,
		FrameControl1::Deauth,
		&AP_ADDR,
		&STA_ADDR,
		&AP_ADDR,
		5,
		frame::reason::STA_IS_LEAVING,
	);
	h.low.deliver(&buf[..len], h.mac.channel(), -40);
	h.mac.poll().unwrap();
	h.settle();

	// Only the already-staged frame reached the air.
	let data_frames = h
		.low
		.transmitted
		.iter()
		.filter(|t| FrameControl1::is_data(t.subtype()))
		.count();
	assert_eq!(data_frames, 1);
	assert_eq!(h.mac.queues.num_free(), free_idle);
}

#[test]
fn cpu_low_exception_is_fatal() {
	let mut h = Harness::ap("MangoNet", 6, 4);
	h.low.send_exception(0x1234);
	let err = h.mac.poll().unwrap_err();
	assert_eq!(
		err,
		wlan_mac_high::MacError::CpuLowException(0x1234)
	);
}

#[test]
fn boot_unlock_sweep_recovers_stale_locks() {
	// A slot left locked by a previous life of this CPU is recovered
	// by the boot sweep.
	let pool = wlan_mac_high::pktbuf::PktBufPool::new();
	let guard = pool.try_lock_tx(2, CPU_HIGH_MUTEX_ID).unwrap();
	core::mem::forget(guard);
	assert!(pool.status_tx(2).unwrap().0);
	pool.unlock_all(CPU_HIGH_MUTEX_ID);
	assert!(!pool.status_tx(2).unwrap().0);
}

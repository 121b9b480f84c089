//! Shared integration-test harness: a manual clock, a recording
//! Ethernet plane, and a scripted CPU-Low peer driving the real
//! packet-buffer and mailbox protocol.

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use smallvec::smallvec;
use wlan_mac_high::config::{MAX_PKT_SIZE_B, NUM_RX_PKT_BUFS};
use wlan_mac_high::ipc::{IpcMessage, MailboxEndpoint};
use wlan_mac_high::mac_high::{MacConfig, MacHighDeps, Role};
use wlan_mac_high::network::truncate_ssid;
use wlan_mac_high::pktbuf::{
	PhyMode, PktBufPool, RxFlags, RxFrameInfo, RxPktBufState, TxFrameInfo, TxLowDetails,
	TxPktBufState, TxResult, CPU_LOW_MUTEX_ID,
};
use wlan_mac_high::platform::{EthernetPlane, HwInfo, PlatformPlane, TimerPlane, UserIoStatus};
use wlan_mac_high::{MacAddr, MacHigh};
use zerocopy::FromZeroes;

pub const AP_ADDR: MacAddr = [0x40, 0xd8, 0x55, 0x00, 0x00, 0x10];
pub const STA_ADDR: MacAddr = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
pub const STA2_ADDR: MacAddr = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];
pub const STA3_ADDR: MacAddr = [0x02, 0x00, 0x00, 0x00, 0x00, 0x03];

/// Manually advanced clock. MAC time is system time plus an adjustable
/// offset, exactly like the updatable hardware counter.
pub struct TestClock {
	system_usec: AtomicU64,
	mac_offset_usec: AtomicI64,
}

impl TestClock {
	pub fn new(start: u64) -> Arc<Self> {
		Arc::new(Self {
			system_usec: AtomicU64::new(start),
			mac_offset_usec: AtomicI64::new(0),
		})
	}

	pub fn advance(&self, usec: u64) {
		self.system_usec.fetch_add(usec, Ordering::SeqCst);
	}
}

impl TimerPlane for TestClock {
	fn mac_time_usec(&self) -> u64 {
		let system = self.system_usec.load(Ordering::SeqCst);
		system.wrapping_add_signed(self.mac_offset_usec.load(Ordering::SeqCst))
	}

	fn system_time_usec(&self) -> u64 {
		self.system_usec.load(Ordering::SeqCst)
	}

	fn set_mac_time_usec(&self, new_time: u64) {
		let system = self.system_usec.load(Ordering::SeqCst);
		self.mac_offset_usec
			.store(new_time.wrapping_sub(system) as i64, Ordering::SeqCst);
	}
}

/// Records every frame sent to the wired side.
#[derive(Default)]
pub struct TestEth {
	pub sent: Mutex<Vec<Vec<u8>>>,
}

impl EthernetPlane for TestEth {
	fn send(&self, frame: &[u8]) {
		self.sent.lock().unwrap().push(frame.to_vec());
	}
}

pub struct TestPlatform {
	pub addr: MacAddr,
	pub status_calls: Mutex<Vec<(UserIoStatus, u32)>>,
}

impl TestPlatform {
	pub fn new(addr: MacAddr) -> Arc<Self> {
		Arc::new(Self {
			addr,
			status_calls: Mutex::new(Vec::new()),
		})
	}
}

impl PlatformPlane for TestPlatform {
	fn hw_info(&self) -> HwInfo {
		HwInfo {
			serial_number: 4242,
			fpga_dna: [0x1234_5678, 0x9abc_def0],
			hw_addr_wlan: self.addr,
			hw_addr_wlan_exp: self.addr,
		}
	}

	fn display_status(&self, status: UserIoStatus, arg: u32) {
		self.status_calls.lock().unwrap().push((status, arg));
	}
}

/// One frame CPU-Low "transmitted" for the upper MAC.
#[derive(Clone)]
pub struct Transmitted {
	pub frame_info: TxFrameInfo,
	pub mpdu: Vec<u8>,
}

impl Transmitted {
	pub fn subtype(&self) -> u8 {
		self.mpdu[0]
	}

	pub fn addr1(&self) -> MacAddr {
		self.mpdu[4..10].try_into().unwrap()
	}

	pub fn body(&self) -> &[u8] {
		&self.mpdu[24..]
	}
}

/// Scripted CPU-Low: accepts staged Tx buffers, reports completions and
/// injects receptions, all over the real shared-memory protocol.
pub struct LowMac {
	pub mailbox: MailboxEndpoint,
	pub pktbufs: Arc<PktBufPool>,
	pub clock: Arc<TestClock>,
	pub transmitted: Vec<Transmitted>,
	next_rx_slot: usize,
	/// Result CPU-Low reports for the next transmissions.
	pub tx_result: TxResult,
	pub num_tx_attempts: u16,
}

impl LowMac {
	pub fn new(mailbox: MailboxEndpoint, pktbufs: Arc<PktBufPool>, clock: Arc<TestClock>) -> Self {
		Self {
			mailbox,
			pktbufs,
			clock,
			transmitted: Vec::new(),
			next_rx_slot: 0,
			tx_result: TxResult::Success,
			num_tx_attempts: 1,
		}
	}

	pub fn send_initialized(&self) {
		self.mailbox
			.send(IpcMessage::CpuStatus { status: 0x1 })
			.unwrap();
	}

	pub fn send_exception(&self, code: u32) {
		self.mailbox
			.send(IpcMessage::CpuStatus {
				status: 0x8000_0000 | code,
			})
			.unwrap();
	}

	/// Services every pending message from CPU-High. Returns how many
	/// frames were "transmitted".
	pub fn process(&mut self) -> usize {
		let mut transmitted = 0;
		while let Some(msg) = self.mailbox.recv() {
			match msg {
				IpcMessage::TxReady { pkt_buf } => {
					self.complete_tx(pkt_buf as usize);
					transmitted += 1;
				}
				// Config traffic is accepted silently.
				_ => {}
			}
		}
		transmitted
	}

	fn complete_tx(&mut self, slot: usize) {
		let mut guard = self
			.pktbufs
			.try_lock_tx(slot, CPU_LOW_MUTEX_ID)
			.expect("slot must be unlocked when TX_READY arrives");
		assert_eq!(
			guard.frame_info().state(),
			Some(TxPktBufState::Ready),
			"staged buffer must be Ready"
		);
		guard.frame_info_mut().set_state(TxPktBufState::LowCtrl);

		let len = guard.frame_info().length.get() as usize;
		let mpdu = guard.mpdu()[..len].to_vec();

		let now = self.clock.mac_time_usec();
		let create = guard.frame_info().timestamp_create.get();
		let result = self.tx_result;
		let attempts = self.num_tx_attempts;
		{
			let info = guard.frame_info_mut();
			info.timestamp_accept.set(now.saturating_sub(create));
			info.timestamp_done.set(10);
			info.num_tx_attempts.set(attempts);
			info.tx_result = result.into();
			info.set_state(TxPktBufState::Done);
		}
		let frame_info = *guard.frame_info();
		drop(guard);

		let mut detail = TxLowDetails::new_zeroed();
		detail.tx_start_timestamp_mpdu.set(now);
		detail.attempt_number.set(1);
		detail.chan_num = 1;
		self.mailbox
			.send(IpcMessage::TxDone {
				pkt_buf: slot as u8,
				details: smallvec![detail],
			})
			.unwrap();

		self.transmitted.push(Transmitted { frame_info, mpdu });
	}

	/// Injects a reception with the given Rx power at the current MAC
	/// time.
	pub fn deliver(&mut self, mpdu: &[u8], channel: u8, rx_power: i8) {
		self.deliver_at(mpdu, channel, rx_power, self.clock.mac_time_usec());
	}

	/// Injects a reception with an explicit Rx timestamp.
	pub fn deliver_at(&mut self, mpdu: &[u8], channel: u8, rx_power: i8, timestamp: u64) {
		assert!(mpdu.len() <= MAX_PKT_SIZE_B);
		let slot = self.next_rx_slot;
		self.next_rx_slot = (self.next_rx_slot + 1) % NUM_RX_PKT_BUFS;

		let mut guard = self
			.pktbufs
			.try_lock_rx(slot, CPU_LOW_MUTEX_ID)
			.expect("rx slot busy");
		{
			let info = guard.frame_info_mut();
			*info = RxFrameInfo::new_zeroed();
			info.flags = RxFlags::FCS_GOOD.bits();
			info.channel = channel;
			info.rx_power = rx_power;
			info.phy_details.phy_mode = PhyMode::NonHt.into();
			info.phy_details.length.set(mpdu.len() as u16);
			info.timestamp.set(timestamp);
			info.set_state(RxPktBufState::Ready);
		}
		guard.mpdu_mut()[..mpdu.len()].copy_from_slice(mpdu);
		drop(guard);

		self.mailbox
			.send(IpcMessage::RxReady {
				pkt_buf: slot as u8,
			})
			.unwrap();
	}

	/// Frames of a given frame_control_1 subtype transmitted so far.
	pub fn transmitted_of(&self, fc1: u8) -> Vec<&Transmitted> {
		self.transmitted.iter().filter(|t| t.subtype() == fc1).collect()
	}
}

/// A full node under test.
pub struct Harness {
	pub mac: MacHigh,
	pub low: LowMac,
	pub clock: Arc<TestClock>,
	pub eth: Arc<TestEth>,
	pub platform: Arc<TestPlatform>,
}

impl Harness {
	pub fn new(config: MacConfig, addr: MacAddr) -> Self {
		let _ = env_logger::builder().is_test(true).try_init();

		let clock = TestClock::new(1_000_000);
		let eth = Arc::new(TestEth::default());
		let platform = TestPlatform::new(addr);
		let pktbufs = PktBufPool::new();
		let (high_end, low_end) = MailboxEndpoint::pair(64);

		let mac = MacHigh::new(
			config,
			MacHighDeps {
				clock: clock.clone(),
				eth: eth.clone(),
				platform: platform.clone(),
				mailbox: high_end,
				pktbufs: pktbufs.clone(),
			},
		);
		let mut low = LowMac::new(low_end, pktbufs, clock.clone());
		low.send_initialized();
		let mut harness = Self {
			mac,
			low,
			clock,
			eth,
			platform,
		};
		harness.settle();
		harness
	}

	pub fn ap(ssid: &str, channel: u8, max_associations: u16) -> Self {
		let mut config = MacConfig::new(Role::Ap);
		config.ssid = truncate_ssid(ssid);
		config.channel = channel;
		config.max_associations = max_associations;
		Self::new(config, AP_ADDR)
	}

	pub fn sta() -> Self {
		Self::new(MacConfig::new(Role::Sta), STA_ADDR)
	}

	pub fn ibss(beacon_interval_tu: u16) -> Self {
		let mut config = MacConfig::new(Role::Ibss);
		config.beacon_interval_tu = beacon_interval_tu;
		Self::new(config, STA_ADDR)
	}

	/// Runs the high/low pair until no more traffic moves.
	pub fn settle(&mut self) {
		for _ in 0..16 {
			self.mac.poll().unwrap();
			if self.low.process() == 0 && self.low.mailbox.pending() == 0 {
				self.mac.poll().unwrap();
				break;
			}
		}
	}

	/// Advances time in steps, polling after each step so scheduled
	/// events fire close to their deadlines.
	pub fn advance(&mut self, usec: u64) {
		const STEP: u64 = 10_000;
		let mut remaining = usec;
		while remaining > 0 {
			let step = remaining.min(STEP);
			self.clock.advance(step);
			remaining -= step;
			self.settle();
		}
	}

	/// Delivers a frame from the air and settles.
	pub fn rx(&mut self, mpdu: &[u8]) {
		self.low.deliver(mpdu, self.mac.channel(), -40);
		self.settle();
	}
}

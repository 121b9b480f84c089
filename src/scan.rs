//! Active scan state machine.
//!
//! The scan hops through a channel list, emitting probe requests every
//! `probe_tx_interval` while dwelling on each channel. The MAC context
//! owns the two timers; this module tracks the channel cursor and the
//! Idle/Running/Paused state. Probe requests go out on the management
//! queue so data traffic does not contend.

use log::{debug, info};

use crate::config::{DEFAULT_SCAN_PROBE_TX_INTERVAL_USEC, DEFAULT_SCAN_TIME_PER_CHANNEL_USEC};
use crate::network::{truncate_ssid, Ssid};

/// Maximum channels in a scan list.
pub const SCAN_CHANNEL_LIST_MAX: usize = 16;

/// Default scan list: 2.4 GHz channels 1-11 plus 5 GHz 36/44/48.
pub const DEFAULT_SCAN_CHANNELS: [u8; 14] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 36, 44, 48];

/// Tunable scan parameters.
#[derive(Debug, Clone)]
pub struct ScanParams {
	pub channels: heapless::Vec<u8, SCAN_CHANNEL_LIST_MAX>,
	pub time_per_channel_usec: u32,
	pub probe_tx_interval_usec: u32,
	/// Pause between full passes over the channel list.
	pub idle_time_usec: u32,
	/// SSID the probe requests carry; empty scans for any network.
	pub ssid: Ssid,
}

impl Default for ScanParams {
	fn default() -> Self {
		let mut channels = heapless::Vec::new();
		for &chan in DEFAULT_SCAN_CHANNELS.iter() {
			let _ = channels.push(chan);
		}
		Self {
			channels,
			time_per_channel_usec: DEFAULT_SCAN_TIME_PER_CHANNEL_USEC,
			probe_tx_interval_usec: DEFAULT_SCAN_PROBE_TX_INTERVAL_USEC,
			idle_time_usec: 0,
			ssid: Ssid::new(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
	Idle,
	Running,
	Paused,
}

/// What the MAC context must do after a dwell timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAdvance {
	/// Tune to the next channel and keep both timers running.
	Tune(u8),
	/// The list finished; tune to its head after the configured idle
	/// time (zero idles straight into the next pass).
	CycleDone { first_channel: u8, idle_usec: u32 },
}

/// The scan FSM proper.
pub struct ScanFsm {
	params: ScanParams,
	state: ScanState,
	channel_index: usize,
	num_scans: u32,
}

impl ScanFsm {
	pub fn new() -> Self {
		Self {
			params: ScanParams::default(),
			state: ScanState::Idle,
			channel_index: 0,
			num_scans: 0,
		}
	}

	pub fn params(&self) -> &ScanParams {
		&self.params
	}

	/// Replaces the scan parameters. Only allowed while idle.
	pub fn set_params(&mut self, params: ScanParams) -> bool {
		if self.state != ScanState::Idle || params.channels.is_empty() {
			return false;
		}
		self.params = params;
		true
	}

	pub fn set_ssid(&mut self, ssid: &str) {
		self.params.ssid = truncate_ssid(ssid);
	}

	pub fn state(&self) -> ScanState {
		self.state
	}

	pub fn is_scanning(&self) -> bool {
		self.state != ScanState::Idle
	}

	/// Completed passes over the channel list.
	pub fn num_scans(&self) -> u32 {
		self.num_scans
	}

	pub fn current_channel(&self) -> Option<u8> {
		self.is_scanning()
			.then(|| self.params.channels[self.channel_index])
	}

	/// Starts scanning; returns the first channel to tune to, or `None`
	/// if already running.
	pub fn start(&mut self) -> Option<u8> {
		if self.state != ScanState::Idle {
			return None;
		}
		self.state = ScanState::Running;
		self.channel_index = 0;
		info!(
			"scan started over {} channels, ssid {:?}",
			self.params.channels.len(),
			self.params.ssid.as_str()
		);
		Some(self.params.channels[0])
	}

	/// Dwell expiry: advance the channel cursor.
	pub fn advance(&mut self) -> Option<ScanAdvance> {
		if self.state != ScanState::Running {
			return None;
		}
		self.channel_index += 1;
		if self.channel_index >= self.params.channels.len() {
			self.channel_index = 0;
			self.num_scans += 1;
			debug!("scan pass {} complete", self.num_scans);
			return Some(ScanAdvance::CycleDone {
				first_channel: self.params.channels[0],
				idle_usec: self.params.idle_time_usec,
			});
		}
		Some(ScanAdvance::Tune(self.params.channels[self.channel_index]))
	}

	/// Holds the current channel and suspends probe emission.
	pub fn pause(&mut self) {
		if self.state == ScanState::Running {
			self.state = ScanState::Paused;
			debug!("scan paused on channel {:?}", self.current_channel());
		}
	}

	pub fn resume(&mut self) {
		if self.state == ScanState::Paused {
			self.state = ScanState::Running;
		}
	}

	/// Stops the scan. The caller retunes to the operating channel.
	pub fn stop(&mut self) {
		if self.state != ScanState::Idle {
			info!("scan stopped");
		}
		self.state = ScanState::Idle;
		self.channel_index = 0;
	}
}

impl Default for ScanFsm {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn small_params() -> ScanParams {
		let mut params = ScanParams::default();
		params.channels.clear();
		for chan in [1, 6, 11] {
			params.channels.push(chan).unwrap();
		}
		params
	}

	#[test]
	fn cycles_through_channel_list() {
		let mut scan = ScanFsm::new();
		assert!(scan.set_params(small_params()));
		assert_eq!(scan.start(), Some(1));
		assert_eq!(scan.advance(), Some(ScanAdvance::Tune(6)));
		assert_eq!(scan.advance(), Some(ScanAdvance::Tune(11)));
		assert_eq!(
			scan.advance(),
			Some(ScanAdvance::CycleDone {
				first_channel: 1,
				idle_usec: 0
			})
		);
		assert_eq!(scan.num_scans(), 1);
		assert_eq!(scan.current_channel(), Some(1));
	}

	#[test]
	fn pause_holds_channel() {
		let mut scan = ScanFsm::new();
		scan.set_params(small_params());
		scan.start();
		scan.advance();
		scan.pause();
		assert_eq!(scan.state(), ScanState::Paused);
		assert_eq!(scan.current_channel(), Some(6));
		// No channel advance while paused.
		assert_eq!(scan.advance(), None);
		scan.resume();
		assert_eq!(scan.advance(), Some(ScanAdvance::Tune(11)));
	}

	#[test]
	fn params_locked_while_scanning() {
		let mut scan = ScanFsm::new();
		scan.set_params(small_params());
		scan.start();
		assert!(!scan.set_params(small_params()));
		scan.stop();
		assert!(scan.set_params(small_params()));
	}

	#[test]
	fn double_start_is_rejected() {
		let mut scan = ScanFsm::new();
		scan.set_params(small_params());
		assert!(scan.start().is_some());
		assert!(scan.start().is_none());
	}
}

//! Top-level role state machines.
//!
//! The role is a boot-time choice and the three machines are disjoint;
//! they share the context's stores and frame helpers but never each
//! other's state. Handlers live in `impl MacHigh` blocks per role so
//! the dispatch in [`crate::mac_high`] stays a plain match.

mod addr_filter;
mod ap;
mod ibss;
mod sta;

use alloc::vec::Vec;

use crate::MacAddr;

pub use self::addr_filter::{addr_is_warp, AddrFilter};

/// Per-role state owned by the context.
pub(crate) enum RoleState {
	/// Transient placeholder while a handler borrows the state.
	Detached,
	Ap(ApState),
	Sta(StaState),
	Ibss(IbssState),
}

/// AP-specific state.
pub struct ApState {
	/// Beacons until the next DTIM; 0 means the next beacon is a DTIM.
	pub dtim_count: u8,
	/// Peers that completed Open System authentication but are not
	/// (yet) associated.
	pub authenticated: Vec<MacAddr>,
}

impl ApState {
	pub fn new() -> Self {
		Self {
			dtim_count: 0,
			authenticated: Vec::new(),
		}
	}
}

impl Default for ApState {
	fn default() -> Self {
		Self::new()
	}
}

/// STA-specific state.
pub struct StaState {
	/// Association id assigned by the AP; 0 while unassociated.
	pub aid: u16,
}

impl StaState {
	pub fn new() -> Self {
		Self { aid: 0 }
	}
}

impl Default for StaState {
	fn default() -> Self {
		Self::new()
	}
}

/// IBSS-specific state.
pub struct IbssState {}

impl IbssState {
	pub fn new() -> Self {
		Self {}
	}
}

impl Default for IbssState {
	fn default() -> Self {
		Self::new()
	}
}

use log::{debug, info};

use crate::frame::{self, BeaconParams, FrameControl1};
use crate::mac_high::MacHigh;
use crate::network::counts::CountsFlags;
use crate::pktbuf::TxFlags;
use crate::queue::{station_id_to_queue_id, QueueMetadata, MANAGEMENT_QID};

impl MacHigh {
	/// Whether a probe request body targets us: wildcard SSID or a
	/// match against the owned network's SSID. Unknown elements are
	/// skipped by the walker.
	pub(crate) fn probe_req_matches(&self, body: &[u8]) -> bool {
		let Some(network) = self.my_network.and_then(|h| self.networks.get(h)) else {
			return false;
		};
		match frame::ie::find(body, frame::Tag::Ssid) {
			Some(ssid) => ssid.is_empty() || ssid == network.ssid.as_bytes(),
			None => false,
		}
	}

	/// Emits a directed probe response describing the owned network.
	pub(crate) fn send_probe_response(&mut self, dest: MacAddr) {
		let Some(network) = self.my_network.and_then(|h| self.networks.get(h)) else {
			return;
		};
		let bssid = network.bssid;
		let ssid = network.ssid.clone();
		let beacon_interval_tu = network.beacon_interval_tu;
		let capabilities = network.capabilities;
		let channel = network.chan_spec.chan_pri;
		let ht_capable = network.ht_capable;
		let self_addr = self.mac_addr;
		let params = self.ucast_mgmt_tx_params;
		debug!("probe response to {dest:02x?}");
		self.enqueue_frame(
			MANAGEMENT_QID,
			QueueMetadata::TxParams(params),
			TxFlags::FILL_TIMESTAMP | TxFlags::FILL_DURATION | TxFlags::REQ_TO,
			0,
			move |buf| {
				frame::create_beacon_probe_resp(
					buf,
					FrameControl1::ProbeResp,
					&dest,
					&self_addr,
					&bssid,
					0,
					&BeaconParams {
						ssid: ssid.as_str(),
						beacon_interval_tu,
						capabilities,
						channel,
						ht_capable,
						tim: None,
					},
				)
			},
		);
	}

	/// Emits a directed deauthentication frame.
	pub(crate) fn send_deauth(&mut self, dest: MacAddr, reason: u16) {
		let bssid = self
			.my_network
			.and_then(|h| self.networks.get(h))
			.map(|n| n.bssid)
			.unwrap_or(self.mac_addr);
		let self_addr = self.mac_addr;
		let params = self.ucast_mgmt_tx_params;
		self.enqueue_frame(
			MANAGEMENT_QID,
			QueueMetadata::TxParams(params),
			TxFlags::FILL_DURATION | TxFlags::REQ_TO,
			0,
			move |buf| {
				frame::create_deauth_disassoc(
					buf,
					FrameControl1::Deauth,
					&dest,
					&self_addr,
					&bssid,
					0,
					reason,
				)
			},
		);
	}

	/// Tears a station down: unlinks the record, purges its Tx queue
	/// and disposes of the counts entry unless it is pinned.
	pub(crate) fn remove_station(&mut self, addr: &MacAddr) -> bool {
		let Some(handle) = self.my_network else {
			return false;
		};
		let removed = {
			let Some(network) = self.networks.get_mut(handle) else {
				return false;
			};
			self.stations.remove(&mut network.members, addr)
		};
		let Some(station) = removed else {
			return false;
		};
		let purged = self.queues.purge(station_id_to_queue_id(station.id));
		if let Some(counts_handle) = station.counts.or_else(|| self.counts.find_addr(addr)) {
			let keep = self
				.counts
				.get(counts_handle)
				.is_some_and(|c| c.flags.contains(CountsFlags::KEEP));
			if !keep {
				self.counts.remove(counts_handle);
			}
		}
		info!(
			"removed station {addr:02x?} (id {}, {purged} queued frames dropped)",
			station.id
		);
		true
	}

	/// Confirms the BSSID match and beacon interval with CPU-Low after
	/// an association completes.
	pub(crate) fn config_beacon_match(&mut self, bssid: MacAddr) {
		let beacon_interval_tu = self
			.my_network
			.and_then(|h| self.networks.get(h))
			.map_or(100, |n| n.beacon_interval_tu);
		let _ = self.mailbox.send(crate::ipc::IpcMessage::ConfigBeaconTxRx {
			config: crate::ipc::BeaconTxRxConfig {
				ts_update_mode: self.ts_update_mode,
				bssid_match: bssid,
				beacon_interval_tu,
				dtim_period: 1,
			},
		});
	}
}

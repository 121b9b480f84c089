//! Independent BSS (ad-hoc) role.
//!
//! There is no association: peers materialise in the station list on
//! first reception. Beacon generation follows IEEE 802.11-2012 10.1.3.3:
//! every node schedules its own beacon, and a received beacon whose
//! timestamp is later than local MAC time both advances the local TSF
//! and rephases the local TBTT.

use log::{debug, info, warn};

use crate::config::{MICROSECONDS_PER_TU, PHY_T_OFFSET_USEC};
use crate::error::JoinError;
use crate::frame::{
	self, BeaconFixed, BeaconParams, Capabilities, FrameControl1, MacHeader,
};
use crate::ipc::{BeaconTxRxConfig, ChanSpec, IpcMessage};
use crate::mac_high::{MacHigh, SchedEvent};
use crate::network::{truncate_ssid, BssState, NetworkFlags};
use crate::pktbuf::{RxFrameInfo, TxFlags};
use crate::queue::{QueueMetadata, BEACON_QID};
use crate::roles::IbssState;
use crate::scheduler::SchedClass;
use crate::{addr_is_mcast, MacAddr, BCAST_ADDR, MAC_ADDR_MSB_MASK_LOCAL};

/// IBSS peers are unbounded by an association handshake; ids are dense
/// within this cap.
const IBSS_MAX_PEER_ID: u16 = 255;

impl MacHigh {
	pub(crate) fn ibss_rx(
		&mut self,
		_ibss: &mut IbssState,
		header: &MacHeader,
		body: &[u8],
		rx_info: &RxFrameInfo,
		mpdu: &[u8],
	) {
		let my_bssid = self
			.my_network
			.and_then(|h| self.networks.get(h))
			.map(|n| n.bssid);
		match FrameControl1::try_from(header.frame_control_1) {
			Ok(FrameControl1::ProbeReq) => {
				if my_bssid.is_some() && self.probe_req_matches(body) {
					self.send_probe_response(header.address_2);
				}
			}
			Ok(FrameControl1::Beacon) => {
				if my_bssid == Some(header.address_3) {
					self.ibss_beacon_from_peer(body, rx_info);
				}
			}
			Ok(FrameControl1::Data) | Ok(FrameControl1::QosData) => {
				if my_bssid != Some(header.address_3) {
					return;
				}
				self.ibss_ensure_peer(header.address_2);
				if header.address_1 == self.mac_addr || addr_is_mcast(&header.address_1) {
					self.bridge_to_eth(mpdu);
				}
			}
			_ => {}
		}
	}

	/// TSF follow (IEEE 802.11-2012 10.1.3.3): only a beacon with a
	/// later timestamp adjusts the local clock; the earlier-TSF station
	/// keeps its schedule and everyone else defers to it.
	fn ibss_beacon_from_peer(&mut self, body: &[u8], rx_info: &RxFrameInfo) {
		let Some(handle) = self.my_network else {
			return;
		};
		let now = self.mac_time_usec();
		self.networks.touch(handle, now);
		let Some(fixed) = BeaconFixed::parse(body) else {
			return;
		};
		let delta =
			fixed.timestamp as i64 - rx_info.timestamp.get() as i64 + PHY_T_OFFSET_USEC as i64;
		if delta <= 0 {
			return;
		}
		self.follow_tsf(delta);

		// Rephase our TBTT behind the peer's: kill the pending beacon
		// event and restart one interval after the peer's TBTT.
		let interval_us = self
			.networks
			.get(handle)
			.map(|n| u64::from(n.beacon_interval_tu) * MICROSECONDS_PER_TU)
			.unwrap_or(0);
		if interval_us == 0 {
			return;
		}
		let mac_now = self.mac_time_usec();
		let since_peer_tbtt = mac_now.saturating_sub(fixed.timestamp);
		let delay = interval_us.saturating_sub(since_peer_tbtt).max(1);
		debug!("IBSS TSF advanced by {delta} us; next TBTT in {delay} us");
		self.ibss_schedule_beacon(delay);

		// A beacon still sitting in the queue belongs to the old TBTT.
		// (The copy already in CPU-Low's domain is cancelled there via
		// the AUTOCANCEL flag.)
		if let Some(stale) = self.queues.dequeue_head(BEACON_QID) {
			self.queues.checkin(stale);
		}
	}

	/// Adopts a discovered network as our own IBSS.
	pub(crate) fn ibss_adopt_network(
		&mut self,
		_ibss: &mut IbssState,
		handle: crate::collections::Handle,
	) {
		let Some(network) = self.networks.get_mut(handle) else {
			return;
		};
		network.state = BssState::Owned;
		network.flags |= NetworkFlags::KEEP;
		network.last_join_attempt_result = crate::network::JoinAttemptResult::Successful;
		let interval_us = u64::from(network.beacon_interval_tu) * MICROSECONDS_PER_TU;
		let bssid = network.bssid;
		let beacon_interval_tu = network.beacon_interval_tu;
		info!("joined existing IBSS {bssid:02x?}");
		self.ibss_config_beacon(bssid, beacon_interval_tu);
		self.ibss_schedule_beacon(interval_us);
	}

	/// A join that found nothing founds a new IBSS under a locally
	/// administered BSSID.
	pub(crate) fn ibss_join_failed(&mut self, _ibss: &mut IbssState, err: JoinError) {
		if err != JoinError::Timeout {
			return;
		}
		let ssid = truncate_ssid(self.join.target_ssid());
		if ssid.is_empty() {
			return;
		}
		let mut bssid: MacAddr = self.mac_addr;
		bssid[0] |= MAC_ADDR_MSB_MASK_LOCAL;
		let now = self.mac_time_usec();
		let handle = match self.networks.get_or_create(&bssid, now) {
			Ok(handle) => handle,
			Err(err) => {
				warn!("cannot create IBSS entry: {err}");
				return;
			}
		};
		let config = self.config.clone();
		let network = self.networks.get_mut(handle).unwrap();
		network.ssid = ssid.clone();
		network.chan_spec = ChanSpec::bw20(config.channel);
		network.beacon_interval_tu = config.beacon_interval_tu;
		network.capabilities = Capabilities::IBSS | Capabilities::SHORT_TIMESLOT;
		network.ht_capable = config.ht_capable;
		network.state = BssState::Owned;
		network.flags |= NetworkFlags::KEEP;
		self.my_network = Some(handle);
		self.set_channel(config.channel);
		info!(
			"created new IBSS {:?} as {bssid:02x?} on channel {}",
			ssid.as_str(),
			config.channel
		);
		self.ibss_config_beacon(bssid, config.beacon_interval_tu);
		self.ibss_schedule_beacon(u64::from(config.beacon_interval_tu) * MICROSECONDS_PER_TU);
	}

	fn ibss_config_beacon(&mut self, bssid: MacAddr, beacon_interval_tu: u16) {
		let _ = self.mailbox.send(IpcMessage::ConfigBeaconTxRx {
			config: BeaconTxRxConfig {
				ts_update_mode: self.ts_update_mode,
				bssid_match: bssid,
				beacon_interval_tu,
				dtim_period: 1,
			},
		});
	}

	/// One-shot TBTT scheduling: each transmission re-arms the next, so
	/// a TSF resync can rephase the schedule by cancelling a single
	/// event.
	pub(crate) fn ibss_schedule_beacon(&mut self, delay_us: u64) {
		self.cancel_beacon_schedule();
		let now = self.system_time_usec();
		let id =
			self.scheduler
				.schedule_once(SchedClass::Fine, now, delay_us, SchedEvent::BeaconTransmit);
		self.beacon_sched = Some(id);
	}

	pub(crate) fn ibss_beacon_transmit(&mut self, _ibss: &mut IbssState) {
		let Some(network) = self.my_network.and_then(|h| self.networks.get(h)) else {
			return;
		};
		let bssid = network.bssid;
		let ssid = network.ssid.clone();
		let beacon_interval_tu = network.beacon_interval_tu;
		let channel = network.chan_spec.chan_pri;
		let ht_capable = network.ht_capable;
		let capabilities = network.capabilities;

		// Re-arm first so a Tx stall cannot silence the TBTT chain.
		self.ibss_schedule_beacon(u64::from(beacon_interval_tu) * MICROSECONDS_PER_TU);

		let self_addr = self.mac_addr;
		let params = self.mcast_mgmt_tx_params;
		self.enqueue_frame(
			BEACON_QID,
			QueueMetadata::TxParams(params),
			TxFlags::FILL_TIMESTAMP | TxFlags::REQ_BO | TxFlags::AUTOCANCEL,
			0,
			move |buf| {
				frame::create_beacon_probe_resp(
					buf,
					FrameControl1::Beacon,
					&BCAST_ADDR,
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

	/// Station and counts entries appear on first reception from a new
	/// peer.
	fn ibss_ensure_peer(&mut self, addr: MacAddr) {
		if addr == self.mac_addr {
			return;
		}
		let Some(handle) = self.my_network else {
			return;
		};
		let now = self.mac_time_usec();
		let added = {
			let Some(network) = self.networks.get_mut(handle) else {
				return;
			};
			if self.stations.find_addr(&network.members, &addr).is_some() {
				return;
			}
			self.stations
				.add(&mut network.members, addr, None, IBSS_MAX_PEER_ID, now)
		};
		if let Ok(station_handle) = added {
			let counts = self.counts.get_or_create(&addr, now).ok();
			if let Some(station) = self.stations.get_mut(station_handle) {
				station.counts = counts;
			}
			debug!("new IBSS peer {addr:02x?}");
		}
	}
}

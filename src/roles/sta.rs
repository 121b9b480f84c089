//! Station role.

use log::{debug, info};

use crate::config::{ASSOCIATION_TIMEOUT_USEC, PHY_T_OFFSET_USEC};
use crate::frame::{
	self, AssocRespFixed, AuthBody, BeaconFixed, Capabilities, FrameControl1, FrameControl2,
	MacHeader, AUTH_ALGO_OPEN_SYSTEM, AUTH_SEQ_REQ, AUTH_SEQ_RESP,
};
use crate::ipc::MacTimeUpdateMode;
use crate::mac_high::MacHigh;
use crate::network::{BssState, NetworkFlags, StationFlags};
use crate::pktbuf::{RxFrameInfo, TxFlags};
use crate::queue::{QueueMetadata, MANAGEMENT_QID};
use crate::roles::StaState;

impl MacHigh {
	pub(crate) fn sta_rx(
		&mut self,
		sta: &mut StaState,
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
			Ok(FrameControl1::Auth) => {
				if my_bssid != Some(header.address_3) {
					return;
				}
				let Some(auth) = AuthBody::parse(body) else {
					return;
				};
				if auth.algorithm != AUTH_ALGO_OPEN_SYSTEM
					|| auth.auth_sequence != AUTH_SEQ_RESP
				{
					return;
				}
				if auth.status_code == frame::status::SUCCESS {
					if let Some(handle) = self.my_network {
						if let Some(network) = self.networks.get_mut(handle) {
							network.state = BssState::Authenticated;
						}
					}
				}
				let now = self.system_time_usec();
				let action = self.join.on_auth_response(auth.status_code, now);
				self.handle_join_action(action);
			}
			Ok(FrameControl1::AssocResp) | Ok(FrameControl1::ReassocResp) => {
				if my_bssid != Some(header.address_3) {
					return;
				}
				let Some(resp) = AssocRespFixed::parse(body) else {
					return;
				};
				match self.join.on_assoc_response(resp.status_code, resp.aid) {
					Ok(aid) => self.sta_association_complete(sta, aid),
					Err(action) => self.handle_join_action(action),
				}
			}
			Ok(FrameControl1::Beacon) | Ok(FrameControl1::ProbeResp) => {
				if my_bssid != Some(header.address_3) {
					return;
				}
				self.sta_beacon_from_ap(body, rx_info);
			}
			Ok(FrameControl1::Deauth) | Ok(FrameControl1::Disassoc) => {
				if my_bssid == Some(header.address_3) {
					info!("deauthenticated by the AP");
					self.sta_disassociate(sta);
				}
			}
			Ok(FrameControl1::Data) | Ok(FrameControl1::QosData) => {
				// Frames from the DS addressed to this node are bridged
				// to Ethernet.
				if header.frame_control_2.contains(FrameControl2::FROM_DS)
					&& my_bssid == Some(header.address_2)
				{
					self.bridge_to_eth(mpdu);
				}
			}
			_ => {}
		}
	}

	fn sta_beacon_from_ap(&mut self, body: &[u8], rx_info: &RxFrameInfo) {
		let Some(handle) = self.my_network else {
			return;
		};
		let now = self.mac_time_usec();
		self.networks.touch(handle, now);
		if self.ts_update_mode == MacTimeUpdateMode::Always {
			if let Some(fixed) = BeaconFixed::parse(body) {
				let delta = fixed.timestamp as i64 - rx_info.timestamp.get() as i64
					+ PHY_T_OFFSET_USEC as i64;
				self.follow_tsf(delta);
			}
		}
	}

	/// (Re)sends the Open System authentication request.
	pub(crate) fn sta_send_auth_req(&mut self) {
		let Some(bssid) = self
			.my_network
			.and_then(|h| self.networks.get(h))
			.map(|n| n.bssid)
		else {
			return;
		};
		let self_addr = self.mac_addr;
		let params = self.ucast_mgmt_tx_params;
		debug!("sending auth request to {bssid:02x?}");
		self.enqueue_frame(
			MANAGEMENT_QID,
			QueueMetadata::TxParams(params),
			TxFlags::FILL_DURATION | TxFlags::REQ_TO,
			0,
			move |buf| {
				frame::create_auth(
					buf,
					&bssid,
					&self_addr,
					&bssid,
					0,
					AUTH_ALGO_OPEN_SYSTEM,
					AUTH_SEQ_REQ,
					frame::status::SUCCESS,
				)
			},
		);
	}

	/// (Re)sends the association request.
	pub(crate) fn sta_send_assoc_req(&mut self) {
		let Some(network) = self.my_network.and_then(|h| self.networks.get(h)) else {
			return;
		};
		let bssid = network.bssid;
		let ssid = network.ssid.clone();
		let self_addr = self.mac_addr;
		let params = self.ucast_mgmt_tx_params;
		debug!("sending association request to {bssid:02x?}");
		self.enqueue_frame(
			MANAGEMENT_QID,
			QueueMetadata::TxParams(params),
			TxFlags::FILL_DURATION | TxFlags::REQ_TO,
			0,
			move |buf| {
				frame::create_assoc_req(
					buf,
					FrameControl1::AssocReq,
					&bssid,
					&self_addr,
					&bssid,
					0,
					Capabilities::ESS | Capabilities::SHORT_TIMESLOT,
					1,
					ssid.as_str(),
				)
			},
		);
	}

	fn sta_association_complete(&mut self, sta: &mut StaState, aid: u16) {
		sta.aid = aid;
		let Some(handle) = self.my_network else {
			return;
		};
		let now = self.mac_time_usec();
		let bssid = {
			let Some(network) = self.networks.get_mut(handle) else {
				return;
			};
			network.state = BssState::Associated;
			network.flags |= NetworkFlags::KEEP;
			network.last_join_attempt_result = crate::network::JoinAttemptResult::Successful;
			network.last_join_attempt_timestamp = now;
			network.bssid
		};
		// The AP is the single peer, always id 1.
		let added = {
			let network = self.networks.get_mut(handle).unwrap();
			self.stations
				.add(&mut network.members, bssid, Some(1), 1, now)
		};
		if let Ok(station_handle) = added {
			let counts = self.counts.get_or_create(&bssid, now).ok();
			if let Some(station) = self.stations.get_mut(station_handle) {
				station.counts = counts;
				station.flags |= StationFlags::DISABLE_ASSOC_CHECK;
			}
		}
		self.config_beacon_match(bssid);
		info!("associated to {bssid:02x?} with AID {aid}");
	}

	/// Internal disassociation: beacon loss or deauth from the AP.
	pub(crate) fn sta_disassociate(&mut self, sta: &mut StaState) {
		let Some(handle) = self.my_network else {
			return;
		};
		let bssid = self.networks.get(handle).map(|n| n.bssid);
		if let Some(bssid) = bssid {
			self.remove_station(&bssid);
		}
		if let Some(network) = self.networks.get_mut(handle) {
			network.state = BssState::Unauthenticated;
			network.flags &= !NetworkFlags::KEEP;
		}
		sta.aid = 0;
		self.my_network = None;
		info!("disassociated from the AP");
	}

	/// 1 Hz watchdog: repeated beacon misses past the association
	/// timeout tear the link down locally.
	pub(crate) fn sta_link_check(&mut self, sta: &mut StaState) {
		let Some(handle) = self.my_network else {
			return;
		};
		let Some(network) = self.networks.get(handle) else {
			return;
		};
		if network.state != BssState::Associated {
			return;
		}
		let now = self.mac_time_usec();
		if now.saturating_sub(network.latest_activity_timestamp) > ASSOCIATION_TIMEOUT_USEC {
			info!("AP lost (no beacons); disassociating");
			self.sta_disassociate(sta);
		}
	}
}

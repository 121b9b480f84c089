//! Access point role.

use log::{debug, info, warn};

use crate::frame::{
	self, status, AuthBody, BeaconParams, Capabilities, FrameControl1, FrameControl2, MacHeader,
	TimInfo, AUTH_ALGO_OPEN_SYSTEM, AUTH_SEQ_REQ, AUTH_SEQ_RESP,
};
use crate::ipc::ChanSpec;
use crate::mac_high::MacHigh;
use crate::network::{BssState, NetworkFlags};
use crate::pktbuf::{RxFrameInfo, TxFlags};
use crate::platform::UserIoStatus;
use crate::queue::{QueueMetadata, BEACON_QID, MANAGEMENT_QID, MCAST_QID};
use crate::roles::ApState;
use crate::{addr_is_mcast, MacAddr, BCAST_ADDR};

/// Cap on peers that may sit in the authenticated-but-not-associated
/// set.
const MAX_NUM_AUTH: usize = 32;

impl MacHigh {
	/// Brings up the owned network at boot: the BSSID is the node
	/// address, the entry is pinned, and beaconing starts immediately.
	pub(crate) fn ap_start_network(&mut self) {
		let now = self.mac_time_usec();
		let bssid = self.mac_addr;
		let handle = match self.networks.get_or_create(&bssid, now) {
			Ok(handle) => handle,
			Err(err) => {
				warn!("cannot create own network entry: {err}");
				return;
			}
		};
		let config = self.config.clone();
		let network = self.networks.get_mut(handle).unwrap();
		network.ssid = config.ssid.clone();
		network.chan_spec = ChanSpec::bw20(config.channel);
		network.beacon_interval_tu = config.beacon_interval_tu;
		network.dtim_period = config.dtim_period.max(1);
		network.capabilities = Capabilities::ESS | Capabilities::SHORT_TIMESLOT;
		network.ht_capable = config.ht_capable;
		network.state = BssState::Owned;
		network.flags |= NetworkFlags::KEEP;
		self.my_network = Some(handle);
		self.start_beacon_schedule();
		info!(
			"AP network {:?} up on channel {}, beacon interval {} TU",
			config.ssid.as_str(),
			config.channel,
			config.beacon_interval_tu
		);
	}

	/// Periodic beacon. Every `dtim_period`-th beacon is a DTIM: its
	/// TIM element advertises buffered multicast, which is then
	/// released to the service loop.
	pub(crate) fn ap_beacon_transmit(&mut self, ap: &mut ApState) {
		let Some(handle) = self.my_network else {
			return;
		};
		let Some(network) = self.networks.get(handle) else {
			return;
		};
		let bssid = network.bssid;
		let ssid = network.ssid.clone();
		let beacon_interval_tu = network.beacon_interval_tu;
		let dtim_period = network.dtim_period.max(1);
		let channel = network.chan_spec.chan_pri;
		let ht_capable = network.ht_capable;
		let capabilities = network.capabilities;

		let is_dtim = ap.dtim_count == 0;
		let mcast_pending = self.queues.num_queued(MCAST_QID) > 0;
		let tim = TimInfo {
			dtim_count: ap.dtim_count,
			dtim_period,
			bitmap_control: u8::from(is_dtim && mcast_pending),
			bitmap: 0,
		};
		ap.dtim_count = if is_dtim {
			dtim_period - 1
		} else {
			ap.dtim_count - 1
		};

		let self_addr = self.mac_addr;
		let params = self.mcast_mgmt_tx_params;
		self.enqueue_frame(
			BEACON_QID,
			QueueMetadata::TxParams(params),
			TxFlags::FILL_TIMESTAMP,
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
						tim: Some(tim),
					},
				)
			},
		);

		if is_dtim && mcast_pending {
			// Drain the multicast queue right behind the DTIM beacon.
			self.dtim_mcast_release = true;
		}
	}

	pub(crate) fn ap_rx(
		&mut self,
		ap: &mut ApState,
		header: &MacHeader,
		body: &[u8],
		_rx_info: &RxFrameInfo,
		mpdu: &[u8],
	) {
		match FrameControl1::try_from(header.frame_control_1) {
			Ok(FrameControl1::ProbeReq) => {
				if self.probe_req_matches(body) {
					self.send_probe_response(header.address_2);
				}
			}
			Ok(FrameControl1::Auth) => self.ap_handle_auth(ap, header, body),
			Ok(FrameControl1::AssocReq) => self.ap_handle_assoc(ap, header, body, false),
			Ok(FrameControl1::ReassocReq) => self.ap_handle_assoc(ap, header, body, true),
			Ok(FrameControl1::Deauth) => {
				// Accepted silently.
				debug!("deauth from {:02x?}", header.address_2);
				ap.authenticated.retain(|a| a != &header.address_2);
				self.remove_station(&header.address_2);
			}
			Ok(FrameControl1::Disassoc) => {
				// Back to authenticated, association torn down.
				self.remove_station(&header.address_2);
			}
			Ok(FrameControl1::Data) | Ok(FrameControl1::QosData) => {
				self.ap_handle_data(header, mpdu)
			}
			Ok(FrameControl1::NullData) => {
				// Power-state tracking already happened on the common
				// Rx path.
			}
			_ => {}
		}
	}

	fn ap_handle_auth(&mut self, ap: &mut ApState, header: &MacHeader, body: &[u8]) {
		let Some(auth) = AuthBody::parse(body) else {
			return;
		};
		if auth.algorithm != AUTH_ALGO_OPEN_SYSTEM || auth.auth_sequence != AUTH_SEQ_REQ {
			// Shared Key is not implemented.
			return;
		}
		let peer = header.address_2;
		let allowed = self.addr_filter.is_allowed(&peer);
		let status_code = if allowed {
			if !ap.authenticated.contains(&peer) {
				if ap.authenticated.len() >= MAX_NUM_AUTH {
					ap.authenticated.remove(0);
				}
				ap.authenticated.push(peer);
			}
			status::SUCCESS
		} else {
			debug!("auth from {peer:02x?} blocked by address filter");
			status::AUTH_REJECT_UNSPECIFIED
		};

		let bssid = self.mac_addr;
		let params = self.ucast_mgmt_tx_params;
		self.enqueue_frame(
			MANAGEMENT_QID,
			QueueMetadata::TxParams(params),
			TxFlags::FILL_DURATION | TxFlags::REQ_TO,
			0,
			move |buf| {
				frame::create_auth(
					buf,
					&peer,
					&bssid,
					&bssid,
					0,
					AUTH_ALGO_OPEN_SYSTEM,
					AUTH_SEQ_RESP,
					status_code,
				)
			},
		);
	}

	fn ap_handle_assoc(
		&mut self,
		ap: &mut ApState,
		header: &MacHeader,
		body: &[u8],
		reassoc: bool,
	) {
		let peer = header.address_2;
		let Some((req, _ies_off)) = frame::AssocReqFixed::parse(body, reassoc) else {
			return;
		};
		let _ = req;
		let max_associations = self.config.max_associations;
		let now = self.mac_time_usec();

		// Only authenticated peers may associate; a full table rejects
		// with "too many associations" either way.
		let mut aid = 0;
		let mut status_code = status::REJECT_TOO_MANY_ASSOCIATIONS;
		if ap.authenticated.contains(&peer) {
			if let Some(handle) = self.my_network {
				let added = {
					let Some(network) = self.networks.get_mut(handle) else {
						return;
					};
					self.stations
						.add(&mut network.members, peer, None, max_associations, now)
				};
				if let Ok(station_handle) = added {
					let counts = self.counts.get_or_create(&peer, now).ok();
					let station = self.stations.get_mut(station_handle).unwrap();
					station.counts = counts;
					aid = station.id;
					status_code = status::SUCCESS;
				}
			}
		}

		if status_code == status::SUCCESS {
			let member_count = self
				.my_network
				.and_then(|h| self.networks.get(h))
				.map_or(0, |n| n.members.len());
			info!("station {peer:02x?} associated with AID {aid} ({member_count} members)");
			self.platform
				.display_status(UserIoStatus::MemberListUpdate, member_count);
		} else {
			debug!("association of {peer:02x?} rejected with status {status_code}");
		}

		// The response subtype mirrors the request subtype.
		let resp_subtype = if reassoc {
			FrameControl1::ReassocResp
		} else {
			FrameControl1::AssocResp
		};
		let bssid = self.mac_addr;
		let params = self.ucast_mgmt_tx_params;
		let capabilities = Capabilities::ESS | Capabilities::SHORT_TIMESLOT;
		self.enqueue_frame(
			MANAGEMENT_QID,
			QueueMetadata::TxParams(params),
			TxFlags::FILL_DURATION | TxFlags::REQ_TO,
			0,
			move |buf| {
				frame::create_assoc_resp(
					buf,
					resp_subtype,
					&peer,
					&bssid,
					&bssid,
					0,
					capabilities,
					status_code,
					aid,
				)
			},
		);
	}

	fn ap_handle_data(&mut self, header: &MacHeader, mpdu: &[u8]) {
		if !header.frame_control_2.contains(FrameControl2::TO_DS) {
			return;
		}
		let from_member = self
			.my_network
			.and_then(|h| self.networks.get(h))
			.map(|n| n.members)
			.and_then(|m| self.stations.find_addr(&m, &header.address_2))
			.is_some();
		if !from_member {
			// Data from a station that never associated: tell it so.
			self.send_deauth(header.address_2, frame::reason::NONASSOCIATED_STA);
			return;
		}

		let Some(decapped) = crate::eth::decap(mpdu) else {
			return;
		};
		let dst = decapped.dst;
		if addr_is_mcast(&dst) {
			// Group traffic goes to the DS and back into the air.
			self.bridge_to_eth(mpdu);
			self.ap_relay(mpdu);
			return;
		}
		let dst_is_member = self
			.my_network
			.and_then(|h| self.networks.get(h))
			.map(|n| n.members)
			.and_then(|m| self.stations.find_addr(&m, &dst))
			.is_some();
		if dst_is_member {
			self.ap_relay(mpdu);
		} else {
			self.bridge_to_eth(mpdu);
		}
	}

	/// Re-encapsulates an intra-BSS frame towards its wireless
	/// destination.
	fn ap_relay(&mut self, mpdu: &[u8]) {
		let Some(decapped) = crate::eth::decap(mpdu) else {
			return;
		};
		let mut eth_frame = [0u8; crate::config::MAX_PKT_SIZE_B];
		let len = crate::eth::decap_to_eth(&mut eth_frame, &decapped);
		self.enqueue_wireless_eth(&eth_frame[..len]);
	}

	/// 1 Hz sweep deauthenticating idle associated stations.
	pub(crate) fn ap_inactivity_sweep(&mut self, ap: &mut ApState) {
		let now = self.mac_time_usec();
		let Some(members) = self
			.my_network
			.and_then(|h| self.networks.get(h))
			.map(|n| n.members)
		else {
			return;
		};
		let victims: alloc::vec::Vec<MacAddr> = self
			.stations
			.iter_members(&members)
			.filter_map(|h| self.stations.get(h))
			.filter(|s| {
				!s.flags
					.contains(crate::network::StationFlags::DISABLE_ASSOC_CHECK)
					&& now.saturating_sub(s.latest_rx_timestamp)
						> crate::config::ASSOCIATION_TIMEOUT_USEC
			})
			.map(|s| s.addr)
			.collect();
		for addr in victims {
			info!("deauthenticating idle station {addr:02x?}");
			self.send_deauth(addr, frame::reason::INACTIVITY);
			ap.authenticated.retain(|a| a != &addr);
			self.remove_station(&addr);
		}
	}
}

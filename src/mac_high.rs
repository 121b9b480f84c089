//! The upper-MAC context and its main loop.
//!
//! [`MacHigh`] owns every store of the design and is driven from a
//! single cooperative poll loop: drain the mailbox, fire due scheduler
//! events, service the Tx queues. There is no global mutable state;
//! everything reachable from an entry point is reachable through the
//! context, which is what makes the state machines testable.

use alloc::sync::Arc;

use log::{debug, error, info, trace, warn};
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use zerocopy::FromZeroes;

use crate::collections::Handle;
use crate::config::{
	self, ASSOCIATION_CHECK_INTERVAL_USEC, CPU_LOW_DATA_REQ_TIMEOUT_USEC, MAX_PKT_SIZE_B,
	MICROSECONDS_PER_TU, TIMESTAMP_CHECK_INTERVAL_USEC,
};
use crate::error::MacError;
use crate::eth::{self, EncapMode};
use crate::eventlog::{
	EntryType, EventLog, NodeInfoEntry, RxCommonEntry, TimeInfoEntry, TimeInfoReason, TxHighEntry,
	TxLowEntry,
};
use crate::frame::{self, FrameControl1, FrameControl2, MacHeader};
use crate::ipc::{
	cpu_status, ChanSpec, IpcMessage, MacTimeUpdateMode, MailboxEndpoint, RxFilter, TimeUpdate,
};
use crate::join::{JoinAction, JoinFsm};
use crate::ltg::{self, LtgStore};
use crate::network::{
	BeaconObservation, CountsStore, NetworkStore, Ssid, StationFlags, StationStore,
};
use crate::pktbuf::{
	PhyMode, PktBufPool, RxFrameInfo, RxPktBufState, TxFlags, TxLowDetails, TxParams,
	TxPktBufState, TxResult, CPU_HIGH_MUTEX_ID,
};
use crate::platform::{EthernetPlane, PlatformPlane, TimerPlane, UserIoStatus};
use crate::queue::{
	station_id_to_queue_id, QueueId, QueueManager, QueueMetadata, BEACON_QID, MANAGEMENT_QID,
	MCAST_QID,
};
use crate::roles::{AddrFilter, ApState, IbssState, RoleState, StaState};
use crate::scan::{ScanAdvance, ScanFsm, ScanState};
use crate::scheduler::{SchedClass, SchedId, Scheduler, SCHEDULE_REPEAT_FOREVER};
use crate::{addr_is_mcast, MacAddr, BCAST_ADDR};

/// Node role, fixed at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	Ap,
	Sta,
	Ibss,
}

/// Event tokens dispatched by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedEvent {
	BeaconTransmit,
	ScanDwell,
	ScanProbe,
	ScanIdleDone,
	JoinPoll,
	NetworkCheck,
	CountsCheck,
	AssociationCheck,
	Ltg(u32),
}

/// Boot-time configuration of the context.
#[derive(Debug, Clone)]
pub struct MacConfig {
	pub role: Role,
	pub channel: u8,
	/// SSID of the owned network (AP) or default target (IBSS).
	pub ssid: Ssid,
	pub beacon_interval_tu: u16,
	pub dtim_period: u8,
	pub max_associations: u16,
	/// Occupancy cap of any single data queue.
	pub max_queue_len: u32,
	pub num_queue_elements: usize,
	pub event_log_bytes: usize,
	pub ht_capable: bool,
}

impl MacConfig {
	pub fn new(role: Role) -> Self {
		Self {
			role,
			channel: config::DEFAULT_CHANNEL,
			ssid: Ssid::new(),
			beacon_interval_tu: 100,
			dtim_period: 1,
			max_associations: config::DEFAULT_MAX_ASSOCIATIONS,
			max_queue_len: config::DEFAULT_MAX_QUEUE_LEN as u32,
			num_queue_elements: config::DEFAULT_NUM_TX_QUEUE_ELEMENTS,
			event_log_bytes: config::DEFAULT_EVENT_LOG_SIZE,
			ht_capable: false,
		}
	}
}

/// External collaborators injected at boot.
pub struct MacHighDeps {
	pub clock: Arc<dyn TimerPlane>,
	pub eth: Arc<dyn EthernetPlane>,
	pub platform: Arc<dyn PlatformPlane>,
	pub mailbox: MailboxEndpoint,
	pub pktbufs: Arc<PktBufPool>,
}

struct TxPending {
	slot: usize,
	element: Handle,
}

/// The upper-MAC context.
pub struct MacHigh {
	pub config: MacConfig,
	pub(crate) mac_addr: MacAddr,
	clock: Arc<dyn TimerPlane>,
	eth_plane: Arc<dyn EthernetPlane>,
	pub(crate) platform: Arc<dyn PlatformPlane>,
	pub(crate) mailbox: MailboxEndpoint,
	pktbufs: Arc<PktBufPool>,
	pub queues: QueueManager,
	pub scheduler: Scheduler<SchedEvent>,
	pub networks: NetworkStore,
	pub stations: StationStore,
	pub counts: CountsStore,
	pub eventlog: EventLog,
	pub ltg: LtgStore,
	pub scan: ScanFsm,
	pub join: JoinFsm,
	pub addr_filter: AddrFilter,
	pub(crate) role: RoleState,
	rng: ChaCha8Rng,
	pub(crate) my_network: Option<Handle>,
	unique_seq: u64,
	cpu_low_initialized: bool,
	tx_pending: Option<TxPending>,
	tx_ready_time: u64,
	rr_cursor: usize,
	pub(crate) dtim_mcast_release: bool,
	pub(crate) pause_data_queue: bool,
	portal_enabled: bool,
	pub(crate) ts_update_mode: MacTimeUpdateMode,
	pub(crate) beacon_sched: Option<SchedId>,
	scan_dwell_sched: Option<SchedId>,
	scan_probe_sched: Option<SchedId>,
	join_poll_sched: Option<SchedId>,
	mac_param_chan: u8,
	pub ucast_data_tx_params: TxParams,
	pub ucast_mgmt_tx_params: TxParams,
	pub mcast_data_tx_params: TxParams,
	pub mcast_mgmt_tx_params: TxParams,
	fatal: Option<MacError>,
}

impl MacHigh {
	pub fn new(config: MacConfig, deps: MacHighDeps) -> Self {
		let hw_info = deps.platform.hw_info();
		let boot_time = deps.clock.system_time_usec();

		// Clean up mutex state a soft reset may have left behind.
		deps.pktbufs.unlock_all(CPU_HIGH_MUTEX_ID);

		let ts_update_mode = match config.role {
			Role::Ap => MacTimeUpdateMode::Never,
			Role::Sta => MacTimeUpdateMode::Always,
			Role::Ibss => MacTimeUpdateMode::FutureOnly,
		};
		let role = match config.role {
			Role::Ap => RoleState::Ap(ApState::new()),
			Role::Sta => RoleState::Sta(StaState::new()),
			Role::Ibss => RoleState::Ibss(IbssState::new()),
		};

		let mut mac = Self {
			mac_addr: hw_info.hw_addr_wlan,
			clock: deps.clock,
			eth_plane: deps.eth,
			platform: deps.platform,
			mailbox: deps.mailbox,
			pktbufs: deps.pktbufs,
			queues: QueueManager::new(config.num_queue_elements),
			scheduler: Scheduler::new(),
			networks: NetworkStore::new(),
			stations: StationStore::new(),
			counts: CountsStore::new(),
			eventlog: EventLog::new(config.event_log_bytes),
			ltg: LtgStore::new(),
			scan: ScanFsm::new(),
			join: JoinFsm::new(),
			addr_filter: AddrFilter::new(),
			role,
			rng: ChaCha8Rng::seed_from_u64(boot_time ^ u64::from(hw_info.serial_number)),
			my_network: None,
			unique_seq: 0,
			cpu_low_initialized: false,
			tx_pending: None,
			tx_ready_time: 0,
			rr_cursor: 0,
			dtim_mcast_release: false,
			pause_data_queue: false,
			portal_enabled: true,
			ts_update_mode,
			beacon_sched: None,
			scan_dwell_sched: None,
			scan_probe_sched: None,
			join_poll_sched: None,
			mac_param_chan: config.channel,
			ucast_data_tx_params: TxParams::new(3, PhyMode::NonHt, 0, config::DEFAULT_TX_POWER_DBM),
			ucast_mgmt_tx_params: TxParams::new(0, PhyMode::NonHt, 0, config::DEFAULT_TX_POWER_DBM),
			mcast_data_tx_params: TxParams::new(0, PhyMode::NonHt, 0, config::DEFAULT_TX_POWER_DBM),
			mcast_mgmt_tx_params: TxParams::new(0, PhyMode::NonHt, 0, config::DEFAULT_TX_POWER_DBM),
			config,
			fatal: None,
		};

		let now = mac.system_time_usec();
		mac.scheduler.schedule_repeated(
			SchedClass::Coarse,
			now,
			TIMESTAMP_CHECK_INTERVAL_USEC,
			SCHEDULE_REPEAT_FOREVER,
			SchedEvent::NetworkCheck,
		);
		mac.scheduler.schedule_repeated(
			SchedClass::Coarse,
			now,
			TIMESTAMP_CHECK_INTERVAL_USEC,
			SCHEDULE_REPEAT_FOREVER,
			SchedEvent::CountsCheck,
		);
		mac.scheduler.schedule_repeated(
			SchedClass::Coarse,
			now,
			ASSOCIATION_CHECK_INTERVAL_USEC,
			SCHEDULE_REPEAT_FOREVER,
			SchedEvent::AssociationCheck,
		);

		let _ = mac.mailbox.send(IpcMessage::SetMacAddr { addr: mac.mac_addr });
		let _ = mac.mailbox.send(IpcMessage::ConfigChannel {
			chan: ChanSpec::bw20(mac.mac_param_chan),
		});
		let _ = mac.mailbox.send(IpcMessage::ConfigRxFilter {
			filter: RxFilter::FCS_ALL | RxFilter::HDR_ALL_MPDU,
		});

		let mut node_info = NodeInfoEntry::new_zeroed();
		node_info.timestamp.set(mac.mac_time_usec());
		node_info.node_role.set(match mac.config.role {
			Role::Ap => 1,
			Role::Sta => 2,
			Role::Ibss => 3,
		});
		node_info.serial_number.set(hw_info.serial_number);
		node_info.wlan_addr = mac.mac_addr;
		mac.eventlog.append(EntryType::NodeInfo, &node_info);

		if mac.config.role == Role::Ap {
			mac.ap_start_network();
		}

		info!(
			"wlan_mac_high boot complete, role {:?}, addr {:02x?}",
			mac.config.role, mac.mac_addr
		);
		mac
	}

	pub fn mac_addr(&self) -> MacAddr {
		self.mac_addr
	}

	pub fn channel(&self) -> u8 {
		self.mac_param_chan
	}

	pub fn my_network(&self) -> Option<Handle> {
		self.my_network
	}

	pub fn mac_time_usec(&self) -> u64 {
		self.clock.mac_time_usec()
	}

	pub fn system_time_usec(&self) -> u64 {
		self.clock.system_time_usec()
	}

	/// Sets the MAC time, logging the change for host correlation.
	pub fn set_mac_time_usec(&mut self, new_time: u64) {
		let mut entry = TimeInfoEntry::new_zeroed();
		entry.timestamp.set(self.mac_time_usec());
		entry.reason.set(TimeInfoReason::SetTime as u32);
		entry.mac_timestamp.set(new_time);
		entry.system_timestamp.set(self.system_time_usec());
		entry.host_timestamp.set(u64::MAX);
		self.eventlog.append(EntryType::TimeInfo, &entry);

		self.clock.set_mac_time_usec(new_time);
		let _ = self.mailbox.send(IpcMessage::TimeUpdate {
			update: TimeUpdate::Set(new_time),
		});
	}

	pub fn apply_mac_time_delta_usec(&mut self, delta: i64) {
		let new_time = self.mac_time_usec().wrapping_add_signed(delta);
		self.set_mac_time_usec(new_time);
	}

	/// TSF follow on beacon reception. Unlike [`Self::set_mac_time_usec`]
	/// this does not write a time-info log entry (it runs once per
	/// beacon).
	pub(crate) fn follow_tsf(&mut self, delta: i64) {
		self.clock.apply_mac_time_delta_usec(delta);
		let _ = self.mailbox.send(IpcMessage::TimeUpdate {
			update: TimeUpdate::Delta(delta),
		});
	}

	/// Tunes the radio. The operating channel is remembered so a scan
	/// can restore it.
	pub fn set_channel(&mut self, channel: u8) {
		self.mac_param_chan = channel;
		self.tune(channel);
	}

	pub(crate) fn tune(&mut self, channel: u8) {
		let _ = self.mailbox.send(IpcMessage::ConfigChannel {
			chan: ChanSpec::bw20(channel),
		});
	}

	pub fn set_tx_ctrl_power(&mut self, power_dbm: i8) {
		let _ = self
			.mailbox
			.send(IpcMessage::ConfigTxCtrlPower { power_dbm });
	}

	pub fn set_rx_ant_mode(&mut self, mode: u8) {
		let _ = self.mailbox.send(IpcMessage::ConfigRxAntMode { mode });
	}

	pub fn set_rx_filter(&mut self, filter: RxFilter) {
		let _ = self.mailbox.send(IpcMessage::ConfigRxFilter { filter });
	}

	/// Gates the Ethernet portal without touching the wireless FSMs.
	pub fn portal_enable(&mut self, enable: bool) {
		self.portal_enabled = enable;
	}

	pub fn cpu_low_initialized(&self) -> bool {
		self.cpu_low_initialized
	}

	/// One iteration of the main loop.
	pub fn poll(&mut self) -> Result<(), MacError> {
		if let Some(fatal) = self.fatal {
			return Err(fatal);
		}
		while let Some(msg) = self.mailbox.recv() {
			self.process_ipc_msg(msg);
			if let Some(fatal) = self.fatal {
				return Err(fatal);
			}
		}

		let now = self.system_time_usec();
		for class in [SchedClass::Fine, SchedClass::Coarse] {
			let fired = self.scheduler.poll(class, now);
			for (_, event) in fired {
				self.dispatch_event(event);
			}
		}

		// Bound the wait on CPU-Low accepting a staged frame.
		if let Some(pending) = &self.tx_pending {
			if now.saturating_sub(self.tx_ready_time) > CPU_LOW_DATA_REQ_TIMEOUT_USEC {
				warn!("CPU-Low did not accept pkt buf {} in time", pending.slot);
				let element = pending.element;
				let slot = pending.slot;
				self.tx_pending = None;
				if let Ok(mut guard) = self.pktbufs.try_lock_tx(slot, CPU_HIGH_MUTEX_ID) {
					guard.frame_info_mut().set_state(TxPktBufState::Uninitialized);
				}
				self.release_tx_element(element);
			}
		}

		self.queues.take_events();
		self.poll_tx_queues();
		Ok(())
	}

	fn process_ipc_msg(&mut self, msg: IpcMessage) {
		match msg {
			IpcMessage::TxDone { pkt_buf, details } => {
				self.handle_tx_done(pkt_buf as usize, &details)
			}
			IpcMessage::RxReady { pkt_buf } => self.handle_rx_ready(pkt_buf as usize),
			IpcMessage::CpuStatus { status } => {
				if status & cpu_status::EXCEPTION != 0 {
					let code = cpu_status::exception_code(status);
					error!("CPU-Low exception {code:#x}");
					self.platform.display_status(UserIoStatus::CpuError, code);
					self.fatal = Some(MacError::CpuLowException(code));
				} else if status & cpu_status::INITIALIZED != 0 && !self.cpu_low_initialized {
					info!("CPU-Low initialized");
					self.cpu_low_initialized = true;
				}
			}
			other => {
				// Config traffic is high-to-low only.
				warn!("unexpected mailbox message {:?}", other.id());
			}
		}
	}

	fn dispatch_event(&mut self, event: SchedEvent) {
		match event {
			SchedEvent::BeaconTransmit => self.beacon_transmit(),
			SchedEvent::ScanDwell => self.scan_dwell_expired(),
			SchedEvent::ScanProbe => self.scan_probe_fire(),
			SchedEvent::ScanIdleDone => self.scan_idle_done(),
			SchedEvent::JoinPoll => self.join_poll(),
			SchedEvent::NetworkCheck => {
				let now = self.system_time_usec();
				self.networks.timestamp_check(now);
			}
			SchedEvent::CountsCheck => {
				let now = self.system_time_usec();
				self.counts.timestamp_check(now);
			}
			SchedEvent::AssociationCheck => self.association_check(),
			SchedEvent::Ltg(id) => self.ltg_fire(id),
		}
	}

	// ------------------------------------------------------------------
	// Tx service loop
	// ------------------------------------------------------------------

	fn is_ready_for_tx(&self) -> bool {
		self.cpu_low_initialized && self.tx_pending.is_none()
	}

	/// Round-robin Tx service: submit at most one frame per call, with
	/// the cursor preserved between calls for fairness.
	pub fn poll_tx_queues(&mut self) {
		if !self.is_ready_for_tx() {
			return;
		}
		if self.pause_data_queue {
			// Off-channel (scanning): only management may go out.
			if self.queues.num_queued(MANAGEMENT_QID) > 0 {
				self.dequeue_transmit_checkin(MANAGEMENT_QID);
			}
			return;
		}

		let mut candidates: alloc::vec::Vec<QueueId> =
			alloc::vec![BEACON_QID, MANAGEMENT_QID, MCAST_QID];
		if let Some(members) = self
			.my_network
			.and_then(|h| self.networks.get(h))
			.map(|n| n.members)
		{
			for station in self.stations.iter_members(&members) {
				if let Some(info) = self.stations.get(station) {
					candidates.push(station_id_to_queue_id(info.id));
				}
			}
		}

		for i in 0..candidates.len() {
			let index = (self.rr_cursor + i) % candidates.len();
			let qid = candidates[index];
			if qid == MCAST_QID && self.mcast_held() {
				continue;
			}
			if self.queues.num_queued(qid) == 0 {
				continue;
			}
			if self.dequeue_transmit_checkin(qid) {
				self.rr_cursor = (index + 1) % candidates.len();
				return;
			}
		}
	}

	/// Whether multicast is withheld for dozing stations until the next
	/// DTIM beacon.
	fn mcast_held(&self) -> bool {
		if self.config.role != Role::Ap || self.dtim_mcast_release {
			return false;
		}
		let Some(members) = self
			.my_network
			.and_then(|h| self.networks.get(h))
			.map(|n| n.members)
		else {
			return false;
		};
		self.stations.iter_members(&members).any(|h| {
			self.stations
				.get(h)
				.is_some_and(|s| s.flags.contains(StationFlags::DOZE))
		})
	}

	/// Dequeues the head of `qid` and hands it to CPU-Low. Returns
	/// whether a frame was submitted.
	pub fn dequeue_transmit_checkin(&mut self, qid: QueueId) -> bool {
		let Some(element) = self.queues.dequeue_head(qid) else {
			return false;
		};
		if qid == MCAST_QID && self.queues.num_queued(MCAST_QID) == 0 {
			self.dtim_mcast_release = false;
		}

		// Resolve the Tx params; a frame whose owner station vanished
		// is released without staging.
		let metadata = self.queues.get(element).map(|b| b.metadata);
		let params = match metadata {
			Some(QueueMetadata::TxParams(params)) => params,
			Some(QueueMetadata::StationId(id)) => {
				match self.station_tx_params(id) {
					Some(params) => params,
					None => {
						debug!("dropping frame for departed station {id}");
						self.queues.checkin(element);
						return false;
					}
				}
			}
			Some(QueueMetadata::Ignore) => {
				self.queues.get(element).unwrap().frame_info.params
			}
			None => return false,
		};

		self.mpdu_dequeue(element);

		// Stage into a free Tx packet buffer.
		let mut staged = None;
		for slot in 0..config::NUM_TX_PKT_BUFS {
			let Ok(mut guard) = self.pktbufs.try_lock_tx(slot, CPU_HIGH_MUTEX_ID) else {
				continue;
			};
			let state = guard.frame_info().state();
			if matches!(state, Some(TxPktBufState::Ready) | Some(TxPktBufState::LowCtrl)) {
				continue;
			}
			let buffer = self.queues.get(element).unwrap();
			let len = buffer.frame_info.length.get() as usize;
			guard.frame_info_mut().set_state(TxPktBufState::HighCtrl);
			{
				let info = guard.frame_info_mut();
				*info = buffer.frame_info;
				info.params = params;
				info.set_state(TxPktBufState::HighCtrl);
			}
			guard.mpdu_mut()[..len].copy_from_slice(&buffer.frame[..len]);
			guard.frame_info_mut().set_state(TxPktBufState::Ready);
			staged = Some(slot);
			break;
		}
		let Some(slot) = staged else {
			warn!("no free tx packet buffer; frame dropped");
			self.release_tx_element(element);
			return false;
		};

		self.tx_pending = Some(TxPending { slot, element });
		self.tx_ready_time = self.system_time_usec();
		if self
			.mailbox
			.send(IpcMessage::TxReady {
				pkt_buf: slot as u8,
			})
			.is_err()
		{
			error!("mailbox full on TX_READY");
			self.tx_pending = None;
			self.release_tx_element(element);
			return false;
		}
		trace!("TX_READY slot {slot} from queue {}", qid.0);
		true
	}

	fn station_tx_params(&self, station_id: u16) -> Option<TxParams> {
		let network = self.networks.get(self.my_network?)?;
		let handle = self.stations.find_id(&network.members, station_id)?;
		self.stations.get(handle).map(|s| s.tx_params)
	}

	/// Dequeue-time fixups: the unique sequence number is assigned here
	/// and stamped into the MAC header (and into LTG payload headers).
	fn mpdu_dequeue(&mut self, element: Handle) {
		self.unique_seq += 1;
		let seq = self.unique_seq;
		let Some(buffer) = self.queues.get_mut(element) else {
			return;
		};
		buffer.frame_info.unique_seq.set(seq);
		let mac_seq = ((seq as u16) & 0x0fff) << 4;
		if buffer.frame.len() >= frame::MAC_HEADER_LEN {
			buffer.frame[22..24].copy_from_slice(&mac_seq.to_le_bytes());
		}
		if is_ltg_mpdu(&buffer.frame[..buffer.frame_info.length.get() as usize]) {
			// LTG payload id header: unique_seq follows the LLC header.
			let off = frame::MAC_HEADER_LEN + frame::LLC_HEADER_LEN;
			buffer.frame[off..off + 8].copy_from_slice(&seq.to_le_bytes());
		}

		// Track per-station queue occupancy.
		if let QueueMetadata::StationId(id) = buffer.metadata {
			if let Some(handle) = self
				.my_network
				.and_then(|h| self.networks.get(h))
				.and_then(|n| self.stations.find_id(&n.members, id))
			{
				if let Some(station) = self.stations.get_mut(handle) {
					station.num_queued_packets = station.num_queued_packets.saturating_sub(1);
				}
			}
		}
	}

	fn release_tx_element(&mut self, element: Handle) {
		self.queues.checkin(element);
	}

	/// Completion handling for `TX_DONE`.
	fn handle_tx_done(&mut self, slot: usize, details: &[TxLowDetails]) {
		let Some(pending) = self.tx_pending.take() else {
			warn!("TX_DONE for slot {slot} with no transmission pending");
			return;
		};
		if pending.slot != slot {
			warn!("TX_DONE slot {slot} does not match pending {}", pending.slot);
		}

		let Ok(mut guard) = self.pktbufs.try_lock_tx(slot, CPU_HIGH_MUTEX_ID) else {
			error!("tx pkt buf {slot} still locked at TX_DONE");
			self.release_tx_element(pending.element);
			return;
		};
		let info = *guard.frame_info();
		let mpdu_addr1 = {
			let mpdu = guard.mpdu();
			let mut addr1 = [0u8; 6];
			addr1.copy_from_slice(&mpdu[4..10]);
			addr1
		};
		let fc1 = guard.mpdu()[0];
		let is_ltg = is_ltg_mpdu(&guard.mpdu()[..info.length.get() as usize]);
		guard.frame_info_mut().set_state(TxPktBufState::Uninitialized);
		drop(guard);

		let success = info.tx_result == u8::from(TxResult::Success);

		// Low-level entries: one per attempt, timestamped by the
		// fractional offsets CPU-Low recorded.
		for detail in details {
			let mut entry = TxLowEntry::new_zeroed();
			entry.timestamp_send.set(detail.tx_start_timestamp_mpdu.get());
			entry.timestamp_send_frac = detail.tx_start_timestamp_frac_mpdu;
			entry.unique_seq.set(info.unique_seq.get());
			entry.attempt_number.set(detail.attempt_number.get());
			entry.length.set(info.length.get());
			entry.mcs = detail.phy_params_mpdu.mcs;
			entry.phy_mode = detail.phy_params_mpdu.phy_mode;
			entry.ant_mode = detail.phy_params_mpdu.antenna_mode;
			entry.power = detail.phy_params_mpdu.power;
			entry.flags = detail.flags;
			entry.pkt_type = detail.tx_details_type;
			entry.chan_num = detail.chan_num;
			entry.num_slots.set(detail.num_slots.get() as u16);
			entry.cw.set(detail.cw.get());
			let ty = if is_ltg {
				EntryType::TxLowLtg
			} else {
				EntryType::TxLow
			};
			self.eventlog.append(ty, &entry);
		}

		let mut entry = TxHighEntry::new_zeroed();
		entry.timestamp_create.set(info.timestamp_create.get());
		entry.delay_accept.set(info.timestamp_accept.get() as u32);
		entry.delay_done.set(info.timestamp_done.get() as u32);
		entry.unique_seq.set(info.unique_seq.get());
		entry.num_tx_attempts.set(info.num_tx_attempts.get());
		entry.length.set(info.length.get());
		entry.tx_result = info.tx_result;
		entry.chan_num = self.mac_param_chan;
		entry.mcs = info.params.phy.mcs;
		entry.phy_mode = info.params.phy.phy_mode;
		entry.ant_mode = info.params.phy.antenna_mode;
		entry.power = info.params.phy.power;
		entry.flags = info.flags;
		entry.queue_id = info.queue_info.id;
		entry.addr1 = mpdu_addr1;
		let ty = if is_ltg {
			EntryType::TxHighLtg
		} else {
			EntryType::TxHigh
		};
		self.eventlog.append(ty, &entry);

		// Counts towards the addressee.
		if !addr_is_mcast(&mpdu_addr1) {
			let now = self.mac_time_usec();
			self.counts.tx_process(
				&mpdu_addr1,
				FrameControl1::is_data(fc1),
				info.length.get(),
				info.num_tx_attempts.get(),
				success,
				now,
			);
			self.touch_station_tx(&mpdu_addr1, now);
		}

		self.release_tx_element(pending.element);
		// Service-loop continuation.
		self.poll_tx_queues();
	}

	fn touch_station_tx(&mut self, addr: &MacAddr, now: u64) {
		let Some(network) = self.my_network.and_then(|h| self.networks.get(h)) else {
			return;
		};
		let members = network.members;
		if let Some(handle) = self.stations.find_addr(&members, addr) {
			if let Some(station) = self.stations.get_mut(handle) {
				station.latest_txrx_timestamp = now;
			}
		}
	}

	// ------------------------------------------------------------------
	// Rx path
	// ------------------------------------------------------------------

	fn handle_rx_ready(&mut self, slot: usize) {
		let pktbufs = self.pktbufs.clone();
		let (info, mpdu, len) = {
			let Ok(mut guard) = pktbufs.try_lock_rx(slot, CPU_HIGH_MUTEX_ID) else {
				warn!("rx pkt buf {slot} locked on RX_READY");
				return;
			};
			let info = *guard.frame_info();
			let len = (info.phy_details.length.get() as usize).min(MAX_PKT_SIZE_B);
			let mut mpdu = alloc::boxed::Box::new([0u8; MAX_PKT_SIZE_B]);
			mpdu[..len].copy_from_slice(guard.mpdu());
			guard.frame_info_mut().set_state(RxPktBufState::Uninitialized);
			(info, mpdu, len)
		};
		self.process_rx(&info, &mpdu[..len]);
	}

	/// Processes one received MPDU (already copied out of the shared
	/// buffer).
	pub fn process_rx(&mut self, rx_info: &RxFrameInfo, mpdu: &[u8]) {
		let Some((header, body_off)) = MacHeader::parse(mpdu) else {
			return;
		};
		if FrameControl1::is_ctrl(header.frame_control_1) {
			// Control frames are handled entirely by CPU-Low.
			return;
		}
		let fcs_good = rx_info
			.rx_flags()
			.contains(crate::pktbuf::RxFlags::FCS_GOOD);
		let is_data = FrameControl1::is_data(header.frame_control_1);
		let is_ltg = is_data && is_ltg_mpdu(mpdu);
		self.log_rx(rx_info, &header, is_ltg);

		if !fcs_good {
			self.platform.display_status(UserIoStatus::BadFcsEvent, 0);
			return;
		}
		self.platform.display_status(UserIoStatus::GoodFcsEvent, 0);

		// Every good beacon/probe response feeds the network directory,
		// regardless of addressing.
		if header.frame_control_1 == u8::from(FrameControl1::Beacon)
			|| header.frame_control_1 == u8::from(FrameControl1::ProbeResp)
		{
			self.observe_network(rx_info, &header, &mpdu[body_off..]);
		}

		let unicast_to_me = header.address_1 == self.mac_addr;
		let to_multicast = addr_is_mcast(&header.address_1);
		if !unicast_to_me && !to_multicast {
			return;
		}

		let now = self.mac_time_usec();
		let duplicate = self.counts.rx_process(
			&header.address_2,
			is_data,
			rx_info.phy_details.length.get(),
			header.sequence_number(),
			header.retry(),
			now,
		);
		self.update_station_rx(&header, now);
		if duplicate {
			trace!("duplicate reception from {:02x?}", header.address_2);
			return;
		}

		let mut role = core::mem::replace(&mut self.role, RoleState::Detached);
		match &mut role {
			RoleState::Ap(ap) => self.ap_rx(ap, &header, &mpdu[body_off..], rx_info, mpdu),
			RoleState::Sta(sta) => self.sta_rx(sta, &header, &mpdu[body_off..], rx_info, mpdu),
			RoleState::Ibss(ibss) => self.ibss_rx(ibss, &header, &mpdu[body_off..], rx_info, mpdu),
			RoleState::Detached => {}
		}
		self.role = role;
	}

	fn log_rx(&mut self, rx_info: &RxFrameInfo, header: &MacHeader, is_ltg: bool) {
		let mut entry = RxCommonEntry::new_zeroed();
		entry.timestamp.set(rx_info.timestamp.get());
		entry.timestamp_frac = rx_info.timestamp_frac;
		entry.phy_samp_rate = rx_info.phy_samp_rate;
		entry.chan_num = rx_info.channel;
		entry.mcs = rx_info.phy_details.mcs;
		entry.phy_mode = rx_info.phy_details.phy_mode;
		entry.ant_mode = rx_info.ant_mode;
		entry.rx_power = rx_info.rx_power;
		entry.flags = rx_info.flags;
		entry.length.set(rx_info.phy_details.length.get());
		entry.seq.set(header.sequence_number());
		entry.frame_control_1 = header.frame_control_1;
		entry.frame_control_2 = header.frame_control_2.bits();
		entry.addr2 = header.address_2;
		let ty = match rx_info.phy_mode() {
			Some(PhyMode::Dsss) => EntryType::RxDsss,
			_ if is_ltg => EntryType::RxOfdmLtg,
			_ => EntryType::RxOfdm,
		};
		self.eventlog.append(ty, &entry);
	}

	fn observe_network(&mut self, rx_info: &RxFrameInfo, header: &MacHeader, body: &[u8]) {
		let Some(fixed) = frame::BeaconFixed::parse(body) else {
			return;
		};
		let ies = &body[frame::BeaconFixed::LEN..];
		let ssid = frame::ie::find(ies, frame::Tag::Ssid)
			.and_then(|s| core::str::from_utf8(s).ok())
			.unwrap_or("");
		// The DSSS Parameter Set overrides the Rx channel; DSSS
		// receptions are prone to being off-channel.
		let channel = frame::ie::find(ies, frame::Tag::DsParams)
			.and_then(|d| d.first().copied())
			.unwrap_or(rx_info.channel);
		let ht_capable = frame::ie::find(ies, frame::Tag::HtCapabilities).is_some();
		let dtim_period = frame::ie::find(ies, frame::Tag::Tim).and_then(|t| t.get(1).copied());

		let mut basic_rates = smallvec::SmallVec::<[u8; 10]>::new();
		for tag in [frame::Tag::SupportedRates, frame::Tag::ExtSupportedRates] {
			if let Some(rates) = frame::ie::find(ies, tag) {
				for &rate in rates {
					if rate & frame::RATE_BASIC != 0 {
						basic_rates.push(rate & !frame::RATE_BASIC);
					}
				}
			}
		}

		let obs = BeaconObservation {
			bssid: header.address_3,
			ssid,
			channel,
			beacon_interval_tu: fixed.beacon_interval_tu,
			capabilities: fixed.capabilities,
			ht_capable,
			dtim_period,
			basic_rates: &basic_rates,
			rx_power_dbm: rx_info.rx_power,
		};
		let now = self.mac_time_usec();
		if self.networks.observe(&obs, now).is_err() {
			debug!("network store full; observation of {:02x?} dropped", obs.bssid);
		}
	}

	fn update_station_rx(&mut self, header: &MacHeader, now: u64) {
		let Some(network) = self.my_network.and_then(|h| self.networks.get(h)) else {
			return;
		};
		let members = network.members;
		let Some(handle) = self.stations.find_addr(&members, &header.address_2) else {
			return;
		};
		if let Some(station) = self.stations.get_mut(handle) {
			station.latest_rx_timestamp = now;
			station.latest_txrx_timestamp = now;
			station.latest_rx_seq = header.sequence_number();
			station
				.flags
				.set(StationFlags::DOZE, header.frame_control_2.contains(FrameControl2::POWER_MGMT));
		}
	}

	// ------------------------------------------------------------------
	// Frame production helpers
	// ------------------------------------------------------------------

	/// Checks out a queue element, builds an MPDU into it and enqueues
	/// it. Returns whether the frame was enqueued.
	pub(crate) fn enqueue_frame(
		&mut self,
		qid: QueueId,
		metadata: QueueMetadata,
		flags: TxFlags,
		station_id: u16,
		build: impl FnOnce(&mut [u8]) -> usize,
	) -> bool {
		let Ok(element) = self.queues.checkout() else {
			warn!("queue pool exhausted; frame dropped");
			return false;
		};
		let now = self.mac_time_usec();
		let buffer = self.queues.get_mut(element).unwrap();
		let len = build(&mut buffer.frame[..]);
		debug_assert!(len <= MAX_PKT_SIZE_B);
		buffer.metadata = metadata;
		buffer.frame_info = crate::pktbuf::TxFrameInfo::new_zeroed();
		buffer.frame_info.timestamp_create.set(now);
		buffer.frame_info.length.set(len as u16);
		buffer.frame_info.station_id.set(station_id);
		buffer.frame_info.flags = flags.bits();
		self.queues.enqueue_tail(qid, element);

		if let QueueMetadata::StationId(id) = metadata {
			if let Some(handle) = self
				.my_network
				.and_then(|h| self.networks.get(h))
				.map(|n| n.members)
				.and_then(|m| self.stations.find_id(&m, id))
			{
				if let Some(station) = self.stations.get_mut(handle) {
					station.num_queued_packets += 1;
				}
			}
		}

		self.poll_tx_queues();
		true
	}

	// ------------------------------------------------------------------
	// Ethernet portal
	// ------------------------------------------------------------------

	/// Ingress from the wired side. Returns whether the frame was
	/// enqueued for wireless transmission.
	pub fn eth_rx(&mut self, eth_frame: &[u8]) -> bool {
		if !self.portal_enabled || eth_frame.len() < 14 {
			return false;
		}
		if self.config.role == Role::Ap {
			self.apply_portal_learning(eth_frame);
		}
		self.enqueue_wireless_eth(eth_frame)
	}

	/// Encapsulates an Ethernet frame and enqueues it on the queue of
	/// its wireless destination.
	pub(crate) fn enqueue_wireless_eth(&mut self, eth_frame: &[u8]) -> bool {
		let Some(network) = self.my_network.and_then(|h| self.networks.get(h)) else {
			return false;
		};
		let bssid = network.bssid;
		let members = network.members;
		let mode = match self.config.role {
			Role::Ap => EncapMode::Ap,
			Role::Sta => EncapMode::Sta,
			Role::Ibss => EncapMode::Ibss,
		};

		let mut dst = [0u8; 6];
		dst.copy_from_slice(&eth_frame[0..6]);
		let (qid, metadata, flags) = if addr_is_mcast(&dst) {
			(
				MCAST_QID,
				QueueMetadata::TxParams(self.mcast_data_tx_params),
				TxFlags::FILL_DURATION,
			)
		} else {
			match self.resolve_unicast_queue(&members, &dst) {
				Some((qid, id)) => (
					qid,
					QueueMetadata::StationId(id),
					TxFlags::FILL_DURATION | TxFlags::REQ_TO,
				),
				None => {
					trace!("no wireless peer for {dst:02x?}; eth frame dropped");
					return false;
				}
			}
		};

		if self.queues.num_queued(qid) >= self.config.max_queue_len {
			warn!("queue {} full; eth frame dropped", qid.0);
			return false;
		}

		let self_addr = self.mac_addr;
		let station_id = match metadata {
			QueueMetadata::StationId(id) => id,
			_ => 0,
		};
		self.enqueue_frame(qid, metadata, flags, station_id, move |buf| {
			eth::encap(buf, mode, &self_addr, &bssid, eth_frame, 0)
				.map(|(len, _)| len)
				.unwrap_or(0)
		})
	}

	fn resolve_unicast_queue(
		&self,
		members: &crate::collections::List,
		dst: &MacAddr,
	) -> Option<(QueueId, u16)> {
		let handle = self.stations.find_addr(members, dst)?;
		let id = self.stations.get(handle)?.id;
		Some((station_id_to_queue_id(id), id))
	}

	fn apply_portal_learning(&mut self, eth_frame: &[u8]) {
		let Some(learning) = eth::inspect_portal(eth_frame) else {
			return;
		};
		self.apply_learning(learning);
	}

	pub(crate) fn apply_learning(&mut self, learning: eth::PortalLearning) {
		let Some(network) = self.my_network.and_then(|h| self.networks.get(h)) else {
			return;
		};
		let members = network.members;
		let Some(handle) = self.stations.find_addr(&members, &learning.addr) else {
			return;
		};
		if let Some(station) = self.stations.get_mut(handle) {
			if let Some(hostname) = learning.hostname {
				station.hostname = hostname;
			}
			if let Some(ip) = learning.ip_addr {
				station.ip_addr = Some(ip);
			}
		}
	}

	/// Bridges a de-encapsulated wireless frame to the wired side.
	pub(crate) fn bridge_to_eth(&mut self, mpdu: &[u8]) {
		if !self.portal_enabled {
			return;
		}
		let Some(decapped) = eth::decap(mpdu) else {
			return;
		};
		if decapped.ethertype == eth::ETHERTYPE_LTG {
			// LTG traffic terminates at the node.
			return;
		}
		let mut out = [0u8; MAX_PKT_SIZE_B];
		let len = eth::decap_to_eth(&mut out, &decapped);
		if self.config.role == Role::Ap {
			self.apply_portal_learning(&out[..len]);
		}
		self.eth_plane.send(&out[..len]);
	}

	// ------------------------------------------------------------------
	// Beacons
	// ------------------------------------------------------------------

	fn beacon_transmit(&mut self) {
		let mut role = core::mem::replace(&mut self.role, RoleState::Detached);
		match &mut role {
			RoleState::Ap(ap) => self.ap_beacon_transmit(ap),
			RoleState::Ibss(ibss) => self.ibss_beacon_transmit(ibss),
			_ => {}
		}
		self.role = role;
	}

	/// (Re)starts the periodic beacon event.
	pub(crate) fn start_beacon_schedule(&mut self) {
		self.cancel_beacon_schedule();
		let Some(network) = self.my_network.and_then(|h| self.networks.get(h)) else {
			return;
		};
		let interval_us = u64::from(network.beacon_interval_tu) * MICROSECONDS_PER_TU;
		let now = self.system_time_usec();
		let id = self.scheduler.schedule_repeated(
			SchedClass::Fine,
			now,
			interval_us,
			SCHEDULE_REPEAT_FOREVER,
			SchedEvent::BeaconTransmit,
		);
		self.beacon_sched = Some(id);
		let _ = self.mailbox.send(IpcMessage::ConfigBeaconTxRx {
			config: crate::ipc::BeaconTxRxConfig {
				ts_update_mode: self.ts_update_mode,
				bssid_match: network.bssid,
				beacon_interval_tu: network.beacon_interval_tu,
				dtim_period: network.dtim_period,
			},
		});
	}

	pub(crate) fn cancel_beacon_schedule(&mut self) {
		if let Some(id) = self.beacon_sched.take() {
			self.scheduler.remove(SchedClass::Fine, id);
		}
	}

	// ------------------------------------------------------------------
	// Scan plumbing
	// ------------------------------------------------------------------

	pub fn scan_start(&mut self) -> bool {
		let Some(first_channel) = self.scan.start() else {
			return false;
		};
		self.pause_data_queue = true;
		self.tune(first_channel);
		let now = self.system_time_usec();
		let dwell = u64::from(self.scan.params().time_per_channel_usec);
		let probe = u64::from(self.scan.params().probe_tx_interval_usec);
		self.scan_dwell_sched =
			Some(self.scheduler
				.schedule_once(SchedClass::Fine, now, dwell, SchedEvent::ScanDwell));
		self.scan_probe_sched = Some(self.scheduler.schedule_repeated(
			SchedClass::Fine,
			now,
			probe,
			SCHEDULE_REPEAT_FOREVER,
			SchedEvent::ScanProbe,
		));
		self.scan_probe_fire();
		true
	}

	pub fn scan_stop(&mut self) {
		if !self.scan.is_scanning() {
			return;
		}
		self.scan.stop();
		self.cancel_scan_timers();
		self.pause_data_queue = false;
		// Return to the operating channel.
		let chan = self.mac_param_chan;
		self.tune(chan);
	}

	pub fn scan_pause(&mut self) {
		self.scan.pause();
		if let Some(id) = self.scan_probe_sched.take() {
			self.scheduler.remove(SchedClass::Fine, id);
		}
		if let Some(id) = self.scan_dwell_sched.take() {
			self.scheduler.remove(SchedClass::Fine, id);
		}
	}

	pub fn scan_resume(&mut self) {
		if self.scan.state() != ScanState::Paused {
			return;
		}
		self.scan.resume();
		let now = self.system_time_usec();
		let dwell = u64::from(self.scan.params().time_per_channel_usec);
		let probe = u64::from(self.scan.params().probe_tx_interval_usec);
		self.scan_dwell_sched =
			Some(self.scheduler
				.schedule_once(SchedClass::Fine, now, dwell, SchedEvent::ScanDwell));
		self.scan_probe_sched = Some(self.scheduler.schedule_repeated(
			SchedClass::Fine,
			now,
			probe,
			SCHEDULE_REPEAT_FOREVER,
			SchedEvent::ScanProbe,
		));
	}

	fn cancel_scan_timers(&mut self) {
		for id in [self.scan_dwell_sched.take(), self.scan_probe_sched.take()] {
			if let Some(id) = id {
				self.scheduler.remove(SchedClass::Fine, id);
			}
		}
	}

	fn scan_dwell_expired(&mut self) {
		let Some(advance) = self.scan.advance() else {
			return;
		};
		let now = self.system_time_usec();
		let dwell = u64::from(self.scan.params().time_per_channel_usec);
		match advance {
			ScanAdvance::Tune(channel) => {
				self.tune(channel);
				self.scan_dwell_sched = Some(self.scheduler.schedule_once(
					SchedClass::Fine,
					now,
					dwell,
					SchedEvent::ScanDwell,
				));
			}
			ScanAdvance::CycleDone {
				first_channel,
				idle_usec,
			} => {
				if idle_usec > 0 {
					// Probes stay quiet for the idle window.
					if let Some(id) = self.scan_probe_sched.take() {
						self.scheduler.remove(SchedClass::Fine, id);
					}
					self.scan_dwell_sched = Some(self.scheduler.schedule_once(
						SchedClass::Fine,
						now,
						u64::from(idle_usec),
						SchedEvent::ScanIdleDone,
					));
				} else {
					self.tune(first_channel);
					self.scan_dwell_sched = Some(self.scheduler.schedule_once(
						SchedClass::Fine,
						now,
						dwell,
						SchedEvent::ScanDwell,
					));
				}
			}
		}
	}

	fn scan_idle_done(&mut self) {
		if self.scan.state() != ScanState::Running {
			return;
		}
		let Some(channel) = self.scan.current_channel() else {
			return;
		};
		self.tune(channel);
		let now = self.system_time_usec();
		let dwell = u64::from(self.scan.params().time_per_channel_usec);
		let probe = u64::from(self.scan.params().probe_tx_interval_usec);
		self.scan_dwell_sched =
			Some(self.scheduler
				.schedule_once(SchedClass::Fine, now, dwell, SchedEvent::ScanDwell));
		self.scan_probe_sched = Some(self.scheduler.schedule_repeated(
			SchedClass::Fine,
			now,
			probe,
			SCHEDULE_REPEAT_FOREVER,
			SchedEvent::ScanProbe,
		));
	}

	fn scan_probe_fire(&mut self) {
		if self.scan.state() != ScanState::Running {
			return;
		}
		let ssid = crate::network::truncate_ssid(self.scan.params().ssid.as_str());
		let channel = self.scan.current_channel().unwrap_or(self.mac_param_chan);
		let self_addr = self.mac_addr;
		let params = self.mcast_mgmt_tx_params;
		self.enqueue_frame(
			MANAGEMENT_QID,
			QueueMetadata::TxParams(params),
			TxFlags::FILL_DURATION,
			0,
			move |buf| {
				frame::create_probe_req(
					buf,
					&BCAST_ADDR,
					&self_addr,
					&BCAST_ADDR,
					0,
					ssid.as_str(),
					channel,
				)
			},
		);
	}

	// ------------------------------------------------------------------
	// Join plumbing
	// ------------------------------------------------------------------

	/// Starts a join towards `ssid`. STA authenticates and associates;
	/// IBSS adopts the network (or founds one on timeout).
	pub fn join_start(&mut self, ssid: &str, timeout_usec: Option<u64>) -> bool {
		if self.config.role == Role::Ap {
			warn!("an AP does not join networks");
			return false;
		}
		let now = self.system_time_usec();
		if !self.join.start(ssid, now, timeout_usec) {
			return false;
		}
		self.scan.set_ssid(ssid);
		self.scan_start();
		self.join_poll_sched = Some(self.scheduler.schedule_repeated(
			SchedClass::Fine,
			now,
			config::JOIN_POLL_INTERVAL_USEC,
			SCHEDULE_REPEAT_FOREVER,
			SchedEvent::JoinPoll,
		));
		true
	}

	fn join_poll(&mut self) {
		let now = self.system_time_usec();
		let matched = self
			.networks
			.find_ssid(self.join.target_ssid())
			.first()
			.copied();
		let action = self.join.poll(now, matched);
		self.handle_join_action(action);
		if !self.join.is_joining() {
			if let Some(id) = self.join_poll_sched.take() {
				self.scheduler.remove(SchedClass::Fine, id);
			}
		}
	}

	pub(crate) fn handle_join_action(&mut self, action: JoinAction) {
		match action {
			JoinAction::None => {}
			JoinAction::FoundNetwork(handle) => self.join_found_network(handle),
			JoinAction::SendAuthReq => self.sta_send_auth_req(),
			JoinAction::SendAssocReq => self.sta_send_assoc_req(),
			JoinAction::Failed(err) => {
				warn!("join failed: {err}");
				self.scan_stop();
				self.record_join_result(match err {
					crate::error::JoinError::Timeout => {
						crate::network::JoinAttemptResult::NoResponse
					}
					_ => crate::network::JoinAttemptResult::Denied,
				});
				let mut role = core::mem::replace(&mut self.role, RoleState::Detached);
				if let RoleState::Ibss(ibss) = &mut role {
					self.ibss_join_failed(ibss, err);
				}
				self.role = role;
			}
		}
	}

	pub(crate) fn record_join_result(&mut self, result: crate::network::JoinAttemptResult) {
		let now = self.mac_time_usec();
		if let Some(network) = self.join.target().and_then(|h| self.networks.get_mut(h)) {
			network.last_join_attempt_result = result;
			network.last_join_attempt_timestamp = now;
		}
	}

	fn join_found_network(&mut self, handle: Handle) {
		self.scan_stop();
		let Some(network) = self.networks.get(handle) else {
			return;
		};
		let channel = network.chan_spec.chan_pri;
		info!(
			"join matched network {:02x?} on channel {channel}",
			network.bssid
		);
		self.my_network = Some(handle);
		self.set_channel(channel);

		let now = self.system_time_usec();
		let mut role = core::mem::replace(&mut self.role, RoleState::Detached);
		match &mut role {
			RoleState::Sta(_) => {
				self.join.begin_authentication(now);
				self.sta_send_auth_req();
			}
			RoleState::Ibss(ibss) => {
				self.ibss_adopt_network(ibss, handle);
				self.join.abort();
			}
			_ => {}
		}
		self.role = role;
	}

	// ------------------------------------------------------------------
	// Housekeeping
	// ------------------------------------------------------------------

	fn association_check(&mut self) {
		let mut role = core::mem::replace(&mut self.role, RoleState::Detached);
		match &mut role {
			RoleState::Ap(ap) => self.ap_inactivity_sweep(ap),
			RoleState::Sta(sta) => self.sta_link_check(sta),
			_ => {}
		}
		self.role = role;
	}

	fn ltg_fire(&mut self, id: u32) {
		let now = self.system_time_usec();
		let Some(fire) = self.ltg.fire(id, now, &mut self.rng) else {
			return;
		};
		match fire.frame.dest {
			Some(dest) => self.ltg_send(id, dest, fire.frame.length),
			None => {
				let members = self
					.my_network
					.and_then(|h| self.networks.get(h))
					.map(|n| n.members);
				if let Some(members) = members {
					let dests: alloc::vec::Vec<MacAddr> = self
						.stations
						.iter_members(&members)
						.filter_map(|h| self.stations.get(h).map(|s| s.addr))
						.collect();
					for dest in dests {
						self.ltg_send(id, dest, fire.frame.length);
					}
				}
			}
		}
		if let Some(interval) = fire.next_interval_usec {
			let sched = self
				.scheduler
				.schedule_once(SchedClass::Fine, now, interval, SchedEvent::Ltg(id));
			self.ltg.set_sched_id(id, sched);
		}
	}

	fn ltg_send(&mut self, ltg_id: u32, dest: MacAddr, length: u16) {
		let Some(network) = self.my_network.and_then(|h| self.networks.get(h)) else {
			return;
		};
		let bssid = network.bssid;
		let members = network.members;
		let self_addr = self.mac_addr;
		let payload_len = (length as usize)
			.max(ltg::LTG_HEADER_LEN)
			.min(MAX_PKT_SIZE_B - frame::MAC_HEADER_LEN);

		let (qid, metadata, flags) = if addr_is_mcast(&dest) {
			(
				MCAST_QID,
				QueueMetadata::TxParams(self.mcast_data_tx_params),
				TxFlags::FILL_DURATION,
			)
		} else {
			match self.resolve_unicast_queue(&members, &dest) {
				Some((qid, id)) => (
					qid,
					QueueMetadata::StationId(id),
					TxFlags::FILL_DURATION | TxFlags::REQ_TO,
				),
				None => {
					trace!("LTG {ltg_id}: no peer for {dest:02x?}");
					return;
				}
			}
		};
		if self.queues.num_queued(qid) >= self.config.max_queue_len {
			return;
		}

		let (fc2, addr1, addr2, addr3) = match self.config.role {
			Role::Sta => (FrameControl2::TO_DS, bssid, self_addr, dest),
			Role::Ap => (FrameControl2::FROM_DS, dest, bssid, self_addr),
			Role::Ibss => (FrameControl2::empty(), dest, self_addr, bssid),
		};
		let station_id = match metadata {
			QueueMetadata::StationId(id) => id,
			_ => 0,
		};
		self.enqueue_frame(qid, metadata, flags, station_id, move |buf| {
			let mut off = frame::create_data_header(buf, fc2, &addr1, &addr2, &addr3, 0);
			let body_start = off;
			off += ltg::write_ltg_header(&mut buf[off..], ltg_id);
			let end = body_start + payload_len;
			buf[off..end].fill(0);
			end
		});
	}

	/// Creates an LTG and starts it immediately.
	pub fn ltg_start(&mut self, id: u32) -> bool {
		let Some(interval) = self.ltg.start(id, &mut self.rng) else {
			return false;
		};
		let now = self.system_time_usec();
		let sched = self
			.scheduler
			.schedule_once(SchedClass::Fine, now, interval, SchedEvent::Ltg(id));
		self.ltg.set_sched_id(id, sched);
		true
	}

	pub fn ltg_stop(&mut self, id: u32) {
		if let Some(sched) = self.ltg.stop(id) {
			self.scheduler.remove(SchedClass::Fine, sched);
		}
	}

	/// Removes an LTG, cancelling its pending event. In-flight frames
	/// it produced complete normally.
	pub fn ltg_remove(&mut self, id: u32) {
		if let Some(sched) = self.ltg.remove(id) {
			self.scheduler.remove(SchedClass::Fine, sched);
		}
	}
}

/// Whether an encoded data MPDU carries the LTG LLC type.
fn is_ltg_mpdu(mpdu: &[u8]) -> bool {
	let off = frame::MAC_HEADER_LEN;
	mpdu.len() >= off + frame::LLC_HEADER_LEN
		&& mpdu[off] == eth::LLC_SNAP
		&& mpdu[off + 6..off + 8] == eth::ETHERTYPE_LTG.to_be_bytes()
}

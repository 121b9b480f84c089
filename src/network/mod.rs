//! Directories of observed networks, their stations, and link counts.
//!
//! All three stores are bounded at boot and allocated from arenas; the
//! in-use orderings are intrusive lists so eviction and sweeps stay
//! O(1) per entry. BSSIDs and counts addresses additionally carry a hash
//! index for warm lookups.

pub mod counts;
pub mod station;

use alloc::vec::Vec;

use hashbrown::HashMap;
use log::{debug, info, trace};

use crate::collections::{Arena, Handle, List};
use crate::config::{MAX_NUM_NETWORKS, NETWORK_INFO_TIMEOUT_USEC};
use crate::error::StoreError;
use crate::frame::Capabilities;
use crate::ipc::ChanSpec;
use crate::MacAddr;

pub use self::counts::{CountsFlags, CountsStore, FrameCounts, TxRxCounts};
pub use self::station::{StationFlags, StationInfo, StationStore};

/// Maximum SSID length in bytes.
pub const SSID_LEN_MAX: usize = 32;
/// Maximum number of basic rates tracked per network.
pub const NUM_BASIC_RATES_MAX: usize = 10;

pub type Ssid = heapless::String<SSID_LEN_MAX>;

/// Relationship of this node to a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BssState {
	Unauthenticated,
	Authenticated,
	Associated,
	/// This node operates the network (AP or adopted IBSS).
	Owned,
}

/// Outcome of the most recent join attempt against a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinAttemptResult {
	#[default]
	NeverAttempted,
	NoResponse,
	Denied,
	Successful,
}

bitflags::bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct NetworkFlags: u8 {
		/// Never evict this entry.
		const KEEP = 0x01;
	}
}

/// Everything tracked about one BSS.
#[derive(Debug)]
pub struct NetworkInfo {
	pub bssid: MacAddr,
	pub chan_spec: ChanSpec,
	pub ssid: Ssid,
	pub ht_capable: bool,
	/// Beacon interval in TU (1024 us).
	pub beacon_interval_tu: u16,
	/// DTIM period in beacon intervals.
	pub dtim_period: u8,
	/// MAC time of the last observation of this network.
	pub latest_activity_timestamp: u64,
	/// Rx power of the last beacon, in dBm.
	pub latest_beacon_rx_power: i8,
	pub capabilities: Capabilities,
	pub state: BssState,
	pub flags: NetworkFlags,
	pub basic_rates: heapless::Vec<u8, NUM_BASIC_RATES_MAX>,
	/// Stations of this network; handles into the station store.
	pub members: List,
	pub last_join_attempt_result: JoinAttemptResult,
	pub last_join_attempt_timestamp: u64,
}

impl NetworkInfo {
	fn new(bssid: MacAddr, now: u64) -> Self {
		Self {
			bssid,
			chan_spec: ChanSpec::bw20(1),
			ssid: Ssid::new(),
			ht_capable: false,
			beacon_interval_tu: 100,
			dtim_period: 1,
			latest_activity_timestamp: now,
			latest_beacon_rx_power: i8::MIN,
			capabilities: Capabilities::empty(),
			state: BssState::Unauthenticated,
			flags: NetworkFlags::empty(),
			basic_rates: heapless::Vec::new(),
			members: List::new(),
			last_join_attempt_result: JoinAttemptResult::NeverAttempted,
			last_join_attempt_timestamp: 0,
		}
	}

	/// Whether the timestamp sweep may reclaim this entry.
	fn evictable(&self) -> bool {
		!self.flags.contains(NetworkFlags::KEEP)
			&& self.state != BssState::Owned
			&& self.members.is_empty()
	}
}

/// Fields extracted from a received beacon or probe response.
#[derive(Debug, Clone)]
pub struct BeaconObservation<'a> {
	pub bssid: MacAddr,
	pub ssid: &'a str,
	/// Operating channel: the DSSS Parameter Set when present (DSSS
	/// receptions are prone to being off-channel), the Rx channel
	/// otherwise.
	pub channel: u8,
	pub beacon_interval_tu: u16,
	pub capabilities: Capabilities,
	pub ht_capable: bool,
	pub dtim_period: Option<u8>,
	pub basic_rates: &'a [u8],
	pub rx_power_dbm: i8,
}

/// The bounded directory of observed networks.
pub struct NetworkStore {
	arena: Arena<NetworkInfo>,
	/// In-use entries ordered oldest-observation first.
	inuse: List,
	index: HashMap<MacAddr, Handle>,
}

impl NetworkStore {
	pub fn new() -> Self {
		Self::with_capacity(MAX_NUM_NETWORKS)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			arena: Arena::with_capacity(capacity),
			inuse: List::new(),
			index: HashMap::with_capacity(capacity),
		}
	}

	pub fn get(&self, handle: Handle) -> Option<&NetworkInfo> {
		self.arena.get(handle)
	}

	pub fn get_mut(&mut self, handle: Handle) -> Option<&mut NetworkInfo> {
		self.arena.get_mut(handle)
	}

	pub fn len(&self) -> usize {
		self.inuse.len() as usize
	}

	pub fn is_empty(&self) -> bool {
		self.inuse.is_empty()
	}

	pub fn find_bssid(&self, bssid: &MacAddr) -> Option<Handle> {
		self.index.get(bssid).copied()
	}

	/// All networks currently advertising `ssid`, rebuilt per call.
	pub fn find_ssid(&self, ssid: &str) -> Vec<Handle> {
		self.inuse
			.iter(&self.arena)
			.filter(|&h| {
				self.arena
					.get(h)
					.is_some_and(|n| n.ssid.as_str() == ssid)
			})
			.collect()
	}

	/// Handles of every tracked network, oldest observation first.
	pub fn iter(&self) -> impl Iterator<Item = Handle> + '_ {
		self.inuse.iter(&self.arena)
	}

	/// Looks up `bssid`, creating the entry when unknown. Creation
	/// allocates from the free slots or evicts the oldest unpinned
	/// entry; with no eviction candidate the call fails and the caller
	/// drops the observation.
	pub fn get_or_create(&mut self, bssid: &MacAddr, now: u64) -> Result<Handle, StoreError> {
		if let Some(handle) = self.find_bssid(bssid) {
			return Ok(handle);
		}
		if self.arena.num_free() == 0 {
			self.evict_oldest()?;
		}
		let handle = self
			.arena
			.insert(NetworkInfo::new(*bssid, now))
			.map_err(|_| StoreError::NetworkStoreFull)?;
		self.inuse.push_back(&mut self.arena, handle);
		self.index.insert(*bssid, handle);
		debug!(
			"created network entry for {bssid:02x?} ({} tracked)",
			self.len()
		);
		Ok(handle)
	}

	fn evict_oldest(&mut self) -> Result<(), StoreError> {
		let victim = self
			.inuse
			.iter(&self.arena)
			.find(|&h| self.arena.get(h).is_some_and(NetworkInfo::evictable));
		let Some(victim) = victim else {
			return Err(StoreError::NetworkStoreFull);
		};
		self.remove(victim);
		Ok(())
	}

	/// Drops a network entry. Member stations must already be removed.
	pub fn remove(&mut self, handle: Handle) {
		let Some(info) = self.arena.get(handle) else {
			return;
		};
		debug_assert!(info.members.is_empty());
		let bssid = info.bssid;
		self.inuse.remove(&mut self.arena, handle);
		self.arena.remove(handle);
		self.index.remove(&bssid);
		trace!("removed network entry for {bssid:02x?}");
	}

	/// Applies a beacon/probe-response observation, creating or
	/// refreshing the entry and moving it to the warm end of the store.
	pub fn observe(
		&mut self,
		obs: &BeaconObservation<'_>,
		now: u64,
	) -> Result<Handle, StoreError> {
		let handle = self.get_or_create(&obs.bssid, now)?;
		// Newest observations live at the tail.
		self.inuse.remove(&mut self.arena, handle);
		self.inuse.push_back(&mut self.arena, handle);

		let info = self.arena.get_mut(handle).unwrap();
		info.latest_activity_timestamp = now;
		info.latest_beacon_rx_power = obs.rx_power_dbm;
		info.beacon_interval_tu = obs.beacon_interval_tu;
		info.capabilities = obs.capabilities;
		info.ht_capable = obs.ht_capable;
		info.chan_spec = ChanSpec::bw20(obs.channel);
		if let Some(dtim) = obs.dtim_period {
			info.dtim_period = dtim;
		}
		if !obs.ssid.is_empty() {
			info.ssid = truncate_ssid(obs.ssid);
		}
		info.basic_rates.clear();
		for &rate in obs.basic_rates.iter().take(NUM_BASIC_RATES_MAX) {
			let _ = info.basic_rates.push(rate);
		}
		Ok(handle)
	}

	/// Refreshes the activity timestamp of `handle`.
	pub fn touch(&mut self, handle: Handle, now: u64) {
		if let Some(info) = self.arena.get_mut(handle) {
			info.latest_activity_timestamp = now;
		}
		self.inuse.remove(&mut self.arena, handle);
		self.inuse.push_back(&mut self.arena, handle);
	}

	/// Periodic sweep: reclaims unpinned entries not observed for
	/// [`NETWORK_INFO_TIMEOUT_USEC`]. Runs from the coarse scheduler.
	pub fn timestamp_check(&mut self, now: u64) {
		let expired: Vec<Handle> = self
			.inuse
			.iter(&self.arena)
			.filter(|&h| {
				self.arena.get(h).is_some_and(|n| {
					n.evictable()
						&& now.saturating_sub(n.latest_activity_timestamp)
							> NETWORK_INFO_TIMEOUT_USEC
				})
			})
			.collect();
		for handle in expired {
			if let Some(info) = self.arena.get(handle) {
				info!("network {:02x?} timed out of the store", info.bssid);
			}
			self.remove(handle);
		}
	}
}

impl Default for NetworkStore {
	fn default() -> Self {
		Self::new()
	}
}

/// Copies at most [`SSID_LEN_MAX`] bytes of `ssid`.
pub fn truncate_ssid(ssid: &str) -> Ssid {
	let mut out = Ssid::new();
	for ch in ssid.chars() {
		if out.push(ch).is_err() {
			break;
		}
	}
	out
}

//! Per-peer station records.
//!
//! A station lives in exactly one network's member list. The AP assigns
//! ids densely from 1; STA and IBSS use id 1 for the peer/BSSID. The
//! arena is shared by all networks.

use hashbrown::HashSet;
use log::{debug, error};

use crate::collections::{Arena, Handle, List};
use crate::config::MAX_NUM_STATIONS;
use crate::error::StoreError;
use crate::pktbuf::{PhyMode, TxParams};
use crate::MacAddr;

/// Maximum hostname length learned from DHCP.
pub const STATION_INFO_HOSTNAME_MAXLEN: usize = 19;

pub type Hostname = heapless::String<STATION_INFO_HOSTNAME_MAXLEN>;

bitflags::bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct StationFlags: u32 {
		/// Keep the associated counts entry when the station leaves.
		const KEEP = 0x0001;
		/// The inactivity sweeper must not deauthenticate this peer.
		const DISABLE_ASSOC_CHECK = 0x0002;
		/// The peer advertised power management in its last frame.
		const DOZE = 0x0004;
		const HT_CAPABLE = 0x0008;
	}
}

/// One peer of a network.
#[derive(Debug)]
pub struct StationInfo {
	pub addr: MacAddr,
	/// Station id, unique within the owning network, 1-based.
	pub id: u16,
	/// Hostname learned from DHCP option 12, truncated.
	pub hostname: Hostname,
	/// IPv4 binding learned from DHCP, if any.
	pub ip_addr: Option<[u8; 4]>,
	pub flags: StationFlags,
	/// MAC time of the most recent reception from this peer.
	pub latest_rx_timestamp: u64,
	/// MAC time of the most recent reception or transmission.
	pub latest_txrx_timestamp: u64,
	/// 12-bit sequence number of the last MPDU reception.
	pub latest_rx_seq: u16,
	/// Current unicast Tx parameters for this peer.
	pub tx_params: TxParams,
	/// Rate-selection scheme index; 0 is the static default.
	pub rate_selection_scheme: u16,
	/// Frames currently sitting in this peer's Tx queue.
	pub num_queued_packets: u32,
	/// Handle of this peer's entry in the counts store, if tracked.
	pub counts: Option<Handle>,
}

impl StationInfo {
	fn new(addr: MacAddr, id: u16, now: u64) -> Self {
		Self {
			addr,
			id,
			hostname: Hostname::new(),
			ip_addr: None,
			flags: StationFlags::empty(),
			latest_rx_timestamp: now,
			latest_txrx_timestamp: now,
			latest_rx_seq: 0,
			tx_params: TxParams::new(3, PhyMode::NonHt, 0, crate::config::DEFAULT_TX_POWER_DBM),
			rate_selection_scheme: 0,
			num_queued_packets: 0,
			counts: None,
		}
	}
}

/// Arena of station records; membership lists are owned by the
/// networks.
pub struct StationStore {
	arena: Arena<StationInfo>,
}

impl StationStore {
	pub fn new() -> Self {
		Self::with_capacity(MAX_NUM_STATIONS)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			arena: Arena::with_capacity(capacity),
		}
	}

	pub fn get(&self, handle: Handle) -> Option<&StationInfo> {
		self.arena.get(handle)
	}

	pub fn get_mut(&mut self, handle: Handle) -> Option<&mut StationInfo> {
		self.arena.get_mut(handle)
	}

	pub fn find_addr(&self, members: &List, addr: &MacAddr) -> Option<Handle> {
		members
			.iter(&self.arena)
			.find(|&h| self.arena.get(h).is_some_and(|s| s.addr == *addr))
	}

	pub fn find_id(&self, members: &List, id: u16) -> Option<Handle> {
		members
			.iter(&self.arena)
			.find(|&h| self.arena.get(h).is_some_and(|s| s.id == id))
	}

	/// Adds a peer to `members`, enforcing address uniqueness and
	/// assigning the smallest free id in `1..=max_id` unless
	/// `requested_id` is given.
	pub fn add(
		&mut self,
		members: &mut List,
		addr: MacAddr,
		requested_id: Option<u16>,
		max_id: u16,
		now: u64,
	) -> Result<Handle, StoreError> {
		if let Some(existing) = self.find_addr(members, &addr) {
			// Idempotent: a re-add returns the live record.
			return Ok(existing);
		}
		let id = match requested_id {
			Some(id) => {
				if self.find_id(members, id).is_some() {
					return Err(StoreError::Duplicate);
				}
				id
			}
			None => {
				let used: HashSet<u16> = members
					.iter(&self.arena)
					.filter_map(|h| self.arena.get(h).map(|s| s.id))
					.collect();
				(1..=max_id)
					.find(|id| !used.contains(id))
					.ok_or(StoreError::NoFreeId)?
			}
		};
		let handle = self
			.arena
			.insert(StationInfo::new(addr, id, now))
			.map_err(|_| StoreError::StationStoreFull)?;
		members.push_back(&mut self.arena, handle);
		debug!("added station {addr:02x?} with id {id}");
		Ok(handle)
	}

	/// Removes a peer from `members` and frees its record, returning it
	/// for teardown (queue purge, counts disposition).
	pub fn remove(&mut self, members: &mut List, addr: &MacAddr) -> Option<StationInfo> {
		let handle = self.find_addr(members, addr)?;
		members.remove(&mut self.arena, handle);
		let info = self.arena.remove(handle);
		if info.is_none() {
			error!("station record vanished during removal");
		}
		info
	}

	pub fn num_free(&self) -> usize {
		self.arena.num_free()
	}

	/// Walks a membership list front to back.
	pub fn iter_members<'a>(&'a self, members: &List) -> impl Iterator<Item = Handle> + 'a {
		members.iter(&self.arena)
	}
}

impl Default for StationStore {
	fn default() -> Self {
		Self::new()
	}
}

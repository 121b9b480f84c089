//! Collaborator traits of the surrounding platform.
//!
//! The core never talks to hardware directly. Time, wired Ethernet and
//! user I/O are reached through the traits below, injected at boot; the
//! radio plane is reached through typed mailbox messages to CPU-Low (see
//! [`crate::ipc`]).

use crate::MacAddr;

/// The two 64-bit microsecond counters of the timer plane.
///
/// MAC time is updatable (TSF alignment across a BSS requires following a
/// partner node); system time is monotonic and never adjusted. All
/// implementations use interior mutability so the core can share the
/// clock with schedulers and stores.
pub trait TimerPlane {
	/// Current MAC time (TSF) in microseconds.
	fn mac_time_usec(&self) -> u64;
	/// Current monotonic system time in microseconds.
	fn system_time_usec(&self) -> u64;
	/// Overwrites the MAC time.
	fn set_mac_time_usec(&self, new_time: u64);
	/// Shifts the MAC time by a signed delta.
	fn apply_mac_time_delta_usec(&self, delta: i64) {
		let now = self.mac_time_usec();
		self.set_mac_time_usec(now.wrapping_add_signed(delta));
	}
}

/// Wired Ethernet egress. Ingress is pushed into
/// [`crate::mac_high::MacHigh::eth_rx`] by the platform glue.
pub trait EthernetPlane {
	/// Transmits one Ethernet frame (dst/src/ethertype/payload, no FCS).
	fn send(&self, frame: &[u8]);
}

/// Status codes shown on the platform's user I/O (hex displays / LEDs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIoStatus {
	Identify,
	ApplicationRole,
	MemberListUpdate,
	GoodFcsEvent,
	BadFcsEvent,
	CpuError,
}

/// Identity of the node as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwInfo {
	pub serial_number: u32,
	pub fpga_dna: [u32; 2],
	pub hw_addr_wlan: MacAddr,
	pub hw_addr_wlan_exp: MacAddr,
}

/// Platform identity and user I/O.
pub trait PlatformPlane {
	fn hw_info(&self) -> HwInfo;
	/// Updates the user-visible status display. `arg` is
	/// status-specific (member count, error code, ...).
	fn display_status(&self, status: UserIoStatus, arg: u32);
}

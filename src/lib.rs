//! Upper-MAC (CPU-High) core of an 802.11 a/g/n reference design.
//!
//! This crate implements the management plane of a dual-CPU software MAC:
//! Tx queueing and the Tx service loop, the packet-buffer ownership
//! protocol shared with the lower-MAC CPU, the management-frame state
//! machines for the AP / STA / IBSS roles, BSS discovery and join, the
//! bounded station/network/counts directories, beacon scheduling and the
//! Ethernet encapsulation bridge.
//!
//! The lower MAC (CPU-Low) owns the PHY and all medium-access timing. It
//! is reached exclusively through the shared packet buffers of
//! [`pktbuf`] and the typed mailbox of [`ipc`]; everything else in this
//! crate runs as a single cooperative poll loop driven by
//! [`mac_high::MacHigh::poll`].

#![cfg_attr(not(test), no_std)]
#![allow(clippy::too_many_arguments)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod collections;
pub mod config;
pub mod error;
pub mod eth;
pub mod eventlog;
pub mod exp;
pub mod frame;
pub mod ipc;
pub mod join;
pub mod ltg;
pub mod mac_high;
pub mod network;
pub mod pktbuf;
pub mod platform;
pub mod queue;
pub mod roles;
pub mod scan;
pub mod scheduler;
pub mod synch;

pub use crate::error::MacError;
pub use crate::mac_high::MacHigh;

/// MAC address length in bytes.
pub const MAC_ADDR_LEN: usize = 6;

/// A 48-bit IEEE 802 hardware address.
pub type MacAddr = [u8; MAC_ADDR_LEN];

/// The broadcast address, used both as Ethernet broadcast and as the
/// wildcard BSSID in probe requests.
pub const BCAST_ADDR: MacAddr = [0xff; MAC_ADDR_LEN];

/// Returns whether `addr` is a group (multicast or broadcast) address.
#[inline]
pub fn addr_is_mcast(addr: &MacAddr) -> bool {
	addr[0] & 0x01 != 0
}

/// Mask for the locally-administered bit in the first address octet.
pub const MAC_ADDR_MSB_MASK_LOCAL: u8 = 0x02;

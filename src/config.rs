//! Compile-time configuration of the upper MAC.
//!
//! The pool sizes and the shared-layout constants mirror the memory map
//! that CPU-Low is built against and must not be changed independently.

/// Number of Tx packet buffers shared with CPU-Low.
pub const NUM_TX_PKT_BUFS: usize = 16;
/// Number of Rx packet buffers shared with CPU-Low.
pub const NUM_RX_PKT_BUFS: usize = 8;

/// Largest MPDU the frame builders may produce (2 KiB), including the
/// MAC header and FCS.
pub const MAX_PKT_SIZE_B: usize = 2 << 10;

/// Space reserved in front of every MPDU for the PHY preamble header.
pub const PHY_PKT_BUF_PHY_HDR_SIZE: usize = 0x10;

/// Payload capacity of a Tx queue element (4 KiB). Large enough for any
/// MPDU plus headroom.
pub const QUEUE_BUFFER_SIZE: usize = 0x1000;

/// Default number of elements in the Tx queue free pool. The pool is
/// sized once at boot; a DRAM-less platform would use a smaller value.
pub const DEFAULT_NUM_TX_QUEUE_ELEMENTS: usize = 256;

/// Default cap on the occupancy of any single data queue.
pub const DEFAULT_MAX_QUEUE_LEN: usize = 150;

/// Capacity of the network (BSS) directory.
pub const MAX_NUM_NETWORKS: usize = 64;
/// Capacity of the station directory (across all networks).
pub const MAX_NUM_STATIONS: usize = 64;
/// Capacity of the Tx/Rx counts directory.
pub const MAX_NUM_COUNTS: usize = 128;

/// Default limit on associated stations in AP mode.
pub const DEFAULT_MAX_ASSOCIATIONS: u16 = 10;

/// Microseconds per 802.11 Time Unit.
pub const MICROSECONDS_PER_TU: u64 = 1024;

/// Unobserved, unpinned network entries are evicted after this long.
pub const NETWORK_INFO_TIMEOUT_USEC: u64 = 600_000_000;
/// Idle counts entries are reclaimed after this long.
pub const COUNTS_TXRX_TIMEOUT_USEC: u64 = 600_000_000;
/// Period of the directory timestamp sweeps.
pub const TIMESTAMP_CHECK_INTERVAL_USEC: u64 = 10_000_000;

/// An associated station silent for this long is deauthenticated by the
/// AP inactivity sweeper.
pub const ASSOCIATION_TIMEOUT_USEC: u64 = 300_000_000;
/// Period of the AP inactivity sweeper and of the STA link watchdog.
pub const ASSOCIATION_CHECK_INTERVAL_USEC: u64 = 1_000_000;

/// Bound on any wait for CPU-Low to accept a request.
pub const CPU_LOW_DATA_REQ_TIMEOUT_USEC: u64 = 500_000;

/// Scan FSM: default dwell time on each channel.
pub const DEFAULT_SCAN_TIME_PER_CHANNEL_USEC: u32 = 150_000;
/// Scan FSM: default interval between probe requests within a dwell.
pub const DEFAULT_SCAN_PROBE_TX_INTERVAL_USEC: u32 = 20_000;

/// Join FSM: period of the network-store match poll.
pub const JOIN_POLL_INTERVAL_USEC: u64 = 100_000;
/// Join FSM: management retransmit interval while authenticating or
/// associating.
pub const JOIN_RETRY_INTERVAL_USEC: u64 = 250_000;

/// Compensation for the PHY Tx pipeline when following a received beacon
/// timestamp (in microseconds).
pub const PHY_T_OFFSET_USEC: u64 = 25;

/// Default event log capacity in bytes.
pub const DEFAULT_EVENT_LOG_SIZE: usize = 1 << 20;

/// Default channel at boot.
pub const DEFAULT_CHANNEL: u8 = 1;
/// Default Tx power in dBm.
pub const DEFAULT_TX_POWER_DBM: i8 = 15;

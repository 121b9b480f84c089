//! Join state machine (STA and IBSS).
//!
//! Joining runs a scan filtered to the target SSID, polls the network
//! store for a match, then either authenticates and associates (STA) or
//! adopts the network as owned (IBSS). The MAC context drives the FSM
//! from the 100 ms poll event and from received authentication and
//! association responses.

use log::{debug, info, warn};

use crate::collections::Handle;
use crate::config::JOIN_RETRY_INTERVAL_USEC;
use crate::error::JoinError;
use crate::network::{truncate_ssid, Ssid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
	Idle,
	/// Scanning and polling the store for the target SSID.
	Searching,
	/// Auth request sent, waiting for the response.
	Authenticating,
	/// Association request sent, waiting for the response.
	Associating,
}

/// What the MAC context must do next, returned by the poll handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAction {
	None,
	/// A network matched: stop the scan, adopt its parameters and tune.
	/// STA continues with authentication, IBSS adopts ownership.
	FoundNetwork(Handle),
	/// (Re)send the authentication request.
	SendAuthReq,
	/// (Re)send the association request.
	SendAssocReq,
	/// The attempt failed; the FSM returned to idle.
	Failed(JoinError),
}

/// The join FSM proper.
pub struct JoinFsm {
	state: JoinState,
	target_ssid: Ssid,
	target: Option<Handle>,
	timeout_at: Option<u64>,
	last_mgmt_tx: u64,
}

impl JoinFsm {
	pub fn new() -> Self {
		Self {
			state: JoinState::Idle,
			target_ssid: Ssid::new(),
			target: None,
			timeout_at: None,
			last_mgmt_tx: 0,
		}
	}

	pub fn state(&self) -> JoinState {
		self.state
	}

	pub fn is_joining(&self) -> bool {
		self.state != JoinState::Idle
	}

	pub fn target_ssid(&self) -> &str {
		self.target_ssid.as_str()
	}

	pub fn target(&self) -> Option<Handle> {
		self.target
	}

	/// Begins a join towards `ssid` with an optional timeout.
	pub fn start(&mut self, ssid: &str, now: u64, timeout_usec: Option<u64>) -> bool {
		if self.is_joining() {
			warn!("join already in progress");
			return false;
		}
		self.state = JoinState::Searching;
		self.target_ssid = truncate_ssid(ssid);
		self.target = None;
		self.timeout_at = timeout_usec.map(|t| now + t);
		info!("join started towards {ssid:?}");
		true
	}

	/// Aborts the attempt and returns to idle. The target handle is
	/// kept so the caller can record the attempt outcome.
	pub fn abort(&mut self) {
		self.state = JoinState::Idle;
		self.timeout_at = None;
	}

	/// The 100 ms poll. `matched` is the store entry for the target
	/// SSID, if one is known by now.
	pub fn poll(&mut self, now: u64, matched: Option<Handle>) -> JoinAction {
		if self.state == JoinState::Idle {
			return JoinAction::None;
		}
		if let Some(timeout_at) = self.timeout_at {
			if now >= timeout_at {
				warn!("join timed out in {:?}", self.state);
				self.abort();
				return JoinAction::Failed(JoinError::Timeout);
			}
		}
		match self.state {
			JoinState::Searching => match matched {
				Some(handle) => {
					self.target = Some(handle);
					JoinAction::FoundNetwork(handle)
				}
				None => JoinAction::None,
			},
			JoinState::Authenticating if self.retry_due(now) => {
				self.last_mgmt_tx = now;
				JoinAction::SendAuthReq
			}
			JoinState::Associating if self.retry_due(now) => {
				self.last_mgmt_tx = now;
				JoinAction::SendAssocReq
			}
			_ => JoinAction::None,
		}
	}

	fn retry_due(&self, now: u64) -> bool {
		now.saturating_sub(self.last_mgmt_tx) >= JOIN_RETRY_INTERVAL_USEC
	}

	/// STA: the network was adopted and the first auth request goes
	/// out.
	pub fn begin_authentication(&mut self, now: u64) {
		debug!("join: authenticating");
		self.state = JoinState::Authenticating;
		self.last_mgmt_tx = now;
	}

	/// Auth response arrived. A success moves to association; a
	/// rejection fails the join with the received status code.
	pub fn on_auth_response(&mut self, status_code: u16, now: u64) -> JoinAction {
		if self.state != JoinState::Authenticating {
			return JoinAction::None;
		}
		if status_code != crate::frame::status::SUCCESS {
			self.abort();
			return JoinAction::Failed(JoinError::AuthReject(status_code));
		}
		debug!("join: authenticated, associating");
		self.state = JoinState::Associating;
		self.last_mgmt_tx = now;
		JoinAction::SendAssocReq
	}

	/// Association response arrived. Returns `Ok(aid)` on success.
	pub fn on_assoc_response(&mut self, status_code: u16, aid: u16) -> Result<u16, JoinAction> {
		if self.state != JoinState::Associating {
			return Err(JoinAction::None);
		}
		if status_code != crate::frame::status::SUCCESS {
			self.abort();
			return Err(JoinAction::Failed(JoinError::AssocReject(status_code)));
		}
		info!("join complete, AID {aid}");
		self.state = JoinState::Idle;
		self.timeout_at = None;
		Ok(aid)
	}
}

impl Default for JoinFsm {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::frame::status;

	fn dummy_handle() -> Handle {
		let mut arena = crate::collections::Arena::with_capacity(1);
		arena.insert(0u8).unwrap()
	}

	#[test]
	fn search_then_auth_then_assoc() {
		let mut join = JoinFsm::new();
		assert!(join.start("MangoNet", 0, Some(5_000_000)));
		assert_eq!(join.poll(100, None), JoinAction::None);

		let handle = dummy_handle();
		assert_eq!(join.poll(200, Some(handle)), JoinAction::FoundNetwork(handle));
		join.begin_authentication(200);
		assert_eq!(join.state(), JoinState::Authenticating);

		assert_eq!(
			join.on_auth_response(status::SUCCESS, 300),
			JoinAction::SendAssocReq
		);
		assert_eq!(join.state(), JoinState::Associating);
		assert_eq!(join.on_assoc_response(status::SUCCESS, 1), Ok(1));
		assert_eq!(join.state(), JoinState::Idle);
	}

	#[test]
	fn timeout_fails_the_join() {
		let mut join = JoinFsm::new();
		join.start("nowhere", 0, Some(1_000_000));
		assert_eq!(
			join.poll(1_000_000, None),
			JoinAction::Failed(JoinError::Timeout)
		);
		assert_eq!(join.state(), JoinState::Idle);
	}

	#[test]
	fn auth_reject_surfaces_status() {
		let mut join = JoinFsm::new();
		join.start("net", 0, None);
		join.begin_authentication(0);
		assert_eq!(
			join.on_auth_response(status::AUTH_REJECT_OUTSIDE_SCOPE, 10),
			JoinAction::Failed(JoinError::AuthReject(status::AUTH_REJECT_OUTSIDE_SCOPE))
		);
	}

	#[test]
	fn assoc_reject_surfaces_status() {
		let mut join = JoinFsm::new();
		join.start("net", 0, None);
		join.begin_authentication(0);
		join.on_auth_response(status::SUCCESS, 10);
		assert_eq!(
			join.on_assoc_response(status::REJECT_TOO_MANY_ASSOCIATIONS, 0),
			Err(JoinAction::Failed(JoinError::AssocReject(
				status::REJECT_TOO_MANY_ASSOCIATIONS
			)))
		);
	}

	#[test]
	fn mgmt_retransmit_cadence() {
		let mut join = JoinFsm::new();
		join.start("net", 0, None);
		join.begin_authentication(0);
		assert_eq!(join.poll(JOIN_RETRY_INTERVAL_USEC - 1, None), JoinAction::None);
		assert_eq!(
			join.poll(JOIN_RETRY_INTERVAL_USEC, None),
			JoinAction::SendAuthReq
		);
		// The retry timer rearms from the resend.
		assert_eq!(
			join.poll(JOIN_RETRY_INTERVAL_USEC + 1, None),
			JoinAction::None
		);
	}
}

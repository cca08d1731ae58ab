//! Inbound join-request prompt with an auto-decline countdown.

use std::time::{Duration, Instant};

use super::traits::{JoinReply, RemoteUser};

/// User-visible notices queued for the host to display or act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    JoinRequested { username: String },
    JoinRequestAccepted { username: String },
    JoinRequestDeclined { username: String },
    JoinRequestIgnored { username: String },
    /// A verified join/spectate secret; the host should connect here.
    JoinServer { name: String, address: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRequestState {
    Idle,
    AwaitingReply { user: RemoteUser, deadline: Instant },
}

#[derive(Debug)]
pub struct JoinRequests {
    state: JoinRequestState,
    timeout: Duration,
}

impl JoinRequests {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: JoinRequestState::Idle,
            timeout,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn state(&self) -> &JoinRequestState {
        &self.state
    }

    pub fn pending(&self) -> Option<&RemoteUser> {
        match &self.state {
            JoinRequestState::AwaitingReply { user, .. } => Some(user),
            JoinRequestState::Idle => None,
        }
    }

    /// Start awaiting a reply for `user`. A newer request replaces an older
    /// one.
    pub fn begin(&mut self, user: RemoteUser, now: Instant) {
        self.state = JoinRequestState::AwaitingReply {
            user,
            deadline: now + self.timeout,
        };
    }

    /// Answer the pending request, if any.
    pub fn respond(&mut self, accept: bool) -> Option<(RemoteUser, JoinReply)> {
        match std::mem::replace(&mut self.state, JoinRequestState::Idle) {
            JoinRequestState::AwaitingReply { user, .. } => {
                let reply = if accept {
                    JoinReply::Accept
                } else {
                    JoinReply::Decline
                };
                Some((user, reply))
            }
            JoinRequestState::Idle => None,
        }
    }

    /// Returns the requester exactly once when the countdown has run out.
    pub fn expire(&mut self, now: Instant) -> Option<RemoteUser> {
        let expired = matches!(
            &self.state,
            JoinRequestState::AwaitingReply { deadline, .. } if now >= *deadline
        );
        if !expired {
            return None;
        }
        match std::mem::replace(&mut self.state, JoinRequestState::Idle) {
            JoinRequestState::AwaitingReply { user, .. } => Some(user),
            JoinRequestState::Idle => None,
        }
    }

    pub fn clear(&mut self) {
        self.state = JoinRequestState::Idle;
    }
}

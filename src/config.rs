/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tunable timeouts shared by the channel and replica-driving components.
//!
//! [`Constants`] is an immutable value: build it once at startup with the builder pattern and hand a
//! copy to each [`Channel`](crate::channel::Channel) (or any other component that needs it). Nothing
//! in the crate reads these values from global state.
//!
//! ```ignore
//! let constants =
//!     Constants::builder()
//!     .handshake_timeout(Duration::from_secs(2))
//!     .log_events(true)
//!     .build();
//! ```

use std::time::Duration;

use typed_builder::TypedBuilder;

/// Stores the timeouts and switches that govern a replica's channels and view changes:
/// 1. The message timeout: how often an unanswered handshake (or other replica message) is
///    retransmitted.
/// 2. The client message timeout: how often a client retransmits an unanswered request.
/// 3. The request timeout: how long a client waits for a request before giving up.
/// 4. The handshake timeout: the overall budget for a [handshake](crate::channel::Channel::handshake).
/// 5. The primary and backup keepalive timeouts: how often the primary sends keepalives, and how long
///    a backup waits for one before suspecting the primary.
/// 6. The view change timeout: how long a view change may stall before it is restarted.
/// 7. The retransmit log timeout: how long the primary waits before resending unacknowledged log
///    entries.
/// 8. Whether logs are trimmed once a quorum has acknowledged their prefix.
/// 9. The view response debounce: for how long repeated errors about the same view are suppressed
///    by [`check_view_response`](crate::channel::Channel::check_view_response).
/// 10. The "Log Events" flag: if set, channel events are printed through the [`log`] crate.
///
/// Every field has a default, so `Constants::builder().build()` yields the standard configuration.
#[derive(Clone, Debug, TypedBuilder)]
pub struct Constants {
    #[builder(default = Duration::from_millis(500))]
    pub message_timeout: Duration,
    #[builder(default = Duration::from_millis(1500))]
    pub client_message_timeout: Duration,
    #[builder(default = Duration::from_secs(10))]
    pub request_timeout: Duration,
    #[builder(default = Duration::from_secs(5))]
    pub handshake_timeout: Duration,
    #[builder(default = Duration::from_secs(1))]
    pub primary_keepalive_timeout: Duration,
    #[builder(default = Duration::from_secs(2))]
    pub backup_keepalive_timeout: Duration,
    #[builder(default = Duration::from_millis(500))]
    pub view_change_timeout: Duration,
    #[builder(default = Duration::from_secs(2))]
    pub retransmit_log_timeout: Duration,
    #[builder(default = true)]
    pub trim_log: bool,
    #[builder(default = Duration::from_secs(5))]
    pub view_response_debounce: Duration,
    #[builder(default = false)]
    pub log_events: bool,
}

impl Default for Constants {
    fn default() -> Self {
        Constants::builder().build()
    }
}

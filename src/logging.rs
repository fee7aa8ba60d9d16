/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events, and a line-oriented sink to print them to.
//!
//! The event logs defined in this module are printed if the user enabled them via
//! [`Constants::log_events`](crate::config::Constants).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, either set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations) of
//! your own, or call [`setup_logger`] with any [`Write`] sink.
//!
//! ## Event log format
//!
//! Event messages are CSVs (Comma Separated Values) with at least two values. The first two values
//! are always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [HandshakeComplete](crate::events::HandshakeCompleteEvent) is printed:
//!
//! ```text
//! HandshakeComplete, 1701329264, A, B, Q3vJx2Ck, 1
//! ```
//!
//! In the snippet, the remaining values are the local uid, the remote uid, the channel uid, and the
//! connection version.
//!
//! ## Sink format
//!
//! [`setup_logger`] prefixes every record with the wall-clock time in `seconds.microseconds` and
//! the record's level, and writes it to a line-buffered writer that flushes whenever a written
//! fragment ends in a newline:
//!
//! ```text
//! 1701329264.123456 [INFO] HandshakeComplete, 1701329264, A, B, Q3vJx2Ck, 1
//! ```

use std::{
    io::{LineWriter, Write},
    sync::atomic::{AtomicU32, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use log::{LevelFilter, SetLoggerError};
use typed_builder::TypedBuilder;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const HANDSHAKE_START: &str = "HandshakeStart";
pub const HANDSHAKE_COMPLETE: &str = "HandshakeComplete";
pub const HANDSHAKE_FAILED: &str = "HandshakeFailed";

pub const RECONNECT: &str = "Reconnect";
pub const CLOSE_CHANNEL: &str = "CloseChannel";

pub const SUPPRESS_VIEW_RESPONSE: &str = "SuppressViewResponse";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for HandshakeStartEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |handshake_start_event: &HandshakeStartEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                HANDSHAKE_START,
                secs_since_unix_epoch(handshake_start_event.timestamp),
                handshake_start_event.local_uid,
                handshake_start_event.remote_uid,
                if handshake_start_event.active_end {
                    "active"
                } else {
                    "passive"
                }
            )
        };
        Box::new(logger)
    }
}

impl Logger for HandshakeCompleteEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |handshake_complete_event: &HandshakeCompleteEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                HANDSHAKE_COMPLETE,
                secs_since_unix_epoch(handshake_complete_event.timestamp),
                handshake_complete_event.local_uid,
                handshake_complete_event.remote_uid,
                handshake_complete_event
                    .channel_uid
                    .as_deref()
                    .unwrap_or("-"),
                handshake_complete_event.connection_version
            )
        };
        Box::new(logger)
    }
}

impl Logger for HandshakeFailedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |handshake_failed_event: &HandshakeFailedEvent| {
            log::warn!(
                "{}, {}, {}, {}, {}",
                HANDSHAKE_FAILED,
                secs_since_unix_epoch(handshake_failed_event.timestamp),
                handshake_failed_event.local_uid,
                handshake_failed_event.remote_uid,
                handshake_failed_event.error
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReconnectEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reconnect_event: &ReconnectEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECONNECT,
                secs_since_unix_epoch(reconnect_event.timestamp),
                reconnect_event.remote_uid,
                reconnect_event.channel_uid.as_deref().unwrap_or("-"),
                reconnect_event.connection_version
            )
        };
        Box::new(logger)
    }
}

impl Logger for CloseChannelEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |close_channel_event: &CloseChannelEvent| {
            log::info!(
                "{}, {}, {}, {}",
                CLOSE_CHANNEL,
                secs_since_unix_epoch(close_channel_event.timestamp),
                close_channel_event.remote_uid,
                close_channel_event.connection_version
            )
        };
        Box::new(logger)
    }
}

impl Logger for SuppressViewResponseEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |suppress_view_response_event: &SuppressViewResponseEvent| {
            log::debug!(
                "{}, {}, {}, {}",
                SUPPRESS_VIEW_RESPONSE,
                secs_since_unix_epoch(suppress_view_response_event.timestamp),
                suppress_view_response_event.remote_uid,
                suppress_view_response_event.viewno
            )
        };
        Box::new(logger)
    }
}

impl Event {
    /// Print this event with its default logging handler.
    pub(crate) fn log(&self) {
        match self {
            Event::HandshakeStart(event) => HandshakeStartEvent::get_logger()(event),
            Event::HandshakeComplete(event) => HandshakeCompleteEvent::get_logger()(event),
            Event::HandshakeFailed(event) => HandshakeFailedEvent::get_logger()(event),
            Event::Reconnect(event) => ReconnectEvent::get_logger()(event),
            Event::CloseChannel(event) => CloseChannelEvent::get_logger()(event),
            Event::SuppressViewResponse(event) => SuppressViewResponseEvent::get_logger()(event),
        }
    }
}

pub(crate) fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(UNIX_EPOCH)
        .expect("Event occured before the Unix Epoch.")
        .as_secs()
}

/// Format `timestamp` as `seconds.microseconds` since the Unix Epoch.
pub fn timestamp_prefix(timestamp: SystemTime) -> String {
    let since_epoch = timestamp.duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}.{:06}", since_epoch.as_secs(), since_epoch.subsec_micros())
}

/// Settings of the diagnostic sink installed by [`setup_logger`].
#[derive(Clone, Debug, TypedBuilder)]
pub struct LoggerConfig {
    /// The most verbose level that is printed.
    #[builder(default = LevelFilter::Info)]
    pub level: LevelFilter,

    /// Print only one of every `frequency` records. 0 and 1 both print every record.
    #[builder(default = 0)]
    pub frequency: u32,

    /// Print nothing at all.
    #[builder(default = false)]
    pub quiet: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig::builder().build()
    }
}

/// Admits one of every `frequency` records.
struct RecordSampler {
    frequency: u32,
    count: AtomicU32,
}

impl RecordSampler {
    fn new(frequency: u32) -> Self {
        Self {
            frequency,
            count: AtomicU32::new(0),
        }
    }

    fn admit(&self) -> bool {
        if self.frequency <= 1 {
            return true;
        }
        self.count.fetch_add(1, Ordering::Relaxed) % self.frequency == 0
    }
}

/// Build the dispatch that [`setup_logger`] installs, without installing it.
pub fn dispatch<W: Write + Send + 'static>(config: LoggerConfig, sink: W) -> fern::Dispatch {
    let sampler = RecordSampler::new(config.frequency);
    let level = if config.quiet {
        LevelFilter::Off
    } else {
        config.level
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                timestamp_prefix(SystemTime::now()),
                record.level(),
                message
            ))
        })
        .level(level)
        .filter(move |_| sampler.admit())
        .chain(fern::Output::writer(Box::new(LineWriter::new(sink)), "\n"))
}

/// Install a global logger that prints timestamped, level-prefixed records to `sink`.
///
/// # Errors
///
/// Fails if a global logger has already been installed.
pub fn setup_logger<W: Write + Send + 'static>(
    config: LoggerConfig,
    sink: W,
) -> Result<(), SetLoggerError> {
    dispatch(config, sink).apply()
}

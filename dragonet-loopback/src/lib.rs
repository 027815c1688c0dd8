//! In-memory two-core transport for the Dragonet stack
//!
//! [`pair`] returns the two sides of a simulated inter-core link. Each side implements
//! `dragonet_transport::Transport`: payloads sent from one side are handed synchronously to the
//! receive handler of the destination endpoint on the other side, and namespace announcements
//! are reported to the other side's listener.
//!
//! The link starts down, like a real link before the peer core has booted.
//!
//! # Features
//!
//! * Automatic address assignment starting at 1024
//! * Announcements made before the peer binds its listener are replayed on bind
//! * Per-side counters for tests
//!
//! # Limitations
//!
//! * Handlers run in the sender's context, never in an interrupt
//! * Endpoints are never destroyed
#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

mod link;

pub use link::{Announcement, Endpoint, FIRST_ADDRESS, LoopbackTransport, MAX_PAYLOAD, pair};

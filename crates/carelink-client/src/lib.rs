//! Client side of CareLink messaging: a typed HTTP client and a poller that
//! keeps the conversation list and the open thread up to date.

pub mod client;
pub mod poller;

pub use client::{ApiClient, ClientError, Counterpart};
pub use poller::{PollIntervals, PollerHandle, Thread};

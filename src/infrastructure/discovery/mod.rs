//! Discovery Module
//!
//! Message-passing plumbing between the discovery feed, the tracker core and
//! the display.
//!
//! ## Architecture
//!
//! ```text
//!  ┌────────────────────┐  DiscoveryEvent   ┌──────────────────────┐
//!  │ SimulatedAdvertiser│ ────────────────▶ │                      │
//!  │  (or a real stack) │                   │    TrackerService    │  AppEvent
//!  └────────────────────┘                   │ registry · radar ·   │ ─────────▶ display
//!                           TrackerCommand  │ geo estimator        │
//!            display ─────────────────────▶ │ (single consumer)    │
//!                                           └──────────────────────┘
//!
//!  ┌──────────────┐  ConnectionStatus / LogMessage
//!  │ ProxySession │ ─────────────────────────────────────────────────▶ display
//!  └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`scanner`] - simulated advertisement feed
//! - [`connection`] - proxy connection with bounded timeouts
//! - [`service`] - the tracker's consumer loop

pub mod connection;
pub mod scanner;
pub mod service;

pub use connection::{ProxyLink, ProxySession, SessionError, SimulatedLink};
pub use scanner::{SimulatedAdvertiser, SimulatedPeripheral};
pub use service::{TrackerCommand, TrackerService};

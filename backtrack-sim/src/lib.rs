//! Backtrack Simulation - deterministic sources and a pull-based engine
//! for exercising live buffering and rewind without a network or a player.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
//!
//! [`SimulatedSource`] serves a byte pattern where every byte identifies its
//! own stream offset, in seeded variable-size chunks, with optional network
//! delay, end of broadcast and injected failures. [`SimulatedResolver`]
//! publishes such sources as channels with quality profiles.
//! [`SimulatedEngine`] plays handles registered on a
//! [`CallbackBridge`](backtrack_core::CallbackBridge) from its own thread,
//! the way an embedded media player would.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use backtrack_core::{BufferConfig, CallbackBridge, LiveSession, StreamTarget};
//! use backtrack_sim::{EngineConfig, SimulatedEngine, SimulatedResolver, SourceProfile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = Arc::new(
//!     SimulatedResolver::new().with_channel("sim://news", [("best", SourceProfile::finite(64_000))]),
//! );
//! let session = Arc::new(LiveSession::connect(
//!     resolver,
//!     StreamTarget::new("sim://news", "best"),
//!     &BufferConfig::with_capacity(16),
//! )?);
//!
//! let bridge = Arc::new(CallbackBridge::new());
//! let handle = bridge.register(session.clone());
//! let report = SimulatedEngine::new(bridge, EngineConfig::default()).run(handle);
//!
//! assert!(report.reached_end);
//! assert_eq!(report.bytes.len(), 64_000);
//! assert!(session.buffer_len() <= 16);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod resolver;
pub mod source;

pub use engine::{EngineConfig, EngineHandle, PlaybackReport, SimulatedEngine, fraction_to_offset};
pub use resolver::{OpenedSource, SimulatedResolver};
pub use source::{SimulatedSource, SourceProfile, byte_at, expected_bytes, pattern_phase};

//! Desk Sentinel - signal monitoring and alerting engine for desk-work wellness.
//!
//! This library ingests per-frame derived measurements (eye-aspect-ratio,
//! posture score, face count, brightness) and raw input events (keystrokes,
//! clicks), and raises debounced, cooldown-gated alerts when unhealthy
//! patterns persist.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Desk Sentinel                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  capture thread     input listeners     timer thread         │
//! │  (frames+landmarks) (keyboard, mouse)   (100ms/60s/1h ticks) │
//! │        │                 │                   │               │
//! │        └─────────────────┼───────────────────┘               │
//! │                          ▼                                   │
//! │               bounded crossbeam channel                      │
//! │                          │                                   │
//! │                          ▼                                   │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ engine thread (single owner of all mutable state)      │  │
//! │  │  presence → eye / posture machines → alert dispatcher  │  │
//! │  │  activity aggregator → SQLite session windows          │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Producers never touch engine state; they enqueue typed
//! [`EngineEvent`]s and a single engine thread processes them in arrival
//! order. Within one cycle the presence update always precedes eye/posture
//! evaluation, and the engine thread is the only writer to the persisted
//! store.

pub mod alerts;
pub mod config;
pub mod engine;
pub mod sensors;
pub mod store;

// Re-export key types at crate root for convenience
pub use alerts::{AlertKind, Dispatcher, LogNotifier, LogSpeaker, Notifier, Speaker};
pub use config::{Config, MonitorSettings, SettingsError};
pub use engine::{Engine, EngineEvent, EngineStatus, FrameObservation, TimerTick};
pub use sensors::{
    FaceLandmarks, Fingerprint, Frame, FrameSource, InputEvent, InputSource, LandmarkDetector,
    PoseLandmarks,
};
pub use store::{ActivityDelta, ActivityTotals, Store};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

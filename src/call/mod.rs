//! Per-call-run orchestration

pub mod controller;

pub use controller::{CallController, DefaultSignalingFactory, SignalingFactory};

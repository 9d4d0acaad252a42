//! Acquisition pipeline
//!
//! - Mode state machine and sample buffer ownership ([`controller`])
//! - Frame pacing and tick bookkeeping ([`scheduler`])
//! - Sampling-rate control ([`rate`])

pub mod controller;
pub mod rate;
pub mod scheduler;

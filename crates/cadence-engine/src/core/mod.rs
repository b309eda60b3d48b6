//! Core host-facing contracts.
//!
//! This module defines the interface between the runtime (platform loop)
//! and application code. Applications never see the frame source; they
//! receive the scheduler the runtime drives.

mod app;

pub use app::{App, AppControl};

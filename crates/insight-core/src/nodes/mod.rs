//! Workflow steps
//!
//! Each step reads the state it needs and returns a `StateUpdate`; none of
//! them writes the state directly.

pub mod analyze;
pub mod format;
pub mod generate;
pub mod quality;
pub mod router;

pub use analyze::{Analysis, Pattern};
pub use quality::QualityReport;
pub use router::Route;

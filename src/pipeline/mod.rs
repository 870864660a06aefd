// Glue between the camera controller and the analysis orchestrator.

pub mod scan;

pub use scan::{OutcomeCallback, ScanPipeline};

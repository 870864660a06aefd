// Camera domain: device access, live streams, and still capture.

pub mod backend;
pub mod controller;
pub mod dummy;
pub mod encode;
pub mod error;
pub mod still;
pub mod types;

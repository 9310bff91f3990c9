//! BDD step definitions for devmon service

pub mod device_steps;
pub mod lifecycle_steps;
pub mod polling_steps;

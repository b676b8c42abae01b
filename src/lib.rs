//! Proximity estimation and live radar positioning for nearby BLE peripherals.

pub mod domain;
pub mod infrastructure;

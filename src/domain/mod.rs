pub mod geo;
pub mod models;
pub mod placement;
pub mod radar;
pub mod registry;
pub mod settings;
pub mod signal;

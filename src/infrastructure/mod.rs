pub mod discovery;
pub mod logging;

pub mod clock;
pub mod config;
pub mod paths;
pub mod state;

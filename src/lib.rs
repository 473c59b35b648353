pub mod compat;
pub mod config;
pub mod frames;
pub mod key;
pub mod library;
pub mod mixpoints;
pub mod selector;
pub mod session;
pub mod track;
pub mod transition;

/// Application name for XDG paths
pub const APP_NAME: &str = "setmix";

pub mod api;
pub mod app;
pub mod audio;
pub mod capture;
pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod global;
pub mod host;
pub mod media;
pub mod recorder;
pub mod save;

pub mod billing;
pub mod cli;
pub mod config;
pub mod detect;
pub mod engine;
pub mod params;
pub mod pipeline;
pub mod report;
pub mod util;

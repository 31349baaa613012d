pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod ml;
pub mod predictions;
pub mod public;
pub mod state;
pub mod telemetry;
pub mod training;
pub mod web;

// src/lib.rs
// Main library module declarations

pub mod analysis;
pub mod config;
pub mod domain;
pub mod market_data;
pub mod playback;
pub mod render;
pub mod simulation;

//! Procedural spherical world simulator
//!
//! Re-exports the pipeline stages: grid -> terrain -> planet -> rivers ->
//! climate, plus the biome classifier and export adapter built on top.

pub mod biomes;
pub mod climate;
pub mod errors;
pub mod export;
pub mod grid;
pub mod planet;
pub mod rivers;
pub mod terrain;

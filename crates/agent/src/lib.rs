//! Sentinel agent: configuration and ops HTTP surface for the detector

pub mod api;
pub mod config;

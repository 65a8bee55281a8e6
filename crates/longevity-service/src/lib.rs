//! Longevity service: HTTP surface and configuration around the
//! prediction pipeline

pub mod api;
pub mod config;

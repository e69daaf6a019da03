// Bossbar cache library
// Pluggable cache adapters, a Redis backend and a panic-tolerant facade

pub mod bootstrap;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod constants;
pub mod logging;

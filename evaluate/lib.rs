#![deny(dead_code)]
#![deny(unused_imports)]

pub mod bootstrap;
pub mod classifier;
pub mod config;
pub mod curves;
pub mod data;
pub mod metrics;
pub mod model;
pub mod nri;
pub mod opr;
pub mod report;
pub mod sequential;

#[cfg(test)]
mod test_fixtures;

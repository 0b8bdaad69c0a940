pub mod config;
pub mod rand_provider;

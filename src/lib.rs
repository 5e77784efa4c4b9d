pub mod analytics;
pub mod cache;
pub mod client;
pub mod config;
pub mod filter;
pub mod humanize;
pub mod mutation;
pub mod observability;
pub mod pagination;
pub mod session;
pub mod state;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;

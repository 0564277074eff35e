pub mod account_client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod mapserver_runtime;
pub mod models;
pub mod registry;
pub mod registry_client;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod takeover;
pub mod token;
pub mod world_client;

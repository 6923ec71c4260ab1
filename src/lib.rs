pub mod config;
pub mod judge;
pub mod routes;
pub mod web_server;

pub mod audit;
pub mod auth;
pub mod logging;
pub mod routes;
pub mod security;
pub mod state;
pub mod watchdog;

pub extern crate actix_web;

mod arbiter;
mod broadcaster;
pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
mod presence;
pub mod registry;
pub mod session;

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod common;
pub mod driver;
pub mod passenger;
pub mod realtime;
pub mod rental;

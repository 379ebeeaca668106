pub mod accounts;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod orders;
pub mod repos;
pub mod session;

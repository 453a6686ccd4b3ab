pub mod context;
pub mod controller;
pub mod error;
pub mod ports;

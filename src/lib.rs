pub mod configuration;
pub mod connection;
pub mod controller;
pub mod error_handling;
pub mod history;
pub mod mobile;
pub mod service_management;
pub mod storage;
pub mod web_interface;

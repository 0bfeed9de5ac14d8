pub mod controller;
pub mod middleware;
pub mod models;
pub mod router;
pub mod service;

pub mod handler;
pub mod responses;
pub mod schema;
pub mod service;
pub mod tools;

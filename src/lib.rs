pub mod csv;
pub mod db;
pub mod entity;
pub mod logging;
pub mod repo;
pub mod schema;
pub mod server;

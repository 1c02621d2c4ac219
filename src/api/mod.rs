pub mod admin;
pub mod handler;
pub mod ingest;
pub mod middleware;
pub mod server;

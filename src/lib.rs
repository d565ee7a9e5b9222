mod image_codec;
mod page;
mod presenter;
mod routes;
mod telemetry;
mod variant;

pub mod app;
pub mod config;
pub mod prediction;
pub mod server;

pub use app::start_app;

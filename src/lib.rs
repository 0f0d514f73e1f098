pub mod browser;
pub mod config;
pub mod credentials;
pub mod download;
pub mod duration;
pub mod error;
pub mod login;
pub mod models;
pub mod navigation;
pub mod normalize;
pub mod orchestrator;
pub mod session;
pub mod summary;

pub use error::ScrapeError;

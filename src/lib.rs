pub mod config;
pub mod dashboard;
pub mod fetch;
pub mod loader;
pub mod metrics;
pub mod output;
pub mod parser;
pub mod trip;
pub mod view;

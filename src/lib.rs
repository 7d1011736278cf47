// Library exports for the CLI, the seed tool and tests
pub mod backend;
pub mod config;
pub mod context;
pub mod demo;
pub mod error;
pub mod models;
pub mod services;
pub mod views;

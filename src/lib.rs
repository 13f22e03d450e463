pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod detector;
pub mod error;
pub mod gallery;
pub mod geometry;
pub mod models;
pub mod registry;
pub mod service;

pub use error::{GalleryError, Result};

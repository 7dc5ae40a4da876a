pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod fs_util;
pub mod normalize;
pub mod output;
pub mod retry;
pub mod store;
pub mod sync;
pub mod upload;

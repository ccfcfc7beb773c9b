//! shelfrate: a small REST backend for browsing, bookmarking and rating books.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

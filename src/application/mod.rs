//! Application services over the repository traits.

pub mod catalog;
pub mod engagement;
pub mod error;
pub mod identity;
pub mod repos;
pub mod seed;

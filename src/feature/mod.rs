//! The features of the service, one directory per resource.

pub mod hello;
pub mod info;
pub mod item;
pub mod me;
pub mod user;

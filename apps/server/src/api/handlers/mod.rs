//! Request handlers

pub mod requests;
pub mod search;

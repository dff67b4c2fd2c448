//! Request processing middleware.

pub mod trigger_limit;

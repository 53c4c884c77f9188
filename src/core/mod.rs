//! Core engine — field model, kinds, validation, resolution, keys.

pub mod connector;
pub mod errors;
pub mod expression;
pub mod field;
pub mod key;
pub mod outcome;
pub mod parser;
pub mod pdc;
pub mod registry;
pub mod resolver;
pub mod spec;
pub mod types;
pub mod validator;

//! Wire model: command batches, typed commands and property values.

pub mod batch;
pub(crate) mod command;
pub(crate) mod property;
pub(crate) mod values;

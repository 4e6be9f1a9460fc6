//! Bitmap contexts and the CPU rendering stack behind them.

pub(crate) mod bitmap;
pub(crate) mod blur;
pub(crate) mod codec;
pub(crate) mod composite;
pub(crate) mod draw;
pub(crate) mod path;
pub(crate) mod render;

mod quantity;

pub mod helpers;
pub mod op;

pub use quantity::{Quantity, QuantityConversionError};

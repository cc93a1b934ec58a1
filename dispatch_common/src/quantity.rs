use std::{
    fmt::Display,
    iter::Sum,
    ops::Add,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------      Quantity       ---------------------------------------------------------
/// A count of stock units. Line items must carry a strictly positive quantity; inventory records may hold zero.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Quantity(i64);

op!(binary Quantity, Add, add);

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a quantity: {0}")]
pub struct QuantityConversionError(String);

impl From<i64> for Quantity {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Quantity {
    type Error = QuantityConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| QuantityConversionError(format!("{value} is too large to store as a quantity")))
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            1 => write!(f, "1 unit"),
            n => write!(f, "{n} units"),
        }
    }
}

impl Quantity {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

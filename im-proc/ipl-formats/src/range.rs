use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Valid values of a configuration parameter.
///
/// `inc` is the step between valid values, starting at `min`. An `inc` of
/// zero means the parameter is continuous. Setting a value that is not
/// contained fails with [Error::InvalidArgument].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range<T> {
    pub min: T,
    pub max: T,
    pub inc: T,
}

impl Range<u32> {
    pub fn contains(&self, value: u32) -> bool {
        value >= self.min
            && value <= self.max
            && (self.inc == 0 || (value - self.min) % self.inc == 0)
    }

    pub fn check(&self, name: &str, value: u32) -> Result<()> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(Error::InvalidArgument(format!(
                "{name} {value} outside [{}, {}] with increment {}",
                self.min, self.max, self.inc
            )))
        }
    }
}

impl Range<f64> {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn check(&self, name: &str, value: f64) -> Result<()> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(Error::InvalidArgument(format!(
                "{name} {value} outside [{}, {}]",
                self.min, self.max
            )))
        }
    }
}

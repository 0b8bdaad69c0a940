use std::error::Error;
use std::fmt::{Display, Formatter};

/// A list of errors collected by a pass that keeps going after the first failure
#[derive(Debug, Clone, PartialEq)]
pub struct MultiError<T>(pub Vec<T>);

impl<T> MultiError<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, e: T) {
        self.0.push(e);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    /// Ok when nothing was collected
    pub fn into_result(self) -> Result<(), Self> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl<T> Default for MultiError<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for MultiError<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: Display> Display for MultiError<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for e in &self.0 {
            writeln!(f, "{}", e)?;
        }
        Ok(())
    }
}

impl<T: Error> Error for MultiError<T> {}

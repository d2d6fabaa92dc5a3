//-
// Copyright (c) 2017 Jason Lingle
//
// Permission to  use, copy,  modify, and/or distribute  this software  for any
// purpose  with or  without fee  is hereby  granted, provided  that the  above
// copyright notice and this permission notice appear in all copies.
//
// THE SOFTWARE  IS PROVIDED "AS  IS" AND  THE AUTHOR DISCLAIMS  ALL WARRANTIES
// WITH  REGARD   TO  THIS  SOFTWARE   INCLUDING  ALL  IMPLIED   WARRANTIES  OF
// MERCHANTABILITY AND FITNESS. IN NO EVENT  SHALL THE AUTHOR BE LIABLE FOR ANY
// SPECIAL,  DIRECT,   INDIRECT,  OR  CONSEQUENTIAL  DAMAGES   OR  ANY  DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN ACTION
// OF  CONTRACT, NEGLIGENCE  OR OTHER  TORTIOUS ACTION,  ARISING OUT  OF OR  IN
// CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.

use std::error;
use std::fmt;

use locality::LocalityId;

/// Failures raised by hierarchy and orbit operations.
///
/// None of these are transient. A caller which receives one should abandon
/// whatever it was doing with the localities involved.
#[derive(Clone, Debug, PartialEq)]
pub enum HierarchyError {
    /// The locality has been deleted and may no longer be used.
    ObsoleteAccess(LocalityId),
    /// The tree is not shaped the way the operation needs: no common
    /// ancestor, a cycle, an unknown handle, or a reparenting the variant
    /// forbids.
    InvalidHierarchy(String),
    /// A transform or physical quantity is non-finite or degenerate.
    NumericalInvalidity(String),
    /// The variant does not implement the operation.
    NotSupported(String),
}

pub type Result<T> = ::std::result::Result<T, HierarchyError>;

impl HierarchyError {
    pub fn invalid<S: Into<String>>(what: S) -> Self {
        HierarchyError::InvalidHierarchy(what.into())
    }

    pub fn numerical<S: Into<String>>(what: S) -> Self {
        HierarchyError::NumericalInvalidity(what.into())
    }

    pub fn unsupported<S: Into<String>>(what: S) -> Self {
        HierarchyError::NotSupported(what.into())
    }
}

impl fmt::Display for HierarchyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            HierarchyError::ObsoleteAccess(id) =>
                write!(f, "{} is obsolete", id),
            HierarchyError::InvalidHierarchy(ref what) =>
                write!(f, "invalid hierarchy: {}", what),
            HierarchyError::NumericalInvalidity(ref what) =>
                write!(f, "numerically invalid: {}", what),
            HierarchyError::NotSupported(ref what) =>
                write!(f, "not supported: {}", what),
        }
    }
}

impl error::Error for HierarchyError { }

/// Fails with `NumericalInvalidity` unless `value` is finite.
pub fn ensure_finite(what: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(HierarchyError::numerical(format!("{} is {}", what, value)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_names_the_failure() {
        assert_eq!("locality#7 is obsolete",
                   HierarchyError::ObsoleteAccess(LocalityId::from_index(7))
                   .to_string());
        assert_eq!("not supported: translate",
                   HierarchyError::unsupported("translate").to_string());
    }

    #[test]
    fn ensure_finite_rejects_nan_and_infinity() {
        assert_eq!(Ok(1.5), ensure_finite("x", 1.5));
        assert!(ensure_finite("x", ::std::f64::NAN).is_err());
        match ensure_finite("mu", ::std::f64::INFINITY) {
            Err(HierarchyError::NumericalInvalidity(what)) =>
                assert_eq!("mu is inf", what),
            other => panic!("Unexpected {:?}", other),
        }
    }
}

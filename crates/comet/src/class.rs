//! Class identifiers.

use std::fmt;

/// Identifies which concrete component a [`Factory`](crate::Factory) should
/// instantiate.
///
/// Class ids are usually declared as constants next to the component:
///
/// ```
/// use comet::ClassId;
///
/// pub const CLSID_GREETER: ClassId = ClassId::new("4c7e0a4e-greeter");
/// assert!(CLSID_GREETER.is_valid());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(&'static str);

impl ClassId {
    /// The empty id. Never resolves to a class.
    pub const NONE: ClassId = ClassId("");

    pub const fn new(id: &'static str) -> Self {
        ClassId(id)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    /// Whether this id can name a class at all.
    pub const fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }
}

impl Default for ClassId {
    fn default() -> Self {
        ClassId::NONE
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({:?})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_invalid() {
        assert!(!ClassId::NONE.is_valid());
        assert!(!ClassId::default().is_valid());
        assert!(ClassId::new("x").is_valid());
    }

    #[test]
    fn test_ordering_and_display() {
        let a = ClassId::new("a");
        let b = ClassId::new("b");
        assert!(a < b);
        assert_eq!(a.to_string(), "a");
        assert_eq!(format!("{b:?}"), "ClassId(\"b\")");
    }
}

use std::ops::{BitOr, BitOrAssign};

/// Fetch flags, combinable with `|`.
///
/// ```rust
/// use oci_middleware::prelude::*;
///
/// let flags = FetchFlags::ASSOC | FetchFlags::NUM;
/// assert!(flags.contains(FetchFlags::NUM));
/// assert!(flags.returns_lobs());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchFlags(u8);

impl FetchFlags {
    /// Key rows by lowercased column name.
    pub const ASSOC: Self = Self(1);
    /// Key rows by zero-based column ordinal.
    pub const NUM: Self = Self(1 << 1);
    /// Leave LOB columns as locators instead of reading their content.
    pub const LOB_LOCATOR: Self = Self(1 << 2);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Rows carry name keys. With neither key flag set both styles are produced.
    #[must_use]
    pub const fn keys_by_name(self) -> bool {
        self.contains(Self::ASSOC) || !self.contains(Self::NUM)
    }

    #[must_use]
    pub const fn keys_by_index(self) -> bool {
        self.contains(Self::NUM) || !self.contains(Self::ASSOC)
    }

    /// LOB content is read unless [`FetchFlags::LOB_LOCATOR`] is set.
    #[must_use]
    pub const fn returns_lobs(self) -> bool {
        !self.contains(Self::LOB_LOCATOR)
    }
}

impl Default for FetchFlags {
    fn default() -> Self {
        Self::ASSOC
    }
}

impl BitOr for FetchFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FetchFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

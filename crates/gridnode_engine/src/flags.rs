//! Access policy flags.
//!
//! Two unrelated notions of "exclusive" live here and must not be confused:
//!
//! - [`ActionFlags::EXCLUSIVE`] is about object locking. An exclusive action
//!   holds the writer side of the object's guard for the whole call.
//! - [`ResourceFlags::EXCLUSIVE`] is about dependency sharing. An exclusive
//!   resource (a disk) may be depended upon by at most one other object, a
//!   shareable one (a network) by any number.

use core::ops::{BitOr, BitOrAssign};

/// Access policy of a single action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ActionFlags(u8);

impl ActionFlags {
    /// The action needs exclusive access to the object.
    pub const EXCLUSIVE: Self = Self(1 << 0);

    /// The action is only legal while the object does not exist yet.
    ///
    /// Without this flag an action requires the object to exist.
    pub const OBJECT_MUST_NOT_EXIST: Self = Self(1 << 1);

    /// Policy for create actions: full exclusivity, object must be new.
    pub const CREATE: Self = Self(Self::EXCLUSIVE.0 | Self::OBJECT_MUST_NOT_EXIST.0);

    /// No flags: shared access to an existing object.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `true` if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if dispatch must take the writer lock.
    ///
    /// Must-not-exist actions are always locked exclusively, otherwise two
    /// concurrent creates could both observe a missing object.
    #[must_use]
    pub const fn requires_write(self) -> bool {
        self.0 & (Self::EXCLUSIVE.0 | Self::OBJECT_MUST_NOT_EXIST.0) != 0
    }

    /// Returns `true` if the object must not exist before the call.
    #[must_use]
    pub const fn must_not_exist(self) -> bool {
        self.contains(Self::OBJECT_MUST_NOT_EXIST)
    }

    /// Raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for ActionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ActionFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Dependency-sharing policy of a workload type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ResourceFlags(u8);

impl ResourceFlags {
    /// Objects of this type can serve as a dependency of at most one object.
    pub const EXCLUSIVE: Self = Self(1 << 0);

    /// Objects of this type can be shared by any number of dependents.
    #[must_use]
    pub const fn shareable() -> Self {
        Self(0)
    }

    /// Returns `true` if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` for [`ResourceFlags::EXCLUSIVE`] resources.
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        self.contains(Self::EXCLUSIVE)
    }
}

impl BitOr for ResourceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

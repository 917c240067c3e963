use serde::{Deserialize, Serialize};

/// Privilege ordinal carried in the `level` claim.
///
/// Lower values are *more* privileged: `0` is the top administrative level.
/// Always compare through [`RoleLevel::satisfies`] instead of raw integers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleLevel(u32);

impl RoleLevel {
    pub const SUPER_ADMIN: RoleLevel = RoleLevel(0);
    pub const ADMIN: RoleLevel = RoleLevel(1);
    pub const USER: RoleLevel = RoleLevel(2);

    pub const fn new(level: u32) -> Self {
        Self(level)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Display label for the known levels.
    pub fn label(self) -> &'static str {
        match self.0 {
            0 => "Super Admin",
            1 => "Admin",
            2 => "User",
            _ => "Unknown",
        }
    }

    /// Whether a holder of `self` meets a `required` minimum level.
    pub fn satisfies(self, required: RoleLevel) -> bool {
        self.0 <= required.0
    }
}

impl From<u32> for RoleLevel {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl core::fmt::Display for RoleLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

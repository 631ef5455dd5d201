//! Access-rights vocabularies.

use std::collections::BTreeMap;

/// Permission name to granted flag.
pub type PermissionMap = BTreeMap<String, bool>;

/// An immutable, ordered mapping from permission name to access-mask bits.
///
/// Entries may overlap: composite rights such as `KeyAllAccess` cover the bits
/// of several individual rights.
#[derive(Debug, Clone, Copy)]
pub struct AccessRightsCatalog {
    rights: &'static [(&'static str, u64)],
}

impl AccessRightsCatalog {
    pub const fn new(rights: &'static [(&'static str, u64)]) -> Self {
        Self { rights }
    }

    pub fn bits(&self, name: &str) -> Option<u64> {
        self.rights
            .iter()
            .find(|(right, _)| *right == name)
            .map(|(_, bits)| *bits)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rights.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.rights.iter().copied()
    }

    /// A right counts as granted when any of its bits is present in `mask`.
    pub fn is_granted(mask: u64, bits: u64) -> bool {
        mask & bits != 0
    }

    /// Evaluate every right in the catalog against `mask`.
    pub fn evaluate(&self, mask: u64) -> PermissionMap {
        self.rights
            .iter()
            .map(|(name, bits)| (name.to_string(), Self::is_granted(mask, *bits)))
            .collect()
    }
}

/// Registry key rights as reported in a DACL access mask.
pub const REGISTRY_RIGHTS: AccessRightsCatalog = AccessRightsCatalog::new(&[
    ("Delete", 0b1_0000_0000_0000_0000),
    ("ReadControl", 0b10_0000_0000_0000_0000),
    ("WriteDac", 0b100_0000_0000_0000_0000),
    ("WriteOwner", 0b1000_0000_0000_0000_0000),
    ("AccessSystemSecurity", 0b1_0000_0000_0000_0000_0000_0000),
    ("Synchronize", 0b1_0000_0000_0000_0000_0000),
    ("KeyAllAccess", 0b1111_0000_0000_0011_1111),
    ("KeyCreateLink", 0b10_0000),
    ("KeyCreateSubKey", 0b100),
    ("KeyEnumerateSubKeys", 0b1000),
    ("KeyExecute", 0b10_0000_0000_0001_1001),
    ("KeyNotify", 0b1_0000),
    ("KeyQueryValue", 0b1),
    ("KeyRead", 0b10_0000_0000_0001_1001),
    ("KeySetValue", 0b10),
    ("KeyWow6432Key", 0b10_0000_0000),
    ("KeyWow6464Key", 0b1_0000_0000),
    ("KeyWow64Res", 0b11_0000_0000),
    ("KeyWrite", 0b110),
]);

/// Aggregated permission sets `Get-Acl` reports in `FileSystemRights`.
///
/// The filesystem vocabulary is open-ended: any other name the tool emits is
/// accepted as a permission set of its own.
pub const FILESYSTEM_PERMISSION_SETS: &[&str] = &[
    "Read",
    "ReadAndExecute",
    "Write",
    "Modify",
    "Synchronize",
    "FullControl",
];

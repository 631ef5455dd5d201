use crate::catalog::PermissionMap;
use crate::error::Result;
use crate::table::PermissionReport;

/// Questions answered against an object's access control table.
///
/// Every method hydrates the table on first use, which is why they return
/// `Result`. Unknown trustees and unknown permission names are answered with
/// empty or all-false results, never with an error.
pub trait PermissionQuery {
    /// Permission map for every trustee in the table.
    fn permissions(&self) -> Result<PermissionReport>;

    /// Permission map for one trustee; all false when the trustee is absent.
    fn permissions_for_trustee(&self, trustee: &str) -> Result<PermissionMap>;

    /// Every trustee present in the table, whether or not any right is granted.
    fn trustees_with_any_permission(&self) -> Result<Vec<String>>;

    /// Trustees holding the named permission.
    fn trustees_with_permission(&self, permission: &str) -> Result<Vec<String>>;
}

//! Queryable models of Windows security descriptors and macOS property lists.
//!
//! Every descriptor is built from a [`Host`] and a path. Nothing runs on the
//! host until the first query; the fetched text is then parsed once and kept
//! for the lifetime of the descriptor. Descriptors use single-threaded
//! interior caching and are therefore not `Sync`.
//!
//! ```no_run
//! use descriptor::{registry_security_descriptor, Host, PermissionQuery};
//!
//! let key = registry_security_descriptor(Host::default(), r"HKLM:\SOFTWARE\Policies");
//! for trustee in key.trustees_with_permission("KeyRead")? {
//!     println!("{}", trustee);
//! }
//! # Ok::<(), descriptor::DescriptorError>(())
//! ```

pub mod catalog;
pub mod error;
pub mod filesystem;
pub mod host;
pub mod plist;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod table;
#[doc(hidden)]
pub mod testing;
pub mod xpath;

pub use catalog::{AccessRightsCatalog, PermissionMap};
pub use error::{DescriptorError, Result};
pub use filesystem::SecurityDescriptor;
pub use host::{CommandOutput, CommandRunner, CommandSettings, EnvExpander, FileProbe, Host};
pub use plist::{MatchedNode, PathValue, Plist, PlistOptions};
pub use query::PermissionQuery;
pub use registry::RegistrySecurityDescriptor;
pub use resolver::{SecurityIdentifier, SidQuery, TrusteeKind, TrusteeResolver};
pub use table::{AccessControlTable, PermissionReport};

pub fn plist(host: Host, path: impl Into<String>, options: PlistOptions) -> Result<Plist> {
    Plist::new(host, path, options)
}

pub fn registry_security_descriptor(host: Host, path: impl Into<String>) -> RegistrySecurityDescriptor {
    RegistrySecurityDescriptor::new(host, path)
}

pub fn security_descriptor(host: Host, path: impl Into<String>) -> SecurityDescriptor {
    SecurityDescriptor::new(host, path)
}

/// Fails with [`DescriptorError::Configuration`] unless exactly one of the
/// user, group or unspecified names is given.
pub fn security_identifier(host: Host, query: SidQuery) -> Result<SecurityIdentifier> {
    SecurityIdentifier::new(host, query)
}

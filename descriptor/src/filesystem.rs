//! Security descriptors of files, as reported by `Get-Acl`.

use std::fmt;

use once_cell::unsync::OnceCell;

use crate::catalog::{PermissionMap, FILESYSTEM_PERMISSION_SETS};
use crate::error::{DescriptorError, Result};
use crate::host::{ps_quote, Host};
use crate::query::PermissionQuery;
use crate::resolver::{TrusteeKind, TrusteeResolver};
use crate::table::{short_name, AccessControlEntry, AccessControlTable, PermissionReport};

const IDENTITY_REFERENCE: &str = "IdentityReference";
const FILE_SYSTEM_RIGHTS: &str = "FileSystemRights";

/// One access rule from `Get-Acl <path> | Select-Object -ExpandProperty Access`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclBlock {
    /// Identity with spaces removed, e.g. `NTAUTHORITY\SYSTEM`.
    pub identity: String,
    pub rights: Vec<String>,
}

/// Split `Get-Acl` list output into access rules.
///
/// Rules are separated by blank lines. Within a rule every line is
/// `Key : Value`; an indented line continues the previous value. Keys other
/// than `IdentityReference` and `FileSystemRights` are ignored, but a rule
/// missing either of those is an error.
pub fn parse_filesystem_acl(text: &str) -> Result<Vec<AclBlock>> {
    let mut blocks = Vec::new();
    let mut current: Vec<(String, String)> = Vec::new();

    for line in text.lines().map(|l| l.trim_end_matches('\r')) {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(to_block(std::mem::take(&mut current))?);
            }
            continue;
        }

        if line.starts_with(char::is_whitespace) {
            match current.last_mut() {
                Some((_, value)) => value.push_str(line.trim()),
                None => return Err(DescriptorError::MalformedEntry(line.to_string())),
            }
            continue;
        }

        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| DescriptorError::MalformedEntry(line.to_string()))?;
        current.push((key.trim().to_string(), value.trim().to_string()));
    }
    if !current.is_empty() {
        blocks.push(to_block(current)?);
    }

    Ok(blocks)
}

fn to_block(fields: Vec<(String, String)>) -> Result<AclBlock> {
    let field = |name: &str| {
        fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.replace(' ', ""))
    };

    match (field(IDENTITY_REFERENCE), field(FILE_SYSTEM_RIGHTS)) {
        (Some(identity), Some(rights)) if !identity.is_empty() => Ok(AclBlock {
            identity,
            rights: rights
                .split(',')
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect(),
        }),
        _ => {
            let text: Vec<String> = fields.iter().map(|(k, v)| format!("{} : {}", k, v)).collect();
            Err(DescriptorError::MalformedEntry(text.join("; ")))
        }
    }
}

/// The access rules of one file, fetched on first query and cached.
///
/// Identities are keyed by SID where the identity store can resolve their
/// short name, and by the identity as reported otherwise.
pub struct SecurityDescriptor {
    host: Host,
    path: String,
    resolver: TrusteeResolver,
    table: OnceCell<AccessControlTable<Vec<String>>>,
}

impl SecurityDescriptor {
    pub fn new(host: Host, path: impl Into<String>) -> Self {
        Self {
            resolver: TrusteeResolver::new(host.clone()),
            host,
            path: path.into(),
            table: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn table(&self) -> Result<&AccessControlTable<Vec<String>>> {
        self.table.get_or_try_init(|| self.fetch())
    }

    /// Permission sets granted to an entity, matched by SID or by name
    /// without its domain. An unknown entity has none.
    pub fn rights_for_trustee(&self, trustee: &str) -> Result<Vec<String>> {
        Ok(self
            .find(trustee)?
            .map(|e| e.rights.clone())
            .unwrap_or_default())
    }

    /// Known permission sets followed by any other set the table mentions.
    pub fn permission_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = FILESYSTEM_PERMISSION_SETS
            .iter()
            .map(|s| s.to_string())
            .collect();
        for entry in self.table()?.iter() {
            for right in &entry.rights {
                if !names.contains(right) {
                    names.push(right.clone());
                }
            }
        }
        Ok(names)
    }

    fn find(&self, trustee: &str) -> Result<Option<&AccessControlEntry<Vec<String>>>> {
        let table = self.table()?;
        Ok(table
            .iter()
            .find(|e| e.trustee == trustee)
            .or_else(|| table.iter().find(|e| short_name(&e.trustee) == trustee)))
    }

    fn evaluate(names: &[String], rights: &[String]) -> PermissionMap {
        names
            .iter()
            .map(|name| (name.clone(), rights.contains(name)))
            .collect()
    }

    fn fetch(&self) -> Result<AccessControlTable<Vec<String>>> {
        log::debug!("Fetching access rules for {}", self.path);
        let output = self.host.runner().powershell(&format!(
            "Get-Acl {} | Select-Object -ExpandProperty Access",
            ps_quote(&self.path)
        ))?;

        let stdout = output.into_stdout(&self.path)?;
        if stdout.trim().is_empty() {
            return Err(DescriptorError::MissingDescriptor {
                path: self.path.clone(),
            });
        }

        let mut table = AccessControlTable::new();
        for block in parse_filesystem_acl(&stdout)? {
            // Get-Acl 给出的是账户名而不是 SID，能解析就换成 SID；解析失败时保留原名
            let sid = match self
                .resolver
                .lookup(short_name(&block.identity), TrusteeKind::Unspecified)
            {
                Ok(sid) => sid,
                Err(e) => {
                    log::warn!("Keeping '{}' unresolved: {}", block.identity, e);
                    None
                }
            };
            let trustee = sid.unwrap_or(block.identity);

            table.merge_with(&trustee, block.rights, |existing, rights| {
                for right in rights {
                    if !existing.contains(&right) {
                        existing.push(right);
                    }
                }
                Ok(())
            })?;
        }
        log::debug!("{} has access rules for {} trustees", self.path, table.len());

        Ok(table)
    }
}

impl PermissionQuery for SecurityDescriptor {
    fn permissions(&self) -> Result<PermissionReport> {
        let names = self.permission_names()?;
        let mut report = PermissionReport::default();
        for entry in self.table()?.iter() {
            report.push(entry.trustee.clone(), Self::evaluate(&names, &entry.rights));
        }
        Ok(report)
    }

    fn permissions_for_trustee(&self, trustee: &str) -> Result<PermissionMap> {
        let names = self.permission_names()?;
        let rights = self.rights_for_trustee(trustee)?;
        Ok(Self::evaluate(&names, &rights))
    }

    fn trustees_with_any_permission(&self) -> Result<Vec<String>> {
        Ok(self.table()?.trustees())
    }

    /// Short names of trustees whose permission sets include `permission`.
    fn trustees_with_permission(&self, permission: &str) -> Result<Vec<String>> {
        Ok(self
            .table()?
            .iter()
            .filter(|e| e.rights.iter().any(|r| r == permission))
            .map(|e| short_name(&e.trustee).to_string())
            .collect())
    }
}

impl fmt::Display for SecurityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Security Descriptor for {}", self.path)
    }
}

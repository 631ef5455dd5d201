//! Security descriptors of Windows registry keys.

use std::fmt;

use once_cell::unsync::OnceCell;

use crate::catalog::{AccessRightsCatalog, PermissionMap, REGISTRY_RIGHTS};
use crate::error::{DescriptorError, Result};
use crate::host::{ps_quote, Host};
use crate::query::PermissionQuery;
use crate::table::{AccessControlTable, PermissionReport};

/// Parse the `SID`/`AccessMask` table produced by converting an SDDL string
/// into a Win32 security descriptor.
///
/// Blank lines, the column header and the dashed separator are skipped. Every
/// other line must hold a trustee SID and an unsigned access mask.
///
/// A trustee listed more than once has its masks added together rather than
/// OR-ed, so two entries of mask 1 give 2. Existing compliance content relies
/// on those numbers and the rule is kept as is.
pub fn parse_registry_dacl(text: &str) -> Result<AccessControlTable<u64>> {
    let mut table = AccessControlTable::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || is_header(line) || is_separator(line) {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let (trustee, mask) = match fields.as_slice() {
            [trustee, mask] => (*trustee, *mask),
            _ => return Err(DescriptorError::MalformedEntry(line.to_string())),
        };
        let mask: u64 = mask.parse().map_err(|_| {
            DescriptorError::MalformedEntry(format!("invalid access mask in '{}'", line))
        })?;

        table.merge_with(trustee, mask, |existing, mask| {
            *existing = existing.checked_add(mask).ok_or_else(|| {
                DescriptorError::MalformedEntry(format!("access mask overflow for '{}'", trustee))
            })?;
            Ok(())
        })?;
    }

    Ok(table)
}

fn is_header(line: &str) -> bool {
    let mut fields = line.split_whitespace();
    matches!(
        (fields.next(), fields.next(), fields.next()),
        (Some(sid), Some(mask), None)
            if sid.eq_ignore_ascii_case("SID") && mask.eq_ignore_ascii_case("AccessMask")
    )
}

fn is_separator(line: &str) -> bool {
    line.chars().all(|c| c == '-' || c.is_whitespace())
}

#[derive(Debug)]
struct Hydrated {
    sddl: String,
    table: AccessControlTable<u64>,
}

/// The DACL of one registry key, fetched on first query and cached.
pub struct RegistrySecurityDescriptor {
    host: Host,
    path: String,
    state: OnceCell<Hydrated>,
}

impl RegistrySecurityDescriptor {
    pub fn new(host: Host, path: impl Into<String>) -> Self {
        Self {
            host,
            path: path.into(),
            state: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The key's SDDL string.
    pub fn sddl(&self) -> Result<&str> {
        Ok(self.hydrate()?.sddl.as_str())
    }

    pub fn table(&self) -> Result<&AccessControlTable<u64>> {
        Ok(&self.hydrate()?.table)
    }

    /// Summed access mask of `trustee`; zero when absent.
    pub fn access_mask(&self, trustee: &str) -> Result<u64> {
        Ok(self.table()?.get(trustee).copied().unwrap_or(0))
    }

    fn hydrate(&self) -> Result<&Hydrated> {
        self.state.get_or_try_init(|| {
            log::debug!("Fetching security descriptor for registry key {}", self.path);
            let runner = self.host.runner();

            let stdout = runner
                .powershell(&format!("(Get-Acl {}).SDDL", ps_quote(&self.path)))?
                .into_stdout(&self.path)?;
            let sddl: String = stdout
                .trim()
                .chars()
                .filter(|c| *c != '\r' && *c != '\n')
                .collect();
            if sddl.is_empty() {
                return Err(DescriptorError::MissingDescriptor {
                    path: self.path.clone(),
                });
            }

            let output = runner.powershell(&format!(
                "(Invoke-CimMethod Win32_SecurityDescriptorHelper -MethodName SDDLToWin32SD \
                 -Arguments @{{ SDDL = {} }}).Descriptor.DACL | \
                 Select @{{Name=\"SID\";Expression={{$_.Trustee.SIDString}}}},AccessMask",
                ps_quote(&sddl)
            ))?;
            // 转换失败不能当成空表，否则会被误读为“没有任何授权”
            let table = parse_registry_dacl(&output.into_stdout(&self.path)?)?;
            log::debug!("Registry key {} has {} trustees", self.path, table.len());

            Ok(Hydrated { sddl, table })
        })
    }
}

impl PermissionQuery for RegistrySecurityDescriptor {
    fn permissions(&self) -> Result<PermissionReport> {
        let mut report = PermissionReport::default();
        for entry in self.table()?.iter() {
            report.push(entry.trustee.clone(), REGISTRY_RIGHTS.evaluate(entry.rights));
        }
        Ok(report)
    }

    fn permissions_for_trustee(&self, trustee: &str) -> Result<PermissionMap> {
        Ok(REGISTRY_RIGHTS.evaluate(self.access_mask(trustee)?))
    }

    fn trustees_with_any_permission(&self) -> Result<Vec<String>> {
        Ok(self.table()?.trustees())
    }

    fn trustees_with_permission(&self, permission: &str) -> Result<Vec<String>> {
        let table = self.table()?;
        let Some(bits) = REGISTRY_RIGHTS.bits(permission) else {
            log::debug!("Unknown registry right '{}'", permission);
            return Ok(Vec::new());
        };

        Ok(table
            .iter()
            .filter(|e| AccessRightsCatalog::is_granted(e.rights, bits))
            .map(|e| e.trustee.clone())
            .collect())
    }
}

impl fmt::Display for RegistrySecurityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registry Security Descriptor for {}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    const DACL: &str = "\r\nSID          AccessMask\r\n---          ----------\r\n\
                        S-1-5-32-545     131097\r\nS-1-5-32-544  268435456\r\n\
                        S-1-5-32-544     983103\r\nS-1-5-18         983103\r\n";

    #[test]
    fn test_parse_skips_header_and_separator() {
        let table = parse_registry_dacl(DACL).unwrap();
        assert_eq!(
            table.trustees(),
            vec!["S-1-5-32-545", "S-1-5-32-544", "S-1-5-18"]
        );
        assert_eq!(table.get("S-1-5-32-545"), Some(&131097));
        assert_eq!(table.get("S-1-5-32-544"), Some(&(268435456 + 983103)));
    }

    #[test]
    fn test_repeated_trustee_masks_are_summed() {
        let table = parse_registry_dacl("S-1-5-18 1\nS-1-5-18 1\n").unwrap();
        assert_eq!(table.get("S-1-5-18"), Some(&2));
    }

    #[test]
    fn test_malformed_lines() {
        let err = parse_registry_dacl("S-1-5-18\n").unwrap_err();
        assert!(matches!(err, DescriptorError::MalformedEntry(ref e) if e == "S-1-5-18"));

        let err = parse_registry_dacl("S-1-5-18 full\n").unwrap_err();
        assert!(matches!(err, DescriptorError::MalformedEntry(_)));

        let err = parse_registry_dacl("S-1-5-18 1 extra\n").unwrap_err();
        assert!(matches!(err, DescriptorError::MalformedEntry(_)));
    }

    #[test]
    fn test_mask_overflow() {
        let text = format!("S-1-5-18 {}\nS-1-5-18 1\n", u64::MAX);
        let err = parse_registry_dacl(&text).unwrap_err();
        assert!(matches!(err, DescriptorError::MalformedEntry(_)));
    }

    #[test]
    fn test_empty_sddl_is_missing_descriptor() {
        let (runner, host) = ScriptedRunner::new().on(".SDDL", "\r\n").into_host();
        let descriptor = RegistrySecurityDescriptor::new(host, r"HKLM:\Software\Missing");

        match descriptor.permissions() {
            Err(DescriptorError::MissingDescriptor { path }) => {
                assert_eq!(path, r"HKLM:\Software\Missing")
            }
            other => panic!("Expected MissingDescriptor, got {:?}", other),
        }
        assert_eq!(runner.call_count("Invoke-CimMethod"), 0);
    }
}

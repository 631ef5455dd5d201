//! Entity name to security identifier resolution.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DescriptorError, Result};
use crate::host::Host;

/// What kind of entity a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrusteeKind {
    User,
    Group,
    /// Try groups first, then users.
    Unspecified,
}

impl fmt::Display for TrusteeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrusteeKind::User => write!(f, "user"),
            TrusteeKind::Group => write!(f, "group"),
            TrusteeKind::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Identity store an account lookup is run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdentityStore {
    Group,
    UserAccount,
}

impl IdentityStore {
    fn wmic_class(self) -> &'static str {
        match self {
            IdentityStore::Group => "group",
            IdentityStore::UserAccount => "useraccount",
        }
    }
}

/// Parse `wmic ... get Name,SID /format:csv` output into `(name, sid)` rows.
///
/// The first non-blank line is the CSV header and locates the `Name` and `SID`
/// columns; wmic also emits a `Node` column and `\r\r\n` line endings.
pub fn parse_wmic_csv(text: &str) -> Result<Vec<(String, String)>> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let column = |name: &str| columns.iter().position(|c| c.eq_ignore_ascii_case(name));
    let (name_idx, sid_idx) = match (column("Name"), column("SID")) {
        (Some(name_idx), Some(sid_idx)) => (name_idx, sid_idx),
        _ => {
            return Err(DescriptorError::MalformedEntry(format!(
                "unexpected identity lookup header '{}'",
                header
            )))
        }
    };

    lines
        .map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            match (fields.get(name_idx), fields.get(sid_idx)) {
                (Some(name), Some(sid)) => Ok((name.to_string(), sid.to_string())),
                _ => Err(DescriptorError::MalformedEntry(line.to_string())),
            }
        })
        .collect()
}

/// Resolves entity names to SIDs through the host's identity store.
///
/// Results, including misses, are cached per `(kind, name)` for the lifetime
/// of the resolver.
pub struct TrusteeResolver {
    host: Host,
    cache: RefCell<HashMap<(TrusteeKind, String), Option<String>>>,
}

impl TrusteeResolver {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// The SID for `name`, or `None` when the identity store has no match.
    pub fn lookup(&self, name: &str, kind: TrusteeKind) -> Result<Option<String>> {
        let key = (kind, name.to_string());
        if let Some(cached) = self.cache.borrow().get(&key) {
            log::debug!("Resolver cache hit for {} '{}'", kind, name);
            return Ok(cached.clone());
        }

        let sid = match kind {
            TrusteeKind::User => self.query(name, IdentityStore::UserAccount)?,
            TrusteeKind::Group => self.query(name, IdentityStore::Group)?,
            TrusteeKind::Unspecified => match self.query(name, IdentityStore::Group)? {
                Some(sid) => Some(sid),
                None => self.query(name, IdentityStore::UserAccount)?,
            },
        };

        self.cache.borrow_mut().insert(key, sid.clone());
        Ok(sid)
    }

    /// The SID for `name`, falling back to `name` itself when nothing matches.
    pub fn resolve(&self, name: &str, kind: TrusteeKind) -> Result<String> {
        Ok(self
            .lookup(name, kind)?
            .unwrap_or_else(|| name.to_string()))
    }

    fn query(&self, name: &str, store: IdentityStore) -> Result<Option<String>> {
        if name.contains('"') || name.contains('\'') {
            return Err(DescriptorError::Configuration(format!(
                "entity name '{}' must not contain quotes",
                name
            )));
        }

        let command = format!(
            "wmic {} where 'Name=\"{}\"' get Name\",\"SID /format:csv",
            store.wmic_class(),
            name
        );
        let output = self.host.runner().run(&command)?;
        let rows = parse_wmic_csv(&output.stdout)?;

        // 优先取名称完全匹配的行（Windows 账户名不区分大小写）
        let sid = rows
            .iter()
            .find(|(row_name, _)| row_name.eq_ignore_ascii_case(name))
            .or_else(|| rows.first())
            .map(|(_, sid)| sid.clone())
            .filter(|sid| !sid.is_empty());
        log::debug!("{:?} lookup for '{}' returned {:?}", store, name, sid);
        Ok(sid)
    }
}

/// Construction options for [`SecurityIdentifier`]; exactly one must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidQuery {
    pub user: Option<String>,
    pub group: Option<String>,
    pub unspecified: Option<String>,
}

impl SidQuery {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            user: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            group: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn unspecified(name: impl Into<String>) -> Self {
        Self {
            unspecified: Some(name.into()),
            ..Default::default()
        }
    }
}

/// The SID of a named user or group.
///
/// A user and a group can share a name, so the entity kind has to be stated;
/// `unspecified` is for content that names an entity without saying which.
pub struct SecurityIdentifier {
    kind: TrusteeKind,
    name: String,
    resolver: TrusteeResolver,
}

impl SecurityIdentifier {
    pub fn new(host: Host, query: SidQuery) -> Result<Self> {
        let given: Vec<(TrusteeKind, String)> = [
            (TrusteeKind::User, query.user),
            (TrusteeKind::Group, query.group),
            (TrusteeKind::Unspecified, query.unspecified),
        ]
        .into_iter()
        .filter_map(|(kind, name)| name.map(|name| (kind, name)))
        .collect();

        let (kind, name) = match given.as_slice() {
            [(kind, name)] => (*kind, name.clone()),
            [] => {
                return Err(DescriptorError::Configuration(
                    "specify one of user, group or unspecified for a security identifier"
                        .to_string(),
                ))
            }
            _ => {
                return Err(DescriptorError::Configuration(
                    "specifying more than one of user, group or unspecified is not supported"
                        .to_string(),
                ))
            }
        };
        if name.trim().is_empty() {
            return Err(DescriptorError::Configuration(format!(
                "the {} name of a security identifier must not be empty",
                kind
            )));
        }

        Ok(Self {
            kind,
            name,
            resolver: TrusteeResolver::new(host),
        })
    }

    pub fn kind(&self) -> TrusteeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved SID, or the name itself when the entity does not exist.
    pub fn sid(&self) -> Result<String> {
        self.resolver.resolve(&self.name, self.kind)
    }

    /// Whether the identity store knows the entity.
    pub fn exists(&self) -> Result<bool> {
        Ok(self.resolver.lookup(&self.name, self.kind)?.is_some())
    }
}

impl fmt::Display for SecurityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "security_identifier {} {}", self.kind, self.name)
    }
}

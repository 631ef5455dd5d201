//! Property-list documents.
//!
//! A plist is read through `plutil` twice at most: once converted to JSON for
//! key-path lookups and once converted to XML for path queries. Each
//! representation is fetched on first use and kept for the lifetime of the
//! [`Plist`].

use std::fmt;

use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sxd_document::Package;

use crate::error::{DescriptorError, Result};
use crate::host::{shell_quote, Host};
use crate::xpath::{parse_document, XPath};

pub use crate::xpath::{MatchedNode, PathValue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlistOptions {
    /// Path query evaluated by [`Plist::xpath_value`].
    #[serde(default)]
    pub xpath: Option<String>,
    /// `plutil` executable used for conversions.
    #[serde(default = "default_plutil")]
    pub plutil: String,
}

fn default_plutil() -> String {
    "plutil".to_string()
}

impl Default for PlistOptions {
    fn default() -> Self {
        Self {
            xpath: None,
            plutil: default_plutil(),
        }
    }
}

impl PlistOptions {
    pub fn with_xpath(xpath: impl Into<String>) -> Self {
        Self {
            xpath: Some(xpath.into()),
            ..Self::default()
        }
    }
}

pub struct Plist {
    host: Host,
    path: String,
    options: PlistOptions,
    xpath: Option<XPath>,
    json: OnceCell<Value>,
    xml: OnceCell<Package>,
}

impl Plist {
    /// Create a plist descriptor. A configured path query is compiled here so
    /// that a bad expression is reported before anything runs on the host.
    pub fn new(host: Host, path: impl Into<String>, options: PlistOptions) -> Result<Self> {
        let xpath = options.xpath.as_deref().map(XPath::compile).transpose()?;
        Ok(Self {
            host,
            path: path.into(),
            options,
            xpath,
            json: OnceCell::new(),
            xml: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn xpath(&self) -> Option<&XPath> {
        self.xpath.as_ref()
    }

    pub fn exists(&self) -> Result<bool> {
        let path = self.host.expander().expand(&self.path)?;
        Ok(self.host.probe().exists(&path))
    }

    /// The whole document as JSON.
    pub fn document(&self) -> Result<&Value> {
        self.json.get_or_try_init(|| {
            let text = self.convert("json")?;
            serde_json::from_str(&text)
                .map_err(|e| DescriptorError::parse_failure(&self.path, e.to_string()))
        })
    }

    /// Follow `keys` into the document. Objects are entered by key and arrays
    /// by decimal index; any miss along the way yields `None`.
    pub fn get<S: AsRef<str>>(&self, keys: &[S]) -> Result<Option<&Value>> {
        let mut current = self.document()?;
        for key in keys {
            let key = key.as_ref();
            let next = match current {
                Value::Object(map) => map.get(key),
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Evaluate the configured path query against the XML rendering.
    pub fn xpath_value(&self) -> Result<PathValue> {
        let xpath = self.xpath.as_ref().ok_or_else(|| {
            DescriptorError::Configuration(format!(
                "no xpath configured for plist '{}'",
                self.path
            ))
        })?;
        xpath.evaluate(self.xml()?)
    }

    fn xml(&self) -> Result<&Package> {
        self.xml.get_or_try_init(|| {
            let text = self.convert("xml1")?;
            parse_document(&text)
                .map_err(|message| DescriptorError::parse_failure(&self.path, message))
        })
    }

    fn convert(&self, format: &str) -> Result<String> {
        let path = self.host.expander().expand(&self.path)?;
        let command = format!(
            "{} -convert {} -o - {}",
            self.options.plutil,
            format,
            shell_quote(&path)
        );
        log::debug!("Converting {} to {}", path, format);

        self.host
            .runner()
            .run(&command)
            .map_err(|e| DescriptorError::parse_failure(&self.path, e.to_string()))?
            .into_stdout(&self.path)
    }
}

impl fmt::Display for Plist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plist {}", self.path)?;
        if let Some(xpath) = &self.xpath {
            write!(f, " with xpath: {}", xpath)?;
        }
        Ok(())
    }
}

use serde_json::{json, Value};

use descriptor::{
    plist, registry_security_descriptor, security_descriptor, security_identifier,
    CommandSettings, Host, PermissionQuery, PlistOptions, SidQuery,
};
use utils::app_config::AppConfig;
use utils::error::Result;

use crate::EntityArgs;

fn host() -> Result<Host> {
    let config = AppConfig::fetch()?;
    Ok(Host::local(CommandSettings::from(&config.command)))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Shared output shape of the registry and file commands.
fn permission_query(
    descriptor: &dyn PermissionQuery, path: &str, trustee: Option<&str>, permission: Option<&str>,
) -> Result<Value> {
    Ok(match (trustee, permission) {
        (Some(trustee), _) => json!({
            "path": path,
            "trustee": trustee,
            "permissions": descriptor.permissions_for_trustee(trustee)?,
        }),
        (None, Some(permission)) => json!({
            "path": path,
            "permission": permission,
            "trustees": descriptor.trustees_with_permission(permission)?,
        }),
        (None, None) => json!({
            "path": path,
            "trustees": descriptor.trustees_with_any_permission()?,
            "permissions": descriptor.permissions()?,
        }),
    })
}

pub fn registry_cmd(path: &str, trustee: Option<&str>, permission: Option<&str>) -> Result<()> {
    let key = registry_security_descriptor(host()?, path);
    log::info!("Querying {}", key);

    let mut output = permission_query(&key, path, trustee, permission)?;
    if trustee.is_none() && permission.is_none() {
        output["sddl"] = json!(key.sddl()?);
    }
    print_json(&output)
}

pub fn acl_cmd(path: &str, trustee: Option<&str>, permission: Option<&str>) -> Result<()> {
    let file = security_descriptor(host()?, path);
    log::info!("Querying {}", file);

    print_json(&permission_query(&file, path, trustee, permission)?)
}

pub fn sid_cmd(entity: EntityArgs) -> Result<()> {
    let query = SidQuery {
        user: entity.user,
        group: entity.group,
        unspecified: entity.unspecified,
    };
    let identifier = security_identifier(host()?, query)?;
    log::info!("Resolving {}", identifier);

    print_json(&json!({
        "kind": identifier.kind(),
        "name": identifier.name(),
        "sid": identifier.sid()?,
        "exists": identifier.exists()?,
    }))
}

pub fn plist_cmd(path: &str, keys: &[String], xpath: Option<String>, exists: bool) -> Result<()> {
    let config = AppConfig::fetch()?;
    let options = PlistOptions {
        xpath,
        plutil: config.plist.plutil,
    };
    let document = plist(host()?, path, options)?;
    log::info!("Reading {}", document);

    let output = if exists {
        json!({ "path": path, "exists": document.exists()? })
    } else if document.xpath().is_some() {
        json!({
            "path": path,
            "xpath": document.xpath().map(|x| x.as_str()),
            "value": document.xpath_value()?,
        })
    } else {
        json!({
            "path": path,
            "keys": keys,
            "value": document.get(keys)?,
        })
    };
    print_json(&output)
}

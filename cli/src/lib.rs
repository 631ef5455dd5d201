use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use utils::app_config::AppConfig;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "secdesc", version)]
#[command(about = "Query Windows security descriptors and macOS property lists", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set the logging level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file merged over the defaults
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the DACL of a registry key
    Registry {
        /// Registry path, e.g. 'HKLM:\SOFTWARE\Policies'
        path: String,

        /// Show the rights of one trustee SID
        #[arg(short, long, conflicts_with = "permission")]
        trustee: Option<String>,

        /// List the trustees holding a right, e.g. KeyRead
        #[arg(short, long)]
        permission: Option<String>,
    },

    /// Show the access rules of a file or directory
    Acl {
        path: String,

        /// Show the permission sets of one trustee (SID or name without domain)
        #[arg(short, long, conflicts_with = "permission")]
        trustee: Option<String>,

        /// List the trustees holding a permission set, e.g. FullControl
        #[arg(short, long)]
        permission: Option<String>,
    },

    /// Resolve a user or group name to its SID
    Sid {
        #[command(flatten)]
        entity: EntityArgs,
    },

    /// Read values from a property list
    Plist {
        /// Plist path; $HOME is expanded on the inspected host
        path: String,

        /// Key path to look up, one key per flag
        #[arg(short, long = "key", value_name = "KEY")]
        keys: Vec<String>,

        /// Path query evaluated against the XML rendering
        #[arg(short, long, value_name = "EXPRESSION", conflicts_with = "keys")]
        xpath: Option<String>,

        /// Only report whether the plist exists
        #[arg(short, long, conflicts_with_all = ["keys", "xpath"])]
        exists: bool,
    },
}

/// Exactly one entity kind must be named.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct EntityArgs {
    #[arg(long, value_name = "NAME")]
    pub user: Option<String>,

    #[arg(long, value_name = "NAME")]
    pub group: Option<String>,

    /// Try groups first, then users
    #[arg(long, value_name = "NAME")]
    pub unspecified: Option<String>,
}

pub fn cli_match() -> utils::error::Result<()> {
    let cli = Cli::parse();

    AppConfig::merge_config(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        AppConfig::set("log.level", level)?;
    }
    // 命令行参数可能改变了日志配置，重新构建 logger
    let _guard = utils::logger::reload_logging()?;

    match cli.command {
        Commands::Registry {
            path,
            trustee,
            permission,
        } => commands::registry_cmd(&path, trustee.as_deref(), permission.as_deref())?,
        Commands::Acl {
            path,
            trustee,
            permission,
        } => commands::acl_cmd(&path, trustee.as_deref(), permission.as_deref())?,
        Commands::Sid { entity } => commands::sid_cmd(entity)?,
        Commands::Plist {
            path,
            keys,
            xpath,
            exists,
        } => commands::plist_cmd(&path, &keys, xpath, exists)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sid_requires_exactly_one_kind() {
        assert!(Cli::try_parse_from(["secdesc", "sid"]).is_err());
        assert!(Cli::try_parse_from(["secdesc", "sid", "--user", "a", "--group", "b"]).is_err());

        let cli = Cli::try_parse_from(["secdesc", "sid", "--group", "Users"]).unwrap();
        match cli.command {
            Commands::Sid { entity } => {
                assert_eq!(entity.group.as_deref(), Some("Users"));
                assert!(entity.user.is_none());
            }
            other => panic!("Expected sid, got {:?}", other),
        }
    }

    #[test]
    fn test_plist_keys_and_global_flags() {
        let cli = Cli::try_parse_from([
            "secdesc",
            "plist",
            "/System/Library/CoreServices/SystemVersion.plist",
            "-k",
            "ProductName",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::Plist { keys, exists, .. } => {
                assert_eq!(keys, vec!["ProductName"]);
                assert!(!exists);
            }
            other => panic!("Expected plist, got {:?}", other),
        }

        assert!(Cli::try_parse_from(["secdesc", "plist", "/x.plist", "--exists", "--xpath", "//key"]).is_err());
    }

    #[test]
    fn test_trustee_conflicts_with_permission() {
        assert!(Cli::try_parse_from([
            "secdesc", "registry", "HKLM:\\SOFTWARE", "--trustee", "S-1-5-18", "--permission", "KeyRead"
        ])
        .is_err());
    }
}

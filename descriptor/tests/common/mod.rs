#![allow(dead_code)]

use std::sync::Arc;

use descriptor::testing::ScriptedRunner;
use descriptor::Host;

pub const REGISTRY_KEY: &str = r"HKLM:\SOFTWARE\Policies\Microsoft\Windows\WindowsUpdate";

pub const SDDL: &str = "O:BAG:SYD:PAI(A;CI;KA;;;SY)(A;CI;KA;;;BA)(A;CI;KR;;;BU)\r\n";

/// 转换后的 DACL 表（SID + AccessMask）
pub const DACL: &str = "\r\n\
SID          AccessMask\r\n\
---          ----------\r\n\
S-1-5-18         983103\r\n\
S-1-5-32-544     983103\r\n\
S-1-5-32-545     131097\r\n";

pub const FILE_PATH: &str = r"C:\Windows\System32\drivers\etc\hosts";

pub const ACCESS: &str = "\r\n\
FileSystemRights  : FullControl\r\n\
AccessControlType : Allow\r\n\
IdentityReference : NT AUTHORITY\\SYSTEM\r\n\
IsInherited       : True\r\n\
InheritanceFlags  : None\r\n\
PropagationFlags  : None\r\n\
\r\n\
FileSystemRights  : ReadAndExecute, Synchronize\r\n\
AccessControlType : Allow\r\n\
IdentityReference : BUILTIN\\Users\r\n\
IsInherited       : True\r\n\
\r\n\
FileSystemRights  : Modify, Synchronize\r\n\
AccessControlType : Allow\r\n\
IdentityReference : CORP\\alice\r\n\
IsInherited       : False\r\n\
\r\n";

pub const USERS_GROUP: &str = "Node,Name,SID\r\r\nWIN-HOST,Users,S-1-5-32-545\r\r\n";
pub const ALICE_ACCOUNT: &str = "Node,Name,SID\r\r\nWIN-HOST,alice,S-1-5-21-1-2-3-1001\r\r\n";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn registry_host(sddl: &str, dacl: &str) -> (Arc<ScriptedRunner>, Host) {
    init_logging();
    ScriptedRunner::new()
        .on(").SDDL", sddl)
        .on("SDDLToWin32SD", dacl)
        .into_host()
}

pub fn filesystem_host(access: &str) -> (Arc<ScriptedRunner>, Host) {
    init_logging();
    ScriptedRunner::new()
        .on("ExpandProperty Access", access)
        .on("wmic group where 'Name=\"Users\"'", USERS_GROUP)
        .on("wmic useraccount where 'Name=\"alice\"'", ALICE_ACCOUNT)
        .into_host()
}

mod common;

use std::sync::Arc;

use descriptor::testing::{ScriptedRunner, StaticProbe};
use descriptor::{plist, DescriptorError, PathValue, PlistOptions};
use serde_json::Value;

const SYSTEM_VERSION: &str = "/System/Library/CoreServices/SystemVersion.plist";

const SYSTEM_VERSION_JSON: &str = r#"{"ProductBuildVersion":"17G65","ProductCopyright":"1983-2018 Apple Inc.","ProductName":"Mac OS X","ProductUserVisibleVersion":"10.13.6","ProductVersion":"10.13.6"}"#;

const SOFTWARE_UPDATE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>AutomaticCheckEnabled</key>
	<true/>
	<key>AutomaticDownload</key>
	<false/>
</dict>
</plist>
"#;

fn runner() -> ScriptedRunner {
    common::init_logging();
    ScriptedRunner::new()
        .on("echo $HOME", "/Users/tester\n")
        .on("-convert json", SYSTEM_VERSION_JSON)
        .on("-convert xml1", SOFTWARE_UPDATE_XML)
}

#[test]
fn test_key_lookup() {
    let (_, host) = runner().into_host();
    let doc = plist(host, SYSTEM_VERSION, PlistOptions::default()).unwrap();

    assert_eq!(doc.get(&["ProductName"]).unwrap(), Some(&Value::from("Mac OS X")));
    assert_eq!(doc.get(&["ProductVersion"]).unwrap(), Some(&Value::from("10.13.6")));
    assert_eq!(doc.get(&["Nonexistent"]).unwrap(), None);
    assert_eq!(doc.get(&["Nonexistent", "Deeper"]).unwrap(), None);
}

#[test]
fn test_xpath_value() {
    let (_, host) = runner().into_host();
    let options = PlistOptions::with_xpath(
        "name(/plist/dict/key[text()='AutomaticCheckEnabled']/following-sibling::*[1])",
    );
    let doc = plist(host.clone(), "/Library/Preferences/com.apple.SoftwareUpdate.plist", options).unwrap();
    assert_eq!(doc.xpath_value().unwrap(), PathValue::Text("true".to_string()));

    let options = PlistOptions::with_xpath(
        "name(/plist/dict/key[text()='AutomaticDownload']/following-sibling::*[1])",
    );
    let doc = plist(host, "/Library/Preferences/com.apple.SoftwareUpdate.plist", options).unwrap();
    assert_eq!(doc.xpath_value().unwrap().to_string(), "false");
}

#[test]
fn test_xpath_value_requires_expression() {
    let (runner, host) = runner().into_host();
    let doc = plist(host, SYSTEM_VERSION, PlistOptions::default()).unwrap();

    assert!(matches!(
        doc.xpath_value(),
        Err(DescriptorError::Configuration(_))
    ));
    assert_eq!(runner.call_count("plutil"), 0);
}

#[test]
fn test_exists_expands_home() {
    let (runner, host) = runner().into_host();
    let host = host.with_probe(Arc::new(StaticProbe::new([
        "/Users/tester/Library/Preferences/com.apple.finder.plist",
    ])));

    let finder = plist(
        host.clone(),
        "$HOME/Library/Preferences/com.apple.finder.plist",
        PlistOptions::default(),
    )
    .unwrap();
    assert!(finder.exists().unwrap());

    let missing = plist(host, "$HOME/Library/Preferences/none.plist", PlistOptions::default()).unwrap();
    assert!(!missing.exists().unwrap());
    assert_eq!(runner.call_count("echo $HOME"), 1);
}

#[test]
fn test_exists_on_local_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("com.example.test.plist");
    std::fs::write(&path, SOFTWARE_UPDATE_XML).unwrap();

    let (_, host) = runner().into_host();
    let present = plist(host.clone(), path.to_string_lossy(), PlistOptions::default()).unwrap();
    assert!(present.exists().unwrap());

    let absent_path = dir.path().join("absent.plist");
    let absent = plist(host, absent_path.to_string_lossy(), PlistOptions::default()).unwrap();
    assert!(!absent.exists().unwrap());
}

#[test]
fn test_configured_plutil_is_used() {
    let (runner, host) = runner().into_host();
    let options = PlistOptions {
        plutil: "/usr/bin/plutil".to_string(),
        ..PlistOptions::default()
    };
    let doc = plist(host, SYSTEM_VERSION, options).unwrap();

    doc.get(&["ProductName"]).unwrap();
    assert_eq!(runner.call_count("/usr/bin/plutil -convert json -o - "), 1);
}

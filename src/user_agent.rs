//! User-Agent detection for the Paprika desktop app.
//!
//! The cloud API does not require a User-Agent, but requests tagged with
//! the installed app's own identification blend in with normal app
//! traffic. Detection is macOS only: the app bundle's `Info.plist` is an
//! XML property list, and the version fields needed for the string live in
//! its top-level dict. Every failure path is non-fatal and falls back to
//! sending no User-Agent at all.

use std::path::Path;
use std::process::Command;

use quick_xml::events::Event;
use quick_xml::Reader;

const APP_PLIST_PATH: &str =
    "/Applications/Paprika Recipe Manager 3.app/Contents/Info.plist";

/// Version fields extracted from an app bundle's `Info.plist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInfo {
    /// `CFBundleShortVersionString`, the marketing version.
    pub version: String,
    /// `CFBundleVersion`, the build number.
    pub build: String,
    /// `CFBundleIdentifier`.
    pub identifier: String,
}

/// Detect a User-Agent string from the installed Paprika app.
///
/// Returns `None` on non-macOS platforms, when the app is not installed,
/// or when any part of the detection fails.
pub fn detect_user_agent() -> Option<String> {
    if !cfg!(target_os = "macos") {
        return None;
    }
    detect_installed_app(Path::new(APP_PLIST_PATH))
}

fn detect_installed_app(plist_path: &Path) -> Option<String> {
    let bytes = std::fs::read(plist_path).ok()?;

    let Some(info) = parse_bundle_info(&bytes) else {
        tracing::warn!(
            path = %plist_path.display(),
            "could not extract version info from Paprika app bundle"
        );
        return None;
    };

    let macos_version = macos_version()?;

    Some(format!(
        "Paprika Recipe Manager 3/{} ({}; build:{}; macOS {})",
        info.version, info.identifier, info.build, macos_version
    ))
}

/// Extract the bundle version fields from XML plist bytes.
///
/// Only XML plists are understood; binary plists (`bplist` magic) report
/// as unparseable. Returns `None` unless all three fields are present in
/// the top-level dict.
pub fn parse_bundle_info(bytes: &[u8]) -> Option<BundleInfo> {
    if bytes.starts_with(b"bplist") {
        return None;
    }

    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    // plist > dict > key/string: capture text only at that depth so
    // strings nested in arrays or sub-dicts are skipped.
    const FIELD_DEPTH: usize = 3;
    let mut depth: usize = 0;
    let mut in_key = false;
    let mut in_value = false;
    let mut pending_key: Option<String> = None;

    let mut version = None;
    let mut build = None;
    let mut identifier = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                if depth == FIELD_DEPTH {
                    match e.name().as_ref() {
                        b"key" => in_key = true,
                        b"string" => in_value = true,
                        _ => pending_key = None,
                    }
                }
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().ok()?.trim().to_string();
                if in_key {
                    pending_key = Some(text);
                } else if in_value {
                    match pending_key.take().as_deref() {
                        Some("CFBundleShortVersionString") => version = Some(text),
                        Some("CFBundleVersion") => build = Some(text),
                        Some("CFBundleIdentifier") => identifier = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                in_key = false;
                in_value = false;
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            Ok(_) => {}
        }
        buf.clear();
    }

    Some(BundleInfo {
        version: version?,
        build: build?,
        identifier: identifier?,
    })
}

fn macos_version() -> Option<String> {
    let output = Command::new("sw_vers")
        .arg("-productVersion")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!version.is_empty()).then_some(version)
}

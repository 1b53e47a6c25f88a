//! Gate in front of the settings surface and direct deactivation.
//!
//! Holds a settings password and a locked flag in its own namespace. The
//! stored secret is obfuscated, not encrypted: it only has to resist a
//! casual browse of the preference store, matching the crate's
//! casual-circumvention threat model.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::store::Namespace;

const KEY_SETTINGS_PASSWORD: &str = "settings_password";
const KEY_SETTINGS_LOCKED: &str = "settings_locked";
const DEFAULT_PASSWORD: &str = "focusguard";
const OBFUSCATION_KEY: &[u8] = b"focusguard-settings-gate";

pub struct SettingsGate {
    prefs: Namespace,
}

impl SettingsGate {
    pub fn new(prefs: Namespace) -> Self {
        Self { prefs }
    }

    pub fn is_locked(&self) -> bool {
        self.prefs.get_bool(KEY_SETTINGS_LOCKED).unwrap_or(false)
    }

    pub fn set_locked(&self, locked: bool) {
        self.prefs.put_bool(KEY_SETTINGS_LOCKED, locked);
    }

    /// Set a new password. Blank input is rejected as a no-op.
    pub fn set_password(&self, password: &str) {
        if password.trim().is_empty() {
            return;
        }
        self.prefs
            .put_string(KEY_SETTINGS_PASSWORD, &obfuscate(password));
    }

    pub fn verify_password(&self, input: &str) -> bool {
        input == self.stored_password()
    }

    /// The configured password, falling back to the default when nothing is
    /// stored or the stored value is unreadable.
    fn stored_password(&self) -> String {
        self.prefs
            .get_string(KEY_SETTINGS_PASSWORD)
            .and_then(|stored| deobfuscate(&stored))
            .unwrap_or_else(|| DEFAULT_PASSWORD.to_string())
    }
}

fn obfuscate(input: &str) -> String {
    let bytes: Vec<u8> = input
        .bytes()
        .zip(OBFUSCATION_KEY.iter().cycle())
        .map(|(byte, key)| byte ^ key)
        .collect();
    BASE64.encode(bytes)
}

fn deobfuscate(stored: &str) -> Option<String> {
    let bytes = BASE64.decode(stored).ok()?;
    let plain: Vec<u8> = bytes
        .iter()
        .zip(OBFUSCATION_KEY.iter().cycle())
        .map(|(byte, key)| byte ^ key)
        .collect();
    String::from_utf8(plain).ok()
}

use serde::{Deserialize, Serialize};

use crate::capabilities::{KeyNamespace, KvError, KvKey};
use crate::{
    DEFAULT_DELAY_MINUTES, DEFAULT_DEVICE_LABEL, DEFAULT_SERVER_URL, MAX_DELAY_MINUTES,
    MIN_DELAY_MINUTES,
};

/// Persisted values. Each maps to one fixed key in the settings namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingKey {
    ServerUrl,
    DeviceLabel,
    Delay,
    InstallId,
}

impl SettingKey {
    /// The three values written together on every field commit.
    pub const USER_SETTINGS: [SettingKey; 3] =
        [SettingKey::ServerUrl, SettingKey::DeviceLabel, SettingKey::Delay];

    #[must_use]
    pub const fn storage_name(self) -> &'static str {
        match self {
            Self::ServerUrl => "serverKey",
            Self::DeviceLabel => "deviceKey",
            Self::Delay => "delayKey",
            Self::InstallId => "installIdKey",
        }
    }

    pub fn kv_key(self) -> Result<KvKey, KvError> {
        KvKey::new(KeyNamespace::Settings, self.storage_name())
    }
}

/// Minutes between automatic reports, always within
/// `MIN_DELAY_MINUTES..=MAX_DELAY_MINUTES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelayMinutes(u32);

impl DelayMinutes {
    /// Coerces free-form field text; never fails.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self(normalize_delay(text))
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn as_secs(self) -> u32 {
        self.0 * 60
    }
}

impl Default for DelayMinutes {
    fn default() -> Self {
        Self(DEFAULT_DELAY_MINUTES)
    }
}

impl std::fmt::Display for DelayMinutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses the delay field and clamps it.
///
/// Anything that is not a decimal number counts as 0. Values above the
/// maximum clamp to the maximum; values below the minimum fall back to the
/// default delay rather than the minimum.
#[must_use]
pub fn normalize_delay(text: &str) -> u32 {
    let value = parse_decimal(text).unwrap_or(0);

    if value > i64::from(MAX_DELAY_MINUTES) {
        MAX_DELAY_MINUTES
    } else if value < i64::from(MIN_DELAY_MINUTES) {
        DEFAULT_DELAY_MINUTES
    } else {
        // In range, so the cast is lossless.
        u32::try_from(value).unwrap_or(DEFAULT_DELAY_MINUTES)
    }
}

/// Integer part of a plain decimal such as `"45"`, `"-5"`, `"1,200"` or
/// `"12.9"`. Exponents, hex and stray characters are rejected.
fn parse_decimal(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, rest) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let (int_part, frac_part) = match rest.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (rest, None),
    };

    if int_part.is_empty() && frac_part.map_or(true, str::is_empty) {
        return None;
    }
    if let Some(frac) = frac_part {
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    if int_part.starts_with(',') || int_part.ends_with(',') || int_part.contains(",,") {
        return None;
    }

    let mut magnitude: i64 = 0;
    for b in int_part.bytes() {
        match b {
            b'0'..=b'9' => {
                magnitude = magnitude
                    .saturating_mul(10)
                    .saturating_add(i64::from(b - b'0'));
            }
            b',' => {}
            _ => return None,
        }
    }

    Some(if negative { -magnitude } else { magnitude })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub server_url: String,
    pub device_label: String,
    pub delay: DelayMinutes,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            device_label: DEFAULT_DEVICE_LABEL.to_string(),
            delay: DelayMinutes::default(),
        }
    }
}

impl Settings {
    /// Text stored under `key`. `InstallId` is not part of the user settings.
    #[must_use]
    pub fn stored_text(&self, key: SettingKey) -> Option<String> {
        match key {
            SettingKey::ServerUrl => Some(self.server_url.clone()),
            SettingKey::DeviceLabel => Some(self.device_label.clone()),
            SettingKey::Delay => Some(self.delay.to_string()),
            SettingKey::InstallId => None,
        }
    }

    /// Applies a value read back from storage. Stored text goes through the
    /// same coercion as typed text, so an edited store cannot break the
    /// delay invariant.
    pub fn apply_stored(&mut self, key: SettingKey, text: String) {
        match key {
            SettingKey::ServerUrl => self.server_url = text,
            SettingKey::DeviceLabel => self.device_label = text,
            SettingKey::Delay => self.delay = DelayMinutes::from_text(&text),
            SettingKey::InstallId => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod delay_tests {
        use super::*;

        #[test]
        fn test_normalize_delay_examples() {
            assert_eq!(normalize_delay(""), 10);
            assert_eq!(normalize_delay("45"), 45);
            assert_eq!(normalize_delay("100"), 60);
            assert_eq!(normalize_delay("0"), 10);
            assert_eq!(normalize_delay("-5"), 10);
        }

        #[test]
        fn test_normalize_delay_bounds() {
            assert_eq!(normalize_delay("1"), 1);
            assert_eq!(normalize_delay("60"), 60);
            assert_eq!(normalize_delay("61"), 60);
            assert_eq!(normalize_delay("200"), 60);
        }

        #[test]
        fn test_normalize_delay_lenient_forms() {
            assert_eq!(normalize_delay(" 15 "), 15);
            assert_eq!(normalize_delay("+20"), 20);
            assert_eq!(normalize_delay("12.9"), 12);
            assert_eq!(normalize_delay(".5"), 10);
            assert_eq!(normalize_delay("1,000"), 60);
        }

        #[test]
        fn test_normalize_delay_garbage() {
            assert_eq!(normalize_delay("abc"), 10);
            assert_eq!(normalize_delay("1e3"), 10);
            assert_eq!(normalize_delay("0x10"), 10);
            assert_eq!(normalize_delay("5 min"), 10);
            assert_eq!(normalize_delay("-"), 10);
            assert_eq!(normalize_delay("."), 10);
            assert_eq!(normalize_delay(",5"), 10);
        }

        #[test]
        fn test_normalize_delay_huge_values_saturate() {
            assert_eq!(normalize_delay("99999999999999999999999999"), 60);
            assert_eq!(normalize_delay("-99999999999999999999999999"), 10);
        }

        proptest! {
            #[test]
            fn prop_normalize_delay_in_range(text in ".*") {
                let minutes = normalize_delay(&text);
                prop_assert!((MIN_DELAY_MINUTES..=MAX_DELAY_MINUTES).contains(&minutes));
            }

            #[test]
            fn prop_normalize_delay_integers(value in -1000i64..1000) {
                let expected = if value > 60 { 60 } else if value < 1 { 10 } else { value as u32 };
                prop_assert_eq!(normalize_delay(&value.to_string()), expected);
            }

            #[test]
            fn prop_normalize_delay_idempotent(text in ".*") {
                let once = normalize_delay(&text);
                prop_assert_eq!(normalize_delay(&once.to_string()), once);
            }
        }
    }

    mod settings_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let settings = Settings::default();
            assert_eq!(settings.server_url, DEFAULT_SERVER_URL);
            assert_eq!(settings.device_label, DEFAULT_DEVICE_LABEL);
            assert_eq!(settings.delay.get(), 10);
            assert_eq!(settings.delay.as_secs(), 600);
        }

        #[test]
        fn test_storage_keys() {
            assert_eq!(SettingKey::ServerUrl.kv_key().unwrap().raw(), "settings:serverKey");
            assert_eq!(SettingKey::DeviceLabel.kv_key().unwrap().raw(), "settings:deviceKey");
            assert_eq!(SettingKey::Delay.kv_key().unwrap().raw(), "settings:delayKey");
            assert_eq!(SettingKey::InstallId.kv_key().unwrap().raw(), "settings:installIdKey");
        }

        #[test]
        fn test_stored_text_roundtrip() {
            let original = Settings {
                server_url: "https://collector.example/ingest".into(),
                device_label: "Van 3".into(),
                delay: DelayMinutes::from_text("25"),
            };

            let mut restored = Settings::default();
            for key in SettingKey::USER_SETTINGS {
                let text = original.stored_text(key).unwrap();
                restored.apply_stored(key, text);
            }

            assert_eq!(restored, original);
            assert_eq!(original.stored_text(SettingKey::InstallId), None);
        }

        #[test]
        fn test_apply_stored_delay_is_normalized() {
            let mut settings = Settings::default();
            settings.apply_stored(SettingKey::Delay, "500".into());
            assert_eq!(settings.delay.get(), 60);
        }
    }
}

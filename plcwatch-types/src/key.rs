//! Canonical machine identity.

use alloc::format;
use alloc::string::String;
use core::fmt;

/// Separator between the brand and model parts of a joined key.
pub const KEY_SEPARATOR: char = '_';

/// Canonical identity of a machine.
///
/// A key is the composite of a PLC brand and model. Both parts are trimmed
/// and lower-cased when the key is built, so `" Siemens"` / `"S7-1200 "` and
/// `"siemens"` / `"s7-1200"` name the same machine. Keys built from a brand
/// alone (as some registries list machines) have an empty model.
///
/// Normalization happens only here. Everything downstream compares keys
/// structurally.
///
/// With the `serde` feature a key serializes as `{"brand", "model"}`.
/// Deserialization also accepts the joined `brand_model` string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct MachineKey {
    #[cfg_attr(feature = "minicbor", n(0))]
    brand: String,
    #[cfg_attr(feature = "minicbor", n(1))]
    model: String,
}

/// Reasons a machine key cannot be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The brand was empty after trimming.
    MissingBrand,
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::MissingBrand => write!(f, "machine identity has no brand"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for KeyError {}

fn normalize(part: &str) -> String {
    part.trim().to_lowercase()
}

impl MachineKey {
    /// Build a key from a brand and model.
    pub fn new(brand: &str, model: &str) -> Result<Self, KeyError> {
        let brand = normalize(brand);
        if brand.is_empty() {
            return Err(KeyError::MissingBrand);
        }
        Ok(Self {
            brand,
            model: normalize(model),
        })
    }

    /// Build a key for a machine known only by its brand.
    pub fn brand_only(brand: &str) -> Result<Self, KeyError> {
        Self::new(brand, "")
    }

    /// Parse a joined `brand_model` key.
    ///
    /// The first separator splits brand from model; a key without a
    /// separator is treated as brand-only.
    pub fn parse(joined: &str) -> Result<Self, KeyError> {
        let joined = joined.trim();
        match joined.split_once(KEY_SEPARATOR) {
            Some((brand, model)) => Self::new(brand, model),
            None => Self::brand_only(joined),
        }
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The joined `brand_model` form used on the wire and in logs.
    pub fn as_string(&self) -> String {
        if self.model.is_empty() {
            self.brand.clone()
        } else {
            format!("{}{}{}", self.brand, KEY_SEPARATOR, self.model)
        }
    }

    /// Returns true if `filter` names this machine, either by its full key
    /// or by brand alone.
    pub fn matches(&self, filter: &str) -> bool {
        let filter = normalize(filter);
        filter == self.brand || filter == self.as_string()
    }
}

impl fmt::Display for MachineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.brand)?;
        if !self.model.is_empty() {
            write!(f, "{}{}", KEY_SEPARATOR, self.model)?;
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::MachineKey;
    use alloc::string::String;
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Parts {
            brand: String,
            #[serde(default)]
            model: String,
        },
        Joined(String),
    }

    impl<'de> Deserialize<'de> for MachineKey {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let key = match Repr::deserialize(deserializer)? {
                Repr::Parts { brand, model } => MachineKey::new(&brand, &model),
                Repr::Joined(joined) => MachineKey::parse(&joined),
            };
            key.map_err(de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_case_folds() {
        let a = MachineKey::new("  Siemens ", " S7-1200").unwrap();
        let b = MachineKey::new("siemens", "s7-1200").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_string(), "siemens_s7-1200");
        assert_eq!(a.brand(), "siemens");
        assert_eq!(a.model(), "s7-1200");
    }

    #[test]
    fn empty_brand_is_rejected() {
        assert_eq!(MachineKey::new("   ", "x"), Err(KeyError::MissingBrand));
        assert_eq!(MachineKey::parse(""), Err(KeyError::MissingBrand));
    }

    #[test]
    fn brand_only_has_no_separator() {
        let key = MachineKey::brand_only("Press-1").unwrap();
        assert_eq!(key.as_string(), "press-1");
        assert_eq!(key.to_string(), "press-1");
        assert!(key.model().is_empty());
    }

    #[test]
    fn parse_splits_on_first_separator() {
        let key = MachineKey::parse("Allen Bradley_Micro_850").unwrap();
        assert_eq!(key.brand(), "allen bradley");
        assert_eq!(key.model(), "micro_850");
    }

    #[test]
    fn parse_matches_new() {
        let parsed = MachineKey::parse(" Delta_DVP ").unwrap();
        assert_eq!(parsed, MachineKey::new("delta", "dvp").unwrap());
    }

    #[test]
    fn matches_by_brand_or_full_key() {
        let key = MachineKey::new("Delta", "DVP").unwrap();
        assert!(key.matches("delta"));
        assert!(key.matches(" DELTA_dvp "));
        assert!(!key.matches("siemens"));
    }

    #[test]
    fn display_equals_as_string() {
        let key = MachineKey::new("omron", "cp1e").unwrap();
        assert_eq!(key.to_string(), key.as_string());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_keeps_brand_and_model_apart() {
        let key = MachineKey::new("Allen_Bradley", "Micro850").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"{"brand":"allen_bradley","model":"micro850"}"#);

        let back: MachineKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert_eq!(back.brand(), "allen_bradley");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_accepts_joined_string() {
        let key = MachineKey::new("Omron", "CP1E").unwrap();
        let back: MachineKey = serde_json::from_str("\" OMRON_cp1e\"").unwrap();
        assert_eq!(back, key);

        let parts: MachineKey = serde_json::from_str(r#"{"brand": " Omron"}"#).unwrap();
        assert_eq!(parts, MachineKey::brand_only("omron").unwrap());

        assert!(serde_json::from_str::<MachineKey>("\"  \"").is_err());
        assert!(serde_json::from_str::<MachineKey>(r#"{"brand": "", "model": "x"}"#).is_err());
    }
}

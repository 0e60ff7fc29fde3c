//! Memory-layout configuration for the generator.
//!
//! This module defines the YAML memory-config model and its validation. It
//! provides:
//! 1. **Defaults:** The built-in two-bank layout used when no config is given.
//! 2. **Structures:** Banks (name, base, size, roles, access letters), the
//!    shared-bank data reserve, and the optional absolute boot address.
//! 3. **Resolution:** Conversion of a validated layout into the absolute code
//!    and data segments the memory store and address mapper work with.
//!
//! Integers in the YAML accept either a plain number or a `"0x…"` hex string.

use std::fmt;
use std::path::Path;

use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::common::constants::DEFAULT_DATA_RESERVE;
use crate::common::{GenError, Result};
use crate::mem::AddressSegment;

/// Default configuration constants for the built-in memory layout.
mod defaults {
    /// Base address of the built-in code bank (2 GiB).
    pub const CODE_BASE: u64 = 0x8000_0000;

    /// Size of the built-in code bank (256 KiB).
    pub const CODE_SIZE: u64 = 0x4_0000;

    /// Base address of the built-in data bank.
    pub const DATA_BASE: u64 = 0x8004_0000;

    /// Size of the built-in data bank (256 KiB).
    pub const DATA_SIZE: u64 = 0x4_0000;

    /// Boot address of the built-in layout.
    pub const BOOT: u64 = 0x8000_0100;
}

/// Letters a bank `access` string may contain (GNU ld MEMORY attributes).
const ACCESS_LETTERS: &str = "rwxail!";

/// Top-level document: everything lives under the `memory` key.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfigFile {
    /// The memory layout itself.
    pub memory: MemoryLayout,
}

/// One declared bank: a contiguous absolute-address region with roles.
#[derive(Debug, Clone, Deserialize)]
pub struct BankConfig {
    /// Bank name; defaults to `bank<i>` when omitted.
    #[serde(default)]
    pub name: Option<String>,

    /// Absolute base address.
    #[serde(deserialize_with = "de_u64")]
    pub base: u64,

    /// Size in bytes; must be non-zero.
    #[serde(deserialize_with = "de_u64")]
    pub size: u64,

    /// Whether instructions may be placed and executed here.
    #[serde(default)]
    pub code: bool,

    /// Whether loadable data may be placed here.
    #[serde(default)]
    pub data: bool,

    /// Linker MEMORY access letters; case-insensitive, defaults to `rwx`.
    #[serde(default = "BankConfig::default_access")]
    pub access: String,
}

impl BankConfig {
    /// Returns the default access string for a bank.
    fn default_access() -> String {
        "rwx".to_owned()
    }

    /// Exclusive end of this bank's range.
    pub fn hi(&self) -> u64 {
        self.base.wrapping_add(self.size)
    }
}

/// The validated memory layout: banks plus shared-bank and boot settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryLayout {
    /// Ordered bank list; at least one entry, at least one with `code: true`.
    pub banks: Vec<BankConfig>,

    /// Bytes reserved for data at the top of the last code bank when no pure
    /// data bank exists.
    #[serde(default = "MemoryLayout::default_data_reserve", deserialize_with = "de_u64")]
    pub data_reserve: u64,

    /// Absolute boot address; omitted means randomised.
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub boot: Option<u64>,
}

impl MemoryLayout {
    /// Returns the default shared-bank data reserve.
    fn default_data_reserve() -> u64 {
        DEFAULT_DATA_RESERVE
    }

    /// The built-in layout: one `rwx` code bank, one `rw` data bank, and a
    /// fixed boot address just above the bank base.
    pub fn built_in() -> Self {
        Self {
            banks: vec![
                BankConfig {
                    name: Some("CODE".to_owned()),
                    base: defaults::CODE_BASE,
                    size: defaults::CODE_SIZE,
                    code: true,
                    data: false,
                    access: "rwx".to_owned(),
                },
                BankConfig {
                    name: Some("DATA".to_owned()),
                    base: defaults::DATA_BASE,
                    size: defaults::DATA_SIZE,
                    code: false,
                    data: true,
                    access: "rw".to_owned(),
                },
            ],
            data_reserve: DEFAULT_DATA_RESERVE,
            boot: Some(defaults::BOOT),
        }
    }

    /// Loads and validates a layout from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::Io`] when the file cannot be read and
    /// [`GenError::ConfigInvalid`] when it does not parse or validate.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let parsed: MemoryConfigFile = serde_yaml::from_str(&text).map_err(|e| {
            GenError::ConfigInvalid(format!("{}: {e}", path.display()))
        })?;
        let mut layout = parsed.memory;
        layout.normalise();
        layout.validate()?;
        Ok(layout)
    }

    /// Loads and validates a layout from in-memory YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::ConfigInvalid`] when the text does not parse or
    /// validate.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let parsed: MemoryConfigFile = serde_yaml::from_str(text)
            .map_err(|e| GenError::ConfigInvalid(e.to_string()))?;
        let mut layout = parsed.memory;
        layout.normalise();
        layout.validate()?;
        Ok(layout)
    }

    /// Fills in bank names and canonicalises access strings.
    fn normalise(&mut self) {
        for (i, bank) in self.banks.iter_mut().enumerate() {
            if bank.name.is_none() {
                bank.name = Some(format!("bank{i}"));
            }
            bank.access = bank.access.trim().to_ascii_lowercase();
        }
        if self.data_reserve == 0 {
            self.data_reserve = DEFAULT_DATA_RESERVE;
        }
    }

    /// Checks structural rules the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::ConfigInvalid`] naming the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.banks.is_empty() {
            return Err(GenError::ConfigInvalid("no banks declared".to_owned()));
        }
        for bank in &self.banks {
            let name = bank.name.as_deref().unwrap_or("<unnamed>");
            if bank.size == 0 {
                return Err(GenError::ConfigInvalid(format!(
                    "bank {name}: size must be > 0"
                )));
            }
            if bank.base.checked_add(bank.size).is_none() {
                return Err(GenError::ConfigInvalid(format!(
                    "bank {name}: base + size wraps the address space"
                )));
            }
            if let Some(bad) = bank.access.chars().find(|c| !ACCESS_LETTERS.contains(*c)) {
                return Err(GenError::ConfigInvalid(format!(
                    "bank {name}: invalid access letter '{bad}' (allowed: {ACCESS_LETTERS})"
                )));
            }
        }
        if !self.banks.iter().any(|b| b.code) {
            return Err(GenError::ConfigInvalid(
                "at least one bank must have code: true".to_owned(),
            ));
        }
        // Bank ranges must not overlap each other; a bank that serves both
        // roles declares that itself via code+data.
        let mut ranges: Vec<(u64, u64, &str)> = self
            .banks
            .iter()
            .map(|b| (b.base, b.hi(), b.name.as_deref().unwrap_or("<unnamed>")))
            .collect();
        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            if pair[1].0 < pair[0].1 {
                return Err(GenError::ConfigInvalid(format!(
                    "banks {} and {} overlap",
                    pair[0].2, pair[1].2
                )));
            }
        }
        if let Some(boot) = self.boot {
            let in_code = self
                .banks
                .iter()
                .filter(|b| b.code)
                .any(|b| b.base <= boot && boot < b.hi());
            if !in_code {
                return Err(GenError::ConfigInvalid(format!(
                    "boot {boot:#x} is not inside any code bank (boot is absolute)"
                )));
            }
        }
        Ok(())
    }

    /// Resolves the layout into the absolute regions the generator uses.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::ConfigInvalid`] when the layout fails validation.
    pub fn resolve(&self) -> Result<ResolvedLayout> {
        self.validate()?;
        let code_segments: Vec<AddressSegment> = self
            .banks
            .iter()
            .filter(|b| b.code)
            .map(|b| AddressSegment::new(b.base, b.size))
            .collect();
        // A bank that is both code and data is handled by the shared-bank
        // carve; only pure data banks become data segments.
        let data_segments: Vec<AddressSegment> = self
            .banks
            .iter()
            .filter(|b| b.data && !b.code)
            .map(|b| AddressSegment::new(b.base, b.size))
            .collect();
        let load_addr = code_segments[0].base;
        let ram_size = code_segments.iter().map(|s| s.size).sum();
        let data_base = data_segments.first().map(|s| s.base);
        Ok(ResolvedLayout {
            banks: self.banks.clone(),
            code_segments,
            data_segments,
            load_addr,
            ram_size,
            data_base,
            data_reserve: self.data_reserve,
            boot: self.boot,
        })
    }
}

/// A resolved layout: the absolute view the rest of the generator consumes.
#[derive(Debug, Clone)]
pub struct ResolvedLayout {
    /// The declared banks, in declaration order.
    pub banks: Vec<BankConfig>,
    /// Every code bank as an absolute segment.
    pub code_segments: Vec<AddressSegment>,
    /// Every pure data bank as an absolute segment.
    pub data_segments: Vec<AddressSegment>,
    /// Base of the first code bank; reported in the assembly banner.
    pub load_addr: u64,
    /// Sum of all code bank sizes.
    pub ram_size: u64,
    /// Base of the first pure data bank, when one exists.
    pub data_base: Option<u64>,
    /// Bytes to carve for data when no pure data bank exists.
    pub data_reserve: u64,
    /// Configured absolute boot address, when fixed.
    pub boot: Option<u64>,
}

/// Accepts an integer or a `"0x…"` / decimal string.
fn parse_int_text<E: de::Error>(s: &str) -> std::result::Result<u64, E> {
    let t = s.trim();
    let parsed = t.strip_prefix("0x").map_or_else(
        || t.parse::<u64>().ok(),
        |hex| u64::from_str_radix(hex, 16).ok(),
    );
    parsed.ok_or_else(|| E::custom(format!("expected an integer or 0x-hex string, got '{s}'")))
}

/// Visitor shared by the required and optional integer deserialisers.
struct IntOrHex;

impl de::Visitor<'_> for IntOrHex {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer or a 0x-prefixed hex string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom("negative address"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<u64, E> {
        parse_int_text(v)
    }
}

/// Deserialises a `u64` from an integer or hex string.
fn de_u64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    d.deserialize_any(IntOrHex)
}

/// Deserialises an optional `u64` from an integer or hex string.
fn de_opt_u64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "de_u64")] u64);

    Option::<Wrap>::deserialize(d).map(|o| o.map(|w| w.0))
}

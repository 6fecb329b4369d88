//! Target facts
//!
//! Sizes and alignments the type system needs but cannot compute itself.
//! Supplied by the driver; two common data models are built in.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::{Error, Result};

/// Size and alignment of a primitive, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeAlign {
    pub size: u64,
    pub align: u64,
}

impl SizeAlign {
    pub const fn new(size: u64, align: u64) -> Self {
        Self { size, align }
    }
}

/// C primitive types with target-dependent layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CType {
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
}

impl CType {
    pub const ALL: [CType; 13] = [
        CType::Char,
        CType::SChar,
        CType::UChar,
        CType::Short,
        CType::UShort,
        CType::Int,
        CType::UInt,
        CType::Long,
        CType::ULong,
        CType::LongLong,
        CType::ULongLong,
        CType::Float,
        CType::Double,
    ];

    /// Source spelling of the type
    pub fn name(self) -> &'static str {
        match self {
            CType::Char => "c_char",
            CType::SChar => "c_schar",
            CType::UChar => "c_uchar",
            CType::Short => "c_short",
            CType::UShort => "c_ushort",
            CType::Int => "c_int",
            CType::UInt => "c_uint",
            CType::Long => "c_long",
            CType::ULong => "c_ulong",
            CType::LongLong => "c_longlong",
            CType::ULongLong => "c_ulonglong",
            CType::Float => "c_float",
            CType::Double => "c_double",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, CType::Float | CType::Double)
    }
}

/// Everything the semantic core needs to know about the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    /// Target triple, informational only
    pub triple: String,
    pub pointer: SizeAlign,
    pub char_signed: bool,
    pub c_char: SizeAlign,
    pub c_short: SizeAlign,
    pub c_int: SizeAlign,
    pub c_long: SizeAlign,
    pub c_longlong: SizeAlign,
    pub c_float: SizeAlign,
    pub c_double: SizeAlign,
    /// Alignment of 64-bit integers and doubles as struct members
    pub i64_align: u64,
}

impl TargetInfo {
    /// x86_64 System V (LP64)
    pub fn x86_64() -> Self {
        Self {
            triple: "x86_64-unknown-linux-gnu".to_string(),
            pointer: SizeAlign::new(8, 8),
            char_signed: true,
            c_char: SizeAlign::new(1, 1),
            c_short: SizeAlign::new(2, 2),
            c_int: SizeAlign::new(4, 4),
            c_long: SizeAlign::new(8, 8),
            c_longlong: SizeAlign::new(8, 8),
            c_float: SizeAlign::new(4, 4),
            c_double: SizeAlign::new(8, 8),
            i64_align: 8,
        }
    }

    /// i686 System V (ILP32)
    pub fn i686() -> Self {
        Self {
            triple: "i686-unknown-linux-gnu".to_string(),
            pointer: SizeAlign::new(4, 4),
            char_signed: true,
            c_char: SizeAlign::new(1, 1),
            c_short: SizeAlign::new(2, 2),
            c_int: SizeAlign::new(4, 4),
            c_long: SizeAlign::new(4, 4),
            c_longlong: SizeAlign::new(8, 4),
            c_float: SizeAlign::new(4, 4),
            c_double: SizeAlign::new(8, 4),
            i64_align: 4,
        }
    }

    /// Load a target description from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let info: TargetInfo = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info.validate()?;
        Ok(info)
    }

    /// Reject descriptions the layout code cannot work with
    pub fn validate(&self) -> Result<()> {
        let entries = [
            ("pointer", self.pointer),
            ("c_char", self.c_char),
            ("c_short", self.c_short),
            ("c_int", self.c_int),
            ("c_long", self.c_long),
            ("c_longlong", self.c_longlong),
            ("c_float", self.c_float),
            ("c_double", self.c_double),
        ];
        for (name, sa) in entries {
            if sa.size == 0 || !sa.align.is_power_of_two() {
                return Err(Error::Config(format!(
                    "{} must have a non-zero size and a power-of-two alignment",
                    name
                )));
            }
        }
        if !self.i64_align.is_power_of_two() {
            return Err(Error::Config("i64_align must be a power of two".to_string()));
        }
        Ok(())
    }

    /// Layout of a C primitive
    pub fn c_type(&self, ty: CType) -> SizeAlign {
        match ty {
            CType::Char | CType::SChar | CType::UChar => self.c_char,
            CType::Short | CType::UShort => self.c_short,
            CType::Int | CType::UInt => self.c_int,
            CType::Long | CType::ULong => self.c_long,
            CType::LongLong | CType::ULongLong => self.c_longlong,
            CType::Float => self.c_float,
            CType::Double => self.c_double,
        }
    }

    /// Whether a C integer type is signed on this target
    pub fn c_type_signed(&self, ty: CType) -> bool {
        match ty {
            CType::Char => self.char_signed,
            CType::SChar | CType::Short | CType::Int | CType::Long | CType::LongLong => true,
            CType::UChar | CType::UShort | CType::UInt | CType::ULong | CType::ULongLong => false,
            CType::Float | CType::Double => true,
        }
    }

    /// Width in bits of the platform `int`
    pub fn int_bits(&self) -> u32 {
        (self.c_int.size * 8) as u32
    }

    pub fn pointer_bits(&self) -> u32 {
        (self.pointer.size * 8) as u32
    }
}

impl Default for TargetInfo {
    fn default() -> Self {
        Self::x86_64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_targets_validate() {
        assert!(TargetInfo::x86_64().validate().is_ok());
        assert!(TargetInfo::i686().validate().is_ok());
    }

    #[test]
    fn test_long_follows_data_model() {
        assert_eq!(TargetInfo::x86_64().c_type(CType::Long).size, 8);
        assert_eq!(TargetInfo::i686().c_type(CType::Long).size, 4);
        assert_eq!(TargetInfo::i686().pointer_bits(), 32);
    }

    #[test]
    fn test_rejects_bad_alignment() {
        let mut info = TargetInfo::x86_64();
        info.c_int = SizeAlign::new(4, 3);
        assert!(matches!(info.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.json");
        std::fs::write(&path, serde_json::to_string(&TargetInfo::i686()).unwrap()).unwrap();
        let loaded = TargetInfo::from_json_file(&path).unwrap();
        assert_eq!(loaded, TargetInfo::i686());
    }
}

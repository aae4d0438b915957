//! ARM EABI build attributes (`.ARM.attributes`).
//!
//! Layout: a format-version byte `'A'`, then vendor subsections of
//! `u32 length` + NUL-terminated vendor name. Inside the `aeabi` subsection,
//! sub-subsections start with a one-byte tag and a `u32` size; tag 1 is the
//! file scope whose body is a list of ULEB128 tag/value pairs.

use std::fmt;

use tracing::{debug, warn};

use crate::cursor::ByteCursor;
use crate::header::Endian;
use crate::leb128::decode_uleb128;

const FORMAT_VERSION: u8 = b'A';
const AEABI_VENDOR: &str = "aeabi";
const TAG_FILE: u8 = 1;

/// `Tag_CPU_arch` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CpuArch(pub u64);

impl CpuArch {
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0 => "Pre-Armv4",
            1 => "Armv4",
            2 => "Armv4T",
            3 => "Armv5T",
            4 => "Armv5TE",
            5 => "Armv5TEJ",
            6 => "Armv6",
            7 => "Armv6KZ",
            8 => "Armv6T2",
            9 => "Armv6K",
            10 => "Armv7",
            11 => "Armv6-M",
            12 => "Armv6S-M",
            13 => "Armv7E-M",
            14 => "Armv8-A",
            15 => "Armv8-R",
            16 => "Armv8-M.baseline",
            17 => "Armv8-M.mainline",
            18 => "Armv8.1-A",
            19 => "Armv8.2-A",
            20 => "Armv8.3-A",
            21 => "Armv8.1-M.mainline",
            22 => "Armv9-A",
            _ => return None,
        })
    }
}

impl fmt::Display for CpuArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Unknown({})", self.0),
        }
    }
}

/// `Tag_CPU_arch_profile` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArchProfile(pub u64);

impl ArchProfile {
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0 => "Not applicable",
            0x41 => "Application",
            0x52 => "Realtime",
            0x4D => "Microcontroller",
            0x53 => "Classic",
            _ => return None,
        })
    }
}

impl fmt::Display for ArchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Unknown({:#x})", self.0),
        }
    }
}

/// `Tag_compatibility` outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Compatibility {
    /// `"0"`: the object has no toolchain-specific requirements.
    NoToolchainRequirements,
    /// `"1"`: conforms to the ABI.
    Aeabi,
    /// Any other string: only compatible with the named toolchain.
    ToolchainSpecific,
}

impl Compatibility {
    #[must_use]
    pub fn from_value(value: &str) -> Self {
        match value {
            "0" => Self::NoToolchainRequirements,
            "1" => Self::Aeabi,
            _ => Self::ToolchainSpecific,
        }
    }
}

impl fmt::Display for Compatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoToolchainRequirements => "No toolchain requirements",
            Self::Aeabi => "AEABI",
            Self::ToolchainSpecific => "Toolchain specific",
        })
    }
}

/// File-scope attributes of the `aeabi` vendor subsection.
///
/// Every field is optional: an absent tag stays `None`, which is different
/// from a tag present with value 0.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArmAttributes {
    pub cpu_raw_name: Option<String>,
    pub cpu_name: Option<String>,
    pub cpu_arch: Option<CpuArch>,
    pub cpu_arch_profile: Option<ArchProfile>,
    pub arm_isa_use: Option<u64>,
    pub thumb_isa_use: Option<u64>,
    pub fp_arch: Option<u64>,
    pub wmmx_arch: Option<u64>,
    pub advanced_simd_arch: Option<u64>,
    pub pcs_config: Option<u64>,
    pub abi_pcs_r9_use: Option<u64>,
    pub abi_pcs_rw_data: Option<u64>,
    pub abi_pcs_ro_data: Option<u64>,
    pub abi_pcs_got_use: Option<u64>,
    pub abi_pcs_wchar_t: Option<u64>,
    pub abi_fp_rounding: Option<u64>,
    pub abi_fp_denormal: Option<u64>,
    pub abi_fp_exceptions: Option<u64>,
    pub abi_fp_user_exceptions: Option<u64>,
    pub abi_fp_number_model: Option<u64>,
    pub abi_align_needed: Option<u64>,
    pub abi_align_preserved: Option<u64>,
    pub abi_enum_size: Option<u64>,
    pub abi_hardfp_use: Option<u64>,
    pub abi_vfp_args: Option<u64>,
    pub abi_wmmx_args: Option<u64>,
    pub abi_optimization_goals: Option<u64>,
    pub abi_fp_optimization_goals: Option<u64>,
    pub compatibility: Option<Compatibility>,
    pub cpu_unaligned_access: Option<u64>,
    pub fp_hp_extension: Option<u64>,
    pub abi_fp_16bit_format: Option<u64>,
    pub mp_extension_use: Option<u64>,
    pub div_use: Option<u64>,
    pub dsp_extension: Option<u64>,
    pub mve_arch: Option<u64>,
    pub pac_extension: Option<u64>,
    pub bti_extension: Option<u64>,
    pub nodefaults: Option<u64>,
    pub also_compatible_with: Option<String>,
    pub t2ee_use: Option<u64>,
    pub conformance: Option<String>,
    pub virtualization_use: Option<u64>,
    pub frame_pointer_use: Option<u64>,
    pub bti_use: Option<u64>,
    pub pacret_use: Option<u64>,
}

/// Tags whose value is a NUL-terminated string instead of ULEB128.
const fn is_string_tag(tag: u64) -> bool {
    matches!(tag, 4 | 5 | 32 | 65 | 67)
}

enum Value {
    Str(String),
    Num(u64),
}

impl ArmAttributes {
    /// Parse the contents of an `.ARM.attributes` section.
    ///
    /// Returns `None` when the format version is not `'A'` or no `aeabi`
    /// subsection is present.
    #[must_use]
    pub fn parse(data: &[u8], endian: Endian) -> Option<Self> {
        let cursor = ByteCursor::with_endian(data, endian);
        if cursor.read_u8(0).ok()? != FORMAT_VERSION {
            debug!("unsupported build attribute format version");
            return None;
        }

        let mut pos = 1usize;
        while pos < data.len() {
            let Ok(length) = cursor.read_u32(pos) else {
                warn!(offset = pos, "truncated attribute subsection header");
                return None;
            };
            let length = length as usize;
            let end = pos.checked_add(length).filter(|&end| end <= data.len())?;
            if length < 5 {
                warn!(offset = pos, length, "invalid attribute subsection length");
                return None;
            }
            let (vendor, vendor_len) = read_ntbs(&data[pos + 4..end]);
            if vendor == AEABI_VENDOR {
                let body = pos + 4 + vendor_len + 1;
                return Some(Self::parse_vendor(&cursor, body.min(end), end));
            }
            debug!(vendor = %vendor, "skipping attribute subsection");
            pos = end;
        }
        None
    }

    /// Walk the sub-subsections until the file scope and decode its tags.
    fn parse_vendor(cursor: &ByteCursor<'_>, mut pos: usize, end: usize) -> Self {
        let mut attrs = Self::default();
        while pos < end {
            let (Ok(tag), Ok(size)) = (cursor.read_u8(pos), cursor.read_u32(pos + 1)) else {
                break;
            };
            let size = size as usize;
            if tag == TAG_FILE {
                let scope_end = pos.saturating_add(size).min(end);
                attrs.parse_file_scope(&cursor.data()[..scope_end], pos + 5);
                break;
            }
            if size == 0 {
                break;
            }
            pos = pos.saturating_add(size);
        }
        attrs
    }

    fn parse_file_scope(&mut self, data: &[u8], mut pos: usize) {
        while pos < data.len() {
            let Some((tag, used)) = decode_uleb128(&data[pos..]) else {
                break;
            };
            pos += used;
            let value = if is_string_tag(tag) {
                let Some(rest) = data.get(pos..) else { break };
                let (s, len) = read_ntbs(rest);
                pos += len + 1;
                Value::Str(s)
            } else {
                let Some((num, used)) = data.get(pos..).and_then(decode_uleb128) else {
                    break;
                };
                pos += used;
                Value::Num(num)
            };
            self.apply(tag, value);
        }
    }

    fn apply(&mut self, tag: u64, value: Value) {
        let (s, n) = match value {
            Value::Str(s) => (Some(s), None),
            Value::Num(n) => (None, Some(n)),
        };
        match tag {
            4 => self.cpu_raw_name = s,
            5 => self.cpu_name = s,
            6 => self.cpu_arch = n.map(CpuArch),
            7 => self.cpu_arch_profile = n.map(ArchProfile),
            8 => self.arm_isa_use = n,
            9 => self.thumb_isa_use = n,
            10 => self.fp_arch = n,
            11 => self.wmmx_arch = n,
            12 => self.advanced_simd_arch = n,
            13 => self.pcs_config = n,
            14 => self.abi_pcs_r9_use = n,
            15 => self.abi_pcs_rw_data = n,
            16 => self.abi_pcs_ro_data = n,
            17 => self.abi_pcs_got_use = n,
            18 => self.abi_pcs_wchar_t = n,
            19 => self.abi_fp_rounding = n,
            20 => self.abi_fp_denormal = n,
            21 => self.abi_fp_exceptions = n,
            22 => self.abi_fp_user_exceptions = n,
            23 => self.abi_fp_number_model = n,
            24 => self.abi_align_needed = n,
            25 => self.abi_align_preserved = n,
            26 => self.abi_enum_size = n,
            27 => self.abi_hardfp_use = n,
            28 => self.abi_vfp_args = n,
            29 => self.abi_wmmx_args = n,
            30 => self.abi_optimization_goals = n,
            31 => self.abi_fp_optimization_goals = n,
            32 => self.compatibility = s.as_deref().map(Compatibility::from_value),
            34 => self.cpu_unaligned_access = n,
            36 => self.fp_hp_extension = n,
            38 => self.abi_fp_16bit_format = n,
            42 | 70 => self.mp_extension_use = n,
            44 => self.div_use = n,
            46 => self.dsp_extension = n,
            48 => self.mve_arch = n,
            50 => self.pac_extension = n,
            52 => self.bti_extension = n,
            64 => self.nodefaults = n,
            65 => self.also_compatible_with = s,
            66 => self.t2ee_use = n,
            67 => self.conformance = s,
            68 => self.virtualization_use = n,
            72 => self.frame_pointer_use = n,
            74 => self.bti_use = n,
            76 => self.pacret_use = n,
            _ => debug!(tag, "ignoring unknown build attribute"),
        }
    }

    /// Present attributes as `(tag name, rendered value)` pairs, in tag order.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        fn num(out: &mut Vec<(&'static str, String)>, name: &'static str, v: Option<u64>) {
            if let Some(v) = v {
                out.push((name, v.to_string()));
            }
        }
        fn text<T: ToString>(out: &mut Vec<(&'static str, String)>, name: &'static str, v: Option<&T>) {
            if let Some(v) = v {
                out.push((name, v.to_string()));
            }
        }

        let mut out = Vec::new();
        text(&mut out, "Tag_CPU_raw_name", self.cpu_raw_name.as_ref());
        text(&mut out, "Tag_CPU_name", self.cpu_name.as_ref());
        text(&mut out, "Tag_CPU_arch", self.cpu_arch.as_ref());
        text(&mut out, "Tag_CPU_arch_profile", self.cpu_arch_profile.as_ref());
        num(&mut out, "Tag_ARM_ISA_use", self.arm_isa_use);
        num(&mut out, "Tag_THUMB_ISA_use", self.thumb_isa_use);
        num(&mut out, "Tag_FP_arch", self.fp_arch);
        num(&mut out, "Tag_WMMX_arch", self.wmmx_arch);
        num(&mut out, "Tag_Advanced_SIMD_arch", self.advanced_simd_arch);
        num(&mut out, "Tag_PCS_config", self.pcs_config);
        num(&mut out, "Tag_ABI_PCS_R9_use", self.abi_pcs_r9_use);
        num(&mut out, "Tag_ABI_PCS_RW_data", self.abi_pcs_rw_data);
        num(&mut out, "Tag_ABI_PCS_RO_data", self.abi_pcs_ro_data);
        num(&mut out, "Tag_ABI_PCS_GOT_use", self.abi_pcs_got_use);
        num(&mut out, "Tag_ABI_PCS_wchar_t", self.abi_pcs_wchar_t);
        num(&mut out, "Tag_ABI_FP_rounding", self.abi_fp_rounding);
        num(&mut out, "Tag_ABI_FP_denormal", self.abi_fp_denormal);
        num(&mut out, "Tag_ABI_FP_exceptions", self.abi_fp_exceptions);
        num(&mut out, "Tag_ABI_FP_user_exceptions", self.abi_fp_user_exceptions);
        num(&mut out, "Tag_ABI_FP_number_model", self.abi_fp_number_model);
        num(&mut out, "Tag_ABI_align_needed", self.abi_align_needed);
        num(&mut out, "Tag_ABI_align_preserved", self.abi_align_preserved);
        num(&mut out, "Tag_ABI_enum_size", self.abi_enum_size);
        num(&mut out, "Tag_ABI_HardFP_use", self.abi_hardfp_use);
        num(&mut out, "Tag_ABI_VFP_args", self.abi_vfp_args);
        num(&mut out, "Tag_ABI_WMMX_args", self.abi_wmmx_args);
        num(&mut out, "Tag_ABI_optimization_goals", self.abi_optimization_goals);
        num(&mut out, "Tag_ABI_FP_optimization_goals", self.abi_fp_optimization_goals);
        text(&mut out, "Tag_compatibility", self.compatibility.as_ref());
        num(&mut out, "Tag_CPU_unaligned_access", self.cpu_unaligned_access);
        num(&mut out, "Tag_FP_HP_extension", self.fp_hp_extension);
        num(&mut out, "Tag_ABI_FP_16bit_format", self.abi_fp_16bit_format);
        num(&mut out, "Tag_MPextension_use", self.mp_extension_use);
        num(&mut out, "Tag_DIV_use", self.div_use);
        num(&mut out, "Tag_DSP_extension", self.dsp_extension);
        num(&mut out, "Tag_MVE_arch", self.mve_arch);
        num(&mut out, "Tag_PAC_extension", self.pac_extension);
        num(&mut out, "Tag_BTI_extension", self.bti_extension);
        num(&mut out, "Tag_nodefaults", self.nodefaults);
        text(&mut out, "Tag_also_compatible_with", self.also_compatible_with.as_ref());
        num(&mut out, "Tag_T2EE_use", self.t2ee_use);
        text(&mut out, "Tag_conformance", self.conformance.as_ref());
        num(&mut out, "Tag_Virtualization_use", self.virtualization_use);
        num(&mut out, "Tag_FramePointer_use", self.frame_pointer_use);
        num(&mut out, "Tag_BTI_use", self.bti_use);
        num(&mut out, "Tag_PACRET_use", self.pacret_use);
        out
    }
}

/// NUL-terminated byte string, or the whole slice if unterminated, with its
/// length in bytes excluding the terminator.
fn read_ntbs(data: &[u8]) -> (String, usize) {
    let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    (String::from_utf8_lossy(&data[..len]).into_owned(), len)
}

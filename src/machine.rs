use std::fmt::Formatter;
use std::str::FromStr;

use target_lexicon::{Architecture, Endianness, OperatingSystem, ParseError, Triple};

pub const CHAR_BIT: u32 = 8;
pub const BOOL_SIZE: u8 = 1;
pub const BITINT_MAXWIDTH: u32 = 65535;

const_assert!(CHAR_BIT == 8);
const_assert!(BITINT_MAXWIDTH >= 128);
const_assert!(BITINT_MAXWIDTH <= u16::MAX as u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Aarch64,
    Riscv64,
    Powerpc64,
    X86,
    Arm,
    Riscv32,
    Avr,
    Msp430,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    Windows,
    Darwin,
    FreeBsd,
    None,
}

/**
 * Standard integer kinds the target uses for the `<stdint.h>`/`<stddef.h>` typedefs.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdInt {
    Char,
    Short,
    Int,
    Long,
    LongLong,
}

#[derive(Debug, PartialEq)]
pub enum MachineError {
    UnknownArch(String),
    BadTriple(String),
    EmptyTriple,
}

impl std::fmt::Display for MachineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            MachineError::UnknownArch(a) => write!(f, "unknown target architecture `{}'", a),
            MachineError::BadTriple(e) => write!(f, "bad target triple: {}", e),
            MachineError::EmptyTriple => f.write_str("empty target triple"),
        }
    }
}

/**
 * Data model of the compilation target.
 *
 * Built once from the target triple and read by every stage afterwards.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    pub triple: Triple,
    pub arch: Arch,
    pub os: Os,
    pub char_signed: bool,
    pub short_size: u8,
    pub int_size: u8,
    pub long_size: u8,
    pub llong_size: u8,
    pub ptr_size: u8,
    pub llong_align: u8,
    pub int128: bool,
    pub bitint_chunk: u8,
    pub little_endian: bool,
}

impl Machine {
    pub fn from_triple(triple: &str) -> Result<Self, MachineError> {
        if triple.is_empty() {
            return Err(MachineError::EmptyTriple);
        }
        let triple = match Triple::from_str(&normalize_arch(triple)) {
            Ok(t) => t,
            Err(ParseError::UnrecognizedArchitecture(a)) => {
                return Err(MachineError::UnknownArch(a))
            }
            Err(e) => return Err(MachineError::BadTriple(e.to_string())),
        };
        let arch = match &triple.architecture {
            Architecture::X86_64 => Arch::X86_64,
            Architecture::X86_32(_) => Arch::X86,
            Architecture::Aarch64(_) => Arch::Aarch64,
            Architecture::Arm(_) => Arch::Arm,
            Architecture::Riscv64(_) => Arch::Riscv64,
            Architecture::Riscv32(_) => Arch::Riscv32,
            Architecture::Powerpc64 | Architecture::Powerpc64le => Arch::Powerpc64,
            Architecture::Avr => Arch::Avr,
            Architecture::Msp430 => Arch::Msp430,
            a => return Err(MachineError::UnknownArch(a.to_string())),
        };
        let os = match &triple.operating_system {
            OperatingSystem::Linux => Os::Linux,
            OperatingSystem::Windows => Os::Windows,
            OperatingSystem::Darwin | OperatingSystem::MacOSX { .. } | OperatingSystem::Ios => {
                Os::Darwin
            }
            OperatingSystem::Freebsd => Os::FreeBsd,
            _ => Os::None,
        };
        let ptr_size = match triple.pointer_width() {
            Ok(width) => width.bytes(),
            Err(()) => return Err(MachineError::UnknownArch(triple.architecture.to_string())),
        };
        let little_endian = triple.endianness() != Ok(Endianness::Big);

        // IP16 on 16-bit targets, LLP64 on 64-bit Windows, LP64 and ILP32 elsewhere
        let int_size = if ptr_size == 2 { 2 } else { 4 };
        let long_size = if ptr_size == 8 && os != Os::Windows { 8 } else { 4 };

        let char_signed = match arch {
            Arch::Aarch64 | Arch::Arm | Arch::Riscv64 | Arch::Riscv32 | Arch::Powerpc64 => {
                matches!(os, Os::Darwin | Os::Windows)
            }
            Arch::Avr | Arch::Msp430 | Arch::X86 | Arch::X86_64 => true,
        };

        let llong_align = match (arch, os) {
            (Arch::X86, Os::Linux) | (Arch::X86, Os::None) => 4,
            (Arch::Avr, _) => 1,
            (Arch::Msp430, _) => 2,
            _ => 8,
        };

        let bitint_chunk = match ptr_size {
            8 => 8,
            4 => 4,
            _ => 1,
        };

        Ok(Self {
            triple,
            arch,
            os,
            char_signed,
            short_size: 2,
            int_size,
            long_size,
            llong_size: 8,
            ptr_size,
            llong_align,
            int128: ptr_size == 8,
            bitint_chunk,
            little_endian,
        })
    }

    pub fn is_64bit(&self) -> bool {
        self.ptr_size == 8
    }

    pub fn size_of(&self, kind: StdInt) -> u8 {
        match kind {
            StdInt::Char => 1,
            StdInt::Short => self.short_size,
            StdInt::Int => self.int_size,
            StdInt::Long => self.long_size,
            StdInt::LongLong => self.llong_size,
        }
    }

    /**
     * Smallest standard type with exactly `bits` bits, preferring the lowest rank.
     */
    pub fn exact_width_type(&self, bits: u32) -> Option<StdInt> {
        [
            StdInt::Char,
            StdInt::Short,
            StdInt::Int,
            StdInt::Long,
            StdInt::LongLong,
        ]
        .into_iter()
        .find(|k| self.size_of(*k) as u32 * CHAR_BIT == bits)
    }

    /**
     * The type used for `int64_t` and `intmax_t`. LP64 targets use `long`, everything else `long long`.
     */
    pub fn int64_type(&self) -> StdInt {
        if self.long_size == 8 {
            StdInt::Long
        } else {
            StdInt::LongLong
        }
    }

    /**
     * The type used for `size_t`, `ptrdiff_t` and `intptr_t`.
     */
    pub fn ptr_int_type(&self) -> StdInt {
        if self.os == Os::Windows && self.ptr_size == 8 {
            StdInt::LongLong
        } else if self.ptr_size == self.int_size {
            StdInt::Int
        } else {
            StdInt::Long
        }
    }

    /**
     * The type of `wchar_t` as `(kind, signed)`.
     */
    pub fn wchar_type(&self) -> (StdInt, bool) {
        if self.os == Os::Windows {
            (StdInt::Short, false)
        } else if self.int_size == 2 {
            (StdInt::Long, true)
        } else {
            (StdInt::Int, true)
        }
    }

    pub fn align_of(&self, kind: StdInt) -> u8 {
        match kind {
            StdInt::LongLong => self.llong_align,
            k => {
                let size = self.size_of(k);
                if self.arch == Arch::Avr {
                    1
                } else if self.arch == Arch::Msp430 {
                    size.min(2)
                } else {
                    size
                }
            }
        }
    }

    /**
     * Byte size of `_BitInt(bits)`.
     */
    pub fn bitint_size(&self, bits: u32) -> u32 {
        let bytes = (bits + CHAR_BIT - 1) / CHAR_BIT;
        let chunk = self.bitint_chunk as u32;
        if bytes <= chunk {
            bytes.next_power_of_two()
        } else {
            (bytes + chunk - 1) / chunk * chunk
        }
    }

    pub fn bitint_align(&self, bits: u32) -> u32 {
        self.bitint_size(bits).min(self.bitint_chunk as u32)
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::from_triple("x86_64-linux").unwrap_or_else(|_| unreachable!())
    }
}

/**
 * Spell the architecture aliases other drivers accept the way the triple parser expects.
 */
fn normalize_arch(triple: &str) -> String {
    let (arch, rest) = match triple.split_once('-') {
        Some((arch, rest)) => (arch, Some(rest)),
        None => (triple, None),
    };
    let arch = match arch {
        "arm64" => "aarch64",
        "amd64" | "x86-64" => "x86_64",
        "x86" => "i386",
        a => a,
    };
    match rest {
        Some(rest) => format!("{}-{}", arch, rest),
        None => arch.to_string(),
    }
}

use crate::{
    error::{CompileError, ErrorCollector},
    machine::{self, Machine, StdInt},
    span::Span,
};
use bitflags::bitflags;
use num::{BigInt, Integer};
use num_traits::{One, Zero};
use replace_with::replace_with_or_abort;
use std::fmt::Formatter;

/**
 * Integer kinds in the order of their conversion rank within the same width.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    Char,
    Short,
    Int,
    Long,
    LongLong,
    Int128,
    BitInt(u32),
}

#[rustfmt::skip]
#[derive(Debug, Clone, PartialEq)]
pub enum CType {
    Void,
    Bool,
    Int(IntKind, bool),
    Pointer(Box<QualifiedType>),
    Array(Box<QualifiedType>, Option<u64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedType {
    pub t: CType,
    pub qualifiers: Qualifiers,
}

bitflags! {
    pub struct Qualifiers: u32 {
        const CONST = 1 << 0;
        const VOLATILE = 1 << 1;
        const RESTRICT = 1 << 2;
        const ATOMIC = 1 << 3;
    }
}

pub const SCHAR_TYPE: CType = CType::Int(IntKind::Char, true);
pub const UCHAR_TYPE: CType = CType::Int(IntKind::Char, false);

pub const SHORT_TYPE: CType = SSHORT_TYPE;
pub const SSHORT_TYPE: CType = CType::Int(IntKind::Short, true);
pub const USHORT_TYPE: CType = CType::Int(IntKind::Short, false);

pub const INT_TYPE: CType = SINT_TYPE;
pub const SINT_TYPE: CType = CType::Int(IntKind::Int, true);
pub const UINT_TYPE: CType = CType::Int(IntKind::Int, false);

pub const LONG_TYPE: CType = SLONG_TYPE;
pub const SLONG_TYPE: CType = CType::Int(IntKind::Long, true);
pub const ULONG_TYPE: CType = CType::Int(IntKind::Long, false);

pub const LLONG_TYPE: CType = SLLONG_TYPE;
pub const SLLONG_TYPE: CType = CType::Int(IntKind::LongLong, true);
pub const ULLONG_TYPE: CType = CType::Int(IntKind::LongLong, false);

pub const INT128_TYPE: CType = CType::Int(IntKind::Int128, true);
pub const UINT128_TYPE: CType = CType::Int(IntKind::Int128, false);

pub fn char_type(m: &Machine) -> CType {
    CType::Int(IntKind::Char, m.char_signed)
}

pub fn std_int_type(kind: StdInt, signed: bool) -> CType {
    let kind = match kind {
        StdInt::Char => IntKind::Char,
        StdInt::Short => IntKind::Short,
        StdInt::Int => IntKind::Int,
        StdInt::Long => IntKind::Long,
        StdInt::LongLong => IntKind::LongLong,
    };
    CType::Int(kind, signed)
}

pub fn size_type(m: &Machine) -> CType {
    std_int_type(m.ptr_int_type(), false)
}

pub fn intmax_type(m: &Machine, signed: bool) -> CType {
    std_int_type(m.int64_type(), signed)
}

/**
 * `PTRDIFF_MAX`: no object may be larger.
 */
pub fn max_object_size(m: &Machine) -> u64 {
    (1u64 << (m.ptr_size as u32 * 8 - 1)) - 1
}

pub fn wchar_type(m: &Machine) -> CType {
    let (kind, signed) = m.wchar_type();
    std_int_type(kind, signed)
}

/**
 * `char16_t` is `uint_least16_t`, `char32_t` is `uint_least32_t`.
 */
pub fn char16_type(_m: &Machine) -> CType {
    USHORT_TYPE
}

pub fn char32_type(m: &Machine) -> CType {
    if m.int_size >= 4 {
        UINT_TYPE
    } else {
        ULONG_TYPE
    }
}

/**
 * Reduce `value` modulo 2^width into the range of a `width`-bit integer.
 */
pub fn wrap_to_width(value: &BigInt, width: u32, signed: bool) -> BigInt {
    let modulus = BigInt::one() << width as usize;
    let r = value.mod_floor(&modulus);
    if signed && r >= (BigInt::one() << (width - 1) as usize) {
        r - modulus
    } else {
        r
    }
}

impl IntKind {
    pub fn width(&self, m: &Machine) -> u32 {
        let size = match self {
            IntKind::Char => 1,
            IntKind::Short => m.short_size,
            IntKind::Int => m.int_size,
            IntKind::Long => m.long_size,
            IntKind::LongLong => m.llong_size,
            IntKind::Int128 => 16,
            IntKind::BitInt(n) => return *n,
        };
        size as u32 * machine::CHAR_BIT
    }

    fn rank_class(&self) -> u8 {
        match self {
            IntKind::BitInt(_) => 0,
            IntKind::Int128 => 1,
            IntKind::Char => 2,
            IntKind::Short => 3,
            IntKind::Int => 4,
            IntKind::Long => 5,
            IntKind::LongLong => 6,
        }
    }

    pub fn is_bit_precise(&self) -> bool {
        matches!(self, IntKind::BitInt(_))
    }
}

impl QualifiedType {
    pub fn new(t: CType) -> Self {
        Self {
            t,
            qualifiers: Qualifiers::empty(),
        }
    }

    /**
     * Checks if two types are the same type, ignoring top-level qualifiers when
     * `check_qualifiers` is false. Used by `_Generic` and typedef redefinition.
     */
    pub fn is_compatible_to(&self, other: &Self, check_qualifiers: bool) -> bool {
        if check_qualifiers && self.qualifiers != other.qualifiers {
            return false;
        }
        match (&self.t, &other.t) {
            (CType::Pointer(t1), CType::Pointer(t2)) => t1.is_compatible_to(t2, true),
            (CType::Array(t1, n1), CType::Array(t2, n2)) => {
                t1.is_compatible_to(t2, true) && (n1 == n2 || n1.is_none() || n2.is_none())
            }
            (t1, t2) => t1 == t2,
        }
    }

    pub fn wrap_pointer(&mut self, qualifiers: Qualifiers) {
        replace_with_or_abort(self, |self_| QualifiedType {
            t: CType::Pointer(Box::new(self_)),
            qualifiers,
        });
    }

    pub fn wrap_array(&mut self, size: Option<u64>) {
        replace_with_or_abort(self, |self_| QualifiedType {
            t: CType::Array(Box::new(self_), size),
            qualifiers: Qualifiers::empty(),
        });
    }

    /**
     * Drop qualifiers, as lvalue conversion does.
     */
    pub fn unqualified(&self) -> Self {
        Self::new(self.t.clone())
    }

    /**
     * Do the integer type promotion.
     */
    pub fn promote(self, m: &Machine) -> Self {
        Self {
            t: self.t.promote(m),
            ..self
        }
    }
}

impl CType {
    pub fn is_explicit_castable_to(&self, other: &Self) -> bool {
        if let CType::Void = other {
            return true;
        }
        (self.is_arithmetic() || self.is_pointer()) && (other.is_arithmetic() || other.is_pointer())
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer()
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, CType::Int(_, _) | CType::Bool)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            CType::Int(_, _) | CType::Bool | CType::Pointer(_) | CType::Array(_, _)
        )
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, CType::Pointer(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, CType::Void)
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, CType::Int(_, true))
    }

    pub fn is_bit_precise(&self) -> bool {
        matches!(self, CType::Int(IntKind::BitInt(_), _))
    }

    /**
     * Width in bits, including the sign bit. `_Bool` has width 1.
     */
    pub fn width(&self, m: &Machine) -> Option<u32> {
        match self {
            CType::Bool => Some(1),
            CType::Int(kind, _) => Some(kind.width(m)),
            CType::Pointer(_) => Some(m.ptr_size as u32 * machine::CHAR_BIT),
            _ => None,
        }
    }

    /**
     * Inclusive value range of an integer type, computed exactly.
     */
    pub fn int_range(&self, m: &Machine) -> Option<(BigInt, BigInt)> {
        match self {
            CType::Bool => Some((BigInt::zero(), BigInt::one())),
            CType::Int(kind, signed) => {
                let w = kind.width(m);
                Some(if *signed {
                    let half = BigInt::one() << (w - 1) as usize;
                    (-half.clone(), half - 1)
                } else {
                    (BigInt::zero(), (BigInt::one() << w as usize) - 1)
                })
            }
            CType::Pointer(_) => {
                let w = m.ptr_size as usize * 8;
                Some((BigInt::zero(), (BigInt::one() << w) - 1))
            }
            _ => None,
        }
    }

    pub fn min_value(&self, m: &Machine) -> Option<BigInt> {
        self.int_range(m).map(|(min, _)| min)
    }

    pub fn max_value(&self, m: &Machine) -> Option<BigInt> {
        self.int_range(m).map(|(_, max)| max)
    }

    pub fn fits(&self, value: &BigInt, m: &Machine) -> bool {
        match self.int_range(m) {
            Some((min, max)) => *value >= min && *value <= max,
            None => false,
        }
    }

    /**
     * Convert an exact value to this type: `_Bool` tests against zero, other integers wrap.
     */
    pub fn wrap(&self, value: &BigInt, m: &Machine) -> BigInt {
        match self {
            CType::Bool => {
                if value.is_zero() {
                    BigInt::zero()
                } else {
                    BigInt::one()
                }
            }
            CType::Int(kind, signed) => wrap_to_width(value, kind.width(m), *signed),
            CType::Pointer(_) => wrap_to_width(value, m.ptr_size as u32 * machine::CHAR_BIT, false),
            _ => value.clone(),
        }
    }

    /**
     * Integer conversion rank as (width, class). Standard types outrank the extended
     * `__int128`, which outranks bit-precise types of the same width.
     */
    pub fn rank(&self, m: &Machine) -> (u32, u8) {
        match self {
            CType::Bool => (0, 0),
            CType::Int(kind, _) => (kind.width(m), kind.rank_class()),
            _ => panic!("rank of a non-integer type"),
        }
    }

    /**
     * Do the integer type promotion. Bit-precise types are never promoted.
     */
    pub fn promote(self, m: &Machine) -> Self {
        match self {
            CType::Bool => INT_TYPE,
            CType::Int(kind @ (IntKind::Char | IntKind::Short), signed) => {
                if signed || kind.width(m) < IntKind::Int.width(m) {
                    INT_TYPE
                } else {
                    UINT_TYPE
                }
            }
            x => x,
        }
    }

    pub fn sizeof(&self, m: &Machine, span: Span, ec: &mut ErrorCollector) -> Result<u64, ()> {
        match self {
            CType::Void => {
                ec.record_error(CompileError::IncompleteType(self.to_string()), span)?;
                unreachable!()
            }
            CType::Bool => Ok(machine::BOOL_SIZE as u64),
            CType::Int(IntKind::BitInt(n), _) => Ok(m.bitint_size(*n) as u64),
            CType::Int(IntKind::Int128, _) => Ok(16),
            CType::Int(kind, _) => Ok((kind.width(m) / machine::CHAR_BIT) as u64),
            CType::Pointer(_) => Ok(m.ptr_size as u64),
            CType::Array(t, Some(n)) => {
                let size = t.t.sizeof(m, span, ec)?;
                match size.checked_mul(*n) {
                    Some(size) if size <= max_object_size(m) => Ok(size),
                    _ => {
                        ec.record_error(CompileError::ArrayTooLarge, span)?;
                        unreachable!()
                    }
                }
            }
            CType::Array(_, None) => {
                ec.record_error(CompileError::IncompleteType(self.to_string()), span)?;
                unreachable!()
            }
        }
    }

    pub fn alignof(&self, m: &Machine, span: Span, ec: &mut ErrorCollector) -> Result<u64, ()> {
        match self {
            CType::Void => {
                ec.record_error(CompileError::IncompleteType(self.to_string()), span)?;
                unreachable!()
            }
            CType::Bool => Ok(machine::BOOL_SIZE as u64),
            CType::Int(IntKind::BitInt(n), _) => Ok(m.bitint_align(*n) as u64),
            CType::Int(IntKind::Int128, _) => Ok(16),
            CType::Int(IntKind::Char, _) => Ok(1),
            CType::Int(IntKind::Short, _) => Ok(m.align_of(StdInt::Short) as u64),
            CType::Int(IntKind::Int, _) => Ok(m.align_of(StdInt::Int) as u64),
            CType::Int(IntKind::Long, _) => Ok(m.align_of(StdInt::Long) as u64),
            CType::Int(IntKind::LongLong, _) => Ok(m.align_of(StdInt::LongLong) as u64),
            CType::Pointer(_) => Ok(m.ptr_size as u64),
            CType::Array(t, _) => t.t.alignof(m, span, ec),
        }
    }

    /**
     * Find a common type for two promoted integer types. Use to perform usual arithmetic conversion.
     */
    pub fn least_common_int_type(&self, other: &Self, m: &Machine) -> Self {
        let (lhs_kind, lhs_sign) = match self {
            CType::Int(kind, sign) => (*kind, *sign),
            _ => panic!("this function must be used on integer types"),
        };
        let (rhs_kind, rhs_sign) = match other {
            CType::Int(kind, sign) => (*kind, *sign),
            _ => panic!("this function must be used on integer types"),
        };
        if self == other {
            // If both operands have the same type, then no further conversion is needed.
            self.clone()
        } else if lhs_sign == rhs_sign {
            // Otherwise, if both operands have signed integer types or both have unsigned integer types,
            // the operand with the type of lesser integer conversion rank is converted to the type
            // of the operand with greater rank.
            if self.rank(m) >= other.rank(m) {
                self.clone()
            } else {
                other.clone()
            }
        } else {
            let (signed_kind, unsigned_kind) = if lhs_sign {
                (lhs_kind, rhs_kind)
            } else {
                (rhs_kind, lhs_kind)
            };
            let signed_t = CType::Int(signed_kind, true);
            let unsigned_t = CType::Int(unsigned_kind, false);
            if unsigned_t.rank(m) >= signed_t.rank(m) {
                // Otherwise, if the operand that has unsigned integer type has rank greater or equal
                // to the rank of the type of the other operand, then the operand with signed integer type
                // is converted to the type of the operand with unsigned integer type.
                unsigned_t
            } else if signed_kind.width(m) > unsigned_kind.width(m) {
                // Otherwise, if the type of the operand with signed integer type can represent
                // all of the values of the type of the operand with unsigned integer type,
                // then the operand with unsigned integer type is converted to the type
                // of the operand with signed integer type.
                signed_t
            } else {
                // Otherwise, both operands are converted to the unsigned integer type
                // corresponding to the type of the operand with signed integer type.
                CType::Int(signed_kind, false)
            }
        }
    }
}

impl std::fmt::Display for CType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        use CType::*;
        match self {
            Void => f.write_str("void"),
            Bool => f.write_str("_Bool"),
            Int(IntKind::Char, true) => f.write_str("signed char"),
            Int(IntKind::Char, false) => f.write_str("unsigned char"),
            Int(IntKind::Short, true) => f.write_str("short"),
            Int(IntKind::Short, false) => f.write_str("unsigned short"),
            Int(IntKind::Int, true) => f.write_str("int"),
            Int(IntKind::Int, false) => f.write_str("unsigned int"),
            Int(IntKind::Long, true) => f.write_str("long"),
            Int(IntKind::Long, false) => f.write_str("unsigned long"),
            Int(IntKind::LongLong, true) => f.write_str("long long"),
            Int(IntKind::LongLong, false) => f.write_str("unsigned long long"),
            Int(IntKind::Int128, true) => f.write_str("__int128"),
            Int(IntKind::Int128, false) => f.write_str("unsigned __int128"),
            Int(IntKind::BitInt(n), true) => write!(f, "_BitInt({})", n),
            Int(IntKind::BitInt(n), false) => write!(f, "unsigned _BitInt({})", n),
            Pointer(inner) => write!(f, "{} *", inner),
            Array(inner, None) => write!(f, "{} []", inner),
            Array(inner, Some(n)) => write!(f, "{} [{}]", inner, n),
        }
    }
}

impl std::fmt::Display for QualifiedType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        if !self.qualifiers.is_empty() {
            write!(f, "{}{}", self.qualifiers, self.t)
        } else {
            write!(f, "{}", self.t)
        }
    }
}

impl std::fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        if self.contains(Qualifiers::CONST) {
            f.write_str("const ")?;
        }
        if self.contains(Qualifiers::VOLATILE) {
            f.write_str("volatile ")?;
        }
        if self.contains(Qualifiers::ATOMIC) {
            f.write_str("_Atomic ")?;
        }
        if self.contains(Qualifiers::RESTRICT) {
            f.write_str("restrict ")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::literal::parse_integer_literal;
    use crate::value::TypedValue;

    fn machine(triple: &str) -> Machine {
        Machine::from_triple(triple).unwrap()
    }

    #[test]
    fn test_int128_limits() {
        let m = machine("x86_64-linux");
        assert_eq!(INT128_TYPE.width(&m), Some(128));
        assert_eq!(
            INT128_TYPE.max_value(&m).unwrap().to_string(),
            "170141183460469231731687303715884105727"
        );
        assert_eq!(
            INT128_TYPE.min_value(&m).unwrap().to_string(),
            "-170141183460469231731687303715884105728"
        );
        assert_eq!(
            UINT128_TYPE.max_value(&m).unwrap().to_string(),
            "340282366920938463463374607431768211455"
        );
        assert_eq!(UINT128_TYPE.min_value(&m), Some(BigInt::zero()));
        let mut ec = ErrorCollector::new();
        assert_eq!(INT128_TYPE.sizeof(&m, Span::none(), &mut ec), Ok(16));
    }

    #[test]
    fn test_bitint_layout() {
        let mut ec = ErrorCollector::new();
        let span = Span::none();
        let x86_64 = machine("x86_64-linux");
        let sizeof = |bits: u32, m: &Machine, ec: &mut ErrorCollector| {
            CType::Int(IntKind::BitInt(bits), true).sizeof(m, span, ec).unwrap()
        };
        assert_eq!(sizeof(3, &x86_64, &mut ec), 1);
        assert_eq!(sizeof(17, &x86_64, &mut ec), 4);
        assert_eq!(sizeof(65, &x86_64, &mut ec), 16);
        assert_eq!(sizeof(129, &x86_64, &mut ec), 24);
        let i386 = machine("i386-linux");
        assert_eq!(sizeof(65, &i386, &mut ec), 12);
        let t = CType::Int(IntKind::BitInt(200), false);
        assert_eq!(t.alignof(&x86_64, span, &mut ec), Ok(8));
        assert_eq!(t.min_value(&x86_64), Some(BigInt::zero()));
        assert_eq!(t.max_value(&x86_64), Some((BigInt::one() << 200usize) - 1));
    }

    #[test]
    fn test_wrap() {
        let m = machine("x86_64-linux");
        let v = BigInt::from(-1);
        assert_eq!(UINT128_TYPE.wrap(&v, &m), UINT128_TYPE.max_value(&m).unwrap());
        let above = INT128_TYPE.max_value(&m).unwrap() + 1;
        assert_eq!(INT128_TYPE.wrap(&above, &m), INT128_TYPE.min_value(&m).unwrap());
        assert_eq!(CType::Bool.wrap(&BigInt::from(256), &m), BigInt::one());
        assert_eq!(wrap_to_width(&BigInt::from(4), 3, true), BigInt::from(-4));
    }

    #[test]
    fn test_conversions() {
        let m = machine("x86_64-linux");
        assert_eq!(CType::Bool.promote(&m), INT_TYPE);
        assert_eq!(USHORT_TYPE.promote(&m), INT_TYPE);
        let bit7 = CType::Int(IntKind::BitInt(7), true);
        assert_eq!(bit7.clone().promote(&m), bit7);

        assert_eq!(INT_TYPE.least_common_int_type(&ULONG_TYPE, &m), ULONG_TYPE);
        assert_eq!(UINT_TYPE.least_common_int_type(&LONG_TYPE, &m), LONG_TYPE);
        assert_eq!(LONG_TYPE.least_common_int_type(&ULLONG_TYPE, &m), ULLONG_TYPE);
        assert_eq!(INT128_TYPE.least_common_int_type(&ULONG_TYPE, &m), INT128_TYPE);
        let bit128 = CType::Int(IntKind::BitInt(128), true);
        assert_eq!(INT128_TYPE.least_common_int_type(&bit128, &m), INT128_TYPE);
        let ubit64 = CType::Int(IntKind::BitInt(64), false);
        assert_eq!(LONG_TYPE.least_common_int_type(&ubit64, &m), ULONG_TYPE);

        let avr = machine("avr");
        assert_eq!(UINT_TYPE.least_common_int_type(&LONG_TYPE, &avr), LONG_TYPE);
        assert_eq!(USHORT_TYPE.promote(&avr), UINT_TYPE);
    }

    #[test]
    fn test_bit_precise_limits_as_literals() {
        let m = machine("x86_64-linux");
        let widths = (1..=130).chain([255, 256, 257, 1000, 4096, 65534, machine::BITINT_MAXWIDTH]);
        for n in widths {
            for signed in [true, false] {
                if signed && n < 2 {
                    continue;
                }
                let t = CType::Int(IntKind::BitInt(n), signed);
                let max = t.max_value(&m).unwrap();
                let min = t.min_value(&m).unwrap();
                let suffix = if signed { "wb" } else { "uwb" };

                let lit = parse_integer_literal(&format!("{}{}", max, suffix), true).unwrap();
                assert_eq!(BigInt::from(lit.value.clone()), max, "maximum of {}", t);
                let (v, _) = TypedValue::new_from_int_literal(&lit, &m).unwrap();
                assert_eq!(v.t.t, t);

                let lit = parse_integer_literal(&min.magnitude().to_string(), true).unwrap();
                assert_eq!(&lit.value, min.magnitude(), "minimum of {}", t);
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(UINT128_TYPE.to_string(), "unsigned __int128");
        assert_eq!(CType::Int(IntKind::BitInt(12), true).to_string(), "_BitInt(12)");
        let mut t = QualifiedType::new(SCHAR_TYPE);
        t.qualifiers = Qualifiers::CONST;
        t.wrap_pointer(Qualifiers::empty());
        assert_eq!(t.to_string(), "const signed char *");
    }
}

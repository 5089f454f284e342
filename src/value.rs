use num::{BigInt, Signed};
use num_traits::{One, Zero};

use crate::{
    ctype::{self, CType, IntKind, QualifiedType, Qualifiers},
    error::{CompileError, CompileWarning},
    literal::{IntegerLiteral, IntegerSize},
    machine::{self, Machine},
    string::{CharLiteral, CharPrefix},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Int(BigInt),
}

/**
 * Represents a constant value with given type.
 *
 * Invariant: for int types, contents of the val fits into the type.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub t: QualifiedType,
    pub val: Value,
}

impl TypedValue {
    pub fn new_integer(value: BigInt, t: CType, m: &Machine) -> Self {
        Self {
            t: QualifiedType {
                t,
                qualifiers: Qualifiers::CONST,
            },
            val: Value::Int(value),
        }
        .clamp_to_type(m)
    }

    /**
     * Construct an integer constant according to 6.4.4.1.
     *
     * When no standard type can hold the value, 128-bit targets fall back to `__int128`;
     * that fallback is reported through the returned warning.
     */
    pub fn new_from_int_literal(
        lit: &IntegerLiteral,
        m: &Machine,
    ) -> Result<(Self, Option<CompileWarning>), CompileError> {
        use IntKind::*;
        let value = BigInt::from(lit.value.clone());
        let unsigned = lit.suffix.unsigned;
        let decimal = lit.is_decimal();

        if lit.suffix.size == IntegerSize::BitPrecise {
            let bits = lit.value.bits() as u32;
            let width = if unsigned {
                bits.max(1)
            } else {
                (bits + 1).max(2)
            };
            if width > machine::BITINT_MAXWIDTH {
                return Err(CompileError::BitIntLiteralTooWide(width));
            }
            return Ok((
                Self::new_integer(value, CType::Int(BitInt(width), !unsigned), m),
                None,
            ));
        }

        let candidates: &[(IntKind, bool)] = match (lit.suffix.size, unsigned, decimal) {
            (IntegerSize::Int, false, true) => &[(Int, true), (Long, true), (LongLong, true)],
            (IntegerSize::Int, false, false) => &[
                (Int, true),
                (Int, false),
                (Long, true),
                (Long, false),
                (LongLong, true),
                (LongLong, false),
            ],
            (IntegerSize::Int, true, _) => &[(Int, false), (Long, false), (LongLong, false)],
            (IntegerSize::Long, false, true) => &[(Long, true), (LongLong, true)],
            (IntegerSize::Long, false, false) => &[
                (Long, true),
                (Long, false),
                (LongLong, true),
                (LongLong, false),
            ],
            (IntegerSize::Long, true, _) => &[(Long, false), (LongLong, false)],
            (IntegerSize::LongLong, false, true) => &[(LongLong, true)],
            (IntegerSize::LongLong, false, false) => &[(LongLong, true), (LongLong, false)],
            (IntegerSize::LongLong, true, _) => &[(LongLong, false)],
            (IntegerSize::BitPrecise, _, _) => unreachable!(),
        };
        for (kind, signed) in candidates {
            let t = CType::Int(*kind, *signed);
            if t.fits(&value, m) {
                return Ok((Self::new_integer(value, t, m), None));
            }
        }

        if m.int128 {
            let extended: &[(IntKind, bool)] = if unsigned {
                &[(Int128, false)]
            } else if decimal {
                &[(Int128, true)]
            } else {
                &[(Int128, true), (Int128, false)]
            };
            for (kind, signed) in extended {
                let t = CType::Int(*kind, *signed);
                if t.fits(&value, m) {
                    let warning = CompileWarning::ExtendedLiteral(t.to_string());
                    return Ok((Self::new_integer(value, t, m), Some(warning)));
                }
            }
        }

        if decimal && !unsigned {
            let widest = if m.int128 {
                ctype::UINT128_TYPE
            } else {
                ctype::ULLONG_TYPE
            };
            if widest.fits(&value, m) {
                return Ok((
                    Self::new_integer(value, widest, m),
                    Some(CompileWarning::ImplicitlyUnsignedLiteral),
                ));
            }
        }

        Err(CompileError::LiteralTooLarge)
    }

    /**
     * Construct a character constant according to 6.4.4.5. Plain multi-character constants
     * pack the characters big-endian into an `int`.
     */
    pub fn new_from_char_literal(lit: &CharLiteral, m: &Machine) -> (Self, Option<CompileWarning>) {
        let t = match lit.prefix {
            CharPrefix::None => ctype::INT_TYPE,
            CharPrefix::Utf8 => ctype::UCHAR_TYPE,
            CharPrefix::Char16 => ctype::char16_type(m),
            CharPrefix::Char32 => ctype::char32_type(m),
            CharPrefix::Wide => ctype::wchar_type(m),
        };
        if lit.prefix == CharPrefix::None {
            if lit.chars.len() == 1 {
                // the value is that of a plain `char` converted to `int`
                let c = BigInt::from(lit.chars[0]);
                let as_char = ctype::char_type(m).wrap(&c, m);
                return (Self::new_integer(as_char, t, m), None);
            }
            let mut v = BigInt::zero();
            for c in &lit.chars {
                v = (v << 8usize) + BigInt::from(*c & 0xff);
            }
            return (Self::new_integer(v, t, m), Some(CompileWarning::Multichar));
        }
        let last = lit.chars.last().copied().unwrap_or(0);
        let warning = if lit.chars.len() > 1 {
            Some(CompileWarning::Multichar)
        } else {
            None
        };
        (Self::new_integer(BigInt::from(last), t, m), warning)
    }

    /**
     * Do the integer type promotion.
     */
    pub fn promote(self, m: &Machine) -> Self {
        Self {
            t: self.t.promote(m),
            ..self
        }
        .clamp_to_type(m)
    }

    /**
     * Perform usual arithmetic conversions according to 6.3.1.8
     */
    pub fn usual_arithmetic_convert(lhs: Self, rhs: Self, m: &Machine) -> (Self, Self) {
        // Otherwise, the integer promotions are performed on both operands.
        let lhs = lhs.promote(m);
        let rhs = rhs.promote(m);
        // Then the following rules are applied to the promoted operands
        let common_type = lhs.t.t.least_common_int_type(&rhs.t.t, m);
        (lhs.cast_to(&common_type, m), rhs.cast_to(&common_type, m))
    }

    /**
     * Convert to `new_type`, keeping qualifiers.
     */
    pub fn cast_to(self, new_type: &CType, m: &Machine) -> Self {
        Self {
            t: QualifiedType {
                t: new_type.clone(),
                ..self.t
            },
            ..self
        }
        .clamp_to_type(m)
    }

    /**
     * Drop extra bits which don't fit into the target type (ensure the TypedValue invariant).
     */
    pub fn clamp_to_type(self, m: &Machine) -> Self {
        match self.val {
            Value::Int(ref x) => {
                let clamped = self.t.t.wrap(x, m);
                Self {
                    val: Value::Int(clamped),
                    ..self
                }
            }
            _ => self,
        }
    }

    pub fn unwrap_integer(&self) -> &BigInt {
        if let Value::Int(x) = &self.val {
            x
        } else {
            panic!("not an integer")
        }
    }

    pub fn is_zero(&self) -> bool {
        match &self.val {
            Value::Int(x) => x.is_zero(),
            // the address of an array
            Value::Void => false,
        }
    }

    pub fn is_negative(&self) -> bool {
        match &self.val {
            Value::Int(x) => x.is_negative(),
            Value::Void => false,
        }
    }

    pub fn negate(self, m: &Machine) -> Self {
        let negated = match self.val {
            Value::Int(ref x) => Self {
                val: Value::Int(-x),
                ..self
            },
            _ => panic!("negation of a non-integer"),
        };
        negated.clamp_to_type(m)
    }

    pub fn complement(self, m: &Machine) -> Self {
        let comp = match self.val {
            Value::Int(ref x) => Self {
                val: Value::Int(!x),
                ..self
            },
            _ => panic!("complement of a non-integer"),
        };
        comp.clamp_to_type(m)
    }

    pub fn boolean_not(self, m: &Machine) -> Self {
        let r = if self.is_zero() {
            BigInt::one()
        } else {
            BigInt::zero()
        };
        Self::new_integer(r, ctype::INT_TYPE, m)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::literal::parse_integer_literal;
    use pretty_assertions::assert_eq;

    fn lit(text: &str) -> (TypedValue, Option<CompileWarning>) {
        let m = Machine::default();
        TypedValue::new_from_int_literal(&parse_integer_literal(text, true).unwrap(), &m).unwrap()
    }

    #[test]
    fn test_standard_literal_types() {
        assert_eq!(lit("1").0.t.t, ctype::INT_TYPE);
        assert_eq!(lit("2147483648").0.t.t, ctype::LONG_TYPE);
        assert_eq!(lit("0x80000000").0.t.t, ctype::UINT_TYPE);
        assert_eq!(lit("1u").0.t.t, ctype::UINT_TYPE);
        assert_eq!(lit("1ll").0.t.t, ctype::LLONG_TYPE);
        assert_eq!(lit("0xffffffffffffffff").0.t.t, ctype::ULONG_TYPE);
    }

    #[test]
    fn test_bit_precise_literal_types() {
        assert_eq!(lit("0wb").0.t.t, CType::Int(IntKind::BitInt(2), true));
        assert_eq!(lit("1wb").0.t.t, CType::Int(IntKind::BitInt(2), true));
        assert_eq!(lit("0uwb").0.t.t, CType::Int(IntKind::BitInt(1), false));
        assert_eq!(lit("255uwb").0.t.t, CType::Int(IntKind::BitInt(8), false));
        assert_eq!(lit("255wb").0.t.t, CType::Int(IntKind::BitInt(9), true));
        assert_eq!(
            lit("170141183460469231731687303715884105727WB").0.t.t,
            CType::Int(IntKind::BitInt(128), true)
        );
        assert_eq!(
            lit("170141183460469231731687303715884105728WB").0.t.t,
            CType::Int(IntKind::BitInt(129), true)
        );
        assert_eq!(
            lit("340282366920938463463374607431768211455WBU").0.t.t,
            CType::Int(IntKind::BitInt(128), false)
        );
    }

    #[test]
    fn test_extended_literals() {
        let (v, w) = lit("18446744073709551616");
        assert_eq!(v.t.t, ctype::INT128_TYPE);
        assert_eq!(w, Some(CompileWarning::ExtendedLiteral("__int128".to_string())));

        let (v, w) = lit("0xffffffffffffffffffffffffffffffff");
        assert_eq!(v.t.t, ctype::UINT128_TYPE);
        assert!(w.is_some());

        let (v, w) = lit("340282366920938463463374607431768211455");
        assert_eq!(v.t.t, ctype::UINT128_TYPE);
        assert_eq!(w, Some(CompileWarning::ImplicitlyUnsignedLiteral));
        assert_eq!(v.unwrap_integer().to_string(), "340282366920938463463374607431768211455");
    }

    #[test]
    fn test_too_large() {
        let m = Machine::default();
        let l = parse_integer_literal("340282366920938463463374607431768211456", false).unwrap();
        assert_eq!(
            TypedValue::new_from_int_literal(&l, &m),
            Err(CompileError::LiteralTooLarge)
        );

        let m = Machine::from_triple("i686-linux").unwrap();
        let l = parse_integer_literal("18446744073709551616", false).unwrap();
        assert_eq!(
            TypedValue::new_from_int_literal(&l, &m),
            Err(CompileError::LiteralTooLarge)
        );
    }

    #[test]
    fn test_usual_conversions() {
        let m = Machine::default();
        let a = TypedValue::new_integer(BigInt::from(-1), ctype::INT_TYPE, &m);
        let b = TypedValue::new_integer(BigInt::from(0), ctype::UINT_TYPE, &m);
        let (a, b) = TypedValue::usual_arithmetic_convert(a, b, &m);
        assert_eq!(a.t.t, ctype::UINT_TYPE);
        assert_eq!(b.t.t, ctype::UINT_TYPE);
        assert_eq!(*a.unwrap_integer(), BigInt::from(u32::MAX));

        // long can hold every unsigned int on LP64
        let a = TypedValue::new_integer(BigInt::from(-1), ctype::LONG_TYPE, &m);
        let b = TypedValue::new_integer(BigInt::from(1), ctype::UINT_TYPE, &m);
        let (a, _) = TypedValue::usual_arithmetic_convert(a, b, &m);
        assert_eq!(a.t.t, ctype::LONG_TYPE);
        assert_eq!(*a.unwrap_integer(), BigInt::from(-1));
    }

    #[test]
    fn test_bit_precise_conversions() {
        let m = Machine::default();
        // _BitInt(129) outranks __int128
        let a = TypedValue::new_integer(BigInt::from(i128::MIN), ctype::INT128_TYPE, &m);
        let b = TypedValue::new_integer(BigInt::from(0), CType::Int(IntKind::BitInt(129), true), &m);
        let (a, b) = TypedValue::usual_arithmetic_convert(a, b, &m);
        assert_eq!(a.t.t, CType::Int(IntKind::BitInt(129), true));
        assert_eq!(b.t.t, a.t.t);
        assert_eq!(*a.unwrap_integer(), BigInt::from(i128::MIN));

        // __int128 outranks _BitInt(128)
        let a = TypedValue::new_integer(BigInt::from(1), ctype::UINT128_TYPE, &m);
        let b = TypedValue::new_integer(BigInt::from(1), CType::Int(IntKind::BitInt(128), false), &m);
        let (a, _) = TypedValue::usual_arithmetic_convert(a, b, &m);
        assert_eq!(a.t.t, ctype::UINT128_TYPE);

        // bit-precise types are not promoted
        let c = TypedValue::new_integer(BigInt::from(3), CType::Int(IntKind::BitInt(3), true), &m);
        assert_eq!(c.promote(&m).t.t, CType::Int(IntKind::BitInt(3), true));
    }

    #[test]
    fn test_wrapping() {
        let m = Machine::default();
        let v = TypedValue::new_integer(BigInt::from(u128::MAX), ctype::INT128_TYPE, &m);
        assert_eq!(*v.unwrap_integer(), BigInt::from(-1));
        let v = TypedValue::new_integer(BigInt::from(i128::MIN), ctype::INT128_TYPE, &m).negate(&m);
        assert_eq!(*v.unwrap_integer(), BigInt::from(i128::MIN));
        let v = TypedValue::new_integer(BigInt::from(0), ctype::UINT128_TYPE, &m).complement(&m);
        assert_eq!(*v.unwrap_integer(), BigInt::from(u128::MAX));
        let v = TypedValue::new_integer(BigInt::from(5), CType::Bool, &m);
        assert_eq!(*v.unwrap_integer(), BigInt::from(1));
    }

    #[test]
    fn test_char_literals() {
        use crate::string::parse_char_literal;
        let m = Machine::default();
        let (v, w) = TypedValue::new_from_char_literal(&parse_char_literal("'\\xff'").unwrap(), &m);
        assert_eq!(v.t.t, ctype::INT_TYPE);
        assert_eq!(*v.unwrap_integer(), BigInt::from(-1));
        assert!(w.is_none());

        let m = Machine::from_triple("aarch64-linux").unwrap();
        let (v, _) = TypedValue::new_from_char_literal(&parse_char_literal("'\\xff'").unwrap(), &m);
        assert_eq!(*v.unwrap_integer(), BigInt::from(255));

        let (v, w) = TypedValue::new_from_char_literal(&parse_char_literal("'ab'").unwrap(), &m);
        assert_eq!(*v.unwrap_integer(), BigInt::from(0x6162));
        assert_eq!(w, Some(CompileWarning::Multichar));

        let (v, _) = TypedValue::new_from_char_literal(&parse_char_literal("U'x'").unwrap(), &m);
        assert_eq!(v.t.t, ctype::UINT_TYPE);
    }
}

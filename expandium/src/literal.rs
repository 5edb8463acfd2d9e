//! Numeric literal parsing for constant expressions.

use num_bigint::BigInt;
use num_traits::Zero;

/// Radix a literal was written in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Base {
    /// No prefix
    Decimal,
    /// Leading `0`
    Octal,
    /// `0x` prefix
    Hexadecimal,
    /// `0b` prefix
    Binary,
}

impl Base {
    const fn radix(self) -> u32 {
        match self {
            Base::Decimal => 10,
            Base::Octal => 8,
            Base::Hexadecimal => 16,
            Base::Binary => 2,
        }
    }
}

/// Width requested by an integer suffix
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegerWidth {
    /// No `l` suffix
    #[default]
    Int,
    /// `l` / `L`
    Long,
    /// `ll` / `LL`
    LongLong,
}

/// Width of a floating literal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloatWidth {
    /// `f` / `F` suffix
    Single,
    /// No suffix
    Double,
    /// `l` / `L` suffix
    Extended,
}

/// A parsed numeric literal
///
/// Integer literals keep their value in `integral`. Floating literals also
/// carry a decimal fraction (`fraction / fraction_scale`) and an exponent,
/// but the preprocessor only needs to know that they are floating.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Literal {
    /// Leading `-`
    pub negative: bool,
    /// Radix of the integral part
    pub base: Base,
    /// Integral digits
    pub integral: BigInt,
    /// Fraction digits as an integer
    pub fraction: BigInt,
    /// Power of ten dividing `fraction`; zero when there is no fraction
    pub fraction_scale: BigInt,
    /// Exponent magnitude
    pub exponent: BigInt,
    /// Exponent sign
    pub exponent_negative: bool,
    /// `u` / `U` suffix
    pub unsigned: bool,
    /// Integer width suffix
    pub width: IntegerWidth,
    /// Set for floating literals
    pub float: Option<FloatWidth>,
}

impl Literal {
    fn empty() -> Self {
        Self {
            negative: false,
            base: Base::Decimal,
            integral: BigInt::zero(),
            fraction: BigInt::zero(),
            fraction_scale: BigInt::zero(),
            exponent: BigInt::zero(),
            exponent_negative: false,
            unsigned: false,
            width: IntegerWidth::Int,
            float: None,
        }
    }

    /// Parse a numeric literal
    ///
    /// Returns `None` when `text` does not start with a number. Characters
    /// after a recognized literal and its suffix are ignored.
    #[must_use]
    pub fn parse(text: &str) -> Option<Literal> {
        let bytes = text.as_bytes();
        let mut lit = Literal::empty();
        let mut i = 0;

        if bytes.first() == Some(&b'-') {
            lit.negative = true;
            i = 1;
        }
        if !bytes.get(i).is_some_and(|b| b.is_ascii_digit() || *b == b'.') {
            return None;
        }

        if bytes[i] == b'0' && !text.contains('.') {
            i += 1;
            match bytes.get(i) {
                Some(b'x' | b'X') => {
                    lit.base = Base::Hexadecimal;
                    i = digits(bytes, i + 1, Base::Hexadecimal, &mut lit.integral).0;
                    if matches!(bytes.get(i), Some(b'p' | b'P')) {
                        return Some(lit.finish_float(bytes, i));
                    }
                }
                Some(b'b' | b'B') => {
                    lit.base = Base::Binary;
                    i = digits(bytes, i + 1, Base::Binary, &mut lit.integral).0;
                }
                Some(_) => {
                    lit.base = Base::Octal;
                    i = digits(bytes, i, Base::Octal, &mut lit.integral).0;
                    if matches!(bytes.get(i), Some(b'e' | b'E')) {
                        return Some(lit.finish_float(bytes, i));
                    }
                }
                None => return Some(lit),
            }
            lit.integer_suffix(bytes, i);
            return Some(lit);
        }

        let (end, integral_digits) = digits(bytes, i, Base::Decimal, &mut lit.integral);
        i = end;
        let mut fraction_digits = 0;
        let mut floating = false;
        if bytes.get(i) == Some(&b'.') {
            floating = true;
            lit.fraction_scale = BigInt::from(1);
            let (end, count) = digits(bytes, i + 1, Base::Decimal, &mut lit.fraction);
            for _ in 0..count {
                lit.fraction_scale *= 10;
            }
            fraction_digits = count;
            i = end;
        }
        if integral_digits == 0 && fraction_digits == 0 {
            return None;
        }
        if floating || matches!(bytes.get(i), Some(b'e' | b'E' | b'f' | b'F')) {
            return Some(lit.finish_float(bytes, i));
        }
        lit.integer_suffix(bytes, i);
        Some(lit)
    }

    /// Check if this is a floating literal
    #[must_use]
    pub fn is_floating(&self) -> bool {
        self.float.is_some()
    }

    /// Signed integral value
    #[must_use]
    pub fn value(&self) -> BigInt {
        if self.negative {
            -self.integral.clone()
        } else {
            self.integral.clone()
        }
    }

    fn finish_float(mut self, bytes: &[u8], mut i: usize) -> Self {
        if matches!(bytes.get(i), Some(b'e' | b'E' | b'p' | b'P')) {
            let mut j = i + 1;
            let negative = match bytes.get(j) {
                Some(b'-') => {
                    j += 1;
                    true
                }
                Some(b'+') => {
                    j += 1;
                    false
                }
                _ => false,
            };
            let mut exponent = BigInt::zero();
            let (end, count) = digits(bytes, j, Base::Decimal, &mut exponent);
            if count > 0 {
                self.exponent = exponent;
                self.exponent_negative = negative;
                i = end;
            }
        }
        self.float = Some(match bytes.get(i) {
            Some(b'f' | b'F') => FloatWidth::Single,
            Some(b'l' | b'L') => FloatWidth::Extended,
            _ => FloatWidth::Double,
        });
        self
    }

    fn integer_suffix(&mut self, bytes: &[u8], mut i: usize) {
        let is_unsigned = |b: Option<&u8>| matches!(b, Some(b'u' | b'U'));
        let is_long = |b: Option<&u8>| matches!(b, Some(b'l' | b'L'));

        if is_unsigned(bytes.get(i)) {
            self.unsigned = true;
            i += 1;
        }
        if is_long(bytes.get(i)) {
            self.width = IntegerWidth::Long;
            i += 1;
            if is_long(bytes.get(i)) {
                self.width = IntegerWidth::LongLong;
                i += 1;
            }
            if !self.unsigned && is_unsigned(bytes.get(i)) {
                self.unsigned = true;
            }
        }
    }
}

/// Accumulate digits of `base` starting at `start` into `value`
///
/// Returns the index after the last digit and the number of digits read.
fn digits(bytes: &[u8], start: usize, base: Base, value: &mut BigInt) -> (usize, usize) {
    let radix = base.radix();
    let mut i = start;
    while let Some(d) = bytes.get(i).and_then(|b| char::from(*b).to_digit(radix)) {
        *value *= radix;
        *value += d;
        i += 1;
    }
    (i, i - start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn int(text: &str) -> BigInt {
        let lit = Literal::parse(text).unwrap();
        assert!(!lit.is_floating(), "{text} parsed as floating");
        lit.value()
    }

    #[test]
    fn integer_bases() {
        assert_eq!(int("42"), BigInt::from(42));
        assert_eq!(int("0"), BigInt::from(0));
        assert_eq!(int("0755"), BigInt::from(0o755));
        assert_eq!(int("0x1F"), BigInt::from(31));
        assert_eq!(int("0XfF"), BigInt::from(255));
        assert_eq!(int("0b101"), BigInt::from(5));
        assert_eq!(int("-17"), BigInt::from(-17));
        assert_eq!(Literal::parse("010").unwrap().base, Base::Octal);
    }

    #[test]
    fn integer_suffixes() {
        let lit = Literal::parse("10UL").unwrap();
        assert!(lit.unsigned);
        assert_eq!(lit.width, IntegerWidth::Long);

        let lit = Literal::parse("0x10llu").unwrap();
        assert!(lit.unsigned);
        assert_eq!(lit.width, IntegerWidth::LongLong);

        let lit = Literal::parse("7u").unwrap();
        assert!(lit.unsigned);
        assert_eq!(lit.width, IntegerWidth::Int);
    }

    #[test]
    fn unknown_trailing_characters_are_ignored() {
        assert_eq!(int("12abc"), BigInt::from(12));
        assert_eq!(int("3u_x"), BigInt::from(3));
    }

    #[test]
    fn big_values_do_not_overflow() {
        let big = "123456789012345678901234567890";
        assert_eq!(int(big).to_string(), big);
    }

    #[test]
    fn floating_forms() {
        let lit = Literal::parse("1.25").unwrap();
        assert_eq!(lit.float, Some(FloatWidth::Double));
        assert_eq!(lit.integral, BigInt::from(1));
        assert_eq!(lit.fraction, BigInt::from(25));
        assert_eq!(lit.fraction_scale, BigInt::from(100));

        assert_eq!(Literal::parse("2.0f").unwrap().float, Some(FloatWidth::Single));
        assert_eq!(Literal::parse(".5L").unwrap().float, Some(FloatWidth::Extended));
        assert_eq!(Literal::parse("3f").unwrap().float, Some(FloatWidth::Single));

        let lit = Literal::parse("1.5e-3").unwrap();
        assert!(lit.exponent_negative);
        assert_eq!(lit.exponent, BigInt::from(3));

        let lit = Literal::parse("1e10").unwrap();
        assert!(lit.is_floating());
        assert_eq!(lit.exponent, BigInt::from(10));

        let lit = Literal::parse("0x1p4").unwrap();
        assert!(lit.is_floating());
        assert_eq!(lit.base, Base::Hexadecimal);
        assert_eq!(lit.exponent, BigInt::from(4));
    }

    #[test]
    fn non_numbers() {
        assert!(Literal::parse("abc").is_none());
        assert!(Literal::parse("").is_none());
        assert!(Literal::parse("-").is_none());
        assert!(Literal::parse(".").is_none());
        assert!(Literal::parse("\"1\"").is_none());
    }

    proptest! {
        #[test]
        fn decimal_values_parse_back(n in 1u64..) {
            let lit = Literal::parse(&n.to_string()).unwrap();
            prop_assert_eq!(lit.value(), BigInt::from(n));
            prop_assert_eq!(lit.base, Base::Decimal);
            prop_assert!(!lit.unsigned);
            prop_assert_eq!(lit.width, IntegerWidth::Int);
            prop_assert!(lit.float.is_none());
        }

        #[test]
        fn hexadecimal_values_parse_back(n in any::<u64>()) {
            prop_assert_eq!(int(&format!("0x{n:x}")), BigInt::from(n));
        }
    }
}

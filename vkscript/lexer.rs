// vkscript
//
// Copyright (C) 2018 Intel Corporation
// Copyright 2023 Neil Roberts
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice (including the next
// paragraph) shall be included in all copies or substantial portions of the
// Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.  IN NO EVENT SHALL
// THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Helpers to pick apart the words and numbers of a script line.
//!
//! The number scanners behave like `strtol` and `strtod` in that they
//! skip leading spaces and tabs, consume as much of the string as
//! looks like a number and return the rest of the string alongside
//! the value so that the caller can carry on parsing.

use half::f16;
use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum NumError {
    /// The negative sign was used on an unsigned type
    #[error("Number can’t be negated")]
    Negative,
    /// A number that would fit in the unsigned type overflows the
    /// signed type
    #[error("Number out of range for type")]
    SignedOverflow,
    #[error(transparent)]
    Int(#[from] ParseIntError),
    #[error(transparent)]
    Float(#[from] ParseFloatError),
}

/// Like `str::strip_prefix` except that leading whitespace is skipped
/// first and the prefix must be followed by whitespace or the end of
/// the string. Any whitespace after the word is left in the tail.
pub fn strip_word_prefix<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let tail = s.trim_start().strip_prefix(prefix)?;

    match tail.chars().next() {
        None => Some(tail),
        Some(ch) if ch.is_whitespace() => Some(tail),
        Some(_) => None,
    }
}

/// Strips each word of `prefix` in turn with [strip_word_prefix] so
/// that any amount of whitespace can separate the words.
pub fn strip_words_prefix<'a>(mut s: &'a str, prefix: &str) -> Option<&'a str> {
    for word in prefix.split_whitespace() {
        s = strip_word_prefix(s, word)?;
    }

    Some(s)
}

/// Returns the next whitespace-delimited word and the rest of the
/// string after it.
pub fn next_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let word = s.split_whitespace().next()?;

    Some((word, &s[word.len()..]))
}

/// Removes a `#` comment and surrounding whitespace. Returns `None`
/// if nothing is left.
pub fn trim_line_or_skip(line: &str) -> Option<&str> {
    let line = match line.split_once('#') {
        Some((before, _comment)) => before,
        None => line,
    }.trim();

    if line.is_empty() {
        None
    } else {
        Some(line)
    }
}

// Only spaces and tabs are skipped so that a number can’t swallow the
// end of the line
fn skip_blanks(s: &str) -> &str {
    s.trim_start_matches([' ', '\t'])
}

struct IntParts<'a> {
    negative: bool,
    radix: u32,
    digits: &'a str,
    tail: &'a str,
}

fn split_int(s: &str) -> IntParts {
    let s = skip_blanks(s);

    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, s) = if let Some(hex) = s.strip_prefix("0x") {
        (16, hex)
    } else if s.len() > 1
        && s.starts_with('0')
        && s.as_bytes()[1].is_ascii_digit()
    {
        (8, &s[1..])
    } else {
        (10, s)
    };

    let split_point = s
        .bytes()
        .take_while(|&b| (b as char).is_digit(radix))
        .count();

    IntParts {
        negative,
        radix,
        digits: &s[..split_point],
        tail: &s[split_point..],
    }
}

/// A type that can be scanned from the start of a string.
pub trait Scan: Sized {
    fn scan(s: &str) -> Result<(Self, &str), NumError>;
}

macro_rules! scan_unsigned {
    ($t:ty) => {
        impl Scan for $t {
            fn scan(s: &str) -> Result<($t, &str), NumError> {
                let parts = split_int(s);
                let num = <$t>::from_str_radix(parts.digits, parts.radix)?;

                if parts.negative {
                    Err(NumError::Negative)
                } else {
                    Ok((num, parts.tail))
                }
            }
        }
    };
}

macro_rules! scan_signed {
    ($st:ty, $ut:ty) => {
        impl Scan for $st {
            fn scan(s: &str) -> Result<($st, &str), NumError> {
                let parts = split_int(s);
                let num = <$ut>::from_str_radix(parts.digits, parts.radix)?;

                if parts.negative {
                    // The magnitude of MIN doesn’t fit in the signed
                    // type so negate in the unsigned type instead
                    if num > <$st>::MAX as $ut + 1 {
                        Err(NumError::SignedOverflow)
                    } else {
                        Ok((num.wrapping_neg() as $st, parts.tail))
                    }
                } else if num > <$st>::MAX as $ut {
                    Err(NumError::SignedOverflow)
                } else {
                    Ok((num as $st, parts.tail))
                }
            }
        }
    };
}

scan_unsigned!(u8);
scan_unsigned!(u16);
scan_unsigned!(u32);
scan_unsigned!(u64);
scan_signed!(i8, u8);
scan_signed!(i16, u16);
scan_signed!(i32, u32);
scan_signed!(i64, u64);

fn starts_with_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.len() >= needle.len()
        && haystack.as_bytes()[..needle.len()]
        .eq_ignore_ascii_case(needle.as_bytes())
}

fn count_digits(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

// Length of the mantissa part of a decimal float, which needs digits
// on at least one side of the optional point
fn count_mantissa(s: &str) -> Option<usize> {
    let before = count_digits(s);
    let (n_points, after) = match s[before..].strip_prefix('.') {
        Some(tail) => (1, count_digits(tail)),
        None => (0, 0),
    };

    (before > 0 || after > 0).then_some(before + n_points + after)
}

fn count_exponent(s: &str) -> Option<usize> {
    let tail = s.strip_prefix(['e', 'E'])?;
    let sign = matches!(tail.as_bytes().first(), Some(b'+' | b'-')) as usize;
    let digits = count_digits(&tail[sign..]);

    (digits > 0).then_some(1 + sign + digits)
}

// Rust’s float parsing has no equivalent of the `endptr` argument of
// `strtod` so this finds where the float ends. A `0x` prefix means the
// digits are the exact bit pattern of the value.
fn split_float(s: &str) -> (&str, &str) {
    let s = skip_blanks(s);

    let split_point = if let Some(hex) = s.strip_prefix("0x") {
        2 + hex.bytes().take_while(u8::is_ascii_hexdigit).count()
    } else {
        let sign = matches!(s.as_bytes().first(), Some(b'+' | b'-')) as usize;
        let rest = &s[sign..];

        let len = if let Some(word) = ["infinity", "inf", "nan"]
            .into_iter()
            .find(|word| starts_with_ignore_case(rest, word))
        {
            word.len()
        } else if let Some(len) = count_mantissa(rest) {
            len + count_exponent(&rest[len..]).unwrap_or(0)
        } else {
            0
        };

        sign + len
    };

    s.split_at(split_point)
}

macro_rules! scan_float {
    ($t:ty, $bits:ty, $from_bits:expr, $from_str:expr) => {
        impl Scan for $t {
            fn scan(s: &str) -> Result<($t, &str), NumError> {
                let (num, tail) = split_float(s);

                let value = match num.strip_prefix("0x") {
                    Some(hex) => $from_bits(<$bits>::from_str_radix(hex, 16)?),
                    None => $from_str(num)?,
                };

                Ok((value, tail))
            }
        }
    };
}

scan_float!(f32, u32, f32::from_bits, str::parse::<f32>);
scan_float!(f64, u64, f64::from_bits, str::parse::<f64>);
scan_float!(
    f16,
    u16,
    f16::from_bits,
    |s: &str| s.parse::<f32>().map(f16::from_f32)
);

/// Scans a value of any [Scan] type from the start of `s`.
pub fn scan<T: Scan>(s: &str) -> Result<(T, &str), NumError> {
    T::scan(s)
}

/// Scans exactly `N` values in a row.
pub fn scan_array<T: Scan + Copy + Default, const N: usize>(
    mut s: &str,
) -> Result<([T; N], &str), NumError> {
    let mut values = [T::default(); N];

    for value in values.iter_mut() {
        let (v, tail) = T::scan(s)?;
        *value = v;
        s = tail;
    }

    Ok((values, s))
}

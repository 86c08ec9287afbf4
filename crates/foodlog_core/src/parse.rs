//! Numeral/unit parser for free-text meal descriptions.
//!
//! # Responsibility
//! - Decompose a comma-delimited description into ordered
//!   `(name, quantity, unit)` mentions.
//! - Reduce mixed-numeral quantity prefixes (ASCII digits and CJK numerals)
//!   to a single number.
//!
//! # Invariants
//! - Output order matches left-to-right input order.
//! - A segment without a recognizable unit token is an error, never a silent
//!   default; downstream normalization depends on the unit.
//! - Parsing is pure: no I/O, no shared state.

use crate::model::food::ParsedMention;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,，、和及与\s]+").expect("valid separator regex"));

/// Unit vocabulary, longest token first so `千克` wins over `克` and `kg`
/// over `g`.
const UNIT_TOKENS: &[&str] = &[
    "千克", "kg", "克", "g", "个", "杯", "碗", "份", "块", "片",
];

pub type ParseResult<T> = Result<T, ParseError>;

/// Parser error for malformed free-text segments.
///
/// Callers recover by handing the whole description to the generative
/// fallback instead of retrying per segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input contained no non-empty segments.
    EmptyInput,
    /// Quantity prefix did not reduce to a single mapped value.
    UnresolvableQuantity { segment: String, prefix: String },
    /// No token from the unit vocabulary followed the quantity.
    MissingUnit { segment: String },
    /// Nothing remained after stripping quantity and unit.
    EmptyName { segment: String },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "description contains no food segments"),
            Self::UnresolvableQuantity { segment, prefix } => write!(
                f,
                "quantity prefix `{prefix}` in segment `{segment}` does not map to a single value"
            ),
            Self::MissingUnit { segment } => {
                write!(f, "segment `{segment}` has no recognizable unit token")
            }
            Self::EmptyName { segment } => {
                write!(f, "segment `{segment}` has no food name after quantity and unit")
            }
        }
    }
}

impl Error for ParseError {}

/// Parses a meal description into ordered mentions.
///
/// # Contract
/// - Splits on commas, enumeration marks, `和`-style connectives and
///   whitespace.
/// - One [`ParsedMention`] per non-empty segment, in input order.
/// - Fails fast: a single undecomposable segment fails the whole call.
pub fn parse_meal(text: &str) -> ParseResult<Vec<ParsedMention>> {
    let mut mentions = Vec::new();
    for segment in SEPARATOR_RE.split(text) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        mentions.push(parse_segment(segment)?);
    }

    if mentions.is_empty() {
        return Err(ParseError::EmptyInput);
    }
    Ok(mentions)
}

fn parse_segment(segment: &str) -> ParseResult<ParsedMention> {
    let (quantity, rest) = split_quantity(segment)?;
    let rest = rest.trim_start();

    let (unit, name) = split_unit(rest).ok_or_else(|| ParseError::MissingUnit {
        segment: segment.to_string(),
    })?;

    let name = name.trim();
    if name.is_empty() {
        return Err(ParseError::EmptyName {
            segment: segment.to_string(),
        });
    }

    Ok(ParsedMention::new(name, quantity, unit))
}

/// Splits a greedy quantity prefix off `segment`.
///
/// Either a run of ASCII digits or exactly one CJK numeral glyph. Mixed
/// digit-script prefixes do not reduce cleanly and fail. No prefix at all
/// defaults the quantity to 1.
fn split_quantity(segment: &str) -> ParseResult<(f64, &str)> {
    let digit_len = segment
        .bytes()
        .take_while(|byte| byte.is_ascii_digit())
        .count();
    if digit_len > 0 {
        let (digits, rest) = segment.split_at(digit_len);
        if rest.starts_with(is_numeral_glyph) {
            return Err(unresolvable(segment, &segment_prefix(segment, digit_len + 1)));
        }
        let value: u64 = digits
            .parse()
            .map_err(|_| unresolvable(segment, digits))?;
        return Ok((value as f64, rest));
    }

    let glyphs: Vec<char> = segment.chars().take_while(|c| is_numeral_glyph(*c)).collect();
    match glyphs.as_slice() {
        [] => Ok((1.0, segment)),
        [glyph] => {
            let rest = &segment[glyph.len_utf8()..];
            if rest.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(unresolvable(segment, &segment_prefix(segment, 2)));
            }
            Ok((numeral_value(*glyph), rest))
        }
        run => Err(unresolvable(segment, &run.iter().collect::<String>())),
    }
}

fn split_unit(rest: &str) -> Option<(&'static str, &str)> {
    UNIT_TOKENS
        .iter()
        .find_map(|token| rest.strip_prefix(token).map(|name| (*token, name)))
}

fn is_numeral_glyph(c: char) -> bool {
    matches!(
        c,
        '一' | '二' | '两' | '三' | '四' | '五' | '六' | '七' | '八' | '九' | '十' | '半'
    )
}

fn numeral_value(glyph: char) -> f64 {
    match glyph {
        '一' => 1.0,
        '二' | '两' => 2.0,
        '三' => 3.0,
        '四' => 4.0,
        '五' => 5.0,
        '六' => 6.0,
        '七' => 7.0,
        '八' => 8.0,
        '九' => 9.0,
        '十' => 10.0,
        '半' => 0.5,
        other => unreachable!("`{other}` is not a numeral glyph"),
    }
}

fn unresolvable(segment: &str, prefix: &str) -> ParseError {
    ParseError::UnresolvableQuantity {
        segment: segment.to_string(),
        prefix: prefix.to_string(),
    }
}

fn segment_prefix(segment: &str, chars: usize) -> String {
    segment.chars().take(chars).collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_meal, parse_segment, split_quantity, ParseError};
    use crate::model::food::ParsedMention;

    #[test]
    fn parses_digit_quantity_and_unit() {
        let mention = parse_segment("10个鸡块").expect("segment should parse");
        assert_eq!(mention, ParsedMention::new("鸡块", 10.0, "个"));
    }

    #[test]
    fn parses_cjk_numeral_quantities() {
        assert_eq!(
            parse_segment("两个巨无霸").expect("两 should parse"),
            ParsedMention::new("巨无霸", 2.0, "个")
        );
        assert_eq!(
            parse_segment("半份沙拉").expect("半 should parse"),
            ParsedMention::new("沙拉", 0.5, "份")
        );
        assert_eq!(
            parse_segment("十杯咖啡").expect("十 should parse"),
            ParsedMention::new("咖啡", 10.0, "杯")
        );
    }

    #[test]
    fn defaults_quantity_to_one_without_prefix() {
        assert_eq!(
            parse_segment("碗卤肉饭").expect("unit-led segment should parse"),
            ParsedMention::new("卤肉饭", 1.0, "碗")
        );
    }

    #[test]
    fn longest_unit_token_wins() {
        assert_eq!(
            parse_segment("2千克牛肉").expect("千克 should win over 克"),
            ParsedMention::new("牛肉", 2.0, "千克")
        );
        assert_eq!(
            parse_segment("100克米饭").expect("克 should parse"),
            ParsedMention::new("米饭", 100.0, "克")
        );
    }

    #[test]
    fn missing_unit_is_an_error_not_a_default() {
        let err = parse_segment("一苹果").expect_err("missing unit must fail");
        assert!(matches!(err, ParseError::MissingUnit { .. }));
    }

    #[test]
    fn mixed_numeral_scripts_fail() {
        assert!(matches!(
            split_quantity("1半个饼"),
            Err(ParseError::UnresolvableQuantity { .. })
        ));
        assert!(matches!(
            split_quantity("两2个饼"),
            Err(ParseError::UnresolvableQuantity { .. })
        ));
        assert!(matches!(
            split_quantity("三十个饼"),
            Err(ParseError::UnresolvableQuantity { .. })
        ));
    }

    #[test]
    fn empty_name_after_stripping_is_an_error() {
        let err = parse_segment("2个").expect_err("bare quantity+unit must fail");
        assert!(matches!(err, ParseError::EmptyName { .. }));
    }

    #[test]
    fn splits_on_mixed_separators_preserving_order() {
        let mentions =
            parse_meal("10个鸡块，2杯米饭 和 半份沙拉").expect("description should parse");
        let names: Vec<&str> = mentions.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["鸡块", "米饭", "沙拉"]);
        let quantities: Vec<f64> = mentions.iter().map(|m| m.quantity).collect();
        assert_eq!(quantities, [10.0, 2.0, 0.5]);
    }

    #[test]
    fn one_bad_segment_fails_the_whole_call() {
        let err = parse_meal("2个巨无霸，苹果").expect_err("bad segment must fail the call");
        assert!(matches!(err, ParseError::MissingUnit { .. }));
    }

    #[test]
    fn blank_input_is_empty_input_error() {
        assert_eq!(parse_meal("  ，, "), Err(ParseError::EmptyInput));
    }
}

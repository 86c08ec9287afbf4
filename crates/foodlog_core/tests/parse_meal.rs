use foodlog_core::{parse_meal, ParseError, ParsedMention};

#[test]
fn full_meal_description_parses_in_order() {
    let mentions = parse_meal("两个鸡蛋、一碗米饭和100克鸡胸肉").unwrap();

    assert_eq!(
        mentions,
        vec![
            ParsedMention::new("鸡蛋", 2.0, "个"),
            ParsedMention::new("米饭", 1.0, "碗"),
            ParsedMention::new("鸡胸肉", 100.0, "克"),
        ]
    );
}

#[test]
fn mixed_separators_and_whitespace_are_equivalent() {
    let by_comma = parse_meal("一个苹果,一杯牛奶").unwrap();
    let by_space = parse_meal("一个苹果 一杯牛奶").unwrap();
    let by_conjunction = parse_meal("一个苹果和一杯牛奶").unwrap();

    assert_eq!(by_comma, by_space);
    assert_eq!(by_comma, by_conjunction);
}

#[test]
fn half_quantity_and_latin_units_parse() {
    let mentions = parse_meal("半碗粥,200g牛肉").unwrap();

    assert_eq!(mentions[0], ParsedMention::new("粥", 0.5, "碗"));
    assert_eq!(mentions[1], ParsedMention::new("牛肉", 200.0, "g"));
}

#[test]
fn segment_without_unit_is_rejected() {
    let err = parse_meal("三明治").unwrap_err();
    assert!(matches!(err, ParseError::MissingUnit { .. }));
}

#[test]
fn blank_input_is_rejected() {
    assert!(matches!(parse_meal("   "), Err(ParseError::EmptyInput)));
}

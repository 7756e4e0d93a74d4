use cde_datamodel::transform::codec::{
    parse_enumerations, parse_integer_range, serialize_enumerations, serialize_range,
};
use cde_datamodel::Enumeration;
use proptest::prelude::*;

/// Codes and labels with embedded quotes, commas and backslashes.
fn enumeration() -> impl Strategy<Value = Enumeration> {
    (
        "[a-z][a-z0-9_\"]{0,11}",
        "[A-Za-z0-9][A-Za-z0-9 ,()._\"\\\\-]{0,23}",
    )
        .prop_map(|(code, label)| Enumeration::new(code, label))
}

proptest! {
    #[test]
    fn enumeration_lists_survive_serialization(list in prop::collection::vec(enumeration(), 1..8)) {
        let text = serialize_enumerations(&list);
        prop_assert_eq!(parse_enumerations(&text).unwrap(), list);
    }

    #[test]
    fn integer_ranges_survive_serialization(min in 0i64..10_000, span in 1i64..10_000) {
        let max = min + span;
        let text = serialize_range(Some(min), Some(max));
        prop_assert_eq!(parse_integer_range(&text, "v").unwrap(), (Some(min), Some(max)));
    }

    #[test]
    fn half_bounded_ranges_survive_serialization(
        bound in -10_000i64..10_000,
        lower in any::<bool>(),
    ) {
        let (min, max) = if lower { (Some(bound), None) } else { (None, Some(bound)) };
        let text = serialize_range(min, max);
        prop_assert_eq!(parse_integer_range(&text, "v").unwrap(), (min, max));
    }
}

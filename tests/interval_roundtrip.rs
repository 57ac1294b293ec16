//! Property 3 (spec.md §8): parse(format(ci)) == ci for every
//! parser-accepted interval string.

use proptest::prelude::*;
use vigil_core::interval::parse_interval;

fn simple_interval_strategy() -> impl Strategy<Value = String> {
    (1u32..=86_400u32).prop_map(|d| d.to_string())
}

fn flex_interval_strategy() -> impl Strategy<Value = String> {
    (1u32..=3600u32, 1u8..=7u8, 0u32..23u32, 1u32..24u32).prop_map(|(delay, day, h1, h2)| {
        let (start, end) = if h1 < h2 { (h1, h2) } else { (h1, h1 + 1) };
        format!("{delay}/{day},{start:02}:00-{end:02}:00")
    })
}

proptest! {
    #[test]
    fn plain_base_round_trips(secs in simple_interval_strategy()) {
        let parsed = parse_interval(&secs).unwrap();
        let formatted = parsed.custom.format(&parsed.base);
        let reparsed = parse_interval(&formatted).unwrap();
        prop_assert_eq!(format!("{:?}", reparsed.base), format!("{:?}", parsed.base));
    }

    #[test]
    fn base_plus_flexible_round_trips(base in simple_interval_strategy(), flex in flex_interval_strategy()) {
        let input = format!("{base};{flex}");
        if let Ok(parsed) = parse_interval(&input) {
            let formatted = parsed.custom.format(&parsed.base);
            let reparsed = parse_interval(&formatted).unwrap();
            prop_assert_eq!(
                format!("{:?}", reparsed.custom.flexible),
                format!("{:?}", parsed.custom.flexible)
            );
        }
    }
}

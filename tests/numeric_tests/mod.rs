use std::cmp::Ordering;

use proptest::prelude::*;
use rexxkit::eval::numeric::{add, compare, format, multiply, parse_number};

proptest! {
    #[test]
    fn padded_integers_read_as_the_same_number(n in -1_000_000i64..1_000_000, zeros in 0usize..4, blanks in 0usize..3) {
        let plain = n.to_string();
        let digits = n.unsigned_abs().to_string();
        let sign = if n < 0 { "-" } else { "" };
        let padded = format!("{pad}{sign}{zeros}{digits}{pad}", pad = " ".repeat(blanks), zeros = "0".repeat(zeros));
        prop_assert_eq!(parse_number(&padded), parse_number(&plain));
        prop_assert_eq!(compare(&padded, &plain), Ordering::Equal);
    }

    #[test]
    fn numeric_comparison_follows_integer_order(a in any::<i32>(), b in any::<i32>()) {
        prop_assert_eq!(compare(&a.to_string(), &b.to_string()), a.cmp(&b));
    }

    #[test]
    fn integer_arithmetic_is_exact(a in any::<i32>(), b in any::<i32>()) {
        let (x, y) = (parse_number(&a.to_string()).unwrap(), parse_number(&b.to_string()).unwrap());
        prop_assert_eq!(format(&add(&x, &y, 20).unwrap()), (a as i64 + b as i64).to_string());
        prop_assert_eq!(format(&multiply(&x, &y, 20).unwrap()), (a as i64 * b as i64).to_string());
    }

    #[test]
    fn non_numeric_text_compares_as_strings(word in "[a-z]{1,8}", n in 0u32..1000) {
        let number = n.to_string();
        prop_assert_eq!(compare(&word, &number), word.as_str().cmp(number.as_str()));
    }
}

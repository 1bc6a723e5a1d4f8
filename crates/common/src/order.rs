// Reference ordering: natural comparison of passage references.
//
// References mix words and numbers ("Pesachim 22a.10", "Rashi on Pesachim
// 22a:1:1"). Splitting them into digit and non-digit tokens and comparing
// digit tokens numerically keeps 2a < 2b < 10a and 22a.9 < 22a.10.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Number(&'a str),
    Text(&'a str),
}

fn tokenize(reference: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_digits: Option<bool> = None;

    for (offset, ch) in reference.char_indices() {
        let is_digit = ch.is_ascii_digit();
        match in_digits {
            Some(previous) if previous != is_digit => {
                tokens.push(make_token(&reference[start..offset], previous));
                start = offset;
            }
            _ => {}
        }
        in_digits = Some(is_digit);
    }
    if let Some(is_digit) = in_digits {
        tokens.push(make_token(&reference[start..], is_digit));
    }
    tokens
}

fn make_token(text: &str, is_digit: bool) -> Token<'_> {
    if is_digit {
        Token::Number(text)
    } else {
        Token::Text(text)
    }
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_tokens(a: &Token<'_>, b: &Token<'_>) -> Ordering {
    match (a, b) {
        (Token::Number(a), Token::Number(b)) => compare_numbers(a, b),
        (Token::Text(a), Token::Text(b)) => a.cmp(b),
        (Token::Number(_), Token::Text(_)) => Ordering::Less,
        (Token::Text(_), Token::Number(_)) => Ordering::Greater,
    }
}

/// Total order over references used for display grouping.
///
/// Ties under the token order (e.g. `"2a"` vs `"02a"`) fall back to plain
/// string order so distinct references never compare equal.
pub fn compare_refs(a: &str, b: &str) -> Ordering {
    let left = tokenize(a);
    let right = tokenize(b);
    left.iter()
        .zip(right.iter())
        .map(|(x, y)| compare_tokens(x, y))
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| left.len().cmp(&right.len()))
        .then_with(|| a.cmp(b))
}

/// Sort references in place by [`compare_refs`].
pub fn sort_refs<S: AsRef<str>>(refs: &mut [S]) {
    refs.sort_by(|a, b| compare_refs(a.as_ref(), b.as_ref()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn amudim_sort_numerically_then_by_side() {
        let mut refs = vec!["Pesachim 10a", "Pesachim 2b", "Pesachim 2a", "Pesachim 9b"];
        sort_refs(&mut refs);
        assert_eq!(
            refs,
            vec!["Pesachim 2a", "Pesachim 2b", "Pesachim 9b", "Pesachim 10a"]
        );
    }

    #[test]
    fn segments_sort_numerically() {
        assert!(compare_refs("Pesachim 22a.9", "Pesachim 22a.10").is_lt());
        assert!(compare_refs("Pesachim 22a.1", "Pesachim 22a.1").is_eq());
    }

    #[test]
    fn prefix_sorts_first() {
        assert!(compare_refs("Pesachim 22a", "Pesachim 22a.1").is_lt());
    }

    #[test]
    fn leading_zeros_do_not_collapse_distinct_refs() {
        assert!(compare_refs("2a", "02a").is_ne());
    }

    #[test]
    fn empty_reference_sorts_first() {
        assert!(compare_refs("", "A").is_lt());
    }

    const REFERENCE: &str = "[A-Za-z .:0-9]{0,12}";

    proptest! {
        #[test]
        fn order_is_antisymmetric(a in REFERENCE, b in REFERENCE) {
            prop_assert_eq!(compare_refs(&a, &b), compare_refs(&b, &a).reverse());
        }

        #[test]
        fn order_is_consistent_with_equality(a in REFERENCE, b in REFERENCE) {
            prop_assert_eq!(compare_refs(&a, &b) == Ordering::Equal, a == b);
        }
    }
}

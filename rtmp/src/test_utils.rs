//! Assertion macros for checking the results returned by sessions.

/// Asserts that each element of a vector matches the pattern at the same position, and that
/// the vector has no elements beyond the given patterns.
///
/// ```ignore
/// assert_vec_match!(results,
///     ServerSessionResult::OutboundResponse(_),
///     ServerSessionResult::RaisedEvent(ref event) if is_publish(event),
/// );
/// ```
macro_rules! assert_vec_match {
    (@step $idx:expr, $vector:expr,) => {
        assert_vec_match!(@done $idx, $vector);
    };

    (@step $idx:expr, $vector:expr) => {
        assert_vec_match!(@done $idx, $vector);
    };

    (@step $idx:expr, $vector:expr, $pattern:pat if $cond:expr $(, $($rest:tt)*)?) => {
        assert_vec_match!(@check $idx, $vector, $pattern if $cond);
        assert_vec_match!(@step $idx + 1usize, $vector $(, $($rest)*)?);
    };

    (@step $idx:expr, $vector:expr, $pattern:pat $(, $($rest:tt)*)?) => {
        assert_vec_match!(@check $idx, $vector, $pattern if true);
        assert_vec_match!(@step $idx + 1usize, $vector $(, $($rest)*)?);
    };

    (@check $idx:expr, $vector:expr, $pattern:pat if $cond:expr) => {
        let idx: usize = $idx;
        if $vector.len() <= idx {
            panic!("Expected a value at index {}, but the vector only has {} values", idx, $vector.len());
        }

        match $vector[idx] {
            $pattern if $cond => (),
            ref other => panic!("Index {} was {:?}, expected {}", idx, other, stringify!($pattern)),
        }
    };

    (@done $idx:expr, $vector:expr) => {
        let expected: usize = $idx;
        if $vector.len() != expected {
            panic!("Vector contained {} elements but {} were expected: {:?}", $vector.len(), expected, $vector);
        }
    };

    ($vector:expr $(, $($rest:tt)*)?) => {
        assert_vec_match!(@step 0usize, $vector $(, $($rest)*)?);
    };
}

/// Asserts that at least one element of a vector matches the pattern
macro_rules! assert_vec_contains {
    ($vector:expr, $pattern:pat if $cond:expr) => {
        if !$vector.iter().any(|x| matches!(x, $pattern if $cond)) {
            panic!("No element matched '{}': {:?}", stringify!($pattern), $vector);
        }
    };

    ($vector:expr, $pattern:pat) => {
        assert_vec_contains!($vector, $pattern if true);
    };
}

#[macro_export]
/// Generates a String similar to output of `dbg` but without printing
macro_rules! format_dbg {
    ($dbg_expr:expr) => {
        format!(
            "[{}:{}] {}: {:?}",
            file!(),
            line!(),
            stringify!($dbg_expr),
            $dbg_expr
        )
    };
    () => {
        format!("[{}:{}]", file!(), line!())
    };
}

#[macro_export]
/// Asserts that two floats (or anything implementing [ApproxEq](crate::traits::ApproxEq))
/// agree within `tol`, printing both values on failure
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $tol:expr) => {{
        let (left, right) = (&$left, &$right);
        assert!(
            $crate::traits::ApproxEq::approx_eq(left, right, $tol),
            "assertion failed: `(left ~= right)` within {}\n  left: `{:?}`\n right: `{:?}`",
            $tol,
            left,
            right
        );
    }};
    ($left:expr, $right:expr) => {
        $crate::assert_approx_eq!($left, $right, 1e-8)
    };
}

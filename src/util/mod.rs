pub mod env;
pub mod telemetry;

/// Compares two `&str` tokens in constant time so header verification does
/// not leak key material through timing side-channels.
pub fn constant_time_cmp(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let a = a.as_bytes();
    let b = b.as_bytes();
    let mut res = 0u8;

    for i in 0..a.len() {
        // black_box keeps the optimizer from short-circuiting the fold
        let left = std::hint::black_box(a[i]);
        let right = std::hint::black_box(b[i]);
        res |= left ^ right;
    }

    res == 0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_const_time_cmp() {
        let expects = "token_value";
        let passing = "token_value";

        let bad_start = "__ken_value";
        let bad_end = "token_va___";

        let short = "token_valu";
        let long = "token_value_";

        assert!(constant_time_cmp(expects, passing));
        assert!(!constant_time_cmp(expects, bad_start));
        assert!(!constant_time_cmp(expects, bad_end));
        assert!(!constant_time_cmp(expects, short));
        assert!(!constant_time_cmp(expects, long));
    }
}

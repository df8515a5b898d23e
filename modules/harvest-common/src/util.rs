/// Replace every character that isn't an ASCII letter or digit with `_`.
///
/// Used to turn a harvest id such as `"twitter_user_timeline:123"` into a
/// filesystem-safe form for temp directories and result-snapshot filenames.
pub fn safe_string(unsafe_str: &str) -> String {
    unsafe_str
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_non_alphanumerics() {
        assert_eq!(safe_string("twitter_user_timeline:123"), "twitter_user_timeline_123");
        assert_eq!(safe_string("test:1"), "test_1");
    }
}

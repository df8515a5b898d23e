use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Result, WarcError};

fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-(\d{17})-").expect("static regex is valid"))
}

/// Extract the `YYYY/MM/DD/hh` destination path component from a WARC
/// filename carrying a `-YYYYMMDDhhmmssfff-` timestamp segment.
pub fn dated_path_for_filename(name: &str) -> Result<String> {
    let captures = timestamp_pattern()
        .captures(name)
        .ok_or_else(|| WarcError::BadTimestamp {
            name: name.to_string(),
        })?;
    let digits = &captures[1];
    let year = &digits[0..4];
    let month = &digits[4..6];
    let day = &digits[6..8];
    let hour = &digits[8..10];
    Ok(format!("{year}/{month}/{day}/{hour}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_dated_path_from_a_well_formed_filename() {
        let name = "twitter_stream-20151109143022123-00000.warc.gz";
        assert_eq!(dated_path_for_filename(name).unwrap(), "2015/11/09/14");
    }

    #[test]
    fn rejects_a_filename_without_the_17_digit_timestamp() {
        assert!(dated_path_for_filename("not-a-warc-filename.warc.gz").is_err());
    }
}

//! Parsing `git log` output into [`Commit`] values

use crate::types::Commit;
use std::collections::HashMap;

/// Field separator used in the log format (ASCII unit separator)
pub const FIELD_SEP: char = '\x1f';

/// Record separator used in the log format (ASCII record separator)
pub const RECORD_SEP: char = '\x1e';

/// `--format` argument producing output [`parse_log_output`] understands
pub const LOG_FORMAT: &str = "--format=%H%x1f%s%x1f%b%x1f%(trailers:only,unfold)%x1e";

/// Parse the output of `git log` run with [`LOG_FORMAT`]
///
/// Records that do not have all four fields are skipped.
pub fn parse_log_output(output: &str) -> Vec<Commit> {
    output
        .split(RECORD_SEP)
        .map(|record| record.trim_start_matches(['\n', '\r']))
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| {
            let mut fields = record.splitn(4, FIELD_SEP);
            let hash = fields.next()?.trim();
            let subject = fields.next()?;
            let body = fields.next()?;
            let trailers = fields.next()?;
            if hash.is_empty() {
                return None;
            }
            Some(Commit {
                hash: hash.to_string(),
                subject: subject.to_string(),
                body: body.trim_end().to_string(),
                trailers: parse_trailers(trailers),
            })
        })
        .collect()
}

/// Parse unfolded `Key: value` trailer lines
///
/// The first occurrence of a key wins. Lines without a colon, or whose key
/// contains whitespace, are ignored.
pub fn parse_trailers(text: &str) -> HashMap<String, String> {
    let mut trailers = HashMap::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            continue;
        }
        trailers
            .entry(key.to_string())
            .or_insert_with(|| value.trim().to_string());
    }
    trailers
}

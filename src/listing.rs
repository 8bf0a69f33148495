//! Test listings in the Catch `--list-tests --verbosity high` layout.
//!
//! ```text
//! All available test cases:
//!   With tags
//!       Tests.cpp(16)
//!       (NO DESCRIPTION)
//!       [neat][tag]
//! 1 test case
//! ```
//!
//! Long `file(line)` entries are wrapped over several lines the way Catch
//! wraps them at the console width; [`parse_listing`] joins them back.

use std::collections::BTreeMap;
use std::io::{self, Write};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diagnostics::CatchError;
use crate::err_msg;
use crate::registry::TestCase;
use crate::tags::TagSet;

pub const LISTING_HEADER: &str = "All available test cases:";
const NO_DESCRIPTION: &str = "(NO DESCRIPTION)";
const CONSOLE_WIDTH: usize = 80;
const NAME_INDENT: usize = 2;
const DETAIL_INDENT: usize = 6;

static LINE_INFO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<path>.*)\((?P<line>\d+)\)$").expect("valid line info regex"));

/// One test case as read back from a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedCase {
    pub name: String,
    pub file: String,
    pub line: u32,
    pub tags: TagSet,
}

// ============================================================================
// WRITING
// ============================================================================

pub fn write_listing<'a, W, I>(out: &mut W, cases: I) -> io::Result<()>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = &'a TestCase>,
{
    writeln!(out, "{}", LISTING_HEADER)?;
    let mut count = 0;
    for case in cases {
        count += 1;
        writeln!(out, "{:indent$}{}", "", case.name(), indent = NAME_INDENT)?;
        let line_info = format!("{}({})", case.location().file, case.location().line);
        for chunk in wrap(&line_info, CONSOLE_WIDTH - 1 - DETAIL_INDENT) {
            writeln!(out, "{:indent$}{}", "", chunk, indent = DETAIL_INDENT)?;
        }
        writeln!(out, "{:indent$}{}", "", NO_DESCRIPTION, indent = DETAIL_INDENT)?;
        if !case.tags().is_empty() {
            writeln!(out, "{:indent$}{}", "", case.tags(), indent = DETAIL_INDENT)?;
        }
    }
    let noun = if count == 1 { "test case" } else { "test cases" };
    writeln!(out, "{} {}", count, noun)
}

/// Catch `--list-tags` layout: one `count  [tag]` line per tag.
pub fn write_tag_listing<W>(out: &mut W, counts: &BTreeMap<String, usize>) -> io::Result<()>
where
    W: Write + ?Sized,
{
    writeln!(out, "All available tags:")?;
    for (tag, count) in counts {
        writeln!(out, "{:>4}  [{}]", count, tag)?;
    }
    let noun = if counts.len() == 1 { "tag" } else { "tags" };
    writeln!(out, "{} {}", counts.len(), noun)
}

/// Splits `text` into pieces of at most `width` characters.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

// ============================================================================
// PARSING
// ============================================================================

/// Parses a listing. Text that does not start with the listing header has no
/// test cases.
pub fn parse_listing(text: &str) -> Result<Vec<ListedCase>, CatchError> {
    let mut lines = text.lines();
    if lines.next().map(str::trim_end) != Some(LISTING_HEADER) {
        return Ok(Vec::new());
    }

    // A new group starts whenever indentation drops.
    let mut groups: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut last_indent = 0;
    for line in lines {
        let indent = line.len() - line.trim_start().len();
        if indent == 0 || line.trim().is_empty() {
            // The trailing "N test cases" summary.
            continue;
        }
        if indent < last_indent && !current.is_empty() {
            groups.push(std::mem::take(&mut current));
        }
        current.push(line.trim());
        last_indent = indent;
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups.iter().map(|g| group_to_case(g)).collect()
}

fn group_to_case(group: &[&str]) -> Result<ListedCase, CatchError> {
    if group.len() < 3 {
        return Err(err_msg!(
            Parse,
            "unexpectedly few lines in listing group: '{}'",
            group.join("\n")
        ));
    }

    let name = group[0].to_string();

    // Wrapped line info is glued back together until it looks complete.
    let mut line_info = group[1].to_string();
    let mut last_info_line = 1;
    while !LINE_INFO.is_match(&line_info) && last_info_line + 1 < group.len() {
        last_info_line += 1;
        line_info.push_str(group[last_info_line]);
    }

    let captures = LINE_INFO
        .captures(&line_info)
        .ok_or_else(|| err_msg!(Parse, "could not parse line info from '{}'", line_info))?;
    let file = captures["path"].to_string();
    let line = captures["line"]
        .parse::<u32>()
        .map_err(|e| err_msg!(Parse, "bad line number in '{}'", line_info).with_cause(e))?;

    // Everything after the description may carry tags.
    let tags = group
        .iter()
        .skip(last_info_line + 1)
        .flat_map(|l| TagSet::parse(l).iter().map(str::to_string).collect::<Vec<_>>())
        .collect();

    Ok(ListedCase {
        name,
        file,
        line,
        tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATCH_OUTPUT: &str = "All available test cases:
  No tags
      d:\\projects\\ReferenceCatchProject\\Tests.cpp(6)
      (NO DESCRIPTION)
  With tags
      d:\\projects\\ReferenceCatchProject\\Tests.cpp(16)
      (NO DESCRIPTION)
      [neat][tag]
  Has failure
      d:\\a\\very\\long\\path\\that\\catch\\had\\to\\wrap\\because\\it\\exceeds\\the\\
      console\\width\\Tests.cpp(24)
      (NO DESCRIPTION)
      [tag]
3 test cases
";

    #[test]
    fn parses_catch_listing_with_wrapped_paths() {
        let cases = parse_listing(CATCH_OUTPUT).unwrap();
        assert_eq!(cases.len(), 3);
        assert_eq!(cases[0].name, "No tags");
        assert_eq!(cases[0].line, 6);
        assert!(cases[0].tags.is_empty());
        assert_eq!(cases[1].tags, TagSet::parse("[tag][neat]"));
        assert_eq!(cases[2].line, 24);
        assert!(cases[2].file.ends_with("console\\width\\Tests.cpp"));
        assert!(cases[2].file.starts_with("d:\\a\\very"));
    }

    #[test]
    fn text_without_header_lists_nothing() {
        assert!(parse_listing("error: no such option").unwrap().is_empty());
    }

    #[test]
    fn truncated_group_is_an_error() {
        let text = "All available test cases:\n  Lonely\n      Tests.cpp(1)\n";
        assert!(parse_listing(text).is_err());
    }

    #[test]
    fn tag_listing_counts_cases() {
        let mut counts = BTreeMap::new();
        counts.insert("neat".to_string(), 1);
        counts.insert("tag".to_string(), 2);
        let mut out = Vec::new();
        write_tag_listing(&mut out, &counts).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "All available tags:\n   1  [neat]\n   2  [tag]\n2 tags\n"
        );
    }

    #[test]
    fn long_locations_are_wrapped_to_the_console_width() {
        let text = "x".repeat(200);
        let pieces = wrap(&text, CONSOLE_WIDTH - 1 - DETAIL_INDENT);
        assert!(pieces.iter().all(|p| p.len() + DETAIL_INDENT < CONSOLE_WIDTH));
        assert_eq!(pieces.concat(), text);
    }
}

//! Parsing of `/proc/cpuinfo`

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::{Error, Result};

/// Read the CPU info source and return its first processor block.
///
/// Multi-processor hosts repeat the block once per logical CPU; only the
/// first one is looked at.
pub fn cpu_info(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path).map_err(|e| Error::from_read(path, e))?;
    Ok(first_cpu_block(&text).to_string())
}

/// Text up to and including the first blank line, or all of `text`.
pub fn first_cpu_block(text: &str) -> &str {
    match text.find("\n\n") {
        Some(end) => &text[..end + 2],
        None => text,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// True if `needle` occurs in `haystack` as a whole word.
pub fn find_anchored_string(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }

    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

/// Value of a `label : value` line, where `label` starts the line.
pub fn field_value<'a>(block: &'a str, label: &str) -> Option<&'a str> {
    block.lines().find_map(|line| {
        let rest = line.strip_prefix(label)?.trim_start();
        rest.strip_prefix(':').map(str::trim)
    })
}

/// Feature flags advertised by a CPU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuFlags(BTreeSet<String>);

impl CpuFlags {
    pub fn contains(&self, flag: &str) -> bool {
        self.0.contains(flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for CpuFlags {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

/// Flags from the `flags` line; empty when there is none.
pub fn cpu_flags(block: &str) -> CpuFlags {
    field_value(block, "flags")
        .map(|flags| flags.split_whitespace().collect())
        .unwrap_or_default()
}

/// Vendor id and model name of the first CPU.
pub fn cpu_details(path: &Path) -> Result<(String, String)> {
    block_details(&cpu_info(path)?)
}

/// Vendor id and model name from an already read CPU info block.
///
/// Both labels are required.
pub fn block_details(block: &str) -> Result<(String, String)> {
    let vendor = field_value(block, "vendor_id")
        .ok_or_else(|| Error::Parse("cannot find vendor_id in CPU info".into()))?;
    let model = field_value(block, "model name")
        .ok_or_else(|| Error::Parse("cannot find model name in CPU info".into()))?;

    Ok((vendor.to_string(), model.to_string()))
}

/// Fail with the first `(flag, description)` missing from `flags`.
pub fn check_cpu_flags(flags: &CpuFlags, required: &[(String, String)]) -> Result<()> {
    if flags.is_empty() {
        return Err(Error::Parse("cannot find CPU flags".into()));
    }

    for (flag, description) in required {
        if !flags.contains(flag) {
            return Err(Error::MissingCpuFlag {
                flag: flag.clone(),
                description: description.clone(),
            });
        }
    }

    Ok(())
}

/// Fail with the first `(attribute, description)` not present in `block` as a word.
pub fn check_cpu_attribs(block: &str, required: &[(String, String)]) -> Result<()> {
    if block.is_empty() {
        return Err(Error::Parse("cannot determine CPU attributes".into()));
    }

    for (attribute, description) in required {
        if !find_anchored_string(block, attribute) {
            return Err(Error::MissingCpuAttribute {
                attribute: attribute.clone(),
                description: description.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_first_cpu_block() {
        let cases = [
            ("", ""),
            (" ", " "),
            ("\n", "\n"),
            ("\n\n", "\n\n"),
            ("hello\n", "hello\n"),
            ("hello\n\n", "hello\n\n"),
            ("hello\n\nworld\n\n", "hello\n\n"),
            ("foo\n\nbar\nbaz\n\n", "foo\n\n"),
        ];
        for (text, expected) in cases {
            assert_eq!(first_cpu_block(text), expected, "text={text:?}");
        }
    }

    #[test]
    fn test_find_anchored_string() {
        let cases = [
            ("", "", false),
            ("", "foo", false),
            ("foo", "", false),
            ("food", "foo", false),
            ("foo", "foo", true),
            ("foo bar", "foo", true),
            ("foo bar baz", "bar", true),
            ("vendor_id\t: GenuineIntel\n", "GenuineIntel", true),
            ("GenuineIntelX", "GenuineIntel", false),
        ];
        for (haystack, needle, expected) in cases {
            assert_eq!(
                find_anchored_string(haystack, needle),
                expected,
                "haystack={haystack:?} needle={needle:?}"
            );
        }
    }

    #[test]
    fn test_cpu_flags() {
        let cases: [(&str, &[&str]); 8] = [
            ("", &[]),
            ("foo", &[]),
            ("foo bar", &[]),
            (":", &[]),
            ("flags", &[]),
            ("flags:", &[]),
            ("flags: a b c", &["a", "b", "c"]),
            ("flags\t\t: a b c foo bar d", &["a", "b", "c", "foo", "bar", "d"]),
        ];
        for (block, expected) in cases {
            let flags = cpu_flags(block);
            assert_eq!(flags.len(), expected.len(), "block={block:?}");
            for flag in expected {
                assert!(flags.contains(flag));
            }
        }
    }

    #[test]
    fn test_field_value_is_anchored() {
        let block = "a\t: b\nvendor_id\t: a vendor\nfoo\t: bar\nmodel name\t: some CPU model\n";
        assert_eq!(field_value(block, "vendor_id"), Some("a vendor"));
        assert_eq!(field_value(block, "model name"), Some("some CPU model"));
        assert_eq!(field_value("x vendor_id : y", "vendor_id"), None);
        assert_eq!(field_value("vendor_id", "vendor_id"), None);
    }

    #[test]
    fn test_block_details_requires_both_labels() {
        let both = "vendor_id\t: GenuineIntel\nmodel name\t: Some CPU\n";
        assert_eq!(
            block_details(both).unwrap(),
            ("GenuineIntel".to_string(), "Some CPU".to_string())
        );

        for block in ["", "vendor_id\t: GenuineIntel\n", "model name\t: Some CPU\n"] {
            assert!(matches!(block_details(block), Err(Error::Parse(_))), "{block:?}");
        }
    }

    #[test]
    fn test_check_cpu_flags() {
        let empty = CpuFlags::default();
        assert!(check_cpu_flags(&empty, &[]).is_err());
        assert!(check_cpu_flags(&empty, &req(&[("a", "A flag")])).is_err());

        let flags = cpu_flags("flags: a b c");
        assert!(check_cpu_flags(&flags, &req(&[("b", "B flag")])).is_ok());

        match check_cpu_flags(&flags, &req(&[("a", "A flag"), ("x", "X flag"), ("y", "Y flag")])) {
            Err(Error::MissingCpuFlag { flag, .. }) => assert_eq!(flag, "x"),
            other => panic!("expected MissingCpuFlag, got {other:?}"),
        }
    }

    #[test]
    fn test_check_cpu_attribs() {
        assert!(check_cpu_attribs("", &[]).is_err());
        assert!(check_cpu_attribs("", &req(&[("a", "")])).is_err());
        assert!(check_cpu_attribs("a: b", &req(&[("b", "B attribute")])).is_ok());
        assert!(check_cpu_attribs("a: b\nc: d\ne: f", &req(&[("b", "B attribute")])).is_ok());
        assert!(check_cpu_attribs(
            "a: b\n",
            &req(&[("b", "B attribute"), ("c", "C attribute"), ("d", "D attribute")])
        )
        .is_err());
        assert!(check_cpu_attribs(
            "a: b\nc: d\ne: f",
            &req(&[("b", "B attribute"), ("d", "D attribute"), ("f", "F attribute")])
        )
        .is_ok());
    }
}

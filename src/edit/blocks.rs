//! Diff block extraction from loosely structured patch text.
//!
//! Six dialects are tried in [`Dialect::ALL`] order. The first dialect that
//! matches at least once wins and all of its matches are returned; dialects
//! are never mixed within one extraction.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A textual convention for expressing search/replace edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `<<<CUSTOM_SEARCH>>>` / `<<<CUSTOM_REPLACE>>>` / `<<<END_CUSTOM>>>`.
    CustomSafe,
    /// ```` ```diff ```` fence, filename line, then SEARCH/REPLACE markers.
    ToolkamiFenced,
    /// Filename line followed by SEARCH/REPLACE markers, no fence.
    ///
    /// The filename line must be non-blank and may not start with a fence or
    /// a conflict marker. It is optional per block, but at least one block
    /// must carry one, otherwise runs of bare blocks stay `simple_blocks`.
    ToolkamiDirect,
    /// Bare SEARCH/REPLACE markers.
    SimpleBlocks,
    /// ```` ```diff ```` fence around SEARCH/REPLACE markers, no filename.
    EvolvemcpStyle,
    /// Unified-diff hunks converted to search/replace pairs.
    GitStyle,
}

impl Dialect {
    /// Every dialect, highest priority first.
    pub const ALL: [Self; 6] = [
        Self::CustomSafe,
        Self::ToolkamiFenced,
        Self::ToolkamiDirect,
        Self::SimpleBlocks,
        Self::EvolvemcpStyle,
        Self::GitStyle,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::CustomSafe => "custom_safe",
            Self::ToolkamiFenced => "toolkami_fenced",
            Self::ToolkamiDirect => "toolkami_direct",
            Self::SimpleBlocks => "simple_blocks",
            Self::EvolvemcpStyle => "evolvemcp_style",
            Self::GitStyle => "git_style",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::CustomSafe => "Custom conflict-free delimiters",
            Self::ToolkamiFenced => "ToolKami style with ```diff fences and filename line",
            Self::ToolkamiDirect => "ToolKami style without fences, filename line",
            Self::SimpleBlocks => "Simple SEARCH/REPLACE blocks",
            Self::EvolvemcpStyle => "EvolveMCP style fenced blocks",
            Self::GitStyle => "Unified diff converted to search/replace",
        }
    }

    /// Regex recognising one block of this dialect.
    ///
    /// For `git_style` this only recognises the file header; hunks are split
    /// line by line.
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::CustomSafe => {
                r"(?s)<<<CUSTOM_SEARCH>>>\n(.*?)\n<<<CUSTOM_REPLACE>>>\n(.*?)\n<<<END_CUSTOM>>>"
            }
            Self::ToolkamiFenced => {
                r"(?s)```diff[ \t]*\n([^\n]*)\n<<<<<<< SEARCH\n(.*?)={7}\n(.*?)>>>>>>> REPLACE\n```"
            }
            Self::ToolkamiDirect => {
                r"(?ms)(?:^([^`<>=\s][^\n]*)\n)?<<<<<<< SEARCH\n(.*?)={7}\n(.*?)>>>>>>> REPLACE"
            }
            Self::SimpleBlocks => r"(?s)<<<<<<< SEARCH\n(.*?)={7}\n(.*?)>>>>>>> REPLACE",
            Self::EvolvemcpStyle => {
                r"(?s)```diff\n(.*?)<<<<<<< SEARCH\n(.*?)={7}\n(.*?)>>>>>>> REPLACE\n```"
            }
            Self::GitStyle => r"(?m)^--- a/([^\n]*)\n\+\+\+ b/[^\n]*\n",
        }
    }

    /// Extract every block of this dialect from `text`.
    pub fn extract(self, text: &str) -> Result<Vec<DiffBlock>, regex::Error> {
        let re = Regex::new(self.pattern())?;

        let blocks = match self {
            Self::CustomSafe | Self::SimpleBlocks => re
                .captures_iter(text)
                .map(|caps| DiffBlock::new(self, &caps[1], &caps[2], None))
                .collect(),
            Self::ToolkamiFenced => re
                .captures_iter(text)
                .map(|caps| DiffBlock::new(self, &caps[2], &caps[3], Some(&caps[1])))
                .collect(),
            Self::ToolkamiDirect => {
                let all: Vec<_> = re.captures_iter(text).collect();
                // Without any filename line this is plain `simple_blocks`.
                if all.iter().all(|caps| caps.get(1).is_none()) {
                    Vec::new()
                } else {
                    all.iter()
                        .map(|caps| {
                            let filename = caps.get(1).map(|m| m.as_str());
                            DiffBlock::new(self, &caps[2], &caps[3], filename)
                        })
                        .collect()
                }
            }
            Self::EvolvemcpStyle => re
                .captures_iter(text)
                .map(|caps| DiffBlock::new(self, &caps[2], &caps[3], None))
                .collect(),
            Self::GitStyle => git_hunks(&re, text),
        };

        Ok(blocks)
    }
}

/// Where a block came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockMeta {
    pub method: Dialect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename_hint: Option<String>,
}

/// One parsed search/replace instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffBlock {
    pub search: String,
    pub replace: String,
    pub meta: BlockMeta,
}

impl DiffBlock {
    fn new(method: Dialect, search: &str, replace: &str, filename: Option<&str>) -> Self {
        let (search, replace) = match method {
            Dialect::CustomSafe | Dialect::GitStyle => (search, replace),
            _ => (strip_marker_newline(search), strip_marker_newline(replace)),
        };
        let filename_hint = filename
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_owned);

        Self {
            search: search.to_owned(),
            replace: replace.to_owned(),
            meta: BlockMeta {
                method,
                filename_hint,
            },
        }
    }
}

/// Dialect catalogue entry, as reported by [`diff_formats`].
#[derive(Debug, Clone, Serialize)]
pub struct DiffFormat {
    pub name: &'static str,
    pub description: &'static str,
    pub pattern: &'static str,
}

/// Describe every supported dialect, in priority order.
pub fn diff_formats() -> Vec<DiffFormat> {
    Dialect::ALL
        .iter()
        .map(|d| DiffFormat {
            name: d.name(),
            description: d.description(),
            pattern: d.pattern(),
        })
        .collect()
}

/// Names of every supported dialect, in priority order.
pub fn supported_dialects() -> Vec<&'static str> {
    Dialect::ALL.iter().map(|d| d.name()).collect()
}

/// Parse `text` into blocks using the first dialect that matches.
///
/// Returns an empty vector when no dialect matches anything.
pub fn extract_blocks(text: &str) -> Result<Vec<DiffBlock>, regex::Error> {
    for dialect in Dialect::ALL {
        let blocks = dialect.extract(text)?;
        if !blocks.is_empty() {
            tracing::debug!(
                dialect = dialect.name(),
                count = blocks.len(),
                "extracted diff blocks"
            );
            return Ok(blocks);
        }
    }
    Ok(Vec::new())
}

/// Drop the line break that sits between a captured side and the next marker.
fn strip_marker_newline(s: &str) -> &str {
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .unwrap_or(s)
}

/// Split each `--- a/` / `+++ b/` section into one block per `@@` hunk.
fn git_hunks(header: &Regex, text: &str) -> Vec<DiffBlock> {
    let headers: Vec<_> = header.captures_iter(text).collect();
    let mut blocks = Vec::new();

    for (i, caps) in headers.iter().enumerate() {
        let filename = caps.get(1).map_or("", |m| m.as_str());
        let body_start = caps.get(0).map_or(0, |m| m.end());
        let body_end = headers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());

        let mut hunk: Option<(Vec<&str>, Vec<&str>)> = None;

        for line in text[body_start..body_end].lines() {
            if line.starts_with("@@") {
                if let Some((search, replace)) = hunk.take() {
                    blocks.push(git_block(search, replace, filename));
                }
                hunk = Some((Vec::new(), Vec::new()));
                continue;
            }
            let Some((search, replace)) = hunk.as_mut() else {
                continue;
            };

            if let Some(removed) = line.strip_prefix('-') {
                search.push(removed);
            } else if let Some(added) = line.strip_prefix('+') {
                replace.push(added);
            } else if let Some(context) = line.strip_prefix(' ') {
                search.push(context);
                replace.push(context);
            } else if line.is_empty() {
                search.push(line);
                replace.push(line);
            } else if line.starts_with('\\') {
                // "\ No newline at end of file"
            } else {
                // `diff --git`, `index`, a closing fence or prose ends the hunk.
                if let Some((search, replace)) = hunk.take() {
                    blocks.push(git_block(search, replace, filename));
                }
            }
        }

        if let Some((search, replace)) = hunk {
            blocks.push(git_block(search, replace, filename));
        }
    }

    blocks
}

fn git_block(mut search: Vec<&str>, mut replace: Vec<&str>, filename: &str) -> DiffBlock {
    // Blank lines trailing a hunk are separators, not context.
    while search.last() == Some(&"") && replace.last() == Some(&"") {
        search.pop();
        replace.pop();
    }
    DiffBlock::new(
        Dialect::GitStyle,
        &search.join("\n"),
        &replace.join("\n"),
        Some(filename),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_blocks() {
        let raw = "<<<<<<< SEARCH\nfoo\n=======\nbar\n>>>>>>> REPLACE";
        let blocks = extract_blocks(raw).expect("patterns compile");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].meta.method, Dialect::SimpleBlocks);
        assert_eq!(blocks[0].search, "foo");
        assert_eq!(blocks[0].replace, "bar");
        assert_eq!(blocks[0].meta.filename_hint, None);
    }

    #[test]
    fn test_custom_safe_wins_over_markers() {
        let raw = "<<<CUSTOM_SEARCH>>>\n<<<<<<< SEARCH\n<<<CUSTOM_REPLACE>>>\nnew\n<<<END_CUSTOM>>>";
        let blocks = extract_blocks(raw).expect("patterns compile");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].meta.method, Dialect::CustomSafe);
        assert_eq!(blocks[0].search, "<<<<<<< SEARCH");
        assert_eq!(blocks[0].replace, "new");
    }

    #[test]
    fn test_toolkami_fenced() {
        let raw = "```diff\nsrc/lib.rs\n<<<<<<< SEARCH\nold\n=======\nnew\n>>>>>>> REPLACE\n```";
        let blocks = extract_blocks(raw).expect("patterns compile");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].meta.method, Dialect::ToolkamiFenced);
        assert_eq!(blocks[0].meta.filename_hint.as_deref(), Some("src/lib.rs"));
        assert_eq!(blocks[0].search, "old");
        assert_eq!(blocks[0].replace, "new");
    }

    #[test]
    fn test_toolkami_direct_multiple() {
        let raw = "a.py\n<<<<<<< SEARCH\nx = 1\n=======\nx = 2\n>>>>>>> REPLACE\n\
                   b.py\n<<<<<<< SEARCH\ny = 1\n=======\ny = 2\n>>>>>>> REPLACE\n";
        let blocks = extract_blocks(raw).expect("patterns compile");
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.meta.method == Dialect::ToolkamiDirect));
        assert_eq!(blocks[0].meta.filename_hint.as_deref(), Some("a.py"));
        assert_eq!(blocks[1].meta.filename_hint.as_deref(), Some("b.py"));
        assert_eq!(blocks[1].search, "y = 1");
    }

    #[test]
    fn test_toolkami_direct_keeps_blocks_after_leading_line() {
        let raw = "Here is the fix:\n<<<<<<< SEARCH\na\n=======\nb\n>>>>>>> REPLACE\n\
                   <<<<<<< SEARCH\nc\n=======\nd\n>>>>>>> REPLACE";
        let blocks = extract_blocks(raw).expect("patterns compile");
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.meta.method == Dialect::ToolkamiDirect));
        assert_eq!(blocks[0].meta.filename_hint.as_deref(), Some("Here is the fix:"));
        assert_eq!((blocks[0].search.as_str(), blocks[0].replace.as_str()), ("a", "b"));
        assert_eq!(blocks[1].meta.filename_hint, None);
        assert_eq!((blocks[1].search.as_str(), blocks[1].replace.as_str()), ("c", "d"));
    }

    #[test]
    fn test_toolkami_direct_filename_then_bare_blocks() {
        let raw = "src/lib.rs\n<<<<<<< SEARCH\none\n=======\n1\n>>>>>>> REPLACE\n\n\
                   <<<<<<< SEARCH\ntwo\n=======\n2\n>>>>>>> REPLACE\n\
                   <<<<<<< SEARCH\nthree\n=======\n3\n>>>>>>> REPLACE\n";
        let blocks = extract_blocks(raw).expect("patterns compile");
        let searches: Vec<&str> = blocks.iter().map(|b| b.search.as_str()).collect();
        assert_eq!(searches, vec!["one", "two", "three"]);
        assert_eq!(blocks[0].meta.filename_hint.as_deref(), Some("src/lib.rs"));
        assert!(blocks[1..].iter().all(|b| b.meta.filename_hint.is_none()));
    }

    #[test]
    fn test_fence_without_filename_is_simple() {
        let raw = "```diff\n<<<<<<< SEARCH\nold\n=======\nnew\n>>>>>>> REPLACE\n```";
        let blocks = extract_blocks(raw).expect("patterns compile");
        assert_eq!(blocks[0].meta.method, Dialect::SimpleBlocks);
    }

    #[test]
    fn test_evolvemcp_pattern() {
        let raw = "```diff\n<<<<<<< SEARCH\nold\n=======\nnew\n>>>>>>> REPLACE\n```";
        let blocks = Dialect::EvolvemcpStyle
            .extract(raw)
            .expect("pattern compiles");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].search, "old");
        assert_eq!(blocks[0].replace, "new");
    }

    #[test]
    fn test_empty_search_side() {
        let raw = "<<<<<<< SEARCH\n=======\nappended\n>>>>>>> REPLACE";
        let blocks = extract_blocks(raw).expect("patterns compile");
        assert_eq!(blocks[0].search, "");
        assert_eq!(blocks[0].replace, "appended");
    }

    #[test]
    fn test_git_style_hunks() {
        let raw = "--- a/src/main.rs\n+++ b/src/main.rs\n@@ -1,3 +1,3 @@\n fn main() {\n-    old();\n+    new();\n }\n@@ -10,2 +10,2 @@\n-a\n+b\n";
        let blocks = extract_blocks(raw).expect("patterns compile");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].meta.method, Dialect::GitStyle);
        assert_eq!(blocks[0].meta.filename_hint.as_deref(), Some("src/main.rs"));
        assert_eq!(blocks[0].search, "fn main() {\n    old();\n}");
        assert_eq!(blocks[0].replace, "fn main() {\n    new();\n}");
        assert_eq!(blocks[1].search, "a");
        assert_eq!(blocks[1].replace, "b");
    }

    #[test]
    fn test_consecutive_bare_blocks_stay_simple() {
        for sep in ["\n", "\n\n"] {
            let raw = format!(
                "<<<<<<< SEARCH\na\n=======\nb\n>>>>>>> REPLACE{sep}<<<<<<< SEARCH\nc\n=======\nd\n>>>>>>> REPLACE"
            );
            let blocks = extract_blocks(&raw).expect("patterns compile");
            assert_eq!(blocks.len(), 2);
            assert!(blocks.iter().all(|b| b.meta.method == Dialect::SimpleBlocks));
            assert_eq!(blocks[1].search, "c");
            assert_eq!(blocks[1].replace, "d");
        }
    }

    #[test]
    fn test_no_dialect() {
        let blocks = extract_blocks("just some prose").expect("patterns compile");
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let raw = "<<<<<<< SEARCH\na\n=======\nb\n>>>>>>> REPLACE\n<<<<<<< SEARCH\nc\n=======\nd\n>>>>>>> REPLACE";
        let first = extract_blocks(raw).expect("patterns compile");
        let second = extract_blocks(raw).expect("patterns compile");
        assert_eq!(first, second);
    }

    #[test]
    fn test_formats_catalogue() {
        let formats = diff_formats();
        assert_eq!(formats.len(), 6);
        assert_eq!(formats[0].name, "custom_safe");
        assert_eq!(formats[5].name, "git_style");
        assert_eq!(supported_dialects().len(), 6);
    }
}

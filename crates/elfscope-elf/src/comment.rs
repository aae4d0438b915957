//! `.comment` section: toolchain identification strings.

use std::fmt;

/// Compiler family named in the `.comment` strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Compiler {
    Gcc,
    Clang,
    ArmCompiler,
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gcc => "GCC",
            Self::Clang => "Clang",
            Self::ArmCompiler => "Arm Compiler",
        })
    }
}

/// Decoded `.comment` section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommentInfo {
    /// Non-empty NUL-separated strings, in section order.
    pub comments: Vec<String>,
    /// First compiler recognised in `comments`.
    pub compiler: Option<Compiler>,
}

impl CommentInfo {
    #[must_use]
    pub fn parse(data: &[u8]) -> Self {
        let comments: Vec<String> = data
            .split(|&b| b == 0)
            .map(|s| String::from_utf8_lossy(s).trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let compiler = comments.iter().find_map(|c| detect(c));
        Self { comments, compiler }
    }
}

fn detect(comment: &str) -> Option<Compiler> {
    let lower = comment.to_ascii_lowercase();
    // Clang strings often mention GCC compatibility, so test it first.
    if lower.contains("clang") {
        Some(Compiler::Clang)
    } else if lower.contains("arm compiler") || lower.contains("armcc") {
        Some(Compiler::ArmCompiler)
    } else if lower.starts_with("gcc:") || lower.contains("gnu") {
        Some(Compiler::Gcc)
    } else {
        None
    }
}

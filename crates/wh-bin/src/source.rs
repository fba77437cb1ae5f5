//! Input loading, atom splitting, and output writing.
//!
//! The input is decoded as UTF-8 with lossy replacement; whittle treats
//! atoms as opaque strings whose concatenation reproduces the artifact,
//! so line atoms keep their terminators.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::{debug, info};

/// Input granularity of a reduction phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AtomKind {
    Char,
    Line,
    /// A line pass followed by a char pass over its result.
    Both,
}

impl AtomKind {
    /// The reduction phases this choice expands to, in order.
    pub fn phases(self) -> Vec<AtomKind> {
        match self {
            AtomKind::Both => vec![AtomKind::Line, AtomKind::Char],
            one => vec![one],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AtomKind::Char => "char",
            AtomKind::Line => "line",
            AtomKind::Both => "both",
        }
    }
}

impl std::str::FromStr for AtomKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "char" => Ok(AtomKind::Char),
            "line" => Ok(AtomKind::Line),
            "both" => Ok(AtomKind::Both),
            other => Err(format!("unknown atom kind: {other:?}")),
        }
    }
}

/// Read the test case, replacing invalid UTF-8 sequences.
pub fn load_input(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading input {}", path.display()))?;
    let src = String::from_utf8_lossy(&bytes).into_owned();
    debug!(target: "reduce.io", file = %path.display(), size_bytes = src.len(), "input loaded");
    Ok(src)
}

/// Split into atoms of the given kind. Line atoms keep their
/// terminators so `concat` rebuilds the original string.
pub fn atoms(src: &str, kind: AtomKind) -> Vec<String> {
    match kind {
        AtomKind::Line => src.split_inclusive('\n').map(str::to_owned).collect(),
        AtomKind::Char => src.chars().map(String::from).collect(),
        AtomKind::Both => unreachable!("expand Both into phases first"),
    }
}

/// Write the (possibly partial) minimal artifact next to the per-test
/// directories.
pub fn write_output(out_dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let path = out_dir.join(filename);
    fs::write(&path, content).with_context(|| format!("writing output {}", path.display()))?;
    info!(target: "reduce.io", file = %path.display(), size_bytes = content.len(), "output saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_atoms_keep_terminators() {
        let split = atoms("a\nbb\r\nccc", AtomKind::Line);
        assert_eq!(split, vec!["a\n", "bb\r\n", "ccc"]);
        assert_eq!(split.concat(), "a\nbb\r\nccc");
    }

    #[test]
    fn char_atoms_rebuild_the_source() {
        let src = "héllo\n";
        let split = atoms(src, AtomKind::Char);
        assert_eq!(split.len(), src.chars().count());
        assert_eq!(split.concat(), src);
    }

    #[test]
    fn both_expands_to_line_then_char() {
        assert_eq!(AtomKind::Both.phases(), vec![AtomKind::Line, AtomKind::Char]);
        assert_eq!(AtomKind::Line.phases(), vec![AtomKind::Line]);
    }

    #[test]
    fn lossy_input_survives_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weird.bin");
        std::fs::write(&path, b"ok\n\xff\xfeend\n").unwrap();
        let src = load_input(&path).unwrap();
        assert!(src.starts_with("ok\n"));
        assert!(src.ends_with("end\n"));
    }
}

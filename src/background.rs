use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use glob::glob;

// ---------------------------------------------------------------------------
// Background discovery
// ---------------------------------------------------------------------------

/// Glob pattern the vendor software uses for background exports.
pub const DEFAULT_BACKGROUND_PATTERN: &str = "Background*.txt";

/// Row index of the signal trace inside a background file.
///
/// The export writes the trace as the second row of the text matrix; row 0
/// is not the signal. Instrument-export quirk, kept verbatim.
pub const BACKGROUND_SIGNAL_ROW: usize = 1;

/// Find and parse the capture folder's background trace, if any.
///
/// Background absence is never an error: zero or multiple pattern matches,
/// unreadable files, malformed numbers, and traces whose length does not
/// match `signal_len` all yield `None`. Malformed files are logged as
/// warnings; plain absence is only a debug note.
pub fn locate_background(folder: &Path, signal_len: usize) -> Option<Vec<f64>> {
    locate_background_with_pattern(folder, DEFAULT_BACKGROUND_PATTERN, signal_len)
}

/// [`locate_background`] with a caller-supplied glob pattern.
pub fn locate_background_with_pattern(
    folder: &Path,
    pattern: &str,
    signal_len: usize,
) -> Option<Vec<f64>> {
    match try_locate(folder, pattern, signal_len) {
        Ok(Some(trace)) => Some(trace),
        Ok(None) => {
            log::debug!("no background file in {}", folder.display());
            None
        }
        Err(e) => {
            log::warn!("background ignored: {e:#}");
            None
        }
    }
}

fn try_locate(folder: &Path, pattern: &str, signal_len: usize) -> anyhow::Result<Option<Vec<f64>>> {
    let full_pattern = folder.join(pattern);
    let full_pattern = full_pattern
        .to_str()
        .context("capture folder path is not valid UTF-8")?;

    let matches: Vec<PathBuf> = glob(full_pattern)
        .context("invalid background pattern")?
        .collect::<Result<_, _>>()
        .context("unreadable directory entry")?;

    let path = match matches.as_slice() {
        [] => return Ok(None),
        [single] => single,
        many => bail!("{} files match '{}'", many.len(), pattern),
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let rows = parse_rows(&text)?;

    let trace = rows.get(BACKGROUND_SIGNAL_ROW).with_context(|| {
        format!(
            "background file has {} rows, need at least {}",
            rows.len(),
            BACKGROUND_SIGNAL_ROW + 1
        )
    })?;
    if trace.len() != signal_len {
        bail!(
            "background trace has {} points but the signal axis has {}",
            trace.len(),
            signal_len
        );
    }
    Ok(Some(trace.clone()))
}

/// Parse a whitespace-delimited numeric matrix. Blank lines and `#` comment
/// lines are skipped.
fn parse_rows(text: &str) -> anyhow::Result<Vec<Vec<f64>>> {
    let mut rows = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row: Vec<f64> = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>()
                    .with_context(|| format!("line {}: '{}' is not a number", lineno + 1, tok))
            })
            .collect::<anyhow::Result<_>>()?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn folder_with(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            f.write_all(contents.as_bytes()).unwrap();
        }
        dir
    }

    #[test]
    fn second_row_is_the_trace() {
        let dir = folder_with(&[(
            "Background_650nm.txt",
            "400 500 600 700\n10.5 11 12 13.5\n1 1 1 1\n",
        )]);
        let trace = locate_background(dir.path(), 4).unwrap();
        assert_eq!(trace, vec![10.5, 11.0, 12.0, 13.5]);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let dir = folder_with(&[(
            "Background.txt",
            "# exported trace\n\n400 500\n7 8\n",
        )]);
        assert_eq!(locate_background(dir.path(), 2).unwrap(), vec![7.0, 8.0]);
    }

    #[test]
    fn no_file_means_no_background() {
        let dir = folder_with(&[("HYPCard.bin", "")]);
        assert!(locate_background(dir.path(), 4).is_none());
    }

    #[test]
    fn multiple_matches_mean_no_background() {
        let dir = folder_with(&[
            ("Background_a.txt", "1 2\n3 4\n"),
            ("Background_b.txt", "1 2\n3 4\n"),
        ]);
        assert!(locate_background(dir.path(), 2).is_none());
    }

    #[test]
    fn length_mismatch_means_no_background() {
        let dir = folder_with(&[("Background.txt", "400 500 600\n1 2 3\n")]);
        assert!(locate_background(dir.path(), 4).is_none());
    }

    #[test]
    fn malformed_numbers_mean_no_background() {
        let dir = folder_with(&[("Background.txt", "400 500\nseven 8\n")]);
        assert!(locate_background(dir.path(), 2).is_none());
    }

    #[test]
    fn single_row_means_no_background() {
        let dir = folder_with(&[("Background.txt", "400 500 600 700\n")]);
        assert!(locate_background(dir.path(), 4).is_none());
    }
}

//! Turns a sorted text corpus into an index file.
//!
//! The input is the breached-password distribution format: one digest per
//! line as 40 hexadecimal characters, optionally followed by
//! `:<prevalence count>`, sorted ascending by digest. Windows line
//! endings are tolerated; the count, if present, is ignored. Anything
//! else — malformed hex, a wrong-length digest, an out-of-order or
//! duplicate line — aborts the build with the offending line number. The
//! partially written index file is left behind for inspection.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use tracing::info;

use crate::btree::SortedBuilder;
use crate::encoding::sha1::SHA1_TEXT_LENGTH;
use crate::encoding::text_to_sha1;
use crate::storage::FileStorage;

/// Name of the index file created inside the output directory.
pub const INDEX_FILE_NAME: &str = "okon.btree";

/// Default tree order; nodes are 49 KiB, keeping a billion-key tree at
/// height 2-3 while staying friendly to sequential writes.
pub const DEFAULT_ORDER: u32 = 1024;

/// Result of a successful preparation run.
#[derive(Debug, Clone)]
pub struct PrepareSummary {
    pub index_path: PathBuf,
    pub keys: u64,
    pub order: u32,
}

/// Builds `<output_dir>/okon.btree` from a sorted digest corpus.
pub fn prepare_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_dir: Q,
    order: u32,
) -> Result<PrepareSummary> {
    let input_path = input_path.as_ref();
    let index_path = output_dir.as_ref().join(INDEX_FILE_NAME);

    let input = File::open(input_path)
        .wrap_err_with(|| format!("failed to open corpus '{}'", input_path.display()))?;
    let mut reader = BufReader::with_capacity(1 << 20, input);

    let mut builder = SortedBuilder::new(FileStorage::create(&index_path)?, order)?;

    let mut line = String::new();
    let mut line_number = 0u64;

    loop {
        line.clear();
        let bytes = reader
            .read_line(&mut line)
            .wrap_err_with(|| format!("failed to read line {}", line_number + 1))?;
        if bytes == 0 {
            break;
        }
        line_number += 1;

        let text = line.trim_end_matches(['\n', '\r']);
        if text.is_empty() {
            continue;
        }

        let digest_text = match text.find(':') {
            Some(colon) => &text[..colon],
            None => text,
        };
        ensure!(
            digest_text.len() == SHA1_TEXT_LENGTH,
            "line {}: expected a {}-character digest, got {} characters",
            line_number,
            SHA1_TEXT_LENGTH,
            digest_text.len()
        );

        let sha1 = text_to_sha1(digest_text)
            .wrap_err_with(|| format!("line {}: invalid digest", line_number))?;
        builder
            .insert_sorted(&sha1)
            .wrap_err_with(|| format!("line {}: corpus is not sorted", line_number))?;
    }

    let summary = builder.finalize()?;
    info!(
        keys = summary.keys,
        nodes = summary.nodes,
        height = summary.height,
        order,
        "index built at {}",
        index_path.display()
    );

    Ok(PrepareSummary {
        index_path,
        keys: summary.keys,
        order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::Btree;
    use crate::encoding::sha1_to_text;
    use tempfile::tempdir;

    fn digest(n: u8) -> String {
        let mut key = [0u8; 20];
        key[19] = n;
        sha1_to_text(&key)
    }

    #[test]
    fn plain_lines_build_a_queryable_index() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("corpus.txt");
        std::fs::write(&input, format!("{}\n{}\n{}\n", digest(1), digest(2), digest(9))).unwrap();

        let summary = prepare_file(&input, dir.path(), 2).unwrap();
        assert_eq!(summary.keys, 3);
        assert_eq!(summary.index_path, dir.path().join("okon.btree"));

        let mut btree = Btree::open_file(&summary.index_path).unwrap();
        assert!(btree.contains(&crate::encoding::text_to_sha1(&digest(9)).unwrap()));
        assert!(!btree.contains(&crate::encoding::text_to_sha1(&digest(8)).unwrap()));
    }

    #[test]
    fn prevalence_counts_and_crlf_are_tolerated() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("corpus.txt");
        std::fs::write(
            &input,
            format!("{}:23\r\n{}:104223\r\n", digest(3).to_lowercase(), digest(7)),
        )
        .unwrap();

        let summary = prepare_file(&input, dir.path(), 2).unwrap();
        assert_eq!(summary.keys, 2);
    }

    #[test]
    fn empty_corpus_builds_an_empty_index() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("corpus.txt");
        std::fs::write(&input, "").unwrap();

        let summary = prepare_file(&input, dir.path(), 2).unwrap();
        assert_eq!(summary.keys, 0);

        let mut btree = Btree::open_file(&summary.index_path).unwrap();
        assert!(!btree.contains(&[0u8; 20]));
    }

    #[test]
    fn invalid_hex_reports_the_line_number() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("corpus.txt");
        std::fs::write(&input, format!("{}\nZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZ\n", digest(1)))
            .unwrap();

        let error = prepare_file(&input, dir.path(), 2).unwrap_err();
        assert!(error.to_string().contains("line 2"));
    }

    #[test]
    fn wrong_length_digest_is_rejected() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("corpus.txt");
        std::fs::write(&input, "ABCDEF\n").unwrap();

        let error = prepare_file(&input, dir.path(), 2).unwrap_err();
        assert!(error.to_string().contains("40-character"));
    }

    #[test]
    fn unsorted_corpus_reports_the_line_number() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("corpus.txt");
        std::fs::write(&input, format!("{}\n{}\n", digest(5), digest(4))).unwrap();

        let error = prepare_file(&input, dir.path(), 2).unwrap_err();
        assert!(error.to_string().contains("line 2"));
        assert!(error.to_string().contains("not sorted"));
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use encoding_rs::Encoding;
use log::info;
use snafu::ResultExt;
use walkdir::{DirEntry, WalkDir};

use crate::bagit::consts::*;
use crate::bagit::digest::{DigestAlgorithm, HexDigest, MultiDigestWriter};
use crate::bagit::encoding::{decode_text, encode_text, percent_decode, percent_encode};
use crate::bagit::error::*;
use crate::bagit::io::LineReader;
use crate::bagit::paths;
use crate::bagit::validate::IssueLog;

/// Whether a manifest covers the payload under `data/` or the tag files at the bag root
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ManifestKind {
    Payload,
    Tag,
}

/// A `manifest-<alg>.txt` or `tagmanifest-<alg>.txt`: a map from bag-relative paths to
/// digests computed with a single algorithm
#[derive(Debug)]
pub struct Manifest {
    kind: ManifestKind,
    algorithm: DigestAlgorithm,
    entries: BTreeMap<String, HexDigest>,
}

impl ManifestKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ManifestKind::Payload => PAYLOAD_MANIFEST_PREFIX,
            ManifestKind::Tag => TAG_MANIFEST_PREFIX,
        }
    }

    pub fn filename(&self, algorithm: DigestAlgorithm) -> String {
        format!("{}-{}.txt", self.prefix(), algorithm)
    }
}

impl Manifest {
    pub fn new(kind: ManifestKind, algorithm: DigestAlgorithm) -> Self {
        Self {
            kind,
            algorithm,
            entries: BTreeMap::new(),
        }
    }

    /// Parses a manifest file from the bag's base directory. Malformed entries are
    /// reported as issues against the manifest file; only environmental failures return
    /// an error.
    pub fn load<P: AsRef<Path>>(
        kind: ManifestKind,
        algorithm: DigestAlgorithm,
        base_dir: P,
        encoding: &'static Encoding,
    ) -> Result<(Manifest, IssueLog)> {
        let mut manifest = Manifest::new(kind, algorithm);
        let mut issues = IssueLog::new();

        let filename = manifest.filename();
        let path = base_dir.as_ref().join(&filename);
        let file = File::open(&path).context(IoReadSnafu { path: &path })?;

        let mut line_num: u32 = 0;

        for line in LineReader::new(BufReader::new(file)) {
            line_num += 1;
            let line = match decode_text(&line?, encoding) {
                Ok(line) => line,
                Err(e) => {
                    issues.error(&filename, format!("Line {line_num}: {e}"));
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let captures = match MANIFEST_LINE_MATCHER.captures(&line) {
                Some(captures) => captures,
                None => {
                    issues.error(
                        &filename,
                        format!("Line {line_num}: expected '<digest> <path>'"),
                    );
                    continue;
                }
            };

            let digest = &captures[1];
            if digest.len() != algorithm.hex_len() {
                issues.error(
                    &filename,
                    format!(
                        "Line {line_num}: digest length {} does not match {}",
                        digest.len(),
                        algorithm
                    ),
                );
                continue;
            }

            let raw_path = percent_decode(&captures[2]);
            let entry_path = raw_path.strip_prefix("./").unwrap_or(&raw_path);

            match manifest.check_entry_path(entry_path) {
                Ok(()) => {}
                Err(details) => {
                    issues.error(&filename, format!("Line {line_num}: {details}"));
                    continue;
                }
            }

            if manifest
                .entries
                .insert(entry_path.to_string(), HexDigest::from(digest))
                .is_some()
            {
                issues.error(
                    &filename,
                    format!("Line {line_num}: {entry_path} is listed more than once"),
                );
            }
        }

        Ok((manifest, issues))
    }

    /// Compares the manifest against the filesystem, reporting files that are missing on
    /// disk, files on disk that are not listed, and digest mismatches
    pub fn validate<P: AsRef<Path>>(&self, base_dir: P) -> IssueLog {
        let base_dir = base_dir.as_ref();
        let filename = self.filename();
        let mut issues = IssueLog::new();

        let on_disk = match self.files_on_disk(base_dir) {
            Ok(on_disk) => on_disk,
            Err(e) => {
                issues.error(&filename, e.to_string());
                return issues;
            }
        };

        for path in self.entries.keys() {
            if !on_disk.contains(path) {
                issues.error(&filename, format!("{path} listed in manifest is not on disk"));
            }
        }

        for path in &on_disk {
            if !self.entries.contains_key(path) {
                issues.error(&filename, format!("{path} on disk is not in manifest"));
            }
        }

        for (path, expected) in &self.entries {
            if !on_disk.contains(path) {
                continue;
            }

            let full_path = base_dir.join(path);
            match digest_file(&full_path, self.algorithm) {
                Ok(actual) => {
                    if actual != *expected {
                        issues.error(
                            &filename,
                            format!(
                                "{path} {} digest is {actual} but manifest lists {expected}",
                                self.algorithm
                            ),
                        );
                    }
                }
                Err(e) => issues.error(&filename, e.to_string()),
            }
        }

        issues
    }

    /// Writes the manifest sorted by path, percent-encoding paths, in the bag's tag file
    /// encoding
    pub fn write<P: AsRef<Path>>(&self, base_dir: P, encoding: &'static Encoding) -> Result<()> {
        let destination = base_dir.as_ref().join(self.filename());
        info!("Writing manifest {}", destination.display());

        let mut serialized = String::new();
        for (path, digest) in &self.entries {
            let encoded = percent_encode(path);
            serialized.push_str(digest.as_str());
            serialized.push(SPACE);
            serialized.push_str(&encoded);
            serialized.push(LF);
        }

        let bytes = encode_text(&serialized, encoding)?;
        let mut writer = BufWriter::new(
            File::create(&destination).context(IoCreateSnafu { path: &destination })?,
        );
        writer
            .write_all(&bytes)
            .context(IoWriteSnafu { path: &destination })?;

        Ok(())
    }

    pub fn kind(&self) -> ManifestKind {
        self.kind
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn filename(&self) -> String {
        self.kind.filename(self.algorithm)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, path: &str) -> Option<&HexDigest> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn set_entries(&mut self, entries: BTreeMap<String, HexDigest>) {
        self.entries = entries;
    }

    fn files_on_disk(&self, base_dir: &Path) -> Result<BTreeSet<String>> {
        match self.kind {
            ManifestKind::Payload => payload_files_on_disk(base_dir),
            ManifestKind::Tag => tag_files_on_disk(base_dir),
        }
    }

    /// Rejects entry paths that escape the area the manifest is allowed to cover
    fn check_entry_path(&self, entry_path: &str) -> std::result::Result<(), String> {
        let resolved = match paths::lexical_resolve(Path::new(entry_path)) {
            Some(resolved) => paths::to_forward_slash(&resolved),
            None => return Err(format!("{entry_path} resolves outside of the bag")),
        };

        match self.kind {
            ManifestKind::Payload => {
                if !paths::in_payload(&resolved) {
                    return Err(format!("{entry_path} is outside of the payload directory"));
                }
            }
            ManifestKind::Tag => {
                if paths::in_payload(&resolved) {
                    return Err(format!("{entry_path} is a payload file"));
                }
                if TAG_MANIFEST_MATCHER.is_match(&resolved) {
                    return Err(format!("{entry_path} is a tag manifest"));
                }
            }
        }

        Ok(())
    }
}

/// All of the files under `data/` as bag-relative forward-slash paths. An absent payload
/// directory yields an empty set.
pub(crate) fn payload_files_on_disk(base_dir: &Path) -> Result<BTreeSet<String>> {
    let data_dir = base_dir.join(DATA);
    if !data_dir.exists() {
        return Ok(BTreeSet::new());
    }
    walk_files(&data_dir, base_dir, |_| true)
}

/// All of the tag files in the bag as bag-relative forward-slash paths, excluding the
/// payload directory and every tag manifest
pub(crate) fn tag_files_on_disk(base_dir: &Path) -> Result<BTreeSet<String>> {
    walk_files(base_dir, base_dir, is_tag_file)
}

pub(crate) fn is_tag_file(entry: &DirEntry) -> bool {
    if entry.depth() != 1 {
        return true;
    }
    entry.file_name() != DATA
        && entry
            .file_name()
            .to_str()
            .map(|name| !TAG_MANIFEST_MATCHER.is_match(name))
            .unwrap_or(true)
}

fn walk_files<P>(walk_root: &Path, rel_root: &Path, predicate: P) -> Result<BTreeSet<String>>
where
    P: FnMut(&DirEntry) -> bool,
{
    let mut files = BTreeSet::new();

    for file in WalkDir::new(walk_root).into_iter().filter_entry(predicate) {
        let file = file.context(WalkFileSnafu {})?;

        if file.file_type().is_file() {
            let relative = file.path().strip_prefix(rel_root).unwrap();
            if relative.to_str().is_none() {
                return Err(Error::InvalidUtf8Path {
                    path: file.path().to_path_buf(),
                });
            }
            files.insert(paths::to_forward_slash(relative));
        }
    }

    Ok(files)
}

/// Computes a single digest over the contents of a file
pub(crate) fn digest_file(path: &Path, algorithm: DigestAlgorithm) -> Result<HexDigest> {
    let algorithms = [algorithm];
    let mut writer = MultiDigestWriter::new(&algorithms, io::sink());
    let mut reader = File::open(path).context(IoReadSnafu { path })?;

    io::copy(&mut reader, &mut writer).context(IoReadSnafu { path })?;

    Ok(writer
        .finalize_hex()
        .remove(&algorithm)
        .expect("Missing expected file digest"))
}

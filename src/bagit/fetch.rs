use std::collections::BTreeSet;
use std::fmt::Debug;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use encoding_rs::Encoding;
use log::info;
use snafu::ResultExt;
use url::Url;

use crate::bagit::consts::*;
use crate::bagit::encoding::{decode_text, encode_text, percent_decode, percent_encode};
use crate::bagit::error::*;
use crate::bagit::io::LineReader;
use crate::bagit::paths;
use crate::bagit::validate::IssueLog;
use crate::bagit::Error::*;

/// Retrieves the bytes a fetch entry points at. Implementations must honor the size hint
/// when one is given and reject responses of any other length.
pub trait Downloader: Debug {
    fn fetch(&self, url: &str, size_hint: Option<u64>) -> Result<Vec<u8>>;
}

/// The downloader used when none is injected; it refuses every fetch
#[derive(Debug, Default)]
pub struct DisabledDownloader;

/// A single fetch.txt entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchItem {
    url: String,
    size: Option<u64>,
    destination: String,
}

/// The contents of fetch.txt: files that are part of the bag's payload but retrieved by
/// URL rather than shipped in `data/`
#[derive(Debug, Default)]
pub struct FetchList {
    items: Vec<FetchItem>,
}

impl Downloader for DisabledDownloader {
    fn fetch(&self, url: &str, _size_hint: Option<u64>) -> Result<Vec<u8>> {
        Err(NoDownloader { url: url.into() })
    }
}

impl FetchItem {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Bag-relative destination path, always inside the payload
    pub fn destination(&self) -> &str {
        &self.destination
    }
}

impl FetchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses fetch.txt from the bag's base directory. Malformed entries are reported as
    /// issues; only environmental failures return an error.
    pub fn load<P: AsRef<Path>>(
        base_dir: P,
        encoding: &'static Encoding,
    ) -> Result<(FetchList, IssueLog)> {
        let path = base_dir.as_ref().join(FETCH_TXT);
        let file = File::open(&path).context(IoReadSnafu { path: &path })?;

        let mut list = FetchList::new();
        let mut issues = IssueLog::new();
        let mut seen = BTreeSet::new();
        let mut line_num: u32 = 0;

        for line in LineReader::new(BufReader::new(file)) {
            line_num += 1;
            let line = match decode_text(&line?, encoding) {
                Ok(line) => line,
                Err(e) => {
                    issues.error(FETCH_TXT, format!("Line {line_num}: {e}"));
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let captures = match FETCH_LINE_MATCHER.captures(&line) {
                Some(captures) => captures,
                None => {
                    issues.error(
                        FETCH_TXT,
                        format!("Line {line_num}: expected '<url> <size|-> <path>'"),
                    );
                    continue;
                }
            };

            let url = &captures[1];
            if let Err(e) = check_url(url) {
                issues.error(FETCH_TXT, format!("Line {line_num}: {e}"));
                continue;
            }

            let size = match &captures[2] {
                "-" => None,
                digits => match digits.parse::<u64>() {
                    Ok(size) => Some(size),
                    Err(_) => {
                        issues.error(
                            FETCH_TXT,
                            format!("Line {line_num}: invalid size '{digits}'"),
                        );
                        continue;
                    }
                },
            };

            let destination = match resolve_destination(&percent_decode(&captures[3])) {
                Ok(destination) => destination,
                Err(e) => {
                    issues.error(FETCH_TXT, format!("Line {line_num}: {e}"));
                    continue;
                }
            };

            if !seen.insert(destination.clone()) {
                issues.error(
                    FETCH_TXT,
                    format!("Line {line_num}: {destination} is listed more than once"),
                );
                continue;
            }

            list.items.push(FetchItem {
                url: url.into(),
                size,
                destination,
            });
        }

        Ok((list, issues))
    }

    /// Appends a fetch entry and immediately materializes its destination so subsequent
    /// manifest computation sees the file's bytes
    pub fn add<P: AsRef<Path>>(
        &mut self,
        url: &str,
        size: Option<u64>,
        destination: &str,
        base_dir: P,
        downloader: &dyn Downloader,
    ) -> Result<()> {
        let base_dir = base_dir.as_ref();

        check_url(url)?;

        let destination = resolve_destination(&paths::convert_path_separator(destination))?;

        if paths::is_reserved_name(&destination) {
            return Err(ReservedPath { path: destination });
        }

        if base_dir.join(&destination).exists()
            || self.items.iter().any(|item| item.destination == destination)
        {
            return Err(FetchTargetExists { path: destination });
        }

        let item = FetchItem {
            url: url.into(),
            size,
            destination,
        };
        materialize(&item, base_dir, downloader)?;
        self.items.push(item);

        Ok(())
    }

    /// Materializes every entry whose destination is not on disk. Failures become issues
    /// against fetch.txt.
    pub fn download_missing<P: AsRef<Path>>(
        &self,
        base_dir: P,
        downloader: &dyn Downloader,
    ) -> IssueLog {
        let base_dir = base_dir.as_ref();
        let mut issues = IssueLog::new();

        for item in &self.items {
            if base_dir.join(&item.destination).exists() {
                continue;
            }

            info!("Fetching {} to {}", item.url, item.destination);
            if let Err(e) = materialize(item, base_dir, downloader) {
                issues.error(FETCH_TXT, e.to_string());
            }
        }

        issues
    }

    /// Writes fetch.txt sorted by destination, or removes it when there are no entries
    pub fn write<P: AsRef<Path>>(&self, base_dir: P, encoding: &'static Encoding) -> Result<()> {
        let destination = base_dir.as_ref().join(FETCH_TXT);

        if self.items.is_empty() {
            if let Err(e) = fs::remove_file(&destination) {
                if e.kind() != ErrorKind::NotFound {
                    return Err(IoDelete {
                        path: destination,
                        source: e,
                    });
                }
            }
            return Ok(());
        }

        info!("Writing tag file {}", destination.display());

        let mut sorted: Vec<&FetchItem> = self.items.iter().collect();
        sorted.sort_by(|a, b| a.destination.cmp(&b.destination));

        let mut serialized = String::new();
        for item in sorted {
            serialized.push_str(&item.url);
            serialized.push(SPACE);
            match item.size {
                Some(size) => serialized.push_str(&size.to_string()),
                None => serialized.push('-'),
            }
            serialized.push(SPACE);
            serialized.push_str(&percent_encode(&item.destination));
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

    /// Removes every materialized destination file. Fetched files are transient; they are
    /// not part of the committed payload once the bag is packaged.
    pub fn finalize<P: AsRef<Path>>(&self, base_dir: P) -> Result<()> {
        let base_dir = base_dir.as_ref();

        for item in &self.items {
            let path = base_dir.join(&item.destination);
            if path.exists() {
                info!("Deleting fetched file {}", path.display());
                fs::remove_file(&path).context(IoDeleteSnafu { path: &path })?;
                paths::prune_empty_parents(base_dir, &item.destination)?;
            }
        }

        Ok(())
    }

    pub fn items(&self) -> &[FetchItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn check_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url).map_err(|_| InvalidUrl { url: url.into() })?;

    match parsed.scheme() {
        SCHEME_HTTP | SCHEME_HTTPS => Ok(()),
        _ => Err(UnsupportedScheme { url: url.into() }),
    }
}

/// Normalizes a fetch destination and ensures it stays inside the payload
fn resolve_destination(destination: &str) -> Result<String> {
    let stripped = destination.strip_prefix("./").unwrap_or(destination);

    let resolved = match paths::lexical_resolve(Path::new(stripped)) {
        Some(resolved) => paths::to_forward_slash(&resolved),
        None => {
            return Err(OutsidePayload {
                path: destination.into(),
            })
        }
    };

    if !paths::in_payload(&resolved) {
        return Err(OutsidePayload {
            path: destination.into(),
        });
    }

    Ok(resolved)
}

fn materialize(item: &FetchItem, base_dir: &Path, downloader: &dyn Downloader) -> Result<()> {
    let bytes = downloader.fetch(&item.url, item.size)?;

    if let Some(expected) = item.size {
        if bytes.len() as u64 != expected {
            return Err(FetchSizeMismatch {
                url: item.url.clone(),
                expected,
                actual: bytes.len() as u64,
            });
        }
    }

    let target = base_dir.join(&item.destination);
    let parent = target.parent().expect("Fetch destination has no parent");
    fs::create_dir_all(parent).context(IoCreateSnafu { path: parent })?;
    fs::write(&target, bytes).context(IoWriteSnafu { path: &target })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::bagit::fetch::{check_url, resolve_destination};

    #[test]
    fn urls_must_be_http_or_https() {
        assert!(check_url("https://example.com/a").is_ok());
        assert!(check_url("http://example.com/a").is_ok());
        assert!(check_url("ftp://example.com/a").is_err());
        assert!(check_url("not a url").is_err());
    }

    #[test]
    fn destinations_must_stay_in_the_payload() {
        assert_eq!("data/a.txt", resolve_destination("data/a.txt").unwrap());
        assert_eq!("data/a.txt", resolve_destination("./data/a.txt").unwrap());
        assert_eq!("data/b.txt", resolve_destination("data/sub/../b.txt").unwrap());
        assert!(resolve_destination("bagit.txt").is_err());
        assert!(resolve_destination("data/../bagit.txt").is_err());
        assert!(resolve_destination("../outside.txt").is_err());
    }
}

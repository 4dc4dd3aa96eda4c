use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ffi::OsStr;
use std::fmt::{self, Debug, Display, Formatter};
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use regex::{Captures, Regex};
use snafu::ResultExt;
use walkdir::{DirEntry, WalkDir};

use crate::bagit::consts::*;
use crate::bagit::digest::{DigestAlgorithm, HexDigest, MultiDigestWriter};
use crate::bagit::error::Error::*;
use crate::bagit::error::*;
use crate::bagit::fetch::{DisabledDownloader, Downloader, FetchItem, FetchList};
use crate::bagit::manifest::{self, Manifest, ManifestKind};
use crate::bagit::paths;
use crate::bagit::tag::{
    read_bag_declaration, read_bag_info, write_bag_declaration, write_bag_info, BagDeclaration,
    BagInfo,
};
use crate::bagit::validate::{BagIssue, IssueLog};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct BagItVersion {
    major: u8,
    minor: u8,
}

/// Supplies the date stamped into Bagging-Date on update
pub trait Clock: Debug {
    fn today(&self) -> NaiveDate;
}

/// The default clock. Dates are taken in UTC.
#[derive(Debug, Default)]
pub struct SystemClock;

/// An in-memory representation of a bag. Mutations do not touch disk until `update()` is
/// called.
#[derive(Debug)]
pub struct Bag {
    base_dir: PathBuf,
    declaration: BagDeclaration,
    extended: bool,
    payload_manifests: HashMap<DigestAlgorithm, Manifest>,
    tag_manifests: HashMap<DigestAlgorithm, Manifest>,
    bag_info: BagInfo,
    fetch: FetchList,
    issues: IssueLog,
    changed: bool,
    loaded: bool,
    downloader: Box<dyn Downloader>,
    clock: Box<dyn Clock>,
}

#[derive(Debug)]
struct FileMeta {
    path: String,
    size_bytes: u64,
    digests: HashMap<DigestAlgorithm, HexDigest>,
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

impl BagItVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl Display for BagItVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl TryFrom<String> for BagItVersion {
    type Error = Error;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        TryFrom::try_from(&value)
    }
}

impl TryFrom<&String> for BagItVersion {
    type Error = Error;

    fn try_from(value: &String) -> std::result::Result<Self, Self::Error> {
        if let Some((major, minor)) = value.split_once('.') {
            let major = major.parse::<u8>().map_err(|_| InvalidBagItVersion {
                value: value.into(),
            })?;
            let minor = minor.parse::<u8>().map_err(|_| InvalidBagItVersion {
                value: value.into(),
            })?;
            Ok(BagItVersion::new(major, minor))
        } else {
            Err(InvalidBagItVersion {
                value: value.into(),
            })
        }
    }
}

impl Bag {
    /// Creates a new bag rooted at `base_dir`. The directory must not exist or must be
    /// empty. The payload directory is materialized and a payload manifest for the
    /// default algorithm is installed; nothing is written until `update()`.
    pub fn create<P: AsRef<Path>>(base_dir: P) -> Result<Bag> {
        let base_dir = base_dir.as_ref();
        info!("Creating bag in {}", base_dir.display());

        if base_dir.exists() {
            let mut entries =
                fs::read_dir(base_dir).context(IoReadDirSnafu { path: base_dir })?;
            if entries.next().is_some() {
                return Err(DirectoryNotEmpty {
                    path: base_dir.into(),
                });
            }
        } else {
            fs::create_dir_all(base_dir).context(IoCreateSnafu { path: base_dir })?;
        }

        let data_dir = base_dir.join(DATA);
        fs::create_dir_all(&data_dir).context(IoCreateSnafu { path: &data_dir })?;

        let mut bag = Bag::empty(base_dir);
        bag.payload_manifests.insert(
            DEFAULT_ALGORITHM,
            Manifest::new(ManifestKind::Payload, DEFAULT_ALGORITHM),
        );
        bag.changed = true;

        Ok(bag)
    }

    /// Opens a bag that already exists in the specified directory. Structural problems
    /// with the bag are recorded as errors and warnings rather than failing the load;
    /// only environmental failures return an error.
    pub fn load<P: AsRef<Path>>(base_dir: P) -> Result<Bag> {
        let base_dir = base_dir.as_ref();
        info!("Opening bag at {}", base_dir.display());

        let mut bag = Bag::empty(base_dir);
        bag.load_internal()?;
        bag.loaded = true;

        Ok(bag)
    }

    fn empty(base_dir: &Path) -> Bag {
        Bag {
            base_dir: base_dir.into(),
            declaration: BagDeclaration::new(),
            extended: false,
            payload_manifests: HashMap::new(),
            tag_manifests: HashMap::new(),
            bag_info: BagInfo::new(),
            fetch: FetchList::new(),
            issues: IssueLog::new(),
            changed: false,
            loaded: false,
            downloader: Box::new(DisabledDownloader),
            clock: Box::new(SystemClock),
        }
    }

    /// Replaces the downloader used to materialize fetch entries
    pub fn set_downloader(&mut self, downloader: Box<dyn Downloader>) {
        self.downloader = downloader;
    }

    /// Replaces the clock used to stamp Bagging-Date
    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.clock = clock;
    }

    /// Copies `src` into the payload at the payload-relative path `dest`. Intermediate
    /// directories are created. Manifests are not recomputed until `update()`.
    pub fn add_file<S: AsRef<Path>>(&mut self, src: S, dest: &str) -> Result<()> {
        let src = src.as_ref();

        if !src.is_file() {
            return Err(SourceNotFound { path: src.into() });
        }

        let dest = payload_dest(dest)?;

        if paths::is_reserved_name(&dest) {
            return Err(ReservedPath { path: dest });
        }
        if paths::has_illegal_chars(&dest) {
            warn!("Path {dest} contains characters that are not portable to Windows");
            self.issues
                .warn(&dest, "Path contains characters that are not portable to Windows");
        }

        let target = self.base_dir.join(&dest);
        fs::create_dir_all(target.parent().unwrap())
            .context(IoCreateSnafu { path: &target })?;
        copy(src, &target)?;

        self.changed = true;
        Ok(())
    }

    /// Deletes the payload file at the payload-relative path `dest` if it is present and
    /// prunes any directories left empty by the removal
    pub fn remove_file(&mut self, dest: &str) -> Result<()> {
        let dest = payload_dest(dest)?;
        let target = self.base_dir.join(&dest);

        if target.exists() {
            info!("Deleting payload file {}", target.display());
            fs::remove_file(&target).context(IoDeleteSnafu { path: &target })?;
            paths::prune_empty_parents(&self.base_dir, &dest)?;
        }

        self.changed = true;
        Ok(())
    }

    /// Adds a fetch entry and materializes its destination through the configured
    /// downloader. `destination` is bag-relative and must point into the payload.
    pub fn add_fetch(&mut self, url: &str, size: Option<u64>, destination: &str) -> Result<()> {
        self.fetch
            .add(url, size, destination, &self.base_dir, &*self.downloader)?;
        self.changed = true;
        Ok(())
    }

    /// Adds a manifest algorithm. A tag manifest is added as well when the bag is
    /// extended. Adding an algorithm that is already present has no effect.
    pub fn add_algorithm(&mut self, name: &str) -> Result<()> {
        let algorithm = DigestAlgorithm::try_from(name)?;

        self.payload_manifests
            .entry(algorithm)
            .or_insert_with(|| Manifest::new(ManifestKind::Payload, algorithm));
        if self.extended {
            self.tag_manifests
                .entry(algorithm)
                .or_insert_with(|| Manifest::new(ManifestKind::Tag, algorithm));
        }

        self.changed = true;
        Ok(())
    }

    /// Removes a manifest algorithm. Fails if it would leave the bag without manifests.
    pub fn remove_algorithm(&mut self, name: &str) -> Result<()> {
        let algorithm = DigestAlgorithm::try_from(name)?;

        if self.payload_manifests.contains_key(&algorithm) && self.payload_manifests.len() == 1 {
            return Err(LastAlgorithm {
                name: algorithm.to_string(),
            });
        }

        self.payload_manifests.remove(&algorithm);
        self.tag_manifests.remove(&algorithm);
        self.changed = true;
        Ok(())
    }

    /// Replaces all manifest algorithms with the one specified
    pub fn set_algorithm(&mut self, name: &str) -> Result<()> {
        let algorithm = DigestAlgorithm::try_from(name)?;

        self.payload_manifests.retain(|existing, _| *existing == algorithm);
        self.payload_manifests
            .entry(algorithm)
            .or_insert_with(|| Manifest::new(ManifestKind::Payload, algorithm));

        self.tag_manifests.retain(|existing, _| *existing == algorithm);
        if self.extended {
            self.tag_manifests
                .entry(algorithm)
                .or_insert_with(|| Manifest::new(ManifestKind::Tag, algorithm));
        }

        self.changed = true;
        Ok(())
    }

    /// Appends a bag-info tag. Generated tags cannot be set.
    pub fn set_bag_info_tag(&mut self, label: &str, value: &str) -> Result<()> {
        self.bag_info.add(label, value)?;
        self.changed = true;
        Ok(())
    }

    /// Removes every bag-info tag matching the label
    pub fn remove_bag_info_tag(&mut self, label: &str) {
        self.bag_info.remove_all(label);
        self.changed = true;
    }

    /// Removes the i-th occurrence of a bag-info tag, returning false if there is none
    pub fn remove_bag_info_tag_index(&mut self, label: &str, index: usize) -> bool {
        let removed = self.bag_info.remove_at(label, index);
        if removed {
            self.changed = true;
        }
        removed
    }

    pub fn get_bag_info_by_tag(&self, label: &str) -> Vec<&str> {
        self.bag_info.get_all(label)
    }

    pub fn has_bag_info_tag(&self, label: &str) -> bool {
        self.bag_info.has(label)
    }

    /// Turns the extended bag features on or off. When enabled, bag-info.txt and tag
    /// manifests mirroring the payload algorithms are persisted on update; when disabled
    /// they are deleted on update.
    pub fn set_extended(&mut self, extended: bool) {
        if extended {
            for algorithm in self.payload_manifests.keys() {
                self.tag_manifests
                    .entry(*algorithm)
                    .or_insert_with(|| Manifest::new(ManifestKind::Tag, *algorithm));
            }
        } else {
            self.tag_manifests.clear();
        }

        self.extended = extended;
        self.changed = true;
    }

    /// Sets the tag file encoding. The label must be a recognized character set.
    pub fn set_file_encoding(&mut self, label: &str) -> Result<()> {
        self.declaration = BagDeclaration::with_values(self.declaration.version(), label)?;
        self.changed = true;
        Ok(())
    }

    /// Sets the BagIt version the bag declares
    pub fn set_version(&mut self, major: u8, minor: u8) -> Result<()> {
        self.declaration =
            BagDeclaration::with_values(BagItVersion::new(major, minor), self.declaration.encoding())?;
        self.changed = true;
        Ok(())
    }

    /// Flushes the in-memory state to disk: the declaration, payload manifests, fetch
    /// list, and, for extended bags, bag-info and tag manifests. Manifest files for
    /// algorithms that are no longer configured are removed, as are bag-info and tag
    /// manifests when the bag is not extended.
    pub fn update(&mut self) -> Result<()> {
        info!("Updating bag at {}", self.base_dir.display());

        let data_dir = self.base_dir.join(DATA);
        fs::create_dir_all(&data_dir).context(IoCreateSnafu { path: &data_dir })?;

        write_bag_declaration(&self.declaration, &self.base_dir)?;
        let encoding = self.declaration.char_encoding();

        let algorithms: Vec<DigestAlgorithm> =
            self.payload_manifests.keys().copied().collect();
        let payload_meta =
            calculate_digests(&data_dir, &self.base_dir, &algorithms, |_| true)?;

        delete_payload_manifests(&self.base_dir)?;
        for manifest in self.payload_manifests.values_mut() {
            manifest.set_entries(entries_for(&payload_meta, manifest.algorithm()));
            manifest.write(&self.base_dir, encoding)?;
        }

        self.fetch.write(&self.base_dir, encoding)?;

        delete_tag_manifests(&self.base_dir)?;
        if self.extended {
            for algorithm in algorithms.iter() {
                self.tag_manifests
                    .entry(*algorithm)
                    .or_insert_with(|| Manifest::new(ManifestKind::Tag, *algorithm));
            }

            self.bag_info.set_generated(
                build_payload_oxum(&payload_meta),
                self.clock.today().format("%Y-%m-%d").to_string(),
            );
            write_bag_info(&self.bag_info, &self.base_dir, encoding)?;

            let tag_algorithms: Vec<DigestAlgorithm> =
                self.tag_manifests.keys().copied().collect();
            let tag_meta = calculate_digests(
                &self.base_dir,
                &self.base_dir,
                &tag_algorithms,
                manifest::is_tag_file,
            )?;
            for manifest in self.tag_manifests.values_mut() {
                manifest.set_entries(entries_for(&tag_meta, manifest.algorithm()));
                manifest.write(&self.base_dir, encoding)?;
            }
        } else {
            let bag_info_path = self.base_dir.join(BAG_INFO_TXT);
            if let Err(e) = fs::remove_file(&bag_info_path) {
                if e.kind() != ErrorKind::NotFound {
                    return Err(IoDelete {
                        path: bag_info_path,
                        source: e,
                    });
                }
            }
        }

        self.changed = false;
        Ok(())
    }

    /// Verifies the bag against its manifests. If the bag has unflushed changes it is
    /// updated and reloaded first. Fetch entries are materialized before any manifest is
    /// checked. Returns true iff no errors were found; the detailed findings are
    /// available through `errors()` and `warnings()`.
    pub fn validate(&mut self) -> Result<bool> {
        if self.changed {
            self.update()?;
        }
        self.reload()?;

        let mut issues = IssueLog::new();

        issues.merge(
            self.fetch
                .download_missing(&self.base_dir, &*self.downloader),
        );

        if !self.base_dir.join(DATA).is_dir() {
            issues.error(DATA, "Payload directory does not exist");
        }

        for manifest in self.payload_manifests.values() {
            issues.merge(manifest.validate(&self.base_dir));
        }

        if self.extended {
            for algorithm in self.payload_manifests.keys() {
                if !self.tag_manifests.contains_key(algorithm) {
                    issues.error(
                        ManifestKind::Tag.filename(*algorithm),
                        format!("Tag manifest for algorithm {algorithm} is missing"),
                    );
                }
            }

            for manifest in self.tag_manifests.values() {
                issues.merge(manifest.validate(&self.base_dir));
            }

            if let Some(declared) = self.bag_info.get_all(LABEL_PAYLOAD_OXUM).first() {
                match self.compute_payload_oxum() {
                    Ok(computed) => {
                        if *declared != computed {
                            issues.error(
                                BAG_INFO_TXT,
                                format!(
                                    "{LABEL_PAYLOAD_OXUM} is {declared} but the payload is {computed}"
                                ),
                            );
                        }
                    }
                    Err(e) => issues.error(BAG_INFO_TXT, e.to_string()),
                }
            }
        }

        self.issues.merge(issues);
        Ok(!self.issues.has_errors())
    }

    /// Deletes the payload files that were materialized from fetch entries
    pub fn finalize(&mut self) -> Result<()> {
        self.fetch.finalize(&self.base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Joins a bag-relative path to the bag's base directory. Absolute paths already
    /// under the base directory are returned unchanged.
    pub fn make_absolute(&self, rel: &str) -> PathBuf {
        paths::make_absolute(&self.base_dir, rel)
    }

    /// Returns the bag-relative forward-slash form of the path, or an empty string when
    /// the path does not lie under the bag
    pub fn make_relative<P: AsRef<Path>>(&self, path: P) -> String {
        paths::make_relative(&self.base_dir, path.as_ref())
    }

    /// True if the path points into the bag's payload directory
    pub fn path_in_payload(&self, rel: &str) -> bool {
        let absolute = self.make_absolute(rel);
        paths::in_payload(&self.make_relative(absolute))
    }

    pub fn declaration(&self) -> &BagDeclaration {
        &self.declaration
    }

    pub fn version(&self) -> BagItVersion {
        self.declaration.version()
    }

    pub fn file_encoding(&self) -> &str {
        self.declaration.encoding()
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn bag_info(&self) -> &BagInfo {
        &self.bag_info
    }

    pub fn fetch_items(&self) -> &[FetchItem] {
        self.fetch.items()
    }

    pub fn errors(&self) -> &[BagIssue] {
        self.issues.errors()
    }

    pub fn warnings(&self) -> &[BagIssue] {
        self.issues.warnings()
    }

    /// The algorithms with configured payload manifests, sorted
    pub fn algorithms(&self) -> Vec<DigestAlgorithm> {
        let mut algorithms: Vec<DigestAlgorithm> =
            self.payload_manifests.keys().copied().collect();
        algorithms.sort();
        algorithms
    }

    pub fn payload_manifests(&self) -> impl Iterator<Item = &Manifest> {
        self.payload_manifests.values()
    }

    pub fn tag_manifests(&self) -> impl Iterator<Item = &Manifest> {
        self.tag_manifests.values()
    }

    /// The union of the paths listed across all payload manifests
    pub fn payload_files(&self) -> BTreeSet<String> {
        let mut files = BTreeSet::new();
        for manifest in self.payload_manifests.values() {
            files.extend(manifest.paths().map(String::from));
        }
        files
    }

    /// Re-reads the bag from disk, discarding in-memory component state
    fn reload(&mut self) -> Result<()> {
        info!("Reloading bag at {}", self.base_dir.display());

        self.declaration = BagDeclaration::new();
        self.extended = false;
        self.payload_manifests.clear();
        self.tag_manifests.clear();
        self.bag_info = BagInfo::new();
        self.fetch = FetchList::new();

        self.load_internal()?;
        self.loaded = true;
        self.changed = false;
        Ok(())
    }

    fn load_internal(&mut self) -> Result<()> {
        self.issues.clear();

        match read_bag_declaration(&self.base_dir) {
            Ok(declaration) => self.declaration = declaration,
            Err(IoRead { source, path }) => match source.kind() {
                ErrorKind::NotFound => self
                    .issues
                    .error(BAGIT_TXT, format!("{BAGIT_TXT} does not exist")),
                ErrorKind::PermissionDenied => self
                    .issues
                    .error(BAGIT_TXT, format!("{BAGIT_TXT} cannot be read")),
                _ => return Err(IoRead { source, path }),
            },
            Err(
                e @ (InvalidDeclaration { .. }
                | InvalidBagItVersion { .. }
                | UnsupportedVersion { .. }
                | UnsupportedEncoding { .. }
                | InvalidString { .. }),
            ) => self.issues.error(BAGIT_TXT, e.to_string()),
            Err(e) => return Err(e),
        }

        let encoding = self.declaration.char_encoding();

        self.load_manifests(ManifestKind::Payload, encoding)?;
        if self.payload_manifests.is_empty() {
            self.issues
                .error("manifest-*.txt", "No payload manifest files found");
        }

        self.load_manifests(ManifestKind::Tag, encoding)?;
        self.extended =
            self.base_dir.join(BAG_INFO_TXT).is_file() || !self.tag_manifests.is_empty();

        if self.base_dir.join(BAG_INFO_TXT).is_file() {
            let (bag_info, issues) =
                read_bag_info(&self.base_dir, encoding, self.declaration.version())?;
            self.bag_info = bag_info;
            self.issues.merge(issues);
        }

        if self.base_dir.join(FETCH_TXT).is_file() {
            let (fetch, issues) = FetchList::load(&self.base_dir, encoding)?;
            self.fetch = fetch;
            self.issues.merge(issues);
        }

        Ok(())
    }

    fn load_manifests(
        &mut self,
        kind: ManifestKind,
        encoding: &'static encoding_rs::Encoding,
    ) -> Result<()> {
        let matcher: &Regex = match kind {
            ManifestKind::Payload => &PAYLOAD_MANIFEST_MATCHER,
            ManifestKind::Tag => &TAG_MANIFEST_MATCHER,
        };

        let mut found = Vec::new();
        for_matching_files(&self.base_dir, matcher, |path, captures| {
            if let Some(name) = path.file_name().and_then(OsStr::to_str) {
                found.push((
                    name.to_string(),
                    captures.get(1).unwrap().as_str().to_string(),
                ));
            }
        })?;

        for (filename, algorithm_name) in found {
            let algorithm = match DigestAlgorithm::try_from(algorithm_name.as_str()) {
                Ok(algorithm) => algorithm,
                Err(_) => {
                    self.issues.error(
                        &filename,
                        format!("Unsupported digest algorithm {algorithm_name}"),
                    );
                    continue;
                }
            };

            let exists = match kind {
                ManifestKind::Payload => self.payload_manifests.contains_key(&algorithm),
                ManifestKind::Tag => self.tag_manifests.contains_key(&algorithm),
            };
            if exists {
                self.issues.error(
                    &filename,
                    format!("Duplicate manifest for algorithm {algorithm}"),
                );
                continue;
            }

            let (manifest, issues) = Manifest::load(kind, algorithm, &self.base_dir, encoding)?;
            self.issues.merge(issues);

            match kind {
                ManifestKind::Payload => self.payload_manifests.insert(algorithm, manifest),
                ManifestKind::Tag => self.tag_manifests.insert(algorithm, manifest),
            };
        }

        Ok(())
    }

    /// Sums the payload's octets and file count into the Payload-Oxum form
    fn compute_payload_oxum(&self) -> Result<String> {
        let data_dir = self.base_dir.join(DATA);
        if !data_dir.is_dir() {
            return Ok("0.0".into());
        }

        let mut sum: u64 = 0;
        let mut count: u64 = 0;

        for file in WalkDir::new(&data_dir) {
            let file = file.context(WalkFileSnafu {})?;
            if file.file_type().is_file() {
                let metadata = file.metadata().context(WalkFileSnafu {})?;
                sum += metadata.len();
                count += 1;
            }
        }

        Ok(format!("{sum}.{count}"))
    }
}

/// Normalizes a payload-relative destination into the canonical `data/` prefixed form,
/// rejecting paths that escape the payload
fn payload_dest(dest: &str) -> Result<String> {
    let dest = paths::convert_path_separator(dest);
    let joined = format!("{DATA}/{dest}");

    match paths::lexical_resolve(Path::new(&joined)) {
        Some(resolved) => {
            let resolved = paths::to_forward_slash(&resolved);
            if paths::in_payload(&resolved) {
                Ok(resolved)
            } else {
                Err(OutsidePayload { path: dest.into() })
            }
        }
        None => Err(OutsidePayload { path: dest.into() }),
    }
}

/// Calculates the digests for all of the files under `walk_root`, returning paths
/// relative to `rel_root` in forward-slash form
fn calculate_digests<P>(
    walk_root: &Path,
    rel_root: &Path,
    algorithms: &[DigestAlgorithm],
    predicate: P,
) -> Result<Vec<FileMeta>>
where
    P: FnMut(&DirEntry) -> bool,
{
    let mut file_meta = Vec::new();

    for file in WalkDir::new(walk_root).into_iter().filter_entry(predicate) {
        let file = file.context(WalkFileSnafu {})?;

        if file.file_type().is_file() {
            let metadata = file.metadata().context(WalkFileSnafu {})?;

            info!("Calculating digests for {}", file.path().display());

            let mut writer = MultiDigestWriter::new(algorithms, io::sink());
            let mut reader = File::open(file.path()).context(IoReadSnafu { path: file.path() })?;

            io::copy(&mut reader, &mut writer).context(IoReadSnafu { path: file.path() })?;

            let relative = file.path().strip_prefix(rel_root).unwrap();
            if relative.to_str().is_none() {
                return Err(InvalidUtf8Path {
                    path: file.path().to_path_buf(),
                });
            }

            file_meta.push(FileMeta {
                path: paths::to_forward_slash(relative),
                size_bytes: metadata.len(),
                digests: writer.finalize_hex(),
            });
        } else if !file.file_type().is_dir() {
            return Err(UnsupportedFile {
                path: file.path().to_path_buf(),
            });
        }
    }

    Ok(file_meta)
}

/// Projects the digests for one algorithm out of the collected file meta
fn entries_for(
    file_meta: &[FileMeta],
    algorithm: DigestAlgorithm,
) -> BTreeMap<String, HexDigest> {
    file_meta
        .iter()
        .map(|meta| {
            let digest = meta
                .digests
                .get(&algorithm)
                .expect("Missing expected file digest");
            (meta.path.clone(), digest.clone())
        })
        .collect()
}

fn copy<F: AsRef<Path>, T: AsRef<Path>>(from: F, to: T) -> Result<()> {
    let from = from.as_ref();
    let to = to.as_ref();
    info!("Copying {} to {}", from.display(), to.display());
    fs::copy(from, to)
        .map(|_| ())
        .context(IoCopySnafu { from, to })
}

/// Deletes all payload manifests in the base directory
fn delete_payload_manifests<P: AsRef<Path>>(base_dir: P) -> Result<()> {
    delete_matching_files(base_dir, &PAYLOAD_MANIFEST_MATCHER)
}

/// Deletes all tag manifests in the base directory
fn delete_tag_manifests<P: AsRef<Path>>(base_dir: P) -> Result<()> {
    delete_matching_files(base_dir, &TAG_MANIFEST_MATCHER)
}

fn delete_matching_files<P: AsRef<Path>>(base_dir: P, file_regex: &Regex) -> Result<()> {
    for_matching_files(base_dir, file_regex, |path, _| {
        info!("Deleting file {}", path.display());
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != ErrorKind::NotFound {
                error!("Failed to delete file {}: {e}", path.display())
            }
        }
    })
}

/// Iterates the files in a directory and applies `on_match` to the ones with file names
/// that match `file_regex`. `on_match` receives the path to the matched file as well as
/// the captures from the match.
fn for_matching_files<P, M>(base_dir: P, file_regex: &Regex, mut on_match: M) -> Result<()>
where
    P: AsRef<Path>,
    M: FnMut(&Path, &Captures),
{
    let base_dir = base_dir.as_ref();

    for file in fs::read_dir(base_dir).context(IoReadDirSnafu { path: base_dir })? {
        let file = file.context(IoReadDirSnafu { path: base_dir })?;
        if file
            .file_type()
            .context(IoStatSnafu { path: file.path() })?
            .is_file()
        {
            if let Some(file_name) = file.file_name().to_str() {
                if let Some(captures) = file_regex.captures(file_name) {
                    on_match(&file.path(), &captures);
                }
            }
        }
    }

    Ok(())
}

fn build_payload_oxum(file_meta: &[FileMeta]) -> String {
    let count = file_meta.len();
    let mut sum = 0;
    for meta in file_meta {
        sum += meta.size_bytes;
    }
    format!("{sum}.{count}")
}

#[cfg(test)]
mod tests {
    use crate::bagit::bag::{payload_dest, BagItVersion};

    #[test]
    fn version_parsing() {
        assert_eq!(
            BagItVersion::new(1, 0),
            BagItVersion::try_from(&"1.0".to_string()).unwrap()
        );
        assert_eq!(
            BagItVersion::new(0, 97),
            BagItVersion::try_from(&"0.97".to_string()).unwrap()
        );
        assert!(BagItVersion::try_from(&"1".to_string()).is_err());
        assert!(BagItVersion::try_from(&"a.b".to_string()).is_err());
        assert_eq!("1.0", BagItVersion::new(1, 0).to_string());
    }

    #[test]
    fn version_ordering() {
        assert!(BagItVersion::new(1, 0) > BagItVersion::new(0, 97));
    }

    #[test]
    fn payload_destinations_are_normalized() {
        assert_eq!("data/a.txt", payload_dest("a.txt").unwrap());
        assert_eq!("data/sub/b.txt", payload_dest("sub/b.txt").unwrap());
        assert_eq!("data/c.txt", payload_dest("sub/../c.txt").unwrap());
        assert!(payload_dest("../escape.txt").is_err());
        assert!(payload_dest("..").is_err());
        assert!(payload_dest("").is_err());
    }
}

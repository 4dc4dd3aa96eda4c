use crate::bagit::bag::BagItVersion;
use crate::bagit::DigestAlgorithm;
use once_cell::sync::Lazy;
use regex::Regex;

pub static PAYLOAD_MANIFEST_MATCHER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^manifest-([a-z0-9-]+)\.txt$").unwrap());
pub static TAG_MANIFEST_MATCHER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^tagmanifest-([a-z0-9-]+)\.txt$").unwrap());

/// Matches the start of a new bag-info entry. Captures the whitespace around the label so
/// version-specific lint can flag it.
pub static BAG_INFO_TAG_MATCHER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)([^:]+?)(\s*):\s+(.*)$").unwrap());

/// Matches a manifest entry: digest, one or more spaces, path
pub static MANIFEST_LINE_MATCHER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-fA-F0-9]+)\s+(.*)$").unwrap());

/// Matches a fetch entry: url, size or dash, destination path
pub static FETCH_LINE_MATCHER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)\s+(\d+|-)\s+(.*)$").unwrap());

pub const BAGIT_1_0: BagItVersion = BagItVersion::new(1, 0);
pub const BAGIT_0_97: BagItVersion = BagItVersion::new(0, 97);
pub const BAGIT_DEFAULT_VERSION: BagItVersion = BAGIT_1_0;

pub const DEFAULT_ALGORITHM: DigestAlgorithm = DigestAlgorithm::Sha512;

pub const UTF_8: &str = "UTF-8";

pub const CR: char = '\r';
pub const LF: char = '\n';
pub const TAB: char = '\t';
pub const SPACE: char = ' ';
pub const CR_B: u8 = b'\r';
pub const LF_B: u8 = b'\n';
pub const BUF_SIZE: usize = 8 * 1024;

/// Serialized bag-info lines are folded at this many bytes
pub const BAG_INFO_LINE_LIMIT: usize = 78;
pub const CONTINUATION_INDENT: &str = "  ";

// Filenames
pub const BAGIT_TXT: &str = "bagit.txt";
pub const BAG_INFO_TXT: &str = "bag-info.txt";
pub const FETCH_TXT: &str = "fetch.txt";
pub const DATA: &str = "data";
pub const DATA_PREFIX: &str = "data/";
pub const PAYLOAD_MANIFEST_PREFIX: &str = "manifest";
pub const TAG_MANIFEST_PREFIX: &str = "tagmanifest";

// bagit.txt tag labels
pub const LABEL_BAGIT_VERSION: &str = "BagIt-Version";
pub const LABEL_FILE_ENCODING: &str = "Tag-File-Character-Encoding";

// bag-info.txt reserved labels
pub const LABEL_BAGGING_DATE: &str = "Bagging-Date";
pub const LABEL_PAYLOAD_OXUM: &str = "Payload-Oxum";

/// Labels whose values are regenerated on every update and must not be set by callers.
/// All label names are lowercased here.
pub const GENERATED_LABELS: [&str; 2] = ["payload-oxum", "bagging-date"];

/// Labels that must not repeat; a second occurrence is an error
pub const MUST_NOT_REPEAT: [&str; 1] = ["payload-oxum"];

/// Labels that should not repeat; a second occurrence is a warning
pub const SHOULD_NOT_REPEAT: [&str; 4] = [
    "bagging-date",
    "bag-size",
    "bag-group-identifier",
    "bag-count",
];

/// File names that cannot be stored on Windows regardless of extension handling
pub const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Characters that are legal in BagIt paths but not on Windows; flagged as warnings
pub const ILLEGAL_CHARS: [char; 7] = ['<', '>', ':', '"', '|', '?', '*'];

// Fetch URL schemes accepted by the reference downloader contract
pub const SCHEME_HTTP: &str = "http";
pub const SCHEME_HTTPS: &str = "https";

use crate::bagit::bag::BagItVersion;
use snafu::prelude::*;
use std::path::PathBuf;
use std::string::FromUtf8Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("IO error: {}", source))]
    IoGeneral { source: std::io::Error },
    #[snafu(display("Error creating file {}: {}", path.display(), source))]
    IoCreate {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error writing to file {}: {}", path.display(), source))]
    IoWrite {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error reading file {}: {}", path.display(), source))]
    IoRead {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error reading directory {}: {}", path.display(), source))]
    IoReadDir {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Failed to copy {} to {}: {}", from.display(), to.display(), source))]
    IoCopy {
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },
    #[snafu(display("Failed to delete {}: {}", path.display(), source))]
    IoDelete {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Failed to stat {}: {}", path.display(), source))]
    IoStat {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error walking files: {}", source))]
    WalkFile { source: walkdir::Error },
    #[snafu(display("Encountered an unsupported file type at {}", path.display()))]
    UnsupportedFile { path: PathBuf },
    #[snafu(display("Path {} is not valid UTF-8", path.display()))]
    InvalidUtf8Path { path: PathBuf },
    #[snafu(display("Failed to decode string: {source}"))]
    InvalidString { source: FromUtf8Error },
    #[snafu(display("Failed to decode text as {encoding}"))]
    DecodeText { encoding: String },
    #[snafu(display("Failed to encode text as {encoding}"))]
    EncodeText { encoding: String },
    #[snafu(display("Source file {} does not exist", path.display()))]
    SourceNotFound { path: PathBuf },
    #[snafu(display("Directory {} is not empty", path.display()))]
    DirectoryNotEmpty { path: PathBuf },
    #[snafu(display("Invalid tag line: {details}"))]
    InvalidTagLine { details: String },
    #[snafu(display("Line {num} in file {} is invalid: {details}", path.display()))]
    InvalidTagLineWithRef {
        path: PathBuf,
        num: u32,
        details: String,
    },
    #[snafu(display("Invalid tag with label '{label}': {details}"))]
    InvalidTag { label: String, details: String },
    #[snafu(display("Invalid BagIt version: {value}"))]
    InvalidBagItVersion { value: String },
    #[snafu(display("Missing required tag {tag}"))]
    MissingTag { tag: String },
    #[snafu(display("File {} is malformed: {details}", path.display()))]
    InvalidDeclaration { path: PathBuf, details: String },
    #[snafu(display("Unsupported BagIt version {version}"))]
    UnsupportedVersion { version: BagItVersion },
    #[snafu(display("Unsupported file encoding {encoding}"))]
    UnsupportedEncoding { encoding: String },
    #[snafu(display("Unsupported digest algorithm {name}"))]
    UnsupportedAlgorithm { name: String },
    #[snafu(display("Unsupported URL scheme: {url}"))]
    UnsupportedScheme { url: String },
    #[snafu(display("Invalid URL: {url}"))]
    InvalidUrl { url: String },
    #[snafu(display("No downloader is configured to fetch {url}"))]
    NoDownloader { url: String },
    #[snafu(display("Path {path} resolves outside of the bag payload"))]
    OutsidePayload { path: String },
    #[snafu(display("Fetch destination {path} already exists in the bag"))]
    FetchTargetExists { path: String },
    #[snafu(display("Path {path} uses a reserved file name"))]
    ReservedPath { path: String },
    #[snafu(display("Tag {label} is generated and cannot be set directly"))]
    GeneratedTag { label: String },
    #[snafu(display("Removing algorithm {name} would leave the bag without manifests"))]
    LastAlgorithm { name: String },
    #[snafu(display("Downloaded {actual} bytes from {url} but expected {expected}"))]
    FetchSizeMismatch {
        url: String,
        expected: u64,
        actual: u64,
    },
    #[snafu(display("Failed to fetch {url}: {details}"))]
    FetchFailed { url: String, details: String },
}

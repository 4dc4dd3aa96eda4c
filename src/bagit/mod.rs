pub use crate::bagit::bag::{Bag, BagItVersion, Clock, SystemClock};
pub use crate::bagit::digest::{DigestAlgorithm, HexDigest, MultiDigestWriter};
pub use crate::bagit::error::*;
pub use crate::bagit::fetch::{DisabledDownloader, Downloader, FetchItem, FetchList};
pub use crate::bagit::manifest::{Manifest, ManifestKind};
pub use crate::bagit::tag::{BagDeclaration, BagInfo, Tag};
pub use crate::bagit::validate::BagIssue;

mod bag;
mod consts;
mod digest;
mod encoding;
mod error;
mod fetch;
mod io;
mod manifest;
mod paths;
mod tag;
mod validate;

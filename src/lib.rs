//! A library for creating, updating, and validating BagIt bags per RFC 8493.
//!
//! A [`Bag`](bagit::Bag) is mutated entirely in memory and flushed to disk by
//! [`update()`](bagit::Bag::update). [`validate()`](bagit::Bag::validate) cross-checks
//! every manifest against the filesystem and reports its findings as errors and
//! warnings.
//!
//! ```no_run
//! use bagkit::bagit::Bag;
//!
//! # fn main() -> bagkit::bagit::Result<()> {
//! let mut bag = Bag::create("/var/tmp/example-bag")?;
//! bag.add_file("/tmp/report.pdf", "report.pdf")?;
//! bag.update()?;
//! assert!(bag.validate()?);
//! # Ok(())
//! # }
//! ```

pub mod bagit;

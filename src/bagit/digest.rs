use crate::bagit::error::Error::UnsupportedAlgorithm;
use crate::bagit::error::*;
use digest::DynDigest;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::{fmt, io};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// The digest algorithms bags may use for payload and tag manifests
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, EnumIter)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
}

/// A lowercase hex encoded digest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HexDigest(String);

/// Writer proxy that computes any number of digests as the stream is written
pub struct MultiDigestWriter<T: Write> {
    digesters: HashMap<DigestAlgorithm, Box<dyn DynDigest>>,
    inner: T,
}

impl DigestAlgorithm {
    /// The algorithm's name as used in manifest file names, eg `sha3-256`
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha224 => "sha224",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
            DigestAlgorithm::Sha3_224 => "sha3-224",
            DigestAlgorithm::Sha3_256 => "sha3-256",
            DigestAlgorithm::Sha3_384 => "sha3-384",
            DigestAlgorithm::Sha3_512 => "sha3-512",
        }
    }

    /// The algorithm's normalized registry name, eg `sha3256`
    pub fn normalized(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha3_224 => "sha3224",
            DigestAlgorithm::Sha3_256 => "sha3256",
            DigestAlgorithm::Sha3_384 => "sha3384",
            DigestAlgorithm::Sha3_512 => "sha3512",
            other => other.name(),
        }
    }

    /// The number of hex characters in a digest produced by the algorithm
    pub fn hex_len(&self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 32,
            DigestAlgorithm::Sha1 => 40,
            DigestAlgorithm::Sha224 | DigestAlgorithm::Sha3_224 => 56,
            DigestAlgorithm::Sha256 | DigestAlgorithm::Sha3_256 => 64,
            DigestAlgorithm::Sha384 | DigestAlgorithm::Sha3_384 => 96,
            DigestAlgorithm::Sha512 | DigestAlgorithm::Sha3_512 => 128,
        }
    }

    /// Strips non-alphanumeric characters and lowercases, mapping any accepted spelling
    /// onto the registry name
    pub fn normalize_name(name: &str) -> String {
        name.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect()
    }

    /// All of the algorithms this build can compute
    pub fn all_supported() -> Vec<DigestAlgorithm> {
        DigestAlgorithm::iter().collect()
    }

    pub fn is_supported(name: &str) -> bool {
        DigestAlgorithm::try_from(name).is_ok()
    }

    fn digester(&self) -> Box<dyn DynDigest> {
        match self {
            DigestAlgorithm::Md5 => Box::<Md5>::default(),
            DigestAlgorithm::Sha1 => Box::<Sha1>::default(),
            DigestAlgorithm::Sha224 => Box::<Sha224>::default(),
            DigestAlgorithm::Sha256 => Box::<Sha256>::default(),
            DigestAlgorithm::Sha384 => Box::<Sha384>::default(),
            DigestAlgorithm::Sha512 => Box::<Sha512>::default(),
            DigestAlgorithm::Sha3_224 => Box::<Sha3_224>::default(),
            DigestAlgorithm::Sha3_256 => Box::<Sha3_256>::default(),
            DigestAlgorithm::Sha3_384 => Box::<Sha3_384>::default(),
            DigestAlgorithm::Sha3_512 => Box::<Sha3_512>::default(),
        }
    }
}

impl Display for DigestAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<&str> for DigestAlgorithm {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        let normalized = DigestAlgorithm::normalize_name(value);
        DigestAlgorithm::iter()
            .find(|algorithm| algorithm.normalized() == normalized)
            .ok_or_else(|| UnsupportedAlgorithm { name: value.into() })
    }
}

impl HexDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HexDigest {
    fn from(value: &str) -> Self {
        Self(value.to_ascii_lowercase())
    }
}

impl From<String> for HexDigest {
    fn from(value: String) -> Self {
        Self(value.to_ascii_lowercase())
    }
}

impl Display for HexDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Write> MultiDigestWriter<T> {
    pub fn new(algorithms: &[DigestAlgorithm], inner: T) -> Self {
        Self {
            digesters: algorithms
                .iter()
                .map(|algorithm| (*algorithm, algorithm.digester()))
                .collect(),
            inner,
        }
    }

    pub fn finalize_hex(mut self) -> HashMap<DigestAlgorithm, HexDigest> {
        self.digesters
            .iter_mut()
            .map(|(algorithm, digester)| {
                (*algorithm, HexDigest::from(hex::encode(digester.finalize_reset())))
            })
            .collect()
    }
}

impl<T: Write> Write for MultiDigestWriter<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        for digester in self.digesters.values_mut() {
            digester.update(&buf[..written]);
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use crate::bagit::digest::{DigestAlgorithm, MultiDigestWriter};
    use std::io::Write;

    #[test]
    fn names_normalize_to_registry_entries() {
        assert_eq!(
            DigestAlgorithm::Sha3_256,
            DigestAlgorithm::try_from("SHA3-256").unwrap()
        );
        assert_eq!(
            DigestAlgorithm::Sha512,
            DigestAlgorithm::try_from("sha_512").unwrap()
        );
        assert_eq!(DigestAlgorithm::Md5, DigestAlgorithm::try_from("MD5").unwrap());
        assert!(DigestAlgorithm::try_from("crc32").is_err());
    }

    #[test]
    fn names_keep_dashes() {
        assert_eq!("sha3-256", DigestAlgorithm::Sha3_256.to_string());
        assert_eq!("sha512", DigestAlgorithm::Sha512.to_string());
    }

    #[test]
    fn multi_digest_writer_computes_all_algorithms() {
        let algorithms = [DigestAlgorithm::Md5, DigestAlgorithm::Sha256];
        let mut writer = MultiDigestWriter::new(&algorithms, std::io::sink());

        writer.write_all(b"hi\n").unwrap();
        let digests = writer.finalize_hex();

        assert_eq!(
            "764efa883dda1e11db47671c4a3bbd9e",
            digests.get(&DigestAlgorithm::Md5).unwrap().as_str()
        );
        assert_eq!(
            "98ea6e4f216f2fb4b69fff9b3a44842c38686ca685f3f55dc48c5d3fb1107be4",
            digests.get(&DigestAlgorithm::Sha256).unwrap().as_str()
        );
    }

    #[test]
    fn every_algorithm_is_supported() {
        for algorithm in DigestAlgorithm::all_supported() {
            assert!(DigestAlgorithm::is_supported(algorithm.name()));
            assert!(DigestAlgorithm::is_supported(algorithm.normalized()));
        }
    }
}

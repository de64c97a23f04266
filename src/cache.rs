use crate::error::{Error, Result};
use crate::metadata::{MetadataKey, RawMetadata};

/// A parsed md5-cache entry.
///
/// Represents a single file from `metadata/md5-cache/<category>/<package>-<version>`.
/// The values are kept raw so that they can be handed to
/// [`Package::new`](crate::Package::new), which validates them.
///
/// See [PMS 14.2](https://projects.gentoo.org/pms/9/pms.html#mddict-cache-file-format).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The ebuild metadata.
    pub metadata: RawMetadata,

    /// MD5 checksum of the ebuild file (from `_md5_`).
    pub md5: Option<String>,

    /// Eclass inheritance list with checksums (from `_eclasses_`).
    ///
    /// Each tuple is `(eclass_name, checksum)`.
    pub eclasses: Vec<(String, String)>,
}

impl CacheEntry {
    /// Parse a md5-cache file's contents into a `CacheEntry`.
    ///
    /// Lines are `KEY=VALUE` pairs in arbitrary order and keys outside
    /// [`MetadataKey`] are ignored. `DESCRIPTION` and `SLOT` are mandatory.
    /// `INHERITED` is filled in from `_eclasses_` when the file lacks it.
    ///
    /// # Examples
    ///
    /// ```
    /// use portage_package::{CacheEntry, MetadataKey};
    ///
    /// let input = "\
    /// EAPI=7
    /// DESCRIPTION=Example package
    /// SLOT=0
    /// DEFINED_PHASES=compile install
    /// KEYWORDS=~amd64
    /// _eclasses_=toolchain-funcs\t24921b57
    /// ";
    /// let entry = CacheEntry::parse(input).unwrap();
    /// assert_eq!(entry.metadata[&MetadataKey::Description], "Example package");
    /// assert_eq!(entry.metadata[&MetadataKey::Inherited], "toolchain-funcs");
    /// ```
    pub fn parse(input: &str) -> Result<CacheEntry> {
        let mut metadata = RawMetadata::new();
        let mut md5 = None;
        let mut eclasses_raw = "";

        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| Error::InvalidCacheEntry(format!("line without '=': {line}")))?;
            match key {
                "_md5_" => md5 = Some(value.to_string()),
                "_eclasses_" => eclasses_raw = value,
                _ => {
                    if let Ok(key) = key.parse::<MetadataKey>() {
                        metadata.insert(key, value.to_string());
                    }
                }
            }
        }

        for key in [MetadataKey::Description, MetadataKey::Slot] {
            if metadata.get(&key).map_or(true, |value| value.is_empty()) {
                return Err(Error::MissingField(key.to_string()));
            }
        }

        let eclasses = parse_eclasses(eclasses_raw);
        if !eclasses.is_empty() {
            metadata.entry(MetadataKey::Inherited).or_insert_with(|| {
                let names: Vec<&str> = eclasses.iter().map(|(name, _)| name.as_str()).collect();
                names.join(" ")
            });
        }

        Ok(CacheEntry {
            metadata,
            md5,
            eclasses,
        })
    }

    /// Serialize this cache entry back to md5-cache format.
    ///
    /// Keys are written in sorted order. Empty-valued fields are omitted.
    pub fn serialize(&self) -> String {
        let mut lines: Vec<(&str, String)> = self
            .metadata
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.as_str(), value.clone()))
            .collect();

        if !self.eclasses.is_empty() {
            let parts: Vec<&str> = self
                .eclasses
                .iter()
                .flat_map(|(name, checksum)| [name.as_str(), checksum.as_str()])
                .collect();
            lines.push(("_eclasses_", parts.join("\t")));
        }
        if let Some(ref md5) = self.md5 {
            lines.push(("_md5_", md5.clone()));
        }
        lines.sort();

        let mut out = String::new();
        for (key, value) in lines {
            out.push_str(key);
            out.push('=');
            out.push_str(&value);
            out.push('\n');
        }
        out
    }
}

/// Parse the `_eclasses_` value: tab-separated pairs of `name\tchecksum`.
fn parse_eclasses(s: &str) -> Vec<(String, String)> {
    if s.is_empty() {
        return Vec::new();
    }
    let parts: Vec<&str> = s.split('\t').collect();
    parts
        .chunks(2)
        .filter_map(|chunk| match chunk {
            [name, checksum] => Some((name.to_string(), checksum.to_string())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RootConfig, Settings};
    use crate::package::{Package, PackageOptions, PackageType};

    const EXAMPLE_CACHE: &str = "\
DEFINED_PHASES=install test unpack
DEPEND=>=sys-devel/clang-10.0.0_rc1:* dev-python/setuptools
DESCRIPTION=Python bindings for sys-devel/clang
EAPI=7
HOMEPAGE=https://llvm.org/
IUSE=test python_targets_python3_6 python_targets_python3_7
KEYWORDS=~amd64 ~x86
LICENSE=Apache-2.0-with-LLVM-exceptions UoI-NCSA
RDEPEND=>=sys-devel/clang-10.0.0_rc1:*
REQUIRED_USE=|| ( python_targets_python3_6 python_targets_python3_7 )
RESTRICT=!test? ( test )
SLOT=0
SRC_URI=https://github.com/llvm/llvm-project/archive/llvmorg-10.0.0-rc1.tar.gz
_eclasses_=llvm.org\t4e92abc\tmultibuild\t40fe1234
_md5_=4539d849d3cea8ac84debad9b3154143
";

    #[test]
    fn parse_example() {
        let entry = CacheEntry::parse(EXAMPLE_CACHE).unwrap();
        let m = &entry.metadata;
        assert_eq!(m[&MetadataKey::Eapi], "7");
        assert_eq!(m[&MetadataKey::Description], "Python bindings for sys-devel/clang");
        assert_eq!(m[&MetadataKey::Slot], "0");
        assert_eq!(m[&MetadataKey::Restrict], "!test? ( test )");
        assert_eq!(m[&MetadataKey::Inherited], "llvm.org multibuild");
        assert!(!m.contains_key(&MetadataKey::Bdepend));
        assert_eq!(
            entry.md5,
            Some("4539d849d3cea8ac84debad9b3154143".to_string())
        );
        assert_eq!(entry.eclasses.len(), 2);
        assert_eq!(entry.eclasses[0].0, "llvm.org");
        assert_eq!(entry.eclasses[1].0, "multibuild");
    }

    #[test]
    fn feeds_a_package() {
        let entry = CacheEntry::parse(EXAMPLE_CACHE).unwrap();
        let settings = Settings {
            accept_keywords: vec!["~amd64".into()],
            ..Settings::default()
        };
        let pkg = Package::new(
            "dev-python/clang-python-10.0.0_rc1",
            PackageType::Ebuild,
            PackageOptions::default(),
            entry.metadata,
            RootConfig::new("/", settings),
        )
        .unwrap();
        assert!(pkg.invalid().is_none());
        assert_eq!(pkg.validated_atoms().len(), 2);
        assert!(pkg.inherited().contains("multibuild"));
        assert_eq!(pkg.restrict(), ["test"]);
    }

    #[test]
    fn missing_description() {
        let input = "EAPI=7\nSLOT=0\n";
        let err = CacheEntry::parse(input).unwrap_err();
        assert!(matches!(err, Error::MissingField(ref f) if f == "DESCRIPTION"));
    }

    #[test]
    fn missing_slot() {
        let err = CacheEntry::parse("EAPI=7\nDESCRIPTION=Test\n").unwrap_err();
        assert!(matches!(err, Error::MissingField(ref f) if f == "SLOT"));

        let err = CacheEntry::parse("DESCRIPTION=Test\nSLOT=\n").unwrap_err();
        assert!(matches!(err, Error::MissingField(ref f) if f == "SLOT"));
    }

    #[test]
    fn malformed_line() {
        let err = CacheEntry::parse("DESCRIPTION=Test\nSLOT=0\ngarbage\n").unwrap_err();
        assert!(matches!(err, Error::InvalidCacheEntry(_)));
    }

    #[test]
    fn explicit_inherited_wins() {
        let input = "DESCRIPTION=Test\nSLOT=0\nINHERITED=a\n_eclasses_=b\t123\n";
        let entry = CacheEntry::parse(input).unwrap();
        assert_eq!(entry.metadata[&MetadataKey::Inherited], "a");
    }

    #[test]
    fn parse_eclasses() {
        let eclasses = super::parse_eclasses("llvm.org\tabc123\tmultibuild\tdef456");
        assert_eq!(eclasses.len(), 2);
        assert_eq!(eclasses[0], ("llvm.org".to_string(), "abc123".to_string()));
        assert_eq!(
            eclasses[1],
            ("multibuild".to_string(), "def456".to_string())
        );
        assert!(super::parse_eclasses("").is_empty());
        // Odd number of tab-separated values: last one is ignored
        assert_eq!(super::parse_eclasses("llvm.org\tabc123\torphan").len(), 1);
    }

    #[test]
    fn serialize_sorted() {
        let entry = CacheEntry::parse(EXAMPLE_CACHE).unwrap();
        let serialized = entry.serialize();
        let keys: Vec<&str> = serialized
            .lines()
            .filter_map(|line| line.split_once('=').map(|(key, _)| key))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(serialized.ends_with("_md5_=4539d849d3cea8ac84debad9b3154143\n"));

        let reparsed = CacheEntry::parse(&serialized).unwrap();
        assert_eq!(entry, reparsed);
    }

    #[test]
    fn empty_values_omitted() {
        let input = "DESCRIPTION=Test\nSLOT=0\nHOMEPAGE=\nFOO=bar\n\n";
        let entry = CacheEntry::parse(input).unwrap();
        assert_eq!(entry.serialize(), "DESCRIPTION=Test\nSLOT=0\n");
    }
}

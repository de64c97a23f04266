use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::package::Package;

/// The fixed set of metadata keys a [`Package`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataKey {
    Bdepend,
    BuildId,
    BuildTime,
    Chost,
    Counter,
    DefinedPhases,
    Depend,
    Description,
    Eapi,
    Homepage,
    Idepend,
    Inherited,
    Iuse,
    Keywords,
    License,
    Md5,
    Pdepend,
    Properties,
    Provides,
    Rdepend,
    /// `repository`
    Repository,
    RequiredUse,
    Requires,
    Restrict,
    Size,
    Slot,
    SrcUri,
    Use,
    /// `_mtime_`
    Mtime,
}

impl MetadataKey {
    pub const ALL: [MetadataKey; 29] = [
        MetadataKey::Bdepend,
        MetadataKey::BuildId,
        MetadataKey::BuildTime,
        MetadataKey::Chost,
        MetadataKey::Counter,
        MetadataKey::DefinedPhases,
        MetadataKey::Depend,
        MetadataKey::Description,
        MetadataKey::Eapi,
        MetadataKey::Homepage,
        MetadataKey::Idepend,
        MetadataKey::Inherited,
        MetadataKey::Iuse,
        MetadataKey::Keywords,
        MetadataKey::License,
        MetadataKey::Md5,
        MetadataKey::Pdepend,
        MetadataKey::Properties,
        MetadataKey::Provides,
        MetadataKey::Rdepend,
        MetadataKey::Repository,
        MetadataKey::RequiredUse,
        MetadataKey::Requires,
        MetadataKey::Restrict,
        MetadataKey::Size,
        MetadataKey::Slot,
        MetadataKey::SrcUri,
        MetadataKey::Use,
        MetadataKey::Mtime,
    ];

    /// Dependency classes, in validation order.
    pub const DEPENDENCIES: [MetadataKey; 5] = [
        MetadataKey::Bdepend,
        MetadataKey::Depend,
        MetadataKey::Idepend,
        MetadataKey::Pdepend,
        MetadataKey::Rdepend,
    ];

    /// Keys whose values may contain USE conditionals meaningful to users.
    pub const USE_CONDITIONAL: [MetadataKey; 3] = [
        MetadataKey::License,
        MetadataKey::Properties,
        MetadataKey::Restrict,
    ];

    /// The key as spelled in metadata files.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataKey::Bdepend => "BDEPEND",
            MetadataKey::BuildId => "BUILD_ID",
            MetadataKey::BuildTime => "BUILD_TIME",
            MetadataKey::Chost => "CHOST",
            MetadataKey::Counter => "COUNTER",
            MetadataKey::DefinedPhases => "DEFINED_PHASES",
            MetadataKey::Depend => "DEPEND",
            MetadataKey::Description => "DESCRIPTION",
            MetadataKey::Eapi => "EAPI",
            MetadataKey::Homepage => "HOMEPAGE",
            MetadataKey::Idepend => "IDEPEND",
            MetadataKey::Inherited => "INHERITED",
            MetadataKey::Iuse => "IUSE",
            MetadataKey::Keywords => "KEYWORDS",
            MetadataKey::License => "LICENSE",
            MetadataKey::Md5 => "MD5",
            MetadataKey::Pdepend => "PDEPEND",
            MetadataKey::Properties => "PROPERTIES",
            MetadataKey::Provides => "PROVIDES",
            MetadataKey::Rdepend => "RDEPEND",
            MetadataKey::Repository => "repository",
            MetadataKey::RequiredUse => "REQUIRED_USE",
            MetadataKey::Requires => "REQUIRES",
            MetadataKey::Restrict => "RESTRICT",
            MetadataKey::Size => "SIZE",
            MetadataKey::Slot => "SLOT",
            MetadataKey::SrcUri => "SRC_URI",
            MetadataKey::Use => "USE",
            MetadataKey::Mtime => "_mtime_",
        }
    }

    pub fn is_dependency(&self) -> bool {
        Self::DEPENDENCIES.contains(self)
    }

    pub fn is_use_conditional(&self) -> bool {
        Self::USE_CONDITIONAL.contains(self)
    }
}

impl FromStr for MetadataKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::UnknownMetadataKey(s.to_string()))
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw metadata values as read from a repository, binary package or vardb.
pub type RawMetadata = BTreeMap<MetadataKey, String>;

/// Synchronizes a [`Package`] attribute after its key was written.
pub(crate) type WriteHandler = fn(&mut Package, &str);

pub(crate) const WRITE_HANDLERS: [(MetadataKey, WriteHandler); 4] = [
    (MetadataKey::Counter, Package::sync_counter),
    (MetadataKey::Inherited, Package::sync_inherited),
    (MetadataKey::Use, Package::sync_use),
    (MetadataKey::Mtime, Package::sync_mtime),
];

pub(crate) fn write_handler(key: MetadataKey) -> Option<WriteHandler> {
    WRITE_HANDLERS
        .iter()
        .find(|(handled, _)| *handled == key)
        .map(|(_, handler)| *handler)
}

/// The metadata of one package, tracking which keys were written after
/// construction.
///
/// Absent keys read as the empty string. Reads that reduce USE conditionals
/// or derive USE go through [`Package::metadata`]; this type only stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataWrapper {
    values: RawMetadata,
    modified: BTreeSet<MetadataKey>,
}

impl MetadataWrapper {
    /// Wrap `raw`. Unbuilt packages always carry a `USE` key, empty until
    /// USE is derived.
    pub fn new(raw: RawMetadata, built: bool) -> Self {
        let mut values = RawMetadata::new();
        if !built {
            values.insert(MetadataKey::Use, String::new());
        }
        values.extend(raw);
        MetadataWrapper {
            values,
            modified: BTreeSet::new(),
        }
    }

    pub fn get(&self, key: MetadataKey) -> &str {
        self.values.get(&key).map_or("", String::as_str)
    }

    pub fn contains(&self, key: MetadataKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetadataKey, &str)> {
        self.values.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// Keys written through [`Package::set_metadata`].
    pub fn modified_keys(&self) -> impl Iterator<Item = MetadataKey> + '_ {
        self.modified.iter().copied()
    }

    pub(crate) fn set(&mut self, key: MetadataKey, value: String) {
        self.modified.insert(key);
        self.values.insert(key, value);
    }

    /// Store without marking the key modified.
    pub(crate) fn store(&mut self, key: MetadataKey, value: String) {
        self.values.insert(key, value);
    }

    /// Restore the USE conditional keys to their unreduced values.
    pub(crate) fn reseed_use_conditional(&mut self, raw: &RawMetadata) {
        for key in MetadataKey::USE_CONDITIONAL {
            if let Some(value) = raw.get(&key) {
                self.values.insert(key, value.clone());
            }
        }
    }
}

/// Parse an integer metadata value, `0` when it does not parse.
pub(crate) fn parse_int(value: &str) -> u64 {
    value.trim().parse().unwrap_or(0)
}

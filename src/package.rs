use std::cell::{OnceCell, RefCell};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::atom::{is_valid_slot_name, Atom};
use crate::config::{RootConfig, Settings};
use crate::dep_expr::{paren_enclose, strip_conditionals, UseReduce, UseState};
use crate::eapi::EapiAttrs;
use crate::error::{Error, Result};
use crate::iuse::{IUse, Iuse};
use crate::keyword::KeywordMask;
use crate::matcher::{vercmp, Candidate, CandidateCpv};
use crate::metadata::{
    parse_int, write_handler, MetadataKey, MetadataWrapper, RawMetadata, WRITE_HANDLERS,
};
use crate::phase::Phase;
use crate::required_use::RequiredUseExpr;
use crate::soname::{parse_soname_deps, SonameAtom};

/// Repository name of packages whose origin is not known.
pub const UNKNOWN_REPO: &str = "__unknown__";

/// QA category → messages recorded while validating a package's metadata.
pub type Invalid = BTreeMap<String, Vec<String>>;

/// Where a package instance comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageType {
    /// An ebuild from a repository.
    Ebuild,
    /// A binary package.
    Binary,
    /// A package installed in the vardb.
    Installed,
}

impl PackageType {
    pub fn name(&self) -> &'static str {
        match self {
            PackageType::Ebuild => "ebuild",
            PackageType::Binary => "binary",
            PackageType::Installed => "installed",
        }
    }

    pub fn is_built(&self) -> bool {
        !matches!(self, PackageType::Ebuild)
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, PackageType::Installed)
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the resolver intends to do with a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Merge,
    NoMerge,
    Uninstall,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Operation::Merge => "merge",
            Operation::NoMerge => "nomerge",
            Operation::Uninstall => "uninstall",
        })
    }
}

/// Resolver-side flags of a package instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageOptions {
    /// Only the dependencies are to be merged.
    pub onlydeps: bool,
    /// Defaults to `NoMerge` for installed or onlydeps packages, `Merge`
    /// otherwise.
    pub operation: Option<Operation>,
    pub depth: usize,
}

/// The part of a [`PackageKey`] that depends on the package type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySource {
    /// Ebuilds are told apart by repository.
    Repo(String),
    /// Binary packages are fingerprinted so that several builds of one cpv
    /// can be considered at once.
    Binary {
        build_id: Option<u64>,
        size: Option<u64>,
        build_time: Option<u64>,
        mtime: Option<u64>,
    },
    /// There is only one installed instance per cpv.
    Installed,
}

/// Identity of a package as a resolver graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageKey {
    pub kind: PackageType,
    pub root: String,
    pub cpv: String,
    pub operation: Operation,
    pub source: KeySource,
}

/// Reasons a package is masked, with the offending values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Masks {
    /// Invalid metadata, see [`Package::invalid`].
    pub invalid: Option<Invalid>,
    /// The CHOST the package was built for.
    pub chost: Option<String>,
    pub eapi_unsupported: Option<String>,
    pub eapi_deprecated: Option<String>,
    /// Keywords none of which is accepted.
    pub keywords: Vec<String>,
    pub properties: Vec<String>,
    pub restrict: Vec<String>,
    /// The `package.mask` entry.
    pub package_mask: Option<Atom>,
    pub license: Vec<String>,
}

impl Masks {
    pub fn is_empty(&self) -> bool {
        self.invalid.is_none()
            && self.chost.is_none()
            && self.eapi_unsupported.is_none()
            && self.eapi_deprecated.is_none()
            && self.keywords.is_empty()
            && self.properties.is_empty()
            && self.restrict.is_empty()
            && self.package_mask.is_none()
            && self.license.is_empty()
    }
}

/// The evaluated USE of a package together with the profile flag sets that
/// applied to it. Sets are shared through the [`RootConfig`].
#[derive(Debug)]
pub struct PackageUse {
    enabled: Rc<BTreeSet<String>>,
    force: Rc<BTreeSet<String>>,
    mask: Rc<BTreeSet<String>>,
    expand: Rc<BTreeSet<String>>,
    expand_hidden: Rc<BTreeSet<String>>,
}

impl PackageUse {
    pub fn enabled(&self) -> &Rc<BTreeSet<String>> {
        &self.enabled
    }

    pub fn force(&self) -> &Rc<BTreeSet<String>> {
        &self.force
    }

    pub fn mask(&self) -> &Rc<BTreeSet<String>> {
        &self.mask
    }

    /// `USE_EXPAND` prefixes, lowercased.
    pub fn expand(&self) -> &Rc<BTreeSet<String>> {
        &self.expand
    }

    /// `USE_EXPAND_HIDDEN` prefixes, lowercased.
    pub fn expand_hidden(&self) -> &Rc<BTreeSet<String>> {
        &self.expand_hidden
    }
}

#[derive(Debug, Default)]
struct Validation {
    invalid: Invalid,
    atoms: Vec<Arc<Atom>>,
    provides: Option<BTreeSet<SonameAtom>>,
    requires: Option<BTreeSet<SonameAtom>>,
}

#[derive(Debug, Clone)]
struct Identity {
    category: String,
    package: String,
    version: String,
}

/// A candidate package instance: an ebuild, a binary package or an
/// installed package, in the context of one root.
///
/// Validation, masks, visibility and USE are computed on first access and
/// cached for the life of the instance. The only way to get a package with
/// different USE is [`Package::with_use`], which builds a fresh copy.
///
/// # Examples
///
/// ```
/// use portage_package::{
///     Candidate, MetadataKey, Package, PackageOptions, PackageType, RawMetadata, RootConfig,
///     Settings,
/// };
///
/// let settings = Settings {
///     accept_keywords: vec!["amd64".into()],
///     ..Settings::default()
/// };
/// let root = RootConfig::new("/", settings);
/// let metadata = RawMetadata::from([
///     (MetadataKey::Eapi, "8".to_string()),
///     (MetadataKey::Slot, "0".to_string()),
///     (MetadataKey::Keywords, "amd64".to_string()),
///     (MetadataKey::Iuse, "+foo bar".to_string()),
///     (MetadataKey::Rdepend, "bar? ( dev-libs/bar )".to_string()),
/// ]);
/// let pkg = Package::new(
///     "dev-libs/foo-1.0",
///     PackageType::Ebuild,
///     PackageOptions::default(),
///     metadata,
///     root,
/// )
/// .unwrap();
///
/// assert_eq!(pkg.cpv(), "dev-libs/foo-1.0");
/// assert!(pkg.visible());
/// assert!(pkg.use_flags().enabled().contains("foo"));
/// assert_eq!(pkg.validated_atoms().len(), 1);
/// ```
#[derive(Debug)]
pub struct Package {
    kind: PackageType,
    root_config: Rc<RootConfig>,
    identity: Identity,
    slot: String,
    sub_slot: String,
    repo: String,
    build_id: Option<u64>,
    eapi: String,
    eapi_attrs: EapiAttrs,
    iuse: Iuse,
    onlydeps: bool,
    operation: Operation,
    depth: usize,
    inherited: BTreeSet<String>,
    counter: u64,
    mtime: u64,
    raw: RawMetadata,
    metadata: RefCell<MetadataWrapper>,
    construction_invalid: Vec<(&'static str, String)>,
    key: PackageKey,
    validation: OnceCell<Validation>,
    masks: OnceCell<Option<Masks>>,
    visible: OnceCell<bool>,
    use_state: OnceCell<PackageUse>,
}

impl Package {
    /// Create a package from its `category/package-version` and raw metadata.
    pub fn new(
        cpv: &str,
        kind: PackageType,
        options: PackageOptions,
        metadata: RawMetadata,
        root_config: Rc<RootConfig>,
    ) -> Result<Package> {
        let parsed = CandidateCpv::parse(cpv)?;
        if parsed.slot().is_some() || parsed.repo().is_some() {
            return Err(Error::InvalidCpv(cpv.to_string()));
        }
        let identity = Identity {
            category: parsed.category().to_string(),
            package: parsed.package().to_string(),
            version: parsed.version().to_string(),
        };
        Ok(Self::assemble(identity, kind, options, metadata, root_config))
    }

    fn assemble(
        identity: Identity,
        kind: PackageType,
        options: PackageOptions,
        raw: RawMetadata,
        root_config: Rc<RootConfig>,
    ) -> Package {
        let settings = root_config.settings();
        let mut wrapper = MetadataWrapper::new(raw.clone(), kind.is_built());
        if !kind.is_built() {
            wrapper.store(MetadataKey::Chost, settings.chost.clone());
        }
        let mut construction_invalid = Vec::new();

        let eapi = match wrapper.get(MetadataKey::Eapi).trim() {
            "" => "0".to_string(),
            eapi => eapi.to_string(),
        };
        let eapi_attrs = settings
            .eapi_attrs(&eapi)
            .unwrap_or_else(EapiAttrs::permissive);

        let slot_value = wrapper.get(MetadataKey::Slot).trim().to_string();
        let (slot, sub_slot) = parse_slot(&slot_value).unwrap_or_else(|| {
            let message = format!("SLOT: invalid value: '{slot_value}'");
            construction_invalid.push(("SLOT.invalid", message));
            ("0".to_string(), "0".to_string())
        });

        let repo = match wrapper.get(MetadataKey::Repository).trim() {
            "" => UNKNOWN_REPO.to_string(),
            repo => repo.to_string(),
        };
        wrapper.store(MetadataKey::Repository, repo.clone());

        let build_id = match kind {
            PackageType::Binary => optional_int(&wrapper, MetadataKey::BuildId),
            _ => None,
        };

        let mut tokens = Vec::new();
        for token in wrapper.get(MetadataKey::Iuse).split_whitespace() {
            match token.parse::<IUse>() {
                Ok(iuse) => tokens.push(iuse),
                Err(_) => {
                    let message = format!("IUSE: invalid token '{token}'");
                    construction_invalid.push(("IUSE.invalid", message));
                }
            }
        }
        let iuse = Iuse::new(
            tokens,
            settings.implicit_iuse(),
            &settings.use_aliases,
            eapi_attrs.use_aliases,
        );
        if iuse.has_defaults() && !eapi_attrs.iuse_defaults && !kind.is_installed() {
            construction_invalid.push((
                "EAPI.incompatible",
                "IUSE contains defaults, but EAPI doesn't allow them".to_string(),
            ));
        }

        let operation = options.operation.unwrap_or(if options.onlydeps || kind.is_installed() {
            Operation::NoMerge
        } else {
            Operation::Merge
        });

        let source = match kind {
            PackageType::Ebuild => KeySource::Repo(repo.clone()),
            PackageType::Binary => KeySource::Binary {
                build_id,
                size: optional_int(&wrapper, MetadataKey::Size),
                build_time: optional_int(&wrapper, MetadataKey::BuildTime),
                mtime: optional_int(&wrapper, MetadataKey::Mtime),
            },
            PackageType::Installed => KeySource::Installed,
        };
        let key = PackageKey {
            kind,
            root: root_config.root().to_string(),
            cpv: format!("{}/{}-{}", identity.category, identity.package, identity.version),
            operation,
            source,
        };

        let mut pkg = Package {
            kind,
            root_config,
            identity,
            slot,
            sub_slot,
            repo,
            build_id,
            eapi,
            eapi_attrs,
            iuse,
            onlydeps: options.onlydeps,
            operation,
            depth: options.depth,
            inherited: BTreeSet::new(),
            counter: 0,
            mtime: 0,
            raw,
            metadata: RefCell::new(wrapper),
            construction_invalid,
            key,
            validation: OnceCell::new(),
            masks: OnceCell::new(),
            visible: OnceCell::new(),
            use_state: OnceCell::new(),
        };
        for (key, handler) in WRITE_HANDLERS {
            if let Some(value) = pkg.raw.get(&key).cloned() {
                handler(&mut pkg, &value);
            }
        }
        pkg
    }

    /// A fresh instance built from the same raw metadata, with nothing
    /// computed yet.
    pub fn copy(&self) -> Package {
        let options = PackageOptions {
            onlydeps: self.onlydeps,
            operation: Some(self.operation),
            depth: self.depth,
        };
        Self::assemble(
            self.identity.clone(),
            self.kind,
            options,
            self.raw.clone(),
            Rc::clone(&self.root_config),
        )
    }

    /// This package with `use_flags` enabled.
    ///
    /// Returns `self` when `use_flags` is the very set already in use.
    pub fn with_use(self: &Rc<Self>, use_flags: &Rc<BTreeSet<String>>) -> Rc<Package> {
        if Rc::ptr_eq(use_flags, self.use_flags().enabled()) {
            return Rc::clone(self);
        }
        let mut pkg = self.copy();
        let joined: Vec<&str> = use_flags.iter().map(String::as_str).collect();
        pkg.set_metadata(MetadataKey::Use, joined.join(" "));
        Rc::new(pkg)
    }

    pub fn kind(&self) -> PackageType {
        self.kind
    }

    pub fn is_built(&self) -> bool {
        self.kind.is_built()
    }

    pub fn is_installed(&self) -> bool {
        self.kind.is_installed()
    }

    pub fn onlydeps(&self) -> bool {
        self.onlydeps
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn root(&self) -> &str {
        self.root_config.root()
    }

    pub fn root_config(&self) -> &Rc<RootConfig> {
        &self.root_config
    }

    fn settings(&self) -> &Settings {
        self.root_config.settings()
    }

    pub fn key(&self) -> &PackageKey {
        &self.key
    }

    /// `package-version`
    pub fn pf(&self) -> String {
        format!("{}-{}", self.identity.package, self.identity.version)
    }

    /// The repository name, `__unknown__` if it was not recorded.
    pub fn repo_name(&self) -> &str {
        &self.repo
    }

    /// `category/package:slot`
    pub fn slot_atom(&self) -> Result<Atom> {
        Atom::parse(&format!("{}:{}", self.cp(), self.slot))
    }

    pub fn eapi(&self) -> &str {
        &self.eapi
    }

    /// Capabilities of the package EAPI, permissive if it is unsupported.
    pub fn eapi_attrs(&self) -> &EapiAttrs {
        &self.eapi_attrs
    }

    pub fn iuse(&self) -> &Iuse {
        &self.iuse
    }

    /// Build id of a binary package.
    pub fn build_id(&self) -> Option<u64> {
        self.build_id
    }

    /// `BUILD_TIME` of a built package, 0 if it is not recorded.
    pub fn build_time(&self) -> Option<u64> {
        self.is_built()
            .then(|| parse_int(self.metadata.borrow().get(MetadataKey::BuildTime)))
    }

    pub fn inherited(&self) -> &BTreeSet<String> {
        &self.inherited
    }

    /// Installation counter of an installed package.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn mtime(&self) -> u64 {
        self.mtime
    }

    /// Phases the ebuild defines, every phase when DEFINED_PHASES is empty.
    pub fn defined_phases(&self) -> Vec<Phase> {
        let value = self.stored(MetadataKey::DefinedPhases);
        if value.trim().is_empty() {
            return Phase::ALL.to_vec();
        }
        value
            .split_whitespace()
            .filter_map(|token| token.parse().ok())
            .collect()
    }

    pub fn properties(&self) -> Vec<String> {
        split(&self.metadata(MetadataKey::Properties))
    }

    pub fn restrict(&self) -> Vec<String> {
        split(&self.metadata(MetadataKey::Restrict))
    }

    /// The raw metadata the package was created from.
    pub fn raw_metadata(&self) -> &RawMetadata {
        &self.raw
    }

    /// Read a metadata value.
    ///
    /// LICENSE, PROPERTIES and RESTRICT are reduced against the package USE
    /// when the configuration is local, and the result is cached. Reading an
    /// empty USE of an ebuild derives it.
    pub fn metadata(&self, key: MetadataKey) -> String {
        let value = self.stored(key);
        if key.is_use_conditional() {
            if self.settings().local_config && value.contains('?') {
                return self.reduce_use_conditional(key, value);
            }
        } else if key == MetadataKey::Use && !self.is_built() && value.is_empty() {
            self.use_flags();
            return self.stored(MetadataKey::Use);
        }
        value
    }

    /// Write a metadata value, synchronizing the attribute it backs.
    pub fn set_metadata(&mut self, key: MetadataKey, value: impl Into<String>) {
        let value = value.into();
        self.metadata.get_mut().set(key, value.clone());
        if let Some(handler) = write_handler(key) {
            trace!(package = %self.cpv(), %key, "synchronizing metadata write");
            handler(self, &value);
        }
    }

    /// Keys written with [`set_metadata`](Self::set_metadata).
    pub fn modified_metadata(&self) -> Vec<MetadataKey> {
        self.metadata.borrow().modified_keys().collect()
    }

    fn stored(&self, key: MetadataKey) -> String {
        self.metadata.borrow().get(key).to_string()
    }

    fn reduce_use_conditional(&self, key: MetadataKey, value: String) -> String {
        let enabled = Rc::clone(self.use_flags().enabled());
        let is_valid_flag = |flag: &str| self.iuse.is_valid_flag(flag);
        let reduced = UseReduce::new(UseState::Enabled(enabled.as_ref()))
            .is_valid_flag(&is_valid_flag)
            .reduce(&value);
        match reduced {
            Ok(tree) => {
                let reduced = paren_enclose(&strip_conditionals(tree));
                self.metadata.borrow_mut().store(key, reduced.clone());
                reduced
            }
            Err(e) => {
                trace!(package = %self.cpv(), %key, error = %e, "keeping unreduced value");
                value
            }
        }
    }

    pub(crate) fn sync_counter(&mut self, value: &str) {
        self.counter = parse_int(value);
    }

    pub(crate) fn sync_inherited(&mut self, value: &str) {
        self.inherited = split(value).into_iter().collect();
    }

    pub(crate) fn sync_use(&mut self, _value: &str) {
        self.use_state = OnceCell::new();
        self.metadata.get_mut().reseed_use_conditional(&self.raw);
    }

    pub(crate) fn sync_mtime(&mut self, value: &str) {
        self.mtime = parse_int(value);
    }

    /// The evaluated USE of this package.
    ///
    /// Built packages keep the recorded flags that are still in IUSE. Ebuilds
    /// use an explicit USE value if one was set and the configured default
    /// otherwise.
    pub fn use_flags(&self) -> &PackageUse {
        self.use_state.get_or_init(|| self.init_use())
    }

    pub fn use_force(&self) -> &Rc<BTreeSet<String>> {
        self.use_flags().force()
    }

    pub fn use_mask(&self) -> &Rc<BTreeSet<String>> {
        self.use_flags().mask()
    }

    pub fn use_expand(&self) -> &Rc<BTreeSet<String>> {
        self.use_flags().expand()
    }

    pub fn use_expand_hidden(&self) -> &Rc<BTreeSet<String>> {
        self.use_flags().expand_hidden()
    }

    fn init_use(&self) -> PackageUse {
        let settings = self.settings();
        let stored = self.stored(MetadataKey::Use);

        let mut enabled: BTreeSet<String> = if self.is_built() {
            split(&stored)
                .into_iter()
                .filter(|flag| self.iuse.is_valid_flag(flag))
                .collect()
        } else if stored.trim().is_empty() {
            settings.compute_use(&self.iuse)
        } else {
            split(&stored).into_iter().collect()
        };
        let use_str = if self.is_built() || stored.trim().is_empty() {
            enabled.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
        } else {
            stored
        };

        if self.eapi_attrs.use_aliases {
            let aliases: Vec<String> = enabled
                .iter()
                .filter_map(|flag| self.iuse.alias_mapping().get(flag))
                .flatten()
                .cloned()
                .collect();
            enabled.extend(aliases);
        }
        self.metadata.borrow_mut().store(MetadataKey::Use, use_str);

        let root = &self.root_config;
        let lowercase = |names: &[String]| {
            names
                .iter()
                .map(|name| name.to_lowercase())
                .collect::<BTreeSet<_>>()
        };
        PackageUse {
            enabled: root.intern_flags(enabled),
            force: root.intern_flags(settings.use_force.clone()),
            mask: root.intern_flags(settings.use_mask.clone()),
            expand: root.intern_flags(lowercase(&settings.use_expand)),
            expand_hidden: root.intern_flags(lowercase(&settings.use_expand_hidden)),
        }
    }

    /// Invalid metadata by QA category, `None` if the metadata is valid.
    ///
    /// The first call validates every dependency string.
    pub fn invalid(&self) -> Option<&Invalid> {
        let invalid = &self.validation().invalid;
        (!invalid.is_empty()).then_some(invalid)
    }

    /// Every atom of every dependency class, conditionals and `||` groups
    /// included, deduplicated.
    pub fn validated_atoms(&self) -> &[Arc<Atom>] {
        &self.validation().atoms
    }

    /// Sonames a built package provides.
    pub fn provides(&self) -> Option<&BTreeSet<SonameAtom>> {
        self.validation().provides.as_ref()
    }

    /// Sonames a built package requires.
    pub fn requires(&self) -> Option<&BTreeSet<SonameAtom>> {
        self.validation().requires.as_ref()
    }

    fn validation(&self) -> &Validation {
        self.validation.get_or_init(|| self.validate())
    }

    fn validate(&self) -> Validation {
        let mut validation = Validation::default();
        for (category, message) in &self.construction_invalid {
            self.record(&mut validation.invalid, category, message.clone());
        }

        let installed = self.is_installed();
        let is_valid_flag = |flag: &str| self.iuse.is_valid_flag(flag);
        // EAPI and IUSE of an installed package are facts, not something to
        // check against.
        let mut reducer = UseReduce::new(UseState::MatchAll).interner(self.root_config.atoms());
        if !installed {
            reducer = reducer.eapi(self.eapi_attrs).is_valid_flag(&is_valid_flag);
        }

        let mut atoms = BTreeSet::new();
        for key in MetadataKey::DEPENDENCIES {
            let value = self.stored(key);
            if value.trim().is_empty() {
                continue;
            }
            match reducer.reduce_atoms_flat(&value) {
                Err(e) => self.metadata_exception(&mut validation.invalid, key, &e),
                Ok(found) => {
                    if !self.is_built() {
                        for atom in found.iter().filter(|atom| atom.slot_operator_built()) {
                            let e = Error::dep_string(format!(
                                "Improper context for slot-operator \"built\" atom syntax: {}",
                                atom.unevaluated()
                            ));
                            self.metadata_exception(&mut validation.invalid, key, &e);
                        }
                    }
                    atoms.extend(found);
                }
            }
        }
        validation.atoms = atoms.into_iter().collect();

        for key in MetadataKey::USE_CONDITIONAL {
            let value = self.stored(key);
            if value.trim().is_empty() {
                continue;
            }
            if let Err(e) = reducer.reduce(&value) {
                self.metadata_exception(&mut validation.invalid, key, &e);
            }
        }

        let required_use = self.stored(MetadataKey::RequiredUse);
        if !required_use.trim().is_empty() && !self.is_built() {
            if !self.eapi_attrs.required_use {
                self.record(
                    &mut validation.invalid,
                    "EAPI.incompatible",
                    format!("REQUIRED_USE set, but EAPI='{}' doesn't allow it", self.eapi),
                );
            } else if let Err(e) = RequiredUseExpr::parse(&required_use).and_then(|expr| {
                expr.check(&BTreeSet::new(), &is_valid_flag, &self.eapi_attrs)
            }) {
                self.record(
                    &mut validation.invalid,
                    "REQUIRED_USE.syntax",
                    format!("REQUIRED_USE: {e}"),
                );
            }
        }

        let src_uri = self.stored(MetadataKey::SrcUri);
        if !src_uri.trim().is_empty() {
            let reduced = UseReduce::new(UseState::MatchAll)
                .eapi(self.eapi_attrs)
                .is_valid_flag(&is_valid_flag)
                .reduce_src_uri(&src_uri);
            if let Err(e) = reduced {
                if !installed {
                    self.metadata_exception(&mut validation.invalid, MetadataKey::SrcUri, &e);
                }
            }
        }

        if self.is_built() {
            validation.provides = self.sonames(&mut validation.invalid, MetadataKey::Provides);
            validation.requires = self.sonames(&mut validation.invalid, MetadataKey::Requires);
        }

        validation
    }

    fn sonames(&self, invalid: &mut Invalid, key: MetadataKey) -> Option<BTreeSet<SonameAtom>> {
        match parse_soname_deps(&self.stored(key)) {
            Ok(atoms) => Some(atoms.into_iter().collect()),
            Err(e) => {
                self.record(invalid, &format!("{key}.syntax"), format!("{key}: {e}"));
                None
            }
        }
    }

    /// Record an error found in the value of `key`.
    ///
    /// Categorized errors keep their category unless the package is
    /// installed, in which case the message points at the vardb file.
    fn metadata_exception(&self, invalid: &mut Invalid, key: MetadataKey, error: &Error) {
        let qa_category = if key.as_str().ends_with("DEPEND") {
            "dependency.syntax".to_string()
        } else {
            format!("{key}.syntax")
        };

        if self.is_installed() {
            let path = self
                .settings()
                .vardb_path
                .join(&self.identity.category)
                .join(self.pf())
                .join(key.as_str());
            let message = format!("{key}: {error} in '{}'", path.display());
            self.record(invalid, &qa_category, message);
        } else {
            let category = error.category().unwrap_or(qa_category.as_str());
            self.record(invalid, category, format!("{key}: {error}"));
        }
    }

    fn record(&self, invalid: &mut Invalid, category: &str, message: String) {
        debug!(package = %self.cpv(), category, %message, "invalid metadata");
        invalid.entry(category.to_string()).or_default().push(message);
    }

    /// Reasons the package is masked, `None` if there are none.
    ///
    /// Every dimension is evaluated. LICENSE, PROPERTIES and RESTRICT values
    /// that do not reduce are skipped since they are already part of
    /// [`invalid`](Self::invalid).
    pub fn masks(&self) -> Option<&Masks> {
        self.masks.get_or_init(|| self.eval_masks()).as_ref()
    }

    fn eval_masks(&self) -> Option<Masks> {
        let settings = self.settings();
        let cpv = self.cpv();
        let mut masks = Masks::default();

        if let Some(invalid) = self.invalid() {
            debug!(package = %cpv, "masked by invalid metadata");
            masks.invalid = Some(invalid.clone());
        }

        let chost = self.stored(MetadataKey::Chost);
        if !settings.accept_chost(&chost) {
            debug!(package = %cpv, %chost, "masked by CHOST");
            masks.chost = Some(chost);
        }

        if settings.eapi_attrs(&self.eapi).is_none() {
            debug!(package = %cpv, eapi = %self.eapi, "masked by unsupported EAPI");
            masks.eapi_unsupported = Some(self.eapi.clone());
        }
        if settings.is_eapi_deprecated(&self.eapi) {
            debug!(package = %cpv, eapi = %self.eapi, "masked by deprecated EAPI");
            masks.eapi_deprecated = Some(self.eapi.clone());
        }

        masks.keywords = settings.missing_keywords(self, &self.stored(MetadataKey::Keywords));
        if !masks.keywords.is_empty() {
            debug!(package = %cpv, keywords = ?masks.keywords, "masked by KEYWORDS");
        }

        let enabled = Rc::clone(self.use_flags().enabled());
        let properties = self.stored(MetadataKey::Properties);
        if let Ok(missing) = settings.missing_properties(&properties, &enabled) {
            if !missing.is_empty() {
                debug!(package = %cpv, properties = ?missing, "masked by PROPERTIES");
            }
            masks.properties = missing;
        }
        let restrict = self.stored(MetadataKey::Restrict);
        if let Ok(missing) = settings.missing_restrict(&restrict, &enabled) {
            if !missing.is_empty() {
                debug!(package = %cpv, restrict = ?missing, "masked by RESTRICT");
            }
            masks.restrict = missing;
        }

        masks.package_mask = settings.mask_atom(self).cloned();
        if let Some(atom) = &masks.package_mask {
            debug!(package = %cpv, %atom, "masked by package.mask");
        }

        let license = self.stored(MetadataKey::License);
        if let Ok(missing) = settings.missing_licenses(self, &license, &enabled) {
            if !missing.is_empty() {
                debug!(package = %cpv, license = ?missing, "masked by LICENSE");
            }
            masks.license = missing;
        }

        (!masks.is_empty()).then_some(masks)
    }

    /// Whether the package may be selected at all.
    ///
    /// Installed packages stay visible despite CHOST, deprecated EAPI,
    /// KEYWORDS, PROPERTIES and RESTRICT masks.
    pub fn visible(&self) -> bool {
        *self.visible.get_or_init(|| self.eval_visibility())
    }

    fn eval_visibility(&self) -> bool {
        let Some(masks) = self.masks() else {
            return true;
        };
        if masks.eapi_unsupported.is_some() || masks.invalid.is_some() {
            return false;
        }
        if !self.is_installed()
            && (masks.chost.is_some()
                || masks.eapi_deprecated.is_some()
                || !masks.keywords.is_empty()
                || !masks.properties.is_empty()
                || !masks.restrict.is_empty())
        {
            return false;
        }
        masks.package_mask.is_none() && masks.license.is_empty()
    }

    /// Keyword mask under the global `ACCEPT_KEYWORDS` alone.
    pub fn keyword_mask(&self) -> Option<KeywordMask> {
        self.settings()
            .keyword_mask(&self.stored(MetadataKey::Keywords))
    }

    /// Whether a `package.mask` entry matches, `package.unmask` ignored.
    pub fn is_hard_masked(&self) -> bool {
        self.settings().raw_mask_atom(self).is_some()
    }

    /// Compare by `category/package` first, then by version. Equal versions
    /// of two built packages are ordered by build time.
    ///
    /// `None` if either version does not parse.
    pub fn cmp_version(&self, other: &Package) -> Option<Ordering> {
        let (cp, other_cp) = (self.cp(), other.cp());
        if cp != other_cp {
            return Some(cp.cmp(&other_cp));
        }
        match vercmp(&self.identity.version, &other.identity.version)? {
            Ordering::Equal if self.is_built() && other.is_built() => {
                Some(self.build_time().cmp(&other.build_time()))
            }
            ordering => Some(ordering),
        }
    }
}

impl Candidate for Package {
    fn category(&self) -> &str {
        &self.identity.category
    }

    fn package(&self) -> &str {
        &self.identity.package
    }

    fn version(&self) -> &str {
        &self.identity.version
    }

    fn slot(&self) -> Option<&str> {
        Some(self.slot.as_str())
    }

    fn sub_slot(&self) -> Option<&str> {
        Some(self.sub_slot.as_str())
    }

    fn repo(&self) -> Option<&str> {
        (self.repo != UNKNOWN_REPO).then_some(self.repo.as_str())
    }

    fn use_enabled(&self) -> Option<&BTreeSet<String>> {
        Some(self.use_flags().enabled().as_ref())
    }

    fn is_valid_flag(&self, flag: &str) -> bool {
        self.iuse.is_valid_flag(flag)
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Package {}

impl Hash for Package {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}", self.cpv())?;
        if let Some(build_id) = self.build_id.filter(|id| *id > 0) {
            write!(f, "-{build_id}")?;
        }
        write!(
            f,
            ":{}/{}::{}, {}",
            self.slot, self.sub_slot, self.repo, self.kind
        )?;

        let root = self.root();
        if self.is_installed() {
            if root != "/" {
                write!(f, " in '{root}'")?;
            }
            if self.operation == Operation::Uninstall {
                f.write_str(" scheduled for uninstall")?;
            }
        } else if self.operation == Operation::Merge {
            f.write_str(" scheduled for merge")?;
            if root != "/" {
                write!(f, " to '{root}'")?;
            }
        }
        f.write_str(")")
    }
}

/// Split `SLOT` into slot and sub-slot, the sub-slot defaulting to the slot.
fn parse_slot(value: &str) -> Option<(String, String)> {
    let (slot, sub_slot) = value.split_once('/').unwrap_or((value, value));
    (is_valid_slot_name(slot) && is_valid_slot_name(sub_slot))
        .then(|| (slot.to_string(), sub_slot.to_string()))
}

fn optional_int(wrapper: &MetadataWrapper, key: MetadataKey) -> Option<u64> {
    wrapper.get(key).trim().parse().ok()
}

fn split(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::atom_matches;

    fn settings() -> Settings {
        Settings {
            accept_keywords: vec!["amd64".into()],
            ..Settings::default()
        }
    }

    fn raw(pairs: &[(MetadataKey, &str)]) -> RawMetadata {
        let mut raw = RawMetadata::from([
            (MetadataKey::Eapi, "8".to_string()),
            (MetadataKey::Slot, "0".to_string()),
            (MetadataKey::Keywords, "amd64".to_string()),
            (MetadataKey::Repository, "gentoo".to_string()),
        ]);
        raw.extend(pairs.iter().map(|(key, value)| (*key, value.to_string())));
        raw
    }

    fn package_in(
        root: &Rc<RootConfig>,
        kind: PackageType,
        pairs: &[(MetadataKey, &str)],
    ) -> Package {
        Package::new(
            "dev-libs/foo-1.0",
            kind,
            PackageOptions::default(),
            raw(pairs),
            Rc::clone(root),
        )
        .unwrap()
    }

    fn package(kind: PackageType, pairs: &[(MetadataKey, &str)]) -> Package {
        package_in(&RootConfig::new("/", settings()), kind, pairs)
    }

    fn ebuild(pairs: &[(MetadataKey, &str)]) -> Package {
        package(PackageType::Ebuild, pairs)
    }

    fn flags(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rejects_bad_cpv() {
        let root = RootConfig::new("/", settings());
        for cpv in ["dev-libs/foo", "foo-1.0", "dev-libs/foo-1.0:0"] {
            let result = Package::new(
                cpv,
                PackageType::Ebuild,
                PackageOptions::default(),
                raw(&[]),
                Rc::clone(&root),
            );
            assert!(result.is_err(), "{cpv} should be rejected");
        }
    }

    #[test]
    fn iuse_defaults_enable_use() {
        let pkg = ebuild(&[(MetadataKey::Iuse, "+foo bar")]);
        assert_eq!(**pkg.use_flags().enabled(), flags(&["foo"]));
        assert_eq!(pkg.metadata(MetadataKey::Use), "foo");
        assert!(pkg.invalid().is_none());
        assert!(pkg.masks().is_none());
        assert!(pkg.visible());
    }

    #[test]
    fn built_use_drops_flags_missing_from_iuse() {
        let pkg = package(
            PackageType::Binary,
            &[(MetadataKey::Iuse, "foo"), (MetadataKey::Use, "foo gone")],
        );
        assert_eq!(**pkg.use_flags().enabled(), flags(&["foo"]));
        assert_eq!(pkg.metadata(MetadataKey::Use), "foo");
    }

    #[test]
    fn use_aliases() {
        let mut settings = settings();
        settings.use_alias_eapis.insert("8".into());
        settings
            .use_aliases
            .insert("ssl".into(), vec!["openssl".into()]);
        let root = RootConfig::new("/", settings);
        let pkg = package_in(&root, PackageType::Ebuild, &[(MetadataKey::Iuse, "+ssl")]);
        assert_eq!(**pkg.use_flags().enabled(), flags(&["openssl", "ssl"]));
        assert!(pkg.iuse().is_valid_flag("openssl"));
    }

    #[test]
    fn required_use_needs_eapi_support() {
        let pkg = ebuild(&[
            (MetadataKey::Eapi, "3"),
            (MetadataKey::Iuse, "foo"),
            (MetadataKey::RequiredUse, "foo"),
        ]);
        let invalid = pkg.invalid().unwrap();
        assert_eq!(
            invalid["EAPI.incompatible"],
            ["REQUIRED_USE set, but EAPI='3' doesn't allow it"]
        );
        assert!(pkg.masks().unwrap().invalid.is_some());
        assert!(!pkg.visible());
    }

    #[test]
    fn required_use_flags_must_be_in_iuse() {
        let pkg = ebuild(&[
            (MetadataKey::Iuse, "foo"),
            (MetadataKey::RequiredUse, "foo? ( bar )"),
        ]);
        let invalid = pkg.invalid().unwrap();
        assert!(invalid.contains_key("REQUIRED_USE.syntax"));
        assert!(invalid["REQUIRED_USE.syntax"][0].starts_with("REQUIRED_USE: "));

        let pkg = ebuild(&[
            (MetadataKey::Iuse, "foo bar"),
            (MetadataKey::RequiredUse, "foo? ( bar )"),
        ]);
        assert!(pkg.invalid().is_none());
    }

    #[test]
    fn categorized_dependency_errors() {
        let pkg = ebuild(&[(MetadataKey::Depend, "foo? ( dev-libs/a )")]);
        let invalid = pkg.invalid().unwrap();
        assert_eq!(
            invalid["IUSE.missing"],
            ["DEPEND: USE flag 'foo' referenced in conditional 'foo?' is not in IUSE"]
        );

        let pkg = ebuild(&[(MetadataKey::Rdepend, "dev-libs/a (")]);
        let invalid = pkg.invalid().unwrap();
        assert_eq!(
            invalid["dependency.syntax"],
            ["RDEPEND: Missing ')' at end of string"]
        );
    }

    #[test]
    fn installed_packages_are_checked_leniently() {
        let pkg = package(
            PackageType::Installed,
            &[(MetadataKey::Depend, "foo? ( dev-libs/a )")],
        );
        assert!(pkg.invalid().is_none());

        let pkg = package(PackageType::Installed, &[(MetadataKey::Depend, "dev-libs/a (")]);
        let message = &pkg.invalid().unwrap()["dependency.syntax"][0];
        assert!(message.starts_with("DEPEND: Missing ')'"));
        assert!(message.ends_with("in '/var/db/pkg/dev-libs/foo-1.0/DEPEND'"));
    }

    #[test]
    fn built_slot_operator_needs_built_package() {
        let depend = (MetadataKey::Rdepend, "dev-libs/a:0/1=");
        let pkg = ebuild(&[depend]);
        assert_eq!(
            pkg.invalid().unwrap()["dependency.syntax"],
            ["RDEPEND: Improper context for slot-operator \"built\" atom syntax: dev-libs/a:0/1="]
        );

        let pkg = package(PackageType::Binary, &[depend]);
        assert!(pkg.invalid().is_none());
    }

    #[test]
    fn validated_atoms_cover_every_branch() {
        let pkg = ebuild(&[
            (MetadataKey::Iuse, "x"),
            (MetadataKey::Depend, "dev-libs/a x? ( dev-libs/a dev-libs/b )"),
            (MetadataKey::Rdepend, "|| ( dev-libs/c dev-libs/d )"),
        ]);
        let atoms: Vec<String> = pkg.validated_atoms().iter().map(|a| a.to_string()).collect();
        assert_eq!(atoms, ["dev-libs/a", "dev-libs/b", "dev-libs/c", "dev-libs/d"]);
    }

    #[test]
    fn slot_and_iuse_problems() {
        let pkg = ebuild(&[(MetadataKey::Slot, "")]);
        assert_eq!(pkg.slot(), Some("0"));
        assert_eq!(pkg.invalid().unwrap()["SLOT.invalid"], ["SLOT: invalid value: ''"]);

        let pkg = ebuild(&[(MetadataKey::Slot, "2/2.1")]);
        assert_eq!(pkg.slot(), Some("2"));
        assert_eq!(pkg.sub_slot(), Some("2.1"));
        assert_eq!(pkg.slot_atom().unwrap().to_string(), "dev-libs/foo:2");

        let pkg = ebuild(&[(MetadataKey::Eapi, "0"), (MetadataKey::Iuse, "+foo")]);
        assert_eq!(
            pkg.invalid().unwrap()["EAPI.incompatible"],
            ["IUSE contains defaults, but EAPI doesn't allow them"]
        );
        let pkg = package(
            PackageType::Installed,
            &[(MetadataKey::Eapi, "0"), (MetadataKey::Iuse, "+foo")],
        );
        assert!(pkg.invalid().is_none());
    }

    #[test]
    fn unsupported_eapi() {
        let pkg = ebuild(&[(MetadataKey::Eapi, "future")]);
        assert_eq!(pkg.masks().unwrap().eapi_unsupported.as_deref(), Some("future"));
        assert!(!pkg.visible());

        let mut settings = settings();
        settings.deprecated_eapis.insert("5".into());
        let root = RootConfig::new("/", settings);
        let pkg = package_in(&root, PackageType::Ebuild, &[(MetadataKey::Eapi, "5")]);
        assert_eq!(pkg.masks().unwrap().eapi_deprecated.as_deref(), Some("5"));
        assert!(!pkg.visible());
        let pkg = package_in(&root, PackageType::Installed, &[(MetadataKey::Eapi, "5")]);
        assert!(pkg.visible());
    }

    #[test]
    fn keyword_masks() {
        let pkg = ebuild(&[(MetadataKey::Keywords, "~amd64")]);
        assert_eq!(pkg.masks().unwrap().keywords, ["~amd64"]);
        assert_eq!(pkg.keyword_mask(), Some(KeywordMask::Unstable));
        assert!(!pkg.visible());

        let pkg = ebuild(&[(MetadataKey::Keywords, "")]);
        assert_eq!(pkg.masks().unwrap().keywords, ["**"]);
        assert_eq!(pkg.keyword_mask(), Some(KeywordMask::Missing));

        let pkg = package(PackageType::Installed, &[(MetadataKey::Keywords, "~amd64")]);
        assert!(pkg.masks().is_some());
        assert!(pkg.visible());
    }

    #[test]
    fn license_masks_follow_use() {
        let mut settings = settings();
        settings.accept_license = vec!["-*".into(), "MIT".into()];
        let root = RootConfig::new("/", settings);
        let license = (MetadataKey::License, "bindist? ( EULA ) MIT");

        let iuse = (MetadataKey::Iuse, "bindist");
        let pkg = package_in(&root, PackageType::Ebuild, &[iuse, license]);
        assert!(pkg.visible());

        let pkg = package_in(
            &root,
            PackageType::Installed,
            &[iuse, (MetadataKey::Use, "bindist"), license],
        );
        assert_eq!(pkg.masks().unwrap().license, ["EULA"]);
        assert!(!pkg.visible());
    }

    #[test]
    fn package_mask() {
        let mut settings = settings();
        settings.package_mask.push("dev-libs/foo".parse().unwrap());
        settings.package_unmask.push("=dev-libs/foo-1.0".parse().unwrap());
        let root = RootConfig::new("/", settings);
        let pkg = package_in(&root, PackageType::Ebuild, &[]);
        assert!(pkg.visible());
        assert!(pkg.is_hard_masked());

        let mut settings = self::settings();
        settings.package_mask.push("dev-libs/foo".parse().unwrap());
        let pkg = package_in(&RootConfig::new("/", settings), PackageType::Installed, &[]);
        assert_eq!(
            pkg.masks().unwrap().package_mask.as_ref().map(ToString::to_string),
            Some("dev-libs/foo".to_string())
        );
        assert!(!pkg.visible());
    }

    #[test]
    fn chost_mask_only_hides_uninstalled() {
        let settings = Settings {
            chost: "x86_64-pc-linux-gnu".into(),
            ..settings()
        };
        let root = RootConfig::new("/", settings);
        let chost = (MetadataKey::Chost, "i686-pc-linux-gnu");

        let pkg = package_in(&root, PackageType::Binary, &[chost]);
        assert_eq!(pkg.masks().unwrap().chost.as_deref(), Some("i686-pc-linux-gnu"));
        assert!(!pkg.visible());

        let pkg = package_in(&root, PackageType::Installed, &[chost]);
        assert!(pkg.visible());

        let pkg = package_in(&root, PackageType::Ebuild, &[chost]);
        assert!(pkg.masks().is_none());
    }

    #[test]
    fn use_conditional_reads_are_reduced() {
        let license = (MetadataKey::License, "bindist? ( EULA ) !bindist? ( MIT )");
        let mut pkg = ebuild(&[(MetadataKey::Iuse, "+bindist"), license]);
        assert_eq!(pkg.metadata(MetadataKey::License), "EULA");

        pkg.set_metadata(MetadataKey::Use, "other");
        assert_eq!(pkg.metadata(MetadataKey::License), "MIT");
        assert_eq!(pkg.modified_metadata(), [MetadataKey::Use]);

        let settings = Settings {
            local_config: false,
            ..settings()
        };
        let root = RootConfig::new("/", settings);
        let iuse = (MetadataKey::Iuse, "+bindist");
        let pkg = package_in(&root, PackageType::Ebuild, &[iuse, license]);
        assert_eq!(pkg.metadata(MetadataKey::License), license.1);
    }

    #[test]
    fn synced_attributes() {
        let mut pkg = package(
            PackageType::Installed,
            &[
                (MetadataKey::Counter, " 17\n"),
                (MetadataKey::Inherited, "toolchain-funcs flag-o-matic"),
                (MetadataKey::Mtime, "garbage"),
            ],
        );
        assert_eq!(pkg.counter(), 17);
        assert_eq!(pkg.mtime(), 0);
        assert_eq!(pkg.inherited(), &flags(&["flag-o-matic", "toolchain-funcs"]));

        pkg.set_metadata(MetadataKey::Counter, "5");
        pkg.set_metadata(MetadataKey::Mtime, "1700000000");
        assert_eq!(pkg.counter(), 5);
        assert_eq!(pkg.mtime(), 1_700_000_000);
        assert_eq!(pkg.metadata(MetadataKey::Counter), "5");
    }

    #[test]
    fn with_use_reuses_identical_sets() {
        let pkg = Rc::new(ebuild(&[(MetadataKey::Iuse, "+foo bar")]));
        let same = Rc::clone(pkg.use_flags().enabled());
        assert!(Rc::ptr_eq(&pkg.with_use(&same), &pkg));

        let interned = pkg.root_config().intern_flags(flags(&["foo"]));
        assert!(Rc::ptr_eq(&pkg.with_use(&interned), &pkg));

        let other = pkg.with_use(&Rc::new(flags(&["bar"])));
        assert!(!Rc::ptr_eq(&other, &pkg));
        assert_eq!(**other.use_flags().enabled(), flags(&["bar"]));
        assert_eq!(*other, *pkg);
    }

    #[test]
    fn display() {
        let pkg = ebuild(&[]);
        assert_eq!(
            pkg.to_string(),
            "(dev-libs/foo-1.0:0/0::gentoo, ebuild scheduled for merge)"
        );

        let root = RootConfig::new("/mnt/target", settings());
        let pkg = Package::new(
            "dev-libs/foo-1.0",
            PackageType::Installed,
            PackageOptions {
                operation: Some(Operation::Uninstall),
                ..PackageOptions::default()
            },
            raw(&[]),
            Rc::clone(&root),
        )
        .unwrap();
        assert_eq!(
            pkg.to_string(),
            "(dev-libs/foo-1.0:0/0::gentoo, installed in '/mnt/target' scheduled for uninstall)"
        );

        let pkg = package_in(
            &root,
            PackageType::Binary,
            &[(MetadataKey::BuildId, "3"), (MetadataKey::Slot, "1/1.2")],
        );
        assert_eq!(
            pkg.to_string(),
            "(dev-libs/foo-1.0-3:1/1.2::gentoo, binary scheduled for merge to '/mnt/target')"
        );
    }

    #[test]
    fn identity() {
        let a = ebuild(&[]);
        let b = ebuild(&[(MetadataKey::Repository, "overlay")]);
        assert_ne!(a, b);
        assert_eq!(a, ebuild(&[(MetadataKey::Description, "same package")]));
        assert_eq!(a.key().operation, Operation::Merge);

        let root = RootConfig::new("/", settings());
        let onlydeps = Package::new(
            "dev-libs/foo-1.0",
            PackageType::Ebuild,
            PackageOptions {
                onlydeps: true,
                ..PackageOptions::default()
            },
            raw(&[]),
            root,
        )
        .unwrap();
        assert_eq!(onlydeps.operation(), Operation::NoMerge);
        assert_ne!(a, onlydeps);

        let installed = package(PackageType::Installed, &[]);
        assert_eq!(installed.key().source, KeySource::Installed);
        assert_eq!(installed.operation(), Operation::NoMerge);

        let unknown = ebuild(&[(MetadataKey::Repository, "")]);
        assert_eq!(unknown.repo_name(), UNKNOWN_REPO);
        assert_eq!(unknown.repo(), None);
    }

    #[test]
    fn ordering() {
        let root = RootConfig::new("/", settings());
        let make = |cpv: &str, kind: PackageType, build_time: &str| {
            Package::new(
                cpv,
                kind,
                PackageOptions::default(),
                raw(&[(MetadataKey::BuildTime, build_time)]),
                Rc::clone(&root),
            )
            .unwrap()
        };

        let old = make("dev-libs/foo-1.0", PackageType::Ebuild, "");
        let new = make("dev-libs/foo-1.0-r1", PackageType::Ebuild, "");
        assert_eq!(old.cmp_version(&new), Some(Ordering::Less));

        let other = make("app-misc/zzz-9", PackageType::Ebuild, "");
        assert_eq!(old.cmp_version(&other), Some(Ordering::Greater));

        let early = make("dev-libs/foo-1.0", PackageType::Binary, "100");
        let late = make("dev-libs/foo-1.0", PackageType::Binary, "200");
        assert_eq!(early.cmp_version(&late), Some(Ordering::Less));
        assert_eq!(early.cmp_version(&old), Some(Ordering::Equal));
    }

    #[test]
    fn sonames_of_built_packages() {
        let pkg = package(
            PackageType::Binary,
            &[
                (MetadataKey::Provides, "x86_64: libfoo.so.1"),
                (MetadataKey::Requires, "libc.so.6"),
            ],
        );
        assert_eq!(pkg.provides().unwrap().len(), 1);
        assert!(pkg.requires().is_none());
        assert_eq!(
            pkg.invalid().unwrap()["REQUIRES.syntax"],
            ["REQUIRES: soname 'libc.so.6' has no multilib category"]
        );

        let pkg = ebuild(&[(MetadataKey::Provides, "x86_64: libfoo.so.1")]);
        assert!(pkg.provides().is_none());
    }

    #[test]
    fn matches_use_dependencies() {
        let pkg = ebuild(&[(MetadataKey::Iuse, "+foo bar")]);
        assert!(atom_matches(&"dev-libs/foo[foo]".parse().unwrap(), &pkg));
        assert!(!atom_matches(&"dev-libs/foo[bar]".parse().unwrap(), &pkg));
        assert!(!atom_matches(&"dev-libs/foo[baz]".parse().unwrap(), &pkg));
        assert!(atom_matches(&"dev-libs/foo:0::gentoo".parse().unwrap(), &pkg));
    }

    #[test]
    fn phases_and_lists() {
        let pkg = ebuild(&[
            (MetadataKey::Properties, "live"),
            (MetadataKey::Restrict, "test? ( test ) mirror"),
            (MetadataKey::Iuse, "test"),
        ]);
        assert_eq!(pkg.defined_phases().len(), Phase::ALL.len());
        assert_eq!(pkg.properties(), ["live"]);
        assert_eq!(pkg.restrict(), ["mirror"]);

        let pkg = ebuild(&[(MetadataKey::DefinedPhases, "compile install")]);
        assert_eq!(pkg.defined_phases(), [Phase::SrcCompile, Phase::SrcInstall]);
        let pkg = ebuild(&[(MetadataKey::DefinedPhases, "-")]);
        assert!(pkg.defined_phases().is_empty());
    }
}

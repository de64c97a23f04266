use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

use crate::atom::{Atom, AtomInterner};
use crate::dep_expr::{use_reduce, DepExpr};
use crate::eapi::{Eapi, EapiAttrs};
use crate::error::Result;
use crate::iuse::{glob_match, ImplicitIuse, Iuse};
use crate::keyword::{accepted_keywords, keyword_mask, missing_keywords, Keyword, KeywordMask};
use crate::matcher::{atom_matches, Candidate};

/// Per-root configuration consulted by [`Package`](crate::Package).
///
/// Values mirror the stacked `make.conf`/profile variables after
/// incremental processing by the caller, except the `ACCEPT_*` lists, which
/// keep their raw tokens (`-*`, `-foo`, `@GROUP`).
#[derive(Debug, Clone)]
pub struct Settings {
    /// `ACCEPT_KEYWORDS`
    pub accept_keywords: Vec<String>,
    /// `package.accept_keywords`. An empty keyword list accepts the testing
    /// form of every accepted stable keyword.
    pub package_accept_keywords: Vec<(Atom, Vec<String>)>,
    /// `ACCEPT_LICENSE`
    pub accept_license: Vec<String>,
    /// `license_groups`, without the leading `@`.
    pub license_groups: BTreeMap<String, Vec<String>>,
    /// `package.license`
    pub package_accept_license: Vec<(Atom, Vec<String>)>,
    /// `ACCEPT_PROPERTIES`
    pub accept_properties: Vec<String>,
    /// `ACCEPT_RESTRICT`
    pub accept_restrict: Vec<String>,
    /// `package.mask`
    pub package_mask: Vec<Atom>,
    /// `package.unmask`
    pub package_unmask: Vec<Atom>,
    /// `CHOST`
    pub chost: String,
    /// `ACCEPT_CHOSTS`, `*` globs allowed.
    pub accept_chosts: Vec<String>,
    /// Whether USE-conditional LICENSE/PROPERTIES/RESTRICT are reduced on
    /// read, and which implicit IUSE applies.
    pub local_config: bool,
    /// Implicit IUSE for end users.
    pub iuse_implicit: Rc<ImplicitIuse>,
    /// Implicit IUSE used by repository QA tools (`local_config` off).
    pub repo_iuse_implicit: Rc<ImplicitIuse>,
    /// `use.aliases`: real flag to alias names.
    pub use_aliases: BTreeMap<String, Vec<String>>,
    /// EAPIs that support use aliases in addition to the official ones.
    pub use_alias_eapis: BTreeSet<String>,
    /// `USE`, incremental tokens.
    pub use_flags: Vec<String>,
    /// `use.force`
    pub use_force: BTreeSet<String>,
    /// `use.mask`
    pub use_mask: BTreeSet<String>,
    /// `USE_EXPAND`
    pub use_expand: Vec<String>,
    /// `USE_EXPAND_HIDDEN`
    pub use_expand_hidden: Vec<String>,
    /// `eapis-deprecated`
    pub deprecated_eapis: BTreeSet<String>,
    /// Installed package database, `/var/db/pkg` by default.
    pub vardb_path: PathBuf,
}

impl Default for Settings {
    /// Accepts every license, property and restriction but no keywords.
    fn default() -> Self {
        Settings {
            accept_keywords: Vec::new(),
            package_accept_keywords: Vec::new(),
            accept_license: vec!["*".to_string()],
            license_groups: BTreeMap::new(),
            package_accept_license: Vec::new(),
            accept_properties: vec!["*".to_string()],
            accept_restrict: vec!["*".to_string()],
            package_mask: Vec::new(),
            package_unmask: Vec::new(),
            chost: String::new(),
            accept_chosts: Vec::new(),
            local_config: true,
            iuse_implicit: Rc::default(),
            repo_iuse_implicit: Rc::default(),
            use_aliases: BTreeMap::new(),
            use_alias_eapis: BTreeSet::new(),
            use_flags: Vec::new(),
            use_force: BTreeSet::new(),
            use_mask: BTreeSet::new(),
            use_expand: Vec::new(),
            use_expand_hidden: Vec::new(),
            deprecated_eapis: BTreeSet::new(),
            vardb_path: PathBuf::from("/var/db/pkg"),
        }
    }
}

impl Settings {
    /// Capabilities of `eapi`, `None` if it is not supported.
    pub fn eapi_attrs(&self, eapi: &str) -> Option<EapiAttrs> {
        let parsed: Eapi = eapi.parse().ok()?;
        let mut attrs = parsed.attrs();
        attrs.use_aliases |= self.use_alias_eapis.contains(eapi);
        Some(attrs)
    }

    pub fn is_eapi_deprecated(&self, eapi: &str) -> bool {
        self.deprecated_eapis.contains(eapi)
    }

    /// The implicit IUSE matching `local_config`.
    pub fn implicit_iuse(&self) -> Rc<ImplicitIuse> {
        if self.local_config {
            Rc::clone(&self.iuse_implicit)
        } else {
            Rc::clone(&self.repo_iuse_implicit)
        }
    }

    /// Whether a package built for `chost` may be installed here.
    pub fn accept_chost(&self, chost: &str) -> bool {
        if chost.is_empty() || self.chost.is_empty() {
            return true;
        }
        if self.accept_chosts.is_empty() {
            return chost == self.chost;
        }
        self.accept_chosts
            .iter()
            .any(|pattern| glob_match(pattern, chost))
    }

    /// Keywords keeping `pkg` masked, with `package.accept_keywords` applied.
    pub fn missing_keywords<C: Candidate + ?Sized>(&self, pkg: &C, keywords: &str) -> Vec<String> {
        let global = accepted_keywords(self.accept_keywords.iter().map(String::as_str));
        let mut tokens: Vec<String> = self.accept_keywords.clone();
        for (atom, extra) in &self.package_accept_keywords {
            if !atom_matches(atom, pkg) {
                continue;
            }
            if extra.is_empty() {
                tokens.extend(
                    global
                        .iter()
                        .filter(|k| !k.starts_with(['~', '-', '*']))
                        .map(|k| format!("~{k}")),
                );
            } else {
                tokens.extend(extra.iter().cloned());
            }
        }
        let accepted = accepted_keywords(tokens.iter().map(String::as_str));
        missing_keywords(&parse_keywords(keywords), &accepted)
    }

    /// Keywords keeping a package masked under the global `ACCEPT_KEYWORDS`
    /// alone.
    pub fn raw_missing_keywords(&self, keywords: &str) -> Vec<String> {
        let accepted = accepted_keywords(self.accept_keywords.iter().map(String::as_str));
        missing_keywords(&parse_keywords(keywords), &accepted)
    }

    /// Classify a keyword mask, ignoring `package.accept_keywords`.
    pub fn keyword_mask(&self, keywords: &str) -> Option<KeywordMask> {
        let missing = self.raw_missing_keywords(keywords);
        let global = accepted_keywords(self.accept_keywords.iter().map(String::as_str));
        keyword_mask(&missing, &global)
    }

    /// Licenses of `license` that are not accepted for `pkg`.
    ///
    /// For an `||` group with no acceptable choice every choice is reported.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeSet;
    /// use portage_package::{CandidateCpv, Settings};
    ///
    /// let mut settings = Settings::default();
    /// settings.accept_license = vec!["-*".into(), "@FREE".into()];
    /// settings.license_groups.insert("FREE".into(), vec!["MIT".into(), "GPL-2".into()]);
    ///
    /// let pkg: CandidateCpv = "dev-libs/foo-1".parse().unwrap();
    /// let use_flags = BTreeSet::new();
    /// let missing = settings
    ///     .missing_licenses(&pkg, "MIT || ( EULA GPL-2 ) bindist? ( EULA )", &use_flags)
    ///     .unwrap();
    /// assert!(missing.is_empty());
    /// let missing = settings.missing_licenses(&pkg, "EULA", &use_flags).unwrap();
    /// assert_eq!(missing, ["EULA"]);
    /// ```
    pub fn missing_licenses<C: Candidate + ?Sized>(
        &self,
        pkg: &C,
        license: &str,
        use_flags: &BTreeSet<String>,
    ) -> Result<Vec<String>> {
        let mut tokens: Vec<&str> = self.accept_license.iter().map(String::as_str).collect();
        for (atom, extra) in &self.package_accept_license {
            if atom_matches(atom, pkg) {
                tokens.extend(extra.iter().map(String::as_str));
            }
        }
        let acceptance = Acceptance::new(tokens, &self.license_groups);
        missing_tokens(license, use_flags, &acceptance)
    }

    /// Values of `properties` not accepted by `ACCEPT_PROPERTIES`.
    pub fn missing_properties(
        &self,
        properties: &str,
        use_flags: &BTreeSet<String>,
    ) -> Result<Vec<String>> {
        let tokens = self.accept_properties.iter().map(String::as_str);
        missing_tokens(properties, use_flags, &Acceptance::new(tokens, &BTreeMap::new()))
    }

    /// Values of `restrict` not accepted by `ACCEPT_RESTRICT`.
    pub fn missing_restrict(
        &self,
        restrict: &str,
        use_flags: &BTreeSet<String>,
    ) -> Result<Vec<String>> {
        let tokens = self.accept_restrict.iter().map(String::as_str);
        missing_tokens(restrict, use_flags, &Acceptance::new(tokens, &BTreeMap::new()))
    }

    /// The `package.mask` atom masking `pkg`, unless `package.unmask` lifts it.
    pub fn mask_atom<C: Candidate + ?Sized>(&self, pkg: &C) -> Option<&Atom> {
        if self.package_unmask.iter().any(|atom| atom_matches(atom, pkg)) {
            return None;
        }
        self.raw_mask_atom(pkg)
    }

    /// The `package.mask` atom matching `pkg`, ignoring `package.unmask`.
    pub fn raw_mask_atom<C: Candidate + ?Sized>(&self, pkg: &C) -> Option<&Atom> {
        self.package_mask.iter().find(|atom| atom_matches(atom, pkg))
    }

    /// Default enabled flags for a package with effective IUSE `iuse`.
    ///
    /// IUSE defaults come first, then the incremental `USE` tokens, then
    /// `use.force` and `use.mask`. Flags outside IUSE are dropped.
    pub fn compute_use(&self, iuse: &Iuse) -> BTreeSet<String> {
        let mut enabled: BTreeSet<String> = iuse.enabled().clone();
        for token in &self.use_flags {
            match token.strip_prefix('-') {
                Some("*") => enabled.clear(),
                Some(flag) => {
                    enabled.remove(flag);
                }
                None => {
                    enabled.insert(token.clone());
                }
            }
        }
        enabled.extend(self.use_force.iter().cloned());
        enabled.retain(|flag| !self.use_mask.contains(flag) && iuse.is_valid_flag(flag));
        enabled
    }
}

/// Unparseable keywords never match anything.
fn parse_keywords(keywords: &str) -> Vec<Keyword> {
    keywords
        .split_whitespace()
        .filter_map(|token| token.parse().ok())
        .collect()
}

/// An `ACCEPT_*` list after incremental processing.
#[derive(Debug, Default)]
struct Acceptance {
    all: bool,
    accepted: BTreeSet<String>,
    rejected: BTreeSet<String>,
}

impl Acceptance {
    fn new<'a, I>(tokens: I, groups: &BTreeMap<String, Vec<String>>) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut acceptance = Acceptance::default();
        for token in tokens {
            let (negated, name) = match token.strip_prefix('-') {
                Some(name) => (true, name),
                None => (false, token),
            };
            match (negated, name) {
                (false, "*") => {
                    acceptance.all = true;
                    acceptance.rejected.clear();
                }
                (true, "*") => acceptance = Acceptance::default(),
                _ => {
                    for value in expand_group(name, groups, 0) {
                        acceptance.apply(negated, value);
                    }
                }
            }
        }
        acceptance
    }

    fn apply(&mut self, negated: bool, value: String) {
        if negated {
            self.accepted.remove(&value);
            if self.all {
                self.rejected.insert(value);
            }
        } else {
            self.rejected.remove(&value);
            self.accepted.insert(value);
        }
    }

    fn accepts(&self, value: &str) -> bool {
        self.accepted.contains(value) || (self.all && !self.rejected.contains(value))
    }
}

/// Expand `@GROUP` references. Nesting deeper than a few levels is treated
/// as a cycle and stops expanding.
fn expand_group(name: &str, groups: &BTreeMap<String, Vec<String>>, depth: usize) -> Vec<String> {
    let Some(group) = name.strip_prefix('@') else {
        return vec![name.to_string()];
    };
    if depth > 8 {
        return Vec::new();
    }
    match groups.get(group) {
        Some(members) => members
            .iter()
            .flat_map(|member| expand_group(member, groups, depth + 1))
            .collect(),
        None => {
            tracing::debug!(group, "undefined license group");
            Vec::new()
        }
    }
}

fn missing_tokens(
    text: &str,
    use_flags: &BTreeSet<String>,
    acceptance: &Acceptance,
) -> Result<Vec<String>> {
    let tree = use_reduce(text, use_flags)?;
    let mut missing = Vec::new();
    for token in masked(&tree, acceptance) {
        if !missing.contains(&token) {
            missing.push(token);
        }
    }
    Ok(missing)
}

fn masked(exprs: &[DepExpr<String>], acceptance: &Acceptance) -> Vec<String> {
    let mut missing = Vec::new();
    for expr in exprs {
        match expr {
            DepExpr::Leaf(token) => {
                if !acceptance.accepts(token) {
                    missing.push(token.clone());
                }
            }
            DepExpr::AllOf(children) | DepExpr::Conditional { children, .. } => {
                missing.extend(masked(children, acceptance));
            }
            DepExpr::AnyOf(children) => {
                let mut choices = Vec::new();
                for child in children {
                    let child_missing = masked(std::slice::from_ref(child), acceptance);
                    if child_missing.is_empty() {
                        choices.clear();
                        break;
                    }
                    choices.extend(child_missing);
                }
                missing.extend(choices);
            }
        }
    }
    missing
}

/// A bounded table sharing identical flag sets between packages.
#[derive(Debug)]
pub struct FlagSetInterner {
    capacity: usize,
    sets: RefCell<HashSet<Rc<BTreeSet<String>>>>,
}

impl FlagSetInterner {
    pub fn new(capacity: usize) -> Self {
        FlagSetInterner {
            capacity,
            sets: RefCell::new(HashSet::new()),
        }
    }

    /// Return the shared instance equal to `flags`.
    ///
    /// Once the table is full new sets are handed out unshared.
    pub fn intern(&self, flags: BTreeSet<String>) -> Rc<BTreeSet<String>> {
        let mut sets = self.sets.borrow_mut();
        if let Some(shared) = sets.get(&flags) {
            return Rc::clone(shared);
        }
        let shared = Rc::new(flags);
        if sets.len() < self.capacity {
            sets.insert(Rc::clone(&shared));
        }
        shared
    }

    pub fn len(&self) -> usize {
        self.sets.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.borrow().is_empty()
    }
}

impl Default for FlagSetInterner {
    fn default() -> Self {
        FlagSetInterner::new(1024)
    }
}

/// A root filesystem with its configuration and the interning tables
/// shared by every package of one resolution session.
#[derive(Debug)]
pub struct RootConfig {
    root: String,
    settings: Settings,
    atoms: AtomInterner,
    flag_sets: FlagSetInterner,
}

impl RootConfig {
    /// # Examples
    ///
    /// ```
    /// use portage_package::{RootConfig, Settings};
    ///
    /// let root = RootConfig::new("/", Settings::default());
    /// let a = root.intern_flags(["ssl".to_string()].into());
    /// let b = root.intern_flags(["ssl".to_string()].into());
    /// assert!(std::rc::Rc::ptr_eq(&a, &b));
    /// ```
    pub fn new(root: impl Into<String>, settings: Settings) -> Rc<Self> {
        Rc::new(RootConfig {
            root: root.into(),
            settings,
            atoms: AtomInterner::default(),
            flag_sets: FlagSetInterner::default(),
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Atom interning table used when reducing dependency strings.
    pub fn atoms(&self) -> &AtomInterner {
        &self.atoms
    }

    pub fn intern_flags(&self, flags: BTreeSet<String>) -> Rc<BTreeSet<String>> {
        self.flag_sets.intern(flags)
    }
}

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use portage_atom::Version;
use winnow::combinator::{alt, cut_err, delimited, not, opt, preceded};
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

use crate::eapi::EapiAttrs;
use crate::error::{Error, Result};
use crate::use_dep::UseDependency;

/// Package dependency blocker type.
///
/// See [PMS 8.3.2](https://projects.gentoo.org/pms/9/pms.html#block-operator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blocker {
    /// `!`
    Weak,
    /// `!!`, EAPI 2 and later.
    Strong,
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Blocker::Weak => write!(f, "!"),
            Blocker::Strong => write!(f, "!!"),
        }
    }
}

/// Version operator of an atom.
///
/// See [PMS 8.3.1](https://projects.gentoo.org/pms/9/pms.html#operators).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Equal,
    /// `~`: any revision of the version.
    Approximate,
    /// `=` with a trailing `*` on the version.
    EqualGlob,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
}

impl Operator {
    /// Whether this is one of the ordered comparisons.
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            Operator::Greater | Operator::GreaterOrEqual | Operator::Less | Operator::LessOrEqual
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Operator::Equal | Operator::EqualGlob => "=",
            Operator::Approximate => "~",
            Operator::Greater => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
        };
        f.write_str(s)
    }
}

/// Slot operator of an atom.
///
/// See [PMS 8.3.3](https://projects.gentoo.org/pms/9/pms.html#slot-dependencies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotOperator {
    /// `:*`: any slot, no rebuild.
    Star,
    /// `:=`: rebuild on slot or sub-slot change.
    Equal,
}

/// Context-dependent rules applied while parsing an atom.
///
/// The default allows repository qualifiers and blockers, rejects
/// wildcards and does not check anything EAPI specific.
#[derive(Clone, Copy)]
pub struct AtomOptions<'a> {
    /// Accept `*` inside the category or package name.
    pub allow_wildcard: bool,
    /// Accept a `::repo` qualifier.
    pub allow_repo: bool,
    /// Accept a `!`/`!!` prefix.
    pub allow_blocker: bool,
    /// Reject syntax the EAPI does not support.
    pub eapi: Option<EapiAttrs>,
    /// Reject conditional use-dep flags the parent does not declare.
    pub is_valid_flag: Option<&'a dyn Fn(&str) -> bool>,
}

impl Default for AtomOptions<'_> {
    fn default() -> Self {
        AtomOptions {
            allow_wildcard: false,
            allow_repo: true,
            allow_blocker: true,
            eapi: None,
            is_valid_flag: None,
        }
    }
}

impl fmt::Debug for AtomOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AtomOptions")
            .field("allow_wildcard", &self.allow_wildcard)
            .field("allow_repo", &self.allow_repo)
            .field("allow_blocker", &self.allow_blocker)
            .field("eapi", &self.eapi)
            .field("is_valid_flag", &self.is_valid_flag.is_some())
            .finish()
    }
}

/// A parsed package dependency specification.
///
/// Represents atoms like `>=dev-lang/rust-1.75.0:0/1.75=::gentoo[ssl]`.
/// Equality, ordering and hashing use the canonical string form, which is
/// exactly the text the atom was parsed from.
///
/// See [PMS 8.3](https://projects.gentoo.org/pms/9/pms.html#package-dependency-specifications).
#[derive(Debug, Clone)]
pub struct Atom {
    text: String,
    blocker: Option<Blocker>,
    operator: Option<Operator>,
    category: String,
    package: String,
    version: Option<String>,
    slot: Option<String>,
    sub_slot: Option<String>,
    slot_operator: Option<SlotOperator>,
    repo: Option<String>,
    use_dep: Option<UseDependency>,
    extended: bool,
    unevaluated: Option<Box<Atom>>,
}

impl Atom {
    /// Parse an atom with the default [`AtomOptions`].
    ///
    /// # Examples
    ///
    /// ```
    /// use portage_package::{Atom, Operator};
    ///
    /// let atom = Atom::parse(">=dev-libs/foo-1.2:0/1[bar,-baz]").unwrap();
    /// assert_eq!(atom.operator(), Some(Operator::GreaterOrEqual));
    /// assert_eq!(atom.cp(), "dev-libs/foo");
    /// assert_eq!(atom.version(), Some("1.2"));
    /// assert_eq!(atom.slot(), Some("0"));
    /// assert_eq!(atom.sub_slot(), Some("1"));
    /// let use_dep = atom.use_dep().unwrap();
    /// assert!(use_dep.enabled.contains("bar"));
    /// assert!(use_dep.disabled.contains("baz"));
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        Self::parse_with(input, &AtomOptions::default())
    }

    /// Parse an atom, applying the rules of `options`.
    pub fn parse_with(input: &str, options: &AtomOptions<'_>) -> Result<Self> {
        let atom = Self::parse_syntax(input)?;
        atom.check(options)?;
        Ok(atom)
    }

    fn parse_syntax(input: &str) -> Result<Self> {
        let raw = parse_raw_atom()
            .parse(input)
            .map_err(|e| Error::atom(input, format!("{e}")))?;

        let (category, rest) = raw
            .cpv
            .split_once('/')
            .ok_or_else(|| Error::atom(input, "missing category"))?;

        let mut operator = raw.operator;
        let (package, version) = match operator {
            Some(op) => {
                let (package, version) = split_version(rest)
                    .ok_or_else(|| Error::atom(input, "operator requires a version"))?;
                let version = match version.strip_suffix('*') {
                    Some(base) if op == Operator::Equal => {
                        operator = Some(Operator::EqualGlob);
                        base
                    }
                    Some(_) => {
                        return Err(Error::atom(input, "'*' is only valid with the '=' operator"))
                    }
                    None => version,
                };
                Version::parse(version)
                    .map_err(|e| Error::atom(input, format!("invalid version: {e}")))?;
                (package, Some(version.to_string()))
            }
            None => {
                if let Some((_, version)) = split_version(rest) {
                    if Version::parse(version).is_ok() {
                        return Err(Error::atom(input, "version requires an operator"));
                    }
                }
                (rest, None)
            }
        };

        if !is_valid_name(category, is_category_char) {
            return Err(Error::atom(input, format!("invalid category '{category}'")));
        }
        if !is_valid_name(package, is_package_char) {
            return Err(Error::atom(input, format!("invalid package name '{package}'")));
        }
        let extended = category.contains('*') || package.contains('*');

        let use_dep = raw
            .use_dep
            .map(UseDependency::parse)
            .transpose()
            .map_err(|e| Error::atom(input, format!("invalid use dependency: {e}")))?;

        Ok(Atom {
            text: input.to_string(),
            blocker: raw.blocker,
            operator,
            category: category.to_string(),
            package: package.to_string(),
            version,
            slot: raw.slot.name.map(str::to_string),
            sub_slot: raw.slot.sub_slot.map(str::to_string),
            slot_operator: raw.slot.operator,
            repo: raw.repo.map(str::to_string),
            use_dep,
            extended,
            unevaluated: None,
        })
    }

    /// Validate the context-dependent rules. Interned atoms are checked again
    /// on every lookup.
    fn check(&self, options: &AtomOptions<'_>) -> Result<()> {
        let text = self.text.as_str();
        if self.extended && !options.allow_wildcard {
            return Err(Error::atom(text, "wildcards are not allowed"));
        }
        if self.repo.is_some() && !options.allow_repo {
            return Err(Error::atom(text, "repository qualifiers are not allowed"));
        }
        if self.blocker.is_some() && !options.allow_blocker {
            return Err(Error::atom(text, "blockers are not allowed"));
        }

        if let Some(eapi) = &options.eapi {
            let incompatible = |what: &str| {
                Error::atom(text, format!("{what} not supported by EAPI"))
                    .with_category("EAPI.incompatible")
            };

            if (self.slot.is_some() || self.slot_operator.is_some()) && !eapi.slot_deps {
                return Err(incompatible("slot dependency"));
            }
            if (self.slot_operator.is_some() || self.sub_slot.is_some()) && !eapi.slot_operator {
                return Err(incompatible("slot operator"));
            }
            if self.blocker == Some(Blocker::Strong) && !eapi.strong_blocks {
                return Err(incompatible("strong blocker"));
            }
            if let Some(use_dep) = &self.use_dep {
                if !eapi.use_deps {
                    return Err(incompatible("use dependency"));
                }
                let has_defaults =
                    !use_dep.missing_enabled.is_empty() || !use_dep.missing_disabled.is_empty();
                if has_defaults && !eapi.use_dep_defaults {
                    return Err(incompatible("use dependency default"));
                }
            }
        }

        if let (Some(is_valid_flag), Some(use_dep)) = (options.is_valid_flag, &self.use_dep) {
            let missing: Vec<&str> = use_dep
                .conditional
                .flags()
                .into_iter()
                .filter(|flag| {
                    !is_valid_flag(flag)
                        && !use_dep.missing_enabled.contains(*flag)
                        && !use_dep.missing_disabled.contains(*flag)
                })
                .collect();
            if !missing.is_empty() {
                return Err(Error::atom(
                    text,
                    format!("conditional USE flag(s) not in IUSE: {}", missing.join(" ")),
                )
                .with_category("IUSE.missing"));
            }
        }

        Ok(())
    }

    fn render(&self) -> String {
        let mut s = String::new();
        if let Some(blocker) = self.blocker {
            s.push_str(&blocker.to_string());
        }
        if let Some(op) = self.operator {
            s.push_str(&op.to_string());
        }
        s.push_str(&self.category);
        s.push('/');
        s.push_str(&self.package);
        if let Some(version) = &self.version {
            s.push('-');
            s.push_str(version);
            if self.operator == Some(Operator::EqualGlob) {
                s.push('*');
            }
        }
        match (&self.slot, self.slot_operator) {
            (None, Some(SlotOperator::Star)) => s.push_str(":*"),
            (None, Some(SlotOperator::Equal)) => s.push_str(":="),
            (Some(slot), op) => {
                s.push(':');
                s.push_str(slot);
                if let Some(sub_slot) = &self.sub_slot {
                    s.push('/');
                    s.push_str(sub_slot);
                }
                if op == Some(SlotOperator::Equal) {
                    s.push('=');
                }
            }
            (None, None) => {}
        }
        if let Some(repo) = &self.repo {
            s.push_str("::");
            s.push_str(repo);
        }
        if let Some(use_dep) = &self.use_dep {
            s.push_str(&use_dep.to_string());
        }
        s
    }

    fn rebuilt(mut self) -> Atom {
        self.text = self.render();
        self
    }

    /// Blocker prefix, if any.
    pub fn blocker(&self) -> Option<Blocker> {
        self.blocker
    }

    /// Version operator, if any.
    pub fn operator(&self) -> Option<Operator> {
        self.operator
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Version text without operator or glob `*`.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn slot(&self) -> Option<&str> {
        self.slot.as_deref()
    }

    pub fn sub_slot(&self) -> Option<&str> {
        self.sub_slot.as_deref()
    }

    pub fn slot_operator(&self) -> Option<SlotOperator> {
        self.slot_operator
    }

    pub fn repo(&self) -> Option<&str> {
        self.repo.as_deref()
    }

    pub fn use_dep(&self) -> Option<&UseDependency> {
        self.use_dep.as_ref()
    }

    /// Whether the atom uses `*` wildcards in its name.
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// The atom before [`Atom::evaluate_conditionals`] was applied.
    pub fn unevaluated(&self) -> &Atom {
        self.unevaluated.as_deref().unwrap_or(self)
    }

    /// `category/package`
    pub fn cp(&self) -> String {
        format!("{}/{}", self.category, self.package)
    }

    /// `category/package-version`, or `category/package` if unversioned.
    pub fn cpv(&self) -> String {
        match &self.version {
            Some(version) => format!("{}/{}-{}", self.category, self.package, version),
            None => self.cp(),
        }
    }

    /// Whether this is a `:slot/sub=` atom recorded by a built package.
    pub fn slot_operator_built(&self) -> bool {
        self.slot_operator == Some(SlotOperator::Equal) && self.sub_slot.is_some()
    }

    /// A copy without the blocker prefix.
    pub fn without_blocker(&self) -> Atom {
        if self.blocker.is_none() {
            return self.clone();
        }
        Atom {
            blocker: None,
            ..self.clone()
        }
        .rebuilt()
    }

    pub fn without_repo(&self) -> Atom {
        if self.repo.is_none() {
            return self.clone();
        }
        Atom {
            repo: None,
            ..self.clone()
        }
        .rebuilt()
    }

    pub fn with_repo(&self, repo: &str) -> Atom {
        Atom {
            repo: Some(repo.to_string()),
            ..self.clone()
        }
        .rebuilt()
    }

    /// A copy without slot, sub-slot and slot operator.
    pub fn without_slot(&self) -> Atom {
        if self.slot.is_none() && self.slot_operator.is_none() {
            return self.clone();
        }
        Atom {
            slot: None,
            sub_slot: None,
            slot_operator: None,
            ..self.clone()
        }
        .rebuilt()
    }

    /// A copy constrained to `slot`, replacing any slot part.
    pub fn with_slot(&self, slot: &str) -> Atom {
        let (slot, sub_slot) = match slot.split_once('/') {
            Some((slot, sub_slot)) => (slot, Some(sub_slot.to_string())),
            None => (slot, None),
        };
        Atom {
            slot: Some(slot.to_string()),
            sub_slot,
            slot_operator: None,
            ..self.clone()
        }
        .rebuilt()
    }

    pub fn without_use(&self) -> Atom {
        if self.use_dep.is_none() {
            return self.clone();
        }
        Atom {
            use_dep: None,
            unevaluated: None,
            ..self.clone()
        }
        .rebuilt()
    }

    /// Resolve the conditional use-dep tokens against the parent's USE.
    ///
    /// The result remembers the unevaluated atom.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeSet;
    /// use portage_package::Atom;
    ///
    /// let atom = Atom::parse("dev-libs/foo[ssl?,!debug?]").unwrap();
    /// let evaluated = atom.evaluate_conditionals(&BTreeSet::new());
    /// assert_eq!(evaluated.to_string(), "dev-libs/foo[-debug]");
    /// assert_eq!(evaluated.unevaluated(), &atom);
    /// ```
    pub fn evaluate_conditionals(&self, use_flags: &BTreeSet<String>) -> Atom {
        let Some(use_dep) = &self.use_dep else {
            return self.clone();
        };
        if use_dep.conditional.is_empty() {
            return self.clone();
        }
        let evaluated = use_dep.evaluate_conditionals(use_flags);
        Atom {
            use_dep: (!evaluated.is_empty()).then_some(evaluated),
            unevaluated: Some(Box::new(self.unevaluated().clone())),
            ..self.clone()
        }
        .rebuilt()
    }

    /// Keep only the use-dep constraints `other_use` does not satisfy.
    ///
    /// See [`UseDependency::violated_conditionals`].
    pub fn violated_conditionals<F>(
        &self,
        other_use: &BTreeSet<String>,
        is_valid_flag: F,
        parent_use: Option<&BTreeSet<String>>,
    ) -> Result<Atom>
    where
        F: Fn(&str) -> bool,
    {
        let Some(use_dep) = &self.use_dep else {
            return Ok(self.clone());
        };
        let violated = use_dep.violated_conditionals(other_use, is_valid_flag, parent_use)?;
        Ok(Atom {
            use_dep: (!violated.is_empty()).then_some(violated),
            unevaluated: None,
            ..self.clone()
        }
        .rebuilt())
    }

    /// Whether some package could match both atoms.
    ///
    /// Conservative: atoms that differ in key, operator, version or use-dep
    /// are reported as disjoint.
    pub fn intersects(&self, other: &Atom) -> bool {
        if self == other {
            return true;
        }
        if self.cp() != other.cp()
            || self.use_dep != other.use_dep
            || self.operator != other.operator
            || self.version != other.version
        {
            return false;
        }
        match (&self.slot, &other.slot) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl PartialOrd for Atom {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Atom {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(&other.text)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<Atom> for Atom {
    fn as_ref(&self) -> &Atom {
        self
    }
}

impl FromStr for Atom {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A bounded interning table for atoms.
///
/// Equal text yields the same shared instance while it stays in the table.
/// Once `capacity` entries are held the least recently used one is evicted.
/// Context rules are re-checked on every lookup, so a hit never bypasses
/// validation.
#[derive(Debug)]
pub struct AtomInterner {
    capacity: usize,
    tick: Cell<u64>,
    entries: RefCell<HashMap<String, (Arc<Atom>, u64)>>,
}

impl AtomInterner {
    /// Create a table holding at most `capacity` atoms.
    pub fn new(capacity: usize) -> Self {
        AtomInterner {
            capacity: capacity.max(1),
            tick: Cell::new(0),
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Parse `text` or return the interned instance.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use portage_package::{AtomInterner, AtomOptions};
    ///
    /// let interner = AtomInterner::new(16);
    /// let a = interner.get("dev-libs/foo", &AtomOptions::default()).unwrap();
    /// let b = interner.get("dev-libs/foo", &AtomOptions::default()).unwrap();
    /// assert!(Arc::ptr_eq(&a, &b));
    /// ```
    pub fn get(&self, text: &str, options: &AtomOptions<'_>) -> Result<Arc<Atom>> {
        let now = self.tick.get() + 1;
        self.tick.set(now);

        let hit = self
            .entries
            .borrow()
            .get(text)
            .map(|(atom, _)| Arc::clone(atom));
        if let Some(atom) = hit {
            tracing::trace!(atom = text, "interned atom hit");
            // The check may call back into this table.
            atom.check(options)?;
            if let Some((_, last_used)) = self.entries.borrow_mut().get_mut(text) {
                *last_used = now;
            }
            return Ok(atom);
        }

        let atom = Arc::new(Atom::parse_with(text, options)?);
        let mut entries = self.entries.borrow_mut();
        if entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, (_, last_used))| *last_used)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                tracing::trace!(atom = %oldest, "evicting interned atom");
                entries.remove(&oldest);
            }
        }
        tracing::trace!(atom = text, "interning atom");
        entries.insert(text.to_string(), (Arc::clone(&atom), now));
        Ok(atom)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for AtomInterner {
    fn default() -> Self {
        AtomInterner::new(4096)
    }
}

/// Split `package-version` at the last `-` followed by a digit.
pub(crate) fn split_version(s: &str) -> Option<(&str, &str)> {
    let bytes = s.as_bytes();
    let pos = (1..bytes.len().saturating_sub(1))
        .rev()
        .find(|&i| bytes[i] == b'-' && bytes[i + 1].is_ascii_digit())?;
    Some((&s[..pos], &s[pos + 1..]))
}

fn is_category_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '.' | '-' | '*')
}

fn is_package_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '-' | '*')
}

fn is_valid_name(name: &str, allowed: fn(char) -> bool) -> bool {
    let Some(first) = name.chars().next() else {
        return false;
    };
    (first.is_ascii_alphanumeric() || first == '_' || first == '*') && name.chars().all(allowed)
}

// Winnow parsers

#[derive(Debug, Clone, Default)]
struct RawSlot<'s> {
    name: Option<&'s str>,
    sub_slot: Option<&'s str>,
    operator: Option<SlotOperator>,
}

struct RawAtom<'s> {
    blocker: Option<Blocker>,
    operator: Option<Operator>,
    cpv: &'s str,
    slot: RawSlot<'s>,
    repo: Option<&'s str>,
    use_dep: Option<&'s str>,
}

fn parse_blocker<'s>() -> impl Parser<&'s str, Blocker, ErrMode<ContextError>> {
    alt(("!!".value(Blocker::Strong), "!".value(Blocker::Weak)))
}

fn parse_operator<'s>() -> impl Parser<&'s str, Operator, ErrMode<ContextError>> {
    alt((
        "<=".value(Operator::LessOrEqual),
        "<".value(Operator::Less),
        ">=".value(Operator::GreaterOrEqual),
        ">".value(Operator::Greater),
        "~".value(Operator::Approximate),
        "=".value(Operator::Equal),
    ))
    .context(StrContext::Label("operator"))
}

fn parse_slot_name<'s>() -> impl Parser<&'s str, &'s str, ErrMode<ContextError>> {
    take_while(1.., |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '.' | '-')
    })
    .verify(|s: &str| !s.starts_with(['+', '.', '-']))
    .context(StrContext::Label("slot name"))
}

/// Whether `slot` is a valid SLOT or sub-slot name.
pub(crate) fn is_valid_slot_name(slot: &str) -> bool {
    parse_slot_name().parse(slot).is_ok()
}

fn parse_slot<'s>() -> impl Parser<&'s str, RawSlot<'s>, ErrMode<ContextError>> {
    alt((
        '*'.value(RawSlot {
            operator: Some(SlotOperator::Star),
            ..RawSlot::default()
        }),
        '='.value(RawSlot {
            operator: Some(SlotOperator::Equal),
            ..RawSlot::default()
        }),
        (
            parse_slot_name(),
            opt(preceded('/', cut_err(parse_slot_name()))),
            opt('='),
        )
            .map(|(name, sub_slot, equal)| RawSlot {
                name: Some(name),
                sub_slot,
                operator: equal.map(|_| SlotOperator::Equal),
            }),
    ))
    .context(StrContext::Label("slot"))
}

fn parse_repo<'s>() -> impl Parser<&'s str, &'s str, ErrMode<ContextError>> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        .verify(|s: &str| !s.starts_with('-'))
        .context(StrContext::Label("repository"))
}

/// `[!|!!][op]cat/pkg[-ver][:slot][::repo][[use]]`
fn parse_raw_atom<'s>() -> impl Parser<&'s str, RawAtom<'s>, ErrMode<ContextError>> {
    (
        opt(parse_blocker()),
        opt(parse_operator()),
        take_while(1.., |c: char| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '.' | '*' | '/')
        }),
        opt(preceded((':', not(':')), cut_err(parse_slot()))),
        opt(preceded("::", cut_err(parse_repo()))),
        opt(delimited('[', take_till(0.., ']'), ']')),
    )
        .map(|(blocker, operator, cpv, slot, repo, use_dep)| RawAtom {
            blocker,
            operator,
            cpv,
            slot: slot.unwrap_or_default(),
            repo,
            use_dep,
        })
}

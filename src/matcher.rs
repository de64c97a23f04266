use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use portage_atom::Version;

use crate::atom::{split_version, Atom, Operator};
use crate::error::{Error, Result};
use crate::iuse::glob_match;

/// Something an [`Atom`] can be matched against.
///
/// Implemented by [`Package`](crate::Package) and by the lightweight
/// [`CandidateCpv`].
pub trait Candidate {
    fn category(&self) -> &str;

    fn package(&self) -> &str;

    /// Version including any `-rN` revision.
    fn version(&self) -> &str;

    fn slot(&self) -> Option<&str>;

    fn sub_slot(&self) -> Option<&str>;

    /// Repository the candidate comes from, if known.
    fn repo(&self) -> Option<&str>;

    /// Enabled USE flags, if the candidate carries USE information.
    ///
    /// Candidates returning `None` pass every use-dep check.
    fn use_enabled(&self) -> Option<&BTreeSet<String>> {
        None
    }

    /// Whether `flag` is in the candidate's effective IUSE.
    fn is_valid_flag(&self, _flag: &str) -> bool {
        true
    }

    /// `category/package`
    fn cp(&self) -> String {
        format!("{}/{}", self.category(), self.package())
    }

    /// `category/package-version`
    fn cpv(&self) -> String {
        format!("{}/{}-{}", self.category(), self.package(), self.version())
    }
}

/// A bare `category/package-version[:slot[/sub_slot]][::repo]` candidate.
///
/// # Examples
///
/// ```
/// use portage_package::{Candidate, CandidateCpv};
///
/// let cpv: CandidateCpv = "dev-libs/foo-1.0-r1:2/2.1::gentoo".parse().unwrap();
/// assert_eq!(cpv.cp(), "dev-libs/foo");
/// assert_eq!(cpv.version(), "1.0-r1");
/// assert_eq!(cpv.slot(), Some("2"));
/// assert_eq!(cpv.sub_slot(), Some("2.1"));
/// assert_eq!(cpv.repo(), Some("gentoo"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateCpv {
    category: String,
    package: String,
    version: String,
    slot: Option<String>,
    sub_slot: Option<String>,
    repo: Option<String>,
}

impl CandidateCpv {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || Error::InvalidCpv(input.to_string());

        let (rest, repo) = match input.split_once("::") {
            Some((rest, repo)) if !repo.is_empty() => (rest, Some(repo.to_string())),
            Some(_) => return Err(invalid()),
            None => (input, None),
        };
        let (cpv, slot, sub_slot) = match rest.split_once(':') {
            Some((cpv, slot)) => match slot.split_once('/') {
                Some((slot, sub_slot)) => (cpv, Some(slot), Some(sub_slot)),
                None => (cpv, Some(slot), None),
            },
            None => (rest, None, None),
        };
        if slot.is_some_and(str::is_empty) || sub_slot.is_some_and(str::is_empty) {
            return Err(invalid());
        }

        let (category, pv) = cpv.split_once('/').ok_or_else(invalid)?;
        let (package, version) = split_version(pv).ok_or_else(invalid)?;
        if category.is_empty() || package.is_empty() || Version::parse(version).is_err() {
            return Err(invalid());
        }

        Ok(CandidateCpv {
            category: category.to_string(),
            package: package.to_string(),
            version: version.to_string(),
            slot: slot.map(str::to_string),
            sub_slot: sub_slot.map(str::to_string),
            repo,
        })
    }
}

impl Candidate for CandidateCpv {
    fn category(&self) -> &str {
        &self.category
    }

    fn package(&self) -> &str {
        &self.package
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn slot(&self) -> Option<&str> {
        self.slot.as_deref()
    }

    /// Falls back to the slot when no sub-slot was given.
    fn sub_slot(&self) -> Option<&str> {
        self.sub_slot.as_deref().or(self.slot.as_deref())
    }

    fn repo(&self) -> Option<&str> {
        self.repo.as_deref()
    }
}

impl fmt::Display for CandidateCpv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}-{}", self.category, self.package, self.version)?;
        if let Some(slot) = &self.slot {
            write!(f, ":{slot}")?;
            if let Some(sub_slot) = &self.sub_slot {
                write!(f, "/{sub_slot}")?;
            }
        }
        if let Some(repo) = &self.repo {
            write!(f, "::{repo}")?;
        }
        Ok(())
    }
}

impl FromStr for CandidateCpv {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Compare two version strings, `None` if either does not parse.
pub fn vercmp(a: &str, b: &str) -> Option<Ordering> {
    let a = Version::parse(a).ok()?;
    let b = Version::parse(b).ok()?;
    Some(a.cmp(&b))
}

fn strip_revision(version: &str) -> &str {
    match version.rfind("-r") {
        Some(pos)
            if pos + 2 < version.len()
                && version[pos + 2..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &version[..pos]
        }
        _ => version,
    }
}

fn strip_leading_zeros(version: &str) -> String {
    let trimmed = version.trim_start_matches('0');
    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        trimmed.to_string()
    } else {
        format!("0{trimmed}")
    }
}

/// `=pkg-1*` matching: a literal prefix that ends on a component boundary,
/// so `1*` matches `1.0` and `01.2` but not `10`.
fn glob_version_match(pattern: &str, version: &str) -> bool {
    let pattern = strip_leading_zeros(pattern);
    let version = strip_leading_zeros(version);
    let Some(rest) = version.strip_prefix(pattern.as_str()) else {
        return false;
    };
    match rest.chars().next() {
        None => true,
        Some('.' | '_' | '-') => true,
        Some(next) => pattern.ends_with(|c: char| c.is_ascii_digit()) != next.is_ascii_digit(),
    }
}

fn key_matches<C: Candidate + ?Sized>(atom: &Atom, candidate: &C) -> bool {
    if atom.is_extended() {
        glob_match(atom.category(), candidate.category())
            && glob_match(atom.package(), candidate.package())
    } else {
        atom.category() == candidate.category() && atom.package() == candidate.package()
    }
}

fn version_matches<C: Candidate + ?Sized>(atom: &Atom, candidate: &C) -> bool {
    let (Some(op), Some(version)) = (atom.operator(), atom.version()) else {
        return true;
    };
    let candidate_version = candidate.version();
    match op {
        Operator::Equal => vercmp(candidate_version, version) == Some(Ordering::Equal),
        Operator::Approximate => strip_revision(candidate_version) == strip_revision(version),
        Operator::EqualGlob => glob_version_match(version, candidate_version),
        Operator::Greater => vercmp(candidate_version, version) == Some(Ordering::Greater),
        Operator::GreaterOrEqual => matches!(
            vercmp(candidate_version, version),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Less => vercmp(candidate_version, version) == Some(Ordering::Less),
        Operator::LessOrEqual => matches!(
            vercmp(candidate_version, version),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

fn slot_matches<C: Candidate + ?Sized>(atom: &Atom, candidate: &C) -> bool {
    let Some(slot) = atom.slot() else {
        return true;
    };
    let Some(candidate_slot) = candidate.slot() else {
        return true;
    };
    slot == candidate_slot
        && atom
            .sub_slot()
            .map_or(true, |sub_slot| Some(sub_slot) == candidate.sub_slot())
}

fn use_matches<C: Candidate + ?Sized>(atom: &Atom, candidate: &C) -> bool {
    let Some(unevaluated) = atom.unevaluated().use_dep() else {
        return true;
    };
    let Some(enabled) = candidate.use_enabled() else {
        return true;
    };

    if !unevaluated
        .required
        .iter()
        .all(|flag| candidate.is_valid_flag(flag))
    {
        return false;
    }

    let Some(use_dep) = atom.use_dep() else {
        return true;
    };

    let missing_enabled: BTreeSet<&str> = use_dep
        .missing_enabled
        .iter()
        .map(String::as_str)
        .filter(|flag| !candidate.is_valid_flag(flag))
        .collect();
    let missing_disabled: BTreeSet<&str> = use_dep
        .missing_disabled
        .iter()
        .map(String::as_str)
        .filter(|flag| !candidate.is_valid_flag(flag))
        .collect();

    if !use_dep.enabled.is_empty() {
        if use_dep
            .enabled
            .iter()
            .any(|flag| missing_disabled.contains(flag.as_str()))
        {
            return false;
        }
        let unsatisfied = use_dep
            .enabled
            .iter()
            .filter(|flag| !enabled.contains(*flag))
            .any(|flag| !missing_enabled.contains(flag.as_str()));
        if unsatisfied {
            return false;
        }
    }

    if !use_dep.disabled.is_empty() {
        if use_dep
            .disabled
            .iter()
            .any(|flag| missing_enabled.contains(flag.as_str()))
        {
            return false;
        }
        let unsatisfied = use_dep
            .disabled
            .iter()
            .filter(|flag| enabled.contains(*flag))
            .any(|flag| !missing_disabled.contains(flag.as_str()));
        if unsatisfied {
            return false;
        }
    }

    true
}

fn repo_matches<C: Candidate + ?Sized>(atom: &Atom, candidate: &C) -> bool {
    match (atom.repo(), candidate.repo()) {
        (Some(repo), Some(candidate_repo)) => repo == candidate_repo,
        _ => true,
    }
}

/// Whether `candidate` satisfies `atom`, ignoring any blocker prefix.
pub fn atom_matches<C: Candidate + ?Sized>(atom: &Atom, candidate: &C) -> bool {
    key_matches(atom, candidate)
        && version_matches(atom, candidate)
        && slot_matches(atom, candidate)
        && use_matches(atom, candidate)
        && repo_matches(atom, candidate)
}

/// The candidates that satisfy `atom`, in input order.
///
/// Candidates are filtered by key, then version operator, slot, use
/// dependency and repository.
///
/// # Examples
///
/// ```
/// use portage_package::{match_from_list, Atom, CandidateCpv};
///
/// let atom = Atom::parse("dev-libs/foo").unwrap();
/// let candidates: Vec<CandidateCpv> = ["dev-libs/foo-1.0", "dev-libs/bar-1.0"]
///     .iter()
///     .map(|s| s.parse().unwrap())
///     .collect();
/// let matched = match_from_list(&atom, &candidates);
/// assert_eq!(matched.len(), 1);
/// assert_eq!(matched[0].to_string(), "dev-libs/foo-1.0");
/// ```
pub fn match_from_list<'c, C, I>(atom: &Atom, candidates: I) -> Vec<&'c C>
where
    C: Candidate + ?Sized + 'c,
    I: IntoIterator<Item = &'c C>,
{
    candidates
        .into_iter()
        .filter(|candidate| atom_matches(atom, *candidate))
        .collect()
}

/// The distinct atoms of `atoms` that `candidate` satisfies, in input order.
pub fn match_to_list<'a, C, A>(candidate: &C, atoms: &'a [A]) -> Vec<&'a Atom>
where
    C: Candidate + ?Sized,
    A: AsRef<Atom>,
{
    let mut seen = HashSet::new();
    atoms
        .iter()
        .map(AsRef::as_ref)
        .filter(|atom| seen.insert(*atom))
        .filter(|atom| atom_matches(atom, candidate))
        .collect()
}

fn specificity(atom: &Atom) -> i32 {
    if atom.is_extended() {
        return match (atom.operator(), atom.slot()) {
            (Some(Operator::EqualGlob), _) => 0,
            (_, Some(_)) => -1,
            _ => -2,
        };
    }
    let value = match atom.operator() {
        Some(Operator::Equal) => 6,
        Some(Operator::Approximate) => 5,
        Some(Operator::EqualGlob) => 4,
        Some(_) => 2,
        None => 1,
    };
    if atom.slot().is_some() {
        value.max(3)
    } else {
        value
    }
}

/// The most specific atom of `atoms` that `candidate` satisfies.
///
/// Ranking, best first: `=` (6), `~` (5), `=*` (4), slot (3),
/// relational (2), bare key (1), then extended atoms. Among relational
/// atoms the one whose version is closest to the candidate wins, whatever
/// order they come in. Atoms that still tie are equally specific, so the
/// first one seen is returned; ranking itself never depends on input order.
///
/// # Examples
///
/// ```
/// use portage_package::{best_match_to_list, Atom, CandidateCpv};
///
/// let pkg: CandidateCpv = "dev-libs/foo-1.2:0".parse().unwrap();
/// let atoms: Vec<Atom> = ["dev-libs/foo", ">=dev-libs/foo-1", "dev-libs/foo:0"]
///     .iter()
///     .map(|s| s.parse().unwrap())
///     .collect();
/// let best = best_match_to_list(&pkg, &atoms).unwrap();
/// assert_eq!(best.to_string(), "dev-libs/foo:0");
/// ```
pub fn best_match_to_list<'a, C, A>(candidate: &C, atoms: &'a [A]) -> Option<&'a Atom>
where
    C: Candidate + ?Sized,
    A: AsRef<Atom>,
{
    let mut best: Option<(&Atom, i32)> = None;

    for atom in match_to_list(candidate, atoms) {
        let value = specificity(atom);
        match best {
            None => best = Some((atom, value)),
            Some((_, max)) if value > max => best = Some((atom, value)),
            Some((current, max))
                if value == max
                    && value == 2
                    && atom.operator().is_some_and(|op| op.is_relational()) =>
            {
                if closer_relational(candidate.version(), current, atom) {
                    best = Some((atom, value));
                }
            }
            _ => {}
        }
    }

    best.map(|(atom, _)| atom)
}

/// Whether `challenger` is closer to `version` than `current`.
fn closer_relational(version: &str, current: &Atom, challenger: &Atom) -> bool {
    let (Some(current_version), Some(challenger_version)) =
        (current.version(), challenger.version())
    else {
        return false;
    };
    if current_version == version || current_version == challenger_version {
        return false;
    }
    if challenger_version == version {
        return true;
    }

    // Stable sort of (current, candidate, challenger) by version.
    let mut order = [(0, current_version), (1, version), (2, challenger_version)];
    order.sort_by(|a, b| vercmp(a.1, b.1).unwrap_or(Ordering::Equal));
    let candidate_at_edge = order[0].0 == 1 || order[2].0 == 1;
    candidate_at_edge && order[1].0 == 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct UsePkg {
        cpv: CandidateCpv,
        iuse: BTreeSet<String>,
        enabled: BTreeSet<String>,
    }

    impl UsePkg {
        fn new(cpv: &str, iuse: &[&str], enabled: &[&str]) -> Self {
            UsePkg {
                cpv: cpv.parse().unwrap(),
                iuse: iuse.iter().map(|s| s.to_string()).collect(),
                enabled: enabled.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    impl Candidate for UsePkg {
        fn category(&self) -> &str {
            self.cpv.category()
        }
        fn package(&self) -> &str {
            self.cpv.package()
        }
        fn version(&self) -> &str {
            Candidate::version(&self.cpv)
        }
        fn slot(&self) -> Option<&str> {
            self.cpv.slot()
        }
        fn sub_slot(&self) -> Option<&str> {
            self.cpv.sub_slot()
        }
        fn repo(&self) -> Option<&str> {
            self.cpv.repo()
        }
        fn use_enabled(&self) -> Option<&BTreeSet<String>> {
            Some(&self.enabled)
        }
        fn is_valid_flag(&self, flag: &str) -> bool {
            self.iuse.contains(flag)
        }
    }

    fn cpv(s: &str) -> CandidateCpv {
        s.parse().unwrap()
    }

    fn matches(atom: &str, candidate: &str) -> bool {
        let atom = Atom::parse_with(
            atom,
            &crate::AtomOptions {
                allow_wildcard: true,
                ..Default::default()
            },
        )
        .unwrap();
        atom_matches(&atom, &cpv(candidate))
    }

    #[test]
    fn candidate_parse() {
        assert!(CandidateCpv::parse("dev-libs/foo").is_err());
        assert!(CandidateCpv::parse("foo-1.0").is_err());
        assert!(CandidateCpv::parse("dev-libs/foo-1.0:").is_err());
        assert!(CandidateCpv::parse("dev-libs/foo-1.0::").is_err());
        let c = cpv("dev-libs/foo-bar-2.0_rc1");
        assert_eq!(c.package(), "foo-bar");
        assert_eq!(c.to_string(), "dev-libs/foo-bar-2.0_rc1");
    }

    #[test]
    fn key_only() {
        assert!(matches("dev-libs/foo", "dev-libs/foo-1.0"));
        assert!(!matches("dev-libs/foo", "dev-libs/foobar-1.0"));
        assert!(!matches("dev-libs/foo", "sys-libs/foo-1.0"));
    }

    #[test]
    fn exact() {
        assert!(matches("=dev-libs/foo-1.0", "dev-libs/foo-1.0"));
        assert!(matches("=dev-libs/foo-1.0", "dev-libs/foo-1.0-r0"));
        assert!(matches("=dev-libs/foo-1.0-r0", "dev-libs/foo-1.0"));
        assert!(!matches("=dev-libs/foo-1.0", "dev-libs/foo-1.0-r1"));
        assert!(!matches("=dev-libs/foo-1.0", "dev-libs/foo-1.1"));
    }

    #[test]
    fn approximate() {
        assert!(matches("~dev-libs/foo-1.0", "dev-libs/foo-1.0"));
        assert!(matches("~dev-libs/foo-1.0", "dev-libs/foo-1.0-r3"));
        assert!(!matches("~dev-libs/foo-1.0", "dev-libs/foo-1.0.1"));
    }

    #[test]
    fn glob() {
        assert!(matches("=dev-libs/foo-1*", "dev-libs/foo-1.0"));
        assert!(matches("=dev-libs/foo-1*", "dev-libs/foo-01.0"));
        assert!(matches("=dev-libs/foo-1*", "dev-libs/foo-1"));
        assert!(matches("=dev-libs/foo-1.2*", "dev-libs/foo-1.2.3-r1"));
        assert!(matches("=dev-libs/foo-1_beta*", "dev-libs/foo-1_beta2"));
        assert!(!matches("=dev-libs/foo-1*", "dev-libs/foo-10"));
        assert!(!matches("=dev-libs/foo-1.2*", "dev-libs/foo-1.20"));
    }

    #[test]
    fn relational() {
        assert!(matches(">dev-libs/foo-1.0", "dev-libs/foo-1.0-r1"));
        assert!(!matches(">dev-libs/foo-1.0", "dev-libs/foo-1.0"));
        assert!(matches(">=dev-libs/foo-1.0", "dev-libs/foo-1.0"));
        assert!(matches("<dev-libs/foo-1.0", "dev-libs/foo-1.0_rc1"));
        assert!(!matches("<dev-libs/foo-1.0", "dev-libs/foo-1.0_p1"));
        assert!(matches("<=dev-libs/foo-1.0", "dev-libs/foo-1.0"));
        assert!(!matches("<=dev-libs/foo-1.0", "dev-libs/foo-1.0-r1"));
    }

    #[test]
    fn slots() {
        assert!(matches("dev-libs/foo:1", "dev-libs/foo-1.0:1"));
        assert!(!matches("dev-libs/foo:1", "dev-libs/foo-1.0:2"));
        assert!(matches("dev-libs/foo:1", "dev-libs/foo-1.0"));
        assert!(matches("dev-libs/foo:1/2", "dev-libs/foo-1.0:1/2"));
        assert!(!matches("dev-libs/foo:1/2", "dev-libs/foo-1.0:1/3"));
        assert!(matches("dev-libs/foo:=", "dev-libs/foo-1.0:5"));
        assert!(matches("dev-libs/foo:*", "dev-libs/foo-1.0:5"));
    }

    #[test]
    fn sub_slot_defaults_to_slot() {
        let c = cpv("dev-libs/foo-1.0:1");
        assert_eq!(c.sub_slot(), Some("1"));
        assert_eq!(c.to_string(), "dev-libs/foo-1.0:1");
        assert_eq!(cpv("dev-libs/foo-1.0").sub_slot(), None);

        let atom = Atom::parse("dev-libs/foo:1/1").unwrap();
        assert_eq!(match_from_list(&atom, [&c]).len(), 1);
    }

    #[test]
    fn slot_sub_slot_matrix() {
        // slot-only atom against a candidate with a sub-slot
        assert!(matches("dev-libs/foo:1", "dev-libs/foo-1.0:1/2"));
        assert!(!matches("dev-libs/foo:2", "dev-libs/foo-1.0:1/2"));
        // sub-slot atom against a slot-only candidate
        assert!(matches("dev-libs/foo:1/1", "dev-libs/foo-1.0:1"));
        assert!(!matches("dev-libs/foo:1/2", "dev-libs/foo-1.0:1"));
        assert!(!matches("dev-libs/foo:2/2", "dev-libs/foo-1.0:1"));
        // mismatched sub-slot
        assert!(!matches("dev-libs/foo:1/2", "dev-libs/foo-1.0:1/3"));
        assert!(!matches("dev-libs/foo:1/3", "dev-libs/foo-1.0:2/3"));
        assert!(matches("dev-libs/foo:1/3", "dev-libs/foo-1.0:1/3"));
    }

    #[test]
    fn repos() {
        assert!(matches("dev-libs/foo::gentoo", "dev-libs/foo-1.0::gentoo"));
        assert!(!matches("dev-libs/foo::gentoo", "dev-libs/foo-1.0::local"));
        assert!(matches("dev-libs/foo::gentoo", "dev-libs/foo-1.0"));
    }

    #[test]
    fn blockers_ignore_prefix() {
        assert!(matches("!dev-libs/foo", "dev-libs/foo-1.0"));
        assert!(matches("!!<dev-libs/foo-2", "dev-libs/foo-1.0"));
    }

    #[test]
    fn extended_keys() {
        assert!(matches("*/*", "dev-libs/foo-1.0"));
        assert!(matches("dev-*/foo", "dev-libs/foo-1.0"));
        assert!(matches("dev-libs/*:2", "dev-libs/foo-1.0:2"));
        assert!(!matches("dev-libs/*:2", "dev-libs/foo-1.0:3"));
        assert!(!matches("sys-*/*", "dev-libs/foo-1.0"));
    }

    #[test]
    fn use_deps() {
        let pkg = UsePkg::new("dev-libs/foo-1.0", &["ssl", "gtk"], &["ssl"]);
        let check = |atom: &str| atom_matches(&Atom::parse(atom).unwrap(), &pkg);

        assert!(check("dev-libs/foo[ssl]"));
        assert!(check("dev-libs/foo[-gtk]"));
        assert!(!check("dev-libs/foo[gtk]"));
        assert!(!check("dev-libs/foo[-ssl]"));
        // not declared at all
        assert!(!check("dev-libs/foo[qt]"));
        assert!(check("dev-libs/foo[qt(+)]"));
        assert!(!check("dev-libs/foo[qt(-)]"));
        assert!(check("dev-libs/foo[-qt(-)]"));
        assert!(!check("dev-libs/foo[-qt(+)]"));
    }

    #[test]
    fn use_deps_evaluated_against_parent() {
        let pkg = UsePkg::new("dev-libs/foo-1.0", &["ssl"], &[]);
        let atom = Atom::parse("dev-libs/foo[ssl?,qt?]").unwrap();

        let parent_without: BTreeSet<String> = BTreeSet::new();
        assert!(!atom_matches(&atom.evaluate_conditionals(&parent_without), &pkg));

        let parent_with: BTreeSet<String> = ["ssl".to_string()].into();
        let evaluated = atom.evaluate_conditionals(&parent_with);
        assert!(!atom_matches(&evaluated, &pkg));

        let with_ssl = UsePkg::new("dev-libs/foo-1.0", &["ssl", "qt"], &["ssl"]);
        assert!(atom_matches(&evaluated, &with_ssl));
    }

    #[test]
    fn candidates_without_use_pass() {
        assert!(matches("dev-libs/foo[ssl]", "dev-libs/foo-1.0"));
    }

    #[test]
    fn match_list() {
        let atom = Atom::parse(">=dev-libs/foo-1.5").unwrap();
        let candidates = [
            cpv("dev-libs/foo-1.0"),
            cpv("dev-libs/foo-1.5"),
            cpv("dev-libs/foo-2.0"),
            cpv("dev-libs/bar-3.0"),
        ];
        let matched: Vec<String> = match_from_list(&atom, &candidates)
            .into_iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(matched, ["dev-libs/foo-1.5", "dev-libs/foo-2.0"]);
    }

    #[test]
    fn to_list_dedups() {
        let atoms: Vec<Atom> = ["dev-libs/foo", "dev-libs/foo", "<dev-libs/foo-1", "dev-libs/bar"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let matched = match_to_list(&cpv("dev-libs/foo-1.0"), &atoms);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].to_string(), "dev-libs/foo");
    }

    #[test]
    fn best_match_ranking() {
        let pkg = cpv("dev-libs/foo-1.2-r1:0");
        let atoms: Vec<Atom> = [
            "dev-libs/foo",
            ">=dev-libs/foo-1",
            "dev-libs/foo:0",
            "=dev-libs/foo-1*",
            "~dev-libs/foo-1.2",
            "=dev-libs/foo-1.2-r1",
        ]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();

        for n in (1..=atoms.len()).rev() {
            let best = best_match_to_list(&pkg, &atoms[..n]).unwrap();
            assert_eq!(best, &atoms[n - 1]);
        }
        assert!(best_match_to_list(&cpv("dev-libs/bar-1"), &atoms).is_none());
    }

    #[test]
    fn best_match_ignores_input_order() {
        let pkg = cpv("dev-libs/foo-1.2");
        let a: Atom = "=dev-libs/foo-1.2".parse().unwrap();
        let b: Atom = "dev-libs/foo".parse().unwrap();
        let forward = [a.clone(), b.clone()];
        let backward = [b, a.clone()];
        assert_eq!(best_match_to_list(&pkg, &forward), Some(&a));
        assert_eq!(best_match_to_list(&pkg, &backward), Some(&a));
    }

    #[test]
    fn best_match_closest_relational() {
        let pkg = cpv("dev-libs/foo-1.5");
        let atoms: Vec<Atom> = [">=dev-libs/foo-1.0", ">=dev-libs/foo-1.4"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(best_match_to_list(&pkg, &atoms).unwrap(), &atoms[1]);

        let reversed: Vec<Atom> = atoms.iter().rev().cloned().collect();
        assert_eq!(best_match_to_list(&pkg, &reversed).unwrap(), &atoms[1]);
    }

    #[test]
    fn best_match_extended() {
        let pkg = cpv("dev-libs/foo-1.0:2");
        let options = crate::AtomOptions {
            allow_wildcard: true,
            ..Default::default()
        };
        let atoms: Vec<Atom> = ["*/*", "dev-libs/*:2"]
            .iter()
            .map(|s| Atom::parse_with(s, &options).unwrap())
            .collect();
        assert_eq!(best_match_to_list(&pkg, &atoms).unwrap(), &atoms[1]);

        let mut with_plain = atoms.clone();
        with_plain.push("dev-libs/foo".parse().unwrap());
        assert_eq!(best_match_to_list(&pkg, &with_plain).unwrap(), &with_plain[2]);
    }

    #[test]
    fn version_helpers() {
        assert_eq!(strip_revision("1.0-r1"), "1.0");
        assert_eq!(strip_revision("1.0"), "1.0");
        assert_eq!(strip_revision("1.0-r"), "1.0-r");
        assert_eq!(strip_leading_zeros("001.0"), "1.0");
        assert_eq!(strip_leading_zeros("0.1"), "0.1");
        assert_eq!(strip_leading_zeros("000"), "0");
        assert_eq!(vercmp("1.0", "1.0-r0"), Some(Ordering::Equal));
        assert_eq!(vercmp("1.0", "bogus"), None);
    }
}

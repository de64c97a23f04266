use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::atom::{Atom, AtomInterner, AtomOptions};
use crate::eapi::EapiAttrs;
use crate::error::{Error, Result};
use crate::use_dep::is_valid_flag_name;

/// Leaf standing in for an `|| ( )` group that became empty after reduction,
/// under EAPIs where such a group is unsatisfiable.
pub const EMPTY_ANY_OF: &str = "__const__/empty-any-of";

/// A node of a reduced dependency expression.
///
/// See [PMS 8.2](https://projects.gentoo.org/pms/9/pms.html#dependency-specification-format).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepExpr<T> {
    /// A single dependency token.
    Leaf(T),
    /// `|| ( ... )`: at least one child must be satisfied.
    AnyOf(Vec<DepExpr<T>>),
    /// A bare `( ... )` group kept inside an `AnyOf`.
    AllOf(Vec<DepExpr<T>>),
    /// `flag? ( ... )` or `!flag? ( ... )` whose condition held.
    ///
    /// `children` is never empty.
    Conditional {
        flag: String,
        negated: bool,
        children: Vec<DepExpr<T>>,
    },
}

impl<T> DepExpr<T> {
    /// Leaves in depth-first order.
    pub fn leaves(&self) -> Vec<&T> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }
}

fn collect_leaves<'a, T>(expr: &'a DepExpr<T>, out: &mut Vec<&'a T>) {
    match expr {
        DepExpr::Leaf(leaf) => out.push(leaf),
        DepExpr::AnyOf(children)
        | DepExpr::AllOf(children)
        | DepExpr::Conditional { children, .. } => {
            for child in children {
                collect_leaves(child, out);
            }
        }
    }
}

/// Every leaf of a reduced expression, in order.
pub fn flatten<T>(exprs: &[DepExpr<T>]) -> Vec<&T> {
    let mut out = Vec::new();
    for expr in exprs {
        collect_leaves(expr, &mut out);
    }
    out
}

/// Replace each `Conditional` by its children.
///
/// Used once a reduction against a concrete USE state is final and only the
/// resulting dependencies matter.
pub fn strip_conditionals<T>(exprs: Vec<DepExpr<T>>) -> Vec<DepExpr<T>> {
    strip_into(exprs, false)
}

fn strip_into<T>(exprs: Vec<DepExpr<T>>, any_of: bool) -> Vec<DepExpr<T>> {
    let mut out = Vec::new();
    for expr in exprs {
        match expr {
            DepExpr::Conditional { children, .. } => {
                let children = strip_into(children, false);
                if any_of && children.len() > 1 {
                    out.push(DepExpr::AllOf(children));
                } else {
                    for child in children {
                        push_item(&mut out, child, any_of);
                    }
                }
            }
            DepExpr::AnyOf(children) => {
                push_item(&mut out, DepExpr::AnyOf(strip_into(children, true)), any_of)
            }
            DepExpr::AllOf(children) => {
                push_item(&mut out, DepExpr::AllOf(strip_into(children, false)), any_of)
            }
            leaf => out.push(leaf),
        }
    }
    out
}

/// Append `item`, merging it into `out` when the grouping is redundant.
fn push_item<T>(out: &mut Vec<DepExpr<T>>, item: DepExpr<T>, any_of: bool) {
    match item {
        DepExpr::AllOf(children) if !any_of => out.extend(children),
        DepExpr::AnyOf(children) if any_of => out.extend(children),
        item => out.push(item),
    }
}

impl<T: fmt::Display> fmt::Display for DepExpr<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DepExpr::Leaf(leaf) => write!(f, "{leaf}"),
            DepExpr::AnyOf(children) => {
                write!(f, "|| ( ")?;
                fmt_entries(f, children)?;
                write!(f, " )")
            }
            DepExpr::AllOf(children) => {
                write!(f, "( ")?;
                fmt_entries(f, children)?;
                write!(f, " )")
            }
            DepExpr::Conditional {
                flag,
                negated,
                children,
            } => {
                if *negated {
                    write!(f, "!")?;
                }
                write!(f, "{flag}? ( ")?;
                fmt_entries(f, children)?;
                write!(f, " )")
            }
        }
    }
}

fn fmt_entries<T: fmt::Display>(f: &mut fmt::Formatter, entries: &[DepExpr<T>]) -> fmt::Result {
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{entry}")?;
    }
    Ok(())
}

/// Serialize a reduced expression back to dependency string syntax.
///
/// # Examples
///
/// ```
/// use portage_package::{paren_enclose, paren_reduce};
///
/// let text = "a? ( dev-libs/foo ) || ( dev-libs/bar dev-libs/baz )";
/// let tree = paren_reduce(text, true).unwrap();
/// assert_eq!(paren_enclose(&tree), text);
/// ```
pub fn paren_enclose<T: fmt::Display>(exprs: &[DepExpr<T>]) -> String {
    exprs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Serialize atom leaves using the atoms they were evaluated from.
pub fn paren_enclose_unevaluated<A: AsRef<Atom>>(exprs: &[DepExpr<A>]) -> String {
    fn unevaluated<A: AsRef<Atom>>(expr: &DepExpr<A>) -> DepExpr<String> {
        let all = |children: &[DepExpr<A>]| -> Vec<DepExpr<String>> {
            children.iter().map(unevaluated).collect()
        };
        match expr {
            DepExpr::Leaf(atom) => DepExpr::Leaf(atom.as_ref().unevaluated().to_string()),
            DepExpr::AnyOf(children) => DepExpr::AnyOf(all(children)),
            DepExpr::AllOf(children) => DepExpr::AllOf(all(children)),
            DepExpr::Conditional {
                flag,
                negated,
                children,
            } => DepExpr::Conditional {
                flag: flag.clone(),
                negated: *negated,
                children: all(children),
            },
        }
    }
    let exprs: Vec<DepExpr<String>> = exprs.iter().map(unevaluated).collect();
    paren_enclose(&exprs)
}

/// Parse a dependency string into a tree without evaluating conditionals.
///
/// In `strict` mode every parenthesis and `||` must be a separate
/// whitespace-delimited token. Otherwise `(` and `)` outside `[...]` are
/// split off first, so `foo? (bar)` is accepted.
///
/// # Examples
///
/// ```
/// use portage_package::{paren_reduce, DepExpr};
///
/// let tree = paren_reduce("foobar foo? ( bar baz )", true).unwrap();
/// assert_eq!(tree[0], DepExpr::Leaf("foobar".to_string()));
/// assert!(matches!(tree[1], DepExpr::Conditional { .. }));
///
/// assert!(paren_reduce("foo? (bar)", true).is_err());
/// assert!(paren_reduce("foo? (bar)", false).is_ok());
/// ```
pub fn paren_reduce(text: &str, strict: bool) -> Result<Vec<DepExpr<String>>> {
    let spaced;
    let text = if strict {
        text
    } else {
        spaced = space_parens(text);
        spaced.as_str()
    };

    let config = UseReduce::new(UseState::MatchAll);
    let mut reduction = Reduction {
        config: &config,
        tokens: text.split_whitespace().collect(),
        pos: 0,
        src_uri: false,
        validate_flags: false,
        flat: false,
    };
    reduction.run(&mut |token: &str, pos| {
        if strict {
            missing_white_space_check(token, pos)?;
        }
        Ok(token.to_string())
    })
}

/// Put spaces around parentheses that are not part of a `[...]` use dep.
fn space_parens(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut in_brackets = false;
    for c in text.chars() {
        match c {
            '[' => in_brackets = true,
            ']' => in_brackets = false,
            '(' | ')' if !in_brackets => {
                out.push(' ');
                out.push(c);
                out.push(' ');
                continue;
            }
            _ => {}
        }
        out.push(c);
    }
    out
}

fn missing_white_space_check(token: &str, pos: usize) -> Result<()> {
    for x in [")", "(", "||"] {
        if token.starts_with(x) || token.ends_with(x) {
            return Err(Error::dep_string(format!(
                "missing whitespace around '{x}' at '{token}', token {pos}"
            )));
        }
    }
    Ok(())
}

/// How USE conditionals are decided during a reduction.
#[derive(Debug, Clone, Copy)]
pub enum UseState<'a> {
    /// `flag?` holds iff `flag` is in the set.
    Enabled(&'a BTreeSet<String>),
    /// Every conditional holds; the result over-approximates any real state.
    MatchAll,
    /// No conditional holds.
    MatchNone,
}

/// Reduce dependency strings against a USE state.
///
/// Every conditional flag and every atom is validated, including those in
/// branches that do not end up in the result.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use portage_package::{DepExpr, UseReduce, UseState};
///
/// let text = "a? ( dev-libs/foo dev-libs/bar )";
/// let none = BTreeSet::new();
/// assert!(UseReduce::new(UseState::Enabled(&none)).reduce(text).unwrap().is_empty());
///
/// let a: BTreeSet<String> = ["a".to_string()].into();
/// let tree = UseReduce::new(UseState::Enabled(&a)).reduce(text).unwrap();
/// match &tree[0] {
///     DepExpr::Conditional { flag, children, .. } => {
///         assert_eq!(flag, "a");
///         assert_eq!(children.len(), 2);
///     }
///     _ => panic!("expected a conditional"),
/// }
///
/// let flat = UseReduce::new(UseState::Enabled(&a)).reduce_flat(text).unwrap();
/// assert_eq!(flat, ["dev-libs/foo", "dev-libs/bar"]);
/// ```
#[derive(Clone, Copy)]
pub struct UseReduce<'a> {
    state: UseState<'a>,
    masked: Option<&'a BTreeSet<String>>,
    exclude_all: Option<&'a BTreeSet<String>>,
    eapi: Option<EapiAttrs>,
    is_valid_flag: Option<&'a dyn Fn(&str) -> bool>,
    interner: Option<&'a AtomInterner>,
}

impl<'a> UseReduce<'a> {
    pub fn new(state: UseState<'a>) -> Self {
        UseReduce {
            state,
            masked: None,
            exclude_all: None,
            eapi: None,
            is_valid_flag: None,
            interner: None,
        }
    }

    /// Flags that are always treated as disabled.
    pub fn masked(mut self, flags: &'a BTreeSet<String>) -> Self {
        self.masked = Some(flags);
        self
    }

    /// Flags for which `!flag?` never holds.
    pub fn exclude_all(mut self, flags: &'a BTreeSet<String>) -> Self {
        self.exclude_all = Some(flags);
        self
    }

    /// Syntax rules of the EAPI the string belongs to.
    pub fn eapi(mut self, eapi: EapiAttrs) -> Self {
        self.eapi = Some(eapi);
        self
    }

    /// Reject conditionals on flags the predicate does not accept, usually
    /// the package's IUSE. Without it only flag syntax is checked.
    pub fn is_valid_flag(mut self, is_valid_flag: &'a dyn Fn(&str) -> bool) -> Self {
        self.is_valid_flag = Some(is_valid_flag);
        self
    }

    /// Share atom instances through `interner`.
    pub fn interner(mut self, interner: &'a AtomInterner) -> Self {
        self.interner = Some(interner);
        self
    }

    fn attrs(&self) -> EapiAttrs {
        self.eapi.unwrap_or_else(EapiAttrs::permissive)
    }

    fn reduction<'s>(&'s self, text: &'s str, src_uri: bool, flat: bool) -> Reduction<'s, 'a> {
        Reduction {
            config: self,
            tokens: text.split_whitespace().collect(),
            pos: 0,
            src_uri,
            validate_flags: true,
            flat,
        }
    }

    /// Reduce keeping leaves as plain strings.
    pub fn reduce(&self, text: &str) -> Result<Vec<DepExpr<String>>> {
        self.reduction(text, false, false)
            .run(&mut |token: &str, _| Ok(token.to_string()))
    }

    /// Reduce an already parsed tree.
    pub fn reduce_tree(&self, tree: &[DepExpr<String>]) -> Result<Vec<DepExpr<String>>> {
        self.reduce(&paren_enclose(tree))
    }

    /// Leaves only, dropping `||` and conditional structure.
    pub fn reduce_flat(&self, text: &str) -> Result<Vec<String>> {
        let tree = self
            .reduction(text, false, true)
            .run(&mut |token: &str, _| Ok(token.to_string()))?;
        Ok(flatten(&tree).into_iter().cloned().collect())
    }

    /// Reduce a `SRC_URI`-like string: `->` renames are accepted and `||`
    /// is rejected.
    pub fn reduce_src_uri(&self, text: &str) -> Result<Vec<DepExpr<String>>> {
        let attrs = self.attrs();
        self.reduction(text, true, false)
            .run(&mut |token: &str, pos| {
                if !attrs.selective_src_uri_restriction
                    && (token.starts_with("fetch+") || token.starts_with("mirror+"))
                {
                    return Err(Error::dep_string(format!(
                        "Selective fetch/mirror restriction not allowed in this EAPI: token {pos}"
                    )));
                }
                Ok(token.to_string())
            })
    }

    /// Reduce parsing every leaf as an atom.
    ///
    /// Unless the state is [`UseState::MatchAll`], conditional use deps of
    /// each atom are evaluated against the state.
    pub fn reduce_atoms(&self, text: &str) -> Result<Vec<DepExpr<Arc<Atom>>>> {
        self.reduction(text, false, false)
            .run(&mut |token: &str, pos| self.atom(token, pos))
    }

    /// Atom leaves only, dropping `||` and conditional structure.
    pub fn reduce_atoms_flat(&self, text: &str) -> Result<Vec<Arc<Atom>>> {
        let tree = self
            .reduction(text, false, true)
            .run(&mut |token: &str, pos| self.atom(token, pos))?;
        Ok(flatten(&tree).into_iter().cloned().collect())
    }

    fn atom(&self, token: &str, pos: usize) -> Result<Arc<Atom>> {
        let attrs = self.attrs();
        let options = AtomOptions {
            allow_wildcard: false,
            allow_repo: attrs.repo_deps,
            allow_blocker: true,
            eapi: self.eapi,
            is_valid_flag: self.is_valid_flag,
        };
        let parsed = match self.interner {
            Some(interner) => interner.get(token, &options),
            None => Atom::parse_with(token, &options).map(Arc::new),
        };
        let atom = parsed.map_err(|e| {
            if let Err(whitespace) = missing_white_space_check(token, pos) {
                return whitespace;
            }
            let err = Error::dep_string(format!("Invalid atom ({e}), token {pos}"));
            match e.category() {
                Some(category) => err.with_category(category),
                None => err,
            }
        })?;

        let empty = BTreeSet::new();
        let use_flags = match self.state {
            UseState::MatchAll => return Ok(atom),
            UseState::Enabled(use_flags) => use_flags,
            UseState::MatchNone => &empty,
        };
        let has_conditionals = atom
            .use_dep()
            .is_some_and(|use_dep| !use_dep.conditional.is_empty());
        if has_conditionals {
            Ok(Arc::new(atom.evaluate_conditionals(use_flags)))
        } else {
            Ok(atom)
        }
    }

    /// Whether the conditional token `flag?`/`!flag?` holds.
    fn is_active(&self, conditional: &str, validate: bool) -> Result<bool> {
        let body = conditional.strip_suffix('?').unwrap_or(conditional);
        let (flag, negated) = match body.strip_prefix('!') {
            Some(flag) => (flag, true),
            None => (body, false),
        };

        if validate {
            match self.is_valid_flag {
                Some(is_valid_flag) if !is_valid_flag(flag) => {
                    return Err(Error::dep_string(format!(
                        "USE flag '{flag}' referenced in conditional '{conditional}' is not in IUSE"
                    ))
                    .with_category("IUSE.missing"));
                }
                None if !is_valid_flag_name(flag) => {
                    return Err(Error::dep_string(format!(
                        "invalid use flag '{flag}' in conditional '{conditional}'"
                    )));
                }
                _ => {}
            }
        }

        if negated && self.exclude_all.is_some_and(|flags| flags.contains(flag)) {
            return Ok(false);
        }
        if self.masked.is_some_and(|flags| flags.contains(flag)) {
            return Ok(negated);
        }
        Ok(match self.state {
            UseState::MatchAll => true,
            UseState::MatchNone => false,
            UseState::Enabled(use_flags) => use_flags.contains(flag) != negated,
        })
    }
}

impl fmt::Debug for UseReduce<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("UseReduce")
            .field("state", &self.state)
            .field("masked", &self.masked)
            .field("exclude_all", &self.exclude_all)
            .field("eapi", &self.eapi)
            .field("is_valid_flag", &self.is_valid_flag.is_some())
            .finish()
    }
}

/// Reduce `text` against the enabled flags `use_flags`.
///
/// Shorthand for `UseReduce::new(UseState::Enabled(use_flags)).reduce(text)`.
pub fn use_reduce(text: &str, use_flags: &BTreeSet<String>) -> Result<Vec<DepExpr<String>>> {
    UseReduce::new(UseState::Enabled(use_flags)).reduce(text)
}

/// One pass over the whitespace separated tokens of a dependency string.
struct Reduction<'r, 'a> {
    config: &'r UseReduce<'a>,
    tokens: Vec<&'r str>,
    pos: usize,
    src_uri: bool,
    validate_flags: bool,
    flat: bool,
}

impl<'r> Reduction<'r, '_> {
    fn run<T, F>(&mut self, leaf: &mut F) -> Result<Vec<DepExpr<T>>>
    where
        F: FnMut(&str, usize) -> Result<T>,
    {
        self.sequence(0, false, leaf)
    }

    /// Parse until the `)` closing `depth`, or the end at depth 0.
    fn sequence<T, F>(
        &mut self,
        depth: usize,
        any_of: bool,
        leaf: &mut F,
    ) -> Result<Vec<DepExpr<T>>>
    where
        F: FnMut(&str, usize) -> Result<T>,
    {
        let mut out = Vec::new();

        while let Some(&token) = self.tokens.get(self.pos) {
            self.pos += 1;
            let pos = self.pos;

            match token {
                ")" if depth == 0 => {
                    return Err(Error::dep_string(format!(
                        "no matching '(' for ')', token {pos}"
                    )));
                }
                ")" => return Ok(out),
                "(" => {
                    let children = self.group(pos, depth, leaf)?;
                    if !any_of {
                        out.extend(children);
                    } else if children.len() > 1 {
                        out.push(DepExpr::AllOf(children));
                    } else if let Some(child) = children.into_iter().next() {
                        push_item(&mut out, child, true);
                    }
                }
                "||" => {
                    if self.src_uri {
                        return Err(Error::dep_string(format!(
                            "any-of dependencies are not allowed in SRC_URI: token {pos}"
                        )));
                    }
                    let open = self.expect_open(depth)?;
                    let children = self.sequence_in_group(open, depth, true, leaf)?;
                    if let Some(item) = self.any_of(children, pos, leaf)? {
                        push_item(&mut out, item, any_of);
                    }
                }
                "->" => {
                    let file = self.arrow(pos, depth)?;
                    out.push(DepExpr::Leaf(leaf("->", pos)?));
                    out.push(DepExpr::Leaf(leaf(file, pos + 1)?));
                }
                conditional if conditional.ends_with('?') => {
                    let open = self.expect_open(depth)?;
                    let children = self.sequence_in_group(open, depth, false, leaf)?;
                    let active = self
                        .config
                        .is_active(conditional, self.validate_flags)?;
                    if active && !children.is_empty() {
                        let body = &conditional[..conditional.len() - 1];
                        let (flag, negated) = match body.strip_prefix('!') {
                            Some(flag) => (flag, true),
                            None => (body, false),
                        };
                        out.push(DepExpr::Conditional {
                            flag: flag.to_string(),
                            negated,
                            children,
                        });
                    }
                }
                token => out.push(DepExpr::Leaf(leaf(token, pos)?)),
            }
        }

        if depth > 0 {
            return Err(Error::dep_string("Missing ')' at end of string"));
        }
        Ok(out)
    }

    /// A bare `( ... )` whose `(` was token `pos`.
    fn group<T, F>(&mut self, pos: usize, depth: usize, leaf: &mut F) -> Result<Vec<DepExpr<T>>>
    where
        F: FnMut(&str, usize) -> Result<T>,
    {
        self.sequence_in_group(pos, depth, false, leaf)
    }

    fn sequence_in_group<T, F>(
        &mut self,
        open: usize,
        depth: usize,
        any_of: bool,
        leaf: &mut F,
    ) -> Result<Vec<DepExpr<T>>>
    where
        F: FnMut(&str, usize) -> Result<T>,
    {
        if self.tokens.get(self.pos) == Some(&")") {
            return Err(Error::dep_string(format!(
                "expected: dependency string, got: ')', token {open}"
            )));
        }
        self.sequence(depth + 1, any_of, leaf)
    }

    /// Consume the `(` that must follow `||` or `flag?`, returning its position.
    fn expect_open(&mut self, depth: usize) -> Result<usize> {
        match self.tokens.get(self.pos) {
            Some(&"(") => {
                self.pos += 1;
                Ok(self.pos)
            }
            Some(token) => Err(Error::dep_string(format!(
                "expected: '(', got: '{token}', token {}",
                self.pos + 1
            ))),
            None if depth > 0 => Err(Error::dep_string("Missing ')' at end of string")),
            None => Err(Error::dep_string("Missing '(' at end of string")),
        }
    }

    /// Validate `-> file` and return the file name.
    fn arrow(&mut self, pos: usize, depth: usize) -> Result<&'r str> {
        if !self.src_uri {
            return Err(Error::dep_string(format!(
                "SRC_URI arrow are only allowed in SRC_URI: token {pos}"
            )));
        }
        if !self.config.attrs().src_uri_arrows {
            return Err(Error::dep_string(format!(
                "SRC_URI arrow not allowed in this EAPI: token {pos}"
            )));
        }
        match self.tokens.get(self.pos) {
            Some(&file) if !matches!(file, "(" | ")" | "->" | "||") && !file.contains('/') => {
                self.pos += 1;
                Ok(file)
            }
            Some(token) => Err(Error::dep_string(format!(
                "expected: file name, got: '{token}', token {}",
                self.pos + 1
            ))),
            None if depth > 0 => Err(Error::dep_string("Missing ')' at end of string")),
            None => Err(Error::dep_string("Missing file name at end of string")),
        }
    }

    fn any_of<T, F>(
        &self,
        mut children: Vec<DepExpr<T>>,
        pos: usize,
        leaf: &mut F,
    ) -> Result<Option<DepExpr<T>>>
    where
        F: FnMut(&str, usize) -> Result<T>,
    {
        Ok(match children.len() {
            0 if self.flat || self.config.attrs().empty_groups_always_true => None,
            0 => Some(DepExpr::Leaf(leaf(EMPTY_ANY_OF, pos)?)),
            1 => children.pop(),
            _ => Some(DepExpr::AnyOf(children)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(flags: &[&str]) -> BTreeSet<String> {
        flags.iter().map(|s| s.to_string()).collect()
    }

    fn reduce(text: &str, flags: &[&str]) -> String {
        let use_flags = set(flags);
        paren_enclose(&use_reduce(text, &use_flags).unwrap())
    }

    fn matchall(text: &str) -> String {
        paren_enclose(&UseReduce::new(UseState::MatchAll).reduce(text).unwrap())
    }

    fn error(text: &str) -> String {
        UseReduce::new(UseState::MatchAll)
            .reduce(text)
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn inactive_conditionals_dropped() {
        assert_eq!(reduce("a? ( b ) c", &[]), "c");
        assert_eq!(reduce("a? ( b ) c", &["a"]), "a? ( b ) c");
        assert_eq!(reduce("!a? ( b ) c", &[]), "!a? ( b ) c");
        assert_eq!(reduce("!a? ( b ) c", &["a"]), "c");
    }

    #[test]
    fn nested_conditionals() {
        assert_eq!(reduce("a? ( b? ( c ) d )", &["a"]), "a? ( d )");
        assert_eq!(reduce("a? ( b? ( c ) )", &["a"]), "");
        assert_eq!(reduce("a? ( b? ( c ) )", &["a", "b"]), "a? ( b? ( c ) )");
    }

    #[test]
    fn redundant_groups() {
        assert_eq!(matchall("( a b ) ( ( c ) )"), "a b c");
        assert_eq!(matchall("|| ( a )"), "a");
        assert_eq!(matchall("|| ( ( a b ) )"), "a b");
        assert_eq!(matchall("|| ( a || ( b c ) )"), "|| ( a b c )");
        assert_eq!(matchall("|| ( ( a b ) c )"), "|| ( ( a b ) c )");
        assert_eq!(matchall("|| ( ( || ( a b ) ) c )"), "|| ( a b c )");
        assert_eq!(matchall("|| ( x? ( a b ) c )"), "|| ( x? ( a b ) c )");
    }

    #[test]
    fn empty_any_of() {
        let text = "|| ( x? ( a ) )";
        let none = set(&[]);
        let eapi6 = crate::Eapi::Six.attrs();
        let eapi7 = crate::Eapi::Seven.attrs();

        let old = UseReduce::new(UseState::Enabled(&none)).eapi(eapi6);
        assert!(old.reduce(text).unwrap().is_empty());

        let new = UseReduce::new(UseState::Enabled(&none)).eapi(eapi7);
        assert_eq!(paren_enclose(&new.reduce(text).unwrap()), EMPTY_ANY_OF);
        assert!(new.reduce_flat(text).unwrap().is_empty());
    }

    #[test]
    fn masked_and_excluded() {
        let use_flags = set(&["a", "b"]);
        let masked = set(&["a"]);
        let excluded = set(&["c"]);
        let reducer = UseReduce::new(UseState::Enabled(&use_flags))
            .masked(&masked)
            .exclude_all(&excluded);
        let tree = reducer.reduce("a? ( x ) !a? ( y ) b? ( z ) !c? ( w )").unwrap();
        assert_eq!(paren_enclose(&tree), "!a? ( y ) b? ( z )");

        let none = UseReduce::new(UseState::MatchNone).reduce("a? ( x ) !a? ( y ) z").unwrap();
        assert_eq!(paren_enclose(&none), "z");
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(error("a )"), "no matching '(' for ')', token 2");
        assert_eq!(error("( a"), "Missing ')' at end of string");
        assert_eq!(error("a?"), "Missing '(' at end of string");
        assert_eq!(error("|| a"), "expected: '(', got: 'a', token 2");
        assert_eq!(error("a? ( )"), "expected: dependency string, got: ')', token 2");
        assert_eq!(error("|| ( a? )"), "expected: '(', got: ')', token 4");
        assert_eq!(error("|| ( a? ("), "Missing ')' at end of string");
        assert_eq!(
            error("a -> b"),
            "SRC_URI arrow are only allowed in SRC_URI: token 2"
        );
    }

    #[test]
    fn invalid_flags() {
        assert_eq!(
            error("_a? ( b )"),
            "invalid use flag '_a' in conditional '_a?'"
        );

        let declared = |flag: &str| flag == "a";
        let reducer = UseReduce::new(UseState::MatchAll).is_valid_flag(&declared);
        let err = reducer.reduce("a? ( x ) b? ( y )").unwrap_err();
        assert_eq!(err.category(), Some("IUSE.missing"));
        assert_eq!(
            err.to_string(),
            "USE flag 'b' referenced in conditional 'b?' is not in IUSE"
        );
    }

    #[test]
    fn inactive_branches_still_validated() {
        let declared = |flag: &str| flag == "a";
        let none = set(&[]);
        let reducer = UseReduce::new(UseState::Enabled(&none)).is_valid_flag(&declared);
        assert!(reducer.reduce("a? ( b? ( x ) )").is_err());
        assert!(reducer.reduce_atoms("a? ( dev-libs/foo-1 )").is_err());
    }

    #[test]
    fn atoms() {
        let tree = UseReduce::new(UseState::MatchAll)
            .reduce_atoms(">=dev-libs/foo-1 || ( dev-libs/bar dev-libs/baz )")
            .unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0], DepExpr::Leaf(Arc::new(Atom::parse(">=dev-libs/foo-1").unwrap())));
        match &tree[1] {
            DepExpr::AnyOf(children) => assert_eq!(children.len(), 2),
            _ => panic!("expected AnyOf"),
        }
    }

    #[test]
    fn atom_errors() {
        let reducer = UseReduce::new(UseState::MatchAll);
        let err = reducer.reduce_atoms("dev-libs/foo-1").unwrap_err();
        assert!(err.to_string().starts_with("Invalid atom ("));
        assert!(err.to_string().ends_with(", token 1"));

        let err = reducer.reduce_atoms("a? (dev-libs/foo )").unwrap_err();
        assert_eq!(err.to_string(), "expected: '(', got: '(dev-libs/foo', token 2");

        let err = reducer.reduce_atoms("dev-libs/foo)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing whitespace around ')' at 'dev-libs/foo)', token 1"
        );

        let eapi1 = crate::Eapi::One.attrs();
        let err = reducer.eapi(eapi1).reduce_atoms("dev-libs/foo[ssl]").unwrap_err();
        assert_eq!(err.category(), Some("EAPI.incompatible"));
    }

    #[test]
    fn atoms_evaluated_against_state() {
        let use_flags = set(&["ssl"]);
        let atoms = UseReduce::new(UseState::Enabled(&use_flags))
            .reduce_atoms_flat("dev-libs/foo[ssl?,gtk?]")
            .unwrap();
        assert_eq!(atoms[0].to_string(), "dev-libs/foo[ssl]");
        assert_eq!(atoms[0].unevaluated().to_string(), "dev-libs/foo[ssl?,gtk?]");

        let tree = UseReduce::new(UseState::Enabled(&use_flags))
            .reduce_atoms("dev-libs/foo[ssl?,gtk?]")
            .unwrap();
        assert_eq!(paren_enclose_unevaluated(&tree), "dev-libs/foo[ssl?,gtk?]");

        let all = UseReduce::new(UseState::MatchAll)
            .reduce_atoms_flat("dev-libs/foo[ssl?]")
            .unwrap();
        assert_eq!(all[0].to_string(), "dev-libs/foo[ssl?]");
    }

    #[test]
    fn flat_mode() {
        let a = set(&["a"]);
        let flat = UseReduce::new(UseState::Enabled(&a))
            .reduce_flat("x || ( y a? ( z ) ) !a? ( w )")
            .unwrap();
        assert_eq!(flat, ["x", "y", "z"]);
    }

    #[test]
    fn src_uri() {
        let reducer = UseReduce::new(UseState::MatchAll).eapi(crate::Eapi::Eight.attrs());
        let tree = reducer
            .reduce_src_uri("https://example.com/a.tar.gz -> b.tar.gz ssl? ( fetch+https://x/y )")
            .unwrap();
        assert_eq!(
            paren_enclose(&tree),
            "https://example.com/a.tar.gz -> b.tar.gz ssl? ( fetch+https://x/y )"
        );

        assert!(reducer.reduce_src_uri("|| ( a b )").is_err());
        assert_eq!(
            reducer.reduce_src_uri("a -> b/c").unwrap_err().to_string(),
            "expected: file name, got: 'b/c', token 3"
        );
        assert_eq!(
            reducer.reduce_src_uri("a ->").unwrap_err().to_string(),
            "Missing file name at end of string"
        );

        let eapi1 = UseReduce::new(UseState::MatchAll).eapi(crate::Eapi::One.attrs());
        assert!(eapi1.reduce_src_uri("a -> b").is_err());
        let eapi7 = UseReduce::new(UseState::MatchAll).eapi(crate::Eapi::Seven.attrs());
        assert!(eapi7.reduce_src_uri("mirror+https://x/y").is_err());
    }

    #[test]
    fn paren_reduce_modes() {
        assert_eq!(
            paren_reduce("a? (b) || (c d)", false).unwrap(),
            paren_reduce("a? ( b ) || ( c d )", true).unwrap()
        );
        assert_eq!(
            paren_reduce("a? (b)", true).unwrap_err().to_string(),
            "expected: '(', got: '(b)', token 2"
        );
        assert_eq!(
            paren_reduce("a b)", true).unwrap_err().to_string(),
            "missing whitespace around ')' at 'b)', token 2"
        );
        let tree = paren_reduce("dev-libs/foo[a(+)] x? (y)", false).unwrap();
        assert_eq!(paren_enclose(&tree), "dev-libs/foo[a(+)] x? ( y )");
        assert!(paren_reduce(") a", true).is_err());
    }

    #[test]
    fn matchall_is_idempotent() {
        for text in [
            "a? ( b ) c",
            "|| ( a ( b c ) d? ( e ) ) f",
            "( ( a ) ) || ( b || ( c d ) )",
            "!x? ( || ( a b ) ) y? ( z? ( q ) )",
        ] {
            let once = matchall(text);
            assert_eq!(matchall(&once), once);
            let tree = paren_reduce(text, true).unwrap();
            let again = UseReduce::new(UseState::MatchAll).reduce_tree(&tree).unwrap();
            assert_eq!(paren_enclose(&again), once);
        }
    }

    #[test]
    fn real_state_subset_of_matchall() {
        let text = "a? ( dev-libs/a ) !a? ( dev-libs/b ) || ( dev-libs/c b? ( dev-libs/d ) )";
        let all: BTreeSet<String> = UseReduce::new(UseState::MatchAll)
            .reduce_flat(text)
            .unwrap()
            .into_iter()
            .collect();
        for flags in [&[][..], &["a"], &["b"], &["a", "b"]] {
            let use_flags = set(flags);
            for leaf in UseReduce::new(UseState::Enabled(&use_flags))
                .reduce_flat(text)
                .unwrap()
            {
                assert!(all.contains(&leaf));
            }
        }
    }

    #[test]
    fn strip() {
        let a = set(&["a"]);
        let tree = use_reduce("a? ( x y ) || ( a? ( p q ) r )", &a).unwrap();
        assert_eq!(paren_enclose(&strip_conditionals(tree)), "x y || ( ( p q ) r )");
    }
}

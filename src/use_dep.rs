use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use winnow::combinator::{alt, opt, separated};
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use crate::error::{Error, Result};

/// The form of a single USE dependency token.
///
/// See [PMS 8.3.4](https://projects.gentoo.org/pms/9/pms.html#use-dependencies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseDepKind {
    /// `flag`: must be enabled.
    Enabled,
    /// `-flag`: must be disabled.
    Disabled,
    /// `flag?`: enabled if enabled on the parent.
    IfEnabled,
    /// `!flag?`: disabled if disabled on the parent.
    IfDisabled,
    /// `flag=`: same state as on the parent.
    Equal,
    /// `!flag=`: opposite state to the parent.
    NotEqual,
}

impl UseDepKind {
    /// Whether the token depends on the parent's USE state.
    pub fn is_conditional(&self) -> bool {
        !matches!(self, UseDepKind::Enabled | UseDepKind::Disabled)
    }
}

/// Assumed state of a flag missing from the target's IUSE: `(+)` or `(-)`.
///
/// Introduced in EAPI 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseDefault {
    /// `(+)`: treat as enabled.
    Enabled,
    /// `(-)`: treat as disabled.
    Disabled,
}

/// A single `[...]` token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UseToken {
    pub flag: String,
    pub kind: UseDepKind,
    pub default: Option<UseDefault>,
}

impl UseToken {
    fn new(flag: &str, kind: UseDepKind, default: Option<UseDefault>) -> Self {
        UseToken {
            flag: flag.to_string(),
            kind,
            default,
        }
    }
}

impl fmt::Display for UseToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            UseDepKind::Disabled => write!(f, "-")?,
            UseDepKind::IfDisabled | UseDepKind::NotEqual => write!(f, "!")?,
            _ => {}
        }
        write!(f, "{}", self.flag)?;
        match self.default {
            Some(UseDefault::Enabled) => write!(f, "(+)")?,
            Some(UseDefault::Disabled) => write!(f, "(-)")?,
            None => {}
        }
        match self.kind {
            UseDepKind::IfEnabled | UseDepKind::IfDisabled => write!(f, "?"),
            UseDepKind::Equal | UseDepKind::NotEqual => write!(f, "="),
            _ => Ok(()),
        }
    }
}

/// Conditional token groups of a [`UseDependency`], keyed by flag name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UseConditionals {
    /// `flag?`
    pub if_enabled: BTreeSet<String>,
    /// `!flag?`
    pub if_disabled: BTreeSet<String>,
    /// `flag=`
    pub equal: BTreeSet<String>,
    /// `!flag=`
    pub not_equal: BTreeSet<String>,
}

impl UseConditionals {
    /// Whether no conditional token is present.
    pub fn is_empty(&self) -> bool {
        self.if_enabled.is_empty()
            && self.if_disabled.is_empty()
            && self.equal.is_empty()
            && self.not_equal.is_empty()
    }

    /// All flags referenced by a conditional token.
    pub fn flags(&self) -> BTreeSet<&str> {
        self.if_enabled
            .iter()
            .chain(&self.if_disabled)
            .chain(&self.equal)
            .chain(&self.not_equal)
            .map(String::as_str)
            .collect()
    }
}

/// The `[flag,...]` USE dependency attached to an atom.
///
/// Every token lands in exactly one group. `required` holds the flags that
/// carry no `(+)`/`(-)` default: a candidate must declare those itself.
///
/// See [PMS 8.3.4](https://projects.gentoo.org/pms/9/pms.html#use-dependencies).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UseDependency {
    tokens: Vec<UseToken>,
    pub enabled: BTreeSet<String>,
    pub disabled: BTreeSet<String>,
    pub conditional: UseConditionals,
    pub missing_enabled: BTreeSet<String>,
    pub missing_disabled: BTreeSet<String>,
    pub required: BTreeSet<String>,
}

impl UseDependency {
    /// Parse the contents of a `[...]` block (without the brackets).
    ///
    /// # Examples
    ///
    /// ```
    /// use portage_package::UseDependency;
    ///
    /// let dep = UseDependency::parse("ssl,-debug,gtk?,qt(+)=").unwrap();
    /// assert!(dep.enabled.contains("ssl"));
    /// assert!(dep.disabled.contains("debug"));
    /// assert!(dep.conditional.if_enabled.contains("gtk"));
    /// assert!(dep.missing_enabled.contains("qt"));
    /// assert!(!dep.required.contains("qt"));
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let tokens: Vec<UseToken> = separated(1.., parse_use_token(), ',')
            .parse(input)
            .map_err(|e| Error::atom(input, format!("invalid use dep: {e}")))?;
        Self::from_tokens(tokens)
    }

    /// Build from already split tokens, validating `(+)`/`(-)` consistency.
    pub fn from_tokens(tokens: Vec<UseToken>) -> Result<Self> {
        let mut dep = UseDependency {
            tokens: Vec::with_capacity(tokens.len()),
            enabled: BTreeSet::new(),
            disabled: BTreeSet::new(),
            conditional: UseConditionals::default(),
            missing_enabled: BTreeSet::new(),
            missing_disabled: BTreeSet::new(),
            required: BTreeSet::new(),
        };

        for token in tokens {
            let flag = token.flag.clone();
            match token.default {
                Some(UseDefault::Enabled) => {
                    if dep.missing_disabled.contains(&flag) || dep.required.contains(&flag) {
                        return Err(Error::atom(&token.to_string(), "conflicting use dep default"));
                    }
                    dep.missing_enabled.insert(flag.clone());
                }
                Some(UseDefault::Disabled) => {
                    if dep.missing_enabled.contains(&flag) || dep.required.contains(&flag) {
                        return Err(Error::atom(&token.to_string(), "conflicting use dep default"));
                    }
                    dep.missing_disabled.insert(flag.clone());
                }
                None => {
                    if dep.missing_enabled.contains(&flag) || dep.missing_disabled.contains(&flag) {
                        return Err(Error::atom(&token.to_string(), "conflicting use dep default"));
                    }
                    dep.required.insert(flag.clone());
                }
            }
            dep.group_mut(token.kind).insert(flag);
            dep.tokens.push(token);
        }

        Ok(dep)
    }

    fn group_mut(&mut self, kind: UseDepKind) -> &mut BTreeSet<String> {
        match kind {
            UseDepKind::Enabled => &mut self.enabled,
            UseDepKind::Disabled => &mut self.disabled,
            UseDepKind::IfEnabled => &mut self.conditional.if_enabled,
            UseDepKind::IfDisabled => &mut self.conditional.if_disabled,
            UseDepKind::Equal => &mut self.conditional.equal,
            UseDepKind::NotEqual => &mut self.conditional.not_equal,
        }
    }

    /// Tokens in source order.
    pub fn tokens(&self) -> &[UseToken] {
        &self.tokens
    }

    /// Rebuild from derived tokens, keeping the defaults and required set of
    /// the original.
    fn derived(&self, tokens: Vec<UseToken>) -> UseDependency {
        let mut dep = UseDependency {
            tokens: Vec::with_capacity(tokens.len()),
            enabled: BTreeSet::new(),
            disabled: BTreeSet::new(),
            conditional: UseConditionals::default(),
            missing_enabled: self.missing_enabled.clone(),
            missing_disabled: self.missing_disabled.clone(),
            required: self.required.clone(),
        };
        for token in tokens {
            dep.group_mut(token.kind).insert(token.flag.clone());
            dep.tokens.push(token);
        }
        dep
    }

    /// Resolve the conditional tokens against the parent's enabled flags.
    ///
    /// | parent | token  | result |
    /// |--------|--------|--------|
    /// | x      | `x?`   | `x`    |
    /// | -x     | `x?`   |        |
    /// | x      | `!x?`  |        |
    /// | -x     | `!x?`  | `-x`   |
    /// | x      | `x=`   | `x`    |
    /// | -x     | `x=`   | `-x`   |
    /// | x      | `!x=`  | `-x`   |
    /// | -x     | `!x=`  | `x`    |
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeSet;
    /// use portage_package::UseDependency;
    ///
    /// let dep = UseDependency::parse("a?,!b?,c=,!d=").unwrap();
    /// let use_flags: BTreeSet<String> = ["a".to_string(), "d".to_string()].into();
    /// let evaluated = dep.evaluate_conditionals(&use_flags);
    /// assert_eq!(evaluated.to_string(), "[a,-b,-c,-d]");
    /// ```
    pub fn evaluate_conditionals(&self, use_flags: &BTreeSet<String>) -> UseDependency {
        let mut tokens = Vec::with_capacity(self.tokens.len());
        let mut emitted = HashSet::new();
        for token in &self.tokens {
            let set = use_flags.contains(&token.flag);
            let resolved = match token.kind {
                UseDepKind::IfEnabled => set.then_some(UseDepKind::Enabled),
                UseDepKind::IfDisabled => (!set).then_some(UseDepKind::Disabled),
                UseDepKind::Equal if set => Some(UseDepKind::Enabled),
                UseDepKind::Equal => Some(UseDepKind::Disabled),
                UseDepKind::NotEqual if set => Some(UseDepKind::Disabled),
                UseDepKind::NotEqual => Some(UseDepKind::Enabled),
                kind => Some(kind),
            };
            if let Some(kind) = resolved {
                if emitted.insert((token.flag.as_str(), kind)) {
                    tokens.push(UseToken::new(&token.flag, kind, token.default));
                }
            }
        }
        self.derived(tokens)
    }

    /// Keep only the constraints that `other_use` (the candidate's enabled
    /// flags) does not already satisfy.
    ///
    /// `parent_use` is required when conditional tokens are present. Flags that
    /// `is_valid_flag` rejects and that have no default are always kept, since
    /// no USE change on the candidate can satisfy them.
    pub fn violated_conditionals<F>(
        &self,
        other_use: &BTreeSet<String>,
        is_valid_flag: F,
        parent_use: Option<&BTreeSet<String>>,
    ) -> Result<UseDependency>
    where
        F: Fn(&str) -> bool,
    {
        let empty = BTreeSet::new();
        let parent_use = match parent_use {
            Some(parent_use) => parent_use,
            None if !self.conditional.is_empty() => {
                return Err(Error::atom(
                    &self.to_string(),
                    "violated_conditionals needs the parent USE for conditional flags",
                ))
            }
            None => &empty,
        };

        let has_default =
            |flag: &str| self.missing_enabled.contains(flag) || self.missing_disabled.contains(flag);
        let mut tokens = Vec::new();

        for token in &self.tokens {
            let flag = token.flag.as_str();
            let valid = is_valid_flag(flag);

            if !valid && !has_default(flag) {
                tokens.push(token.clone());
                continue;
            }

            let in_other = other_use.contains(flag);
            let in_parent = parent_use.contains(flag);
            let missing_enabled = self.missing_enabled.contains(flag);
            let missing_disabled = self.missing_disabled.contains(flag);

            let keep = match token.kind {
                UseDepKind::Enabled => !in_other && (valid || missing_disabled),
                UseDepKind::Disabled => {
                    if in_other {
                        true
                    } else {
                        !valid && missing_enabled
                    }
                }
                UseDepKind::IfEnabled => {
                    in_parent && !in_other && (valid || missing_disabled)
                }
                UseDepKind::Equal => {
                    if in_parent && !in_other {
                        valid || missing_disabled
                    } else if !in_parent {
                        in_other || (!valid && missing_enabled)
                    } else {
                        false
                    }
                }
                UseDepKind::NotEqual => {
                    if !in_parent && !in_other {
                        valid || missing_disabled
                    } else if in_parent {
                        in_other || (!valid && missing_enabled)
                    } else {
                        false
                    }
                }
                UseDepKind::IfDisabled => {
                    !in_parent && (in_other || (!valid && missing_enabled))
                }
            };

            if keep {
                tokens.push(token.clone());
            }
        }

        Ok(self.derived(tokens))
    }

    /// Expand the conditional tokens to every state reachable under the
    /// given `use.mask` and `use.force` sets.
    ///
    /// The result may list the same flag as both enabled and disabled.
    pub fn eval_qa_conditionals(
        &self,
        use_mask: &BTreeSet<String>,
        use_force: &BTreeSet<String>,
    ) -> UseDependency {
        let mut tokens = Vec::new();
        for token in &self.tokens {
            let masked = use_mask.contains(&token.flag);
            let forced = use_force.contains(&token.flag);
            let mut push = |kind| tokens.push(UseToken::new(&token.flag, kind, token.default));
            match token.kind {
                UseDepKind::IfEnabled => {
                    if !masked {
                        push(UseDepKind::Enabled);
                    }
                }
                UseDepKind::Equal => {
                    if !masked {
                        push(UseDepKind::Enabled);
                    }
                    if !forced {
                        push(UseDepKind::Disabled);
                    }
                }
                UseDepKind::NotEqual => {
                    if !forced {
                        push(UseDepKind::Enabled);
                    }
                    if !masked {
                        push(UseDepKind::Disabled);
                    }
                }
                UseDepKind::IfDisabled => {
                    if !forced {
                        push(UseDepKind::Disabled);
                    }
                }
                kind => push(kind),
            }
        }
        self.derived(tokens)
    }

    /// Whether no token is present.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Display for UseDependency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.tokens.is_empty() {
            return Ok(());
        }
        write!(f, "[")?;
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{token}")?;
        }
        write!(f, "]")
    }
}

impl FromStr for UseDependency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Winnow parsers

pub(crate) fn is_flag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '@' | '-')
}

/// A USE flag name: `[A-Za-z0-9][A-Za-z0-9+_@-]*`.
pub(crate) fn parse_flag_name<'s>() -> impl Parser<&'s str, &'s str, ErrMode<ContextError>> {
    take_while(1.., is_flag_char)
        .verify(|s: &str| s.starts_with(|c: char| c.is_ascii_alphanumeric()))
        .context(StrContext::Label("USE flag"))
}

/// Whether `flag` is a syntactically valid USE flag name.
pub(crate) fn is_valid_flag_name(flag: &str) -> bool {
    parse_flag_name().parse(flag).is_ok()
}

fn parse_use_default<'s>() -> impl Parser<&'s str, UseDefault, ErrMode<ContextError>> {
    alt((
        "(+)".value(UseDefault::Enabled),
        "(-)".value(UseDefault::Disabled),
    ))
}

fn parse_use_token<'s>() -> impl Parser<&'s str, UseToken, ErrMode<ContextError>> {
    (
        opt(one_of(['!', '-'])),
        parse_flag_name(),
        opt(parse_use_default()),
        opt(one_of(['?', '='])),
    )
        .verify_map(|(prefix, flag, default, suffix)| {
            let kind = match (prefix, suffix) {
                (None, None) => UseDepKind::Enabled,
                (Some('-'), None) => UseDepKind::Disabled,
                (None, Some('?')) => UseDepKind::IfEnabled,
                (Some('!'), Some('?')) => UseDepKind::IfDisabled,
                (None, Some('=')) => UseDepKind::Equal,
                (Some('!'), Some('=')) => UseDepKind::NotEqual,
                _ => return None,
            };
            Some(UseToken::new(flag, kind, default))
        })
        .context(StrContext::Label("use dep"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(flags: &[&str]) -> BTreeSet<String> {
        flags.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_groups() {
        let dep = UseDependency::parse("a,-b,c?,!d?,e=,!f=").unwrap();
        assert_eq!(dep.enabled, set(&["a"]));
        assert_eq!(dep.disabled, set(&["b"]));
        assert_eq!(dep.conditional.if_enabled, set(&["c"]));
        assert_eq!(dep.conditional.if_disabled, set(&["d"]));
        assert_eq!(dep.conditional.equal, set(&["e"]));
        assert_eq!(dep.conditional.not_equal, set(&["f"]));
        assert_eq!(dep.required, set(&["a", "b", "c", "d", "e", "f"]));
    }

    #[test]
    fn parse_defaults() {
        let dep = UseDependency::parse("foo(+),-bar(-),baz(+)?").unwrap();
        assert_eq!(dep.missing_enabled, set(&["foo", "baz"]));
        assert_eq!(dep.missing_disabled, set(&["bar"]));
        assert!(dep.required.is_empty());
    }

    #[test]
    fn conflicting_defaults() {
        assert!(UseDependency::parse("foo(+),-foo(-)").is_err());
        assert!(UseDependency::parse("foo,-foo(-)").is_err());
        assert!(UseDependency::parse("foo(+),foo?").is_err());
    }

    #[test]
    fn invalid_tokens() {
        assert!(UseDependency::parse("").is_err());
        assert!(UseDependency::parse("-foo?").is_err());
        assert!(UseDependency::parse("!foo").is_err());
        assert!(UseDependency::parse("_foo").is_err());
        assert!(UseDependency::parse("foo,,bar").is_err());
        assert!(UseDependency::parse("foo(x)").is_err());
    }

    #[test]
    fn display_round_trip() {
        for s in ["a", "-a", "a?", "!a?", "a=", "!a=", "a(+)", "-a(-)", "a(+)=", "!a(-)?"] {
            let dep = UseDependency::parse(s).unwrap();
            assert_eq!(dep.to_string(), format!("[{s}]"));
        }
    }

    #[test]
    fn evaluate_truth_table() {
        let dep = UseDependency::parse("x?,!y?,z=,!w=").unwrap();

        let all = dep.evaluate_conditionals(&set(&["x", "y", "z", "w"]));
        assert_eq!(all.to_string(), "[x,z,-w]");

        let none = dep.evaluate_conditionals(&BTreeSet::new());
        assert_eq!(none.to_string(), "[-y,-z,w]");
        assert!(none.conditional.is_empty());
        assert_eq!(none.required, dep.required);
    }

    #[test]
    fn evaluate_drops_duplicates() {
        let dep = UseDependency::parse("x?,x,!y=,-y").unwrap();
        let evaluated = dep.evaluate_conditionals(&set(&["x", "y"]));
        assert_eq!(evaluated.to_string(), "[x,-y]");

        let unset = dep.evaluate_conditionals(&BTreeSet::new());
        assert_eq!(unset.to_string(), "[x,y,-y]");
    }

    #[test]
    fn evaluate_keeps_defaults() {
        let dep = UseDependency::parse("x(+)=").unwrap();
        let evaluated = dep.evaluate_conditionals(&BTreeSet::new());
        assert_eq!(evaluated.to_string(), "[-x(+)]");
        assert_eq!(evaluated.missing_enabled, set(&["x"]));
    }

    #[test]
    fn violated_needs_parent_use() {
        let dep = UseDependency::parse("x?").unwrap();
        assert!(dep
            .violated_conditionals(&BTreeSet::new(), |_| true, None)
            .is_err());
    }

    #[test]
    fn violated_drops_satisfied() {
        let dep = UseDependency::parse("a,-b,c").unwrap();
        let other = set(&["a", "b"]);
        let violated = dep.violated_conditionals(&other, |_| true, None).unwrap();
        assert_eq!(violated.to_string(), "[-b,c]");
    }

    #[test]
    fn violated_conditional_forms() {
        let dep = UseDependency::parse("x?,y=").unwrap();
        let parent = set(&["x", "y"]);
        let violated = dep
            .violated_conditionals(&BTreeSet::new(), |_| true, Some(&parent))
            .unwrap();
        assert_eq!(violated.to_string(), "[x?,y=]");

        let satisfied = dep
            .violated_conditionals(&parent, |_| true, Some(&parent))
            .unwrap();
        assert!(satisfied.is_empty());
    }

    #[test]
    fn violated_keeps_invalid_flags() {
        let dep = UseDependency::parse("missing").unwrap();
        let violated = dep
            .violated_conditionals(&set(&["missing"]), |_| false, None)
            .unwrap();
        assert_eq!(violated.to_string(), "[missing]");
    }

    #[test]
    fn qa_conditionals() {
        let dep = UseDependency::parse("x=,y?").unwrap();
        let expanded = dep.eval_qa_conditionals(&set(&["y"]), &set(&["x"]));
        assert_eq!(expanded.to_string(), "[x]");

        let open = dep.eval_qa_conditionals(&BTreeSet::new(), &BTreeSet::new());
        assert_eq!(open.to_string(), "[x,-x,y]");
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::use_dep::is_valid_flag_name;

/// Default state for an IUSE flag.
///
/// Flags may be prefixed with `+` (enabled by default) or `-` (disabled by
/// default) in the `IUSE` variable.
///
/// See [PMS 7.2](https://projects.gentoo.org/pms/9/pms.html#mandatory-ebuilddefined-variables).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IUseDefault {
    /// `+flag`
    Enabled,
    /// `-flag`
    Disabled,
}

/// A single USE flag entry from the `IUSE` variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IUse {
    /// The USE flag name (without prefix).
    pub name: String,
    /// Optional default state prefix (`+` or `-`).
    pub default: Option<IUseDefault>,
}

impl IUse {
    /// Parse a space-separated `IUSE` line into a list of flags.
    ///
    /// # Examples
    ///
    /// ```
    /// use portage_package::{IUse, IUseDefault};
    ///
    /// let flags = IUse::parse_line("+ssl -debug test").unwrap();
    /// assert_eq!(flags.len(), 3);
    /// assert_eq!(flags[0].default, Some(IUseDefault::Enabled));
    /// assert_eq!(flags[2].name, "test");
    /// ```
    pub fn parse_line(input: &str) -> Result<Vec<IUse>> {
        input.split_whitespace().map(str::parse).collect()
    }
}

impl FromStr for IUse {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, default) = match s.as_bytes().first() {
            Some(b'+') => (&s[1..], Some(IUseDefault::Enabled)),
            Some(b'-') => (&s[1..], Some(IUseDefault::Disabled)),
            _ => (s, None),
        };

        if !is_valid_flag_name(name) {
            return Err(Error::InvalidIUse(s.to_string()));
        }

        Ok(IUse {
            name: name.to_string(),
            default,
        })
    }
}

impl fmt::Display for IUse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.default {
            Some(IUseDefault::Enabled) => write!(f, "+{}", self.name),
            Some(IUseDefault::Disabled) => write!(f, "-{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Flags a package may use without declaring them in IUSE.
///
/// Profiles declare them as plain names (`prefix`, `test`) or as
/// `*` globs generated from USE_EXPAND (`elibc_*`, `kernel_*`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImplicitIuse {
    flags: BTreeSet<String>,
    patterns: Vec<String>,
}

impl ImplicitIuse {
    /// Build from a whitespace separated list of flags and globs.
    ///
    /// # Examples
    ///
    /// ```
    /// use portage_package::ImplicitIuse;
    ///
    /// let implicit = ImplicitIuse::new("prefix test elibc_* kernel_*");
    /// assert!(implicit.matches("elibc_glibc"));
    /// assert!(implicit.matches("test"));
    /// assert!(!implicit.matches("ssl"));
    /// ```
    pub fn new(input: &str) -> Self {
        let mut implicit = ImplicitIuse::default();
        for token in input.split_whitespace() {
            if token.contains('*') {
                implicit.patterns.push(token.to_string());
            } else {
                implicit.flags.insert(token.to_string());
            }
        }
        implicit
    }

    /// Whether `flag` is implicitly part of every package's IUSE.
    pub fn matches(&self, flag: &str) -> bool {
        self.flags.contains(flag) || self.patterns.iter().any(|p| glob_match(p, flag))
    }
}

/// `*`-only glob matching.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };
    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// The effective IUSE of a package.
///
/// Splits the declared tokens by their default marker, expands profile use
/// aliases when the EAPI allows them and answers flag validity with the
/// implicit IUSE in mind.
#[derive(Debug, Clone)]
pub struct Iuse {
    tokens: Vec<IUse>,
    all: BTreeSet<String>,
    all_aliases: BTreeSet<String>,
    enabled: BTreeSet<String>,
    disabled: BTreeSet<String>,
    alias_mapping: BTreeMap<String, Vec<String>>,
    implicit: Rc<ImplicitIuse>,
}

impl Iuse {
    /// Build the effective IUSE.
    ///
    /// `aliases` maps a real flag to the alias names a profile gives it. It is
    /// ignored unless `use_aliases` is set.
    pub fn new(
        tokens: Vec<IUse>,
        implicit: Rc<ImplicitIuse>,
        aliases: &BTreeMap<String, Vec<String>>,
        use_aliases: bool,
    ) -> Self {
        let mut all = BTreeSet::new();
        let mut enabled = BTreeSet::new();
        let mut disabled = BTreeSet::new();

        for token in &tokens {
            all.insert(token.name.clone());
            match token.default {
                Some(IUseDefault::Enabled) => enabled.insert(token.name.clone()),
                Some(IUseDefault::Disabled) => disabled.insert(token.name.clone()),
                None => false,
            };
        }

        let mut alias_mapping = BTreeMap::new();
        let mut all_aliases = BTreeSet::new();
        if use_aliases {
            for flag in &all {
                let Some(names) = aliases.get(flag) else {
                    continue;
                };
                let names: Vec<String> = names
                    .iter()
                    .filter(|alias| !all.contains(*alias))
                    .cloned()
                    .collect();
                if names.is_empty() {
                    continue;
                }
                all_aliases.extend(names.iter().cloned());
                alias_mapping.insert(flag.clone(), names);
            }
        }

        Iuse {
            tokens,
            all,
            all_aliases,
            enabled,
            disabled,
            alias_mapping,
            implicit,
        }
    }

    /// Declared tokens in source order.
    pub fn tokens(&self) -> &[IUse] {
        &self.tokens
    }

    /// Every declared flag name.
    pub fn all(&self) -> &BTreeSet<String> {
        &self.all
    }

    /// Alias names contributed by the profile.
    pub fn all_aliases(&self) -> &BTreeSet<String> {
        &self.all_aliases
    }

    /// Flags declared with `+`.
    pub fn enabled(&self) -> &BTreeSet<String> {
        &self.enabled
    }

    /// Flags declared with `-`.
    pub fn disabled(&self) -> &BTreeSet<String> {
        &self.disabled
    }

    /// Real flag → alias names.
    pub fn alias_mapping(&self) -> &BTreeMap<String, Vec<String>> {
        &self.alias_mapping
    }

    /// Whether the declared tokens carry any `+`/`-` default.
    pub fn has_defaults(&self) -> bool {
        !self.enabled.is_empty() || !self.disabled.is_empty()
    }

    /// Whether `flag` is declared, aliased or implicit.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use std::rc::Rc;
    /// use portage_package::{IUse, ImplicitIuse, Iuse};
    ///
    /// let iuse = Iuse::new(
    ///     IUse::parse_line("+ssl gtk").unwrap(),
    ///     Rc::new(ImplicitIuse::new("test kernel_*")),
    ///     &BTreeMap::new(),
    ///     false,
    /// );
    /// assert!(iuse.is_valid_flag("ssl"));
    /// assert!(iuse.is_valid_flag("kernel_linux"));
    /// assert!(!iuse.is_valid_flag("qt5"));
    /// ```
    pub fn is_valid_flag(&self, flag: &str) -> bool {
        self.all.contains(flag) || self.all_aliases.contains(flag) || self.implicit.matches(flag)
    }

    /// The flags of `flags` that are not valid for this package.
    pub fn missing_iuse<'a, I>(&self, flags: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        flags
            .into_iter()
            .filter(|flag| !self.is_valid_flag(flag))
            .collect()
    }

    /// Resolve an alias to its real flag.
    ///
    /// Returns the flag itself if it is declared, `None` if it is neither
    /// declared nor an alias.
    pub fn real_flag<'a>(&'a self, flag: &'a str) -> Option<&'a str> {
        if self.all.contains(flag) {
            return Some(flag);
        }
        if !self.all_aliases.contains(flag) {
            return None;
        }
        self.alias_mapping
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|alias| alias == flag))
            .map(|(real, _)| real.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iuse(line: &str, implicit: &str) -> Iuse {
        Iuse::new(
            IUse::parse_line(line).unwrap(),
            Rc::new(ImplicitIuse::new(implicit)),
            &BTreeMap::new(),
            false,
        )
    }

    #[test]
    fn parse_defaults() {
        let flag: IUse = "+ssl".parse().unwrap();
        assert_eq!(flag.default, Some(IUseDefault::Enabled));
        let flag: IUse = "-debug".parse().unwrap();
        assert_eq!(flag.default, Some(IUseDefault::Disabled));
        let flag: IUse = "python_targets_python3_11".parse().unwrap();
        assert_eq!(flag.default, None);
    }

    #[test]
    fn invalid_entries() {
        for s in ["", "+", "-", "+-foo", "_foo", "foo!"] {
            assert!(s.parse::<IUse>().is_err(), "{s} should be rejected");
        }
    }

    #[test]
    fn display_round_trip() {
        for s in ["+ssl", "-debug", "test"] {
            let flag: IUse = s.parse().unwrap();
            assert_eq!(flag.to_string(), s);
        }
    }

    #[test]
    fn split_by_default() {
        let iuse = iuse("+foo -bar baz", "");
        assert_eq!(iuse.all().len(), 3);
        assert!(iuse.enabled().contains("foo"));
        assert!(iuse.disabled().contains("bar"));
        assert!(iuse.has_defaults());
        assert!(!self::iuse("foo", "").has_defaults());
    }

    #[test]
    fn implicit_globs() {
        let implicit = ImplicitIuse::new("abi_x86_* *_linux a*b*c");
        assert!(implicit.matches("abi_x86_64"));
        assert!(implicit.matches("kernel_linux"));
        assert!(implicit.matches("axxbyyc"));
        assert!(!implicit.matches("abi_ppc_64"));
        assert!(!implicit.matches("ab"));
    }

    #[test]
    fn missing_flags() {
        let iuse = iuse("ssl", "test");
        assert_eq!(iuse.missing_iuse(["ssl", "test", "gtk"]), vec!["gtk"]);
    }

    #[test]
    fn aliases() {
        let mut aliases = BTreeMap::new();
        aliases.insert("ssl".to_string(), vec!["openssl".to_string(), "tls".to_string()]);
        let tokens = IUse::parse_line("ssl tls").unwrap();
        let iuse = Iuse::new(tokens.clone(), Rc::default(), &aliases, true);
        assert!(iuse.is_valid_flag("openssl"));
        assert_eq!(iuse.real_flag("openssl"), Some("ssl"));
        assert_eq!(iuse.real_flag("tls"), Some("tls"));
        assert_eq!(iuse.real_flag("gtk"), None);

        let plain = Iuse::new(tokens, Rc::default(), &aliases, false);
        assert!(!plain.is_valid_flag("openssl"));
    }
}

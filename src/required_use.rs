use std::collections::BTreeSet;
use std::fmt;

use winnow::ascii::multispace0;
use winnow::combinator::{
    alt, cut_err, delimited, dispatch, opt, peek, preceded, repeat, terminated,
};
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::token::any;

use crate::eapi::EapiAttrs;
use crate::error::{Error, Result};
use crate::use_dep::parse_flag_name;

/// A node in a `REQUIRED_USE` expression tree.
///
/// `REQUIRED_USE` constrains which combinations of USE flags are valid.
/// Introduced in EAPI 4. The `AtMostOne` (`??`) operator was added in EAPI 5.
///
/// See [PMS 7.3.4](https://projects.gentoo.org/pms/9/pms.html#use-state-constraints).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredUseExpr {
    /// `flag` or `!flag`.
    Flag { name: String, negated: bool },
    /// `|| ( ... )`
    AnyOf(Vec<RequiredUseExpr>),
    /// `^^ ( ... )`
    ExactlyOne(Vec<RequiredUseExpr>),
    /// `?? ( ... )`
    AtMostOne(Vec<RequiredUseExpr>),
    /// `flag? ( ... )` or `!flag? ( ... )`.
    UseConditional {
        flag: String,
        negated: bool,
        entries: Vec<RequiredUseExpr>,
    },
    /// Every child must hold.
    All(Vec<RequiredUseExpr>),
}

impl RequiredUseExpr {
    /// Parse a `REQUIRED_USE` expression string.
    ///
    /// # Examples
    ///
    /// ```
    /// use portage_package::RequiredUseExpr;
    ///
    /// let expr = RequiredUseExpr::parse("|| ( flag1 flag2 )").unwrap();
    /// assert!(matches!(expr, RequiredUseExpr::AnyOf(_)));
    ///
    /// let expr = RequiredUseExpr::parse("^^ ( gui qt gtk )").unwrap();
    /// assert!(matches!(expr, RequiredUseExpr::ExactlyOne(_)));
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let mut entries: Vec<RequiredUseExpr> = parse_required_use_string()
            .parse(input)
            .map_err(|e| Error::InvalidRequiredUse(format!("{e}")))?;

        Ok(if entries.len() == 1 {
            entries.remove(0)
        } else {
            RequiredUseExpr::All(entries)
        })
    }

    /// Evaluate the constraint against the enabled flags in `use_flags`.
    ///
    /// Every referenced flag must satisfy `iuse_match`, including flags inside
    /// conditionals that are not taken. Fails with category `IUSE.missing`
    /// for an unknown flag and `EAPI.incompatible` for `??` where the EAPI
    /// lacks it.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeSet;
    /// use portage_package::{Eapi, RequiredUseExpr};
    ///
    /// let expr = RequiredUseExpr::parse("ssl? ( ^^ ( openssl gnutls ) )").unwrap();
    /// let iuse = |flag: &str| ["ssl", "openssl", "gnutls"].contains(&flag);
    /// let eapi = Eapi::Eight.attrs();
    ///
    /// let use_flags: BTreeSet<String> = ["ssl".to_string()].into();
    /// assert!(!expr.check(&use_flags, iuse, &eapi).unwrap());
    ///
    /// let use_flags: BTreeSet<String> = ["ssl".to_string(), "gnutls".to_string()].into();
    /// assert!(expr.check(&use_flags, iuse, &eapi).unwrap());
    /// ```
    pub fn check<F>(
        &self,
        use_flags: &BTreeSet<String>,
        iuse_match: F,
        eapi: &EapiAttrs,
    ) -> Result<bool>
    where
        F: Fn(&str) -> bool,
    {
        let checker = Checker {
            use_flags,
            iuse_match: &iuse_match,
            eapi,
        };
        checker.eval(self)
    }

    /// Every flag the expression refers to, conditionals included.
    pub fn flags(&self) -> BTreeSet<&str> {
        let mut flags = BTreeSet::new();
        self.collect_flags(&mut flags);
        flags
    }

    fn collect_flags<'a>(&'a self, flags: &mut BTreeSet<&'a str>) {
        match self {
            RequiredUseExpr::Flag { name, .. } => {
                flags.insert(name.as_str());
            }
            RequiredUseExpr::UseConditional { flag, entries, .. } => {
                flags.insert(flag.as_str());
                entries.iter().for_each(|e| e.collect_flags(flags));
            }
            RequiredUseExpr::AnyOf(entries)
            | RequiredUseExpr::ExactlyOne(entries)
            | RequiredUseExpr::AtMostOne(entries)
            | RequiredUseExpr::All(entries) => entries.iter().for_each(|e| e.collect_flags(flags)),
        }
    }
}

struct Checker<'a> {
    use_flags: &'a BTreeSet<String>,
    iuse_match: &'a dyn Fn(&str) -> bool,
    eapi: &'a EapiAttrs,
}

impl Checker<'_> {
    fn flag(&self, name: &str, negated: bool) -> Result<bool> {
        if !(self.iuse_match)(name) {
            return Err(Error::dep_string(format!("USE flag '{name}' is not in IUSE"))
                .with_category("IUSE.missing"));
        }
        Ok(self.use_flags.contains(name) != negated)
    }

    fn entries(&self, entries: &[RequiredUseExpr]) -> Result<Vec<bool>> {
        entries.iter().map(|e| self.eval(e)).collect()
    }

    /// Groups without children hold when the EAPI says so.
    fn group(
        &self,
        entries: &[RequiredUseExpr],
        satisfied: impl Fn(usize) -> bool,
    ) -> Result<bool> {
        let values = self.entries(entries)?;
        if values.is_empty() && self.eapi.empty_groups_always_true {
            return Ok(true);
        }
        Ok(satisfied(values.into_iter().filter(|v| *v).count()))
    }

    fn eval(&self, expr: &RequiredUseExpr) -> Result<bool> {
        match expr {
            RequiredUseExpr::Flag { name, negated } => self.flag(name, *negated),
            RequiredUseExpr::AnyOf(entries) => self.group(entries, |n| n >= 1),
            RequiredUseExpr::ExactlyOne(entries) => self.group(entries, |n| n == 1),
            RequiredUseExpr::AtMostOne(entries) => {
                if !self.eapi.required_use_at_most_one_of {
                    return Err(Error::dep_string(
                        "Operator '??' is not supported in this EAPI",
                    )
                    .with_category("EAPI.incompatible"));
                }
                self.group(entries, |n| n <= 1)
            }
            RequiredUseExpr::UseConditional {
                flag,
                negated,
                entries,
            } => {
                let values = self.entries(entries)?;
                Ok(!self.flag(flag, *negated)? || values.into_iter().all(|v| v))
            }
            RequiredUseExpr::All(entries) => Ok(self.entries(entries)?.into_iter().all(|v| v)),
        }
    }
}

impl fmt::Display for RequiredUseExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (prefix, entries) = match self {
            RequiredUseExpr::Flag { name, negated } => {
                let bang = if *negated { "!" } else { "" };
                return write!(f, "{bang}{name}");
            }
            RequiredUseExpr::All(entries) => return fmt_entries(f, entries),
            RequiredUseExpr::AnyOf(entries) => ("||".to_string(), entries),
            RequiredUseExpr::ExactlyOne(entries) => ("^^".to_string(), entries),
            RequiredUseExpr::AtMostOne(entries) => ("??".to_string(), entries),
            RequiredUseExpr::UseConditional {
                flag,
                negated,
                entries,
            } => {
                let bang = if *negated { "!" } else { "" };
                (format!("{bang}{flag}?"), entries)
            }
        };
        write!(f, "{prefix} ( ")?;
        fmt_entries(f, entries)?;
        write!(f, " )")
    }
}

fn fmt_entries(f: &mut fmt::Formatter, entries: &[RequiredUseExpr]) -> fmt::Result {
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{entry}")?;
    }
    Ok(())
}

// Winnow parsers

fn parse_group(input: &mut &str) -> ModalResult<Vec<RequiredUseExpr>> {
    preceded(
        multispace0,
        delimited(
            '(',
            parse_required_use_entries,
            cut_err((multispace0, ')')).context(StrContext::Label("closing ')'")),
        ),
    )
    .parse_next(input)
}

fn parse_operator_group(input: &mut &str) -> ModalResult<RequiredUseExpr> {
    type Make = fn(Vec<RequiredUseExpr>) -> RequiredUseExpr;
    let make: Make = alt((
        "||".value(RequiredUseExpr::AnyOf as Make),
        "^^".value(RequiredUseExpr::ExactlyOne as Make),
        "??".value(RequiredUseExpr::AtMostOne as Make),
    ))
    .parse_next(input)?;
    cut_err(parse_group)
        .context(StrContext::Label("operator group"))
        .map(make)
        .parse_next(input)
}

fn parse_use_conditional(input: &mut &str) -> ModalResult<RequiredUseExpr> {
    let (negated, flag) = terminated((opt('!'), parse_flag_name()), '?').parse_next(input)?;
    let entries = cut_err(parse_group)
        .context(StrContext::Label("USE conditional group"))
        .parse_next(input)?;
    Ok(RequiredUseExpr::UseConditional {
        flag: flag.to_string(),
        negated: negated.is_some(),
        entries,
    })
}

fn parse_flag<'s>() -> impl Parser<&'s str, RequiredUseExpr, ErrMode<ContextError>> {
    (opt('!'), parse_flag_name()).map(|(neg, name): (Option<char>, &str)| RequiredUseExpr::Flag {
        name: name.to_string(),
        negated: neg.is_some(),
    })
}

fn parse_required_use_entry(input: &mut &str) -> ModalResult<Vec<RequiredUseExpr>> {
    dispatch! {peek(any);
        '|' | '^' | '?' => parse_operator_group.map(|e| vec![e]),
        '(' => parse_group,
        _ => alt((
            parse_use_conditional.map(|e| vec![e]),
            parse_flag().map(|e| vec![e]),
        )),
    }
    .parse_next(input)
}

fn parse_required_use_entries(input: &mut &str) -> ModalResult<Vec<RequiredUseExpr>> {
    repeat(0.., preceded(multispace0, parse_required_use_entry))
        .fold(
            Vec::new,
            |mut acc: Vec<RequiredUseExpr>, batch: Vec<RequiredUseExpr>| {
                acc.extend(batch);
                acc
            },
        )
        .parse_next(input)
}

pub(crate) fn parse_required_use_string<'s>(
) -> impl Parser<&'s str, Vec<RequiredUseExpr>, ErrMode<ContextError>> {
    move |input: &mut &'s str| {
        let entries = parse_required_use_entries(input)?;
        multispace0.parse_next(input)?;
        Ok(entries)
    }
}

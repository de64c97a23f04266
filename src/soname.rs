use std::collections::BTreeSet;
use std::fmt;

use winnow::ascii::{multispace0, multispace1};
use winnow::combinator::{alt, eof, peek, preceded, repeat, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take_while;

use crate::error::{Error, Result};

/// A shared library provided or required by a built package, qualified by
/// its multilib category (`x86_64`, `x86_32`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SonameAtom {
    pub multilib_category: String,
    pub soname: String,
}

impl fmt::Display for SonameAtom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.multilib_category, self.soname)
    }
}

/// Parse a `PROVIDES` or `REQUIRES` value.
///
/// Each `category:` token applies to the sonames that follow it.
///
/// # Examples
///
/// ```
/// use portage_package::parse_soname_deps;
///
/// let deps = parse_soname_deps("x86_64: libc.so.6 libm.so.6 x86_32: libc.so.6").unwrap();
/// assert_eq!(deps.len(), 3);
/// assert_eq!(deps[2].to_string(), "x86_32: libc.so.6");
///
/// assert!(parse_soname_deps("libc.so.6").is_err());
/// ```
pub fn parse_soname_deps(input: &str) -> Result<Vec<SonameAtom>> {
    let tokens: Vec<Token<'_>> = parse_tokens()
        .parse(input)
        .map_err(|e| Error::data(format!("invalid soname data: {e}")))?;

    let mut seen = BTreeSet::new();
    let mut category: Option<&str> = None;
    let mut atoms = Vec::new();

    for token in tokens {
        match token {
            Token::Category(name) => {
                if name.is_empty() {
                    return Err(Error::data("empty soname category"));
                }
                if !seen.insert(name) {
                    return Err(Error::data(format!("duplicate soname category '{name}'")));
                }
                category = Some(name);
            }
            Token::Soname(soname) => {
                let Some(category) = category else {
                    return Err(Error::data(format!(
                        "soname '{soname}' has no multilib category"
                    )));
                };
                atoms.push(SonameAtom {
                    multilib_category: category.to_string(),
                    soname: soname.to_string(),
                });
            }
        }
    }

    Ok(atoms)
}

// Winnow parsers

enum Token<'s> {
    Category(&'s str),
    Soname(&'s str),
}

fn parse_category<'s>() -> impl Parser<&'s str, Token<'s>, ErrMode<ContextError>> {
    terminated(
        take_while(0.., |c: char| c != ':' && !c.is_whitespace()),
        (':', peek(alt((multispace1, eof)))),
    )
    .map(Token::Category)
}

fn parse_soname<'s>() -> impl Parser<&'s str, Token<'s>, ErrMode<ContextError>> {
    take_while(1.., |c: char| !c.is_whitespace()).map(Token::Soname)
}

fn parse_tokens<'s>() -> impl Parser<&'s str, Vec<Token<'s>>, ErrMode<ContextError>> {
    terminated(
        repeat(
            0..,
            preceded(multispace0, alt((parse_category(), parse_soname()))),
        ),
        multispace0,
    )
}

//! Gentoo package instances, dependency atoms and USE reduction based on [PMS].
//!
//! This crate models the part of a package manager that sits between the
//! metadata readers and the dependency resolver: parsing dependency atoms,
//! reducing USE-conditional dependency strings, matching atoms against
//! candidate packages and deciding whether a package is valid, masked and
//! visible under a given configuration.
//!
//! [PMS]: https://projects.gentoo.org/pms/latest/pms.html
//!
//! # Overview
//!
//! A [`Package`] is built from a `category/package-version`, a
//! [`PackageType`] and its raw metadata, in the context of a [`RootConfig`]
//! that carries the [`Settings`] and the interning tables shared by every
//! package of one resolution session. Everything derived from the metadata
//! (USE, validation, masks, visibility) is computed on first access and then
//! cached.
//!
//! Dependency strings are handled by [`UseReduce`], atoms by [`Atom`] and
//! matching by [`atom_matches`] and friends, which work on anything that
//! implements [`Candidate`].
//!
//! # Examples
//!
//! Reduce a dependency string:
//!
//! ```
//! use std::collections::BTreeSet;
//! use portage_package::{paren_enclose, strip_conditionals, use_reduce};
//!
//! let use_flags: BTreeSet<String> = ["ssl".to_string()].into();
//! let reduced = use_reduce("ssl? ( dev-libs/openssl ) !ssl? ( dev-libs/nettle )", &use_flags)
//!     .unwrap();
//! assert_eq!(paren_enclose(&reduced), "ssl? ( dev-libs/openssl )");
//! assert_eq!(paren_enclose(&strip_conditionals(reduced)), "dev-libs/openssl");
//! ```
//!
//! Read an md5-cache entry into a package and check its visibility:
//!
//! ```
//! use portage_package::{CacheEntry, Package, PackageOptions, PackageType, RootConfig, Settings};
//!
//! let entry = CacheEntry::parse("\
//! EAPI=8
//! DESCRIPTION=Example package
//! SLOT=0
//! KEYWORDS=~amd64
//! ").unwrap();
//!
//! let settings = Settings {
//!     accept_keywords: vec!["amd64".into()],
//!     ..Settings::default()
//! };
//! let root = RootConfig::new("/", settings);
//! let pkg = Package::new(
//!     "app-misc/example-1.0",
//!     PackageType::Ebuild,
//!     PackageOptions::default(),
//!     entry.metadata,
//!     root,
//! )
//! .unwrap();
//! assert!(!pkg.visible());
//! assert_eq!(pkg.masks().unwrap().keywords, ["~amd64"]);
//! ```

mod atom;
mod cache;
mod config;
mod dep_expr;
mod eapi;
mod error;
mod iuse;
mod keyword;
mod matcher;
mod metadata;
mod package;
mod phase;
mod required_use;
mod soname;
mod use_dep;

// Re-export public types
pub use atom::{Atom, AtomInterner, AtomOptions, Blocker, Operator, SlotOperator};
pub use cache::CacheEntry;
pub use config::{FlagSetInterner, RootConfig, Settings};
pub use dep_expr::{
    flatten, paren_enclose, paren_enclose_unevaluated, paren_reduce, strip_conditionals,
    use_reduce, DepExpr, UseReduce, UseState, EMPTY_ANY_OF,
};
pub use eapi::{Eapi, EapiAttrs};
pub use error::{Error, Result};
pub use iuse::{IUse, IUseDefault, ImplicitIuse, Iuse};
pub use keyword::{
    accepted_keywords, keyword_mask, missing_keywords, Keyword, KeywordMask, Stability,
};
pub use matcher::{
    atom_matches, best_match_to_list, match_from_list, match_to_list, vercmp, Candidate,
    CandidateCpv,
};
pub use metadata::{MetadataKey, MetadataWrapper, RawMetadata};
pub use package::{
    Invalid, KeySource, Masks, Operation, Package, PackageKey, PackageOptions, PackageType,
    PackageUse, UNKNOWN_REPO,
};
pub use phase::Phase;
pub use required_use::RequiredUseExpr;
pub use soname::{parse_soname_deps, SonameAtom};
pub use use_dep::{UseConditionals, UseDefault, UseDepKind, UseDependency, UseToken};

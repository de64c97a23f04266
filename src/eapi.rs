use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// EAPI (Ebuild API) version.
///
/// The EAPI controls which features and behaviours are available to an ebuild.
/// Each EAPI builds on the previous one, adding or modifying capabilities.
///
/// See [PMS 2](https://projects.gentoo.org/pms/latest/pms.html#eapis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Eapi {
    /// EAPI 0: base (legacy).
    Zero,
    /// EAPI 1: slot deps, IUSE defaults.
    One,
    /// EAPI 2: USE deps, `!!` blockers, SRC_URI arrows.
    Two,
    /// EAPI 3: prefix support.
    Three,
    /// EAPI 4: `REQUIRED_USE`, USE dep defaults.
    Four,
    /// EAPI 5: sub-slots, slot operators, `??` in REQUIRED_USE.
    Five,
    /// EAPI 6: `eapply`/`eapply_user`.
    Six,
    /// EAPI 7: `BDEPEND`, empty `||` groups are no longer true.
    Seven,
    /// EAPI 8: `IDEPEND`, selective URI restrictions.
    Eight,
    /// EAPI 9.
    Nine,
}

impl Eapi {
    /// Whether this EAPI supports `:slot` dependencies.
    ///
    /// Introduced in EAPI 1.
    pub fn has_slot_deps(&self) -> bool {
        *self >= Eapi::One
    }

    /// Whether `IUSE` may carry `+`/`-` default markers.
    ///
    /// Introduced in EAPI 1.
    pub fn has_iuse_defaults(&self) -> bool {
        *self >= Eapi::One
    }

    /// Whether atoms may carry `[use]` dependencies.
    ///
    /// Introduced in EAPI 2.
    pub fn has_use_deps(&self) -> bool {
        *self >= Eapi::Two
    }

    /// Whether `!!` strong blockers are allowed.
    ///
    /// Introduced in EAPI 2.
    pub fn has_strong_blocks(&self) -> bool {
        *self >= Eapi::Two
    }

    /// Whether this EAPI supports SRC_URI arrow renaming (`-> filename`).
    ///
    /// Introduced in EAPI 2.
    pub fn has_src_uri_arrows(&self) -> bool {
        *self >= Eapi::Two
    }

    /// Whether this EAPI supports `REQUIRED_USE`.
    ///
    /// Introduced in EAPI 4.
    pub fn has_required_use(&self) -> bool {
        *self >= Eapi::Four
    }

    /// Whether use deps may carry `(+)`/`(-)` defaults.
    ///
    /// Introduced in EAPI 4.
    pub fn has_use_dep_defaults(&self) -> bool {
        *self >= Eapi::Four
    }

    /// Whether this EAPI supports the `??` (at-most-one-of) operator
    /// in `REQUIRED_USE`.
    ///
    /// Introduced in EAPI 5.
    pub fn has_at_most_one_of(&self) -> bool {
        *self >= Eapi::Five
    }

    /// Whether this EAPI supports sub-slots and slot operators (`:=`, `:*`).
    ///
    /// Introduced in EAPI 5.
    pub fn has_slot_operators(&self) -> bool {
        *self >= Eapi::Five
    }

    /// Whether an empty `|| ( )` group counts as satisfied.
    ///
    /// Dropped in EAPI 7.
    pub fn has_empty_groups_always_true(&self) -> bool {
        *self <= Eapi::Six
    }

    /// Whether this EAPI supports `BDEPEND` (build-host dependencies).
    ///
    /// Introduced in EAPI 7.
    pub fn has_bdepend(&self) -> bool {
        *self >= Eapi::Seven
    }

    /// Whether this EAPI supports `IDEPEND` (install-time dependencies).
    ///
    /// Introduced in EAPI 8.
    pub fn has_idepend(&self) -> bool {
        *self >= Eapi::Eight
    }

    /// Whether this EAPI supports selective URI restrictions (`fetch+`/`mirror+` prefixes).
    ///
    /// Introduced in EAPI 8.
    pub fn has_selective_uri_restrictions(&self) -> bool {
        *self >= Eapi::Eight
    }

    /// Capability flags for this EAPI.
    pub fn attrs(&self) -> EapiAttrs {
        EapiAttrs {
            slot_deps: self.has_slot_deps(),
            iuse_defaults: self.has_iuse_defaults(),
            use_deps: self.has_use_deps(),
            strong_blocks: self.has_strong_blocks(),
            src_uri_arrows: self.has_src_uri_arrows(),
            required_use: self.has_required_use(),
            use_dep_defaults: self.has_use_dep_defaults(),
            required_use_at_most_one_of: self.has_at_most_one_of(),
            slot_operator: self.has_slot_operators(),
            empty_groups_always_true: self.has_empty_groups_always_true(),
            selective_src_uri_restriction: self.has_selective_uri_restrictions(),
            repo_deps: false,
            use_aliases: false,
        }
    }
}

/// The subset of EAPI capabilities that changes how dependency strings,
/// atoms and IUSE are parsed or evaluated.
///
/// Built from an [`Eapi`] with [`Eapi::attrs`]; callers may flip individual
/// flags (profiles can enable use aliases, installed packages are checked
/// with [`EapiAttrs::permissive`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EapiAttrs {
    pub slot_deps: bool,
    pub iuse_defaults: bool,
    pub use_deps: bool,
    pub strong_blocks: bool,
    pub src_uri_arrows: bool,
    pub required_use: bool,
    pub use_dep_defaults: bool,
    pub required_use_at_most_one_of: bool,
    pub slot_operator: bool,
    pub empty_groups_always_true: bool,
    pub selective_src_uri_restriction: bool,
    /// `::repo` qualifiers inside dependency strings.
    pub repo_deps: bool,
    /// Use flag aliases declared by the profile.
    pub use_aliases: bool,
}

impl EapiAttrs {
    /// Capabilities used when no EAPI applies: every syntax is accepted.
    ///
    /// An empty `|| ( )` group is still treated as unsatisfiable.
    pub fn permissive() -> Self {
        EapiAttrs {
            slot_deps: true,
            iuse_defaults: true,
            use_deps: true,
            strong_blocks: true,
            src_uri_arrows: true,
            required_use: true,
            use_dep_defaults: true,
            required_use_at_most_one_of: true,
            slot_operator: true,
            empty_groups_always_true: false,
            selective_src_uri_restriction: true,
            repo_deps: true,
            use_aliases: false,
        }
    }
}

impl Default for EapiAttrs {
    fn default() -> Self {
        EapiAttrs::permissive()
    }
}

impl fmt::Display for Eapi {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let n = match self {
            Eapi::Zero => "0",
            Eapi::One => "1",
            Eapi::Two => "2",
            Eapi::Three => "3",
            Eapi::Four => "4",
            Eapi::Five => "5",
            Eapi::Six => "6",
            Eapi::Seven => "7",
            Eapi::Eight => "8",
            Eapi::Nine => "9",
        };
        f.write_str(n)
    }
}

impl FromStr for Eapi {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "0" => Ok(Eapi::Zero),
            "1" => Ok(Eapi::One),
            "2" => Ok(Eapi::Two),
            "3" => Ok(Eapi::Three),
            "4" => Ok(Eapi::Four),
            "5" => Ok(Eapi::Five),
            "6" => Ok(Eapi::Six),
            "7" => Ok(Eapi::Seven),
            "8" => Ok(Eapi::Eight),
            "9" => Ok(Eapi::Nine),
            _ => Err(Error::InvalidEapi(s.to_string())),
        }
    }
}

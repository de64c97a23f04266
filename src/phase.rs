use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Ebuild phase function.
///
/// Phase functions are called by the package manager in a defined order
/// during package build and installation.
///
/// See [PMS 9](https://projects.gentoo.org/pms/latest/pms.html#ebuilddefined-functions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// `pkg_pretend`: pre-flight checks (EAPI 4+).
    PkgPretend,
    /// `pkg_setup`: environment setup.
    PkgSetup,
    /// `src_unpack`: extract source archives.
    SrcUnpack,
    /// `src_prepare`: apply patches (EAPI 2+).
    SrcPrepare,
    /// `src_configure`: run configure (EAPI 2+).
    SrcConfigure,
    /// `src_compile`: build the software.
    SrcCompile,
    /// `src_test`: run test suite.
    SrcTest,
    /// `src_install`: install into image directory.
    SrcInstall,
    /// `pkg_preinst`: before merging into live filesystem.
    PkgPreinst,
    /// `pkg_postinst`: after merging into live filesystem.
    PkgPostinst,
    /// `pkg_prerm`: before removing from live filesystem.
    PkgPrerm,
    /// `pkg_postrm`: after removing from live filesystem.
    PkgPostrm,
    /// `pkg_config`: optional post-install configuration.
    PkgConfig,
    /// `pkg_info`: display package information.
    PkgInfo,
    /// `pkg_nofetch`: handle fetch-restricted sources.
    PkgNofetch,
}

impl Phase {
    /// Every phase, in the order a full build and merge runs them.
    pub const ALL: [Phase; 15] = [
        Phase::PkgPretend,
        Phase::PkgSetup,
        Phase::SrcUnpack,
        Phase::SrcPrepare,
        Phase::SrcConfigure,
        Phase::SrcCompile,
        Phase::SrcTest,
        Phase::SrcInstall,
        Phase::PkgPreinst,
        Phase::PkgPostinst,
        Phase::PkgPrerm,
        Phase::PkgPostrm,
        Phase::PkgConfig,
        Phase::PkgInfo,
        Phase::PkgNofetch,
    ];

    /// Short name as used in `DEFINED_PHASES`.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::PkgPretend => "pretend",
            Phase::PkgSetup => "setup",
            Phase::SrcUnpack => "unpack",
            Phase::SrcPrepare => "prepare",
            Phase::SrcConfigure => "configure",
            Phase::SrcCompile => "compile",
            Phase::SrcTest => "test",
            Phase::SrcInstall => "install",
            Phase::PkgPreinst => "preinst",
            Phase::PkgPostinst => "postinst",
            Phase::PkgPrerm => "prerm",
            Phase::PkgPostrm => "postrm",
            Phase::PkgConfig => "config",
            Phase::PkgInfo => "info",
            Phase::PkgNofetch => "nofetch",
        }
    }

    /// Bash function name, e.g. `src_compile`.
    pub fn function_name(&self) -> String {
        let prefix = match self {
            Phase::SrcUnpack
            | Phase::SrcPrepare
            | Phase::SrcConfigure
            | Phase::SrcCompile
            | Phase::SrcTest
            | Phase::SrcInstall => "src",
            _ => "pkg",
        };
        format!("{prefix}_{}", self.name())
    }

    /// Parse a space-separated `DEFINED_PHASES` line into a list of phases.
    ///
    /// The special value `-` (used in the cache to mean "no phases defined")
    /// returns an empty list.
    ///
    /// # Examples
    ///
    /// ```
    /// use portage_package::Phase;
    ///
    /// let phases = Phase::parse_line("compile configure install").unwrap();
    /// assert_eq!(phases.len(), 3);
    /// assert_eq!(phases[0], Phase::SrcCompile);
    ///
    /// let empty = Phase::parse_line("-").unwrap();
    /// assert!(empty.is_empty());
    /// ```
    pub fn parse_line(input: &str) -> Result<Vec<Phase>> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "-" {
            return Ok(Vec::new());
        }
        trimmed
            .split_whitespace()
            .map(|token| token.parse())
            .collect()
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let short = s
            .strip_prefix("pkg_")
            .or_else(|| s.strip_prefix("src_"))
            .unwrap_or(s);
        Phase::ALL
            .into_iter()
            .find(|phase| phase.name() == short && (short == s || phase.function_name() == s))
            .ok_or_else(|| Error::InvalidPhase(s.to_string()))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

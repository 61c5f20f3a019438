//! Compilation configuration.

use crate::core::error::{CompileError, CompileResult};
use std::fmt;
use std::str::FromStr;

/// Target architecture identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X64,
    Arm64,
    I386,
}

impl Arch {
    pub const ALL: [Arch; 3] = [Arch::X64, Arch::Arm64, Arch::I386];

    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::Arm64 => "arm64",
            Arch::I386 => "i386",
        }
    }
}

impl FromStr for Arch {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arch::ALL
            .into_iter()
            .find(|arch| arch.as_str() == s)
            .ok_or_else(|| CompileError::UnknownArchitecture {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for one compilation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub arch: Arch,
    /// Label of the procedure holding the program body.
    pub entry: String,
}

impl Config {
    pub const DEFAULT_ENTRY: &'static str = "tigermain";

    /// Configuration for the architecture called `arch`.
    pub fn new(arch: &str) -> CompileResult<Self> {
        Ok(Self::for_arch(arch.parse()?))
    }

    pub fn for_arch(arch: Arch) -> Self {
        Self {
            arch,
            entry: Self::DEFAULT_ENTRY.to_string(),
        }
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_arch(Arch::X64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arch_names_round_trip() {
        for arch in Arch::ALL {
            assert_eq!(arch.to_string().parse::<Arch>().unwrap(), arch);
        }
    }

    #[test]
    fn test_unknown_architecture_is_rejected() {
        assert_eq!(
            Config::new("sparc"),
            Err(CompileError::UnknownArchitecture {
                name: "sparc".to_string()
            })
        );
        assert_eq!(Config::new("arm64").unwrap().arch, Arch::Arm64);
        assert_eq!(Config::default().entry, "tigermain");
    }
}

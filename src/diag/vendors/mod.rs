//! Built-in vendor diagnostic parsers.
//!
//! One parser per compiler/linker front-end, dispatched through a closed
//! enum: adding a vendor means adding a variant, not opening an
//! inheritance hierarchy. Parser state is per-instance; a fresh parser set
//! is constructed for every configure/build invocation.

use serde::{Deserialize, Serialize};

use crate::diag::matchers::LineOutcome;
use crate::diag::RawDiagnostic;

pub mod diab;
pub mod gcc;
pub mod ghs;
pub mod gnu_ld;
pub mod iar;
pub mod msvc;

/// Identifier for a built-in vendor grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Vendor {
    /// GCC/Clang compiler output
    Gcc,
    /// GNU linker output
    GnuLd,
    /// Green Hills compiler output
    Ghs,
    /// Wind River Diab compiler output
    Diab,
    /// IAR Embedded Workbench output
    Iar,
    /// MSVC compiler and linker output
    Msvc,
}

impl Vendor {
    /// All vendors in fan-out priority order.
    pub const ALL: [Vendor; 6] = [
        Vendor::Gcc,
        Vendor::GnuLd,
        Vendor::Ghs,
        Vendor::Diab,
        Vendor::Iar,
        Vendor::Msvc,
    ];

    /// Get the vendor tag as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Gcc => "gcc",
            Vendor::GnuLd => "gnu-ld",
            Vendor::Ghs => "ghs",
            Vendor::Diab => "diab",
            Vendor::Iar => "iar",
            Vendor::Msvc => "msvc",
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Vendor {
    type Err = VendorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gcc" => Ok(Vendor::Gcc),
            "gnu-ld" | "gnuld" => Ok(Vendor::GnuLd),
            "ghs" => Ok(Vendor::Ghs),
            "diab" => Ok(Vendor::Diab),
            "iar" => Ok(Vendor::Iar),
            "msvc" => Ok(Vendor::Msvc),
            _ => Err(VendorParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid vendor name.
#[derive(Debug, Clone)]
pub struct VendorParseError(pub String);

impl std::fmt::Display for VendorParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid parser name '{}', valid values: gcc, gnu-ld, ghs, diab, iar, msvc",
            self.0
        )
    }
}

impl std::error::Error for VendorParseError {}

/// A vendor parser together with its in-flight state.
#[derive(Debug)]
pub enum VendorParser {
    Gcc(gcc::Parser),
    GnuLd(gnu_ld::Parser),
    Ghs(ghs::Parser),
    Diab(diab::Parser),
    Iar(iar::Parser),
    Msvc(msvc::Parser),
}

impl VendorParser {
    /// Construct a fresh parser for the given vendor.
    pub fn new(vendor: Vendor) -> Self {
        match vendor {
            Vendor::Gcc => VendorParser::Gcc(gcc::Parser::new()),
            Vendor::GnuLd => VendorParser::GnuLd(gnu_ld::Parser::new()),
            Vendor::Ghs => VendorParser::Ghs(ghs::Parser::new()),
            Vendor::Diab => VendorParser::Diab(diab::Parser::new()),
            Vendor::Iar => VendorParser::Iar(iar::Parser::new()),
            Vendor::Msvc => VendorParser::Msvc(msvc::Parser::new()),
        }
    }

    /// Which vendor this parser handles.
    pub fn vendor(&self) -> Vendor {
        match self {
            VendorParser::Gcc(_) => Vendor::Gcc,
            VendorParser::GnuLd(_) => Vendor::GnuLd,
            VendorParser::Ghs(_) => Vendor::Ghs,
            VendorParser::Diab(_) => Vendor::Diab,
            VendorParser::Iar(_) => Vendor::Iar,
            VendorParser::Msvc(_) => Vendor::Msvc,
        }
    }

    /// Feed one line; `Consumed` means the line belonged to this grammar.
    pub fn handle_line(&mut self, line: &str) -> LineOutcome {
        match self {
            VendorParser::Gcc(p) => p.handle_line(line),
            VendorParser::GnuLd(p) => p.handle_line(line),
            VendorParser::Ghs(p) => p.handle_line(line),
            VendorParser::Diab(p) => p.handle_line(line),
            VendorParser::Iar(p) => p.handle_line(line),
            VendorParser::Msvc(p) => p.handle_line(line),
        }
    }

    /// All diagnostics completed so far, in emission order.
    pub fn diagnostics(&self) -> &[RawDiagnostic] {
        match self {
            VendorParser::Gcc(p) => p.diagnostics(),
            VendorParser::GnuLd(p) => p.diagnostics(),
            VendorParser::Ghs(p) => p.diagnostics(),
            VendorParser::Diab(p) => p.diagnostics(),
            VendorParser::Iar(p) => p.diagnostics(),
            VendorParser::Msvc(p) => p.diagnostics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_parse() {
        assert_eq!("gcc".parse::<Vendor>().unwrap(), Vendor::Gcc);
        assert_eq!("GNU-LD".parse::<Vendor>().unwrap(), Vendor::GnuLd);
        assert_eq!("gnuld".parse::<Vendor>().unwrap(), Vendor::GnuLd);
        assert!("tcc".parse::<Vendor>().is_err());
    }

    #[test]
    fn test_vendor_display() {
        assert_eq!(Vendor::Msvc.to_string(), "msvc");
        assert_eq!(Vendor::GnuLd.to_string(), "gnu-ld");
    }

    #[test]
    fn test_dispatch_reports_vendor() {
        for vendor in Vendor::ALL {
            assert_eq!(VendorParser::new(vendor).vendor(), vendor);
        }
    }
}

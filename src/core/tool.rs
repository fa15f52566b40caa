//
//  Copyright (C) 2022-2024  Chase Ruskin
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! Tool selection and the standard libraries each tool ships with.
//!
//! Requirements on a standard library are satisfied by the tool itself, so the
//! extractor must know which set is active. The set is always passed in
//! explicitly and never read from process-wide state.

use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{AnyError, Fault};

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Simulation,
    Synthesis,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimTool {
    #[serde(alias = "vsim", alias = "questa")]
    Modelsim,
    Isim,
    Iverilog,
    Ghdl,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynTool {
    Ise,
    Vivado,
    Quartus,
    Libero,
    Diamond,
}

impl SynTool {
    /// Guesses the synthesis tool from a device vendor name.
    pub fn from_vendor(vendor: &str) -> Option<Self> {
        match vendor.to_lowercase().as_str() {
            "xilinx" => Some(Self::Ise),
            "altera" | "intel" => Some(Self::Quartus),
            "microsemi" | "microchip" => Some(Self::Libero),
            "lattice" => Some(Self::Diamond),
            _ => None,
        }
    }
}

const DEFAULT_STANDARD_LIBS: &[&str] = &["std", "ieee"];

const MODELSIM_STANDARD_LIBS: &[&str] = &[
    "std",
    "ieee",
    "vital2000",
    "verilog",
    "std_developerskit",
    "synopsys",
    "modelsim_lib",
    "sv_std",
    "mtiavm",
    "mtiovm",
    "mtiuvm",
    "mtiupf",
    "mtipa",
    "floatfixlib",
    "osvvm",
];

const ISIM_STANDARD_LIBS: &[&str] = &[
    "std",
    "ieee",
    "ieee_proposed",
    "vl",
    "synopsys",
    "simprim",
    "unisim",
    "unimacro",
    "aim",
    "cpld",
    "pls",
    "xilinxcorelib",
    "secureip",
];

const ISE_STANDARD_LIBS: &[&str] = &["ieee", "ieee_proposed", "std", "unisim", "unimacro", "xilinxcorelib", "synopsys"];

const QUARTUS_STANDARD_LIBS: &[&str] = &["altera", "altera_mf", "altera_lnsim", "lpm", "sgate", "ieee", "std"];

const VIVADO_STANDARD_LIBS: &[&str] = &["ieee", "std"];

const LIBERO_STANDARD_LIBS: &[&str] = &["ieee", "std", "synopsys"];

/// The set of library names that are considered externally satisfied.
#[derive(Debug, PartialEq, Clone)]
pub struct StdLibs(BTreeSet<String>);

impl Default for StdLibs {
    fn default() -> Self {
        Self::from_list(DEFAULT_STANDARD_LIBS)
    }
}

impl StdLibs {
    pub fn from_list(libs: &[&str]) -> Self {
        Self(libs.iter().map(|l| l.to_lowercase()).collect())
    }

    /// Picks the built-in set for the given action and tool choice.
    pub fn select(action: Option<Action>, sim: Option<SimTool>, syn: Option<SynTool>) -> Self {
        match action {
            Some(Action::Simulation) => match sim {
                Some(SimTool::Isim) => Self::from_list(ISIM_STANDARD_LIBS),
                Some(SimTool::Modelsim) | Some(SimTool::Iverilog) => {
                    Self::from_list(MODELSIM_STANDARD_LIBS)
                }
                Some(SimTool::Ghdl) => Self::default(),
                None => {
                    tracing::warn!("could not determine simulation tool; defaulting to modelsim libraries");
                    Self::from_list(MODELSIM_STANDARD_LIBS)
                }
            },
            Some(Action::Synthesis) => match syn {
                Some(SynTool::Ise) => Self::from_list(ISE_STANDARD_LIBS),
                Some(SynTool::Quartus) => Self::from_list(QUARTUS_STANDARD_LIBS),
                Some(SynTool::Vivado) | Some(SynTool::Diamond) => {
                    Self::from_list(VIVADO_STANDARD_LIBS)
                }
                Some(SynTool::Libero) => Self::from_list(LIBERO_STANDARD_LIBS),
                None => Self::default(),
            },
            None => Self::default(),
        }
    }

    /// Collects the library names mapped in the `[Library]` section of a
    /// `modelsim.ini` file.
    pub fn from_modelsim_ini(text: &str) -> Self {
        let mut libs = BTreeSet::new();
        let mut in_library = false;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() == true || line.starts_with(';') == true {
                continue;
            }
            if line.starts_with('[') == true {
                in_library = line.eq_ignore_ascii_case("[library]");
                continue;
            }
            if in_library == false {
                continue;
            }
            if let Some((name, _)) = line.split_once('=') {
                let name = name.trim().to_lowercase();
                // `others` chains to another ini file rather than naming a library
                if name.is_empty() == false && name != "others" {
                    libs.insert(name);
                }
            }
        }
        Self(libs)
    }

    /// Reads a `modelsim.ini` file from disk.
    pub fn read_modelsim_ini(path: &Path) -> Result<Self, Fault> {
        let text = std::fs::read_to_string(path)?;
        let libs = Self::from_modelsim_ini(&text);
        match libs.0.is_empty() {
            true => Err(AnyError(format!("no libraries found in {:?}", path)))?,
            false => Ok(libs),
        }
    }

    /// Checks if `library` is a standard library (case-insensitive).
    pub fn contains(&self, library: &str) -> bool {
        self.0.contains(&library.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

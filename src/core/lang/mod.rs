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

//! Best-effort pattern scanners for HDL sources.
//!
//! Nothing here parses the languages; each scanner only looks for the handful
//! of clauses that declare or consume something another file may provide.

use std::borrow::Cow;

pub mod verilog;
pub mod vhdl;

/// Leading bytes of a source file encrypted by the Xilinx tools.
pub const ENCRYPTED_SIGNATURE: &[u8] = b"Xlx";

/// Checks if the file content carries an encrypted payload.
pub fn is_encrypted(bytes: &[u8]) -> bool {
    bytes.starts_with(ENCRYPTED_SIGNATURE)
}

/// Decodes file content as text, replacing invalid sequences.
pub fn decode(bytes: &[u8]) -> Cow<str> {
    String::from_utf8_lossy(bytes)
}

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

use once_cell::sync::Lazy;
use regex::Regex;

static INCLUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^[ \t]*`include[ \t]+"([^ "]+)""#).expect("valid regex"));

/// Finds the literal targets of every `` `include "..." `` directive.
///
/// Targets keep their case; Verilog file names are case-sensitive.
pub fn search_includes(text: &str) -> Vec<String> {
    INCLUDE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn includes() {
        let text = "\
`include \"defs.vh\"
  `include \"sub/Regs.vh\"
// `include \"commented.vh\"
`include <system.vh>
module top;
endmodule
";
        assert_eq!(
            search_includes(text),
            vec!["defs.vh".to_string(), "sub/Regs.vh".to_string()]
        );
    }

    #[test]
    fn no_includes() {
        assert_eq!(search_includes("module m; endmodule\n").is_empty(), true);
    }
}

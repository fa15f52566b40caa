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

//! Resolves the module tree of an HDL project and orders its source files for
//! compilation.
//!
//! A project is described by `Manifest.toml` files. The root manifest lists
//! the project's source files and the sub-modules it pulls in, each of which
//! may carry its own manifest. Once every module is fetched, the declared
//! files are scanned for what they provide and require, and a dependency
//! graph over them yields the order a tool should compile them in.

pub mod core;
pub mod error;
pub mod util;

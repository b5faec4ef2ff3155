// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Turns scenes into DMX frames and plays them: frame building, fades, looping sequences and the
//! engine that ties them to a sink.

pub mod animator;
pub mod engine;
pub mod fade;
pub mod frame;
pub mod mapper;
pub mod sequence;

pub use engine::{Engine, EngineError, Outcome};

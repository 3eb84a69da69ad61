// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ready-made schemas built on the core framework.

pub mod math;

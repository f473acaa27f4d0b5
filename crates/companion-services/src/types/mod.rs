// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Transport-agnostic types shared by every service.
*/

pub mod dtos;
pub mod errors;
pub mod period;

pub use dtos::*;
pub use errors::*;
pub use period::Period;

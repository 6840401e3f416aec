// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod call;
pub mod health;
pub mod serve;
pub mod status;

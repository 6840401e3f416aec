// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::format_duration;
use std::time::Duration;

#[yare::parameterized(
    zero             = { 0,          "0ms" },
    millis           = { 250,        "250ms" },
    one_second       = { 1_000,      "1s" },
    fractional       = { 1_500,      "1.5s" },
    max_seconds      = { 59_999,     "59.9s" },
    one_minute       = { 60_000,     "1m" },
    one_hour         = { 3_600_000,  "1h" },
    hour_and_minutes = { 3_900_000,  "1h5m" },
    two_days         = { 172_800_000, "2d" },
)]
fn formats(ms: u64, expected: &str) {
    assert_eq!(format_duration(Duration::from_millis(ms)), expected);
}

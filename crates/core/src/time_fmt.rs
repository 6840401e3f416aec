// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable duration formatting for logs and diagnostics.

use std::time::Duration;

/// Format a duration compactly: `"250ms"`, `"1.5s"`, `"2m"`, `"1h5m"`, `"3d"`.
///
/// Sub-minute values keep millisecond precision because timeouts and backoff
/// intervals are often below a second.
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis() as u64;
    if ms < 1000 {
        return format!("{}ms", ms);
    }
    if ms < 60_000 {
        let tenths = (ms % 1000) / 100;
        return if tenths == 0 {
            format!("{}s", ms / 1000)
        } else {
            format!("{}.{}s", ms / 1000, tenths)
        };
    }
    let secs = ms / 1000;
    if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        let h = secs / 3600;
        let m = (secs % 3600) / 60;
        if m > 0 {
            format!("{}h{}m", h, m)
        } else {
            format!("{}h", h)
        }
    } else {
        format!("{}d", secs / 86400)
    }
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;

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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Default priority for the tick thread when LIGHTDESK_THREAD_PRIORITY is unset.
const DEFAULT_TICK_THREAD_PRIORITY: u8 = 60;

/// Reads LIGHTDESK_THREAD_PRIORITY (0-99). Out of range or malformed values fall back
/// to the default.
pub fn tick_thread_priority() -> ThreadPriority {
    parse_priority(std::env::var("LIGHTDESK_THREAD_PRIORITY").ok().as_deref())
}

fn parse_priority(value: Option<&str>) -> ThreadPriority {
    value
        .and_then(|v| v.parse::<u8>().ok())
        .filter(|n| *n < 100)
        .and_then(|n| ThreadPriorityValue::try_from(n).ok())
        .or_else(|| ThreadPriorityValue::try_from(DEFAULT_TICK_THREAD_PRIORITY).ok())
        .map_or(ThreadPriority::Max, ThreadPriority::Crossplatform)
}

fn is_truthy(value: &str) -> bool {
    value == "1"
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("on")
}

/// Returns whether we should attempt RT (SCHED_FIFO) scheduling for the tick thread.
/// Default: enabled. Opt out with LIGHTDESK_DISABLE_RT=1.
pub fn rt_enabled() -> bool {
    !std::env::var("LIGHTDESK_DISABLE_RT")
        .ok()
        .is_some_and(|v| is_truthy(&v))
}

/// Raises the priority of the calling thread. Failures are logged and otherwise
/// ignored; the tick still runs at normal priority.
pub fn configure_tick_thread_priority(tp: ThreadPriority, rt: bool) {
    if let Err(e) = set_current_thread_priority(tp) {
        warn!(error = ?e, "Failed to raise tick thread priority");
    }

    #[cfg(unix)]
    if rt {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        let tid = thread_native_id();
        match set_thread_priority_and_policy(
            tid,
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for tick thread"),
            Err(e) => warn!(error = %e, "Failed to set RT SCHED_FIFO for tick thread"),
        }
    }
}

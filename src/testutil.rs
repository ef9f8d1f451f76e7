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

use std::{
    thread,
    time::{Duration, Instant},
};

const POLL: Duration = Duration::from_millis(2);
const GIVE_UP: Duration = Duration::from_secs(3);

/// Polls until background threads (the engine, chasers) make `condition` hold, or
/// panics with `message`.
pub fn eventually<F>(condition: F, message: &str)
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + GIVE_UP;
    while !condition() {
        assert!(Instant::now() < deadline, "{}", message);
        thread::sleep(POLL);
    }
}

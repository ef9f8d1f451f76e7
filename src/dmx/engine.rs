// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use crate::{playsync::CancelHandle, show::LightShow};

use super::thread_priority::{configure_tick_thread_priority, rt_enabled, tick_thread_priority};

/// The DMX engine. Ticks the show at a fixed rate so crossfades advance and chaser
/// output reaches the universes.
pub struct Engine {
    cancel_handle: CancelHandle,
    join_handle: Option<JoinHandle<()>>,
}

impl Engine {
    /// Starts ticking the show every `tick`.
    pub fn start(show: Arc<Mutex<LightShow>>, tick: Duration) -> Engine {
        let cancel_handle = CancelHandle::new();
        let join_handle = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                configure_tick_thread_priority(tick_thread_priority(), rt_enabled());

                let span = span!(Level::INFO, "dmx engine");
                let _enter = span.enter();
                info!(?tick, "DMX engine started.");

                let mut last_time = Instant::now();
                loop {
                    if cancel_handle.is_cancelled() {
                        break;
                    }
                    show.lock().tick(Instant::now());

                    last_time += tick;
                    let now = Instant::now();
                    if last_time < now {
                        // Fell behind; don't try to catch up with a burst of ticks.
                        last_time = now;
                    }
                    spin_sleep::sleep(last_time.saturating_duration_since(now));
                }

                info!("DMX engine stopped.");
            })
        };

        Engine {
            cancel_handle,
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.cancel_handle.cancel();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                error!("Error joining DMX engine thread");
            }
        }
    }
}

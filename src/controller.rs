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
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, error, info, span, Level};

use crate::error::ShowError;
use crate::levels;
use crate::show::LightShow;

pub mod keyboard;

/// Controller events that will trigger behavior in the show.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// Crossfades the main playback to its next step.
    Go,

    /// Crossfades the main playback back one step.
    GoBack,

    /// Crossfades the main playback to the given step.
    Goto { position: usize },

    /// Sets a user level on a channel.
    ChannelLevel { channel: u16, level: levels::Level },

    /// Releases the user level on a channel.
    ReleaseChannel { channel: u16 },

    /// Moves a fader, 0..1.
    FaderLevel {
        page: usize,
        index: usize,
        level: f64,
    },

    /// Moves an independent, 0..255.
    IndependentLevel { number: u32, level: f64 },

    /// Records the stage into a memory.
    Record { memory: f64 },
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Drives a show from a control surface.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Starts routing events from the driver into the show.
    pub fn new(show: Arc<Mutex<LightShow>>, driver: Arc<dyn Driver>) -> Controller {
        Controller {
            handle: tokio::spawn(async move { Controller::trigger_events(show, driver).await }),
        }
    }

    /// Waits for the driver to run out of events.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers show actions by watching the driver and getting events from it.
    async fn trigger_events(show: Arc<Mutex<LightShow>>, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!("Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(?event, "Console event.");
            let result = Controller::apply(&mut show.lock(), event);
            if let Err(e) = result {
                error!("Error applying event to show: {}", e);
            }
        }

        info!("Controller stopped.");
        match join_handle.await {
            Ok(Err(e)) => error!("Event monitor failed: {}", e),
            Err(e) => error!("Error waiting for event monitor to stop: {}", e),
            Ok(Ok(())) => {}
        }
    }

    fn apply(show: &mut LightShow, event: Event) -> Result<(), ShowError> {
        match event {
            Event::Go => {
                if !show.do_go() {
                    debug!("Go had no effect");
                }
            }
            Event::GoBack => {
                if !show.go_back() {
                    debug!("Go Back had no effect");
                }
            }
            Event::Goto { position } => {
                show.goto(position)?;
            }
            Event::ChannelLevel { channel, level } => show.set_channel_level(channel, level)?,
            Event::ReleaseChannel { channel } => show.clear_channel_level(channel)?,
            Event::FaderLevel { page, index, level } => show.set_fader_level(page, index, level)?,
            Event::IndependentLevel { number, level } => {
                show.set_independent_level(number, level)?
            }
            Event::Record { memory } => {
                show.record_cue(memory, "")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::{collections::BTreeMap, error::Error, io, sync::Arc};

    use parking_lot::Mutex;
    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use crate::{
        config::show::StepEntry, cue::Timing, dmx::mock::MockTransport,
        independent::Independent, show::ShowSettings, LightShow,
    };

    use super::{Controller, Driver, Event};

    /// Sends a fixed list of events, then closes.
    struct TestDriver {
        events: Mutex<Vec<Event>>,
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let events = std::mem::take(&mut *self.events.lock());
            tokio::task::spawn_blocking(move || {
                for event in events {
                    assert!(events_tx.blocking_send(event).is_ok());
                }
                Ok(())
            })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() -> Result<(), Box<dyn Error>> {
        let transport = Arc::new(MockTransport::new());
        let mut show = LightShow::new(ShowSettings::default(), transport.clone());
        show.patch_1on1();
        show.import_main_playback(&[
            StepEntry {
                memory: 1.0,
                text: String::new(),
                channels: BTreeMap::from([(1, 100)]),
                timing: Timing::default(),
                channel_time: BTreeMap::new(),
            },
            StepEntry {
                memory: 2.0,
                text: String::new(),
                channels: BTreeMap::from([(1, 200)]),
                timing: Timing::default(),
                channel_time: BTreeMap::new(),
            },
        ])?;
        show.add_independent(Independent::new(1, "", BTreeMap::from([(5, 255)])))?;
        let show = Arc::new(Mutex::new(show));

        let driver = Arc::new(TestDriver {
            events: Mutex::new(vec![
                Event::Go,
                Event::Go,
                Event::GoBack,
                Event::ChannelLevel {
                    channel: 2,
                    level: 40,
                },
                Event::ChannelLevel {
                    channel: 3,
                    level: 60,
                },
                Event::ReleaseChannel { channel: 3 },
                // Rejected by the show and logged.
                Event::ChannelLevel {
                    channel: 0,
                    level: 1,
                },
                Event::IndependentLevel {
                    number: 1,
                    level: 255.0,
                },
                Event::Record { memory: 3.0 },
            ]),
        });
        let mut controller = Controller::new(show.clone(), driver);
        assert!(controller.join().await.is_ok());

        let show = show.lock();
        assert_eq!(1, show.main().position());
        assert_eq!(100, transport.output(1, 1));
        assert_eq!(40, transport.output(1, 2));
        assert_eq!(0, transport.output(1, 3));
        assert_eq!(255, transport.output(1, 5));
        let recorded = show.cue(3.0).ok_or("cue 3 was not recorded")?;
        assert_eq!(
            &BTreeMap::from([(1, 100), (2, 40)]),
            recorded.channels()
        );
        Ok(())
    }
}

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

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;

const GO: &str = "go";
const BACK: &str = "back";
const GOTO: &str = "goto";
const CHANNEL: &str = "ch";
const RELEASE: &str = "release";
const FADER: &str = "fader";
const INDEPENDENT: &str = "ind";
const RECORD: &str = "record";

/// A controller that drives the show from typed commands.
pub struct Driver {}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Parses a command line into an event.
    fn parse(input: &str) -> Option<Event> {
        let words: Vec<&str> = input.split_whitespace().collect();
        let event = match words.as_slice() {
            [GO] => Event::Go,
            [BACK] => Event::GoBack,
            [GOTO, position] => Event::Goto {
                position: position.parse().ok()?,
            },
            [CHANNEL, channel, level] => Event::ChannelLevel {
                channel: channel.parse().ok()?,
                level: level.parse().ok()?,
            },
            [RELEASE, channel] => Event::ReleaseChannel {
                channel: channel.parse().ok()?,
            },
            [FADER, page, index, level] => Event::FaderLevel {
                page: page.parse().ok()?,
                index: index.parse().ok()?,
                level: level.parse().ok()?,
            },
            [INDEPENDENT, number, level] => Event::IndependentLevel {
                number: number.parse().ok()?,
                level: level.parse().ok()?,
            },
            [RECORD, memory] => Event::Record {
                memory: memory.parse().ok()?,
            },
            _ => return None,
        };
        Some(event)
    }

    /// Reads one command. Returns false once the input is closed.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({}, {}, {} <step>, {} <channel> <level>, {} <channel>, {} <page> <index> <0-1>, {} <number> <level>, {} <memory>): ",
            GO, BACK, GOTO, CHANNEL, RELEASE, FADER, INDEPENDENT, RECORD,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        match Self::parse(&input.trim().to_lowercase()) {
            Some(event) => events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            None => warn!(input = input.trim(), "Unrecognized input"),
        }
        Ok(true)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Reading commands from stdin.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            info!("Keyboard input closed.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::controller::{keyboard::*, Event};

    use super::Driver;

    fn get_event(event: &str) -> Result<Option<Event>, io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader_bytes = event.as_bytes();
        let reader = BufReader::new(reader_bytes);

        let writer_bytes: Vec<u8> = vec![0; 255];
        let writer = BufWriter::new(writer_bytes);
        Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok(receiver.blocking_recv())
    }

    #[test]
    fn test_keyboard_commands() -> Result<(), io::Error> {
        assert_eq!(Event::Go, get_event(GO)?.unwrap());
        assert_eq!(Event::GoBack, get_event("BACK\n")?.unwrap());
        assert_eq!(Event::Goto { position: 3 }, get_event("goto 3")?.unwrap());
        assert_eq!(
            Event::ChannelLevel {
                channel: 12,
                level: 200
            },
            get_event("ch 12 200")?.unwrap()
        );
        assert_eq!(
            Event::ReleaseChannel { channel: 12 },
            get_event("release 12")?.unwrap()
        );
        assert_eq!(
            Event::FaderLevel {
                page: 0,
                index: 2,
                level: 0.5
            },
            get_event("fader 0 2 0.5")?.unwrap()
        );
        assert_eq!(
            Event::IndependentLevel {
                number: 4,
                level: 255.0
            },
            get_event("ind 4 255")?.unwrap()
        );
        assert_eq!(Event::Record { memory: 1.5 }, get_event("record 1.5")?.unwrap());
        assert_eq!(None, get_event("unrecognized")?);
        assert_eq!(None, get_event("ch 12 300")?);
        assert_eq!(None, get_event("ch twelve 10")?);
        Ok(())
    }

    #[test]
    fn test_closed_input() -> Result<(), io::Error> {
        let (sender, _receiver) = mpsc::channel::<Event>(1);
        assert!(!Driver::monitor_io(&sender, BufReader::new(&b""[..]), Vec::new())?);
        Ok(())
    }
}

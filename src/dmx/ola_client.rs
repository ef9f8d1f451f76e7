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

use std::error::Error;
use std::net::TcpStream;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use ola::client::StreamingClientConfig;
use ola::{DmxBuffer, StreamingClient};
use tracing::{debug, error, info};

use crate::levels::UNIVERSE_SIZE;

use super::Transport;

/// How many times to try reaching olad before giving up.
const CONNECT_ATTEMPTS: usize = 10;

/// How long to wait between connection attempts.
const CONNECT_RETRY: Duration = Duration::from_secs(5);

/// Trait for OLA client functionality
pub trait OlaClient: Send {
    /// Send DMX data to a universe
    fn send_dmx(&mut self, universe: u32, buffer: &DmxBuffer) -> Result<(), Box<dyn Error>>;
}

/// Real OLA client implementation
struct RealOlaClient {
    client: StreamingClient<TcpStream>,
}

impl OlaClient for RealOlaClient {
    fn send_dmx(&mut self, universe: u32, buffer: &DmxBuffer) -> Result<(), Box<dyn Error>> {
        self.client.send_dmx(universe, buffer)?;
        Ok(())
    }
}

/// A frame on its way to the sender thread.
struct DmxMessage {
    universe: u32,
    buffer: DmxBuffer,
}

/// Sends frames to olad. Frames are handed to a dedicated sender thread so a slow
/// socket never holds up a tick.
pub struct OlaTransport {
    sender: Option<Sender<DmxMessage>>,
    client_handle: Option<JoinHandle<()>>,
}

impl OlaTransport {
    /// Connects to olad on the given port, retrying for a while if it is not up yet.
    pub fn connect(server_port: u16) -> Result<OlaTransport, Box<dyn Error>> {
        let config = StreamingClientConfig {
            server_port,
            ..Default::default()
        };

        for i in 0..CONNECT_ATTEMPTS {
            // Don't sleep on the first iteration.
            if i > 0 {
                thread::sleep(CONNECT_RETRY);
            }

            if let Ok(client) = ola::connect_with_config(config.clone()) {
                info!(port = server_port, "Connected to OLA.");
                return Ok(OlaTransport::with_client(Box::new(RealOlaClient { client })));
            }

            debug!("Error connecting to OLA, waiting 5 seconds and trying again.");
        }
        Err("unable to connect to OLA".into())
    }

    /// Starts the sender thread over the given client.
    pub fn with_client(client: Box<dyn OlaClient>) -> OlaTransport {
        let (sender, receiver) = crossbeam_channel::unbounded::<DmxMessage>();
        let client_handle = thread::spawn(move || Self::ola_thread(client, receiver));
        OlaTransport {
            sender: Some(sender),
            client_handle: Some(client_handle),
        }
    }

    fn ola_thread(mut client: Box<dyn OlaClient>, receiver: Receiver<DmxMessage>) {
        while let Ok(message) = receiver.recv() {
            if let Err(err) = client.send_dmx(message.universe, &message.buffer) {
                error!(
                    universe = message.universe,
                    "error sending DMX to OLA: {}", err
                )
            }
        }
    }
}

impl Transport for OlaTransport {
    fn send(&self, universe: u16, frame: &[u8; UNIVERSE_SIZE]) {
        let Some(sender) = &self.sender else {
            return;
        };
        let mut buffer = DmxBuffer::new();
        for (slot, level) in frame.iter().enumerate() {
            buffer.set_channel(slot, *level);
        }
        if sender
            .send(DmxMessage {
                universe: u32::from(universe),
                buffer,
            })
            .is_err()
        {
            error!(universe, "OLA sender thread has exited");
        }
    }
}

impl Drop for OlaTransport {
    fn drop(&mut self) {
        // Closing the channel ends the sender thread.
        self.sender.take();
        if let Some(client_handle) = self.client_handle.take() {
            if client_handle.join().is_err() {
                error!("Error joining OLA sender thread");
            }
        }
    }
}

//! TCP UI link
//!
//! Each client gets a reader thread that turns frames into inbound
//! commands and a writer thread that frames every reply, event and sample
//! sent to it.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};

use resistrig_protocol::{FrameParser, RigMessage, UiMessage};

use crate::error::HostError;
use crate::runtime::Inbound;

/// Listen on `bind` and serve clients until the control loop goes away
pub fn spawn(
    bind: &str,
    inbound: Sender<Inbound>,
) -> Result<(SocketAddr, JoinHandle<()>), HostError> {
    let link_error = |source| HostError::Link {
        addr: bind.to_string(),
        source,
    };
    let listener = TcpListener::bind(bind).map_err(link_error)?;
    let addr = listener.local_addr().map_err(link_error)?;
    info!("UI link listening on {}", addr);

    let handle = thread::Builder::new()
        .name("ui-link".into())
        .spawn(move || accept_loop(listener, inbound))
        .map_err(link_error)?;
    Ok((addr, handle))
}

fn accept_loop(listener: TcpListener, inbound: Sender<Inbound>) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("UI link accept failed: {}", e);
                continue;
            }
        };
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".into());
        info!("UI client {} connected", peer);

        let (out_tx, out_rx) = unbounded();
        if inbound.send(Inbound::Subscribe(out_tx.clone())).is_err() {
            // Control loop has stopped
            return;
        }
        let writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(e) => {
                warn!("UI client {}: {}", peer, e);
                continue;
            }
        };
        let _ = thread::Builder::new()
            .name(format!("ui-tx-{peer}"))
            .spawn(move || write_loop(writer, out_rx));
        let inbound = inbound.clone();
        let _ = thread::Builder::new()
            .name(format!("ui-rx-{peer}"))
            .spawn(move || read_loop(stream, inbound, out_tx, peer));
    }
}

fn read_loop(mut stream: TcpStream, inbound: Sender<Inbound>, out: Sender<RigMessage>, peer: String) {
    let mut parser = FrameParser::new();
    let mut buf = [0u8; 512];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("UI client {}: {}", peer, e);
                break;
            }
        };
        for &byte in &buf[..n] {
            let frame = match parser.feed(byte) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    warn!("UI client {}: bad frame {:?}", peer, e);
                    continue;
                }
            };
            match UiMessage::from_frame(&frame) {
                Ok(UiMessage::Command(command)) => {
                    let message = Inbound::Command {
                        command,
                        reply: out.clone(),
                    };
                    if inbound.send(message).is_err() {
                        return;
                    }
                }
                Ok(UiMessage::Ping) => {
                    let _ = out.send(RigMessage::Pong);
                }
                Err(e) => warn!("UI client {}: {:?}", peer, e),
            }
        }
    }
    info!("UI client {} disconnected", peer);
    let _ = stream.shutdown(std::net::Shutdown::Both);
}

fn write_loop(mut stream: TcpStream, messages: Receiver<RigMessage>) {
    for message in messages {
        let bytes = match message.to_frame().and_then(|f| Ok(f.encode_to_vec()?)) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("cannot frame {:?}: {:?}", message, e);
                continue;
            }
        };
        if let Err(e) = stream.write_all(&bytes) {
            debug!("UI writer stopping: {}", e);
            break;
        }
    }
}

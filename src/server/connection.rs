//! KVST - Per-Connection Request Pipeline
//! Drains one TCP connection to completion: read header, validate, read
//! body, dispatch, respond, loop. Serial within a connection, so responses
//! are emitted in the same order as the requests that produced them.
//!
//! Grounded on the reference implementation's `handle_client`/
//! `handle_command` (raw sockets, `recv`/`send`), translated to
//! `std::net::TcpStream` and `Result`-based error propagation.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use crate::durability::AolWriter;
use crate::error::KvError;
use crate::metrics::ServerMetrics;
use crate::protocol::{self, Command, Status, HEADER_SIZE};
use crate::store::ShardedMap;

/// Shared collaborators every connection needs. Cheap to clone (all `Arc`).
#[derive(Clone)]
pub struct ConnectionContext {
    pub map: Arc<ShardedMap>,
    pub writer: Arc<Mutex<AolWriter>>,
    pub metrics: Arc<ServerMetrics>,
    /// Called when the AOL writer hits an I/O error. The log is now of
    /// unknown consistency, so this escalates to a full server shutdown
    /// rather than staying isolated to the connection (§7).
    pub trigger_fatal_shutdown: Arc<dyn Fn() + Send + Sync>,
}

/// Drain `stream` to completion, one request/response exchange at a time,
/// until the client closes the connection or a protocol violation ends it.
pub fn handle_connection(mut stream: TcpStream, ctx: ConnectionContext) {
    ctx.metrics.record_connection_opened();
    loop {
        match read_one_request(&mut stream, &ctx) {
            Ok(true) => continue,
            Ok(false) => break,
            Err(err) => {
                log::warn!("connection error: {err}");
                break;
            }
        }
    }
    ctx.metrics.record_connection_closed();
}

/// Returns `Ok(true)` if a request was handled and the loop should
/// continue, `Ok(false)` if the peer closed the connection cleanly
/// (EOF at byte 0 of a header), and `Err` on any I/O failure writing
/// the response (which always ends the connection).
fn read_one_request(stream: &mut TcpStream, ctx: &ConnectionContext) -> std::io::Result<bool> {
    let mut header_buf = [0u8; HEADER_SIZE];
    match read_fully_or_eof(stream, &mut header_buf)? {
        ReadOutcome::Eof => return Ok(false),
        ReadOutcome::Partial => {
            send_error(stream, 0, Status::ProtocolError)?;
            return Ok(false);
        }
        ReadOutcome::Complete => {}
    }

    // Sequence id lives at a fixed offset regardless of whether the rest
    // of the header validates, so error responses can still echo it (P3).
    let sequence_id = u16::from_be_bytes(header_buf[14..16].try_into().unwrap());

    let header = match protocol::decode_request_header(&header_buf) {
        Ok(header) => header,
        Err(KvError::InvalidCommand(reason)) => {
            log::debug!("invalid command from {:?}: {reason}", stream.peer_addr());
            ctx.metrics.record_protocol_error();
            send_error(stream, sequence_id, Status::InvalidCommand)?;
            return Ok(false);
        }
        Err(_) => {
            log::debug!("protocol error from {:?}", stream.peer_addr());
            ctx.metrics.record_protocol_error();
            send_error(stream, sequence_id, Status::ProtocolError)?;
            return Ok(false);
        }
    };

    let mut key = vec![0u8; header.key_length as usize];
    if !matches!(read_fully_or_eof(stream, &mut key)?, ReadOutcome::Complete) {
        ctx.metrics.record_protocol_error();
        send_error(stream, sequence_id, Status::ProtocolError)?;
        return Ok(false);
    }

    let mut value = vec![0u8; header.value_length as usize];
    if !matches!(read_fully_or_eof(stream, &mut value)?, ReadOutcome::Complete) {
        ctx.metrics.record_protocol_error();
        send_error(stream, sequence_id, Status::ProtocolError)?;
        return Ok(false);
    }

    dispatch(stream, ctx, sequence_id, header.command, key, value)?;
    Ok(true)
}

fn dispatch(
    stream: &mut TcpStream,
    ctx: &ConnectionContext,
    sequence_id: u16,
    command: Command,
    key: Vec<u8>,
    value: Vec<u8>,
) -> std::io::Result<()> {
    match command {
        Command::Get => {
            ctx.metrics.gets.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            match ctx.map.get(&key) {
                Some(value) => send_ok(stream, sequence_id, &value),
                None => send_error(stream, sequence_id, Status::KeyNotFound),
            }
        }
        Command::Set => {
            ctx.metrics.sets.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            // Logging precedes the map mutation: a crash between the two
            // cannot leave an acknowledged state unrecorded (§4.5).
            match ctx.writer.lock().expect("aol writer lock poisoned").log_set(&key, &value) {
                Ok(()) => {
                    ctx.metrics.record_aol_write();
                    ctx.map.set(key, value);
                    send_ok(stream, sequence_id, &[])
                }
                Err(err) => {
                    log::error!("AOL write failed, triggering shutdown: {err}");
                    (ctx.trigger_fatal_shutdown)();
                    send_error(stream, sequence_id, Status::InternalError)
                }
            }
        }
        Command::Delete => {
            ctx.metrics.deletes.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            // The map consult determines whether a mutation occurs at all;
            // a DELETE of an absent key is never logged (§4.5, §9).
            if ctx.map.remove(&key) {
                match ctx.writer.lock().expect("aol writer lock poisoned").log_delete(&key) {
                    Ok(()) => {
                        ctx.metrics.record_aol_write();
                        send_ok(stream, sequence_id, &[])
                    }
                    Err(err) => {
                        log::error!("AOL write failed, triggering shutdown: {err}");
                        (ctx.trigger_fatal_shutdown)();
                        send_error(stream, sequence_id, Status::InternalError)
                    }
                }
            } else {
                send_error(stream, sequence_id, Status::KeyNotFound)
            }
        }
        Command::Ping => {
            ctx.metrics.pings.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            send_ok(stream, sequence_id, &[])
        }
    }
}

fn send_ok(stream: &mut TcpStream, sequence_id: u16, payload: &[u8]) -> std::io::Result<()> {
    let bytes = protocol::encode_response(sequence_id, Status::Ok, payload);
    stream.write_all(&bytes)
}

fn send_error(stream: &mut TcpStream, sequence_id: u16, status: Status) -> std::io::Result<()> {
    let bytes = protocol::encode_response(sequence_id, status, &[]);
    stream.write_all(&bytes)
}

enum ReadOutcome {
    Eof,
    Partial,
    Complete,
}

fn read_fully_or_eof(stream: &mut TcpStream, buf: &mut [u8]) -> std::io::Result<ReadOutcome> {
    if buf.is_empty() {
        return Ok(ReadOutcome::Complete);
    }
    let mut total = 0;
    while total < buf.len() {
        let n = stream.read(&mut buf[total..])?;
        if n == 0 {
            return Ok(if total == 0 {
                ReadOutcome::Eof
            } else {
                ReadOutcome::Partial
            });
        }
        total += n;
    }
    Ok(ReadOutcome::Complete)
}

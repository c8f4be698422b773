//! Framing for the helper-process UI channel.
//!
//! Each message is one opcode byte, optionally followed by a 4-byte big-endian
//! integer:
//!
//! | opcode | payload | meaning                       |
//! |--------|---------|-------------------------------|
//! | `0`    | none    | complete (end of input too)   |
//! | `1`    | `u32`   | expected total size in bytes  |
//! | `2`    | `u32`   | bytes transferred so far      |

use crate::ui::LoaderUi;
use std::io::{self, Read, Write};
use tracing::debug;

pub const OP_COMPLETE: u8 = 0;
pub const OP_SET_DOWNLOAD_SIZE: u8 = 1;
pub const OP_SET_DOWNLOADED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMessage {
    Complete,
    SetDownloadSize(u32),
    SetDownloaded(u32),
}

impl UiMessage {
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            UiMessage::Complete => vec![OP_COMPLETE],
            UiMessage::SetDownloadSize(bytes) => framed(OP_SET_DOWNLOAD_SIZE, bytes),
            UiMessage::SetDownloaded(bytes) => framed(OP_SET_DOWNLOADED, bytes),
        }
    }

    /// Write the whole frame in a single call so a dead pipe fails on the frame it belongs to
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.encode())?;
        writer.flush()
    }
}

fn framed(opcode: u8, value: u32) -> Vec<u8> {
    let mut frame = Vec::with_capacity(5);
    frame.push(opcode);
    frame.extend_from_slice(&value.to_be_bytes());
    frame
}

/// Outcome of reading one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Message(UiMessage),
    /// Opcode this side does not understand; skipped
    Unknown(u8),
    EndOfInput,
}

/// Read the next frame. A frame cut off inside its payload is an `UnexpectedEof` error.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Frame> {
    let mut opcode = [0u8; 1];
    loop {
        match reader.read(&mut opcode) {
            Ok(0) => return Ok(Frame::EndOfInput),
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    let message = match opcode[0] {
        OP_COMPLETE => UiMessage::Complete,
        OP_SET_DOWNLOAD_SIZE => UiMessage::SetDownloadSize(read_u32(reader)?),
        OP_SET_DOWNLOADED => UiMessage::SetDownloaded(read_u32(reader)?),
        other => return Ok(Frame::Unknown(other)),
    };
    Ok(Frame::Message(message))
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Drive `ui` from a framed stream until completion.
///
/// Calls `start` first and `complete` exactly once at the end, whether the stream
/// ends with an explicit complete, plain end of input, or a read error.
pub fn serve<R: Read>(mut reader: R, ui: &mut dyn LoaderUi) -> io::Result<()> {
    ui.start();

    loop {
        let frame = match read_frame(&mut reader) {
            Ok(frame) => frame,
            Err(e) => {
                ui.complete();
                return Err(e);
            }
        };

        match frame {
            Frame::Message(UiMessage::Complete) | Frame::EndOfInput => {
                ui.complete();
                return Ok(());
            }
            Frame::Message(UiMessage::SetDownloadSize(bytes)) => ui.set_download_size(bytes),
            Frame::Message(UiMessage::SetDownloaded(bytes)) => ui.set_downloaded(bytes),
            Frame::Unknown(opcode) => debug!(opcode, "Ignoring unknown UI opcode"),
        }
    }
}

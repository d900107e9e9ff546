use bytes::BytesMut;
use std::{
    fmt::{self, Write},
    io, str,
};
use tokio_util::codec::{Decoder, Encoder};

use super::command::Command;
use super::response::Response;

/// Every QIS reply ends with a fresh prompt.
pub(crate) const PROMPT: &[u8] = b"\r\n>";

#[derive(Default)]
pub struct QisCodec {
    // Bytes already scanned for a prompt, so partial frames are not rescanned.
    scanned: usize,
}

impl QisCodec {
    fn find_prompt(&self, src: &BytesMut) -> Option<usize> {
        let start = self.scanned.saturating_sub(PROMPT.len() - 1).min(src.len());
        src[start..]
            .windows(PROMPT.len())
            .position(|w| w == PROMPT)
            .map(|n| n + start)
    }

    fn convert_string(payload: impl AsRef<[u8]>) -> io::Result<String> {
        Ok(str::from_utf8(payload.as_ref())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
            .to_string())
    }
}

impl Decoder for QisCodec {
    type Item = Response;
    // A FAIL reply still decodes fine. Whether it is an error is up to
    // the caller, so only framing problems surface here.
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.find_prompt(src) {
            Some(n) => {
                let frame = src.split_to(n + PROMPT.len());
                self.scanned = 0;
                let text = Self::convert_string(&frame[..n])?;
                Ok(Some(Response::parse(&text)))
            }
            None => {
                self.scanned = src.len();
                Ok(None)
            }
        }
    }
}

fn write_fmt_guarded(dst: &mut BytesMut, args: fmt::Arguments<'_>) -> Result<(), io::Error> {
    dst.write_fmt(args)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

impl Encoder<Command> for QisCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        write_fmt_guarded(dst, format_args!("{}\r\n", item))
    }
}

use std::io::{self, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use collateral_core::{Clipboard, ClipboardError};

/// Terminal clipboard through the OSC 52 escape sequence. Terminals that do
/// not support it ignore the sequence silently.
pub struct Osc52Clipboard<W> {
    out: W,
}

impl Osc52Clipboard<io::Stderr> {
    pub fn stderr() -> Self {
        Self { out: io::stderr() }
    }
}

impl<W: Write> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
}

impl<W: Write> Clipboard for Osc52Clipboard<W> {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.out
            .write_all(osc52_sequence(text).as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|error| ClipboardError(error.to_string()))
    }
}

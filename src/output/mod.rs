//! Rendering of finished cycles. Nothing here feeds back into sampling.

pub mod json;
pub mod table;

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};

use crate::system::snapshot::Report;

pub const HEADER: &str = concat!("treetop v", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Table,
    Json,
}

pub fn render(report: &Report, format: Format) -> String {
    match format {
        Format::Table => table::render(report),
        Format::Json => json::render(report),
    }
}

/// Writes one rendered report per cycle to `out`.
pub struct Emitter<W: Write> {
    out: W,
    format: Format,
    clear_screen: bool,
}

impl<W: Write> Emitter<W> {
    /// `clear_screen` homes the cursor and wipes the terminal before every
    /// table; it is ignored for JSON.
    pub fn new(out: W, format: Format, clear_screen: bool) -> Self {
        Emitter {
            out,
            format,
            clear_screen: clear_screen && format == Format::Table,
        }
    }

    pub fn emit(&mut self, report: &Report) -> io::Result<()> {
        if self.clear_screen {
            execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        self.out.write_all(render(report, self.format).as_bytes())?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

//! Terminal touch pad: the mouse is the finger.

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
        MouseEventKind,
    },
    execute, queue,
    style::Print,
    terminal::{
        self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
        enable_raw_mode,
    },
};
use std::io::{Stdout, Write, stdout};
use std::time::Duration;

use crate::Result;
use crate::engine::SynthEngine;
use crate::pad::{PadEvent, PadGrid, PadMapping};
use crate::sink::AudioSink;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

struct TerminalGuard {
    out: Stdout,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        let mut out = stdout();
        enable_raw_mode()?;
        execute!(out, EnterAlternateScreen, EnableMouseCapture, Hide)?;
        Ok(Self { out })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show, DisableMouseCapture, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

pub struct PadView {
    grid: PadGrid,
    mapping: PadMapping,
    width: u16,
    height: u16,
    status: String,
}

impl PadView {
    pub fn new(grid: PadGrid, mapping: PadMapping) -> Self {
        Self {
            grid,
            mapping,
            width: 0,
            height: 0,
            status: "press and drag to play, q to quit".into(),
        }
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        self.width = cols;
        // last line is the status bar
        self.height = rows.saturating_sub(1);
    }

    fn draw(&self, out: &mut Stdout) -> Result<()> {
        queue!(out, Clear(ClearType::All))?;
        let columns = self.grid.column_lines(self.width);
        let rows = self.grid.row_lines(self.height);

        for y in 0..self.height {
            let line: String = (0..self.width)
                .map(|x| {
                    let edge_x = x == 0 || x + 1 == self.width;
                    let edge_y = y == 0 || y + 1 == self.height;
                    match (edge_x, edge_y) {
                        (true, true) => '+',
                        (true, false) => '|',
                        (false, true) => '-',
                        _ if columns.contains(&x) => ':',
                        _ if rows.contains(&y) => '.',
                        _ => ' ',
                    }
                })
                .collect();
            queue!(out, MoveTo(0, y), Print(line))?;
        }
        queue!(out, MoveTo(0, self.height), Print(&self.status))?;
        out.flush()?;
        Ok(())
    }

    fn to_event(&self, kind: MouseEventKind, col: u16, row: u16) -> Option<PadEvent> {
        let row = row.min(self.height.saturating_sub(1));
        let (x, y) = PadGrid::locate(col, row, self.width, self.height);
        match kind {
            MouseEventKind::Down(MouseButton::Left) => Some(PadEvent::down(x, y)),
            MouseEventKind::Drag(MouseButton::Left) => Some(PadEvent::moved(x, y)),
            MouseEventKind::Up(MouseButton::Left) => Some(PadEvent::Up),
            _ => None,
        }
    }

    fn describe<S: AudioSink + 'static>(&self, engine: &SynthEngine<S>, event: PadEvent) -> String {
        match event {
            PadEvent::Down { x, y } | PadEvent::Move { x, y } => {
                let (pitch, _) = self.mapping.map(x, y);
                format!(
                    "{} Hz  {:?}  backlog {}",
                    engine.config().absolute_pitch(pitch),
                    self.grid.nearest_family(x),
                    engine.pending_len()
                )
            }
            PadEvent::Up => "released".into(),
        }
    }
}

/// Runs the pad until the user quits. Engine errors are shown in the status
/// line rather than ending the session.
pub fn run<S: AudioSink + 'static>(engine: &mut SynthEngine<S>) -> Result<()> {
    let mut guard = TerminalGuard::enter()?;
    let mut view = PadView::new(
        PadGrid::for_octaves(engine.config().num_octaves),
        PadMapping::default(),
    );
    let (cols, rows) = terminal::size()?;
    view.resize(cols, rows);
    view.draw(&mut guard.out)?;

    loop {
        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    break;
                }
            }
            Event::Mouse(mouse) => {
                if let Some(pad_event) = view.to_event(mouse.kind, mouse.column, mouse.row) {
                    view.status = match view.mapping.apply(engine, pad_event) {
                        Ok(()) => view.describe(engine, pad_event),
                        Err(e) => {
                            tracing::warn!(%e, "pad event failed");
                            format!("error: {e}")
                        }
                    };
                    queue!(
                        guard.out,
                        MoveTo(0, view.height),
                        Clear(ClearType::CurrentLine),
                        Print(&view.status)
                    )?;
                    guard.out.flush()?;
                }
            }
            Event::Resize(cols, rows) => {
                view.resize(cols, rows);
                view.draw(&mut guard.out)?;
            }
            _ => {}
        }
    }

    engine.stop()?;
    Ok(())
}

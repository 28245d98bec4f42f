// src/render/terminal.rs
//! Terminal renderer: mirrored stereo bars drawn with ratatui.

use std::{
    io::{self, Stdout},
    time::Duration,
};

use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::Color,
    widgets::Widget,
    Terminal,
};
use tracing::debug;

use crate::{
    audio::Channel,
    config::LayoutConfig,
    error::{BandscopeError, Result},
    logging::StderrGate,
};

use super::{Geometry, Renderer, RendererSignal};

/// Block characters for the top of an upward bar, one per eighth.
const RISING: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Horizontal placement of bars inside an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarLayout {
    /// Bar width in cells
    pub box_size: u16,
    /// Gap between bars
    pub box_margin: u16,
    /// Empty columns before the first bar
    pub padding: u16,
}

impl BarLayout {
    pub fn from_config(layout: &LayoutConfig) -> Self {
        Self {
            box_size: layout.box_size,
            box_margin: layout.box_margin,
            padding: layout.padding,
        }
    }

    /// Column offset of bar `i` from the left edge of the output.
    pub fn bar_x(&self, i: usize) -> usize {
        self.padding as usize + i * (self.box_size + self.box_margin) as usize
    }
}

/// Left channel rising from the vertical center, right channel hanging below it.
///
/// Bar values are measured in rows and clipped to half the area height.
pub struct SpectrumWidget<'a> {
    pub left: &'a [f32],
    pub right: &'a [f32],
    pub layout: BarLayout,
}

impl SpectrumWidget<'_> {
    fn column(&self, area: Rect, buf: &mut Buffer, x: u16, value: f32, rising: bool) {
        let half = area.height / 2;
        if half == 0 {
            return;
        }
        let value = value.clamp(0.0, f32::from(half));
        let full = value.floor() as u16;
        let frac = value - f32::from(full);
        let center = area.y + half;

        for k in 0..half {
            let symbol = if k < full {
                '█'
            } else if k == full {
                if rising {
                    match (frac * 8.0) as usize {
                        0 => continue,
                        n => RISING[(n - 1).min(7)],
                    }
                } else if frac >= 0.75 {
                    '█'
                } else if frac >= 0.375 {
                    '▀'
                } else if frac >= 0.125 {
                    '▔'
                } else {
                    continue;
                }
            } else {
                break;
            };

            let y = if rising { center - 1 - k } else { center + k };
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_char(symbol).set_fg(if rising {
                    Color::White
                } else {
                    Color::Gray
                });
            }
        }
    }
}

impl Widget for SpectrumWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 2 || area.width == 0 {
            return;
        }
        let bars = self.left.len().max(self.right.len());
        for i in 0..bars {
            let start = self.layout.bar_x(i);
            for dx in 0..self.layout.box_size as usize {
                let offset = start + dx;
                if offset >= area.width as usize {
                    return;
                }
                let x = area.x + offset as u16;
                if let Some(&v) = self.left.get(i) {
                    self.column(area, buf, x, v, true);
                }
                if let Some(&v) = self.right.get(i) {
                    self.column(area, buf, x, v, false);
                }
            }
        }
    }
}

/// Bars staged for one output during a frame.
#[derive(Default)]
struct StagedOutput {
    geometry: Geometry,
    left: Vec<f32>,
    right: Vec<f32>,
}

/// Full-screen crossterm terminal showing one or more outputs.
pub struct TerminalRenderer {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    layout: BarLayout,
    /// Fixed output regions; empty means the whole terminal
    configured: Vec<Geometry>,
    staged: Vec<StagedOutput>,
    active: bool,
    /// Log output held back until the terminal is restored
    logs: Option<StderrGate>,
}

impl TerminalRenderer {
    /// Enter raw mode and the alternate screen.
    pub fn new(layout: &LayoutConfig) -> Result<Self> {
        enable_raw_mode().map_err(render_err)?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide).map_err(render_err)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend).map_err(render_err)?;

        Ok(Self {
            terminal,
            layout: BarLayout::from_config(layout),
            configured: layout.outputs.clone(),
            staged: Vec::new(),
            active: true,
            logs: None,
        })
    }

    /// Hold `gate` while the alternate screen is up.
    pub fn hold_logs(mut self, gate: StderrGate) -> Self {
        gate.hold();
        self.logs = Some(gate);
        self
    }

    fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        let restored = disable_raw_mode()
            .and_then(|()| execute!(self.terminal.backend_mut(), LeaveAlternateScreen, Show))
            .map_err(render_err);
        if let Some(gate) = self.logs.take() {
            gate.release();
        }
        restored
    }
}

impl Renderer for TerminalRenderer {
    fn outputs(&mut self) -> Result<Vec<Geometry>> {
        if !self.configured.is_empty() {
            return Ok(self.configured.clone());
        }
        let size = self.terminal.size().map_err(render_err)?;
        Ok(vec![Geometry::new(0, 0, size.width, size.height)])
    }

    fn begin_frame(&mut self) -> Result<()> {
        for output in &mut self.staged {
            output.left.clear();
            output.right.clear();
        }
        Ok(())
    }

    fn draw(
        &mut self,
        output: usize,
        geometry: &Geometry,
        channel: Channel,
        bars: &[f32],
    ) -> Result<()> {
        if self.staged.len() <= output {
            self.staged.resize_with(output + 1, StagedOutput::default);
        }
        let staged = &mut self.staged[output];
        staged.geometry = *geometry;
        let target = match channel {
            Channel::Left => &mut staged.left,
            Channel::Right => &mut staged.right,
        };
        target.clear();
        target.extend_from_slice(bars);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        let layout = self.layout;
        let staged = &self.staged;
        self.terminal
            .draw(|f| {
                let screen = f.area();
                for output in staged {
                    let g = output.geometry;
                    let area = Rect::new(g.x, g.y, g.width, g.height).intersection(screen);
                    f.render_widget(
                        SpectrumWidget {
                            left: &output.left,
                            right: &output.right,
                            layout,
                        },
                        area,
                    );
                }
            })
            .map_err(render_err)?;
        Ok(())
    }

    fn poll(&mut self) -> Result<RendererSignal> {
        let mut signal = RendererSignal::None;
        while event::poll(Duration::ZERO).map_err(render_err)? {
            match event::read().map_err(render_err)? {
                CEvent::Key(key) if is_quit(&key) => return Ok(RendererSignal::Quit),
                CEvent::Resize(width, height) => {
                    debug!(width, height, "terminal resized");
                    self.terminal.autoresize().map_err(render_err)?;
                    self.staged.clear();
                    if self.configured.is_empty() {
                        signal = RendererSignal::Resized;
                    }
                }
                _ => {}
            }
        }
        Ok(signal)
    }

    fn finish(&mut self) -> Result<()> {
        self.restore()
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn render_err(e: io::Error) -> BandscopeError {
    BandscopeError::Render(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: BarLayout = BarLayout {
        box_size: 1,
        box_margin: 1,
        padding: 0,
    };

    fn render(left: &[f32], right: &[f32], width: u16, height: u16) -> Buffer {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        SpectrumWidget {
            left,
            right,
            layout: LAYOUT,
        }
        .render(area, &mut buf);
        buf
    }

    #[test]
    fn test_left_rises_right_hangs() {
        let buf = render(&[2.0], &[1.0], 2, 8);
        // center is row 4
        assert_eq!(buf[(0, 3)].symbol(), "█");
        assert_eq!(buf[(0, 2)].symbol(), "█");
        assert_eq!(buf[(0, 1)].symbol(), " ");
        assert_eq!(buf[(0, 4)].symbol(), "█");
        assert_eq!(buf[(0, 5)].symbol(), " ");
    }

    #[test]
    fn test_partial_cells_use_eighths() {
        let buf = render(&[1.5], &[0.5], 1, 8);
        assert_eq!(buf[(0, 3)].symbol(), "█");
        assert_eq!(buf[(0, 2)].symbol(), "▄");
        assert_eq!(buf[(0, 4)].symbol(), "▀");
    }

    #[test]
    fn test_values_clip_to_half_height() {
        let buf = render(&[100.0], &[100.0], 1, 4);
        for y in 0..4 {
            assert_eq!(buf[(0, y)].symbol(), "█");
        }
    }

    #[test]
    fn test_bars_follow_layout_spacing() {
        let buf = render(&[1.0, 1.0], &[], 4, 4);
        assert_eq!(buf[(0, 1)].symbol(), "█");
        assert_eq!(buf[(1, 1)].symbol(), " ");
        assert_eq!(buf[(2, 1)].symbol(), "█");
    }

    #[test]
    fn test_quit_keys() {
        let q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        assert!(is_quit(&q));
        assert!(is_quit(&ctrl_c));
        assert!(!is_quit(&c));
    }
}

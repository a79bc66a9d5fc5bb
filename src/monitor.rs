//! Full-screen monitor: command entry, exchange log and live board state.
//!
//! Besides protocol lines, `!load <ohms>` and `!load open` change the
//! simulated load. Esc leaves the monitor.

use crate::SimSession;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::LevelFilter;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;

enum Entry {
    Sent(String),
    Reply(String),
    Note(String),
}

#[derive(Default)]
struct MonitorApp {
    input: String,
    entries: Vec<Entry>,
}

impl MonitorApp {
    fn submit(&mut self, session: &mut SimSession) {
        let line = std::mem::take(&mut self.input);
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        if let Some(arg) = line.strip_prefix("!load") {
            let arg = arg.trim();
            let load = if arg.eq_ignore_ascii_case("open") {
                Some(None)
            } else {
                arg.parse::<f64>().ok().filter(|ohms| *ohms >= 0.0).map(Some)
            };
            match load {
                Some(load) => {
                    session.instrument_mut().front_end_mut().set_load_ohms(load);
                    self.entries.push(Entry::Note(format!("load set to {}", describe_load(load))));
                }
                None => self.entries.push(Entry::Note(format!("invalid load '{}'", arg))),
            }
            return;
        }

        self.entries.push(Entry::Sent(line.to_string()));
        if let Some(reply) = session.handle_line(line) {
            self.entries.push(Entry::Reply(reply));
        }
    }
}

fn describe_load(load: Option<f64>) -> String {
    match load {
        Some(ohms) => format!("{} ohm", ohms),
        None => String::from("open"),
    }
}

/// Runs the monitor until Esc is pressed, restoring the terminal afterwards.
pub fn run(session: &mut SimSession) -> io::Result<()> {
    // Log output on stderr would tear the alternate screen.
    let previous_level = log::max_level();
    log::set_max_level(LevelFilter::Off);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, session);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    log::set_max_level(previous_level);
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    session: &mut SimSession,
) -> io::Result<()> {
    let mut app = MonitorApp::default();
    loop {
        terminal.draw(|frame| draw(frame, &app, &*session))?;

        if !event::poll(Duration::from_millis(250))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.submit(session),
                KeyCode::Backspace => {
                    app.input.pop();
                }
                KeyCode::Char(c) => app.input.push(c),
                _ => {}
            }
        }
    }
}

fn draw(frame: &mut Frame, app: &MonitorApp, session: &SimSession) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)])
        .split(frame.size());
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[0]);

    draw_log(frame, app, columns[0]);
    draw_state(frame, session, columns[1]);

    let input = Paragraph::new(format!("> {}", app.input))
        .block(Block::default().borders(Borders::ALL).title("Command (Esc to exit)"));
    frame.render_widget(input, rows[1]);
}

fn draw_log(frame: &mut Frame, app: &MonitorApp, area: Rect) {
    let visible = area.height.saturating_sub(2) as usize;
    let skip = app.entries.len().saturating_sub(visible);
    let lines: Vec<Line> = app
        .entries
        .iter()
        .skip(skip)
        .map(|entry| match entry {
            Entry::Sent(text) => Line::from(vec![
                Span::styled("> ", Style::default().fg(Color::Cyan)),
                Span::raw(text.clone()),
            ]),
            Entry::Reply(text) => Line::from(vec![
                Span::styled("< ", Style::default().fg(Color::Green)),
                Span::raw(text.clone()),
            ]),
            Entry::Note(text) => {
                Line::from(Span::styled(text.clone(), Style::default().fg(Color::Yellow)))
            }
        })
        .collect();

    let log = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Exchange"));
    frame.render_widget(log, area);
}

fn draw_state(frame: &mut Frame, session: &SimSession, area: Rect) {
    let instrument = session.instrument();
    let state = instrument.state();
    let board = instrument.front_end();

    let lines = vec![
        Line::from(format!("Measure:   {}", state.measurement_mode.token())),
        Line::from(format!("Source:    {:?}", state.source_mode)),
        Line::from(format!(
            "Output:    {}",
            if state.output_enabled { "ON" } else { "OFF" }
        )),
        Line::from(format!("Last set:  {:.6} V", state.last_set_voltage)),
        Line::from(""),
        Line::from(format!("DAC code:  {}", board.dac_code())),
        Line::from(format!("Output:    {:.6} V", board.output_volts())),
        Line::from(format!("Load:      {:.6} V", board.load_volts())),
        Line::from(format!("Current:   {:.9} A", board.load_current())),
        Line::from(format!("Load R:    {}", describe_load(board.load_ohms()))),
    ];

    let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Instrument"));
    frame.render_widget(panel, area);
}

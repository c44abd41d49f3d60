use std::io;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{Datelike, Local};
use crossterm::event::{self, Event, KeyCode};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{BarChart, Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Tabs};
use ratatui::Terminal;
use volta_core::catalog::{city_label, state_label};
use volta_core::meter::DAYS;
use volta_core::{
    format_duration, Availability, Explorer, Level, MeterStatus, VoltaApi, WatchEvent, WatchToggle,
};

struct ViewerState {
    active: Level,
    cursors: [usize; 4],
    chart_day: usize,
    chart_meter: usize,
    notice: Option<String>,
    error: Option<String>,
}

impl ViewerState {
    fn new() -> Self {
        Self {
            active: Level::State,
            cursors: [0; 4],
            chart_day: Local::now().weekday().num_days_from_monday() as usize,
            chart_meter: 0,
            notice: None,
            error: None,
        }
    }
}

pub async fn run_viewer<A: VoltaApi + 'static>(explorer: &mut Explorer<A>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut state = ViewerState::new();

    let run_result = async {
        loop {
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if handle_key(key.code, explorer, &mut state).await? {
                        break;
                    }
                }
            }

            match explorer.poll_watch_if_due(Instant::now()).await {
                Ok(Some(WatchEvent::StationFreed { station })) => {
                    state.notice = Some(format!("meter is now available at {station}"));
                }
                Ok(None) => {}
                Err(err) => state.error = Some(err.to_string()),
            }

            terminal.draw(|frame| draw_ui(frame.size(), frame, explorer, &state))?;
        }

        Ok::<(), anyhow::Error>(())
    }
    .await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run_result
}

/// Returns true when the viewer should exit.
async fn handle_key<A: VoltaApi + 'static>(
    code: KeyCode,
    explorer: &mut Explorer<A>,
    state: &mut ViewerState,
) -> Result<bool> {
    match code {
        KeyCode::Char('q') => return Ok(true),
        KeyCode::Esc => {
            state.notice = None;
            state.error = None;
        }
        KeyCode::Tab => state.active = state.active.deeper().unwrap_or(Level::State),
        KeyCode::BackTab => {
            state.active = match state.active {
                Level::State => Level::Station,
                Level::City => Level::State,
                Level::Site => Level::City,
                Level::Station => Level::Site,
            }
        }
        KeyCode::Up => move_cursor(explorer, state, -1),
        KeyCode::Down => move_cursor(explorer, state, 1),
        KeyCode::Enter => select_highlighted(explorer, state).await,
        KeyCode::Char('w') => toggle_watch(explorer, state).await,
        KeyCode::Left => state.chart_day = (state.chart_day + DAYS.len() - 1) % DAYS.len(),
        KeyCode::Right => state.chart_day = (state.chart_day + 1) % DAYS.len(),
        KeyCode::Char('m') => {
            if let Some(status) = explorer.station_status() {
                if !status.meters.is_empty() {
                    state.chart_meter = (state.chart_meter + 1) % status.meters.len();
                }
            }
        }
        _ => {}
    }
    Ok(false)
}

fn panel_options<A: VoltaApi + 'static>(explorer: &Explorer<A>, level: Level) -> Vec<String> {
    let Some(catalog) = explorer.catalog() else {
        return Vec::new();
    };
    explorer
        .selection()
        .options(catalog, level)
        .iter()
        .map(|name| name.to_string())
        .collect()
}

fn move_cursor<A: VoltaApi + 'static>(
    explorer: &Explorer<A>,
    state: &mut ViewerState,
    delta: isize,
) {
    let options = panel_options(explorer, state.active);
    if options.is_empty() {
        return;
    }
    let idx = state.active.index();
    let max = options.len() - 1;
    let current = state.cursors[idx].min(max);
    state.cursors[idx] = if delta < 0 {
        current.saturating_sub(1)
    } else {
        (current + 1).min(max)
    };
}

async fn select_highlighted<A: VoltaApi + 'static>(
    explorer: &mut Explorer<A>,
    state: &mut ViewerState,
) {
    let options = panel_options(explorer, state.active);
    let idx = state.active.index();
    let Some(name) = options.get(state.cursors[idx].min(options.len().saturating_sub(1))) else {
        return;
    };

    match explorer.select(state.active, name).await {
        Ok(()) => {
            state.error = None;
            state.chart_meter = 0;
            for level in Level::ALL {
                if level > state.active {
                    state.cursors[level.index()] = 0;
                }
            }
            if let Some(deeper) = state.active.deeper() {
                if !panel_options(explorer, deeper).is_empty() {
                    state.active = deeper;
                }
            }
        }
        Err(err) => state.error = Some(err.to_string()),
    }
}

async fn toggle_watch<A: VoltaApi + 'static>(explorer: &mut Explorer<A>, state: &mut ViewerState) {
    match explorer.toggle_watch(Instant::now()).await {
        Ok((WatchToggle::Started, event)) => {
            state.notice = None;
            if let Some(WatchEvent::StationFreed { station }) = event {
                state.notice = Some(format!("meter is now available at {station}"));
            }
        }
        Ok((WatchToggle::Stopped, _)) => state.notice = None,
        Ok((WatchToggle::Rejected, _)) => {
            state.error = Some("watch needs a selected station with every meter busy".to_string());
        }
        Err(err) => state.error = Some(err.to_string()),
    }
}

fn draw_ui<A: VoltaApi + 'static>(
    area: Rect,
    frame: &mut ratatui::Frame<'_>,
    explorer: &Explorer<A>,
    state: &ViewerState,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    frame.render_widget(render_header(explorer, state), rows[0]);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[1]);

    render_panels(frame, cols[0], explorer, state);
    render_detail(frame, cols[1], explorer, state);

    let hints =
        Paragraph::new(" tab panel  up/down move  enter select  w watch  left/right day  m meter  q quit")
            .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(hints, rows[2]);
}

fn render_header<A: VoltaApi + 'static>(
    explorer: &Explorer<A>,
    state: &ViewerState,
) -> Paragraph<'static> {
    let selection = explorer.selection();
    let mut parts = Vec::new();
    if let Some(name) = selection.state() {
        parts.push(state_label(name));
    }
    if let Some(name) = selection.city() {
        parts.push(city_label(name));
    }
    if let Some(name) = selection.site() {
        parts.push(name.to_string());
    }
    if let Some(name) = selection.station() {
        parts.push(name.to_string());
    }

    let mut spans = vec![Span::styled(
        "Volta Plus  ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    if parts.is_empty() {
        spans.push(Span::raw("pick a state to begin"));
    } else {
        spans.push(Span::raw(parts.join(" / ")));
    }
    if explorer.watch().is_watching() {
        spans.push(Span::styled(
            "  [watching]",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    }

    let mut lines = vec![Line::from(spans)];
    if let Some(notice) = &state.notice {
        lines.push(Line::from(Span::styled(
            notice.clone(),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )));
    } else if let Some(error) = &state.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }

    Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"))
}

fn render_panels<A: VoltaApi + 'static>(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    explorer: &Explorer<A>,
    state: &ViewerState,
) {
    let slots = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(area);

    for level in Level::ALL {
        let idx = level.index();
        let options = panel_options(explorer, level);
        let selected = explorer.selection().get(level);

        let items: Vec<ListItem> = if level == Level::Station {
            explorer
                .stations()
                .iter()
                .map(|status| {
                    let mut spans = vec![Span::raw(status.name.clone()), Span::raw("  ")];
                    for meter in &status.meters {
                        spans.push(Span::styled(
                            "\u{25ae} ",
                            Style::default().fg(meter_color(meter)),
                        ));
                        if meter.is_busy() {
                            spans.push(Span::raw(format!(
                                "{} ",
                                format_duration(meter.charge_duration)
                            )));
                        }
                    }
                    highlight_selected(
                        ListItem::new(Line::from(spans)),
                        selected == Some(status.name.as_str()),
                    )
                })
                .collect()
        } else {
            options
                .iter()
                .map(|name| {
                    let display = match level {
                        Level::State => state_label(name),
                        Level::City => city_label(name),
                        _ => name.clone(),
                    };
                    highlight_selected(ListItem::new(display), selected == Some(name.as_str()))
                })
                .collect()
        };

        let border_style = if state.active == level {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        };
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(panel_title(level))
                    .border_style(border_style),
            )
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("> ");

        let mut list_state = ListState::default();
        if state.active == level && !options.is_empty() {
            list_state.select(Some(state.cursors[idx].min(options.len() - 1)));
        }
        frame.render_stateful_widget(list, slots[idx], &mut list_state);
    }
}

fn highlight_selected(item: ListItem<'_>, selected: bool) -> ListItem<'_> {
    if selected {
        item.style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    } else {
        item
    }
}

fn panel_title(level: Level) -> &'static str {
    match level {
        Level::State => "State",
        Level::City => "City",
        Level::Site => "Site",
        Level::Station => "Station",
    }
}

fn render_detail<A: VoltaApi + 'static>(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    explorer: &Explorer<A>,
    state: &ViewerState,
) {
    let Some(status) = explorer.station_status() else {
        let placeholder = Paragraph::new("select a station to see its meters")
            .block(Block::default().borders(Borders::ALL).title("Meters"));
        frame.render_widget(placeholder, area);
        return;
    };

    let chart_meter = state.chart_meter.min(status.meters.len().saturating_sub(1));
    let charging = status
        .meters
        .get(chart_meter)
        .filter(|meter| meter.is_busy());

    let mut constraints = vec![Constraint::Length(status.meters.len() as u16 * 2 + 2)];
    if charging.is_some() {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Length(1));
    constraints.push(Constraint::Min(8));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut lines = Vec::new();
    for (idx, meter) in status.meters.iter().enumerate() {
        let marker = if idx == chart_meter { "\u{25cf}" } else { "\u{25cb}" };
        let mut spans = vec![
            Span::raw(format!("{marker} meter {}  ", idx + 1)),
            Span::styled(
                meter.availability.label().to_string(),
                Style::default()
                    .fg(meter_color(meter))
                    .add_modifier(Modifier::BOLD),
            ),
        ];
        if meter.is_busy() {
            spans.push(Span::raw(format!(
                "  {}",
                format_duration(meter.charge_duration)
            )));
            if meter.charge_stalled() {
                spans.push(Span::styled("  stalled", Style::default().fg(Color::Yellow)));
            }
        }
        lines.push(Line::from(spans));
        lines.push(Line::from(format!(
            "    avg charge {}  avg squat {}",
            format_duration(meter.in_use_charging_stats.avg as u64),
            format_duration(meter.squat_stats.avg as u64),
        )));
    }
    let meters = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Meters: {}", status.name)),
    );
    frame.render_widget(meters, rows[0]);

    if let Some(meter) = charging {
        let bar_color = if meter.charge_stalled() {
            Color::Yellow
        } else {
            Color::Blue
        };
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("current charge"))
            .gauge_style(Style::default().fg(bar_color))
            .ratio(meter.charge_progress())
            .label(format_duration(meter.charge_duration));
        frame.render_widget(gauge, rows[1]);
    }

    let tabs = Tabs::new(DAYS.to_vec())
        .select(state.chart_day)
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, rows[rows.len() - 2]);

    let histogram = status
        .meters
        .get(chart_meter)
        .map(|meter| meter.weekly_usage.day_histogram(state.chart_day))
        .unwrap_or_default();
    let data: Vec<(&str, u64)> = histogram
        .iter()
        .map(|(label, count)| (label.as_str(), *count))
        .collect();
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title("popular times"))
        .data(&data)
        .bar_width(3)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Blue))
        .value_style(Style::default().fg(Color::Black).bg(Color::Blue));
    frame.render_widget(chart, rows[rows.len() - 1]);
}

/// Availability colours follow the network site: free meters grey, busy
/// blue, stalled sessions yellow, anything unknown red.
fn meter_color(meter: &MeterStatus) -> Color {
    match meter.availability {
        Availability::Available => Color::DarkGray,
        Availability::InUse | Availability::PluggedIn => {
            if meter.charge_stalled() {
                Color::Yellow
            } else {
                Color::Blue
            }
        }
        Availability::Unknown => Color::Red,
    }
}

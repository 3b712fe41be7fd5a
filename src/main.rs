use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{debug, info};
use notify_rust::{Notification, Urgency};
use ratatui::{prelude::*, widgets::*};
use serde::{Deserialize, Serialize};
use std::{fs, io, path::PathBuf, time::{Duration, Instant}};
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

const POLL_RATE: Duration = Duration::from_millis(50);
const TICK_PERIOD: Duration = Duration::from_secs(1);

const GREEN: Color = Color::Rgb(0x1d, 0xc6, 0x64);
const YELLOW: Color = Color::Rgb(0xff, 0xff, 0x00);
const RED: Color = Color::Rgb(0xf4, 0x43, 0x36);
const BLACK: Color = Color::Rgb(0x00, 0x00, 0x00);
const WHITE: Color = Color::Rgb(0xff, 0xff, 0xff);

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Clone)]
#[command(author, version, about = "⏱ ptimer - A Fullscreen Terminal Countdown Timer")]
struct Args {
    #[arg(short, long)]
    minutes: Option<u64>,
    #[arg(short, long)]
    seconds: Option<u64>,
    #[arg(short, long)]
    warn_at: Option<u64>,
    #[arg(long)]
    no_sound: bool,
}

// ============================================================================
// Data Models
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Copy)]
struct Config {
    minutes: u64,
    seconds: u64,
    warn_at_seconds: u64,
    sound_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            minutes: 5,
            seconds: 0,
            warn_at_seconds: 30,
            sound_enabled: true,
        }
    }
}

impl Config {
    fn timer_config(&self) -> TimerConfig {
        TimerConfig {
            total_secs: self.minutes * 60 + self.seconds,
            warn_at_secs: self.warn_at_seconds,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct TimerConfig {
    total_secs: u64,
    warn_at_secs: u64,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
    Idle,
    Running,
    Paused,
    Expired,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ColorBucket {
    Normal,
    Warning,
    Expired,
}

// ============================================================================
// Alert Policy
// ============================================================================

fn classify(remaining_secs: u64, warn_at_secs: u64) -> ColorBucket {
    if remaining_secs == 0 {
        ColorBucket::Expired
    } else if remaining_secs <= warn_at_secs {
        ColorBucket::Warning
    } else {
        ColorBucket::Normal
    }
}

impl ColorBucket {
    fn background(self) -> Color {
        match self {
            Self::Normal => GREEN,
            Self::Warning => YELLOW,
            Self::Expired => RED,
        }
    }

    fn text(self) -> Color {
        match self {
            Self::Warning => BLACK,
            Self::Normal | Self::Expired => WHITE,
        }
    }
}

// ============================================================================
// Buzzer
// ============================================================================

trait Buzzer {
    fn buzz(&mut self);
}

struct DesktopBuzzer {
    sound_enabled: bool,
}

impl Buzzer for DesktopBuzzer {
    fn buzz(&mut self) {
        let _ = Notification::new()
            .summary("⏱ Time's up!")
            .body("The countdown has reached zero.")
            .appname("ptimer")
            .icon("alarm-clock")
            .urgency(Urgency::Critical)
            .show();

        if self.sound_enabled {
            std::thread::spawn(|| {
                for (cmd, file) in [
                    ("paplay", "/usr/share/sounds/freedesktop/stereo/complete.oga"),
                    ("aplay", "/usr/share/sounds/sound-icons/guitar-11.wav"),
                    ("aplay", "/usr/share/sounds/generic.wav"),
                ] {
                    if std::path::Path::new(file).exists() {
                        let _ = std::process::Command::new(cmd)
                            .arg(file)
                            .stdout(std::process::Stdio::null())
                            .stderr(std::process::Stdio::null())
                            .spawn();
                        break;
                    }
                }
            });
        }
    }
}

// ============================================================================
// Tick Scheduler
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct TickHandle(u64);

struct TickScheduler {
    period: Duration,
    armed: Option<(TickHandle, Instant)>,
    generation: u64,
}

impl TickScheduler {
    fn new(period: Duration) -> Self {
        Self {
            period,
            armed: None,
            generation: 0,
        }
    }

    fn schedule(&mut self, now: Instant) -> TickHandle {
        self.generation += 1;
        let handle = TickHandle(self.generation);
        self.armed = Some((handle, now + self.period));
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        // a stale handle must never disarm a newer schedule
        if self.armed.map(|(h, _)| h) == Some(handle) {
            self.armed = None;
        }
    }

    fn poll(&mut self, now: Instant) -> bool {
        match self.armed {
            Some((handle, due)) if now >= due => {
                self.armed = Some((handle, due + self.period));
                true
            }
            _ => false,
        }
    }
}

// ============================================================================
// Timer Controller
// ============================================================================

struct TimerController<B: Buzzer> {
    config: TimerConfig,
    remaining_secs: u64,
    phase: Phase,
    scheduler: TickScheduler,
    handle: Option<TickHandle>,
    buzzer: B,
}

struct TimerView {
    minutes: String,
    seconds: String,
    phase: Phase,
    bucket: ColorBucket,
    can_reset: bool,
}

impl<B: Buzzer> TimerController<B> {
    fn new(config: TimerConfig, buzzer: B) -> Self {
        Self {
            config,
            remaining_secs: config.total_secs,
            phase: Phase::Idle,
            scheduler: TickScheduler::new(TICK_PERIOD),
            handle: None,
            buzzer,
        }
    }

    fn start(&mut self, now: Instant) {
        match self.phase {
            // an expired run needs a reset before it can go again
            Phase::Running | Phase::Expired => {}
            Phase::Paused => self.resume(),
            Phase::Idle => {
                self.remaining_secs = self.config.total_secs;
                self.handle = Some(self.scheduler.schedule(now));
                self.phase = Phase::Running;
                debug!("started with {}s on the clock", self.remaining_secs);
            }
        }
    }

    fn pause(&mut self) {
        if self.phase == Phase::Running {
            // the schedule stays armed; due ticks are swallowed until resume
            self.phase = Phase::Paused;
            debug!("paused at {}s", self.remaining_secs);
        }
    }

    fn resume(&mut self) {
        if self.phase == Phase::Paused {
            self.phase = Phase::Running;
            debug!("resumed at {}s", self.remaining_secs);
        }
    }

    fn toggle(&mut self, now: Instant) {
        match self.phase {
            Phase::Running => self.pause(),
            Phase::Paused => self.resume(),
            Phase::Idle | Phase::Expired => self.start(now),
        }
    }

    fn reset(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.scheduler.cancel(handle);
        }
        self.remaining_secs = self.config.total_secs;
        self.phase = Phase::Idle;
        debug!("reset to {}s", self.remaining_secs);
    }

    fn apply_config(&mut self, config: TimerConfig) {
        if let Some(handle) = self.handle.take() {
            self.scheduler.cancel(handle);
        }
        self.config = config;
        self.remaining_secs = config.total_secs;
        self.phase = Phase::Idle;
        info!(
            "settings applied: total={}s warn_at={}s",
            config.total_secs, config.warn_at_secs
        );
    }

    // Drains every due tick. Commands and ticks share the event-loop thread,
    // so a command always finishes its mutation before the next tick fires.
    fn pump(&mut self, now: Instant) {
        while self.scheduler.poll(now) {
            self.tick();
        }
    }

    fn tick(&mut self) {
        if self.phase != Phase::Running {
            return;
        }
        if self.remaining_secs > 1 {
            self.remaining_secs -= 1;
        } else {
            self.remaining_secs = 0;
            self.phase = Phase::Expired;
            if let Some(handle) = self.handle.take() {
                self.scheduler.cancel(handle);
            }
            info!("countdown expired");
            self.buzzer.buzz();
        }
    }

    fn view(&self) -> TimerView {
        TimerView {
            minutes: format!("{:02}", self.remaining_secs / 60),
            seconds: format!("{:02}", self.remaining_secs % 60),
            phase: self.phase,
            bucket: classify(self.remaining_secs, self.config.warn_at_secs),
            can_reset: matches!(self.phase, Phase::Expired | Phase::Paused),
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum SettingsField {
    Minutes,
    Seconds,
    WarnAt,
}

impl SettingsField {
    fn next(self) -> Self {
        match self {
            Self::Minutes => Self::Seconds,
            Self::Seconds => Self::WarnAt,
            Self::WarnAt => Self::Minutes,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Minutes => Self::WarnAt,
            Self::Seconds => Self::Minutes,
            Self::WarnAt => Self::Seconds,
        }
    }
}

struct SettingsDialog {
    minutes: String,
    seconds: String,
    warn_at: String,
    field: SettingsField,
    error: Option<SettingsError>,
}

impl SettingsDialog {
    fn open(config: &Config) -> Self {
        Self {
            minutes: config.minutes.to_string(),
            seconds: config.seconds.to_string(),
            warn_at: config.warn_at_seconds.to_string(),
            field: SettingsField::Minutes,
            error: None,
        }
    }

    fn input_mut(&mut self) -> &mut String {
        match self.field {
            SettingsField::Minutes => &mut self.minutes,
            SettingsField::Seconds => &mut self.seconds,
            SettingsField::WarnAt => &mut self.warn_at,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
enum SettingsError {
    #[error("{field} must be a whole number, got {value:?}")]
    NotANumber { field: &'static str, value: String },
}

fn parse_field(field: &'static str, value: &str) -> Result<u64, SettingsError> {
    value.trim().parse().map_err(|_| SettingsError::NotANumber {
        field,
        value: value.to_string(),
    })
}

fn parse_settings(
    minutes: &str,
    seconds: &str,
    warn_at: &str,
) -> Result<(u64, u64, u64), SettingsError> {
    Ok((
        parse_field("minutes", minutes)?,
        parse_field("seconds", seconds)?,
        parse_field("warn at seconds", warn_at)?,
    ))
}

fn save_settings<B: Buzzer>(
    dialog: &SettingsDialog,
    config: &mut Config,
    controller: &mut TimerController<B>,
) -> Result<(), SettingsError> {
    // parse every field before touching anything
    let (minutes, seconds, warn_at) =
        parse_settings(&dialog.minutes, &dialog.seconds, &dialog.warn_at)?;
    config.minutes = minutes;
    config.seconds = seconds;
    config.warn_at_seconds = warn_at;
    controller.apply_config(config.timer_config());
    Ok(())
}

// ============================================================================
// Application State
// ============================================================================

struct App {
    controller: TimerController<DesktopBuzzer>,
    config: Config,
    settings: Option<SettingsDialog>,
}

// ============================================================================
// Event Handlers
// ============================================================================

fn handle_input(key: event::KeyEvent, app: &mut App, now: Instant) -> bool {
    if app.settings.is_some() {
        handle_settings_input(key, app);
        return false;
    }

    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Char(' ') => app.controller.start(now),
        KeyCode::Char('p') => app.controller.toggle(now),
        KeyCode::Char('r') => app.controller.reset(),
        KeyCode::Char('d') => app.settings = Some(SettingsDialog::open(&app.config)),
        _ => {}
    }

    false
}

fn handle_settings_input(key: event::KeyEvent, app: &mut App) {
    let Some(dialog) = app.settings.as_mut() else {
        return;
    };

    match key.code {
        KeyCode::Esc => {
            // discard edits; config and timer untouched
            app.settings = None;
        }
        KeyCode::Enter => match save_settings(dialog, &mut app.config, &mut app.controller) {
            Ok(()) => {
                let _ = save_json(&get_path("config.json"), &app.config);
                app.settings = None;
            }
            Err(e) => dialog.error = Some(e),
        },
        KeyCode::Tab | KeyCode::Down => dialog.field = dialog.field.next(),
        KeyCode::BackTab | KeyCode::Up => dialog.field = dialog.field.prev(),
        KeyCode::Backspace => {
            dialog.input_mut().pop();
        }
        KeyCode::Char(c) => dialog.input_mut().push(c),
        _ => {}
    }
}

// ============================================================================
// UI Rendering
// ============================================================================

fn render_ui(f: &mut Frame, app: &App) {
    render_timer(f, app);
    if let Some(dialog) = &app.settings {
        render_settings(f, dialog);
    }
}

fn render_timer(f: &mut Frame, app: &App) {
    let view = app.controller.view();
    let (background, text) = (view.bucket.background(), view.bucket.text());
    let area = f.size();

    f.render_widget(
        Block::default().style(Style::default().bg(background)),
        area,
    );

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    let time_str = format!("{}:{}", view.minutes, view.seconds);
    f.render_widget(
        Paragraph::new(Span::styled(
            time_str,
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        sections[1],
    );

    let status = match view.phase {
        Phase::Idle => "Press Space to start",
        Phase::Running => "",
        Phase::Paused => "⏸ PAUSED",
        Phase::Expired => "⏱ TIME'S UP",
    };
    f.render_widget(
        Paragraph::new(Span::styled(status, Style::default().fg(text)))
            .alignment(Alignment::Center),
        sections[3],
    );

    let now = chrono::Local::now();
    f.render_widget(
        Paragraph::new(Span::styled(
            now.format("%I:%M %p").to_string(),
            Style::default().fg(text).add_modifier(Modifier::DIM),
        ))
        .alignment(Alignment::Center),
        sections[5],
    );

    let hints = if view.can_reset {
        "Space Start  •  P Pause/Resume  •  R Reset  •  D Settings  •  Q Quit"
    } else {
        "Space Start  •  P Pause/Resume  •  D Settings  •  Q Quit"
    };
    f.render_widget(
        Paragraph::new(Span::styled(
            hints,
            Style::default().fg(text).add_modifier(Modifier::DIM),
        ))
        .alignment(Alignment::Center),
        sections[6],
    );
}

fn render_settings(f: &mut Frame, dialog: &SettingsDialog) {
    let area = centered_rect(45, 45, f.size());
    f.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];
    let fields = [
        (SettingsField::Minutes, "Minutes", dialog.minutes.as_str()),
        (SettingsField::Seconds, "Seconds", dialog.seconds.as_str()),
        (SettingsField::WarnAt, "Warn at seconds", dialog.warn_at.as_str()),
    ];

    for (field, label, value) in fields {
        let selected = dialog.field == field;
        let label_style = if selected {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let prefix = if selected { "  > " } else { "    " };

        let mut spans = vec![
            Span::styled(prefix, label_style),
            Span::styled(format!("{label}: "), label_style),
            Span::styled(value, Style::default().fg(Color::White)),
        ];
        if selected {
            spans.push(Span::styled("█", Style::default().fg(Color::White)));
        }
        lines.push(Line::from(spans));
        lines.push(Line::from(""));
    }

    if let Some(err) = &dialog.error {
        lines.push(Line::from(Span::styled(
            format!("  {err}"),
            Style::default().fg(Color::Red),
        )));
        lines.push(Line::from(""));
    }

    lines.push(Line::from(Span::styled(
        "  Tab/↓ Next  •  Enter Save  •  Esc Cancel",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" Timer Settings ")
                .title_alignment(Alignment::Center)
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        ),
        area,
    );
}

fn centered_rect(w: u16, h: u16, r: Rect) -> Rect {
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h) / 2),
            Constraint::Percentage(h),
            Constraint::Percentage((100 - h) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w) / 2),
            Constraint::Percentage(w),
            Constraint::Percentage((100 - w) / 2),
        ])
        .split(v[1])[1]
}

// ============================================================================
// Utilities
// ============================================================================

fn get_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(".");
    path.push("ptimer");
    let _ = fs::create_dir_all(&path);
    path.push(filename);
    path
}

fn load_json<T: for<'de> Deserialize<'de> + Default>(path: &PathBuf) -> T {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn save_json<T: Serialize>(path: &PathBuf, data: &T) -> io::Result<()> {
    fs::write(path, serde_json::to_string_pretty(data)?)
}

fn init_logging() {
    // raw mode owns the screen, so logs go to a file instead of stderr
    if let Ok(file) = fs::File::create(get_path("ptimer.log")) {
        let _ = env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .try_init();
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let mut config = load_json::<Config>(&get_path("config.json"));

    // CLI overrides
    if let Some(m) = args.minutes {
        config.minutes = m;
    }
    if let Some(s) = args.seconds {
        config.seconds = s;
    }
    if let Some(w) = args.warn_at {
        config.warn_at_seconds = w;
    }
    if args.no_sound {
        config.sound_enabled = false;
    }

    let buzzer = DesktopBuzzer {
        sound_enabled: config.sound_enabled,
    };
    let controller = TimerController::new(config.timer_config(), buzzer);
    let mut app = App {
        controller,
        config,
        settings: None,
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| render_ui(f, app))?;

        if event::poll(POLL_RATE)? {
            if let Event::Key(key) = event::read()? {
                if handle_input(key, app, Instant::now()) {
                    return Ok(());
                }
            }
        }

        app.controller.pump(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBuzzer {
        fired: u32,
    }

    impl Buzzer for TestBuzzer {
        fn buzz(&mut self) {
            self.fired += 1;
        }
    }

    fn controller(total_secs: u64, warn_at_secs: u64) -> TimerController<TestBuzzer> {
        TimerController::new(
            TimerConfig {
                total_secs,
                warn_at_secs,
            },
            TestBuzzer { fired: 0 },
        )
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn classify_is_expired_only_at_zero() {
        assert_eq!(classify(0, 30), ColorBucket::Expired);
        assert_eq!(classify(1, 30), ColorBucket::Warning);
    }

    #[test]
    fn classify_warning_boundary_is_closed_at_threshold() {
        assert_eq!(classify(30, 30), ColorBucket::Warning);
        assert_eq!(classify(31, 30), ColorBucket::Normal);
    }

    #[test]
    fn classify_zero_threshold_never_warns() {
        assert_eq!(classify(1, 0), ColorBucket::Normal);
        assert_eq!(classify(0, 0), ColorBucket::Expired);
    }

    #[test]
    fn classify_with_threshold_above_total_warns_from_the_start() {
        assert_eq!(classify(20, 30), ColorBucket::Warning);
    }

    #[test]
    fn start_runs_and_decrements_once_per_second() {
        let mut c = controller(10, 3);
        let t0 = Instant::now();
        c.start(t0);
        assert_eq!(c.phase, Phase::Running);
        assert_eq!(c.remaining_secs, 10);

        c.pump(t0 + secs(1));
        assert_eq!(c.remaining_secs, 9);
        c.pump(t0 + secs(3));
        assert_eq!(c.remaining_secs, 7);
    }

    #[test]
    fn start_while_running_is_a_no_op() {
        let mut c = controller(10, 3);
        let t0 = Instant::now();
        c.start(t0);
        c.pump(t0 + secs(1));

        c.start(t0 + secs(1));
        assert_eq!(c.remaining_secs, 9);

        c.pump(t0 + secs(2));
        assert_eq!(c.remaining_secs, 8);
    }

    #[test]
    fn pause_holds_remaining_while_ticks_are_due() {
        let mut c = controller(10, 3);
        let t0 = Instant::now();
        c.start(t0);
        c.pump(t0 + secs(2));
        assert_eq!(c.remaining_secs, 8);

        c.pause();
        assert_eq!(c.phase, Phase::Paused);
        c.pump(t0 + secs(7));
        assert_eq!(c.remaining_secs, 8);

        c.resume();
        assert_eq!(c.phase, Phase::Running);
        c.pump(t0 + secs(8));
        assert_eq!(c.remaining_secs, 7);
    }

    #[test]
    fn start_while_paused_resumes_without_losing_time() {
        let mut c = controller(10, 3);
        let t0 = Instant::now();
        c.start(t0);
        c.pump(t0 + secs(3));
        c.pause();

        c.start(t0 + secs(5));
        assert_eq!(c.phase, Phase::Running);
        assert_eq!(c.remaining_secs, 7);
    }

    #[test]
    fn toggle_walks_start_pause_resume() {
        let mut c = controller(10, 3);
        let t0 = Instant::now();
        c.toggle(t0);
        assert_eq!(c.phase, Phase::Running);
        c.toggle(t0);
        assert_eq!(c.phase, Phase::Paused);
        c.toggle(t0);
        assert_eq!(c.phase, Phase::Running);
    }

    #[test]
    fn expiry_fires_buzzer_exactly_once_and_stops_ticking() {
        let mut c = controller(3, 0);
        let t0 = Instant::now();
        c.start(t0);
        c.pump(t0 + secs(2));
        assert_eq!(c.remaining_secs, 1);
        assert_eq!(c.buzzer.fired, 0);

        c.pump(t0 + secs(3));
        assert_eq!(c.remaining_secs, 0);
        assert_eq!(c.phase, Phase::Expired);
        assert_eq!(c.buzzer.fired, 1);

        c.pump(t0 + secs(60));
        assert_eq!(c.remaining_secs, 0);
        assert_eq!(c.buzzer.fired, 1);
    }

    #[test]
    fn start_after_expiry_requires_a_reset() {
        let mut c = controller(1, 0);
        let t0 = Instant::now();
        c.start(t0);
        c.pump(t0 + secs(1));
        assert_eq!(c.phase, Phase::Expired);

        c.start(t0 + secs(2));
        assert_eq!(c.phase, Phase::Expired);
        assert_eq!(c.remaining_secs, 0);
    }

    #[test]
    fn reset_restores_idle_and_cancels_the_pending_tick() {
        let mut c = controller(10, 3);
        let t0 = Instant::now();
        c.start(t0);
        c.pump(t0 + secs(4));
        assert_eq!(c.remaining_secs, 6);

        c.reset();
        assert_eq!(c.phase, Phase::Idle);
        assert_eq!(c.remaining_secs, 10);

        c.pump(t0 + secs(30));
        assert_eq!(c.remaining_secs, 10);
        assert_eq!(c.phase, Phase::Idle);
    }

    #[test]
    fn reset_from_expired_rearms_a_fresh_run() {
        let mut c = controller(2, 0);
        let t0 = Instant::now();
        c.start(t0);
        c.pump(t0 + secs(2));
        assert_eq!(c.phase, Phase::Expired);

        c.reset();
        let t1 = t0 + secs(10);
        c.start(t1);
        c.pump(t1 + secs(2));
        assert_eq!(c.phase, Phase::Expired);
        assert_eq!(c.buzzer.fired, 2);
    }

    #[test]
    fn zero_duration_start_expires_on_the_first_tick() {
        let mut c = controller(0, 0);
        assert_eq!(c.view().bucket, ColorBucket::Expired);

        let t0 = Instant::now();
        c.start(t0);
        assert_eq!(c.phase, Phase::Running);
        c.pump(t0 + secs(1));
        assert_eq!(c.phase, Phase::Expired);
        assert_eq!(c.buzzer.fired, 1);
    }

    #[test]
    fn five_second_run_walks_normal_warning_expired() {
        let mut c = controller(5, 3);
        let t0 = Instant::now();
        c.start(t0);

        c.pump(t0 + secs(1));
        let v = c.view();
        assert_eq!((v.minutes.as_str(), v.seconds.as_str()), ("00", "04"));
        assert_eq!(v.bucket, ColorBucket::Normal);

        c.pump(t0 + secs(3));
        let v = c.view();
        assert_eq!((v.minutes.as_str(), v.seconds.as_str()), ("00", "02"));
        assert_eq!(v.bucket, ColorBucket::Warning);

        c.pump(t0 + secs(5));
        let v = c.view();
        assert_eq!((v.minutes.as_str(), v.seconds.as_str()), ("00", "00"));
        assert_eq!(v.bucket, ColorBucket::Expired);
        assert_eq!(v.phase, Phase::Expired);
        assert_eq!(c.buzzer.fired, 1);
    }

    #[test]
    fn view_zero_pads_and_reports_reset_affordance() {
        let mut c = controller(125, 30);
        let v = c.view();
        assert_eq!((v.minutes.as_str(), v.seconds.as_str()), ("02", "05"));
        assert!(!v.can_reset);

        let t0 = Instant::now();
        c.start(t0);
        assert!(!c.view().can_reset);
        c.pause();
        assert!(c.view().can_reset);
    }

    #[test]
    fn view_colors_follow_the_bucket() {
        let c = controller(100, 30);
        let v = c.view();
        assert_eq!(v.bucket, ColorBucket::Normal);
        assert_eq!(v.bucket.background(), GREEN);
        assert_eq!(v.bucket.text(), WHITE);
    }

    #[test]
    fn color_table_is_fixed_per_bucket() {
        assert_eq!(ColorBucket::Normal.background(), GREEN);
        assert_eq!(ColorBucket::Normal.text(), WHITE);
        assert_eq!(ColorBucket::Warning.background(), YELLOW);
        assert_eq!(ColorBucket::Warning.text(), BLACK);
        assert_eq!(ColorBucket::Expired.background(), RED);
        assert_eq!(ColorBucket::Expired.text(), WHITE);
    }

    #[test]
    fn parse_settings_accepts_plain_integers() {
        assert_eq!(parse_settings("2", "30", "10"), Ok((2, 30, 10)));
    }

    #[test]
    fn parse_settings_rejects_bad_numbers() {
        assert!(parse_settings("abc", "0", "0").is_err());
        assert!(parse_settings("-1", "0", "0").is_err());
        assert!(parse_settings("", "0", "0").is_err());
        assert!(parse_settings("5", "0", "1.5").is_err());
    }

    #[test]
    fn saving_settings_mid_run_forces_idle_with_the_new_total() {
        let mut config = Config::default();
        let mut c = controller(30, 5);
        let t0 = Instant::now();
        c.start(t0);
        c.pump(t0 + secs(4));

        let mut dialog = SettingsDialog::open(&config);
        dialog.minutes = "2".into();
        dialog.seconds = "30".into();
        dialog.warn_at = "10".into();

        save_settings(&dialog, &mut config, &mut c).unwrap();
        assert_eq!(c.phase, Phase::Idle);
        assert_eq!(c.remaining_secs, 150);
        assert_eq!(c.config.warn_at_secs, 10);
        assert_eq!(config.minutes, 2);

        c.pump(t0 + secs(60));
        assert_eq!(c.remaining_secs, 150);
    }

    #[test]
    fn rejected_settings_leave_config_and_state_untouched() {
        let mut config = Config::default();
        let mut c = controller(300, 30);
        let t0 = Instant::now();
        c.start(t0);
        c.pump(t0 + secs(2));

        let mut dialog = SettingsDialog::open(&config);
        dialog.minutes = "abc".into();
        dialog.seconds = "0".into();
        dialog.warn_at = "0".into();

        let err = save_settings(&dialog, &mut config, &mut c).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::NotANumber { field: "minutes", .. }
        ));
        assert_eq!(config.minutes, 5);
        assert_eq!(c.phase, Phase::Running);
        assert_eq!(c.remaining_secs, 298);
    }

    #[test]
    fn scheduler_poll_is_quiet_before_the_deadline() {
        let mut s = TickScheduler::new(TICK_PERIOD);
        let t0 = Instant::now();
        s.schedule(t0);
        assert!(!s.poll(t0 + Duration::from_millis(999)));
        assert!(s.poll(t0 + secs(1)));
    }

    #[test]
    fn scheduler_cancel_disarms() {
        let mut s = TickScheduler::new(TICK_PERIOD);
        let t0 = Instant::now();
        let h = s.schedule(t0);
        s.cancel(h);
        assert!(!s.poll(t0 + secs(10)));
    }

    #[test]
    fn scheduler_ignores_stale_handles() {
        let mut s = TickScheduler::new(TICK_PERIOD);
        let t0 = Instant::now();
        let old = s.schedule(t0);
        let _new = s.schedule(t0);

        s.cancel(old);
        assert!(s.poll(t0 + secs(1)));
    }
}

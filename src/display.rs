//! Status display utilities.

use crate::monitor::MonitorView;
use atty::Stream;
use colored::*;
use lazy_static::lazy_static;
use std::io::Write;
use std::sync::Mutex;

lazy_static! {
    static ref DISPLAY: Mutex<Option<Box<dyn StatusDisplay>>> = Mutex::new(None);
}

/// Picks a display mode from the TERM and COLORTERM environment variables.
pub fn initialize_display() {
    let term = std::env::var("TERM").ok();
    let colorterm = std::env::var("COLORTERM").ok();

    let display: Box<dyn StatusDisplay> =
        if term.is_none() || !atty::is(Stream::Stdout) || !atty::is(Stream::Stderr) {
            Box::new(NoTtyStatusDisplay::default())
        } else if colorterm.is_some() {
            Box::new(ColouredStatusDisplay::new(80))
        } else {
            Box::new(BasicStatusDisplay::new(80))
        };
    if let Ok(mut current) = DISPLAY.lock() {
        *current = Some(display);
    }
}

/// Displays a [`MonitorView`] according to the current mode.
pub fn display_status(view: &MonitorView) {
    if let Ok(mut display) = DISPLAY.lock() {
        if let Some(ref mut display) = *display {
            display.display(view);
            return;
        }
    }
    println!("[default] {}", StatusLine::from_view(view).text);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Warning => "[WARNING] ",
            LogLevel::Error => "[ERROR] ",
            LogLevel::Info => "",
        }
    }
}

/// Prints a line without tearing an in-progress status bar.
pub fn log(level: LogLevel, s: &str) {
    if let Ok(mut display) = DISPLAY.lock() {
        if let Some(ref mut display) = *display {
            display.log(level, s);
            return;
        }
    }
    println!("[default] {}", s);
}

/// What a status line says about a monitor reading.
#[derive(Clone, Debug, PartialEq, Eq)]
struct StatusLine {
    text: String,
    percent: Option<usize>,
}

impl StatusLine {
    fn from_view(view: &MonitorView) -> Self {
        let status = match view.status_name() {
            Some(name) => name.replace('_', " "),
            None => return StatusLine {
                text: "No monitor data".to_owned(),
                percent: None,
            },
        };
        let percent = view
            .progress_percent()
            .filter(|p| *p > 0)
            .map(|p| p as usize);
        let flags = view.active_flags();
        let text = if flags.is_empty() {
            status
        } else {
            format!("{} ({})", status, flags.join(", "))
        };
        StatusLine { text, percent }
    }
}

trait StatusDisplay: Send + Sync {
    fn display(&mut self, view: &MonitorView);
    fn log(&mut self, level: LogLevel, s: &str);
}

/// [`StatusDisplay`] for non-TTY stdio.
#[derive(Default)]
struct NoTtyStatusDisplay {}

impl StatusDisplay for NoTtyStatusDisplay {
    fn display(&mut self, view: &MonitorView) {
        let line = StatusLine::from_view(view);
        match line.percent {
            Some(percent) => println!("{} {}%", line.text, percent),
            None => println!("{}", line.text),
        }
    }

    fn log(&mut self, level: LogLevel, s: &str) {
        if level == LogLevel::Info {
            println!("{}", s);
        } else {
            eprintln!("{}{}", level.prefix(), s);
        }
    }
}

struct ColouredStatusDisplay {
    width: usize,
    last_was_status: bool,
}

impl ColouredStatusDisplay {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            last_was_status: false,
        }
    }
}

impl StatusDisplay for ColouredStatusDisplay {
    fn log(&mut self, level: LogLevel, s: &str) {
        if std::mem::take(&mut self.last_was_status) {
            println!();
        }
        if level == LogLevel::Info {
            println!("{}", s);
        } else {
            eprintln!("{}{}", level.prefix(), s.yellow());
        }
    }

    fn display(&mut self, view: &MonitorView) {
        let line = StatusLine::from_view(view);
        let icon = match view.predicate("has_alarm") {
            Some(true) => "🔔",
            _ if view.predicate("is_ready") == Some(true) => "✅",
            _ if view.predicate("is_standby") == Some(true) => "💤",
            _ if line.percent.is_some() => "☕",
            _ => "⋅",
        };
        let mut status: Vec<char> = format!(" {} {}", icon, line.text).chars().collect();
        status.resize(self.width.max(status.len()), ' ');

        let percent = line.percent.unwrap_or(0).clamp(0, 100);
        let (left, right) = status.split_at((percent * status.len()) / 100);
        print!(
            "\r▐{}{}▌ ",
            left.iter()
                .collect::<String>()
                .truecolor(183, 161, 129)
                .on_truecolor(92, 69, 6),
            right
                .iter()
                .collect::<String>()
                .truecolor(153, 141, 109)
                .on_truecolor(46, 34, 3)
        );
        let _ = std::io::stdout().flush();
        self.last_was_status = true;
    }
}

struct BasicStatusDisplay {
    activity: u8,
    width: usize,
    last_was_status: bool,
}

fn make_bar(s: &str, width: usize, percent: Option<usize>) -> String {
    let mut s = s.to_owned();
    if let Some(percent) = percent {
        let percent = percent.clamp(0, 100);
        s += " [";
        let remaining = width.saturating_sub(s.len() + 1);
        let count = (remaining * percent) / 100;
        s += &"#".repeat(count);
        s += &"=".repeat(remaining - count);
        s += "]";
        s
    } else {
        // No bar, just pad w/spaces
        let pad = width.saturating_sub(s.len());
        s + &" ".repeat(pad)
    }
}

impl BasicStatusDisplay {
    pub fn new(width: usize) -> Self {
        Self {
            activity: 0,
            width,
            last_was_status: false,
        }
    }
}

impl StatusDisplay for BasicStatusDisplay {
    fn log(&mut self, level: LogLevel, s: &str) {
        if std::mem::take(&mut self.last_was_status) {
            println!();
        }
        if level == LogLevel::Info {
            println!("{}", s);
        } else {
            eprintln!("{}{}", level.prefix(), s);
        }
    }

    fn display(&mut self, view: &MonitorView) {
        let line = StatusLine::from_view(view);

        self.activity = (self.activity + 1) % 8;
        print!(
            "\r{} {}",
            make_bar(&line.text, self.width - 2, line.percent),
            &"/-\\|/-\\|"[self.activity as usize..self.activity as usize + 1]
        );

        let _ = std::io::stdout().flush();
        self.last_was_status = true;
    }
}

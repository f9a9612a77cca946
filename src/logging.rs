use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        mpsc::{self, Sender},
        OnceLock,
    },
    thread,
};

use crate::paths::data_root_dir;

/* =========================
   GLOBAL STATE
   ========================= */

static ENABLED: AtomicBool = AtomicBool::new(false);
static THRESHOLD: AtomicU8 = AtomicU8::new(LEVEL_WARN);
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_TX: OnceLock<Sender<String>> = OnceLock::new();

const LEVEL_INFO: u8 = 1;
const LEVEL_WARN: u8 = 2;
const LEVEL_ERROR: u8 = 3;

/* =========================
   PUBLIC API
   ========================= */

pub fn init(debug: bool, level: &str) {
    if LOG_TX.get().is_some() {
        return;
    }

    ENABLED.store(debug, Ordering::Relaxed);
    set_level(level);

    let path = log_path().clone();
    let (tx, rx) = mpsc::channel::<String>();
    if LOG_TX.set(tx).is_err() {
        return;
    }

    thread::spawn(move || {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&path) else {
            // Nowhere to write; drain so senders never block on a full pipe.
            while rx.recv().is_ok() {}
            return;
        };

        while let Ok(line) = rx.recv() {
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
        }
    });
}

pub fn set_debug(debug: bool) {
    ENABLED.store(debug, Ordering::Relaxed);
}

pub fn set_level(level: &str) {
    THRESHOLD.store(level_rank(level), Ordering::Relaxed);
}

#[inline]
pub fn should_log(level: &str) -> bool {
    if ENABLED.load(Ordering::Relaxed) {
        return true;
    }
    level_rank(level) >= THRESHOLD.load(Ordering::Relaxed)
}

/* =========================
   INTERNAL
   ========================= */

fn level_rank(level: &str) -> u8 {
    match level.trim().to_ascii_lowercase().as_str() {
        "info" | "debug" | "trace" => LEVEL_INFO,
        "error" => LEVEL_ERROR,
        _ => LEVEL_WARN,
    }
}

#[inline]
pub fn enqueue(level: &str, msg: String) {
    if let Some(tx) = LOG_TX.get() {
        let _ = tx.send(format_line(level, &msg));
    }
}

fn format_line(level: &str, msg: &str) -> String {
    format!("{} [{level}] {msg}", timestamp())
}

fn timestamp() -> String {
    let now = chrono::Local::now();
    now.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/* =========================
   MACROS
   ========================= */

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        if $crate::logging::should_log("INFO") {
            $crate::logging::enqueue(
                "INFO",
                format!($($arg)*)
            );
        }
    }};
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        if $crate::logging::should_log("WARN") {
            $crate::logging::enqueue(
                "WARN",
                format!($($arg)*)
            );
        }
    }};
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        $crate::logging::enqueue(
            "ERROR",
            format!($($arg)*)
        );
    }};
}

/* =========================
   PATH
   ========================= */

fn log_path() -> &'static PathBuf {
    LOG_PATH.get_or_init(|| data_root_dir().join("thematic.log"))
}

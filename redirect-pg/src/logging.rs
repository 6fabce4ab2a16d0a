//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

//! The two file-backed log sinks (§6 "Persisted state"): every record goes
//! to the primary sink, and records logged under [`FALLBACK_TARGET`] (SQL
//! that failed translation) are duplicated to the fallback sink.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub const DEFAULT_PRIMARY_LOG_PATH: &str = "/tmp/plex_redirect_pg.log";
pub const DEFAULT_FALLBACK_LOG_PATH: &str = "/tmp/plex_pg_fallbacks.log";

/// Log target that routes a record to the fallback sink in addition to the
/// primary one. Used via `log::warn!(target: FALLBACK_TARGET, ...)` whenever
/// a statement falls back to the embedded engine because translation
/// failed.
pub const FALLBACK_TARGET: &str = "redirect_pg::fallback";

pub struct DualFileLogger {
    level: LevelFilter,
    primary: Mutex<File>,
    fallback: Mutex<File>,
}

impl DualFileLogger {
    fn open_append(path: &Path) -> std::io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    /// Opens both sinks and installs the logger as the global `log` facade
    /// backend. Idempotent calls fail with [`SetLoggerError`]; the caller
    /// decides whether that is fatal.
    pub fn init(level: LevelFilter, primary_path: &Path, fallback_path: &Path) -> std::io::Result<Result<(), SetLoggerError>> {
        let primary = Self::open_append(primary_path)?;
        let fallback = Self::open_append(fallback_path)?;
        let logger = DualFileLogger {
            level,
            primary: Mutex::new(primary),
            fallback: Mutex::new(fallback),
        };
        log::set_max_level(level);
        Ok(log::set_boxed_logger(Box::new(logger)))
    }

    fn format_line(record: &Record) -> String {
        let timestamp = chrono::Utc::now().to_rfc3339();
        format!("{timestamp} [{}] {}: {}\n", record.level(), record.target(), record.args())
    }
}

impl Log for DualFileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format_line(record);
        if let Ok(mut file) = self.primary.lock() {
            let _ = file.write_all(line.as_bytes());
        }
        if record.target() == FALLBACK_TARGET {
            if let Ok(mut file) = self.fallback.lock() {
                let _ = file.write_all(line.as_bytes());
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.primary.lock() {
            let _ = file.flush();
        }
        if let Ok(mut file) = self.fallback.lock() {
            let _ = file.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn fallback_target_duplicates_into_fallback_file() {
        let dir = std::env::temp_dir().join(format!("redirect_pg_log_test_{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let primary_path = dir.join("primary.log");
        let fallback_path = dir.join("fallback.log");
        let logger = DualFileLogger {
            level: LevelFilter::Info,
            primary: Mutex::new(DualFileLogger::open_append(&primary_path).unwrap()),
            fallback: Mutex::new(DualFileLogger::open_append(&fallback_path).unwrap()),
        };

        logger.log(
            &Record::builder()
                .level(log::Level::Warn)
                .target(FALLBACK_TARGET)
                .args(format_args!("translation failed for SELECT 1"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(log::Level::Info)
                .target("redirect_pg::session")
                .args(format_args!("connected"))
                .build(),
        );
        logger.flush();

        let mut primary_contents = String::new();
        File::open(&primary_path).unwrap().read_to_string(&mut primary_contents).unwrap();
        let mut fallback_contents = String::new();
        File::open(&fallback_path).unwrap().read_to_string(&mut fallback_contents).unwrap();

        assert!(primary_contents.contains("translation failed"));
        assert!(primary_contents.contains("connected"));
        assert!(fallback_contents.contains("translation failed"));
        assert!(!fallback_contents.contains("connected"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}

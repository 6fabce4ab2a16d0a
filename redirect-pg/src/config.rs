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

//! `PLEX_PG_*` environment configuration. Six scalar variables; parsed by
//! hand rather than through a configuration crate, following the plain
//! `std::env::var` style the teacher uses for its own CLI flags.

use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error = 0,
    Info = 1,
    Debug = 2,
}

impl LogLevel {
    fn from_env(raw: &str) -> LogLevel {
        match raw.trim() {
            "2" => LogLevel::Debug,
            "0" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub schema: String,
    pub log_level: LogLevel,
    pub no_shadow_scan: bool,
}

impl Config {
    /// Reads `PLEX_PG_*` and `PLEX_NO_SHADOW_SCAN` from the process
    /// environment, falling back to the literal defaults from §6 for any
    /// variable that is unset or fails to parse.
    pub fn from_env() -> Config {
        Config {
            host: env::var("PLEX_PG_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("PLEX_PG_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5432),
            database: env::var("PLEX_PG_DATABASE").unwrap_or_else(|_| "plex".to_string()),
            user: env::var("PLEX_PG_USER").unwrap_or_else(|_| "plex".to_string()),
            password: env::var("PLEX_PG_PASSWORD").unwrap_or_default(),
            schema: env::var("PLEX_PG_SCHEMA").unwrap_or_else(|_| "plex".to_string()),
            log_level: env::var("PLEX_PG_LOG_LEVEL")
                .map(|v| LogLevel::from_env(&v))
                .unwrap_or(LogLevel::Info),
            no_shadow_scan: env::var("PLEX_NO_SHADOW_SCAN")
                .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
                .unwrap_or(false),
        }
    }

    /// `host=... port=... dbname=... user=... password=...` connection
    /// string consumed by `postgres::Config::from_str` (the `postgres`
    /// crate's own DSN syntax).
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.database, self.user, self.password
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_parses_known_values_and_falls_back_to_info() {
        assert_eq!(LogLevel::from_env("0"), LogLevel::Error);
        assert_eq!(LogLevel::from_env("2"), LogLevel::Debug);
        assert_eq!(LogLevel::from_env("garbage"), LogLevel::Info);
    }

    #[test]
    fn connection_string_includes_every_field() {
        let config = Config {
            host: "db.internal".to_string(),
            port: 5433,
            database: "plexdb".to_string(),
            user: "plex_ro".to_string(),
            password: "secret".to_string(),
            schema: "plex".to_string(),
            log_level: LogLevel::Info,
            no_shadow_scan: false,
        };
        let dsn = config.connection_string();
        assert!(dsn.contains("host=db.internal"));
        assert!(dsn.contains("port=5433"));
        assert!(dsn.contains("dbname=plexdb"));
        assert!(dsn.contains("user=plex_ro"));
        assert!(dsn.contains("password=secret"));
    }
}

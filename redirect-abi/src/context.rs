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

//! Process-wide state: the connection pool (C4), the per-database router
//! (C10), shared configuration, the fake-value ring (C7), and the shadow
//! engine used for compatibility shims. One [`Context`] is built lazily on
//! first use and lives for the process's entire lifetime, matching how the
//! host only ever attaches/detaches databases, never reinitializes the
//! library.

use std::path::Path;
use std::sync::{Mutex, OnceLock};

use redirect_core::errors::CoreError;
use redirect_core::fakevalue::FakeValuePool;
use redirect_core::pool::ConnectionPool;
use redirect_core::router::Router;
use redirect_pg::config::Config;
use redirect_pg::logging::{DualFileLogger, DEFAULT_FALLBACK_LOG_PATH, DEFAULT_PRIMARY_LOG_PATH};
use redirect_pg::session::PgSession;
use redirect_shadow::SqliteShadowEngine;

/// Filename substrings that route an opened database through the
/// translation/pool pipeline instead of straight to the bundled engine.
const INTERCEPTED_WHITELIST: &[&str] = &["com.plexapp.plugins"];

pub struct Context {
    pub pool: ConnectionPool<PgSession>,
    pub router: Mutex<Router>,
    pub config: Config,
    pub shadow: Mutex<SqliteShadowEngine>,
    pub fake_values: FakeValuePool,
}

static CONTEXT: OnceLock<Context> = OnceLock::new();

/// Fetches (building on first call) the process-wide context. Building the
/// logger here rather than in a dedicated `init` entry point mirrors the
/// host's own usage pattern: it never calls an explicit shim-initialize
/// function, it just starts opening databases.
pub fn context() -> &'static Context {
    CONTEXT.get_or_init(|| {
        let config = Config::from_env();
        let primary = Path::new(DEFAULT_PRIMARY_LOG_PATH);
        let fallback = Path::new(DEFAULT_FALLBACK_LOG_PATH);
        match DualFileLogger::init(config.log_level.to_level_filter(), primary, fallback) {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                // Logger already installed (e.g. a previous attach in this process); not fatal.
            }
            Err(e) => {
                eprintln!("redirect-abi: failed to open log sinks: {e}");
            }
        }

        let open_config = config.clone();
        Context {
            pool: ConnectionPool::with_default_capacity(move || {
                PgSession::connect(&open_config).map_err(|e| CoreError::ConnectionLost(e.to_string()))
            }),
            router: Mutex::new(Router::new(INTERCEPTED_WHITELIST.iter().map(|s| s.to_string()).collect())),
            config,
            shadow: Mutex::new(SqliteShadowEngine::new()),
            fake_values: FakeValuePool::new(),
        }
    })
}

//! Ephemeral database plugin.
//!
//! Enabled by the `uses database` option (or its older spelling `uses psql`).
//! Creates a uniquely named database with `createdb`, exposes it to the script
//! through `PGDATABASE`, and drops it with `dropdb` afterwards unless both
//! `debug` and `keep database` are set.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use replay_core::config::env_keys::{self, script_env};
use replay_core::config::{env_optional, ScopedEnvGuard};
use replay_core::process::CommandSpec;
use replay_core::script::{OPTION_DEBUG, OPTION_KEEP_DATABASE, OPTION_USES_DATABASE, OPTION_USES_PSQL};
use replay_core::{ReplayError, Result, RunContext, ScriptSpec};

use crate::info_log;
use crate::plugin::{Plugin, ScopeOutcome};

pub(crate) fn build<'a>(ctx: &'a RunContext, script: &'a ScriptSpec) -> Result<Box<dyn Plugin + 'a>> {
    Ok(Box::new(Postgres::new(ctx, script)))
}

/// Last timestamp handed out, in microseconds since the epoch.
static LAST_TIMESTAMP_MICROS: AtomicI64 = AtomicI64::new(0);

/// Current time in microseconds, strictly greater than any earlier result in
/// this process.
fn next_timestamp_micros() -> i64 {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_TIMESTAMP_MICROS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_TIMESTAMP_MICROS.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// `YYYYmmddHHMMSS` followed by six digits of microseconds, UTC.
fn format_timestamp(micros: i64) -> String {
    match DateTime::from_timestamp_micros(micros) {
        Some(t) => t.format("%Y%m%d%H%M%S%6f").to_string(),
        None => format!("{micros:020}"),
    }
}

/// Login name from USER, LOGNAME or USERNAME, else the account database.
fn current_user() -> String {
    env_optional(env_keys::USER, env_keys::USER_ALIASES)
        .or_else(account_name)
        .unwrap_or_else(|| "replay".to_string())
}

#[cfg(unix)]
fn account_name() -> Option<String> {
    use nix::unistd::{Uid, User};
    match User::from_uid(Uid::current()) {
        Ok(user) => user.map(|u| u.name),
        Err(e) => {
            tracing::debug!(error = %e, "No passwd entry for the current user");
            None
        }
    }
}

#[cfg(not(unix))]
fn account_name() -> Option<String> {
    None
}

pub struct Postgres<'a> {
    ctx: &'a RunContext,
    database: String,
    enabled: bool,
    keep_database: bool,
    pgdatabase: Option<ScopedEnvGuard>,
}

impl<'a> Postgres<'a> {
    pub fn new(ctx: &'a RunContext, script: &'a ScriptSpec) -> Self {
        let timestamp = format_timestamp(next_timestamp_micros());
        Self {
            ctx,
            database: format!("{}_{}_{}", current_user(), script.name(), timestamp),
            enabled: script.has_option(OPTION_USES_DATABASE) || script.has_option(OPTION_USES_PSQL),
            keep_database: script.has_option(OPTION_DEBUG) && script.has_option(OPTION_KEEP_DATABASE),
            pgdatabase: None,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn run_db_command(&self, program: &str) -> Result<()> {
        let result = self
            .ctx
            .runner()
            .run(&CommandSpec::new(program).arg(&self.database))?;
        if result.success() {
            Ok(())
        } else {
            Err(ReplayError::Database {
                database: self.database.clone(),
                result,
            })
        }
    }
}

impl Plugin for Postgres<'_> {
    fn name(&self) -> &str {
        crate::plugin::POSTGRES
    }

    fn enter(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let guard = ScopedEnvGuard::set(script_env::PGDATABASE, &self.database);
        if let Err(e) = self.run_db_command("createdb") {
            guard.restore();
            return Err(e);
        }
        info_log!(database = %self.database, "Database created");
        self.pgdatabase = Some(guard);
        Ok(())
    }

    fn exit(&mut self, _outcome: ScopeOutcome) -> Result<()> {
        let Some(guard) = self.pgdatabase.take() else {
            return Ok(());
        };
        guard.restore();
        if self.keep_database {
            info_log!(database = %self.database, "Keeping database");
            return Ok(());
        }
        self.run_db_command("dropdb")
    }
}

//! Process supervisor for generated bots.
//!
//! The supervisor is the only writer of `bot_configs.pid`. Per configuration
//! id the state is either "no process" or "running(pid)":
//!
//! - [`Supervisor::launch`] stops the recorded instance, starts a new one and
//!   records its pid
//! - [`Supervisor::recover_on_startup`] stops every recorded process and
//!   clears every record
//! - [`Supervisor::forget`] clears the record without stopping anything
//! - [`Supervisor::stop_and_forget`] stops, then clears
//!
//! A bot that crashes leaves its pid recorded until the next launch or
//! startup sweep notices it is gone.

pub mod layout;
pub mod process;

use secrecy::{ExposeSecret, SecretString};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use crate::core::error::{AppError, AppResult};
use crate::storage::db::{self, DbPool};
use crate::storage::get_connection;

pub use layout::BotFiles;
pub use process::{TerminationOutcome, TerminationPolicy};

/// Command used to start a generated bot; the program path is appended last
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl Launcher {
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `<this executable> run-bot --program <path>`
    pub fn current_exe() -> AppResult<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self::new(exe, ["run-bot", "--program"]))
    }

    fn command(&self, program_path: &Path) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args).arg(program_path);
        command
    }
}

/// Summary of a startup sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Records found
    pub recorded: usize,
    /// Processes that were alive and got stopped
    pub stopped: usize,
    /// Records that pointed at nothing
    pub already_gone: usize,
    /// Processes that outlived the termination wait
    pub timed_out: usize,
}

pub struct Supervisor {
    db_pool: Arc<DbPool>,
    bots_dir: PathBuf,
    launcher: Launcher,
    policy: TerminationPolicy,
}

impl Supervisor {
    /// Supervisor that launches bots with this executable's `run-bot` subcommand
    pub fn new(db_pool: Arc<DbPool>, bots_dir: impl Into<PathBuf>) -> AppResult<Self> {
        Ok(Self::with_launcher(db_pool, bots_dir, Launcher::current_exe()?))
    }

    pub fn with_launcher(db_pool: Arc<DbPool>, bots_dir: impl Into<PathBuf>, launcher: Launcher) -> Self {
        Self {
            db_pool,
            bots_dir: bots_dir.into(),
            launcher,
            policy: TerminationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TerminationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn bots_dir(&self) -> &Path {
        &self.bots_dir
    }

    /// File layout of one configuration
    pub fn files(&self, config_id: i64) -> BotFiles {
        BotFiles::new(&self.bots_dir, config_id)
    }

    /// Starts (or restarts) the bot for `config_id` and records its pid.
    ///
    /// The credential is written next to the program. A previously recorded
    /// instance is stopped first; if it cannot be stopped the launch is
    /// aborted so two processes never poll with the same token.
    pub async fn launch(&self, program_path: &Path, credential: &SecretString, config_id: i64) -> AppResult<u32> {
        // The child runs inside the bot directory, where a relative path no longer resolves.
        let program_path = std::path::absolute(program_path)?;
        let files = BotFiles::for_program(&program_path);
        files.write_credential(credential)?;

        if let Some(recorded) = self.recorded_pid(config_id)? {
            let outcome = self.stop(recorded).await;
            log::info!(
                "Config {}: previous instance pid {} -> {:?}",
                config_id,
                recorded,
                outcome
            );
            if !outcome.is_stopped() {
                return Err(AppError::Process(format!(
                    "previous instance of config {} (pid {}) did not exit",
                    config_id, recorded
                )));
            }
            db::clear_bot_pid(&*get_connection(&self.db_pool)?, config_id)?;
        }

        let mut command = self.launcher.command(&program_path);
        command
            .current_dir(&files.dir)
            .env("BOT_TOKEN", credential.expose_secret())
            .env("TELOXIDE_TOKEN", credential.expose_secret())
            .stdin(Stdio::null());

        let child = command
            .spawn()
            .map_err(|e| AppError::Process(format!("failed to start bot for config {}: {}", config_id, e)))?;
        let pid = child
            .id()
            .ok_or_else(|| AppError::Process(format!("bot for config {} exited immediately", config_id)))?;
        // The runtime reaps the child once it exits; the pid record is what we keep
        drop(child);

        db::set_bot_pid(&*get_connection(&self.db_pool)?, config_id, i64::from(pid))?;
        log::info!("Config {}: started pid {}", config_id, pid);
        Ok(pid)
    }

    /// Stops every recorded process and clears every record, even when
    /// stopping fails.
    pub async fn recover_on_startup(&self) -> AppResult<RecoveryReport> {
        let recorded = db::list_recorded_pids(&*get_connection(&self.db_pool)?)?;
        let mut report = RecoveryReport {
            recorded: recorded.len(),
            ..RecoveryReport::default()
        };

        for (config_id, pid) in recorded {
            match self.stop(pid).await {
                TerminationOutcome::NotRunning => report.already_gone += 1,
                TerminationOutcome::Terminated | TerminationOutcome::Killed => report.stopped += 1,
                TerminationOutcome::TimedOut => {
                    log::error!("Config {}: pid {} could not be stopped", config_id, pid);
                    report.timed_out += 1;
                }
            }
            db::clear_bot_pid(&*get_connection(&self.db_pool)?, config_id)?;
        }

        if report.recorded > 0 {
            log::info!(
                "Startup recovery: {} recorded, {} stopped, {} already gone, {} timed out",
                report.recorded,
                report.stopped,
                report.already_gone,
                report.timed_out
            );
        }
        Ok(report)
    }

    /// Drops supervision of `config_id`: the pid record and generated files.
    /// A running process is left alone.
    pub fn forget(&self, config_id: i64) -> AppResult<()> {
        db::clear_bot_pid(&*get_connection(&self.db_pool)?, config_id)?;
        self.files(config_id).remove()?;
        log::info!("Config {}: supervision dropped", config_id);
        Ok(())
    }

    /// Stops the recorded process, then [`forget`](Self::forget)s the config
    pub async fn stop_and_forget(&self, config_id: i64) -> AppResult<TerminationOutcome> {
        let outcome = match self.recorded_pid(config_id)? {
            Some(pid) => self.stop(pid).await,
            None => TerminationOutcome::NotRunning,
        };
        self.forget(config_id)?;
        Ok(outcome)
    }

    /// Recorded pid of `config_id`, if that process is still alive
    pub fn running_pid(&self, config_id: i64) -> AppResult<Option<i64>> {
        Ok(self
            .recorded_pid(config_id)?
            .filter(|pid| process::to_pid(*pid).is_some_and(process::is_alive)))
    }

    fn recorded_pid(&self, config_id: i64) -> AppResult<Option<i64>> {
        Ok(db::get_bot_pid(&*get_connection(&self.db_pool)?, config_id)?)
    }

    async fn stop(&self, raw_pid: i64) -> TerminationOutcome {
        match process::to_pid(raw_pid) {
            Some(pid) => process::terminate(pid, self.policy).await,
            None => {
                log::warn!("Ignoring invalid recorded pid {}", raw_pid);
                TerminationOutcome::NotRunning
            }
        }
    }
}

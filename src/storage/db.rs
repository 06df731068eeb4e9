use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Result};
use secrecy::SecretString;
use std::fmt;

use crate::storage::migrations::run_migrations;

/// Пользователь мета-бота
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Telegram ID пользователя
    pub user_id: i64,
    /// Username в Telegram, если есть
    pub username: Option<String>,
    /// Имя, которое пользователь указал при регистрации
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub registered_at: String,
}

/// Строка `bot_configs`: одна сгенерированная конфигурация
pub struct BotRecord {
    pub config_id: i64,
    /// Владелец конфигурации
    pub user_id: i64,
    pub bot_name: String,
    /// Сериализованная конфигурация (JSON)
    pub config_json: String,
    /// Токен сгенерированного бота
    pub bot_token: SecretString,
    /// PID запущенного процесса, если он записан
    pub pid: Option<i64>,
    pub created_at: String,
}

impl fmt::Debug for BotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotRecord")
            .field("config_id", &self.config_id)
            .field("user_id", &self.user_id)
            .field("bot_name", &self.bot_name)
            .field("pid", &self.pid)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and brings the
/// schema up to date. A generated bot calls this too, which is how it
/// initializes its storage tables.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Example
///
/// ```no_run
/// use botforge::storage::db;
///
/// let pool = db::create_pool("bot_users.db")?;
/// # Ok::<(), r2d2::Error>(())
/// ```
pub fn create_pool(database_path: &str) -> std::result::Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    let mut conn = pool.get()?;
    if let Err(e) = run_migrations(&mut conn) {
        log::warn!("Failed to migrate schema: {:#}", e);
    }

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped; callers hold it for
/// one operation only.
pub fn get_connection(pool: &DbPool) -> std::result::Result<DbConnection, r2d2::Error> {
    pool.get()
}

// ── users ────────────────────────────────────────────────────────────────

/// Регистрирует пользователя. Повторная регистрация ничего не меняет.
pub fn create_user(
    conn: &Connection,
    user_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO users (user_id, username, first_name, last_name) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, username, first_name, last_name],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    conn.query_row(
        "SELECT user_id, username, first_name, last_name, registered_at FROM users WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(User {
                user_id: row.get(0)?,
                username: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
                registered_at: row.get(4)?,
            })
        },
    )
    .optional()
}

pub fn is_registered(conn: &Connection, user_id: i64) -> Result<bool> {
    Ok(get_user(conn, user_id)?.is_some())
}

// ── bot_configs ──────────────────────────────────────────────────────────

fn parse_bot_row(row: &rusqlite::Row<'_>) -> Result<BotRecord> {
    let token: String = row.get(4)?;
    Ok(BotRecord {
        config_id: row.get(0)?,
        user_id: row.get(1)?,
        bot_name: row.get(2)?,
        config_json: row.get(3)?,
        bot_token: SecretString::from(token),
        pid: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const BOT_COLUMNS: &str = "config_id, user_id, bot_name, config_json, bot_token, pid, created_at";

/// Сохраняет конфигурацию и возвращает её идентификатор
pub fn insert_bot_config(
    conn: &Connection,
    user_id: i64,
    bot_name: &str,
    config_json: &str,
    bot_token: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO bot_configs (user_id, bot_name, config_json, bot_token) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, bot_name, config_json, bot_token],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_bot_config(conn: &Connection, config_id: i64) -> Result<Option<BotRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM bot_configs WHERE config_id = ?1", BOT_COLUMNS),
        params![config_id],
        parse_bot_row,
    )
    .optional()
}

/// Конфигурации пользователя, старые первыми
pub fn list_user_bots(conn: &Connection, user_id: i64) -> Result<Vec<BotRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM bot_configs WHERE user_id = ?1 ORDER BY config_id ASC",
        BOT_COLUMNS
    ))?;
    let rows = stmt.query_map(params![user_id], parse_bot_row)?;
    rows.collect()
}

pub fn get_bot_pid(conn: &Connection, config_id: i64) -> Result<Option<i64>> {
    let pid: Option<Option<i64>> = conn
        .query_row(
            "SELECT pid FROM bot_configs WHERE config_id = ?1",
            params![config_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(pid.flatten())
}

pub fn set_bot_pid(conn: &Connection, config_id: i64, pid: i64) -> Result<()> {
    conn.execute(
        "UPDATE bot_configs SET pid = ?1 WHERE config_id = ?2",
        params![pid, config_id],
    )?;
    Ok(())
}

pub fn clear_bot_pid(conn: &Connection, config_id: i64) -> Result<()> {
    conn.execute("UPDATE bot_configs SET pid = NULL WHERE config_id = ?1", params![config_id])?;
    Ok(())
}

/// Все пары (config_id, pid) с записанным процессом
pub fn list_recorded_pids(conn: &Connection) -> Result<Vec<(i64, i64)>> {
    let mut stmt =
        conn.prepare("SELECT config_id, pid FROM bot_configs WHERE pid IS NOT NULL ORDER BY config_id ASC")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

/// Удаляет конфигурацию вместе с её опросами и ответами.
///
/// Удаляется только конфигурация, принадлежащая `user_id`; возвращает `false`,
/// если такой нет.
pub fn delete_bot_config(conn: &Connection, config_id: i64, user_id: i64) -> Result<bool> {
    let owned: Option<i64> = conn
        .query_row(
            "SELECT config_id FROM bot_configs WHERE config_id = ?1 AND user_id = ?2",
            params![config_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    if owned.is_none() {
        return Ok(false);
    }

    // Всё или ничего: опросы без конфигурации не остаются
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM poll_responses WHERE config_id = ?1", params![config_id])?;
    tx.execute("DELETE FROM polls WHERE config_id = ?1", params![config_id])?;
    tx.execute("DELETE FROM bot_configs WHERE config_id = ?1", params![config_id])?;
    tx.commit()?;
    Ok(true)
}

// ── polls ────────────────────────────────────────────────────────────────

/// Создаёт опрос. `config_id` может быть ещё неизвестен, см. [`link_polls`].
pub fn insert_poll(conn: &Connection, config_id: Option<i64>, question: &str, options: &[String]) -> Result<i64> {
    let options_json = serde_json::to_string(options).map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))?;
    conn.execute(
        "INSERT INTO polls (config_id, question, options) VALUES (?1, ?2, ?3)",
        params![config_id, question, options_json],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Привязывает опросы к конфигурации, созданной после них
pub fn link_polls(conn: &Connection, poll_ids: &[i64], config_id: i64) -> Result<()> {
    for poll_id in poll_ids {
        conn.execute(
            "UPDATE polls SET config_id = ?1 WHERE poll_id = ?2",
            params![config_id, poll_id],
        )?;
    }
    Ok(())
}

/// Вопрос и варианты ответа опроса
pub fn get_poll(conn: &Connection, poll_id: i64) -> Result<Option<(String, Vec<String>)>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT question, options FROM polls WHERE poll_id = ?1",
            params![poll_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    row.map(|(question, options)| {
        let options: Vec<String> = serde_json::from_str(&options)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into()))?;
        Ok((question, options))
    })
    .transpose()
}

/// Записывает выбор пользователя в опросе
pub fn save_poll_response(
    conn: &Connection,
    user_id: i64,
    poll_id: i64,
    config_id: i64,
    option_text: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO poll_responses (user_id, poll_id, config_id, option_text) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, poll_id, config_id, option_text],
    )?;
    Ok(conn.last_insert_rowid())
}

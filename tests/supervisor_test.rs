//! Integration tests for the bot process supervisor
//!
//! Starts real `sh`/`sleep` processes, so the tests run one at a time.
//! Run with: cargo test --test supervisor_test

#![cfg(unix)]

use botforge::storage::{create_pool, db, get_connection, DbPool};
use botforge::supervisor::{Launcher, Supervisor, TerminationOutcome, TerminationPolicy};
use secrecy::{ExposeSecret, SecretString};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    pool: Arc<DbPool>,
    supervisor: Supervisor,
}

/// `sh -c 'exec sleep 30' bot <program>` stands in for a generated bot
fn sleeper() -> Launcher {
    Launcher::new("sh", ["-c", "exec sleep 30", "bot"])
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let pool = Arc::new(create_pool(dir.path().join("bot_users.db").to_str().unwrap()).unwrap());
    let supervisor = Supervisor::with_launcher(Arc::clone(&pool), dir.path().join("bots"), sleeper()).with_policy(
        TerminationPolicy {
            timeout: Duration::from_secs(2),
            interval: Duration::from_millis(20),
            kill_on_timeout: true,
        },
    );
    Fixture {
        _dir: dir,
        pool,
        supervisor,
    }
}

fn insert_config(pool: &DbPool, name: &str) -> i64 {
    let conn = get_connection(pool).unwrap();
    db::create_user(&conn, 1, Some("owner"), None, None).unwrap();
    db::insert_bot_config(&conn, 1, name, r#"{"bot_name":"x","handlers":[]}"#, "123:abc").unwrap()
}

fn token() -> SecretString {
    SecretString::from("123:abc".to_string())
}

fn alive(pid: i64) -> bool {
    botforge::supervisor::process::to_pid(pid).is_some_and(botforge::supervisor::process::is_alive)
}

#[tokio::test]
#[serial]
async fn test_second_launch_supersedes_first() {
    let f = fixture();
    let config_id = insert_config(&f.pool, "Relaunch");
    let files = f.supervisor.files(config_id);

    let first = i64::from(f.supervisor.launch(&files.program, &token(), config_id).await.unwrap());
    assert!(alive(first));
    assert_eq!(f.supervisor.running_pid(config_id).unwrap(), Some(first));

    let second = i64::from(f.supervisor.launch(&files.program, &token(), config_id).await.unwrap());
    assert_ne!(first, second);
    assert!(!alive(first), "first instance must be stopped");
    assert!(alive(second));

    let conn = get_connection(&f.pool).unwrap();
    assert_eq!(db::get_bot_pid(&conn, config_id).unwrap(), Some(second));
    drop(conn);

    // Учётные данные лежат рядом с программой
    assert_eq!(files.read_credential().unwrap().expose_secret(), "123:abc");

    let outcome = f.supervisor.stop_and_forget(config_id).await.unwrap();
    assert!(outcome.is_stopped());
    assert!(!alive(second));
    assert!(!files.dir.exists());
}

#[tokio::test]
#[serial]
async fn test_recovery_stops_and_clears_every_record() {
    let f = fixture();

    let mut live = Vec::new();
    for name in ["A", "B"] {
        let config_id = insert_config(&f.pool, name);
        let files = f.supervisor.files(config_id);
        let pid = f.supervisor.launch(&files.program, &token(), config_id).await.unwrap();
        live.push(i64::from(pid));
    }

    // Запись о процессе, который уже завершился
    let mut finished = tokio::process::Command::new("true").spawn().unwrap();
    let dead_pid = i64::from(finished.id().unwrap());
    finished.wait().await.unwrap();
    let dead_config = insert_config(&f.pool, "C");
    db::set_bot_pid(&get_connection(&f.pool).unwrap(), dead_config, dead_pid).unwrap();

    let report = f.supervisor.recover_on_startup().await.unwrap();
    assert_eq!(report.recorded, 3);
    assert_eq!(report.stopped, 2);
    assert_eq!(report.already_gone, 1);
    assert_eq!(report.timed_out, 0);

    for pid in live {
        assert!(!alive(pid));
    }
    let conn = get_connection(&f.pool).unwrap();
    assert!(db::list_recorded_pids(&conn).unwrap().is_empty());

    // Повторный проход ничего не находит
    drop(conn);
    let report = f.supervisor.recover_on_startup().await.unwrap();
    assert_eq!(report.recorded, 0);
}

#[tokio::test]
#[serial]
async fn test_forget_leaves_process_running() {
    let f = fixture();
    let config_id = insert_config(&f.pool, "Forget");
    let files = f.supervisor.files(config_id);
    let pid = i64::from(f.supervisor.launch(&files.program, &token(), config_id).await.unwrap());

    f.supervisor.forget(config_id).unwrap();
    assert!(alive(pid));
    assert_eq!(f.supervisor.running_pid(config_id).unwrap(), None);
    assert_eq!(
        f.supervisor.stop_and_forget(config_id).await.unwrap(),
        TerminationOutcome::NotRunning
    );

    let outcome = botforge::supervisor::process::terminate(
        botforge::supervisor::process::to_pid(pid).unwrap(),
        TerminationPolicy::default(),
    )
    .await;
    assert!(outcome.is_stopped());
}

#[tokio::test]
#[serial]
async fn test_failed_spawn_records_nothing() {
    let dir = TempDir::new().unwrap();
    let pool = Arc::new(create_pool(dir.path().join("bot_users.db").to_str().unwrap()).unwrap());
    let supervisor = Supervisor::with_launcher(
        Arc::clone(&pool),
        dir.path().join("bots"),
        Launcher::new("/nonexistent/botforge-runner", Vec::<String>::new()),
    );
    let config_id = insert_config(&pool, "Broken");
    let files = supervisor.files(config_id);

    assert!(supervisor.launch(&files.program, &token(), config_id).await.is_err());
    assert_eq!(db::get_bot_pid(&get_connection(&pool).unwrap(), config_id).unwrap(), None);
}

#[tokio::test]
#[serial]
async fn test_relative_bots_dir_resolves_program_for_child() {
    let work = TempDir::new().unwrap();
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(work.path()).unwrap();

    let pool = Arc::new(create_pool(work.path().join("bot_users.db").to_str().unwrap()).unwrap());
    // Дочерний процесс живёт, только если видит файл программы из своего каталога
    let supervisor = Supervisor::with_launcher(
        Arc::clone(&pool),
        "bots",
        Launcher::new("sh", ["-c", r#"if [ -f "$1" ]; then exec sleep 30; else exit 3; fi"#, "bot"]),
    );
    let config_id = insert_config(&pool, "Relative");
    let files = supervisor.files(config_id);
    assert!(files.program.is_relative());
    std::fs::create_dir_all(&files.dir).unwrap();
    std::fs::write(&files.program, "bot_name = \"x\"\n").unwrap();

    let pid = i64::from(supervisor.launch(&files.program, &token(), config_id).await.unwrap());
    tokio::time::sleep(Duration::from_millis(300)).await;
    let running = alive(pid);

    supervisor.stop_and_forget(config_id).await.unwrap();
    std::env::set_current_dir(previous).unwrap();
    assert!(running, "child must find its program through an absolute path");
}

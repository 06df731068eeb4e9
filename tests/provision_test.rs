//! End-to-end provisioning: answers → database → program → running process
//!
//! Run with: cargo test --test provision_test

#![cfg(unix)]

use botforge::generator::{BotProgram, Generator, HandlerKind};
use botforge::provision::{user_message, ProvisionRequest, Provisioner, TemplateAnswers};
use botforge::storage::{create_pool, db, get_connection, DbPool};
use botforge::supervisor::{process, Launcher, Supervisor, TerminationPolicy};
use botforge::templates::{BusinessCard, FaqEntry, PollSpec};
use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use serial_test::serial;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const OWNER: i64 = 1001;

struct Fixture {
    dir: TempDir,
    pool: Arc<DbPool>,
    provisioner: Provisioner,
}

fn fixture_with(launcher: Launcher) -> Fixture {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("bot_users.db");
    let pool = Arc::new(create_pool(db_path.to_str().unwrap()).unwrap());
    db::create_user(&get_connection(&pool).unwrap(), OWNER, Some("owner"), Some("Owner"), None).unwrap();

    let supervisor = Supervisor::with_launcher(Arc::clone(&pool), dir.path().join("bots"), launcher).with_policy(
        TerminationPolicy {
            timeout: Duration::from_secs(2),
            interval: Duration::from_millis(20),
            kill_on_timeout: true,
        },
    );
    let generator = Generator::new(db_path.to_string_lossy().into_owned());
    let provisioner = Provisioner::new(Arc::clone(&pool), generator, Arc::new(supervisor));
    Fixture { dir, pool, provisioner }
}

fn fixture() -> Fixture {
    fixture_with(Launcher::new("sh", ["-c", "exec sleep 30", "bot"]))
}

fn request(bot_name: &str, answers: TemplateAnswers) -> ProvisionRequest {
    ProvisionRequest {
        user_id: OWNER,
        bot_name: bot_name.to_string(),
        token: SecretString::from("123456:secret-token".to_string()),
        answers,
    }
}

fn alive(pid: u32) -> bool {
    process::is_alive(sysinfo::Pid::from_u32(pid))
}

fn program_of(dir: &Path, config_id: i64) -> BotProgram {
    BotProgram::load(dir.join("bots").join(config_id.to_string()).join("bot.toml")).unwrap()
}

#[tokio::test]
#[serial]
async fn test_business_card_is_created_and_running() {
    let f = fixture();
    let card = BusinessCard {
        welcome_text: Some("Добро пожаловать!".to_string()),
        phone: Some("+79991234567".to_string()),
        ..BusinessCard::default()
    };

    let created = f
        .provisioner
        .provision(request("My.Bot", TemplateAnswers::BusinessCard(card)))
        .await
        .unwrap();
    assert_eq!(created.bot_name, "My\\.Bot");
    assert!(alive(created.pid));

    let conn = get_connection(&f.pool).unwrap();
    let record = db::get_bot_config(&conn, created.config_id).unwrap().unwrap();
    assert_eq!(record.user_id, OWNER);
    assert_eq!(record.bot_name, "My\\.Bot");
    assert_eq!(record.bot_token.expose_secret(), "123456:secret-token");
    assert_eq!(record.pid, Some(i64::from(created.pid)));
    drop(conn);

    let program = program_of(f.dir.path(), created.config_id);
    assert_eq!(program.bot.config_id, created.config_id);
    assert!(program.handlers_of(HandlerKind::Command).any(|h| h.trigger == "start"));

    // Токен не попадает в программу
    let source = std::fs::read_to_string(f.dir.path().join("bots").join(created.config_id.to_string()).join("bot.toml")).unwrap();
    assert!(!source.contains("secret-token"));

    f.provisioner.supervisor().stop_and_forget(created.config_id).await.unwrap();
    assert!(!alive(created.pid));
}

#[tokio::test]
#[serial]
async fn test_poll_bot_links_polls() {
    let f = fixture();
    let polls = vec![
        PollSpec {
            question: "Кофе или чай?".to_string(),
            options: vec!["Кофе".to_string(), "Чай".to_string()],
        },
        PollSpec {
            question: "Когда встречаемся?".to_string(),
            options: vec!["Утром".to_string(), "Днём".to_string(), "Вечером".to_string()],
        },
    ];

    let created = f
        .provisioner
        .provision(request("Survey", TemplateAnswers::Poll(polls)))
        .await
        .unwrap();

    let program = program_of(f.dir.path(), created.config_id);
    let poll_ids: Vec<i64> = program
        .handlers
        .iter()
        .filter_map(|h| h.save_response.as_ref().map(|s| s.poll_id))
        .collect();
    assert_eq!(poll_ids.len(), 5);

    let conn = get_connection(&f.pool).unwrap();
    let (question, options) = db::get_poll(&conn, poll_ids[0]).unwrap().unwrap();
    // В базе хранится уже экранированный текст
    assert_eq!(question, "Кофе или чай\\?");
    assert_eq!(options, ["Кофе", "Чай"]);
    let (_, options) = db::get_poll(&conn, poll_ids[4]).unwrap().unwrap();
    assert_eq!(options.len(), 3);
    drop(conn);

    f.provisioner.supervisor().stop_and_forget(created.config_id).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_invalid_configuration_leaves_nothing_behind() {
    let f = fixture();
    let polls = vec![PollSpec {
        question: "Пустой опрос".to_string(),
        options: vec![],
    }];

    let err = f
        .provisioner
        .provision(request("Broken", TemplateAnswers::Poll(polls)))
        .await
        .unwrap_err();
    assert!(err.is_config_error());
    assert!(user_message(&err).contains("Ошибка в конфигурации"));

    let conn = get_connection(&f.pool).unwrap();
    assert!(db::list_user_bots(&conn, OWNER).unwrap().is_empty());
    assert_eq!(db::get_poll(&conn, 1).unwrap(), None);
    assert!(!f.dir.path().join("bots").exists());

    let err = f
        .provisioner
        .provision(request("Empty", TemplateAnswers::Faq(Vec::<FaqEntry>::new())))
        .await
        .unwrap_err();
    assert!(err.is_config_error());
    assert!(db::list_user_bots(&conn, OWNER).unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_launch_failure_keeps_row_without_process() {
    let f = fixture_with(Launcher::new("/nonexistent/botforge-runner", Vec::<String>::new()));
    let faq = vec![FaqEntry {
        question: "Часы работы".to_string(),
        answer: "С 9 до 18".to_string(),
    }];

    let err = f
        .provisioner
        .provision(request("Faq", TemplateAnswers::Faq(faq)))
        .await
        .unwrap_err();
    assert!(!err.is_config_error());
    assert!(user_message(&err).contains("Ошибка при запуске бота"));

    let conn = get_connection(&f.pool).unwrap();
    let bots = db::list_user_bots(&conn, OWNER).unwrap();
    assert_eq!(bots.len(), 1);
    assert_eq!(bots[0].pid, None);
}

//! On-disk layout of generated bots: `<bots dir>/<config id>/{bot.toml, bot.env, bot.log}`

use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};

use crate::core::config::supervisor::{CREDENTIAL_FILE, LOG_FILE, PROGRAM_FILE};
use crate::core::error::{AppError, AppResult};

/// Credential key the runtime reads its token from
pub const TOKEN_KEY: &str = "BOT_TOKEN";

/// Paths owned by one generated bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotFiles {
    pub dir: PathBuf,
    pub program: PathBuf,
    pub credential: PathBuf,
    pub log: PathBuf,
}

impl BotFiles {
    pub fn new(bots_dir: impl AsRef<Path>, config_id: i64) -> Self {
        Self::in_dir(bots_dir.as_ref().join(config_id.to_string()))
    }

    /// Layout of the directory holding `program`
    pub fn for_program(program: &Path) -> Self {
        let dir = program
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            program: program.to_path_buf(),
            ..Self::in_dir(dir)
        }
    }

    fn in_dir(dir: PathBuf) -> Self {
        Self {
            program: dir.join(PROGRAM_FILE),
            credential: dir.join(CREDENTIAL_FILE),
            log: dir.join(LOG_FILE),
            dir,
        }
    }

    /// Writes the credential file: a single `BOT_TOKEN=<token>` line, owner-only
    pub fn write_credential(&self, token: &SecretString) -> AppResult<()> {
        fs_err::create_dir_all(&self.dir)?;
        fs_err::write(&self.credential, format!("{}={}\n", TOKEN_KEY, token.expose_secret()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs_err::set_permissions(&self.credential, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Reads the token back without touching the process environment
    pub fn read_credential(&self) -> AppResult<SecretString> {
        read_credential(&self.credential)
    }

    /// Removes the whole bot directory; a missing directory is fine
    pub fn remove(&self) -> AppResult<()> {
        match fs_err::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn read_credential(path: &Path) -> AppResult<SecretString> {
    let entries = dotenvy::from_path_iter(path)
        .map_err(|e| AppError::Process(format!("cannot read {}: {}", path.display(), e)))?;

    for entry in entries {
        let (key, value) = entry.map_err(|e| AppError::Process(format!("malformed {}: {}", path.display(), e)))?;
        if key == TOKEN_KEY {
            return Ok(SecretString::from(value));
        }
    }
    Err(AppError::Process(format!("{} has no {}", path.display(), TOKEN_KEY)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_layout_is_namespaced_by_id() {
        let files = BotFiles::new("/srv/bots", 7);
        assert_eq!(files.dir, PathBuf::from("/srv/bots/7"));
        assert_eq!(files.program, PathBuf::from("/srv/bots/7/bot.toml"));
        assert_eq!(files.credential, PathBuf::from("/srv/bots/7/bot.env"));
        assert_eq!(files.log, PathBuf::from("/srv/bots/7/bot.log"));

        assert_eq!(BotFiles::for_program(Path::new("/srv/bots/7/bot.toml")), files);
        assert_eq!(BotFiles::for_program(Path::new("bot.toml")).dir, PathBuf::from("."));
    }

    #[test]
    fn test_credential_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let files = BotFiles::new(dir.path(), 3);
        files.write_credential(&SecretString::from("123456:ABC-def".to_string())).unwrap();

        let contents = fs_err::read_to_string(&files.credential).unwrap();
        assert_eq!(contents, "BOT_TOKEN=123456:ABC-def\n");
        assert_eq!(files.read_credential().unwrap().expose_secret(), "123456:ABC-def");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs_err::metadata(&files.credential).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        files.remove().unwrap();
        assert!(!files.dir.exists());
        files.remove().unwrap();
    }

    #[test]
    fn test_read_credential_without_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.env");
        fs_err::write(&path, "OTHER=1\n").unwrap();
        assert!(read_credential(&path).is_err());
        assert!(read_credential(&dir.path().join("missing.env")).is_err());
    }
}

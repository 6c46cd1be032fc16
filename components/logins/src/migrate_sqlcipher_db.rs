/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

// Code to migrate from an sqlcipher DB to a plaintext DB

use crate::db::MigrationMetrics;
use crate::encryption::EncryptorDecryptor;
use crate::error::*;
use crate::Login;
use crate::LoginStore;
use lazy_static::lazy_static;
use rusqlite::{Connection, NO_PARAMS};
use sql_support::ConnExt;
use std::path::Path;
use std::time::Instant;

// Keep it around to be easy to reference the old schema
pub const SQL_CIPHER_COLS: &str = "
    guid,
    username,
    password,
    hostname,
    httpRealm,
    formSubmitURL,
    usernameField,
    passwordField,
    timeCreated,
    timeLastUsed,
    timePasswordChanged,
    timesUsed
";

lazy_static! {
    pub static ref GET_BY_GUID_SQL: String = format!(
        "SELECT {common_cols}
         FROM loginsL
         WHERE is_deleted = 0

         UNION ALL
    
         SELECT {common_cols}
         FROM loginsM
         WHERE is_overridden IS NOT 1
        ",
        common_cols = SQL_CIPHER_COLS,
    );
}

pub fn migrate_sqlcipher_db_to_plaintext(
    old_db_path: impl AsRef<Path>,
    new_db_path: impl AsRef<Path>,
    old_encryption_key: &str,
    new_encryption_key: &str,
    salt: Option<&str>,
) -> Result<MigrationMetrics> {
    let mut db = Connection::open(old_db_path)?;
    init_sqlcipher_db(&mut db, old_encryption_key, salt)?;

    // Init the new plaintext db as we would a regular client
    let new_db_store = LoginStore::new(new_db_path)?;
    let metrics = migrate_from_sqlcipher_db(&mut db, new_db_store, new_encryption_key)?;

    Ok(metrics)
}

fn init_sqlcipher_db(db: &mut Connection, encryption_key: &str, salt: Option<&str>) -> Result<()> {
    // Most of this code was copied from the old LoginDB::with_connection() method.
    db.set_pragma("key", encryption_key)?
        .set_pragma("secure_delete", true)?;
    sqlcipher_3_compat(db)?;

    if let Some(s) = salt {
        // IOS clients need to manually specify the salt to work around locking issues.  If the
        // salt was passed in, assume that we also want to set cipher_plaintext_header_size.  See
        // https://www.zetetic.net/sqlcipher/sqlcipher-api/#cipher_plaintext_header_size.
        db.set_pragma("cipher_plaintext_header_size", 32)?;
        db.set_pragma("cipher_salt", format!("x'{}'", s))?;
    }

    // `temp_store = 2` is required on Android to force the DB to keep temp
    // files in memory, since on Android there's no tmp partition. See
    // https://github.com/mozilla/mentat/issues/505. Ideally we'd only
    // do this on Android, or allow caller to configure it.
    db.set_pragma("temp_store", 2)?;
    Ok(())
}

fn sqlcipher_3_compat(conn: &Connection) -> Result<()> {
    // SQLcipher pre-4.0.0 compatibility. Using SHA1 still
    // is less than ideal, but should be fine. Real uses of
    // this (lockwise, etc) use a real random string for the
    // encryption key, so the reduced KDF iteration count
    // is fine.
    conn.set_pragma("cipher_page_size", 1024)?
        .set_pragma("kdf_iter", 64000)?
        .set_pragma("cipher_hmac_algorithm", "HMAC_SHA1")?
        .set_pragma("cipher_kdf_algorithm", "PBKDF2_HMAC_SHA1")?;
    Ok(())
}

//Manually copy over row by row from sqlcipher db to a plaintext db
pub fn migrate_from_sqlcipher_db(
    cipher_conn: &mut Connection,
    new_db_store: LoginStore,
    encryption_key: &str,
) -> Result<MigrationMetrics> {
    let start_time = Instant::now();

    let mut metrics: MigrationMetrics = MigrationMetrics::default();

    // Select From both LoginsL and LoginsM with a union to ensure we're covering our
    // migration cases (one table has but not the other, etc)
    let mut select_stmt = cipher_conn.prepare(&GET_BY_GUID_SQL)?;

    // Use raw rows to avoid extra copying since we're looping over an entire table
    let mut rows = select_stmt.query(NO_PARAMS)?;
    while let Some(row) = rows.next()? {
        metrics.num_processed += 1;
        let guid: String = row.get("guid")?;
        let username: String = row.get("username").unwrap_or_default();
        let password: String = row.get("password")?;
        // migrating hostname to the new column origin
        let origin: String = row.get("hostname")?;
        let http_realm: Option<String> = row.get("httpRealm")?;
        // migrating formSubmitURL to the new column action origin
        let form_action_origin: Option<String> = row.get("formSubmitURL")?;
        let username_field: Option<String> = row.get("usernameField")?;
        let password_field: Option<String> = row.get("passwordField")?;
        let time_created: i64 = row.get("timeCreated")?;
        let time_last_used: i64 = row.get("timeLastUsed").unwrap_or_default();
        let time_password_changed: i64 = row.get("timePasswordChanged")?;
        let times_used: i64 = row.get("timesUsed")?;

        // TODO: Discuss
        // Need to handle in loginsL: local_modified, is_deleted
        // Feels like we potentially shouldn't migrate these fields?

        // Need to handle in loginsM: is_overridden, server_modified
        // Similar to the other: I only see server_modified potentially being needed

        // encrypt the username/password data
        let encryptor = EncryptorDecryptor::new(encryption_key)?;
        let login: Login = Login {
            id: guid.to_string(),
            username_enc: encryptor.encrypt(&username)?,
            password_enc: encryptor.encrypt(&password)?,
            origin,
            http_realm,
            form_action_origin,
            username_field: username_field.unwrap_or_default(),
            password_field: password_field.unwrap_or_default(),
            // TO_DO: Do we need to convert from microsecond timestamps to milliseconds??
            time_created,
            time_last_used,
            time_password_changed,
            times_used,
        };

        // Leveraging the add_or_update to get free fixup
        match new_db_store.add_or_update(login) {
            Ok(_) => {
                metrics.num_succeeded += 1;
            }
            Err(e) => {
                metrics.num_failed += 1;
                metrics.errors.push(e.to_string());
            }
        }
    }

    metrics.total_duration = start_time.elapsed().as_millis() as u64;
    Ok(metrics)
}

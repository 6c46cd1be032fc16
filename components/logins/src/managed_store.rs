use crate::db::LoginDb;
use crate::decrypt_login;
use crate::error::*;
use crate::login::{Login, LoginEntry};
use crate::store::LoginStore;
use nss::ensure_initialized_with_profile_dir;
use nss::pk11::sym_key::retrieve_or_create_and_import_and_persist_aes256_key_data;
use std::path::Path;
use std::sync::Arc;
use sync15::engine::SyncEngine;

// nickname for encryption key stored in NSS
static KEY_NAME: &str = "as-logins-key";

/*
 * Try to retrieve key from NSS key storage. If there is one, return it.
 * Otherwise create a key, store and return it.
*/
fn get_key() -> String {
    let key = retrieve_or_create_and_import_and_persist_aes256_key_data(KEY_NAME).unwrap();
    serde_json::to_string(&jwcrypto::Jwk::new_direct_from_bytes(None, &key)).unwrap()
}

pub struct ManagedLoginStore {
    pub store: LoginStore,
    pub key: String,
}

impl ManagedLoginStore {
    pub fn new(path: impl AsRef<Path>) -> ApiResult<Self> {
        ensure_initialized_with_profile_dir(&path);

        let db_filename = path.as_ref().join("as-logins.db");
        match LoginStore::new(db_filename) {
            Ok(store) => {
                let key = get_key();
                Ok(Self { store, key })
            }
            Err(e) => Err(e),
        }
    }

    pub fn new_from_db(path: impl AsRef<Path>, db: LoginDb) -> Self {
        ensure_initialized_with_profile_dir(&path);

        let store = LoginStore::new_from_db(db);
        let key = get_key();
        Self { store, key }
    }

    pub fn new_in_memory(path: impl AsRef<Path>) -> ApiResult<Self> {
        ensure_initialized_with_profile_dir(&path);

        match LoginStore::new_in_memory() {
            Ok(store) => {
                let key = get_key();
                Ok(Self { store, key })
            }
            Err(e) => Err(e),
        }
    }

    pub fn list(&self) -> ApiResult<Vec<Login>> {
        match self.store.list() {
            Ok(encrypted_logins) => Ok(encrypted_logins
                .into_iter()
                .map(|encrypted_login| decrypt_login(encrypted_login, &self.key).unwrap())
                .collect()),
            Err(e) => Err(e),
        }
    }

    pub fn get(&self, id: &str) -> ApiResult<Option<Login>> {
        match self.store.get(id) {
            Ok(Some(encrypted_login)) => Ok(Some(decrypt_login(encrypted_login, &self.key)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_by_base_domain(&self, base_domain: &str) -> ApiResult<Vec<Login>> {
        match self.store.get_by_base_domain(base_domain) {
            Ok(encrypted_logins) => Ok(encrypted_logins
                .into_iter()
                .map(|encrypted_login| decrypt_login(encrypted_login, &self.key).unwrap())
                .collect()),
            Err(e) => Err(e),
        }
    }

    pub fn find_login_to_update(&self, entry: LoginEntry) -> ApiResult<Option<Login>> {
        self.store.find_login_to_update(entry, &self.key)
    }

    pub fn touch(&self, id: &str) -> ApiResult<()> {
        self.store.touch(id)
    }

    pub fn delete(&self, id: &str) -> ApiResult<bool> {
        self.store.delete(id)
    }

    pub fn wipe_local(&self) -> ApiResult<()> {
        self.store.wipe_local()
    }

    pub fn reset(self: Arc<Self>) -> ApiResult<()> {
        todo!()
    }

    pub fn update(&self, id: &str, entry: LoginEntry) -> ApiResult<Login> {
        match self.store.update(id, entry, &self.key) {
            Ok(encrypted_login) => Ok(decrypt_login(encrypted_login, &self.key)?),
            Err(e) => Err(e),
        }
    }

    pub fn add(&self, entry: LoginEntry) -> ApiResult<Login> {
        match self.store.add(entry, &self.key) {
            Ok(encrypted_login) => Ok(decrypt_login(encrypted_login, &self.key)?),
            Err(e) => Err(e),
        }
    }

    pub fn add_or_update(&self, entry: LoginEntry) -> ApiResult<Login> {
        match self.store.add_or_update(entry, &self.key) {
            Ok(encrypted_login) => Ok(decrypt_login(encrypted_login, &self.key)?),
            Err(e) => Err(e),
        }
    }

    pub fn register_with_sync_manager(self: Arc<Self>) {
        todo!()
    }

    pub fn create_logins_sync_engine(self: Arc<Self>) -> ApiResult<Box<dyn SyncEngine>> {
        todo!()
    }
}


#[test]
fn test_send() {
    fn ensure_send<T: Send>() {}
    ensure_send::<ManagedLoginStore>();
}

//! Recording in-memory directory used by the tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::DirectoryClient;
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{DirectoryEntry, NewDirectoryUser, UAC_ACCOUNTDISABLE, UAC_NORMAL_ACCOUNT};

#[derive(Default)]
pub struct FakeDirectory {
    pub entries: Mutex<BTreeMap<String, DirectoryEntry>>,
    pub passwords: Mutex<BTreeMap<String, String>>,
    /// Every call, in order, as `op:argument`.
    pub calls: Mutex<Vec<String>>,
    /// Calls that fail with a rejection, matched by prefix (`"enable"`, `"replace:sn="`).
    pub failing: Mutex<Vec<String>>,
    pub closed: Mutex<bool>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(username: &str) -> Self {
        let dir = Self::new();
        dir.entries
            .lock()
            .unwrap()
            .insert(username.to_string(), entry(username, UAC_NORMAL_ACCOUNT));
        dir
    }

    pub fn fail_on(&self, call_prefix: &str) {
        self.failing.lock().unwrap().push(call_prefix.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("find:"))
            .collect()
    }

    pub fn entry(&self, username: &str) -> Option<DirectoryEntry> {
        self.entries.lock().unwrap().get(username).cloned()
    }

    fn record(&self, op: &'static str, arg: &str) -> DirectoryResult<()> {
        let call = format!("{op}:{arg}");
        self.calls.lock().unwrap().push(call.clone());
        if self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| call.starts_with(prefix.as_str()))
        {
            return Err(DirectoryError::Rejected {
                op,
                message: "simulated failure".to_string(),
            });
        }
        Ok(())
    }

    fn update_uac(&self, username: &str, f: impl Fn(u32) -> u32) -> DirectoryResult<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(username)
            .ok_or_else(|| DirectoryError::NoSuchUser(username.to_string()))?;
        entry.user_account_control = f(entry.user_account_control);
        Ok(())
    }
}

fn entry(username: &str, uac: u32) -> DirectoryEntry {
    DirectoryEntry {
        dn: format!("CN={username},CN=Users,DC=example,DC=edu"),
        sam_account_name: username.to_string(),
        upn: Some(format!("{username}@example.edu")),
        given_name: None,
        surname: None,
        login_shell: None,
        unix_home: None,
        user_account_control: uac,
    }
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
    async fn find_user(&self, username: &str) -> DirectoryResult<Option<DirectoryEntry>> {
        self.record("find", username)?;
        Ok(self.entry(username))
    }

    async fn create_user(&self, user: &NewDirectoryUser) -> DirectoryResult<String> {
        self.record("create", &user.username)?;
        let mut e = entry(&user.username, UAC_NORMAL_ACCOUNT);
        e.given_name = Some(user.given_name.clone());
        e.surname = Some(user.surname.clone());
        e.login_shell = Some(user.login_shell.clone());
        e.unix_home = Some(user.unix_home.clone());
        let dn = e.dn.clone();
        self.entries
            .lock()
            .unwrap()
            .insert(user.username.clone(), e);
        self.passwords
            .lock()
            .unwrap()
            .insert(user.username.clone(), user.password.clone());
        Ok(dn)
    }

    async fn disable_account(&self, username: &str) -> DirectoryResult<()> {
        self.record("disable", username)?;
        self.update_uac(username, |uac| uac | UAC_ACCOUNTDISABLE)
    }

    async fn enable_account(&self, username: &str) -> DirectoryResult<()> {
        self.record("enable", username)?;
        self.update_uac(username, |uac| uac & !UAC_ACCOUNTDISABLE)
    }

    async fn set_password(&self, username: &str, password: &str) -> DirectoryResult<()> {
        self.record("password", username)?;
        if self.entry(username).is_none() {
            return Err(DirectoryError::NoSuchUser(username.to_string()));
        }
        self.passwords
            .lock()
            .unwrap()
            .insert(username.to_string(), password.to_string());
        Ok(())
    }

    async fn replace_attribute(
        &self,
        dn: &str,
        attribute: &str,
        value: &str,
    ) -> DirectoryResult<()> {
        self.record("replace", &format!("{attribute}={value}"))?;
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .values_mut()
            .find(|e| e.dn == dn)
            .ok_or_else(|| DirectoryError::NoSuchUser(dn.to_string()))?;
        match attribute {
            "givenName" => entry.given_name = Some(value.to_string()),
            "sn" => entry.surname = Some(value.to_string()),
            "loginShell" => entry.login_shell = Some(value.to_string()),
            _ => {}
        }
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> DirectoryResult<()> {
        self.record("delete", username)?;
        self.entries
            .lock()
            .unwrap()
            .remove(username)
            .map(|_| ())
            .ok_or_else(|| DirectoryError::NoSuchUser(username.to_string()))
    }

    async fn test_connection(&self) -> DirectoryResult<()> {
        self.record("test", "")
    }

    async fn close(&self) -> DirectoryResult<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

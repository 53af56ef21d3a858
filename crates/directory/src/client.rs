//! LDAP client for the Samba AD DC.

use std::collections::HashSet;

use async_trait::async_trait;
use es4c_core::config::DirectoryConfig;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Mod, Scope, SearchEntry};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{DirectoryEntry, NewDirectoryUser, UAC_ACCOUNTDISABLE, UAC_NORMAL_ACCOUNT};

const USER_ATTRS: &[&str] = &[
    "sAMAccountName",
    "userPrincipalName",
    "givenName",
    "sn",
    "loginShell",
    "unixHomeDirectory",
    "userAccountControl",
];

/// Operations the directory worker needs. Usernames are expected to be normalized already.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Look up a user by `sAMAccountName`.
    async fn find_user(&self, username: &str) -> DirectoryResult<Option<DirectoryEntry>>;

    /// Create a user and return its DN. The account is created enabled.
    async fn create_user(&self, user: &NewDirectoryUser) -> DirectoryResult<String>;

    async fn disable_account(&self, username: &str) -> DirectoryResult<()>;

    async fn enable_account(&self, username: &str) -> DirectoryResult<()>;

    async fn set_password(&self, username: &str, password: &str) -> DirectoryResult<()>;

    /// Replace all values of one attribute on the entry at `dn`.
    async fn replace_attribute(&self, dn: &str, attribute: &str, value: &str)
        -> DirectoryResult<()>;

    async fn delete_user(&self, username: &str) -> DirectoryResult<()>;

    /// Connect and bind, without touching any entry.
    async fn test_connection(&self) -> DirectoryResult<()>;

    /// Release the connection, if one is open.
    async fn close(&self) -> DirectoryResult<()>;
}

/// Directory client holding one bound connection, opened on first use.
///
/// A request that fails in transit drops the connection; the next request
/// reconnects and binds again.
pub struct LdapDirectory {
    server: String,
    bind_dn: String,
    bind_password: String,
    base_dn: String,
    users_container: String,
    realm: String,
    tls_verify: bool,
    conn: Mutex<Option<Ldap>>,
}

impl LdapDirectory {
    pub fn new(config: &DirectoryConfig) -> Self {
        Self {
            server: config.server.clone(),
            bind_dn: config.bind_dn.clone(),
            bind_password: config.admin_password.clone(),
            base_dn: config.base_dn.clone(),
            users_container: config.users_container.clone(),
            realm: realm_from_base_dn(&config.base_dn),
            tls_verify: config.tls_verify,
            conn: Mutex::new(None),
        }
    }

    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// DN a new user gets: the username as CN inside the users container.
    pub fn user_dn(&self, username: &str) -> String {
        format!(
            "CN={},{},{}",
            ldap3::dn_escape(username),
            self.users_container,
            self.base_dn
        )
    }

    async fn connect(&self) -> DirectoryResult<Ldap> {
        let settings = LdapConnSettings::new().set_no_tls_verify(!self.tls_verify);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.server)
            .await
            .map_err(|e| DirectoryError::Connect(e.to_string()))?;

        ldap3::drive!(conn);

        ldap.simple_bind(&self.bind_dn, &self.bind_password)
            .await
            .map_err(|e| DirectoryError::Bind(e.to_string()))?
            .success()
            .map_err(|e| DirectoryError::Bind(e.to_string()))?;

        debug!(server = %self.server, "LDAP bind successful");
        Ok(ldap)
    }

    /// Handle to the shared connection, binding a new one if needed.
    async fn ldap(&self) -> DirectoryResult<Ldap> {
        let mut guard = self.conn.lock().await;
        if let Some(ldap) = guard.as_ref() {
            return Ok(ldap.clone());
        }
        let ldap = self.connect().await?;
        info!(server = %self.server, bind_dn = %self.bind_dn, "directory connection opened");
        *guard = Some(ldap.clone());
        Ok(ldap)
    }

    /// Map a transport-level result, dropping the shared connection on failure.
    async fn sent<T>(&self, op: &'static str, result: Result<T, LdapError>) -> DirectoryResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(op, error = %e, "LDAP request failed, dropping connection");
                self.conn.lock().await.take();
                Err(DirectoryError::Transport {
                    op,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn modify(&self, op: &'static str, dn: &str, mods: Vec<Mod<Vec<u8>>>) -> DirectoryResult<()> {
        let mut ldap = self.ldap().await?;
        let result = ldap.modify(dn, mods).await;
        self.sent(op, result)
            .await?
            .success()
            .map_err(|e| DirectoryError::Rejected {
                op,
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn require_user(&self, username: &str) -> DirectoryResult<DirectoryEntry> {
        self.find_user(username)
            .await?
            .ok_or_else(|| DirectoryError::NoSuchUser(username.to_string()))
    }

    async fn set_uac(&self, entry: &DirectoryEntry, uac: u32) -> DirectoryResult<()> {
        if uac == entry.user_account_control {
            return Ok(());
        }
        self.modify(
            "modify",
            &entry.dn,
            vec![replace("userAccountControl", uac.to_string().into_bytes())],
        )
        .await
    }
}

#[async_trait]
impl DirectoryClient for LdapDirectory {
    async fn find_user(&self, username: &str) -> DirectoryResult<Option<DirectoryEntry>> {
        let filter = format!("(sAMAccountName={})", ldap3::ldap_escape(username));
        let mut ldap = self.ldap().await?;
        let result = ldap
            .search(&self.base_dn, Scope::Subtree, &filter, USER_ATTRS.to_vec())
            .await;
        let (entries, _) = self
            .sent("search", result)
            .await?
            .success()
            .map_err(|e| DirectoryError::Rejected {
                op: "search",
                message: e.to_string(),
            })?;

        let Some(entry) = entries.into_iter().next() else {
            return Ok(None);
        };
        let se = SearchEntry::construct(entry);
        let uac = match optional_attr(&se, "userAccountControl") {
            Some(raw) => parse_uac(&raw)?,
            None => UAC_NORMAL_ACCOUNT,
        };
        Ok(Some(DirectoryEntry {
            sam_account_name: optional_attr(&se, "sAMAccountName")
                .unwrap_or_else(|| username.to_string()),
            upn: optional_attr(&se, "userPrincipalName"),
            given_name: optional_attr(&se, "givenName"),
            surname: optional_attr(&se, "sn"),
            login_shell: optional_attr(&se, "loginShell"),
            unix_home: optional_attr(&se, "unixHomeDirectory"),
            user_account_control: uac,
            dn: se.dn,
        }))
    }

    async fn create_user(&self, user: &NewDirectoryUser) -> DirectoryResult<String> {
        let dn = self.user_dn(&user.username);
        let upn = format!("{}@{}", user.username, self.realm);
        let display_name = format!("{} {}", user.given_name, user.surname)
            .trim()
            .to_string();

        let mut attrs: Vec<(Vec<u8>, HashSet<Vec<u8>>)> = vec![
            attr_values(
                "objectClass",
                &["top", "person", "organizationalPerson", "user"],
            ),
            attr("sAMAccountName", &user.username),
            attr("userPrincipalName", &upn),
            attr("loginShell", &user.login_shell),
            attr("unixHomeDirectory", &user.unix_home),
            attr("userAccountControl", &UAC_NORMAL_ACCOUNT.to_string()),
            (
                b"unicodePwd".to_vec(),
                HashSet::from([encode_ad_password(&user.password)]),
            ),
        ];
        // Empty values are not allowed in an add request.
        for (name, value) in [
            ("givenName", &user.given_name),
            ("sn", &user.surname),
            ("displayName", &display_name),
        ] {
            if !value.is_empty() {
                attrs.push(attr(name, value));
            }
        }

        let mut ldap = self.ldap().await?;
        let result = ldap.add(&dn, attrs).await;
        self.sent("add", result)
            .await?
            .success()
            .map_err(|e| DirectoryError::Rejected {
                op: "add",
                message: e.to_string(),
            })?;

        info!(dn = %dn, username = %user.username, "directory user created");
        Ok(dn)
    }

    async fn disable_account(&self, username: &str) -> DirectoryResult<()> {
        let entry = self.require_user(username).await?;
        self.set_uac(&entry, entry.user_account_control | UAC_ACCOUNTDISABLE)
            .await?;
        info!(dn = %entry.dn, "directory account disabled");
        Ok(())
    }

    async fn enable_account(&self, username: &str) -> DirectoryResult<()> {
        let entry = self.require_user(username).await?;
        self.set_uac(&entry, entry.user_account_control & !UAC_ACCOUNTDISABLE)
            .await?;
        info!(dn = %entry.dn, "directory account enabled");
        Ok(())
    }

    async fn set_password(&self, username: &str, password: &str) -> DirectoryResult<()> {
        let entry = self.require_user(username).await?;
        self.modify(
            "password change",
            &entry.dn,
            vec![replace("unicodePwd", encode_ad_password(password))],
        )
        .await?;
        info!(dn = %entry.dn, "directory password set");
        Ok(())
    }

    async fn replace_attribute(
        &self,
        dn: &str,
        attribute: &str,
        value: &str,
    ) -> DirectoryResult<()> {
        self.modify("modify", dn, vec![replace_value(attribute, value)])
            .await?;
        debug!(dn = %dn, attribute, "directory attribute replaced");
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> DirectoryResult<()> {
        let entry = self.require_user(username).await?;
        let mut ldap = self.ldap().await?;
        let result = ldap.delete(&entry.dn).await;
        self.sent("delete", result)
            .await?
            .success()
            .map_err(|e| DirectoryError::Rejected {
                op: "delete",
                message: e.to_string(),
            })?;
        info!(dn = %entry.dn, "directory user deleted");
        Ok(())
    }

    async fn test_connection(&self) -> DirectoryResult<()> {
        let mut ldap = self.connect().await?;
        ldap.unbind()
            .await
            .map_err(|e| DirectoryError::Transport {
                op: "unbind",
                message: e.to_string(),
            })?;
        info!(server = %self.server, "directory connection test successful");
        Ok(())
    }

    async fn close(&self) -> DirectoryResult<()> {
        let Some(mut ldap) = self.conn.lock().await.take() else {
            return Ok(());
        };
        ldap.unbind()
            .await
            .map_err(|e| DirectoryError::Transport {
                op: "unbind",
                message: e.to_string(),
            })?;
        info!(server = %self.server, "directory connection closed");
        Ok(())
    }
}

/// Encode a password in the format AD expects for unicodePwd: UTF-16LE of `"password"`.
pub fn encode_ad_password(password: &str) -> Vec<u8> {
    format!("\"{password}\"")
        .encode_utf16()
        .flat_map(|c| c.to_le_bytes())
        .collect()
}

/// DNS realm of a base DN: `DC=example,DC=edu` becomes `example.edu`.
pub fn realm_from_base_dn(base_dn: &str) -> String {
    base_dn
        .split(',')
        .filter_map(|rdn| {
            let (key, value) = rdn.trim().split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("dc")
                .then(|| value.trim().to_ascii_lowercase())
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn parse_uac(raw: &str) -> DirectoryResult<u32> {
    // AD may return the value as a signed 32-bit integer.
    raw.trim()
        .parse::<u32>()
        .or_else(|_| raw.trim().parse::<i32>().map(|v| v as u32))
        .map_err(|_| DirectoryError::InvalidData(format!("userAccountControl `{raw}`")))
}

fn attr(name: &str, value: &str) -> (Vec<u8>, HashSet<Vec<u8>>) {
    (
        name.as_bytes().to_vec(),
        HashSet::from([value.as_bytes().to_vec()]),
    )
}

fn attr_values(name: &str, values: &[&str]) -> (Vec<u8>, HashSet<Vec<u8>>) {
    (
        name.as_bytes().to_vec(),
        values.iter().map(|v| v.as_bytes().to_vec()).collect(),
    )
}

fn replace(name: &str, value: Vec<u8>) -> Mod<Vec<u8>> {
    Mod::Replace(name.as_bytes().to_vec(), HashSet::from([value]))
}

/// Replace an attribute with a text value; an empty value clears it, since AD
/// rejects empty strings.
fn replace_value(name: &str, value: &str) -> Mod<Vec<u8>> {
    if value.is_empty() {
        Mod::Replace(name.as_bytes().to_vec(), HashSet::new())
    } else {
        replace(name, value.as_bytes().to_vec())
    }
}

/// Extract the first value of an attribute as Option.
fn optional_attr(entry: &SearchEntry, attr: &str) -> Option<String> {
    entry.attrs.get(attr).and_then(|v| v.first()).cloned()
}

//! Directory-side data (not the local account model, which lives in es4c-core).

/// `userAccountControl` bit marking an account disabled.
pub const UAC_ACCOUNTDISABLE: u32 = 0x0002;
/// Normal enabled user account.
pub const UAC_NORMAL_ACCOUNT: u32 = 0x0200;

/// A user entry found in the directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub sam_account_name: String,
    pub upn: Option<String>,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub login_shell: Option<String>,
    pub unix_home: Option<String>,
    pub user_account_control: u32,
}

impl DirectoryEntry {
    pub fn is_disabled(&self) -> bool {
        self.user_account_control & UAC_ACCOUNTDISABLE != 0
    }
}

/// A user to be created. All string fields are already ASCII-normalized.
#[derive(Clone, PartialEq)]
pub struct NewDirectoryUser {
    pub username: String,
    pub password: String,
    pub given_name: String,
    pub surname: String,
    pub login_shell: String,
    pub unix_home: String,
}

impl std::fmt::Debug for NewDirectoryUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewDirectoryUser")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("given_name", &self.given_name)
            .field("surname", &self.surname)
            .field("login_shell", &self.login_shell)
            .field("unix_home", &self.unix_home)
            .finish()
    }
}

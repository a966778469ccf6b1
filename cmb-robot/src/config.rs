//! Settings consumed by the robot and the monitor.

use crate::process::exe_file_name;
use crate::RobotError;
use serde::Deserialize;
use std::fmt;

pub const DEFAULT_CLIENT_PATH: &str = "C:\\Program Files\\CMB\\FbSdk\\Bin\\FBSdkManager.exe";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Caption of the client's main window, before the optional version suffix.
pub const PRODUCT_NAME: &str = "招商银行企业银行直联";

pub const PASSWORD_LENGTH: usize = 8;

/// The flat key/value settings file, already decrypted.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RobotSettings {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub login_password: String,
    #[serde(default)]
    pub usbkey_password: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub cmb_version: String,

    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub system_sn: String,
    #[serde(default)]
    pub channel_sn: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub date: String,
}

fn default_path() -> String {
    DEFAULT_CLIENT_PATH.to_string()
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

impl fmt::Debug for RobotSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobotSettings")
            .field("username", &self.username)
            .field("path", &self.path)
            .field("listen_addr", &self.listen_addr)
            .field("cmb_version", &self.cmb_version)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Who the robot logs in as and which client it drives. Immutable.
#[derive(Clone)]
pub struct RobotIdentity {
    username: String,
    login_password: String,
    usb_key_password: String,
    path: String,
    exe_name: String,
    listen_addr: String,
    main_title: String,
}

impl RobotIdentity {
    pub fn new(
        username: impl Into<String>,
        login_password: impl Into<String>,
        usb_key_password: impl Into<String>,
        path: impl Into<String>,
        listen_addr: impl Into<String>,
        version_suffix: &str,
    ) -> Result<Self, RobotError> {
        let username = username.into();
        let login_password = login_password.into();
        let usb_key_password = usb_key_password.into();
        let path = path.into();

        if username.is_empty() {
            return Err(RobotError::EmptyUserName);
        }
        if login_password.chars().count() != PASSWORD_LENGTH {
            return Err(RobotError::BadLoginPasswordLength);
        }
        if usb_key_password.chars().count() != PASSWORD_LENGTH {
            return Err(RobotError::BadUsbKeyPasswordLength);
        }

        let exe_name = exe_file_name(&path).to_string();
        Ok(Self {
            username,
            login_password,
            usb_key_password,
            path,
            exe_name,
            listen_addr: listen_addr.into(),
            main_title: format!("{PRODUCT_NAME}{version_suffix}"),
        })
    }

    pub fn from_settings(settings: &RobotSettings) -> Result<Self, RobotError> {
        Self::new(
            settings.username.clone(),
            settings.login_password.clone(),
            settings.usbkey_password.clone(),
            settings.path.clone(),
            settings.listen_addr.clone(),
            &settings.cmb_version,
        )
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn login_password(&self) -> &str {
        &self.login_password
    }

    pub fn usb_key_password(&self) -> &str {
        &self.usb_key_password
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn exe_name(&self) -> &str {
        &self.exe_name
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    pub fn main_title(&self) -> &str {
        &self.main_title
    }
}

impl fmt::Debug for RobotIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobotIdentity")
            .field("username", &self.username)
            .field("path", &self.path)
            .field("listen_addr", &self.listen_addr)
            .field("main_title", &self.main_title)
            .finish_non_exhaustive()
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RobotError {
    #[error("empty username")]
    EmptyUserName,

    #[error("login password length is not 8")]
    BadLoginPasswordLength,

    #[error("usb key password length is not 8")]
    BadUsbKeyPasswordLength,

    #[error("login window not found")]
    LoginWindowNotFound,

    #[error("login window status not correct")]
    LoginWindowNotCorrect,

    #[error("password box count not correct")]
    BadPasswordBoxCount,

    #[error("confirm login failure")]
    ConfirmLoginFailure,

    #[error("login form did not dismiss")]
    LoginFormDidNotDismiss,

    #[error("main window not found")]
    MainWindowNotFound,

    #[error("process not alive")]
    ProcessNotAlive,

    #[error("restart failure: {0}")]
    RestartFailure(String),

    #[error("listen failure")]
    ListenFailure,

    #[error("login timeout")]
    LoginTimeout,

    #[error("login failure at {time}: {message}")]
    LoginFailure { message: String, time: String },

    #[error("network error")]
    NetworkError,

    #[error("crash window found")]
    CrashWindow,

    #[error("open usb key failure")]
    OpenUsbKeyFailure,

    #[error("wrong usb key password")]
    WrongUsbKeyPassword,

    #[error("wrong login password")]
    WrongLoginPassword,

    #[error("empty username while login")]
    EmptyUserNameWhileLogin,

    #[error("expected 2 list views in the main window, found {found}")]
    ListViewCount { found: usize },

    #[error("process died {restarts} times in a row while recovering")]
    ProcessUnstable { restarts: usize },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),
}

impl RobotError {
    /// Conditions that need an operator; retrying cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RobotError::WrongLoginPassword
                | RobotError::WrongUsbKeyPassword
                | RobotError::CrashWindow
        )
    }

    /// Wrong credentials. Retrying would risk locking the account or the key.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            RobotError::WrongLoginPassword | RobotError::WrongUsbKeyPassword
        )
    }
}

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("{0} is empty")]
    MissingField(&'static str),

    #[error("expected amount could not be zero")]
    AmountIsZero,

    #[error("bad tx resp count: {count}")]
    BadTxCount { count: usize },

    #[error("bad response tx amount: got {actual}, expected {expected}")]
    BadRespTxAmount { actual: i64, expected: i64 },

    #[error("bad response channel sn: got {actual}, expected {expected}")]
    BadRespChannelSn { actual: String, expected: String },

    #[error("bad response tx status: got {actual}, expected {expected}")]
    BadRespTxStatus { actual: String, expected: String },

    #[error("CMB Enterprise error: {function}; Return code: {code}; Error message: {message}")]
    ActionFailed {
        function: String,
        code: i64,
        message: String,
    },

    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("xml error: {0}")]
    Xml(String),
}

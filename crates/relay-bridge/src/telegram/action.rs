//! Callback payloads of the inline keyboards: `verb[:argument]`.

const MAX_CALLBACK_DATA: usize = 64;

pub const MENU: &str = "menu";
pub const THREADS: &str = "threads";
pub const SELECT: &str = "select";
pub const MESSAGES: &str = "messages";
pub const VIEW: &str = "view";
pub const CURRENT: &str = "current";
pub const REFRESH: &str = "refresh";
pub const DEBUG: &str = "debug";

/// A decoded button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Menu,
    /// Thread list page.
    Threads(usize),
    /// Index into the thread cache.
    Select(usize),
    /// Message list page, 0 = newest.
    Messages(usize),
    /// Index into the message cache.
    View(usize),
    Current,
    Refresh,
    Debug,
    /// Anything that did not decode; carries the raw payload.
    Unknown(String),
}

impl Action {
    /// Decode a callback payload. Never fails: malformed input becomes
    /// `Action::Unknown`.
    pub fn parse(data: &str) -> Self {
        let (verb, arg) = match data.split_once(':') {
            Some((verb, arg)) => (verb, Some(arg)),
            None => (data, None),
        };
        let index = || arg.and_then(|a| a.parse::<usize>().ok());
        // Page verbs default to the first page when the argument is absent.
        let page = || match arg {
            None => Some(0),
            Some(_) => index(),
        };

        let decoded = match verb {
            MENU => Some(Action::Menu),
            THREADS => page().map(Action::Threads),
            SELECT => index().map(Action::Select),
            MESSAGES => page().map(Action::Messages),
            VIEW => index().map(Action::View),
            CURRENT => Some(Action::Current),
            REFRESH => Some(Action::Refresh),
            DEBUG => Some(Action::Debug),
            _ => None,
        };
        decoded.unwrap_or_else(|| Action::Unknown(data.to_string()))
    }

    pub fn callback_data(&self) -> String {
        let data = match self {
            Action::Menu => MENU.to_string(),
            Action::Threads(page) => format!("{THREADS}:{page}"),
            Action::Select(idx) => format!("{SELECT}:{idx}"),
            Action::Messages(page) => format!("{MESSAGES}:{page}"),
            Action::View(idx) => format!("{VIEW}:{idx}"),
            Action::Current => CURRENT.to_string(),
            Action::Refresh => REFRESH.to_string(),
            Action::Debug => DEBUG.to_string(),
            Action::Unknown(raw) => raw.clone(),
        };
        truncate_callback_data(data)
    }
}

fn truncate_callback_data(mut data: String) -> String {
    if data.len() > MAX_CALLBACK_DATA {
        let mut end = MAX_CALLBACK_DATA;
        while end > 0 && !data.is_char_boundary(end) {
            end -= 1;
        }
        data.truncate(end);
    }
    data
}

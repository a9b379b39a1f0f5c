//! Wire types for the compositor control socket.
//!
//! Every message is one JSON object per line. Requests carry an `id` and a
//! `method` tag; replies echo the `id`. Events pushed to subscribers have no
//! `id`. The fixed-layout payloads keep the byte bounds clients were built
//! against, so strings are truncated rather than rejected.

use base64::Engine;
use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geometry::Rect;
use crate::ipc::errors::IpcError;
use crate::notifications::{NotificationAck, NotificationContent, NotificationMethod};
use crate::process::Pid;

/// A string bounded to `N - 1` bytes, the layout of a NUL-terminated
/// `char[N]` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FixedStr<const N: usize>(String);

impl<const N: usize> FixedStr<N> {
    pub const MAX_LEN: usize = N - 1;

    /// Truncates on a character boundary.
    pub fn new(s: &str) -> Self {
        let mut end = s.len().min(Self::MAX_LEN);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        Self(s[..end].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append exactly `N` bytes, NUL padded.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.0.as_bytes());
        out.resize(out.len() + N - self.0.len(), 0);
    }

    /// Read from an `N`-byte field, stopping at the first NUL.
    pub fn read_from(field: &[u8]) -> Self {
        let field = &field[..field.len().min(N)];
        let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
        Self::new(&String::from_utf8_lossy(&field[..end]))
    }
}

impl<const N: usize> From<&str> for FixedStr<N> {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl<const N: usize> std::fmt::Display for FixedStr<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const N: usize> Serialize for FixedStr<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de, const N: usize> Deserialize<'de> for FixedStr<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

pub type AppName = FixedStr<64>;
pub type IconPath = FixedStr<256>;
pub type Uuid = FixedStr<37>;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AppStatus: u32 {
        const HIDDEN = 0x01;
        const VISIBLE = 0x02;
        const STARTING = 0x04;
        const QUIT = 0x08;
        /// The app allows multiple instances.
        const MULTI = 0x10;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityData {
    /// [`AppStatus`] bits.
    pub status: u32,
    pub name: AppName,
    pub pid: Pid,
}

impl VisibilityData {
    pub fn new(status: AppStatus, name: &str, pid: Pid) -> Self {
        Self {
            status: status.bits(),
            name: AppName::new(name),
            pid,
        }
    }

    pub fn status(&self) -> AppStatus {
        AppStatus::from_bits_truncate(self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(default)]
    pub body: FixedStr<256>,
    #[serde(default)]
    pub icon: FixedStr<256>,
    #[serde(default)]
    pub origin: FixedStr<256>,
    #[serde(default)]
    pub tag: FixedStr<128>,
    #[serde(default)]
    pub title: FixedStr<128>,
    #[serde(default)]
    pub uuid: Uuid,
    pub client: Pid,
}

impl NotificationData {
    pub fn into_content(self) -> NotificationContent {
        NotificationContent {
            title: self.title.0,
            body: self.body.0,
            icon: self.icon.0,
            origin: self.origin.0,
            tag: self.tag.0,
            uuid: self.uuid.0,
            client: self.client,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAckData {
    pub method: NotificationMethod,
    pub uuid: Uuid,
    pub client: Pid,
}

impl From<NotificationAck> for NotificationAckData {
    fn from(ack: NotificationAck) -> Self {
        Self {
            method: ack.method,
            uuid: Uuid::new(&ack.uuid),
            client: ack.client,
        }
    }
}

/// One entry of the flat app-list buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppData {
    pub name: AppName,
    pub icon: IconPath,
}

const APP_DATA_LEN: usize = 64 + 256;

/// `{count: i32 LE, AppData[count]}`.
pub fn encode_app_list(apps: &[AppData]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + apps.len() * APP_DATA_LEN);
    out.extend_from_slice(&(apps.len() as i32).to_le_bytes());
    for app in apps {
        app.name.write_to(&mut out);
        app.icon.write_to(&mut out);
    }
    out
}

pub fn decode_app_list(buf: &[u8]) -> Result<Vec<AppData>, IpcError> {
    let header: [u8; 4] = buf
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(IpcError::BufferTooShort {
            expected: 4,
            actual: buf.len(),
        })?;
    let count = i32::from_le_bytes(header);
    if count < 0 {
        return Err(IpcError::ProtocolError {
            message: format!("negative app count {}", count),
        });
    }
    let count = count as usize;
    let expected = 4 + count * APP_DATA_LEN;
    if buf.len() < expected {
        return Err(IpcError::BufferTooShort {
            expected,
            actual: buf.len(),
        });
    }
    Ok(buf[4..expected]
        .chunks_exact(APP_DATA_LEN)
        .map(|entry| AppData {
            name: AppName::read_from(&entry[..64]),
            icon: IconPath::read_from(&entry[64..]),
        })
        .collect())
}

pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>, IpcError> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| IpcError::ProtocolError {
            message: format!("invalid base64 payload: {}", e),
        })
}

/// Methods a client may invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Method {
    /// Register this connection for events addressed to `pid`.
    Subscribe { pid: Pid },
    AddNotification { data: NotificationData },
    GetAppList,
    #[serde(rename = "get_fps")]
    GetFps,
    ShowHome,
    HideHome,
    ShowSwitcher,
    HideSwitcher,
    SendBackKey,
    /// Raise the on-screen keyboard so `rect` of the caller stays visible.
    ShowOsk { rect: Rect },
    HideOsk,
    /// A key typed on the on-screen keyboard.
    ConsumeKey { key: u32 },
    /// JSON settings document, see `compositor::settings::OptionsPayload`.
    SetOptions { payload: String },
    StartApp { name: AppName },
    /// Stop the compositor.
    Shutdown,
    #[serde(other)]
    Unknown,
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Subscribe { .. } => "subscribe",
            Method::AddNotification { .. } => "add_notification",
            Method::GetAppList => "get_app_list",
            Method::GetFps => "get_fps",
            Method::ShowHome => "show_home",
            Method::HideHome => "hide_home",
            Method::ShowSwitcher => "show_switcher",
            Method::HideSwitcher => "hide_switcher",
            Method::SendBackKey => "send_back_key",
            Method::ShowOsk { .. } => "show_osk",
            Method::HideOsk => "hide_osk",
            Method::ConsumeKey { .. } => "consume_key",
            Method::SetOptions { .. } => "set_options",
            Method::StartApp { .. } => "start_app",
            Method::Shutdown => "shutdown",
            Method::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    #[serde(flatten)]
    pub method: Method,
}

/// Events pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CompositorEvent {
    AppStatus(VisibilityData),
    BackKeyVisible,
    BackKeyHidden,
    /// Delivered only to the subscriber whose pid is `client`.
    NotificationAck(NotificationAckData),
    SendingAppList { count: i32, data: String },
    SwitcherVisible,
    SwitcherHidden,
}

/// Compositor to client lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ack {
        id: String,
    },
    Error {
        id: String,
        code: String,
        message: String,
    },
    AppList {
        id: String,
        count: i32,
        /// Base64 of the flat app-list buffer.
        data: String,
    },
    Fps {
        id: String,
        fps: f32,
    },
    Event(CompositorEvent),
}

pub const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_str_truncates_on_char_boundary() {
        let s: FixedStr<4> = FixedStr::new("aé€");
        // "aé" is 3 bytes; the euro sign would overflow.
        assert_eq!(s.as_str(), "aé");
        let long = AppName::new(&"x".repeat(100));
        assert_eq!(long.as_str().len(), 63);
    }

    #[test]
    fn test_fixed_str_field_layout() {
        let mut out = Vec::new();
        FixedStr::<8>::new("abc").write_to(&mut out);
        assert_eq!(out, b"abc\0\0\0\0\0");
        assert_eq!(FixedStr::<8>::read_from(&out).as_str(), "abc");
    }

    #[test]
    fn test_app_list_buffer_layout() {
        let apps = vec![
            AppData {
                name: "Browser".into(),
                icon: "/usr/share/icons/browser.png".into(),
            },
            AppData {
                name: "Clock".into(),
                icon: "".into(),
            },
        ];
        let buf = encode_app_list(&apps);
        assert_eq!(buf.len(), 4 + 2 * 320);
        assert_eq!(&buf[..4], &2i32.to_le_bytes());
        assert_eq!(&buf[4..11], b"Browser");
        assert_eq!(decode_app_list(&buf).unwrap(), apps);
    }

    #[test]
    fn test_app_list_rejects_short_buffer() {
        let mut buf = encode_app_list(&[AppData {
            name: "A".into(),
            icon: "B".into(),
        }]);
        buf.truncate(100);
        assert!(matches!(
            decode_app_list(&buf),
            Err(IpcError::BufferTooShort { expected: 324, actual: 100 })
        ));
        assert!(decode_app_list(&[1, 0]).is_err());
    }

    #[test]
    fn test_request_wire_format() {
        let json = r#"{"id":"7","method":"start_app","name":"Browser"}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(request.id, "7");
        assert_eq!(
            request.method,
            Method::StartApp {
                name: "Browser".into()
            }
        );

        let json = r#"{"id":"8","method":"get_fps"}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(request.method, Method::GetFps);
    }

    #[test]
    fn test_keyboard_methods_wire_format() {
        let json = r#"{"id":"5","method":"show_osk","rect":{"x":0,"y":400,"width":200,"height":30}}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(
            request.method,
            Method::ShowOsk {
                rect: Rect::new(0, 400, 200, 30)
            }
        );
        assert_eq!(request.method.name(), "show_osk");

        let json = r#"{"id":"6","method":"consume_key","key":13}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(request.method, Method::ConsumeKey { key: 13 });

        let json = r#"{"id":"7","method":"hide_osk"}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(request.method, Method::HideOsk);
    }

    #[test]
    fn test_unknown_method_parses() {
        let json = r#"{"id":"9","method":"reboot_device"}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(request.method, Method::Unknown);
    }

    #[test]
    fn test_event_wire_format() {
        let msg = ServerMessage::Event(CompositorEvent::AppStatus(VisibilityData::new(
            AppStatus::VISIBLE | AppStatus::MULTI,
            "Terminal",
            Pid::from_raw(55),
        )));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"event""#));
        assert!(json.contains(r#""event":"app_status""#));
        assert!(json.contains(r#""status":18"#));
        let parsed: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_notification_data_into_content() {
        let json = r#"{"title":"Hi","body":"there","tag":"t","client":42}"#;
        let data: NotificationData = serde_json::from_str(json).unwrap();
        let content = data.into_content();
        assert_eq!(content.title, "Hi");
        assert_eq!(content.tag, "t");
        assert!(content.uuid.is_empty());
        assert_eq!(content.client, Pid::from_raw(42));
    }
}

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::config::DeviceConfig;

/// Identity of one access-control device. Every point of sale is bound
/// to exactly one device; credentials may differ per point of sale, which
/// is why connections are opened per call and never pooled.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl From<&entity::points_of_sale::Model> for DeviceSettings {
    fn from(pos: &entity::points_of_sale::Model) -> Self {
        Self {
            host: pos.device_host.clone(),
            port: pos.device_port as u16,
            username: pos.device_username.clone(),
            password: pos.device_password.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{operation} failed: {kind}")]
pub struct ProvisioningError {
    pub operation: &'static str,
    #[source]
    pub kind: ProvisioningErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningErrorKind {
    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("device rejected command: {0}")]
    Trap(String),
    #[error("malformed device response: {0}")]
    Protocol(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// One remote credential operation per call. Implementations own the
/// connection lifecycle start to finish and never retry internally;
/// retry policy belongs to the caller.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create the voucher as a device credential: username and password
    /// are both the code, with an uptime limit of `duration_hours`.
    async fn create_access_code(
        &self,
        device: &DeviceSettings,
        code: &str,
        duration_hours: i32,
    ) -> std::result::Result<(), ProvisioningError>;

    /// Whether a credential with this code exists on the device.
    async fn exists(
        &self,
        device: &DeviceSettings,
        code: &str,
    ) -> std::result::Result<bool, ProvisioningError>;

    /// Remove the credential for this code, if present.
    async fn delete(
        &self,
        device: &DeviceSettings,
        code: &str,
    ) -> std::result::Result<(), ProvisioningError>;
}

/// Wire encoding of the device API: sentences of length-prefixed words,
/// terminated by a zero-length word. Public so diagnostics and test
/// harnesses can speak the protocol.
pub mod wire {
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    /// Encode a word length with the API's 1–5 byte variable prefix.
    pub fn encode_length(len: usize) -> Vec<u8> {
        let len = len as u32;
        if len < 0x80 {
            vec![len as u8]
        } else if len < 0x4000 {
            let v = len | 0x8000;
            vec![(v >> 8) as u8, v as u8]
        } else if len < 0x0020_0000 {
            let v = len | 0x00C0_0000;
            vec![(v >> 16) as u8, (v >> 8) as u8, v as u8]
        } else if len < 0x1000_0000 {
            let v = len | 0xE000_0000;
            vec![(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8]
        } else {
            vec![
                0xF0,
                (len >> 24) as u8,
                (len >> 16) as u8,
                (len >> 8) as u8,
                len as u8,
            ]
        }
    }

    /// Read a variable-length word prefix.
    pub async fn read_length<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<usize> {
        let first = reader.read_u8().await?;
        let (mut value, extra) = if first & 0x80 == 0 {
            (u32::from(first), 0)
        } else if first & 0xC0 == 0x80 {
            (u32::from(first & 0x3F), 1)
        } else if first & 0xE0 == 0xC0 {
            (u32::from(first & 0x1F), 2)
        } else if first & 0xF0 == 0xE0 {
            (u32::from(first & 0x0F), 3)
        } else {
            (0, 4)
        };
        for _ in 0..extra {
            value = (value << 8) | u32::from(reader.read_u8().await?);
        }
        Ok(value as usize)
    }

    /// Write one sentence and flush it.
    pub async fn write_sentence<W, S>(writer: &mut W, words: &[S]) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
        S: AsRef<str>,
    {
        for word in words {
            let word = word.as_ref();
            writer.write_all(&encode_length(word.len())).await?;
            writer.write_all(word.as_bytes()).await?;
        }
        writer.write_all(&[0]).await?;
        writer.flush().await
    }

    /// Read words until the zero-length terminator.
    pub async fn read_sentence<R: AsyncRead + Unpin>(
        reader: &mut R,
    ) -> std::io::Result<Vec<String>> {
        let mut words = Vec::new();
        loop {
            let len = read_length(reader).await?;
            if len == 0 {
                return Ok(words);
            }
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).await?;
            words.push(String::from_utf8_lossy(&buf).into_owned());
        }
    }
}

/// Split a reply sentence into its reply word and `=key=value`
/// attributes (the device's internal id arrives as `=.id=*N`).
fn parse_reply(sentence: &[String]) -> Option<(&str, HashMap<String, String>)> {
    let (first, rest) = sentence.split_first()?;
    let mut attributes = HashMap::new();
    for word in rest {
        if let Some(pair) = word.strip_prefix('=') {
            if let Some((key, value)) = pair.split_once('=') {
                attributes.insert(key.to_string(), value.to_string());
            }
        }
    }
    Some((first.as_str(), attributes))
}

/// A single authenticated conversation with a device. Opened per
/// operation, closed before the operation returns on every path.
struct ApiSession<S> {
    stream: S,
}

impl ApiSession<TcpStream> {
    async fn open(
        device: &DeviceSettings,
    ) -> std::result::Result<Self, ProvisioningErrorKind> {
        let stream = TcpStream::connect((device.host.as_str(), device.port))
            .await
            .map_err(ProvisioningErrorKind::Connect)?;
        let mut session = ApiSession { stream };
        session.login(&device.username, &device.password).await?;
        Ok(session)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> ApiSession<S> {
    /// Plain post-6.43 login; a trap reply here means bad credentials.
    async fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> std::result::Result<(), ProvisioningErrorKind> {
        let result = self
            .command(&[
                "/login".to_string(),
                format!("=name={username}"),
                format!("=password={password}"),
            ])
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(ProvisioningErrorKind::Trap(message)) => {
                Err(ProvisioningErrorKind::Auth(message))
            }
            Err(e) => Err(e),
        }
    }

    /// Send one command sentence and collect `!re` rows until `!done`.
    /// A `!trap` is remembered and raised after the device finishes the
    /// exchange; `!fatal` means the connection is dying.
    async fn command(
        &mut self,
        words: &[String],
    ) -> std::result::Result<Vec<HashMap<String, String>>, ProvisioningErrorKind> {
        wire::write_sentence(&mut self.stream, words).await?;

        let mut rows = Vec::new();
        let mut trap: Option<String> = None;
        loop {
            let sentence = wire::read_sentence(&mut self.stream).await?;
            let Some((reply, attributes)) = parse_reply(&sentence) else {
                return Err(ProvisioningErrorKind::Protocol(
                    "empty reply sentence".to_string(),
                ));
            };
            match reply {
                "!re" => rows.push(attributes),
                "!done" => break,
                "!trap" => {
                    trap = Some(
                        attributes
                            .get("message")
                            .cloned()
                            .unwrap_or_else(|| "unspecified error".to_string()),
                    );
                }
                "!fatal" => {
                    return Err(ProvisioningErrorKind::Protocol(format!(
                        "fatal: {}",
                        sentence.get(1).map(String::as_str).unwrap_or("")
                    )));
                }
                other => {
                    return Err(ProvisioningErrorKind::Protocol(format!(
                        "unexpected reply word {other:?}"
                    )));
                }
            }
        }

        match trap {
            Some(message) => Err(ProvisioningErrorKind::Trap(message)),
            None => Ok(rows),
        }
    }

    async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Provisioner backed by the device's native API over TCP. Stateless per
/// call: each operation opens a fresh connection, authenticates, issues
/// its command, and disconnects. The configured timeout covers the whole
/// round trip so an unreachable device cannot stall an issuing request.
pub struct DeviceProvisioner {
    profile: String,
    timeout: Duration,
}

impl DeviceProvisioner {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            profile: config.profile.clone(),
            timeout: config.timeout(),
        }
    }

    async fn run<T, F>(
        &self,
        operation: &'static str,
        op: F,
    ) -> std::result::Result<T, ProvisioningError>
    where
        F: std::future::Future<Output = std::result::Result<T, ProvisioningErrorKind>>,
    {
        timeout(self.timeout, op)
            .await
            .map_err(|_| ProvisioningErrorKind::Timeout(self.timeout))
            .and_then(|inner| inner)
            .map_err(|kind| ProvisioningError { operation, kind })
    }

    /// Look a credential up by name; returns the matching reply rows.
    async fn query_by_name(
        session: &mut ApiSession<TcpStream>,
        code: &str,
    ) -> std::result::Result<Vec<HashMap<String, String>>, ProvisioningErrorKind> {
        session
            .command(&[
                "/ip/hotspot/user/print".to_string(),
                format!("?name={code}"),
            ])
            .await
    }
}

#[async_trait]
impl Provisioner for DeviceProvisioner {
    #[instrument(skip(self, device), fields(host = %device.host))]
    async fn create_access_code(
        &self,
        device: &DeviceSettings,
        code: &str,
        duration_hours: i32,
    ) -> std::result::Result<(), ProvisioningError> {
        // Single-factor voucher redemption: the code is both username
        // and password on the device.
        let uptime_limit = i64::from(duration_hours) * 3600;
        self.run("create-access-code", async {
            let mut session = ApiSession::open(device).await?;
            let result = session
                .command(&[
                    "/ip/hotspot/user/add".to_string(),
                    format!("=name={code}"),
                    format!("=password={code}"),
                    format!("=limit-uptime={uptime_limit}"),
                    format!("=profile={}", self.profile),
                ])
                .await;
            session.close().await;
            result?;
            debug!(code, uptime_limit, "created access code on device");
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, device), fields(host = %device.host))]
    async fn exists(
        &self,
        device: &DeviceSettings,
        code: &str,
    ) -> std::result::Result<bool, ProvisioningError> {
        self.run("query-access-code", async {
            let mut session = ApiSession::open(device).await?;
            let result = Self::query_by_name(&mut session, code).await;
            session.close().await;
            result.map(|rows| !rows.is_empty())
        })
        .await
    }

    #[instrument(skip(self, device), fields(host = %device.host))]
    async fn delete(
        &self,
        device: &DeviceSettings,
        code: &str,
    ) -> std::result::Result<(), ProvisioningError> {
        self.run("delete-access-code", async {
            let mut session = ApiSession::open(device).await?;
            // The protocol has no remove-by-name; query first, then
            // remove by the device's internal record id.
            let result = match Self::query_by_name(&mut session, code).await {
                Ok(rows) => match rows.first().and_then(|row| row.get(".id")) {
                    Some(id) => session
                        .command(&[
                            "/ip/hotspot/user/remove".to_string(),
                            format!("=.id={id}"),
                        ])
                        .await
                        .map(|_| ()),
                    // Nothing on the device for this code; deletion is
                    // trivially done.
                    None => Ok(()),
                },
                Err(e) => Err(e),
            };
            session.close().await;
            result
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_prefix_boundaries() {
        assert_eq!(wire::encode_length(0x00), vec![0x00]);
        assert_eq!(wire::encode_length(0x7F), vec![0x7F]);
        assert_eq!(wire::encode_length(0x80), vec![0x80, 0x80]);
        assert_eq!(wire::encode_length(0x3FFF), vec![0xBF, 0xFF]);
        assert_eq!(wire::encode_length(0x4000), vec![0xC0, 0x40, 0x00]);
        assert_eq!(wire::encode_length(0x001F_FFFF), vec![0xDF, 0xFF, 0xFF]);
        assert_eq!(
            wire::encode_length(0x0020_0000),
            vec![0xE0, 0x20, 0x00, 0x00]
        );
        assert_eq!(
            wire::encode_length(0x0FFF_FFFF),
            vec![0xEF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            wire::encode_length(0x1000_0000),
            vec![0xF0, 0x10, 0x00, 0x00, 0x00]
        );
    }

    #[tokio::test]
    async fn length_prefix_round_trips() {
        for len in [0usize, 1, 0x7F, 0x80, 0x3FFF, 0x4000, 0x0020_0000] {
            let encoded = wire::encode_length(len);
            let mut cursor = std::io::Cursor::new(encoded);
            let decoded = wire::read_length(&mut cursor).await.unwrap();
            assert_eq!(decoded, len);
        }
    }

    #[tokio::test]
    async fn sentence_round_trips() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let words = vec![
            "/ip/hotspot/user/add".to_string(),
            "=name=ABCD-EFGH-JKMN".to_string(),
            "=limit-uptime=7200".to_string(),
            // long enough to need a two-byte length prefix
            "=comment=".to_string() + &"x".repeat(0x90),
        ];

        wire::write_sentence(&mut client, &words).await.unwrap();
        let read = wire::read_sentence(&mut server).await.unwrap();
        assert_eq!(read, words);
    }

    #[test]
    fn parse_reply_extracts_attributes() {
        let sentence = vec![
            "!re".to_string(),
            "=.id=*1".to_string(),
            "=name=ABCD-EFGH-JKMN".to_string(),
        ];
        let (reply, attributes) = parse_reply(&sentence).unwrap();
        assert_eq!(reply, "!re");
        assert_eq!(attributes.get(".id").map(String::as_str), Some("*1"));
        assert_eq!(
            attributes.get("name").map(String::as_str),
            Some("ABCD-EFGH-JKMN")
        );
    }

    #[tokio::test]
    async fn command_collects_rows_until_done() {
        let (client, server) = tokio::io::duplex(4096);
        let mut session = ApiSession { stream: client };

        let device = tokio::spawn(async move {
            let mut server = server;
            let request = wire::read_sentence(&mut server).await.unwrap();
            assert_eq!(request[0], "/ip/hotspot/user/print");
            wire::write_sentence(&mut server, &["!re", "=.id=*1", "=name=A"])
                .await
                .unwrap();
            wire::write_sentence(&mut server, &["!re", "=.id=*2", "=name=B"])
                .await
                .unwrap();
            wire::write_sentence(&mut server, &["!done"]).await.unwrap();
        });

        let rows = session
            .command(&["/ip/hotspot/user/print".to_string()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("name").map(String::as_str), Some("B"));

        device.await.unwrap();
    }

    #[tokio::test]
    async fn command_surfaces_trap_after_done() {
        let (client, server) = tokio::io::duplex(4096);
        let mut session = ApiSession { stream: client };

        let device = tokio::spawn(async move {
            let mut server = server;
            let _ = wire::read_sentence(&mut server).await.unwrap();
            wire::write_sentence(&mut server, &["!trap", "=message=failure: already have user with this name"])
                .await
                .unwrap();
            wire::write_sentence(&mut server, &["!done"]).await.unwrap();
        });

        let err = session
            .command(&["/ip/hotspot/user/add".to_string()])
            .await
            .unwrap_err();
        match err {
            ProvisioningErrorKind::Trap(message) => {
                assert!(message.contains("already have user"));
            }
            other => panic!("expected trap, got {other:?}"),
        }

        device.await.unwrap();
    }

    #[tokio::test]
    async fn login_trap_becomes_auth_error() {
        let (client, server) = tokio::io::duplex(4096);
        let mut session = ApiSession { stream: client };

        let device = tokio::spawn(async move {
            let mut server = server;
            let request = wire::read_sentence(&mut server).await.unwrap();
            assert_eq!(request[0], "/login");
            wire::write_sentence(&mut server, &["!trap", "=message=invalid user name or password"])
                .await
                .unwrap();
            wire::write_sentence(&mut server, &["!done"]).await.unwrap();
        });

        let err = session.login("admin", "wrong").await.unwrap_err();
        assert!(matches!(err, ProvisioningErrorKind::Auth(_)));

        device.await.unwrap();
    }
}

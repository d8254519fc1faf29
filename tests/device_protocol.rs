/// Device provisioning client tests against an in-process fake device
/// that speaks the wire protocol over a real TCP socket: login,
/// add/print/remove credential commands, trap replies for bad
/// credentials and duplicate names.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use netvend::config::DeviceConfig;
use netvend::services::provisioning::{
    wire, DeviceProvisioner, DeviceSettings, Provisioner, ProvisioningErrorKind,
};
use tokio::net::{TcpListener, TcpStream};

const DEVICE_USER: &str = "admin";
const DEVICE_PASSWORD: &str = "secret";

#[derive(Default)]
struct FakeDeviceState {
    // name -> (internal id, attributes from the add command)
    users: Mutex<HashMap<String, (String, HashMap<String, String>)>>,
    next_id: AtomicU32,
}

impl FakeDeviceState {
    fn insert(&self, name: String, attributes: HashMap<String, String>) -> bool {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&name) {
            return false;
        }
        let id = format!("*{:X}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        users.insert(name, (id, attributes));
        true
    }

    fn attribute(&self, name: &str, key: &str) -> Option<String> {
        self.users
            .lock()
            .unwrap()
            .get(name)
            .and_then(|(_, attrs)| attrs.get(key).cloned())
    }
}

fn attr_value(words: &[String], key: &str) -> Option<String> {
    let eq_prefix = format!("={key}=");
    let query_prefix = format!("?{key}=");
    words.iter().find_map(|word| {
        word.strip_prefix(&eq_prefix)
            .or_else(|| word.strip_prefix(&query_prefix))
            .map(str::to_string)
    })
}

async fn handle_connection(stream: TcpStream, state: Arc<FakeDeviceState>) {
    let mut stream = stream;
    loop {
        let Ok(sentence) = wire::read_sentence(&mut stream).await else {
            return;
        };
        if sentence.is_empty() {
            return;
        }

        match sentence[0].as_str() {
            "/login" => {
                let name = attr_value(&sentence, "name").unwrap_or_default();
                let password = attr_value(&sentence, "password").unwrap_or_default();
                if name == DEVICE_USER && password == DEVICE_PASSWORD {
                    wire::write_sentence(&mut stream, &["!done"]).await.unwrap();
                } else {
                    wire::write_sentence(
                        &mut stream,
                        &["!trap", "=message=invalid user name or password (6)"],
                    )
                    .await
                    .unwrap();
                    wire::write_sentence(&mut stream, &["!done"]).await.unwrap();
                }
            }
            "/ip/hotspot/user/add" => {
                let name = attr_value(&sentence, "name").unwrap_or_default();
                let mut attributes = HashMap::new();
                for key in ["password", "limit-uptime", "profile"] {
                    if let Some(value) = attr_value(&sentence, key) {
                        attributes.insert(key.to_string(), value);
                    }
                }
                if state.insert(name, attributes) {
                    wire::write_sentence(&mut stream, &["!done"]).await.unwrap();
                } else {
                    wire::write_sentence(
                        &mut stream,
                        &["!trap", "=message=failure: already have user with this name"],
                    )
                    .await
                    .unwrap();
                    wire::write_sentence(&mut stream, &["!done"]).await.unwrap();
                }
            }
            "/ip/hotspot/user/print" => {
                let name = attr_value(&sentence, "name").unwrap_or_default();
                let users = state.users.lock().unwrap().clone();
                if let Some((id, _)) = users.get(&name) {
                    wire::write_sentence(
                        &mut stream,
                        &[
                            "!re".to_string(),
                            format!("=.id={id}"),
                            format!("=name={name}"),
                        ],
                    )
                    .await
                    .unwrap();
                }
                wire::write_sentence(&mut stream, &["!done"]).await.unwrap();
            }
            "/ip/hotspot/user/remove" => {
                let id = attr_value(&sentence, ".id").unwrap_or_default();
                state
                    .users
                    .lock()
                    .unwrap()
                    .retain(|_, (user_id, _)| *user_id != id);
                wire::write_sentence(&mut stream, &["!done"]).await.unwrap();
            }
            _ => {
                wire::write_sentence(&mut stream, &["!trap", "=message=no such command prefix"])
                    .await
                    .unwrap();
                wire::write_sentence(&mut stream, &["!done"]).await.unwrap();
            }
        }
    }
}

/// Start a fake device, returning its settings and shared state. Each
/// client operation opens its own connection, so the server keeps
/// accepting.
async fn start_fake_device() -> (DeviceSettings, Arc<FakeDeviceState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(FakeDeviceState::default());

    let server_state = state.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(handle_connection(stream, server_state.clone()));
        }
    });

    let settings = DeviceSettings {
        host: "127.0.0.1".to_string(),
        port,
        username: DEVICE_USER.to_string(),
        password: DEVICE_PASSWORD.to_string(),
    };

    (settings, state)
}

fn provisioner() -> DeviceProvisioner {
    DeviceProvisioner::new(&DeviceConfig::default())
}

#[tokio::test]
async fn create_exists_delete_cycle() {
    let (device, _state) = start_fake_device().await;
    let client = provisioner();
    let code = "ABCD-EFGH-JKMN";

    assert!(!client.exists(&device, code).await.unwrap());

    client.create_access_code(&device, code, 1).await.unwrap();
    assert!(client.exists(&device, code).await.unwrap());

    client.delete(&device, code).await.unwrap();
    assert!(!client.exists(&device, code).await.unwrap());
}

#[tokio::test]
async fn create_sets_code_as_password_and_uptime_limit() {
    let (device, state) = start_fake_device().await;
    let client = provisioner();
    let code = "WXYZ-2345-6789";

    client.create_access_code(&device, code, 2).await.unwrap();

    // Username and password are both the code; uptime is hours in seconds.
    assert_eq!(state.attribute(code, "password").as_deref(), Some(code));
    assert_eq!(state.attribute(code, "limit-uptime").as_deref(), Some("7200"));
    assert_eq!(state.attribute(code, "profile").as_deref(), Some("default"));
}

#[tokio::test]
async fn duplicate_create_surfaces_device_trap() {
    let (device, _state) = start_fake_device().await;
    let client = provisioner();
    let code = "AAAA-BBBB-CCCC";

    client.create_access_code(&device, code, 1).await.unwrap();
    let err = client.create_access_code(&device, code, 1).await.unwrap_err();

    assert_eq!(err.operation, "create-access-code");
    match err.kind {
        ProvisioningErrorKind::Trap(message) => {
            assert!(message.contains("already have user"), "{message}");
        }
        other => panic!("expected trap, got {other:?}"),
    }
}

#[tokio::test]
async fn bad_credentials_surface_as_auth_error() {
    let (mut device, _state) = start_fake_device().await;
    device.password = "wrong".to_string();
    let client = provisioner();

    let err = client
        .create_access_code(&device, "QQQQ-RRRR-SSSS", 1)
        .await
        .unwrap_err();

    assert_eq!(err.operation, "create-access-code");
    assert!(matches!(err.kind, ProvisioningErrorKind::Auth(_)));
}

#[tokio::test]
async fn unreachable_device_surfaces_connect_error() {
    // Bind then drop to get a port nothing is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let device = DeviceSettings {
        host: "127.0.0.1".to_string(),
        port,
        username: DEVICE_USER.to_string(),
        password: DEVICE_PASSWORD.to_string(),
    };

    let err = provisioner().exists(&device, "ABCD-EFGH-JKMN").await.unwrap_err();

    assert_eq!(err.operation, "query-access-code");
    assert!(matches!(err.kind, ProvisioningErrorKind::Connect(_)));
}

#[tokio::test]
async fn delete_of_absent_code_is_a_no_op() {
    let (device, _state) = start_fake_device().await;

    provisioner()
        .delete(&device, "NONE-SUCH-CODE")
        .await
        .unwrap();
}

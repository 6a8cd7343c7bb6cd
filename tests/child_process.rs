//! Host driving the real agent binary as a child process.

use serde_json::json;
use std::sync::Arc;
use tokio::process::Command;
use users_mcp::config::ENV_DATA_FILE;
use users_mcp::protocol::{Implementation, McpClient, StreamTransport, Transport};
use users_mcp::store::User;

#[tokio::test]
async fn test_spawned_agent_serves_and_is_reaped_on_close() {
    let dir = tempfile::tempdir().unwrap();
    let data_file = dir.path().join("users.json");

    let mut command = Command::new(env!("CARGO_BIN_EXE_users-mcp"));
    command.env(ENV_DATA_FILE, &data_file).env("RUST_LOG", "off");
    let transport = Arc::new(StreamTransport::spawn_command(command).unwrap());
    assert!(transport.pid().await.is_some());

    let host: Arc<dyn Transport> = transport.clone();
    let client = McpClient::connect(host, Implementation::new("test-host", "1.0.0"), None)
        .await
        .unwrap();
    assert_eq!(client.server_info().name, "users-mcp");

    let tools = client.list_tools().await.unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["create-user", "create-random-user"]);

    let result = client
        .call_tool(
            "create-user",
            json!({"name": "C", "email": "c@x.com", "address": "addr", "phone": "555"}),
        )
        .await
        .unwrap();
    assert_eq!(result.first_text(), Some("User 1 created successfully"));

    client.close().await.unwrap();
    assert!(transport.pid().await.is_none());

    let on_disk: Vec<User> =
        serde_json::from_str(&std::fs::read_to_string(&data_file).unwrap()).unwrap();
    assert_eq!(on_disk.len(), 1);
    assert_eq!(on_disk[0].name, "C");
}

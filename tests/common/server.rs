//! Test server management.

#![allow(dead_code)]

use std::process::{Child, Command};
use std::time::Duration;
use tokio::time::sleep;

/// A mortalnetd instance under test.
pub struct TestServer {
    child: Child,
    chat_port: u16,
    web_port: u16,
}

impl TestServer {
    /// Spawn a server on the given ports with default settings.
    pub async fn spawn(chat_port: u16, web_port: u16) -> anyhow::Result<Self> {
        Self::spawn_with(chat_port, web_port, &[]).await
    }

    /// Spawn a server with extra CLI flags.
    pub async fn spawn_with(
        chat_port: u16,
        web_port: u16,
        extra_args: &[&str],
    ) -> anyhow::Result<Self> {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_mortalnetd"));
        cmd.arg("--chat-addr")
            .arg(format!("127.0.0.1:{chat_port}"))
            .arg("--web-addr")
            .arg(format!("127.0.0.1:{web_port}"))
            .arg("--log-level")
            .arg("error");
        for arg in extra_args {
            cmd.arg(arg);
        }
        let child = cmd.spawn()?;

        let server = Self {
            child,
            chat_port,
            web_port,
        };
        server.wait_until_ready().await?;
        Ok(server)
    }

    /// Wait until the server is reachable. The web listener binds after the
    /// chat listener, so probing it avoids phantom chat connections that
    /// would show up in the connection counters.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.web_port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("server failed to start within 5 seconds")
    }

    pub fn chat_addr(&self) -> String {
        format!("127.0.0.1:{}", self.chat_port)
    }

    pub fn web_addr(&self) -> String {
        format!("127.0.0.1:{}", self.web_port)
    }

    /// Connect a test client to the chat listener.
    pub async fn connect(&self) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(&self.chat_addr()).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

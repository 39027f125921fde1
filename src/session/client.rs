//! The per-session connection loop.
//!
//! Owns the framed socket, the rule engine, and the recorder. One select
//! loop processes inbound chunks in arrival order (a single task is the
//! FIFO queue the display ordering requires), expands aliases on typed
//! commands, and drains the shared outbound queue to the socket in
//! enqueue order.

use anyhow::Result;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::common::error::ConnectionError;
use crate::common::messages::{DisplayLine, EffectBatch, OutboundCommand};
use crate::common::types::{Rule, RuleEffect};
use crate::protocol::codec::new_session_connection;
use crate::protocol::sanitize::sanitize;
use crate::rules::engine::RuleEngine;
use crate::session::channels::SessionChannels;
use crate::session::recorder::SessionRecorder;

pub struct SessionClient {
    /// Working copy of the rule set; match counters are applied here from
    /// the engine's effect records.
    rules: Vec<Rule>,
    engine: RuleEngine,
    recorder: Option<SessionRecorder>,
    pub channels: SessionChannels,
}

impl SessionClient {
    pub fn new(
        rules: Vec<Rule>,
        recorder: Option<SessionRecorder>,
        channels: SessionChannels,
    ) -> Self {
        let engine = RuleEngine::from_snapshot(&rules);
        Self {
            rules,
            engine,
            recorder,
            channels,
        }
    }

    /// Connect to the server and run the session until disconnect or
    /// shutdown.
    pub async fn run(&mut self, host: &str, port: u16) -> Result<()> {
        info!("Connecting to {}:{}", host, port);
        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            ConnectionError::ConnectFailed {
                host: host.to_string(),
                port,
                source: e,
            }
        })?;
        info!("Session connection established");
        self.handle_connection(stream).await
    }

    pub async fn handle_connection<S>(&mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut connection = new_session_connection(stream);
        let mut shutdown_rx = self.channels.shutdown_rx.clone();

        loop {
            tokio::select! {
                line = connection.next() => {
                    match line {
                        Some(Ok(line)) => self.process_line(&line),
                        Some(Err(e)) => return Err(e),
                        None => {
                            info!("Connection closed by remote");
                            return Ok(());
                        }
                    }
                }

                Some(input) = self.channels.user_input_rx.recv() => {
                    self.handle_user_input(&input);
                }

                Some(outgoing) = self.channels.outbound_rx.recv() => {
                    debug!(source = ?outgoing.source, "Sending: {}", outgoing.text);
                    connection.send(outgoing.text).await?;
                }

                changed = shutdown_rx.changed() => {
                    // A closed channel means the control side is gone
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, closing session");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Run one decoded line through sanitize and the rule engine, then
    /// hand off display text, fired commands, and side effects.
    fn process_line(&mut self, line: &str) {
        let clean = sanitize(line);
        let outcome = self.engine.evaluate(&clean);

        self.apply_effects(&outcome.effects);

        if let Some(text) = outcome.display {
            if let Some(recorder) = self.recorder.as_mut() {
                if let Err(e) = recorder.record_line(&text) {
                    // Failing to log a line is never fatal to displaying it
                    warn!("{}", e);
                }
            }
            if self.channels.display_tx.send(DisplayLine::new(text)).is_err() {
                debug!("Display channel closed");
            }
        }

        for command in outcome.commands {
            if self
                .channels
                .outbound_tx
                .send(OutboundCommand::trigger(command))
                .is_err()
            {
                debug!("Outbound channel closed");
                return;
            }
        }
    }

    /// Expand a typed command through the alias table and enqueue the
    /// result. The raw typed line goes to the command log, not the
    /// expansion.
    fn handle_user_input(&mut self, input: &str) {
        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.record_command(input) {
                warn!("{}", e);
            }
        }

        for command in self.engine.expand_alias(input) {
            if self
                .channels
                .outbound_tx
                .send(OutboundCommand::user(command))
                .is_err()
            {
                debug!("Outbound channel closed");
                return;
            }
        }
    }

    /// Apply effect records to the working rule copy and forward them to
    /// the rule-set owner.
    fn apply_effects(&mut self, effects: &[RuleEffect]) {
        if effects.is_empty() {
            return;
        }

        for effect in effects {
            if let RuleEffect::Matched { rule_id } = effect {
                if let Some(rule) = self.rules.iter_mut().find(|r| r.id == *rule_id) {
                    rule.match_count += 1;
                    rule.last_modified = Utc::now();
                    debug!("Rule {} match #{}", rule.id, rule.match_count);
                }
            }
        }

        let batch = EffectBatch {
            effects: effects.to_vec(),
        };
        if self.channels.effects_tx.send(batch).is_err() {
            debug!("Effects channel closed");
        }
    }

    /// Match counts accumulated this session, for the owner to persist.
    #[allow(dead_code)]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{PatternType, RuleKind, DEFAULT_PRIORITY};
    use crate::session::channels::ChannelBundle;
    use tokio::io::AsyncWriteExt;

    fn trigger_rule(id: u64, pattern: &str, commands: &[&str]) -> Rule {
        Rule::new(
            id,
            RuleKind::Trigger {
                pattern: pattern.to_string(),
                pattern_type: PatternType::Wildcard,
                priority: DEFAULT_PRIORITY,
            },
            commands.iter().map(|c| c.to_string()).collect(),
        )
    }

    fn gag_rule(id: u64, pattern: &str) -> Rule {
        Rule::new(
            id,
            RuleKind::Gag {
                pattern: pattern.to_string(),
                regex: false,
            },
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn test_lines_displayed_in_arrival_order() {
        let bundle = ChannelBundle::new();
        let mut ui = bundle.ui;
        let mut client = SessionClient::new(Vec::new(), None, bundle.session);

        let (mut server, local) = tokio::io::duplex(1024);
        let session = tokio::spawn(async move { client.handle_connection(local).await });

        server.write_all(b"first\r\nsecond\r\nthird\r\n").await.unwrap();
        drop(server);
        session.await.unwrap().unwrap();

        let mut lines = Vec::new();
        while let Ok(line) = ui.display_rx.try_recv() {
            lines.push(line.text);
        }
        assert_eq!(lines, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_trigger_fires_and_reports_match() {
        let bundle = ChannelBundle::new();
        let mut ui = bundle.ui;
        let rules = vec![trigger_rule(1, "* attacks you*", &["flee"])];
        let mut client = SessionClient::new(rules, None, bundle.session);

        let (mut server, local) = tokio::io::duplex(1024);
        let session = tokio::spawn(async move { client.handle_connection(local).await });

        server.write_all(b"A troll attacks you!\r\n").await.unwrap();

        // The fired command comes back over the wire
        let mut response = [0u8; 16];
        use tokio::io::AsyncReadExt;
        let n = server.read(&mut response).await.unwrap();
        assert_eq!(&response[..n], b"flee\r\n");

        drop(server);
        session.await.unwrap().unwrap();

        let batch = ui.effects_rx.try_recv().unwrap();
        assert_eq!(batch.effects, vec![RuleEffect::Matched { rule_id: 1 }]);
    }

    #[tokio::test]
    async fn test_gagged_line_not_displayed() {
        let bundle = ChannelBundle::new();
        let mut ui = bundle.ui;
        let rules = vec![gag_rule(1, "auction")];
        let mut client = SessionClient::new(rules, None, bundle.session);

        let (mut server, local) = tokio::io::duplex(1024);
        let session = tokio::spawn(async move { client.handle_connection(local).await });

        server
            .write_all(b"[auction] junk for sale\r\nkept line\r\n")
            .await
            .unwrap();
        drop(server);
        session.await.unwrap().unwrap();

        let mut lines = Vec::new();
        while let Ok(line) = ui.display_rx.try_recv() {
            lines.push(line.text);
        }
        assert_eq!(lines, vec!["kept line"]);
    }

    #[tokio::test]
    async fn test_user_input_expands_alias() {
        let bundle = ChannelBundle::new();
        let ui = bundle.ui;
        let rules = vec![Rule::new(
            1,
            RuleKind::Alias {
                name: "k".to_string(),
            },
            vec!["wield sword".to_string(), "kill $1$".to_string()],
        )];
        let mut client = SessionClient::new(rules, None, bundle.session);

        let (mut server, local) = tokio::io::duplex(1024);
        let session = tokio::spawn(async move { client.handle_connection(local).await });

        ui.user_input_tx.send("k orc".to_string()).unwrap();

        use tokio::io::AsyncReadExt;
        let mut received = Vec::new();
        while received.len() < b"wield sword\r\nkill orc\r\n".len() {
            let mut buf = [0u8; 64];
            let n = server.read(&mut buf).await.unwrap();
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(&received[..], b"wield sword\r\nkill orc\r\n");

        drop(server);
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_telnet_negotiation_stripped_end_to_end() {
        let bundle = ChannelBundle::new();
        let mut ui = bundle.ui;
        let mut client = SessionClient::new(Vec::new(), None, bundle.session);

        let (mut server, local) = tokio::io::duplex(1024);
        let session = tokio::spawn(async move { client.handle_connection(local).await });

        server
            .write_all(b"\xFF\xFB\x01Hello\xFF\xFA\x01\x02\xFF\xF0World\r\n")
            .await
            .unwrap();
        drop(server);
        session.await.unwrap().unwrap();

        let line = ui.display_rx.try_recv().unwrap();
        assert_eq!(line.text, "HelloWorld");
    }
}

//! IMAP-over-TLS inbox.
//!
//! The `imap` crate is blocking, so the whole session (connect, login,
//! select, search, fetch, close, logout) runs inside one
//! `spawn_blocking` call.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use async_trait::async_trait;
use native_tls::TlsConnector;
use tracing::{debug, warn};

use super::{Inbox, RawMessage};
use crate::config::{require, MailSettings};

/// Inbox backed by an IMAP server
#[derive(Clone)]
pub struct ImapInbox {
    server: String,
    port: u16,
    username: String,
    password: String,
}

impl std::fmt::Debug for ImapInbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapInbox")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl ImapInbox {
    pub fn new(
        server: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Create from resolved settings
    pub fn from_settings(settings: &MailSettings) -> Result<Self> {
        Ok(Self::new(
            require(&settings.server, "IMAP_SERVER")?,
            settings.port,
            require(&settings.username, "EMAIL")?,
            require(&settings.password, "PASSWORD")?,
        ))
    }

    /// Run the full blocking IMAP session
    fn fetch_unread_blocking(&self) -> Result<Vec<RawMessage>> {
        let tls = TlsConnector::builder()
            .build()
            .context("Failed to build TLS connector")?;
        let client = imap::connect((self.server.as_str(), self.port), &self.server, &tls)
            .with_context(|| format!("Failed to connect to {}:{}", self.server, self.port))?;

        let mut session = client
            .login(&self.username, &self.password)
            .map_err(|(err, _client)| err)
            .with_context(|| format!("Login failed for {}", self.username))?;

        read_unseen(&mut session)
    }
}

/// The IMAP commands one run needs
trait MailSession {
    fn select_inbox(&mut self) -> Result<()>;
    fn search_unseen(&mut self) -> Result<Vec<u32>>;
    /// Full source of every message returned for `seq`
    fn fetch_source(&mut self, seq: u32) -> Result<Vec<Vec<u8>>>;
    fn close_inbox(&mut self) -> Result<()>;
    fn log_out(&mut self) -> Result<()>;
}

impl<T: Read + Write> MailSession for imap::Session<T> {
    fn select_inbox(&mut self) -> Result<()> {
        self.select("INBOX")?;
        Ok(())
    }

    fn search_unseen(&mut self) -> Result<Vec<u32>> {
        Ok(self.search("UNSEEN")?.into_iter().collect())
    }

    fn fetch_source(&mut self, seq: u32) -> Result<Vec<Vec<u8>>> {
        // RFC822 (not BODY.PEEK) so the server sets \Seen
        let fetches = self.fetch(seq.to_string(), "RFC822")?;
        Ok(fetches
            .iter()
            .filter_map(|fetch| fetch.body())
            .map(<[u8]>::to_vec)
            .collect())
    }

    fn close_inbox(&mut self) -> Result<()> {
        self.close()?;
        Ok(())
    }

    fn log_out(&mut self) -> Result<()> {
        self.logout()?;
        Ok(())
    }
}

/// Select, search and fetch every unread message, then end the session.
///
/// Select and search failures are fatal. A message that cannot be fetched
/// is skipped and stays unread. Close and logout failures only warn, since
/// the fetched messages are already marked read.
fn read_unseen(session: &mut impl MailSession) -> Result<Vec<RawMessage>> {
    session.select_inbox().context("Failed to select INBOX")?;

    let mut unseen = session
        .search_unseen()
        .context("Failed to search for unread messages")?;
    unseen.sort_unstable();
    debug!(count = unseen.len(), "Unread messages on server");

    let mut messages = Vec::with_capacity(unseen.len());
    for seq in unseen {
        match session.fetch_source(seq) {
            Ok(sources) => {
                messages.extend(sources.into_iter().map(|source| RawMessage { seq, source }))
            }
            Err(e) => warn!(seq, error = %format!("{:#}", e), "Failed to fetch message, skipping"),
        }
    }

    if let Err(e) = session.close_inbox() {
        warn!(error = %format!("{:#}", e), "Failed to close INBOX");
    }
    if let Err(e) = session.log_out() {
        warn!(error = %format!("{:#}", e), "Failed to log out");
    }

    Ok(messages)
}

#[async_trait(?Send)]
impl Inbox for ImapInbox {
    fn name(&self) -> &str {
        "imap"
    }

    async fn fetch_unread(&self) -> Result<Vec<RawMessage>> {
        let inbox = self.clone();
        tokio::task::spawn_blocking(move || inbox.fetch_unread_blocking())
            .await
            .context("IMAP session panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_requires_credentials() {
        let settings = MailSettings {
            server: Some("imap.example.com".to_string()),
            port: 993,
            username: Some("me@example.com".to_string()),
            password: None,
        };
        let err = ImapInbox::from_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("PASSWORD"));
    }

    /// Session with fixed unseen messages and switchable failures
    #[derive(Default)]
    struct ScriptedSession {
        messages: Vec<(u32, &'static str)>,
        fail_search: bool,
        fail_fetch: Option<u32>,
        fail_teardown: bool,
        commands: Vec<String>,
    }

    impl MailSession for ScriptedSession {
        fn select_inbox(&mut self) -> Result<()> {
            self.commands.push("SELECT".to_string());
            Ok(())
        }

        fn search_unseen(&mut self) -> Result<Vec<u32>> {
            self.commands.push("SEARCH".to_string());
            if self.fail_search {
                anyhow::bail!("BAD search rejected");
            }
            // Servers return an unordered set
            Ok(self.messages.iter().rev().map(|(seq, _)| *seq).collect())
        }

        fn fetch_source(&mut self, seq: u32) -> Result<Vec<Vec<u8>>> {
            self.commands.push(format!("FETCH {}", seq));
            if self.fail_fetch == Some(seq) {
                anyhow::bail!("NO message expunged");
            }
            Ok(self
                .messages
                .iter()
                .filter(|(s, _)| *s == seq)
                .map(|(_, source)| source.as_bytes().to_vec())
                .collect())
        }

        fn close_inbox(&mut self) -> Result<()> {
            self.commands.push("CLOSE".to_string());
            if self.fail_teardown {
                anyhow::bail!("connection reset");
            }
            Ok(())
        }

        fn log_out(&mut self) -> Result<()> {
            self.commands.push("LOGOUT".to_string());
            if self.fail_teardown {
                anyhow::bail!("connection reset");
            }
            Ok(())
        }
    }

    fn two_messages() -> ScriptedSession {
        ScriptedSession {
            messages: vec![(1, "Subject: a\r\n\r\none"), (2, "Subject: b\r\n\r\ntwo")],
            ..Default::default()
        }
    }

    #[test]
    fn test_reads_unseen_in_order() {
        let mut session = two_messages();
        let messages = read_unseen(&mut session).unwrap();

        let seqs: Vec<u32> = messages.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(messages[1].source, b"Subject: b\r\n\r\ntwo".to_vec());
        assert_eq!(
            session.commands,
            vec!["SELECT", "SEARCH", "FETCH 1", "FETCH 2", "CLOSE", "LOGOUT"]
        );
    }

    #[test]
    fn test_teardown_failure_keeps_fetched_messages() {
        let mut session = ScriptedSession {
            fail_teardown: true,
            ..two_messages()
        };

        let messages = read_unseen(&mut session).unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(session.commands.last().map(String::as_str), Some("LOGOUT"));
    }

    #[test]
    fn test_failed_fetch_skips_only_that_message() {
        let mut session = ScriptedSession {
            fail_fetch: Some(1),
            ..two_messages()
        };

        let messages = read_unseen(&mut session).unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].seq, 2);
    }

    #[test]
    fn test_search_failure_is_fatal() {
        let mut session = ScriptedSession {
            fail_search: true,
            ..two_messages()
        };

        let err = read_unseen(&mut session).unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to search"));
        assert!(!session.commands.iter().any(|c| c.starts_with("FETCH")));
    }

    #[test]
    fn test_debug_hides_password() {
        let inbox = ImapInbox::new("imap.example.com", 993, "me", "hunter2");
        let shown = format!("{:?}", inbox);
        assert!(shown.contains("imap.example.com"));
        assert!(!shown.contains("hunter2"));
        assert_eq!(inbox.name(), "imap");
    }
}

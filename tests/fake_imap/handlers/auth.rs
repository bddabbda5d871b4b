//! LOGIN and LOGOUT command handlers.
//!
//! LOGIN carries the credentials as two astrings, which async-imap
//! always sends quoted:
//!
//! ```text
//! A0001 LOGIN "user@example.com" "secret"
//! A0001 OK LOGIN completed
//! ```
//!
//! The password is checked only when the mailbox defines one. LOGOUT
//! answers with an untagged BYE before the tagged OK.

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Split the arguments of a LOGIN command line into user and password.
/// Handles quoted strings (with `\"` and `\\` escapes) and atoms.
pub fn login_arguments(line: &str) -> Option<(String, String)> {
    let rest = line.trim_end();
    let start = rest.to_ascii_uppercase().find("LOGIN ")? + "LOGIN ".len();
    let mut chars = rest[start..].chars().peekable();
    let mut args = Vec::new();

    while args.len() < 2 {
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        let mut arg = String::new();
        match chars.next()? {
            '"' => loop {
                match chars.next()? {
                    '\\' => arg.push(chars.next()?),
                    '"' => break,
                    c => arg.push(c),
                }
            },
            c => {
                arg.push(c);
                while let Some(&c) = chars.peek() {
                    if c == ' ' {
                        break;
                    }
                    arg.push(c);
                    chars.next();
                }
            }
        }
        args.push(arg);
    }

    let password = args.pop()?;
    let user = args.pop()?;
    Some((user, password))
}

/// Handle the LOGIN command. Returns whether the session may go on.
pub async fn handle_login<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    line: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) -> bool {
    let accepted = match (&mailbox.password, login_arguments(line)) {
        (None, _) => true,
        (Some(expected), Some((_, password))) => *expected == password,
        (Some(_), None) => false,
    };

    let resp = if accepted {
        format!("{tag} OK LOGIN completed\r\n")
    } else {
        format!("{tag} NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
    };
    write_line(stream, &resp).await.is_ok() && accepted
}

/// Handle the LOGOUT command. Sends BYE + tagged OK.
pub async fn handle_logout<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    stream: &mut BufReader<S>,
) {
    let _ = write_line(stream, "* BYE Logging out\r\n").await;
    let resp = format!("{tag} OK LOGOUT completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;
    use tokio::io::BufReader;

    async fn run_login(line: &str, mailbox: &Mailbox) -> (String, bool) {
        let (client, server) = tokio::io::duplex(1024);
        let mut stream = BufReader::new(server);

        let ok = handle_login("A1", line, mailbox, &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        (String::from_utf8(buf).unwrap(), ok)
    }

    #[test]
    fn parses_quoted_and_atom_arguments() {
        assert_eq!(
            login_arguments("A1 LOGIN \"me@example.com\" \"p\\\"w d\"\r\n"),
            Some(("me@example.com".into(), "p\"w d".into()))
        );
        assert_eq!(
            login_arguments("A1 login user pass\r\n"),
            Some(("user".into(), "pass".into()))
        );
        assert_eq!(login_arguments("A1 LOGIN user\r\n"), None);
    }

    #[tokio::test]
    async fn accepts_anything_without_password() {
        let mailbox = MailboxBuilder::new().build();
        let (output, ok) = run_login("A1 LOGIN \"u\" \"x\"\r\n", &mailbox).await;
        assert!(ok);
        assert_eq!(output, "A1 OK LOGIN completed\r\n");
    }

    #[tokio::test]
    async fn rejects_wrong_password() {
        let mailbox = MailboxBuilder::new().password("secret").build();
        let (output, ok) = run_login("A1 LOGIN \"u\" \"guess\"\r\n", &mailbox).await;
        assert!(!ok);
        assert!(output.starts_with("A1 NO"));
    }

    #[tokio::test]
    async fn accepts_matching_password() {
        let mailbox = MailboxBuilder::new().password("secret").build();
        let (_, ok) = run_login("A1 LOGIN \"u\" \"secret\"\r\n", &mailbox).await;
        assert!(ok);
    }

    #[tokio::test]
    async fn logout_sends_bye_before_ok() {
        let (client, server) = tokio::io::duplex(1024);
        let mut stream = BufReader::new(server);
        handle_logout("X1", &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        let output = String::from_utf8(buf).unwrap();

        let bye_pos = output.find("* BYE").unwrap();
        let ok_pos = output.find("X1 OK LOGOUT completed").unwrap();
        assert!(bye_pos < ok_pos);
    }
}

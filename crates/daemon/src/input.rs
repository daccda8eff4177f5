//! Customer interactions arrive one per line on stdin (`click`, `scroll`, ...).

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use tableside_core::activity::Interaction;

/// Parse one input line. Blank lines and unknown names yield `None`.
pub fn parse_line(line: &str) -> Option<Interaction> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.parse::<Interaction>() {
        Ok(interaction) => Some(interaction),
        Err(e) => {
            warn!("Ignoring input line: {e}");
            None
        }
    }
}

/// Forward interactions from `reader` until EOF or until the tracker goes away.
pub async fn read_interactions<R>(reader: R, tx: mpsc::Sender<Interaction>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(interaction) = parse_line(&line)
                    && tx.send(interaction).await.is_err()
                {
                    break;
                }
            }
            Ok(None) => {
                debug!("Interaction input reached EOF");
                break;
            }
            Err(e) => {
                warn!("Failed to read interaction input: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test]
    fn parses_known_interactions() {
        assert_eq!(parse_line("click"), Some(Interaction::Click));
        assert_eq!(parse_line("  Pointer_Move \n"), Some(Interaction::PointerMove));
        assert_eq!(
            parse_line("visibility-change"),
            Some(Interaction::VisibilityChange)
        );
    }

    #[test]
    fn ignores_blank_and_unknown_lines() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("double-click"), None);
    }

    #[tokio::test]
    async fn forwards_until_eof() {
        let input = "click\nbogus\n\nscroll\ntouch";
        let (tx, mut rx) = mpsc::channel(8);
        read_interactions(BufReader::new(input.as_bytes()), tx).await;

        let mut seen = Vec::new();
        while let Some(interaction) = rx.recv().await {
            seen.push(interaction);
        }
        assert_eq!(
            seen,
            vec![Interaction::Click, Interaction::Scroll, Interaction::Touch]
        );
    }
}

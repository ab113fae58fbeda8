//! JSON-lines event source.
//!
//! Each non-blank line is one [`QuakeEvent`]. Lines that do not parse are
//! logged and dropped; they would fail the same way on every redelivery.

use haz_core::quake::QuakeEvent;
use tokio::{
  io::{AsyncBufRead, AsyncBufReadExt as _},
  sync::mpsc,
};

/// Forward every event read from `reader` to `tx`. Returns the number of
/// events sent. Stops early if the receiver is dropped.
pub async fn read_events<Rd>(
  reader: Rd,
  tx: mpsc::Sender<QuakeEvent>,
) -> std::io::Result<u64>
where
  Rd: AsyncBufRead + Unpin,
{
  let mut lines = reader.lines();
  let mut line_no = 0u64;
  let mut sent = 0u64;

  while let Some(line) = lines.next_line().await? {
    line_no += 1;
    let line = line.trim();
    if line.is_empty() {
      continue;
    }

    match serde_json::from_str::<QuakeEvent>(line) {
      Ok(event) => {
        if tx.send(event).await.is_err() {
          tracing::debug!(line = line_no, "event receiver closed");
          break;
        }
        sent += 1;
      }
      Err(e) => {
        tracing::warn!(line = line_no, error = %e, "skipping malformed event")
      }
    }
  }

  Ok(sent)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn event_line() -> String {
    serde_json::json!({
      "publicID": "2013p407387",
      "type": "earthquake",
      "agencyID": "WEL(GNS_Primary)",
      "modificationTime": "2013-06-01T02:17:41.549Z",
      "time": "2013-05-30T15:15:37.812Z",
      "longitude": 176.8,
      "latitude": -38.0,
      "depth": 20.0,
      "depthType": "operator assigned",
      "methodID": "LOCSAT",
      "earthModelID": "iasp91",
      "evaluationMode": "manual",
      "evaluationStatus": "confirmed",
      "usedPhaseCount": 22,
      "usedStationCount": 19,
      "standardError": 0.39,
      "azimuthalGap": 166.0,
      "minimumDistance": 0.07,
      "magnitude": 4.1,
      "magnitudeUncertainty": 0.0,
      "magnitudeType": "M",
      "magnitudeStationCount": 16,
      "site": "primary",
    })
    .to_string()
  }

  #[tokio::test]
  async fn skips_blank_and_malformed_lines() {
    let line = event_line();
    let input = format!("{line}\n\nnot json\n  {line}  \n");
    let (tx, mut rx) = mpsc::channel(8);

    let sent = read_events(input.as_bytes(), tx).await.unwrap();
    assert_eq!(sent, 2);

    let first = rx.recv().await.unwrap();
    assert_eq!(first.public_id, "2013p407387");
    assert_eq!(first.magnitude_station_count, 16);
    assert!(rx.recv().await.is_some());
    assert!(rx.recv().await.is_none());
  }

  #[tokio::test]
  async fn stops_when_receiver_is_gone() {
    let line = event_line();
    let input = format!("{line}\n{line}\n");
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    assert_eq!(read_events(input.as_bytes(), tx).await.unwrap(), 0);
  }
}

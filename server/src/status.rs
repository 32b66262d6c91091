//! Read-only view of the server for debug consumers.
//!
//! The server publishes a fresh [`ServerStatus`] on a `watch` channel after every
//! datagram and tick. Readers get a cloned value and can never touch the live
//! state.

use crate::game::MatchState;
use log::info;
use shared::MAX_CLIENTS;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerStatus {
    pub tick: u32,
    pub client_count: usize,
    pub started: bool,
    pub match_state: MatchState,
}

impl ServerStatus {
    /// One-line summary in the spirit of the server HUD.
    pub fn summary(&self) -> String {
        let mut line = format!("Clients {}/{}", self.client_count, MAX_CLIENTS);

        if !self.started {
            line.push_str(" | waiting for players");
            return line;
        }

        line.push_str(&format!(
            " | tick {} | score {} | speed {:.1} | obstacles {}",
            self.tick,
            self.match_state.score,
            self.match_state.velocity,
            self.match_state.obstacles.len()
        ));

        if self.match_state.terminated {
            line.push_str(&format!(" | {}", self.match_state.end_message));
        }

        line
    }
}

/// Logs the latest status every `period` until the server goes away.
pub async fn log_status(mut status: watch::Receiver<ServerStatus>, period: Duration) {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        timer.tick().await;

        if status.has_changed().is_err() {
            break;
        }

        let line = status.borrow_and_update().summary();
        info!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::DRAW_MESSAGE;

    #[test]
    fn test_summary_while_waiting() {
        let status = ServerStatus {
            client_count: 1,
            ..ServerStatus::default()
        };
        assert_eq!(status.summary(), "Clients 1/2 | waiting for players");
    }

    #[test]
    fn test_summary_while_running() {
        let status = ServerStatus {
            tick: 120,
            client_count: 2,
            started: true,
            match_state: MatchState::default(),
        };
        let summary = status.summary();
        assert!(summary.starts_with("Clients 2/2 | tick 120 | score 0"));
        assert!(summary.contains("speed 260.0"));
    }

    #[test]
    fn test_summary_shows_end_message() {
        let mut match_state = MatchState::default();
        match_state.terminated = true;
        match_state.end_message = DRAW_MESSAGE.to_string();

        let status = ServerStatus {
            tick: 5,
            client_count: 2,
            started: true,
            match_state,
        };
        assert!(status.summary().ends_with(DRAW_MESSAGE));
    }

    #[tokio::test]
    async fn test_log_status_stops_when_sender_dropped() {
        let (tx, rx) = watch::channel(ServerStatus::default());
        drop(tx);
        tokio::time::timeout(
            Duration::from_secs(1),
            log_status(rx, Duration::from_millis(5)),
        )
        .await
        .expect("status logger should stop once the server is gone");
    }
}

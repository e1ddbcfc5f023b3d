//! Waiting for the published state to change.

use std::time::Duration;

use modswitch_config::util::display_byte;
use modswitch_core::SharedStateReader;
use tokio::time::{MissedTickBehavior, interval};
use tracing::trace;

/// What `-l` waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Until {
    /// Any byte other than the one seen at start.
    ChangedFrom(u8),
    /// This exact byte (`-c`).
    Equals(u8),
}

impl Until {
    pub fn is_met(self, byte: u8) -> bool {
        match self {
            Self::ChangedFrom(start) => byte != start,
            Self::Equals(target) => byte == target,
        }
    }
}

/// Read the segment every `delay` until `until` holds and return that byte.
///
/// The first read happens immediately, so a state that already matches is
/// returned without sleeping.
pub async fn wait_until(reader: &SharedStateReader, until: Until, delay: Duration) -> u8 {
    // interval() panics on a zero period.
    let mut ticks = interval(delay.max(Duration::from_micros(1)));
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        let byte = reader.read();
        trace!(state = %display_byte(byte), "sample");
        if until.is_met(byte) {
            return byte;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modswitch_core::SharedState;
    use modswitch_test_utils::shm::unique_segment_name;
    use pretty_assertions::assert_eq;
    use tokio::time::{Instant, sleep, timeout};

    const DELAY: Duration = Duration::from_millis(1);
    const LIMIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_changed_from() {
        let until = Until::ChangedFrom(b'1');
        assert!(!until.is_met(b'1'));
        assert!(until.is_met(b'2'));
        assert!(until.is_met(b'0'));
    }

    #[test]
    fn test_equals() {
        let until = Until::Equals(b'3');
        assert!(!until.is_met(b'1'));
        assert!(until.is_met(b'3'));
    }

    #[test_log::test(tokio::test)]
    async fn test_returns_new_state_after_change() {
        let name = unique_segment_name();
        let mut state = SharedState::open(&name).unwrap();
        state.publish(b'1').unwrap();
        let reader = SharedStateReader::open(&name).unwrap();

        let publisher = async {
            sleep(Duration::from_millis(20)).await;
            state.publish(b'2').unwrap();
        };
        let waiter = timeout(LIMIT, wait_until(&reader, Until::ChangedFrom(b'1'), DELAY));

        let ((), seen) = tokio::join!(publisher, waiter);
        assert_eq!(seen.unwrap(), b'2');
    }

    #[tokio::test]
    async fn test_skips_states_other_than_target() {
        let name = unique_segment_name();
        let mut state = SharedState::open(&name).unwrap();
        state.publish(b'0').unwrap();
        let reader = SharedStateReader::open(&name).unwrap();

        let publisher = async {
            for byte in [b'1', b'2', b'3'] {
                sleep(Duration::from_millis(10)).await;
                state.publish(byte).unwrap();
            }
        };
        let waiter = timeout(LIMIT, wait_until(&reader, Until::Equals(b'3'), DELAY));

        let ((), seen) = tokio::join!(publisher, waiter);
        assert_eq!(seen.unwrap(), b'3');
    }

    #[tokio::test]
    async fn test_matching_state_returns_immediately() {
        let name = unique_segment_name();
        let mut state = SharedState::open(&name).unwrap();
        state.publish(b'2').unwrap();
        let reader = SharedStateReader::open(&name).unwrap();

        let started = Instant::now();
        let seen = wait_until(&reader, Until::Equals(b'2'), Duration::from_secs(60)).await;
        assert_eq!(seen, b'2');
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_delay_is_accepted() {
        let name = unique_segment_name();
        let mut state = SharedState::open(&name).unwrap();
        state.publish(b'0').unwrap();
        let reader = SharedStateReader::open(&name).unwrap();

        let seen = wait_until(&reader, Until::Equals(b'0'), Duration::ZERO).await;
        assert_eq!(seen, b'0');
    }

    #[tokio::test]
    async fn test_unchanged_state_keeps_waiting() {
        let name = unique_segment_name();
        let mut state = SharedState::open(&name).unwrap();
        state.publish(b'1').unwrap();
        let reader = SharedStateReader::open(&name).unwrap();

        let result = timeout(
            Duration::from_millis(30),
            wait_until(&reader, Until::ChangedFrom(b'1'), DELAY),
        )
        .await;
        assert!(result.is_err());
    }
}

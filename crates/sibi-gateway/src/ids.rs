use tracing::{debug, info};

use crate::error::{GatewayError, Result};

/// Client-generated request ids.
///
/// Starts at 1 and only ever moves forward, across reconnects included, so a
/// server still holding state for an old id can never match a new request.
#[derive(Debug, Clone)]
pub struct RequestIds {
    next: i64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate the next id.
    pub fn next_id(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id the next allocation returns.
    pub fn peek(&self) -> i64 {
        self.next
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-seeded order ids.
///
/// Unusable until the server announces the next valid id; allocating before
/// that fails with [`GatewayError::OrderIdUnavailable`].
#[derive(Debug, Clone, Default)]
pub struct OrderIds {
    next: Option<i64>,
}

impl OrderIds {
    pub fn new() -> Self {
        Self { next: None }
    }

    /// Apply a next-valid-id announcement.
    ///
    /// A later announcement never moves the counter backwards: ids already
    /// handed out stay unique even if the server reports a lower value after
    /// a reconnect.
    pub fn seed(&mut self, server_next: i64) {
        let next = match self.next {
            Some(local) if local > server_next => {
                debug!(local, server_next, "keeping local order id ahead of server");
                local
            }
            _ => server_next,
        };
        info!(next, "next valid order id");
        self.next = Some(next);
    }

    /// Allocate the next order id.
    pub fn next_id(&mut self) -> Result<i64> {
        let id = self.next.ok_or(GatewayError::OrderIdUnavailable)?;
        self.next = Some(id + 1);
        Ok(id)
    }

    /// The id the next allocation returns, if seeded.
    pub fn peek(&self) -> Option<i64> {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_start_at_one() {
        let mut ids = RequestIds::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.peek(), 3);
    }

    #[test]
    fn order_ids_unavailable_until_seeded() {
        let mut ids = OrderIds::new();
        assert!(matches!(ids.next_id(), Err(GatewayError::OrderIdUnavailable)));

        ids.seed(1001);
        assert_eq!(ids.next_id().unwrap(), 1001);
        assert_eq!(ids.next_id().unwrap(), 1002);
    }

    #[test]
    fn reseed_never_moves_backwards() {
        let mut ids = OrderIds::new();
        ids.seed(10);
        for _ in 0..5 {
            ids.next_id().unwrap();
        }

        ids.seed(12);
        assert_eq!(ids.next_id().unwrap(), 15);

        ids.seed(40);
        assert_eq!(ids.next_id().unwrap(), 40);
    }
}

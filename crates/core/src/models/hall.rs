//! Hall model - a fixed-capacity screening room

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A Hall hosts sessions and owns a fixed number of seats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hall {
    pub id: Uuid,
    pub name: String,
    /// Seats are numbered `1..=capacity`
    pub capacity: u32,
    pub created_at: DateTime<Utc>,
}

impl Hall {
    pub fn new(name: String, capacity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            capacity,
            created_at: Utc::now(),
        }
    }

    /// Whether a seat number exists in this hall
    pub fn has_seat(&self, seat_number: u32) -> bool {
        (1..=self.capacity).contains(&seat_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_bounds() {
        let hall = Hall::new("Red".to_string(), 50);
        assert!(!hall.has_seat(0));
        assert!(hall.has_seat(1));
        assert!(hall.has_seat(50));
        assert!(!hall.has_seat(51));
    }
}

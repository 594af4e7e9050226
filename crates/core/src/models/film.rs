//! Film model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A film that can be scheduled into sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Film {
    pub id: Uuid,
    pub title: String,
    pub genre: String,
    /// Running time, used to derive a session's end when none is given
    pub duration_minutes: u32,
    pub rating: f64,
    pub description: String,
    pub image_url: Option<String>,
}

impl Film {
    pub fn new(title: String, genre: String, duration_minutes: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            genre,
            duration_minutes,
            rating: 0.0,
            description: String::new(),
            image_url: None,
        }
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    pub fn with_image_url(mut self, image_url: String) -> Self {
        self.image_url = Some(image_url);
        self
    }
}

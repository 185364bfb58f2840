//! Per-response accumulator of page metadata

/// Metadata gathered from one HTML response while it streams past.
///
/// Fields only ever gain values; nothing clears them. Each setter encodes the
/// write policy of its field, so handlers never touch the fields directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub image_alt: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub author_url: Option<String>,
    pub publish_date: Option<String>,
    pub modified_date: Option<String>,
    pub should_generate_json_ld: bool,
    long_description: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Write only if the slot is empty
fn fill(slot: &mut Option<String>, value: Option<String>) -> bool {
    if slot.is_some() {
        return false;
    }
    match non_empty(value) {
        Some(v) => {
            *slot = Some(v);
            true
        }
        None => false,
    }
}

/// Write whenever there is a value
fn replace(slot: &mut Option<String>, value: Option<String>) -> bool {
    match non_empty(value) {
        Some(v) => {
            *slot = Some(v);
            true
        }
        None => false,
    }
}

impl Article {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last writer wins
    pub fn set_title(&mut self, value: Option<String>) -> bool {
        replace(&mut self.title, value)
    }

    /// Short-form description: first non-empty source wins, and never after the
    /// long-form description has been seen.
    pub fn offer_description(&mut self, value: Option<String>) -> bool {
        if self.long_description {
            return false;
        }
        fill(&mut self.description, value)
    }

    /// Long-form description: authoritative, replaces whatever came before
    pub fn set_long_description(&mut self, value: Option<String>) -> bool {
        let written = replace(&mut self.description, value);
        self.long_description |= written;
        written
    }

    pub fn offer_image(&mut self, value: Option<String>) -> bool {
        fill(&mut self.image, value)
    }

    pub fn offer_image_alt(&mut self, value: Option<String>) -> bool {
        fill(&mut self.image_alt, value)
    }

    pub fn offer_url(&mut self, value: Option<String>) -> bool {
        fill(&mut self.url, value)
    }

    pub fn offer_author(&mut self, value: Option<String>) -> bool {
        fill(&mut self.author, value)
    }

    /// Explicit author URL; beats any profile link
    pub fn set_author_url(&mut self, value: Option<String>) -> bool {
        replace(&mut self.author_url, value)
    }

    /// Profile link (LinkedIn), used only when no explicit author URL exists
    pub fn back_fill_author_url(&mut self, value: Option<String>) -> bool {
        fill(&mut self.author_url, value)
    }

    pub fn set_publish_date(&mut self, value: Option<String>) -> bool {
        replace(&mut self.publish_date, value)
    }

    pub fn set_modified_date(&mut self, value: Option<String>) -> bool {
        replace(&mut self.modified_date, value)
    }

    /// Latch the JSON-LD trigger. There is no way to unset it.
    pub fn request_json_ld(&mut self) {
        self.should_generate_json_ld = true;
    }

    /// Whether the injection point should emit anything
    pub fn is_ready_for_json_ld(&self) -> bool {
        self.should_generate_json_ld && self.title.is_some()
    }
}

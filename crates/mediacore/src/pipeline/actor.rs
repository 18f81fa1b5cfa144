//! Which identity moves a file.

use crate::core::config;
use crate::transport::{Actor, Transport};

/// Size ceilings of both identities, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub primary: u64,
    pub elevated: u64,
}

impl SizeLimits {
    pub fn from_config() -> Self {
        Self {
            primary: *config::limits::PRIMARY_MAX_FILE_SIZE,
            elevated: *config::limits::ELEVATED_MAX_FILE_SIZE,
        }
    }

    /// Ceiling that applies given elevated availability
    pub fn effective(&self, elevated_available: bool) -> u64 {
        if elevated_available {
            self.elevated.max(self.primary)
        } else {
            self.primary
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorChoice {
    Use(Actor),
    /// No available identity can move a file this large
    TooLarge { limit: u64 },
}

/// Decision table:
///
/// | size            | elevated available | choice     |
/// |-----------------|--------------------|------------|
/// | <= primary      | any                | primary    |
/// | <= elevated     | yes                | elevated   |
/// | otherwise       | any                | too large  |
pub fn select_actor(size: u64, elevated_available: bool, limits: SizeLimits) -> ActorChoice {
    if size <= limits.primary {
        ActorChoice::Use(Actor::Primary)
    } else if elevated_available && size <= limits.elevated {
        ActorChoice::Use(Actor::Elevated)
    } else {
        ActorChoice::TooLarge {
            limit: limits.effective(elevated_available),
        }
    }
}

/// True when the elevated identity is configured and answers right now
pub async fn elevated_available(transport: &dyn Transport) -> bool {
    transport.has_elevated() && transport.is_connected(Actor::Elevated).await
}

/// Actor for an upload of `size` bytes. Falls back to the primary identity
/// when the elevated one was picked but fails its liveness check.
pub async fn upload_actor(transport: &dyn Transport, size: u64, limits: SizeLimits) -> Actor {
    match select_actor(size, transport.has_elevated(), limits) {
        ActorChoice::Use(Actor::Elevated) => {
            if transport.is_connected(Actor::Elevated).await {
                Actor::Elevated
            } else {
                log::warn!("⚠️ Elevated identity is not connected, uploading with primary");
                Actor::Primary
            }
        }
        ActorChoice::Use(actor) => actor,
        ActorChoice::TooLarge { .. } => Actor::Primary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LIMITS: SizeLimits = SizeLimits {
        primary: 100,
        elevated: 400,
    };

    #[test]
    fn test_small_files_use_primary() {
        assert_eq!(select_actor(100, true, LIMITS), ActorChoice::Use(Actor::Primary));
        assert_eq!(select_actor(1, false, LIMITS), ActorChoice::Use(Actor::Primary));
    }

    #[test]
    fn test_large_files_need_elevated() {
        assert_eq!(select_actor(101, true, LIMITS), ActorChoice::Use(Actor::Elevated));
        assert_eq!(select_actor(101, false, LIMITS), ActorChoice::TooLarge { limit: 100 });
    }

    #[test]
    fn test_too_large_for_everyone() {
        assert_eq!(select_actor(401, true, LIMITS), ActorChoice::TooLarge { limit: 400 });
    }
}

//! Database layer: the Firestore-backed remote store and the in-process
//! device-scoped local store.

pub mod firestore;
pub mod local;

pub use firestore::FirestoreDb;
pub use local::LocalStore;

use ring::rand::{SecureRandom, SystemRandom};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const SESSIONS: &str = "sessions";
    pub const PURCHASES: &str = "purchases";
    /// Billing webhook audit log (keyed by provider event id)
    pub const WEBHOOK_EVENTS: &str = "webhook_events";

    /// Item collections share their names with [`CollectionKind::as_str`].
    pub const SHOPPING_LIST: &str = "shopping_list";
    pub const PANTRY: &str = "pantry";
    pub const FAVORITES: &str = "favorites";
    pub const RECIPE_HISTORY: &str = "recipe_history";
}

/// Generate a random 16-byte hex document id.
pub fn new_doc_id() -> String {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; 16];
    // SystemRandom only fails if the OS RNG is unavailable.
    rng.fill(&mut bytes).expect("system RNG unavailable");
    hex::encode(bytes)
}

//! Recipe data model and content hashing.
//!
//! A recipe's hash is a pure function of its content fields: uppercase
//! SHA-256 hex over the canonical JSON encoding with the `hash` field
//! cleared. The cloud reports that hash per recipe in its sync listing,
//! which lets the client decide whether its cached copy is current
//! without fetching the full record.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// One entry of the remote sync listing: which version of a recipe the
/// cloud currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeIdentifier {
    /// Recipe UID. Opaque; the vendor uses uppercase UUIDs.
    pub uid: String,
    /// Content hash of the version the cloud holds.
    pub hash: String,
}

/// A full recipe as stored by the Paprika cloud.
///
/// Deserialization drops unknown keys, so new server-side fields do not
/// break older clients. Absent optional fields take the defaults below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteRecipe {
    pub uid: String,
    pub name: String,
    pub ingredients: String,
    pub directions: String,
    pub description: String,
    pub notes: String,
    pub nutritional_info: String,
    pub servings: String,
    pub source: String,
    pub source_url: Option<String>,
    pub prep_time: String,
    pub cook_time: String,
    pub total_time: String,
    pub difficulty: String,
    /// Star rating, 0 to 5.
    pub rating: u32,
    pub categories: Vec<String>,
    /// Creation timestamp as reported by the cloud.
    pub created: String,
    pub photo_url: Option<String>,
    /// Serving-scale factor, kept as the opaque string the apps send.
    pub scale: Option<String>,
    pub on_grocery_list: Option<String>,
    pub in_trash: bool,
    pub is_pinned: bool,
    pub on_favorites: bool,
    /// Content hash of the fields above. Empty until computed.
    pub hash: String,
}

impl RemoteRecipe {
    /// Compute the content hash from the current field values.
    ///
    /// The `hash` field itself is excluded from the digest, so the result
    /// is stable no matter what the field currently contains.
    pub fn content_hash(&self) -> Result<String> {
        let mut probe = self.clone();
        probe.hash = String::new();
        let canonical = serde_json::to_vec(&probe)?;
        Ok(hex::encode_upper(Sha256::digest(&canonical)))
    }

    /// Recompute and store the content hash.
    pub fn update_hash(&mut self) -> Result<()> {
        self.hash = self.content_hash()?;
        Ok(())
    }

    /// Canonical payload bytes for the sync upload endpoint.
    ///
    /// The cloud treats this as opaque; plain JSON is the canonical form
    /// here. The desktop apps wrap the same JSON in a gzip container, which
    /// the API also accepts.
    pub fn sync_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Generate a fresh recipe UID in the vendor's format.
pub fn new_uid() -> String {
    uuid::Uuid::new_v4().to_string().to_uppercase()
}

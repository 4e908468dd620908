//! Role and ownership checks applied at the top of every library operation.

use crate::db::ImageRecord;
use crate::error::{PixvaultError, Result};
use crate::types::{Principal, Role};

/// Signed-in users and admins pass; pending accounts do not.
pub fn require_member(principal: &Principal) -> Result<()> {
    match principal.role {
        Role::User | Role::Admin => Ok(()),
        Role::Pending => Err(PixvaultError::Forbidden("insufficient role".into())),
    }
}

/// Only the uploader may modify an image.
pub fn require_owner(principal: &Principal, image: &ImageRecord) -> Result<()> {
    if image.owner_id == principal.id {
        Ok(())
    } else {
        Err(PixvaultError::Forbidden("only the owner can modify this image".into()))
    }
}

/// Soft-deleted images are visible to their owner only; others get `NotFound`.
pub fn require_visible(principal: &Principal, image: &ImageRecord) -> Result<()> {
    if image.is_deleted && image.owner_id != principal.id {
        return Err(PixvaultError::not_found(format!("image {} not found", image.id)));
    }
    Ok(())
}

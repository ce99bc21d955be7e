use uuid::Uuid;

use super::extractors::AuthUser;
use crate::error::Error;

/// Mutation on an owned resource: the actor must be the recorded owner.
pub fn ensure_owner(owner: Uuid, actor: &AuthUser) -> Result<(), Error> {
    if actor.id == owner {
        Ok(())
    } else {
        Err(Error::Forbidden("you do not own this resource"))
    }
}

/// Same check, with an admin override.
pub fn ensure_owner_or_admin(owner: Uuid, actor: &AuthUser) -> Result<(), Error> {
    if actor.id == owner || actor.is_admin {
        Ok(())
    } else {
        Err(Error::Forbidden("you do not own this resource"))
    }
}

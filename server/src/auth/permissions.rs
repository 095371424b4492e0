use crate::models::{Capabilities, User};
use crate::utils::AppError;

/// Operation classes guarded by a capability flag. This is the only place the
/// flags are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Take and pay for reservations.
    Reserve,
    /// Create, edit and customize events; manage their reservations.
    ManageEvents,
}

impl Permission {
    fn granted_by(self, capabilities: Capabilities) -> bool {
        match self {
            Permission::Reserve => capabilities.participant,
            Permission::ManageEvents => capabilities.organizer,
        }
    }

    fn denial(self) -> &'static str {
        match self {
            Permission::Reserve => "Only participants can reserve tickets",
            Permission::ManageEvents => "Only organizers can manage events",
        }
    }
}

pub fn authorize(user: &User, permission: Permission) -> Result<(), AppError> {
    if permission.granted_by(user.capabilities()) {
        Ok(())
    } else {
        tracing::debug!(user_id = %user.id, ?permission, "Permission denied");
        Err(AppError::Forbidden(permission.denial().to_string()))
    }
}
